#![forbid(unsafe_code)]

//! Line diff for snapshot mismatches.
//!
//! Lines are aligned on their longest common subsequence and printed as
//! unified-diff hunks with three lines of context, so an inserted row shows
//! up as one `+` line instead of shifting every line below it.

use std::fmt::Write as _;

/// Unchanged lines kept around each change.
pub const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Equal(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j]: length of the LCS of old[i..] and new[j..].
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Equal(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Delete(old[i]));
            i += 1;
        } else {
            ops.push(Op::Insert(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|line| Op::Delete(line)));
    ops.extend(new[j..].iter().map(|line| Op::Insert(line)));
    ops
}

/// Unified diff from `expected` to `actual`, or an empty string if their
/// lines are identical.
///
/// ```
/// use evalboard_harness::diff::unified_diff;
///
/// assert!(unified_diff("a\nb", "a\nb").is_empty());
/// let diff = unified_diff("a\nb\nc", "a\nB\nc");
/// assert!(diff.contains("-b\n+B\n"));
/// ```
#[must_use]
pub fn unified_diff(expected: &str, actual: &str) -> String {
    let old: Vec<&str> = expected.lines().collect();
    let new: Vec<&str> = actual.lines().collect();
    let ops = diff_ops(&old, &new);
    if ops.iter().all(|op| matches!(op, Op::Equal(_))) {
        return String::new();
    }

    // Line offsets in `old` and `new` before each op.
    let mut positions = Vec::with_capacity(ops.len());
    let (mut o, mut n) = (0usize, 0usize);
    for op in &ops {
        positions.push((o, n));
        match op {
            Op::Equal(_) => {
                o += 1;
                n += 1;
            }
            Op::Delete(_) => o += 1,
            Op::Insert(_) => n += 1,
        }
    }

    // Op ranges to print; overlapping or touching ranges merge.
    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for (idx, op) in ops.iter().enumerate() {
        if matches!(op, Op::Equal(_)) {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(ops.len());
        match hunks.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => hunks.push((start, end)),
        }
    }

    let mut out = String::from("--- expected\n+++ actual\n");
    for (start, end) in hunks {
        let slice = &ops[start..end];
        let old_count = slice.iter().filter(|op| !matches!(op, Op::Insert(_))).count();
        let new_count = slice.iter().filter(|op| !matches!(op, Op::Delete(_))).count();
        let (o, n) = positions[start];
        let old_start = if old_count == 0 { o } else { o + 1 };
        let new_start = if new_count == 0 { n } else { n + 1 };
        let _ = writeln!(out, "@@ -{old_start},{old_count} +{new_start},{new_count} @@");
        for op in slice {
            let _ = match op {
                Op::Equal(line) => writeln!(out, " {line}"),
                Op::Delete(line) => writeln!(out, "-{line}"),
                Op::Insert(line) => writeln!(out, "+{line}"),
            };
        }
    }
    out
}

#![forbid(unsafe_code)]

//! Pure frame construction.
//!
//! [`DashboardFrame::compute`] lays out a [`Table`] as fixed-width text lines
//! with per-segment style hints. It never touches a terminal, so the same
//! frame can be printed by the presenter or compared directly in tests.
//!
//! # Layout
//!
//! ```text
//! Test case                    baseline                 tuned
//! ──────────────────────────────────────────────────────────────────────
//! greeting                     ████▌      eval 4/10     7/10 (70%) $0.12
//! haggle case 1                pending                  ██▏        convo 2/8
//! ──────────────────────────────────────────────────────────────────────
//! Total                        pending                  pending
//! Cost $0.31                   $0.19                    $0.12
//! ```
//!
//! The totals row stays `pending` until every cell in the table is done, so
//! it never shows an intermediate aggregate.

use evalboard_core::{Cell, CellStatus, ColumnKey, DashboardLayout, RowKey, Table, Totals};

use crate::bar::render_bar;
use crate::format::{fit, format_cost, truncate_row_name};

/// Title of the row-name column.
pub const NAME_HEADER: &str = "Test case";

/// Glyph used for horizontal rules.
pub const RULE: char = '─';

/// Style hint for a segment. The presenter maps tones to SGR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Plain,
    Header,
    Muted,
    Active,
    /// Pass rate of at least 80%.
    Good,
    /// Pass rate of at least 50%.
    Warn,
    Bad,
}

impl Tone {
    /// Tone for a pass rate, given as passes out of evaluations.
    #[must_use]
    pub fn for_pass_rate(passes: u32, total_evals: u32) -> Self {
        if total_evals == 0 {
            return Self::Muted;
        }
        let rate = f64::from(passes) / f64::from(total_evals);
        if rate >= 0.8 {
            Self::Good
        } else if rate >= 0.5 {
            Self::Warn
        } else {
            Self::Bad
        }
    }
}

/// A run of text sharing one tone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tone: Tone,
}

impl Segment {
    #[must_use]
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// One printed line of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameLine {
    pub segments: Vec<Segment>,
}

impl FrameLine {
    fn push(&mut self, text: impl Into<String>, tone: Tone) {
        self.segments.push(Segment::new(text, tone));
    }

    /// Line text without styling.
    #[must_use]
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// A complete dashboard frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardFrame {
    lines: Vec<FrameLine>,
}

impl DashboardFrame {
    /// Lay out `table`: header, rule, one line per row, rule, totals, cost.
    #[must_use]
    pub fn compute(table: &Table, layout: &DashboardLayout) -> Self {
        let columns: Vec<&ColumnKey> = table.columns().collect();
        let rule: String = std::iter::repeat_n(RULE, layout.line_width(columns.len())).collect();
        let mut lines = Vec::with_capacity(table.rows().len() + 5);

        let mut header = FrameLine::default();
        header.push(fit(NAME_HEADER, layout.name_width), Tone::Header);
        for column in &columns {
            header.push(" ", Tone::Plain);
            header.push(fit(column.as_str(), layout.column_width), Tone::Header);
        }
        lines.push(header);
        lines.push(rule_line(&rule));

        for row in table.rows() {
            lines.push(row_line(table, row, &columns, layout));
        }

        lines.push(rule_line(&rule));
        lines.push(totals_line(table, &columns, layout));
        lines.push(cost_line(table, &columns, layout));

        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[FrameLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Unstyled frame, one line per `\n`.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text());
            out.push('\n');
        }
        out
    }
}

// ── Cell text ──────────────────────────────────────────────────────────

/// Text and tone of one cell.
#[must_use]
pub fn cell_segment(cell: &Cell, layout: &DashboardLayout) -> Segment {
    match cell.status {
        CellStatus::Pending => Segment::new(CellStatus::Pending.label(), Tone::Muted),
        CellStatus::Done => Segment::new(
            format!(
                "{} {}",
                result_text(cell.passes, cell.total_evals),
                format_cost(cell.cost)
            ),
            Tone::for_pass_rate(cell.passes, cell.total_evals),
        ),
        status => Segment::new(
            format!(
                "{} {} {}/{}",
                render_bar(cell.ratio(), layout.bar_width),
                status.label(),
                cell.completed_units,
                cell.total_units
            ),
            Tone::Active,
        ),
    }
}

/// `passes/total (pct%)`, or `0/0` when nothing was evaluated.
#[must_use]
pub fn result_text(passes: u32, total_evals: u32) -> String {
    if total_evals == 0 {
        return format!("{passes}/{total_evals}");
    }
    let pct = (f64::from(passes) * 100.0 / f64::from(total_evals)).round();
    format!("{passes}/{total_evals} ({pct:.0}%)")
}

fn rule_line(rule: &str) -> FrameLine {
    let mut line = FrameLine::default();
    line.push(rule, Tone::Muted);
    line
}

fn row_line(
    table: &Table,
    row: &RowKey,
    columns: &[&ColumnKey],
    layout: &DashboardLayout,
) -> FrameLine {
    let mut line = FrameLine::default();
    line.push(
        fit(&truncate_row_name(row, layout.name_width), layout.name_width),
        Tone::Plain,
    );
    for column in columns {
        line.push(" ", Tone::Plain);
        let segment = match table.cell(row, column) {
            Some(cell) => cell_segment(cell, layout),
            None => Segment::new("", Tone::Plain),
        };
        line.push(fit(&segment.text, layout.column_width), segment.tone);
    }
    line
}

fn totals_line(table: &Table, columns: &[&ColumnKey], layout: &DashboardLayout) -> FrameLine {
    let mut line = FrameLine::default();
    if !table.all_done() {
        line.push(fit("Total", layout.name_width), Tone::Header);
        for _ in columns {
            line.push(" ", Tone::Plain);
            line.push(
                fit(CellStatus::Pending.label(), layout.column_width),
                Tone::Muted,
            );
        }
        return line;
    }

    let overall = table.totals();
    line.push(
        fit(&totals_label(&overall), layout.name_width),
        Tone::for_pass_rate(overall.passes, overall.total_evals),
    );
    for column in columns {
        let totals = table.column_totals(column);
        line.push(" ", Tone::Plain);
        line.push(
            fit(
                &result_text(totals.passes, totals.total_evals),
                layout.column_width,
            ),
            Tone::for_pass_rate(totals.passes, totals.total_evals),
        );
    }
    line
}

fn totals_label(totals: &Totals) -> String {
    format!("Total {}", result_text(totals.passes, totals.total_evals))
}

fn cost_line(table: &Table, columns: &[&ColumnKey], layout: &DashboardLayout) -> FrameLine {
    let mut line = FrameLine::default();
    line.push(
        fit(
            &format!("Cost {}", format_cost(table.totals().cost)),
            layout.name_width,
        ),
        Tone::Header,
    );
    for column in columns {
        line.push(" ", Tone::Plain);
        line.push(
            fit(&format_cost(table.column_totals(column).cost), layout.column_width),
            Tone::Muted,
        );
    }
    line
}

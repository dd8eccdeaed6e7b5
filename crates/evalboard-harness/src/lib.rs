#![forbid(unsafe_code)]

//! Snapshot testing for dashboard output.
//!
//! A snapshot is the canonical text of a rendered dashboard (usually the
//! emulator replay of a captured byte stream) stored under
//! `tests/snapshots/{name}.snap` next to the crate under test.
//!
//! # Role
//!
//! - [`SnapshotStore`] compares text against stored snapshots, creates them
//!   on first run and rewrites them in update mode.
//! - [`diff::unified_diff`] explains a mismatch line by line.
//! - [`frames`] splits a capture into synchronized frames and replays them.
//!
//! # Update mode
//!
//! Set `BLESS=1` (or `BLESS=true`) to rewrite every snapshot a test touches:
//!
//! ```sh
//! BLESS=1 cargo test -p evalboard-harness
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Mismatch | Rendered text changed | [`SnapshotError::Mismatch`] with a unified diff |
//! | Missing snapshot | First run | File written, [`SnapshotOutcome::Created`] |
//! | I/O error | Unwritable snapshot dir | [`SnapshotError::Io`] naming the path |

pub mod diff;
pub mod frames;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use diff::unified_diff;
pub use evalboard_pty::{TerminalEmulator, canonicalize};
pub use frames::{count_frames, replay_frames, split_frames};

// ============================================================================
// Types
// ============================================================================

/// How stored and actual text are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Byte-exact after normalizing line endings.
    Exact,
    /// Ignore trailing whitespace on each line and trailing blank lines.
    #[default]
    TrimTrailing,
}

impl MatchMode {
    fn normalize(self, text: &str) -> String {
        let text = text.replace("\r\n", "\n");
        match self {
            Self::Exact => text,
            Self::TrimTrailing => {
                let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
                let keep = lines
                    .iter()
                    .rposition(|line| !line.is_empty())
                    .map_or(0, |last| last + 1);
                lines[..keep].join("\n")
            }
        }
    }
}

/// What [`SnapshotStore::assert_matches`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The stored snapshot matched.
    Matched,
    /// No snapshot existed; one was written.
    Created,
    /// Update mode rewrote the snapshot.
    Updated,
}

/// Snapshot comparison failure.
#[derive(Debug)]
pub enum SnapshotError {
    Mismatch {
        name: String,
        path: PathBuf,
        diff: String,
    },
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { name, path, diff } => write!(
                f,
                "snapshot '{name}' mismatch\n  file: {}\n  rerun with BLESS=1 to update\n\n{diff}",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "snapshot file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mismatch { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Directory of `.snap` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    dir: PathBuf,
    mode: MatchMode,
    update: bool,
}

impl SnapshotStore {
    /// Store rooted at `dir`. Update mode follows the `BLESS` variable.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: MatchMode::default(),
            update: is_bless(),
        }
    }

    /// Store at `{manifest_dir}/tests/snapshots`.
    #[must_use]
    pub fn for_crate(manifest_dir: impl AsRef<Path>) -> Self {
        Self::new(manifest_dir.as_ref().join("tests").join("snapshots"))
    }

    #[must_use]
    pub fn update_mode(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    #[must_use]
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot called `name`.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.snap"))
    }

    /// Compare `actual` with the snapshot called `name`.
    ///
    /// A missing snapshot is written and reported as [`SnapshotOutcome::Created`].
    /// In update mode the snapshot is always rewritten.
    pub fn assert_matches(
        &self,
        actual: &str,
        name: &str,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let path = self.path(name);
        if self.update {
            self.write(&path, actual)?;
            info!(snapshot = name, path = %path.display(), "snapshot updated");
            return Ok(SnapshotOutcome::Updated);
        }

        let expected = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.write(&path, actual)?;
                info!(snapshot = name, path = %path.display(), "snapshot created");
                return Ok(SnapshotOutcome::Created);
            }
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        let expected = self.mode.normalize(&expected);
        let actual = self.mode.normalize(actual);
        if expected == actual {
            debug!(snapshot = name, "snapshot matched");
            return Ok(SnapshotOutcome::Matched);
        }

        let mut diff = unified_diff(&expected, &actual);
        if diff.is_empty() {
            // Exact mode: same lines, different trailing newline.
            diff = "(texts differ only in trailing newlines)\n".to_string();
        }
        Err(SnapshotError::Mismatch {
            name: name.to_string(),
            path,
            diff,
        })
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut contents = self.mode.normalize(text);
        if self.mode == MatchMode::TrimTrailing {
            contents.push('\n');
        }
        fs::write(path, contents).map_err(io_err)
    }
}

/// Whether `BLESS` asks for snapshot updates.
#[must_use]
pub fn is_bless() -> bool {
    bless_requested(std::env::var("BLESS").ok().as_deref())
}

fn bless_requested(value: Option<&str>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Compare text with `tests/snapshots/{name}.snap` in the calling crate.
///
/// Panics with a unified diff on mismatch.
///
/// ```ignore
/// let screen = evalboard_harness::canonicalize(&capture.contents(), 120, 40);
/// assert_snapshot!("final_dashboard", &screen);
/// ```
#[macro_export]
macro_rules! assert_snapshot {
    ($name:expr, $actual:expr) => {
        $crate::assert_snapshot!($name, $actual, $crate::MatchMode::TrimTrailing)
    };
    ($name:expr, $actual:expr, $mode:expr) => {
        if let Err(err) = $crate::SnapshotStore::for_crate(env!("CARGO_MANIFEST_DIR"))
            .match_mode($mode)
            .assert_matches($actual, $name)
        {
            panic!("{err}");
        }
    };
}

#![forbid(unsafe_code)]

//! Environment-driven configuration.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `EVALBOARD_NAME_WIDTH` | Row-name column width | 28 |
//! | `EVALBOARD_COLUMN_WIDTH` | Width of each variant column | 24 |
//! | `EVALBOARD_BAR_WIDTH` | Progress bar width in characters | 10 |
//! | `NO_COLOR` | Disable SGR styling when set | unset |
//! | `EVALBOARD_LOG` | Log filter (`tracing` env-filter syntax) | `info` |
//! | `EVALBOARD_LOG_FILE` | Log destination; logging is off when unset | unset |
//! | `EVALBOARD_REPORT` | Write the JSON report here after a run | unset |
//!
//! Unparseable numbers fall back to the default.

use std::path::PathBuf;

/// Smallest row-name column that still fits `...` plus a few characters.
pub const MIN_NAME_WIDTH: usize = 8;

/// Smallest variant column: a one-character bar plus a short label.
pub const MIN_COLUMN_WIDTH: usize = 12;

/// Geometry and styling of the dashboard table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardLayout {
    pub name_width: usize,
    pub column_width: usize,
    pub bar_width: usize,
    pub color: bool,
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            name_width: 28,
            column_width: 24,
            bar_width: 10,
            color: true,
        }
    }
}

impl DashboardLayout {
    #[must_use]
    pub fn with_name_width(mut self, width: usize) -> Self {
        self.name_width = width.max(MIN_NAME_WIDTH);
        self
    }

    /// Shrinks the bar if it no longer leaves room for the status label.
    #[must_use]
    pub fn with_column_width(mut self, width: usize) -> Self {
        self.column_width = width.max(MIN_COLUMN_WIDTH);
        self.bar_width = self.bar_width.min(self.max_bar_width());
        self
    }

    /// Clamped to `1..=max_bar_width()`.
    #[must_use]
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width.clamp(1, self.max_bar_width());
        self
    }

    /// Widest bar that still leaves a short label and its count visible.
    #[must_use]
    pub fn max_bar_width(&self) -> usize {
        self.column_width.saturating_sub(MIN_COLUMN_WIDTH) + 1
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Total printed width of one table line.
    #[must_use]
    pub fn line_width(&self, columns: usize) -> usize {
        self.name_width + columns * (self.column_width + 1)
    }
}

/// Logging destination and filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

/// Top-level configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvalConfig {
    pub layout: DashboardLayout,
    pub log: LogConfig,
    pub report_path: Option<PathBuf>,
}

impl EvalConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (tests pass a map).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = DashboardLayout::default();
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        let layout = DashboardLayout::default()
            .with_name_width(number("EVALBOARD_NAME_WIDTH", defaults.name_width))
            .with_column_width(number("EVALBOARD_COLUMN_WIDTH", defaults.column_width))
            .with_bar_width(number("EVALBOARD_BAR_WIDTH", defaults.bar_width))
            .with_color(lookup("NO_COLOR").is_none());

        let log = LogConfig {
            filter: lookup("EVALBOARD_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| LogConfig::default().filter),
            file: lookup("EVALBOARD_LOG_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        Self {
            layout,
            log,
            report_path: lookup("EVALBOARD_REPORT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: DashboardLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = EvalConfig::from_lookup(|_| None);
        assert_eq!(config.layout, DashboardLayout::default());
        assert_eq!(config.log, LogConfig::default());
        assert!(config.report_path.is_none());
    }

    #[test]
    fn environment_overrides_layout() {
        let config = EvalConfig::from_lookup(lookup(&[
            ("EVALBOARD_NAME_WIDTH", "40"),
            ("EVALBOARD_COLUMN_WIDTH", "30"),
            ("EVALBOARD_BAR_WIDTH", "6"),
            ("NO_COLOR", "1"),
        ]));
        assert_eq!(config.layout.name_width, 40);
        assert_eq!(config.layout.column_width, 30);
        assert_eq!(config.layout.bar_width, 6);
        assert!(!config.layout.color);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = EvalConfig::from_lookup(lookup(&[("EVALBOARD_BAR_WIDTH", "wide")]));
        assert_eq!(config.layout.bar_width, DashboardLayout::default().bar_width);
    }

    #[test]
    fn widths_are_clamped_to_minimums() {
        let config = EvalConfig::from_lookup(lookup(&[
            ("EVALBOARD_NAME_WIDTH", "2"),
            ("EVALBOARD_COLUMN_WIDTH", "1"),
            ("EVALBOARD_BAR_WIDTH", "0"),
        ]));
        assert_eq!(config.layout.name_width, MIN_NAME_WIDTH);
        assert_eq!(config.layout.column_width, MIN_COLUMN_WIDTH);
        assert_eq!(config.layout.bar_width, 1);
    }

    #[test]
    fn bar_never_crowds_out_the_label() {
        let config = EvalConfig::from_lookup(lookup(&[("EVALBOARD_BAR_WIDTH", "30")]));
        assert_eq!(config.layout.bar_width, 13);

        let narrowed = DashboardLayout::default()
            .with_bar_width(10)
            .with_column_width(MIN_COLUMN_WIDTH);
        assert_eq!(narrowed.bar_width, 1);

        let widened = DashboardLayout::default()
            .with_column_width(40)
            .with_bar_width(30);
        assert_eq!(widened.bar_width, 29);
    }

    #[test]
    fn log_and_report_paths() {
        let config = EvalConfig::from_lookup(lookup(&[
            ("EVALBOARD_LOG", "evalboard=debug"),
            ("EVALBOARD_LOG_FILE", "/tmp/evalboard.log"),
            ("EVALBOARD_REPORT", "/tmp/report.json"),
        ]));
        assert_eq!(config.log.filter, "evalboard=debug");
        assert_eq!(
            config.log.file.as_deref(),
            Some(std::path::Path::new("/tmp/evalboard.log"))
        );
        assert!(config.report_path.is_some());
    }

    #[test]
    fn line_width_accounts_for_separators() {
        let layout = DashboardLayout::default()
            .with_name_width(20)
            .with_column_width(12);
        assert_eq!(layout.line_width(2), 20 + 2 * 13);
    }
}

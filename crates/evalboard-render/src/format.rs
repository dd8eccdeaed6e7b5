#![forbid(unsafe_code)]

//! Text formatting for dashboard cells: costs, row names, fixed-width padding.

use evalboard_core::RowKey;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Prefix marking a row name whose leading characters were dropped.
pub const ELLIPSIS: &str = "...";

/// Format a dollar cost.
///
/// - `cost >= 1.0`: two decimal places.
/// - `0 < cost < 1.0`: enough decimals for two significant figures.
/// - zero, negative or non-finite: `$0.00`.
///
/// ```
/// use evalboard_render::format::format_cost;
///
/// assert_eq!(format_cost(0.0), "$0.00");
/// assert_eq!(format_cost(1.5), "$1.50");
/// assert_eq!(format_cost(0.0043), "$0.0043");
/// ```
#[must_use]
pub fn format_cost(cost: f64) -> String {
    if !cost.is_finite() || cost <= 0.0 {
        return "$0.00".to_string();
    }
    if cost >= 1.0 {
        return format!("${cost:.2}");
    }
    let decimals = (-cost.log10().floor()) as usize + 1;
    format!("${cost:.decimals$}")
}

/// Display width of `text` in terminal columns.
#[must_use]
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Keep the longest prefix of `text` that fits in `width` columns.
#[must_use]
pub fn take_prefix(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            return &text[..idx];
        }
        used += w;
    }
    text
}

/// Keep the longest suffix of `text` that fits in `width` columns.
#[must_use]
pub fn take_suffix(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices().rev() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            return &text[idx + ch.len_utf8()..];
        }
        used += w;
    }
    text
}

/// Clip `text` to `width` columns and pad it with spaces to exactly `width`.
#[must_use]
pub fn fit(text: &str, width: usize) -> String {
    let clipped = take_prefix(text, width);
    let pad = width.saturating_sub(display_width(clipped));
    let mut out = String::with_capacity(clipped.len() + pad);
    out.push_str(clipped);
    out.extend(std::iter::repeat_n(' ', pad));
    out
}

/// Row label truncated to `width` columns (unpadded).
///
/// Overlong labels keep their trailing characters behind a `...` prefix.
/// A `" case N"` suffix is always kept whole; only the base name shrinks.
#[must_use]
pub fn truncate_row_name(row: &RowKey, width: usize) -> String {
    let suffix = row.case_suffix();
    let full_width = display_width(&row.name) + display_width(&suffix);
    if full_width <= width {
        return format!("{}{suffix}", row.name);
    }

    let room = width
        .saturating_sub(display_width(&suffix))
        .saturating_sub(ELLIPSIS.len());
    if room > 0 {
        return format!("{ELLIPSIS}{}{suffix}", take_suffix(&row.name, room));
    }

    // Not even the suffix fits next to the ellipsis: trim the whole label.
    let label = row.to_string();
    let room = width.saturating_sub(ELLIPSIS.len());
    if room == 0 {
        return take_prefix(ELLIPSIS, width).to_string();
    }
    format!("{ELLIPSIS}{}", take_suffix(&label, room))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_zero() {
        assert_eq!(format_cost(0.0), "$0.00");
        assert_eq!(format_cost(-1.0), "$0.00");
        assert_eq!(format_cost(f64::NAN), "$0.00");
    }

    #[test]
    fn cost_at_least_one_dollar() {
        assert_eq!(format_cost(1.0), "$1.00");
        assert_eq!(format_cost(1.5), "$1.50");
        assert_eq!(format_cost(12.345), "$12.35");
    }

    #[test]
    fn cost_below_one_dollar_two_significant_figures() {
        assert_eq!(format_cost(0.5), "$0.50");
        assert_eq!(format_cost(0.25), "$0.25");
        assert_eq!(format_cost(0.043), "$0.043");
        assert_eq!(format_cost(0.0043), "$0.0043");
        assert_eq!(format_cost(0.000012), "$0.000012");
    }

    #[test]
    fn short_name_untouched() {
        assert_eq!(truncate_row_name(&RowKey::new("greet"), 10), "greet");
        assert_eq!(
            truncate_row_name(&RowKey::with_case("greet", 2), 12),
            "greet case 2"
        );
    }

    #[test]
    fn long_name_keeps_tail() {
        let row = RowKey::new("merchant_haggling_scenario");
        assert_eq!(truncate_row_name(&row, 12), "..._scenario");
        assert_eq!(truncate_row_name(&row, 13), "...g_scenario");
    }

    #[test]
    fn case_suffix_always_whole() {
        let row = RowKey::with_case("merchant_haggling_scenario", 12);
        let label = truncate_row_name(&row, 20);
        assert!(label.ends_with(" case 12"));
        assert!(label.starts_with(ELLIPSIS));
        assert_eq!(label, "..._scenario case 12");
    }

    #[test]
    fn overlong_label_fills_the_column() {
        let plain = RowKey::new("merchant_haggling_scenario");
        let numbered = RowKey::with_case("merchant_haggling_scenario", 12);
        for width in 12..26 {
            assert_eq!(display_width(&truncate_row_name(&plain, width)), width);
            assert_eq!(display_width(&truncate_row_name(&numbered, width)), width);
        }
    }

    #[test]
    fn tiny_width_still_bounded() {
        let row = RowKey::with_case("merchant", 12);
        for width in 0..12 {
            assert!(display_width(&truncate_row_name(&row, width)) <= width);
        }
    }

    #[test]
    fn fit_pads_and_clips() {
        assert_eq!(fit("ab", 4), "ab  ");
        assert_eq!(fit("abcdef", 4), "abcd");
        assert_eq!(fit("█▌", 3), "█▌ ");
    }

    #[test]
    fn suffix_and_prefix_on_multibyte() {
        assert_eq!(take_suffix("ab█▌", 2), "█▌");
        assert_eq!(take_prefix("█▌ab", 2), "█▌");
    }
}

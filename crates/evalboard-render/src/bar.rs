#![forbid(unsafe_code)]

//! Sub-character progress bars built from eighth-block glyphs.
//!
//! A bar `width` characters wide has `8 * width` reachable positions. For a
//! ratio `r`, the filled position is `clamp(round(r * 8W), 0, 8W)` and the
//! glyph level of character `i` is `clamp(position - 8i, 0, 8)`.

/// Glyph for each fill level, indexed by eighths (0 = empty, 8 = full).
pub const EIGHTHS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Filled position in eighths for `ratio` on a bar of `width` characters.
///
/// Non-finite ratios count as empty.
#[must_use]
pub fn bar_position(ratio: f64, width: usize) -> usize {
    let max = width * 8;
    if !ratio.is_finite() {
        return 0;
    }
    let scaled = (ratio * max as f64).round();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(max)
    }
}

/// Glyph level (0..=8) of character `index` for a bar at `position`.
#[must_use]
pub const fn glyph_level(position: usize, index: usize) -> usize {
    let start = index * 8;
    if position <= start {
        0
    } else {
        let level = position - start;
        if level > 8 { 8 } else { level }
    }
}

/// Render a bar of exactly `width` glyphs.
///
/// ```
/// use evalboard_render::bar::render_bar;
///
/// assert_eq!(render_bar(0.5, 4), "██  ");
/// assert_eq!(render_bar(1.0, 2), "██");
/// assert_eq!(render_bar(0.0, 3), "   ");
/// ```
#[must_use]
pub fn render_bar(ratio: f64, width: usize) -> String {
    let position = bar_position(ratio, width);
    (0..width)
        .map(|i| EIGHTHS[glyph_level(position, i)])
        .collect()
}

/// Decode a rendered bar back to its position in eighths.
///
/// Returns `None` if the string contains a character that is not a bar glyph.
#[must_use]
pub fn decode_bar(bar: &str) -> Option<usize> {
    bar.chars()
        .map(|c| EIGHTHS.iter().position(|&g| g == c))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_saturate() {
        assert_eq!(bar_position(0.0, 10), 0);
        assert_eq!(bar_position(1.0, 10), 80);
        assert_eq!(bar_position(-0.5, 10), 0);
        assert_eq!(bar_position(7.0, 10), 80);
        assert_eq!(bar_position(f64::NAN, 10), 0);
    }

    #[test]
    fn partial_glyphs() {
        // 3/16 of 2 chars = 3 eighths
        assert_eq!(render_bar(3.0 / 16.0, 2), "▍ ");
        // 11 eighths = one full block + 3 eighths
        assert_eq!(render_bar(11.0 / 16.0, 2), "█▍");
    }

    #[test]
    fn zero_width_bar_is_empty() {
        assert_eq!(render_bar(0.7, 0), "");
        assert_eq!(decode_bar(""), Some(0));
    }

    #[test]
    fn glyph_level_bounds() {
        assert_eq!(glyph_level(0, 0), 0);
        assert_eq!(glyph_level(5, 0), 5);
        assert_eq!(glyph_level(20, 1), 8);
        assert_eq!(glyph_level(20, 2), 4);
        assert_eq!(glyph_level(20, 3), 0);
    }

    #[test]
    fn decode_rejects_foreign_glyphs() {
        assert_eq!(decode_bar("█x"), None);
        assert_eq!(decode_bar("█▌"), Some(12));
    }
}

//! Property-based tests for progress bars and cell formatting.
//!
//! 1. Decoding a rendered bar yields `clamp(round(r * 8W), 0, 8W)`.
//! 2. Bars are monotonic in the ratio and saturate at both ends.
//! 3. Row names never exceed their column and keep the case suffix.

use evalboard_core::RowKey;
use evalboard_render::bar::{decode_bar, render_bar};
use evalboard_render::format::{display_width, truncate_row_name};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn decoded_position_matches_rounding(ratio in 0.0f64..=1.0, width in 0usize..40) {
        let bar = render_bar(ratio, width);
        prop_assert_eq!(bar.chars().count(), width);
        let max = 8 * width;
        let expected = ((ratio * max as f64).round() as usize).min(max);
        prop_assert_eq!(decode_bar(&bar), Some(expected));
    }

    #[test]
    fn bar_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0, width in 1usize..40) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo_pos = decode_bar(&render_bar(lo, width)).unwrap();
        let hi_pos = decode_bar(&render_bar(hi, width)).unwrap();
        prop_assert!(lo_pos <= hi_pos);
    }

    #[test]
    fn bar_saturates_outside_unit_range(excess in 0.0f64..100.0, width in 1usize..40) {
        prop_assert_eq!(decode_bar(&render_bar(-excess, width)), Some(0));
        prop_assert_eq!(decode_bar(&render_bar(1.0 + excess, width)), Some(8 * width));
    }

    #[test]
    fn row_names_fit_and_keep_suffix(
        name in "[a-z_]{1,60}",
        case in 1u32..200,
        width in 20usize..60,
    ) {
        let row = RowKey::with_case(name, case);
        let label = truncate_row_name(&row, width);
        prop_assert!(display_width(&label) <= width);
        let suffix = format!(" case {case}");
        prop_assert!(label.ends_with(&suffix));
    }
}

//! End-to-end dashboard checks: registry → presenter → captured bytes →
//! emulator replay.

use std::thread;

use evalboard_core::{CellStatus, ColumnKey, DashboardLayout, ProgressRegistry, RowKey};
use evalboard_harness::{assert_snapshot, canonicalize, count_frames, replay_frames};
use evalboard_render::{CaptureBuffer, Presenter};
use proptest::prelude::*;

const COLS: u16 = 80;
const ROWS: u16 = 24;

fn layout() -> DashboardLayout {
    DashboardLayout::default()
        .with_name_width(20)
        .with_column_width(22)
        .with_bar_width(6)
        .with_color(false)
}

fn attach(registry: &ProgressRegistry, capture: &CaptureBuffer, layout: DashboardLayout) {
    let presenter = Presenter::new(capture.clone(), layout);
    assert!(registry.attach_observer(Box::new(presenter)).is_none());
}

/// The 2×2 grid used throughout: (row, column, passes, cost) per cell.
fn grid() -> Vec<(RowKey, ColumnKey, u32, f64)> {
    vec![
        (RowKey::new("greeting"), ColumnKey::new("baseline"), 9, 0.42),
        (RowKey::new("greeting"), ColumnKey::new("tuned"), 10, 0.38),
        (RowKey::with_case("haggle", 2), ColumnKey::new("baseline"), 4, 1.25),
        (RowKey::with_case("haggle", 2), ColumnKey::new("tuned"), 7, 0.75),
    ]
}

fn register_grid(registry: &ProgressRegistry) {
    for (row, column, _, _) in grid() {
        registry.register(row, column, 10);
    }
}

fn totals_row(screen: &str) -> &str {
    screen
        .lines()
        .find(|line| line.starts_with("Total"))
        .unwrap_or_else(|| panic!("no totals row in:\n{screen}"))
}

fn assert_pending_totals(screen: &str) {
    let mut words = totals_row(screen).split_whitespace();
    assert_eq!(words.next(), Some("Total"));
    assert!(
        words.all(|word| word == "pending"),
        "totals row showed an aggregate early:\n{screen}"
    );
}

#[test]
fn totals_stay_pending_until_every_cell_is_done() {
    let registry = ProgressRegistry::new();
    let capture = CaptureBuffer::new();
    attach(&registry, &capture, layout());
    register_grid(&registry);

    let cells = grid();
    for (done, (row, column, passes, cost)) in cells.iter().enumerate() {
        for turn in 1..=10 {
            registry
                .update(row, column, turn, CellStatus::Generating)
                .unwrap();
        }
        for iteration in 1..=10 {
            registry
                .update(row, column, iteration, CellStatus::Evaluating)
                .unwrap();
            assert_pending_totals(&canonicalize(&capture.contents(), COLS, ROWS));
        }

        registry.set_result(row, column, *passes, 10, *cost).unwrap();
        let screen = canonicalize(&capture.contents(), COLS, ROWS);
        if done + 1 < cells.len() {
            assert_pending_totals(&screen);
        } else {
            assert!(totals_row(&screen).starts_with("Total 30/40 (75%)"));
        }
    }
    assert!(registry.close_observer());
}

#[test]
fn concurrent_workers_never_show_partial_totals() {
    let registry = ProgressRegistry::new();
    let capture = CaptureBuffer::new();
    attach(&registry, &capture, layout());
    register_grid(&registry);

    let passes = [3u32, 5, 7, 9];
    thread::scope(|scope| {
        for ((row, column, _, _), passes) in grid().into_iter().zip(passes) {
            let registry = &registry;
            scope.spawn(move || {
                for turn in 1..=10 {
                    registry
                        .update(&row, &column, turn, CellStatus::Generating)
                        .unwrap();
                }
                for iteration in 0..=10 {
                    registry
                        .update(&row, &column, iteration, CellStatus::Evaluating)
                        .unwrap();
                }
                registry
                    .set_result(&row, &column, passes, 10, 0.5)
                    .unwrap();
            });
        }
    });
    assert!(registry.close_observer());

    let bytes = capture.contents();
    let screens = replay_frames(&bytes, COLS, ROWS);
    assert_eq!(screens.len(), count_frames(&bytes));
    let (last, earlier) = screens.split_last().unwrap();
    assert!(totals_row(last).starts_with("Total 24/40 (60%)"));
    for screen in earlier {
        let row = totals_row(screen);
        if !row.starts_with("Total 24/40 (60%)") {
            assert_pending_totals(screen);
        }
    }
}

#[test]
fn sequential_dashboards_share_a_stream_without_overwriting() {
    let capture = CaptureBuffer::new();

    let first = ProgressRegistry::new();
    attach(&first, &capture, layout());
    first.register(RowKey::new("alpha"), ColumnKey::new("only"), 4);
    first
        .update(&RowKey::new("alpha"), &ColumnKey::new("only"), 2, CellStatus::Generating)
        .unwrap();
    first
        .set_result(&RowKey::new("alpha"), &ColumnKey::new("only"), 4, 4, 0.5)
        .unwrap();
    assert!(first.close_observer());
    let first_screen = canonicalize(&capture.contents(), COLS, ROWS);

    let second = ProgressRegistry::new();
    attach(&second, &capture, layout());
    second.register(RowKey::new("beta"), ColumnKey::new("only"), 4);
    second
        .update(&RowKey::new("beta"), &ColumnKey::new("only"), 3, CellStatus::Generating)
        .unwrap();
    second
        .set_result(&RowKey::new("beta"), &ColumnKey::new("only"), 1, 4, 0.25)
        .unwrap();
    assert!(second.close_observer());

    let screen = canonicalize(&capture.contents(), COLS, ROWS);
    assert!(screen.starts_with(&first_screen), "first dashboard was overwritten:\n{screen}");
    let rest = &screen[first_screen.len()..];
    assert!(rest.lines().any(|line| line.starts_with("Test case")));
    assert!(rest.lines().any(|line| line.starts_with("beta")));
    assert!(rest.lines().any(|line| line.starts_with("Total 1/4 (25%)")));
    assert!(!rest.contains("alpha"));
}

fn run_grid(color: bool) -> String {
    let registry = ProgressRegistry::new();
    let capture = CaptureBuffer::new();
    attach(&registry, &capture, layout().with_color(color));
    register_grid(&registry);
    for (row, column, passes, cost) in grid() {
        registry
            .update(&row, &column, 6, CellStatus::Evaluating)
            .unwrap();
        registry.set_result(&row, &column, passes, 10, cost).unwrap();
    }
    assert!(registry.close_observer());
    canonicalize(&capture.contents(), COLS, ROWS)
}

#[test]
fn final_dashboard_matches_snapshot() {
    let screen = run_grid(false);
    assert_snapshot!("dashboard_final", &screen);
}

#[test]
fn color_does_not_change_screen_text() {
    assert_eq!(run_grid(true), run_grid(false));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever order the cells finish in, no frame shows a partial total.
    #[test]
    fn completion_order_never_leaks_partial_totals(
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        passes in prop::collection::vec(0u32..=10, 4),
    ) {
        let registry = ProgressRegistry::new();
        let capture = CaptureBuffer::new();
        attach(&registry, &capture, layout());
        register_grid(&registry);

        let cells = grid();
        for &idx in &order {
            let (row, column, _, _) = &cells[idx];
            registry.update(row, column, 3, CellStatus::Evaluating).unwrap();
            registry.set_result(row, column, passes[idx], 10, 0.1).unwrap();
        }
        prop_assert!(registry.close_observer());

        let sum: u32 = passes.iter().sum();
        let pct = (f64::from(sum) * 100.0 / 40.0).round();
        let expected = format!("Total {sum}/40 ({pct:.0}%)");
        let screens = replay_frames(&capture.contents(), COLS, ROWS);
        let (last, earlier) = screens.split_last().unwrap();
        prop_assert!(totals_row(last).starts_with(&expected));
        for screen in earlier {
            if !totals_row(screen).starts_with(&expected) {
                assert_pending_totals(screen);
            }
        }
    }
}

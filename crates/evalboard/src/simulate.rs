#![forbid(unsafe_code)]

//! Synthetic evaluation batch for the `evalboard` binary.
//!
//! Generators sleep a jittered amount per turn and report progress; each
//! evaluation iteration passes with a fixed per-variant probability. All
//! randomness comes from an xorshift64 stream seeded from `--seed` and the
//! job's position, so a given command line always produces the same report.

use std::thread;
use std::time::Duration;

use evalboard_core::{CellStatus, ColumnKey, RowKey};
use evalboard_runtime::{CasePlan, ConversationPlan, JobError, Transcript, Verdict};
use serde::Serialize;

use crate::cli::Opts;

/// Scenario names cycled through for test cases.
pub const SCENARIOS: &[&str] = &[
    "greet_traveler",
    "haggle_over_price",
    "refuse_dangerous_quest",
    "share_village_rumor",
    "guard_the_city_gate",
];

/// Variant names, in order; later variants are numbered.
pub const VARIANTS: &[&str] = &["baseline", "tuned", "memory", "terse"];

/// Simulated generation cost per turn, in dollars.
const TURN_COST: f64 = 0.0035;

/// Simulated judge cost per evaluation, in dollars.
const EVAL_COST: f64 = 0.0012;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimTranscript {
    pub turns: u32,
    pub cost: f64,
}

impl Transcript for SimTranscript {
    fn cost(&self) -> f64 {
        self.cost
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimVerdict {
    pub passed: bool,
    pub cost: f64,
}

impl Verdict for SimVerdict {
    fn passed(&self) -> bool {
        self.passed
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}

/// Error raised by a generator selected with `--fail-at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedFailure {
    pub turn: u32,
}

impl std::fmt::Display for SimulatedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "simulated upstream failure at turn {}", self.turn)
    }
}

impl std::error::Error for SimulatedFailure {}

/// xorshift64 stream.
#[derive(Debug, Clone)]
struct Jitter(u64);

impl Jitter {
    fn new(seed: u64, parts: &[u64]) -> Self {
        let mut state = seed.wrapping_add(1);
        for &part in parts {
            state = state
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(part.wrapping_add(1));
        }
        Self(state.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Value in `0..bound`; `bound` must be non-zero.
    fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// Row label of case `index`.
#[must_use]
pub fn case_key(index: usize) -> RowKey {
    let name = SCENARIOS[index % SCENARIOS.len()];
    let round = index / SCENARIOS.len();
    if round == 0 {
        RowKey::new(name)
    } else {
        RowKey::with_case(name, u32::try_from(round + 1).unwrap_or(u32::MAX))
    }
}

/// Column label of variant `index`.
#[must_use]
pub fn variant_key(index: usize) -> ColumnKey {
    match VARIANTS.get(index) {
        Some(name) => ColumnKey::new(*name),
        None => ColumnKey::new(format!("variant_{}", index + 1)),
    }
}

/// Pass probability, in percent, of variant `index`.
fn pass_rate(index: usize) -> u64 {
    [55, 85, 70, 40].get(index).copied().unwrap_or(60)
}

/// Build the batch described by `opts`.
#[must_use]
pub fn plans(opts: &Opts) -> Vec<CasePlan<SimTranscript, SimVerdict>> {
    (0..opts.cases)
        .map(|case| {
            let mut plan = CasePlan::new(case_key(case));
            for variant in 0..opts.variants {
                plan = plan.with_conversation(conversation(opts, case, variant));
            }
            plan
        })
        .collect()
}

fn conversation(
    opts: &Opts,
    case: usize,
    variant: usize,
) -> ConversationPlan<SimTranscript, SimVerdict> {
    let key = variant_key(variant);
    let turns = opts.turns;
    let turn_ms = opts.turn_ms;
    let fails = opts
        .fail_at
        .as_ref()
        .is_some_and(|f| f.case == case && f.variant == key.as_str());
    let mut jitter = Jitter::new(opts.seed, &[case as u64, variant as u64]);

    let mut plan = ConversationPlan::new(key, turns, move |progress| {
        for turn in 1..=turns {
            if turn_ms > 0 {
                thread::sleep(Duration::from_millis(turn_ms / 2 + jitter.below(turn_ms + 1)));
            }
            if fails && turn * 2 > turns {
                return Err(Box::new(SimulatedFailure { turn }) as JobError);
            }
            progress.report(turn, turns, CellStatus::Generating)?;
        }
        Ok(SimTranscript {
            turns,
            cost: f64::from(turns) * TURN_COST,
        })
    });

    for iteration in 0..opts.iterations {
        let mut jitter = Jitter::new(
            opts.seed,
            &[case as u64, variant as u64, u64::from(iteration) + 1_000],
        );
        let rate = pass_rate(variant);
        plan = plan.with_evaluation(move |transcript: &SimTranscript, _| {
            if turn_ms > 0 {
                thread::sleep(Duration::from_millis(
                    turn_ms + jitter.below(turn_ms * 2 + 1),
                ));
            }
            Ok(SimVerdict {
                passed: jitter.below(100) < rate,
                cost: EVAL_COST * f64::from(transcript.turns.max(1)),
            })
        });
    }
    plan
}

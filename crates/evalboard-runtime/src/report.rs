#![forbid(unsafe_code)]

//! Hierarchical run report: cases → conversations → iterations.
//!
//! Every level is stored in submission order, so two runs over the same
//! plans produce identical reports however the threads interleave.

use serde::Serialize;

/// Generation output. The scheduler only needs its cost.
pub trait Transcript: Send {
    fn cost(&self) -> f64;
}

/// Evaluation output for one iteration.
pub trait Verdict: Send {
    fn passed(&self) -> bool;
    fn cost(&self) -> f64;
}

/// Aggregate of one conversation's iterations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConversationSummary {
    pub passes: u32,
    pub total_evals: u32,
    /// Generation cost plus every iteration's cost.
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationReport<V> {
    pub index: usize,
    pub verdict: V,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationReport<T, V> {
    pub conversation: String,
    pub transcript: T,
    pub iterations: Vec<IterationReport<V>>,
    pub summary: ConversationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport<T, V> {
    pub case: String,
    pub conversations: Vec<ConversationReport<T, V>>,
}

impl<T, V> CaseReport<T, V> {
    #[must_use]
    pub fn passes(&self) -> u32 {
        self.conversations.iter().map(|c| c.summary.passes).sum()
    }

    #[must_use]
    pub fn total_evals(&self) -> u32 {
        self.conversations.iter().map(|c| c.summary.total_evals).sum()
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        self.conversations.iter().map(|c| c.summary.cost).sum()
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<T, V> {
    pub cases: Vec<CaseReport<T, V>>,
}

impl<T, V> Report<T, V> {
    #[must_use]
    pub fn passes(&self) -> u32 {
        self.cases.iter().map(CaseReport::passes).sum()
    }

    #[must_use]
    pub fn total_evals(&self) -> u32 {
        self.cases.iter().map(CaseReport::total_evals).sum()
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cases.iter().map(CaseReport::cost).sum()
    }
}

impl<T: Serialize, V: Serialize> Report<T, V> {
    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(name: &str, passes: u32, total: u32, cost: f64) -> ConversationReport<(), bool> {
        ConversationReport {
            conversation: name.to_string(),
            transcript: (),
            iterations: (0..total as usize)
                .map(|index| IterationReport {
                    index,
                    verdict: (index as u32) < passes,
                })
                .collect(),
            summary: ConversationSummary {
                passes,
                total_evals: total,
                cost,
            },
        }
    }

    fn report() -> Report<(), bool> {
        Report {
            cases: vec![
                CaseReport {
                    case: "greet".into(),
                    conversations: vec![conversation("a", 2, 3, 0.5), conversation("b", 1, 3, 0.25)],
                },
                CaseReport {
                    case: "haggle".into(),
                    conversations: vec![conversation("a", 3, 3, 1.0)],
                },
            ],
        }
    }

    #[test]
    fn summaries_fold_up() {
        let report = report();
        assert_eq!(report.cases[0].passes(), 3);
        assert_eq!(report.passes(), 6);
        assert_eq!(report.total_evals(), 9);
        assert!((report.cost() - 1.75).abs() < 1e-9);
    }

    #[test]
    fn json_keeps_submission_order() {
        let json = report().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cases"][0]["case"], "greet");
        assert_eq!(value["cases"][0]["conversations"][1]["conversation"], "b");
        assert_eq!(value["cases"][1]["conversations"][0]["summary"]["passes"], 3);
        assert_eq!(
            value["cases"][0]["conversations"][0]["iterations"][2]["verdict"],
            false
        );
    }
}

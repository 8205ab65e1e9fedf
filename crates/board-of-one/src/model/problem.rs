//! The user-supplied decision problem (spec §3).

use serde::{Deserialize, Serialize};

/// The user-supplied decision problem. Immutable after intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// The decision statement as supplied by the caller.
    pub statement: String,
    /// Optional freeform context (constraints, prior decisions, numbers).
    pub context: Option<String>,
    /// Complexity score in `[0, 1]`, produced by the complexity assessor.
    pub complexity: f64,
    /// Recommended round budget (3-10), from the complexity assessor.
    pub recommended_round_budget: u32,
    /// Recommended expert count (3-5), from the complexity assessor.
    pub recommended_expert_count: u32,
}

impl Problem {
    /// Construct a problem from raw intake text and a completed complexity
    /// assessment. Panics are never used here: callers are expected to
    /// clamp `complexity` themselves via [`crate::agents::complexity_assessor`].
    #[must_use]
    pub fn new(
        statement: impl Into<String>,
        context: Option<String>,
        complexity: f64,
        recommended_round_budget: u32,
        recommended_expert_count: u32,
    ) -> Self {
        Self {
            statement: statement.into(),
            context,
            complexity: complexity.clamp(0.0, 1.0),
            recommended_round_budget,
            recommended_expert_count,
        }
    }
}

//! Minimal, valid building blocks for unit tests across the crate.

use crate::model::{
    Contribution, CostAccumulator, DeliberationState, KillFlags, Phase, Problem, QualityMetrics,
    SubProblem, SubProblemStatus,
};
use chrono::Utc;
use std::collections::BTreeSet;

/// A single, minimal sub-problem with no dependencies.
#[must_use]
pub fn sample_sub_problem() -> SubProblem {
    SubProblem {
        id: "sp1".to_string(),
        goal: "decide whether to expand".to_string(),
        context: None,
        complexity: 0.3,
        dependencies: BTreeSet::new(),
        status: SubProblemStatus::Active,
        index: 0,
        key_questions: vec![],
        risks: vec![],
        alternatives: vec![],
        required_expertise: vec![],
        success_criteria: vec![],
        rationale: String::new(),
    }
}

/// A fully-populated, valid [`DeliberationState`] at the start of round 1 of
/// a single sub-problem, suitable as a base for checkpoint, safety, and
/// quality-scoring unit tests.
#[must_use]
pub fn sample_state() -> DeliberationState {
    DeliberationState {
        session_id: "session-1".to_string(),
        problem: Problem::new("should we expand to the EU?", None, 0.4, 5, 4),
        personas: None,
        sub_problems: vec![sample_sub_problem()],
        current_sub_problem_index: 0,
        transcript: Vec::new(),
        round_summaries: Vec::new(),
        expert_memory: Default::default(),
        current_roster: vec!["cfo".to_string(), "cto".to_string(), "coo".to_string()],
        quality_metrics: QualityMetrics::default(),
        round_number: 1,
        max_rounds: 5,
        min_rounds: 3,
        phase: Phase::Exploration,
        facilitator_decision: None,
        sub_problem_results: Vec::new(),
        cost: CostAccumulator::default(),
        sub_problem_started_unix_secs: 0,
        step_count: 0,
        kill_flags: KillFlags::default(),
        recent_cycle_signatures: Vec::new(),
        last_checkpoint_id: None,
        event_sequence: 0,
        researcher_calls_this_subproblem: 0,
        moderators_used_this_subproblem: Vec::new(),
    }
}

/// A contribution carrying a raw embedding vector, for quality-scoring and
/// deduplication tests that don't need a real [`crate::embeddings::EmbeddingService`].
#[must_use]
pub fn contribution_with_embedding(persona_code: &str, embedding: Vec<f32>) -> Contribution {
    Contribution {
        persona_code: Some(persona_code.to_string()),
        content: format!("{persona_code} contribution"),
        round: 1,
        sub_problem_index: 0,
        embedding: Some(embedding),
        thinking: None,
        recommendation: None,
        references: vec![],
        insertion_index: 0,
        timestamp: Utc::now(),
    }
}

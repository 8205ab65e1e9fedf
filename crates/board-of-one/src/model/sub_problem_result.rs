//! Results carried out of a completed sub-problem (spec §3).

use crate::model::vote::VoteDistribution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a sub-problem stopped before exhausting `max_rounds` on its own terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyStopReason {
    /// `max_rounds` was reached (hard cap), regardless of scores.
    MaxRoundsReached,
    /// Wall-clock timeout forced a vote.
    Timeout,
    /// Cost kill switch forced a partial result.
    Budget,
    /// A user or admin kill was observed.
    Killed,
    /// The cycle detector forced progression.
    Cycle,
}

/// Everything a sub-problem produced, carried into meta-synthesis and the
/// final `SessionResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubProblemResult {
    /// Which sub-problem this result belongs to.
    pub sub_problem_id: String,
    /// Distinct options/recommendations surfaced during deliberation.
    pub options_surfaced: Vec<String>,
    /// Aggregated vote distribution.
    pub vote_distribution: VoteDistribution,
    /// Narrative synthesis for this sub-problem.
    pub synthesis: String,
    /// Quality metric snapshot at the time of synthesis.
    pub quality_metrics: QualityMetricsSnapshot,
    /// How many rounds were actually used.
    pub rounds_used: u32,
    /// If the sub-problem ended early, why.
    pub early_stop_reason: Option<EarlyStopReason>,
    /// Whether this result reflects a full, complete deliberation (false for
    /// a partial result emitted by a safety mechanism).
    pub complete: bool,
    /// Expert memory carried forward to later sub-problems.
    pub expert_memory: BTreeMap<String, String>,
}

/// A point-in-time snapshot of the quality metrics (see [`crate::quality`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetricsSnapshot {
    /// Mean pairwise cosine similarity of recent contributions, in `[0, 1]`.
    pub convergence: f64,
    /// Average `1 - max_similarity` of a round against all prior, in `[0, 1]`.
    pub novelty: f64,
    /// Share of recent contributions judged on-topic, in `[0, 1]`.
    pub focus: f64,
    /// Mean of aspect coverage classifications, in `[0, 1]`.
    pub exploration: f64,
    /// Heuristic conflict/tension level, in `[0, 1]`.
    pub conflict: f64,
}

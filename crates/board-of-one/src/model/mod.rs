//! The data model (spec §3): the types threaded through every node, plus
//! the values each agent reads and writes.

pub mod contribution;
pub mod persona;
pub mod problem;
pub mod round_summary;
pub mod state;
pub mod sub_problem;
pub mod sub_problem_result;
pub mod vote;

pub use contribution::{transcript_sort_key, Contribution};
pub use persona::{Persona, PersonaCatalog, Perspective, TraitVector};
pub use problem::Problem;
pub use round_summary::RoundSummary;
pub use state::{
    CostAccumulator, DeliberationState, FacilitatorAction, FacilitatorDecision, KillFlags,
    ModeratorVariant, Phase, QualityMetrics,
};
pub use sub_problem::{topological_order, SubProblem, SubProblemId, SubProblemStatus};
pub use sub_problem_result::{EarlyStopReason, QualityMetricsSnapshot, SubProblemResult};
pub use vote::{Confidence, Vote, VoteDistribution};

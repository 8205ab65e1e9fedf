//! `DeliberationState`: the single value threaded through every graph node
//! (spec §3). Nodes are pure functions `(state) -> state_delta`; the graph
//! driver applies the delta and checkpoints the result before the router
//! picks the next node — see [`crate::graph`].

use crate::model::contribution::Contribution;
use crate::model::persona::PersonaCatalog;
use crate::model::problem::Problem;
use crate::model::round_summary::RoundSummary;
use crate::model::sub_problem::SubProblem;
use crate::model::sub_problem_result::SubProblemResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Which phase of a sub-problem's deliberation is active. Determined purely
/// by round position within `max_rounds` (spec glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Rounds 1..=ceil(max_rounds/3): surface new perspectives, challenge assumptions.
    Exploration,
    /// Middle third: must disagree or introduce new evidence.
    Challenge,
    /// Final third: state strongest recommendation and key risk.
    Convergence,
}

impl Phase {
    /// Determine the phase for a given round number (1-based) within a
    /// sub-problem's `max_rounds` budget.
    #[must_use]
    pub fn for_round(round: u32, max_rounds: u32) -> Self {
        let max_rounds = max_rounds.max(1);
        let third = (f64::from(max_rounds) / 3.0).ceil() as u32;
        let third = third.max(1);
        if round <= third {
            Self::Exploration
        } else if round <= 2 * third {
            Self::Challenge
        } else {
            Self::Convergence
        }
    }

    /// Phase-specific instruction appended to each expert's round prompt
    /// (spec §4.8 "Phase-specific public-prompt semantics").
    #[must_use]
    pub fn prompt_instruction(self) -> &'static str {
        match self {
            Self::Exploration => {
                "Surface new perspectives and risks; challenge assumptions; \
                 do not restate agreement without offering new information."
            }
            Self::Challenge => {
                "You must either disagree with a specific prior claim or introduce \
                 novel evidence; do not merely restate an earlier position."
            }
            Self::Convergence => {
                "State your strongest recommendation, the key risk, and why it \
                 outweighs the alternatives."
            }
        }
    }

    /// Target number of experts to select for a round in this phase
    /// (spec §4.8 step 1: exploration 3-5, challenge 2-3, convergence 2-3).
    #[must_use]
    pub fn expert_count_range(self) -> (usize, usize) {
        match self {
            Self::Exploration => (3, 5),
            Self::Challenge => (2, 3),
            Self::Convergence => (2, 3),
        }
    }
}

/// The tagged facilitator action, exhaustively handled by the router
/// (spec §9 redesign flag: avoid string-typed action tags).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FacilitatorAction {
    /// Run another parallel round with the named speakers and a targeted prompt.
    Continue {
        /// Personas selected to speak next round.
        next_speakers: Vec<String>,
        /// Facilitator's targeted prompt addition for this round.
        prompt: String,
    },
    /// Transition to voting.
    Vote,
    /// Issue a single-shot researcher call.
    Research {
        /// The specific query to research.
        query: String,
    },
    /// Insert a moderator contribution.
    Moderator {
        /// Which moderator variant to invoke.
        variant: ModeratorVariant,
    },
}

/// Moderator persona variants (spec §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeratorVariant {
    /// Challenges premature consensus.
    Contrarian,
    /// Challenges unsupported absolute claims.
    Skeptic,
    /// Counters sustained deadlock/negativity.
    Optimist,
}

impl ModeratorVariant {
    /// Persona code used to tag a moderator's contribution in the transcript.
    #[must_use]
    pub fn persona_code(self) -> &'static str {
        match self {
            Self::Contrarian => "moderator:contrarian",
            Self::Skeptic => "moderator:skeptic",
            Self::Optimist => "moderator:optimist",
        }
    }
}

/// The facilitator's decision for the round just concluded, carried in state
/// for event emission and for the next node's routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitatorDecision {
    /// The chosen action.
    pub action: FacilitatorAction,
    /// Why the facilitator (or an override rule) chose this action.
    pub reasoning: String,
    /// True if a pre-LLM override rule (not the facilitator model) produced this decision.
    pub was_override: bool,
}

/// Running quality metrics for the active sub-problem (spec §3 invariant 5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean pairwise cosine similarity of recent contributions, in `[0, 1]`.
    pub convergence: f64,
    /// Average `1 - max_similarity` of the latest round vs. all prior, in `[0, 1]`.
    pub novelty: f64,
    /// Share of recent contributions judged on-topic, in `[0, 1]`.
    pub focus: f64,
    /// Mean aspect-coverage score from the judge, in `[0, 1]`.
    pub exploration: f64,
    /// Heuristic tension/disagreement level, in `[0, 1]`.
    pub conflict: f64,
    /// Per-expert novelty: mean similarity of an expert's own recent
    /// contributions to their own prior ones (low = repeating themselves).
    pub expert_novelty: BTreeMap<String, f64>,
    /// Aspects the judge classified as `none` coverage on the latest round.
    pub missing_critical_aspects: Vec<String>,
}

/// Edge-triggered kill flags checked at every node entry and suspension point
/// (spec §5 "Cancellation").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillFlags {
    /// Set by an external caller via `kill()`.
    pub user: bool,
    /// Set by an administrative operator.
    pub admin: bool,
    /// Set internally once the cost ceiling is exceeded.
    pub budget: bool,
    /// Set internally once the wall-clock ceiling is exceeded.
    pub timeout: bool,
    /// Set internally once the recursion/step cap is exceeded.
    pub recursion: bool,
}

impl KillFlags {
    /// True if any flag is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.user || self.admin || self.budget || self.timeout || self.recursion
    }
}

/// Cost accumulated so far, broken down by phase, for `SessionMetrics` and
/// the cost kill switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostAccumulator {
    /// Total cost (USD) spent so far this session.
    pub total_usd: f64,
    /// Cost spent so far for the active sub-problem.
    pub current_sub_problem_usd: f64,
    /// Cost broken down by phase label (e.g. "decompose", "parallel_round", "synthesis").
    pub by_phase_usd: BTreeMap<String, f64>,
    /// Total input tokens consumed.
    pub tokens_in: u64,
    /// Total output tokens produced.
    pub tokens_out: u64,
    /// Number of broker calls that hit a prompt cache.
    pub cache_hits: u64,
    /// Total broker calls made.
    pub total_calls: u64,
}

impl CostAccumulator {
    /// Record one broker call's cost and usage.
    pub fn record(&mut self, phase: &str, usd: f64, tokens_in: u64, tokens_out: u64, cache_hit: bool) {
        self.total_usd += usd;
        self.current_sub_problem_usd += usd;
        *self.by_phase_usd.entry(phase.to_string()).or_insert(0.0) += usd;
        self.tokens_in += tokens_in;
        self.tokens_out += tokens_out;
        self.total_calls += 1;
        if cache_hit {
            self.cache_hits += 1;
        }
    }

    /// Reset the per-sub-problem cost counter when moving to the next sub-problem.
    pub fn reset_sub_problem(&mut self) {
        self.current_sub_problem_usd = 0.0;
    }

    /// Cache hit rate across all calls so far, in `[0, 1]`.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_calls as f64
        }
    }
}

/// The single evolving value threaded through every graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliberationState {
    /// Unique session identifier.
    pub session_id: String,
    /// The immutable problem statement.
    pub problem: Problem,
    /// Selected personas available across the whole session (the superset
    /// from which each sub-problem's roster is drawn).
    #[serde(skip)]
    pub personas: Option<PersonaCatalog>,
    /// All sub-problems, in decomposer order.
    pub sub_problems: Vec<SubProblem>,
    /// Index into `sub_problems` of the one currently active.
    pub current_sub_problem_index: usize,
    /// Append-only transcript for the *current* sub-problem only; completed
    /// sub-problems' transcripts are not retained in state (their
    /// [`SubProblemResult`] is), keeping checkpoint size bounded.
    pub transcript: Vec<Contribution>,
    /// Round summaries for the current sub-problem.
    pub round_summaries: Vec<RoundSummary>,
    /// Expert memory carried over from completed sub-problems, by persona code.
    pub expert_memory: BTreeMap<String, String>,
    /// Roster selected for the current sub-problem (persona codes).
    pub current_roster: Vec<String>,
    /// Running quality metrics for the current sub-problem.
    pub quality_metrics: QualityMetrics,
    /// Current round number (monotonically increasing per sub-problem; never
    /// reused across sub-problems, per invariant 3).
    pub round_number: u32,
    /// Effective max rounds for the current sub-problem.
    pub max_rounds: u32,
    /// Effective min rounds for the current sub-problem.
    pub min_rounds: u32,
    /// Current phase.
    pub phase: Phase,
    /// The most recent facilitator decision, if any.
    pub facilitator_decision: Option<FacilitatorDecision>,
    /// Results accumulated for completed sub-problems, in completion order.
    pub sub_problem_results: Vec<SubProblemResult>,
    /// Cost/token accounting.
    pub cost: CostAccumulator,
    /// Wall-clock start of the current sub-problem, as seconds since the
    /// Unix epoch (avoids `Instant`, which isn't `Serialize`).
    pub sub_problem_started_unix_secs: u64,
    /// Number of graph steps executed so far this session (recursion guard).
    pub step_count: u64,
    /// Kill flags.
    pub kill_flags: KillFlags,
    /// Last few `(node, roster, round)` signatures, for the cycle detector.
    pub recent_cycle_signatures: Vec<String>,
    /// Id of the last checkpoint written for this session.
    pub last_checkpoint_id: Option<String>,
    /// Monotonic per-session event sequence counter.
    pub event_sequence: u64,
    /// Number of researcher calls made so far for the current sub-problem.
    pub researcher_calls_this_subproblem: u32,
    /// Which moderator variants have already fired for the current sub-problem.
    pub moderators_used_this_subproblem: Vec<ModeratorVariant>,
}

impl DeliberationState {
    /// Elapsed wall-clock time for the current sub-problem, given "now" as
    /// seconds since epoch (caller supplies `now` so this stays a pure
    /// function of its inputs, with no hidden `SystemTime::now()` call deep
    /// inside a pure node).
    #[must_use]
    pub fn sub_problem_elapsed(&self, now_unix_secs: u64) -> Duration {
        Duration::from_secs(now_unix_secs.saturating_sub(self.sub_problem_started_unix_secs))
    }

    /// The sub-problem currently active, if any.
    #[must_use]
    pub fn current_sub_problem(&self) -> Option<&SubProblem> {
        self.sub_problems.get(self.current_sub_problem_index)
    }

    /// Contributions from the current transcript attributed to a given
    /// persona (excludes system/researcher entries automatically since those
    /// carry `persona_code: None`).
    pub fn contributions_by(&self, persona_code: &str) -> impl Iterator<Item = &Contribution> {
        self.transcript
            .iter()
            .filter(move |c| c.persona_code.as_deref() == Some(persona_code))
    }

    /// Non-system contributions only, used for share/rotation accounting
    /// (spec §9: researcher output excluded from dominance share).
    pub fn expert_contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.transcript.iter().filter(|c| !c.is_system())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_boundaries_for_ten_rounds() {
        // max_rounds=10 -> third = ceil(10/3) = 4
        assert_eq!(Phase::for_round(1, 10), Phase::Exploration);
        assert_eq!(Phase::for_round(4, 10), Phase::Exploration);
        assert_eq!(Phase::for_round(5, 10), Phase::Challenge);
        assert_eq!(Phase::for_round(8, 10), Phase::Challenge);
        assert_eq!(Phase::for_round(9, 10), Phase::Convergence);
        assert_eq!(Phase::for_round(10, 10), Phase::Convergence);
    }

    #[test]
    fn phase_boundaries_for_three_rounds() {
        assert_eq!(Phase::for_round(1, 3), Phase::Exploration);
        assert_eq!(Phase::for_round(2, 3), Phase::Challenge);
        assert_eq!(Phase::for_round(3, 3), Phase::Convergence);
    }

    #[test]
    fn kill_flags_any() {
        let mut flags = KillFlags::default();
        assert!(!flags.any());
        flags.budget = true;
        assert!(flags.any());
    }

    #[test]
    fn cost_accumulator_tracks_phases_and_cache_rate() {
        let mut cost = CostAccumulator::default();
        cost.record("parallel_round", 0.01, 100, 50, true);
        cost.record("parallel_round", 0.02, 200, 80, false);
        assert!((cost.total_usd - 0.03).abs() < 1e-9);
        assert_eq!(cost.by_phase_usd["parallel_round"], cost.total_usd);
        assert!((cost.cache_hit_rate() - 0.5).abs() < 1e-9);
    }
}

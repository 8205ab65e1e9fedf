//! Shared numeric constants.
//!
//! Kept in one place so thresholds referenced from several modules (quality
//! scoring, dedup, rotation) can't silently drift apart, mirroring how
//! `dashflow::constants` centralizes magnitude constants used across its
//! anomaly-detection and cost-accounting modules.

/// Default similarity threshold above which a new contribution is dropped as
/// repetitive (spec §4.3, §9 open question — single configurable value).
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.80;

/// Similarity at or above which two contributions are considered near-identical.
pub const NEAR_IDENTICAL_THRESHOLD: f32 = 0.90;

/// Minimum rounds before a sub-problem may be marked complete.
pub const DEFAULT_MIN_ROUNDS: u32 = 3;

/// Hard cap on rounds per sub-problem regardless of scores.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Exploration score required before VOTE is reachable.
pub const DEFAULT_EXPLORATION_THRESHOLD: f64 = 0.60;

/// Focus score floor used by the router's stricter VOTE conjunction.
pub const DEFAULT_FOCUS_THRESHOLD: f64 = 0.50;

/// Convergence level considered consensus for reporting purposes.
pub const DEFAULT_CONVERGENCE_VOTE_THRESHOLD: f64 = 0.70;

/// Default maximum share of total contributions a single expert may hold.
pub const DEFAULT_DOMINANCE_SHARE_MAX: f64 = 0.25;

/// Maximum back-to-back contributions from one expert.
pub const DEFAULT_CONSECUTIVE_SPEAKER_MAX: u32 = 3;

/// Hard cap on graph steps per session (recursion guard).
pub const DEFAULT_MAX_STEPS: u64 = 200;

/// Default wall-clock budget per sub-problem, in seconds.
pub const DEFAULT_MAX_DURATION_PER_SUBPROBLEM_SECS: u64 = 180;

/// Default cost ceiling for an entire session, in USD.
pub const DEFAULT_MAX_COST_PER_SESSION: f64 = 1.00;

/// Default cost ceiling per sub-problem, in USD.
pub const DEFAULT_MAX_COST_PER_SUBPROBLEM: f64 = 0.15;

/// Default checkpoint time-to-live, in days.
pub const DEFAULT_CHECKPOINT_TTL_DAYS: u64 = 7;

/// Public-statement token ceiling per contribution (spec §4.8 step 2).
pub const CONTRIBUTION_TOKEN_CEILING: usize = 80;

/// Moderator contribution token ceiling (spec §4.12).
pub const MODERATOR_TOKEN_CEILING: usize = 100;

/// Round summary target length range, in tokens.
pub const ROUND_SUMMARY_TOKEN_RANGE: (usize, usize) = (100, 150);

/// Per-persona memory snippet target length range, in tokens.
pub const EXPERT_MEMORY_TOKEN_RANGE: (usize, usize) = (50, 100);

/// Target hierarchical-context size fed to synthesis, in tokens.
pub const SYNTHESIS_CONTEXT_TARGET_TOKENS: usize = 1_200;

/// Same synthesis input expressed naively (full transcript), for comparison/tests.
pub const SYNTHESIS_CONTEXT_NAIVE_TOKENS: usize = 3_500;

/// Number of times the same cycle signature may recur before the safety
/// layer forces progression.
pub const CYCLE_DETECTOR_REPEAT_LIMIT: u32 = 3;

/// Hard per-sub-problem cap on researcher calls.
pub const DEFAULT_RESEARCHER_CALL_LIMIT: u32 = 2;

/// Tolerance added to `dominance_share_max` when checking a *completed*
/// sub-problem's final share (one round's worth of contributions can tip a
/// freshly-under-threshold expert slightly over before the next round's
/// exclusion takes effect).
pub const DOMINANCE_ONE_ROUND_TOLERANCE: f64 = 0.08;

/// Window (in rounds) over which "every roster member participates at least
/// once" and "no one exceeds 50% of recent rounds" are evaluated.
pub const PARTICIPATION_WINDOW_ROUNDS: usize = 4;

/// Per-expert novelty floor; below this over an expert's last two turns they
/// are excluded until memory reset or moderator intervention.
pub const EXPERT_NOVELTY_FLOOR: f64 = 0.4;

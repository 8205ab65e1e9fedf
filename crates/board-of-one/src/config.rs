//! Session configuration.
//!
//! `Config` carries every named option from the CLI/config surface
//! (spec §6) with the documented defaults. `Options` is the per-call
//! override passed to [`crate::session::SessionManager::start`]; it layers
//! on top of `Config` the same way DashFlow's per-request options layer on
//! top of a `ChatModelConfig`.

use crate::constants::*;
use serde::{Deserialize, Serialize};

/// Flat set of named options governing a deliberation session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hard cost ceiling for an entire session, in USD.
    pub max_cost_per_session: f64,
    /// Hard cost ceiling per sub-problem, in USD.
    pub max_cost_per_subproblem: f64,
    /// Wall-clock budget per sub-problem, in seconds.
    pub max_duration_per_subproblem_sec: u64,
    /// Hard cap on rounds per sub-problem regardless of scores.
    pub max_rounds: u32,
    /// Minimum rounds before a sub-problem may be marked complete.
    pub min_rounds: u32,
    /// Hard cap on graph steps per session (recursion guard).
    pub max_steps: u64,
    /// Checkpoint time-to-live, in days.
    pub checkpoint_ttl_days: u64,
    /// Cosine-similarity threshold above which a contribution is deduplicated.
    pub dedup_threshold: f32,
    /// Exploration score required before VOTE is reachable.
    pub exploration_threshold: f64,
    /// Focus score floor used by the router's VOTE conjunction.
    pub focus_threshold: f64,
    /// Convergence level reported as "consensus".
    pub convergence_vote_threshold: f64,
    /// Maximum share of total contributions a single expert may hold.
    pub dominance_share_max: f64,
    /// Maximum back-to-back contributions from one expert.
    pub consecutive_speaker_max: u32,
    /// Hard per-sub-problem cap on researcher calls.
    pub researcher_call_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cost_per_session: DEFAULT_MAX_COST_PER_SESSION,
            max_cost_per_subproblem: DEFAULT_MAX_COST_PER_SUBPROBLEM,
            max_duration_per_subproblem_sec: DEFAULT_MAX_DURATION_PER_SUBPROBLEM_SECS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            min_rounds: DEFAULT_MIN_ROUNDS,
            max_steps: DEFAULT_MAX_STEPS,
            checkpoint_ttl_days: DEFAULT_CHECKPOINT_TTL_DAYS,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            exploration_threshold: DEFAULT_EXPLORATION_THRESHOLD,
            focus_threshold: DEFAULT_FOCUS_THRESHOLD,
            convergence_vote_threshold: DEFAULT_CONVERGENCE_VOTE_THRESHOLD,
            dominance_share_max: DEFAULT_DOMINANCE_SHARE_MAX,
            consecutive_speaker_max: DEFAULT_CONSECUTIVE_SPEAKER_MAX,
            researcher_call_limit: DEFAULT_RESEARCHER_CALL_LIMIT,
        }
    }
}

impl Config {
    /// Start from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `max_cost_per_session`.
    #[must_use]
    pub fn with_max_cost_per_session(mut self, value: f64) -> Self {
        self.max_cost_per_session = value;
        self
    }

    /// Override `max_rounds`.
    #[must_use]
    pub fn with_max_rounds(mut self, value: u32) -> Self {
        self.max_rounds = value;
        self
    }

    /// Override `min_rounds`.
    #[must_use]
    pub fn with_min_rounds(mut self, value: u32) -> Self {
        self.min_rounds = value;
        self
    }

    /// Override `max_duration_per_subproblem_sec`.
    #[must_use]
    pub fn with_max_duration_per_subproblem_sec(mut self, value: u64) -> Self {
        self.max_duration_per_subproblem_sec = value;
        self
    }

    /// Merge a per-call [`Options`] on top of this config, producing the
    /// effective config for one session.
    #[must_use]
    pub fn apply_options(mut self, options: &Options) -> Self {
        if let Some(v) = options.max_cost {
            self.max_cost_per_session = v;
        }
        if let Some(v) = options.max_duration {
            self.max_duration_per_subproblem_sec = v;
        }
        if let Some(v) = options.min_rounds {
            self.min_rounds = v;
        }
        if let Some(v) = options.max_rounds_override {
            self.max_rounds = v;
        }
        self
    }
}

/// Per-session overrides accepted by `start()` (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    /// Override the session cost ceiling.
    pub max_cost: Option<f64>,
    /// Override the per-sub-problem wall-clock budget, in seconds.
    pub max_duration: Option<u64>,
    /// Override the minimum rounds before VOTE is reachable.
    pub min_rounds: Option<u32>,
    /// Override the hard round cap.
    pub max_rounds_override: Option<u32>,
    /// Skip the decomposer and force exactly this many sub-problems (1-5).
    pub force_sub_problem_count: Option<u32>,
    /// Use the parallel multi-expert round engine (default) vs. the serial
    /// one-expert-per-round fallback permitted for debugging (spec §9).
    #[serde(default = "default_true")]
    pub use_parallel_rounds: bool,
}

fn default_true() -> bool {
    true
}

impl Options {
    /// Validate option combinations the caller-facing API must reject.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(n) = self.force_sub_problem_count {
            if !(1..=5).contains(&n) {
                return Err(crate::Error::InvalidOptions(format!(
                    "force_sub_problem_count must be in 1..=5, got {n}"
                )));
            }
        }
        if let Some(c) = self.max_cost {
            if c <= 0.0 {
                return Err(crate::Error::InvalidOptions(
                    "max_cost must be positive".into(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_rounds, self.max_rounds_override) {
            if min > max {
                return Err(crate::Error::InvalidOptions(format!(
                    "min_rounds ({min}) must not exceed max_rounds_override ({max})"
                )));
            }
        }
        Ok(())
    }
}

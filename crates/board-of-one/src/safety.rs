//! Safety layer (spec §4.15): five concurrent enforcement mechanisms,
//! checked at node entry and after every suspension point (spec §5).

use crate::config::Config;
use crate::error::SafetyAbortKind;
use crate::model::{DeliberationState, KillFlags};
use sha2::{Digest, Sha256};

/// The outcome of one safety check pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// Nothing fired; proceed normally.
    Proceed,
    /// A soft limit fired: the current sub-problem must move to voting,
    /// but the session itself continues.
    ForceVote(SafetyAbortKind),
    /// A hard limit fired: the whole session must stop now.
    Abort(SafetyAbortKind),
}

/// Evaluate every safety mechanism against the current state. `now_unix_secs`
/// is supplied by the caller so this stays a pure function (spec §9: no
/// hidden `SystemTime::now()` inside what should be a deterministic check).
#[must_use]
pub fn check(state: &DeliberationState, config: &Config, now_unix_secs: u64) -> SafetyVerdict {
    if state.kill_flags.user || state.kill_flags.admin {
        return SafetyVerdict::Abort(SafetyAbortKind::Kill);
    }
    if state.step_count > config.max_steps {
        return SafetyVerdict::Abort(SafetyAbortKind::Recursion);
    }
    if state.cost.total_usd > config.max_cost_per_session
        || state.cost.current_sub_problem_usd > config.max_cost_per_subproblem
    {
        return SafetyVerdict::Abort(SafetyAbortKind::Budget);
    }
    if state.sub_problem_elapsed(now_unix_secs).as_secs() > config.max_duration_per_subproblem_sec
    {
        return SafetyVerdict::ForceVote(SafetyAbortKind::Timeout);
    }
    if state.round_number > config.max_rounds {
        return SafetyVerdict::ForceVote(SafetyAbortKind::Recursion);
    }
    if cycle_detected(state) {
        return SafetyVerdict::ForceVote(SafetyAbortKind::Cycle);
    }
    SafetyVerdict::Proceed
}

/// Set the corresponding flag in `flags` for an edge-triggered external
/// kill signal. Internal triggers (budget/timeout/recursion) are derived
/// from state rather than set here.
pub fn request_kill(flags: &mut KillFlags, admin: bool) {
    if admin {
        flags.admin = true;
    } else {
        flags.user = true;
    }
}

/// A signature identifying `(node, roster, round)` for the cycle detector.
/// Sha2 gives a fixed-width, collision-resistant fingerprint cheap enough
/// to compute after every round without becoming the bottleneck itself.
#[must_use]
pub fn cycle_signature(node: &str, roster: &[String], round: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node.as_bytes());
    let mut sorted = roster.to_vec();
    sorted.sort();
    for code in &sorted {
        hasher.update(code.as_bytes());
    }
    hasher.update(round.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Number of consecutive recurrences of the same signature that forces
/// progression (spec §4.15: "recurs 3x").
pub const REPEAT_LIMIT: usize = 3;

/// Push a new signature onto the rolling window and report whether it has
/// now recurred `REPEAT_LIMIT` times in a row.
pub fn cycle_detected(state: &DeliberationState) -> bool {
    let recent = &state.recent_cycle_signatures;
    if recent.len() < REPEAT_LIMIT {
        return false;
    }
    let tail = &recent[recent.len() - REPEAT_LIMIT..];
    tail.windows(2).all(|w| w[0] == w[1])
}

/// Record a new cycle signature, keeping only the trailing window needed
/// by [`cycle_detected`].
pub fn record_signature(state: &mut DeliberationState, signature: String) {
    state.recent_cycle_signatures.push(signature);
    let keep_from = state.recent_cycle_signatures.len().saturating_sub(REPEAT_LIMIT * 2);
    state.recent_cycle_signatures.drain(0..keep_from);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_state;

    #[test]
    fn budget_kill_fires_over_session_ceiling() {
        let mut state = sample_state();
        state.cost.total_usd = 2.0;
        let config = Config::default();
        assert_eq!(
            check(&state, &config, 0),
            SafetyVerdict::Abort(SafetyAbortKind::Budget)
        );
    }

    #[test]
    fn user_kill_takes_priority() {
        let mut state = sample_state();
        state.kill_flags.user = true;
        let config = Config::default();
        assert_eq!(
            check(&state, &config, 0),
            SafetyVerdict::Abort(SafetyAbortKind::Kill)
        );
    }

    #[test]
    fn timeout_forces_vote_not_abort() {
        let mut state = sample_state();
        state.sub_problem_started_unix_secs = 0;
        let config = Config::default();
        let verdict = check(&state, &config, config.max_duration_per_subproblem_sec + 1);
        assert_eq!(verdict, SafetyVerdict::ForceVote(SafetyAbortKind::Timeout));
    }

    #[test]
    fn cycle_signature_is_order_independent_in_roster() {
        let a = cycle_signature("parallel_round", &["b".into(), "a".into()], 1);
        let b = cycle_signature("parallel_round", &["a".into(), "b".into()], 1);
        assert_eq!(a, b);
    }

    #[test]
    fn cycle_detector_fires_after_three_identical_signatures() {
        let mut state = sample_state();
        for _ in 0..3 {
            record_signature(&mut state, "sig".to_string());
        }
        assert!(cycle_detected(&state));
    }

    #[test]
    fn cycle_detector_does_not_fire_on_varying_signatures() {
        let mut state = sample_state();
        record_signature(&mut state, "a".to_string());
        record_signature(&mut state, "b".to_string());
        record_signature(&mut state, "a".to_string());
        assert!(!cycle_detected(&state));
    }
}

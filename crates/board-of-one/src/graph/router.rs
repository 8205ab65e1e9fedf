//! Per-round routing: combines the safety layer's hard/soft limits with the
//! facilitator's own decision, giving the safety layer final say (spec
//! §4.15: safety checks run "at node entry and after every suspension
//! point", ahead of whatever the facilitator would otherwise choose).

use crate::agents::facilitator;
use crate::broker::LlmBroker;
use crate::config::Config;
use crate::error::{Error, Result, SafetyAbortKind};
use crate::model::{DeliberationState, EarlyStopReason, FacilitatorAction, FacilitatorDecision};
use crate::safety::{self, SafetyVerdict};

/// What the graph driver should do next for the active sub-problem.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// Run another round with the given facilitator decision.
    Continue(FacilitatorDecision),
    /// Move to voting now; `None` when the facilitator itself chose to vote
    /// on a fully-explored sub-problem, `Some` when a safety mechanism or
    /// the hard round cap forced it early.
    Vote(Option<EarlyStopReason>),
    /// Stop the whole session immediately.
    Abort(Error),
}

fn early_stop_reason_for(kind: SafetyAbortKind) -> EarlyStopReason {
    match kind {
        SafetyAbortKind::Timeout => EarlyStopReason::Timeout,
        SafetyAbortKind::Cycle => EarlyStopReason::Cycle,
        SafetyAbortKind::Recursion => EarlyStopReason::MaxRoundsReached,
        SafetyAbortKind::Budget | SafetyAbortKind::Kill => EarlyStopReason::Budget,
    }
}

/// Decide the next step for the current round, checking safety first, then
/// the hard VOTE-eligibility conjunction, then (only if both allow it)
/// asking the facilitator model.
pub async fn route(
    broker: &dyn LlmBroker,
    state: &DeliberationState,
    config: &Config,
    now_unix_secs: u64,
) -> Result<RouteOutcome> {
    match safety::check(state, config, now_unix_secs) {
        SafetyVerdict::Abort(kind) => {
            return Ok(RouteOutcome::Abort(Error::safety_abort(kind, format!("{kind} triggered an abort"))))
        }
        SafetyVerdict::ForceVote(kind) => return Ok(RouteOutcome::Vote(Some(early_stop_reason_for(kind)))),
        SafetyVerdict::Proceed => {}
    }

    if state.round_number >= config.max_rounds {
        return Ok(RouteOutcome::Vote(Some(EarlyStopReason::MaxRoundsReached)));
    }

    let decision = facilitator::decide(broker, state, config).await?;
    match &decision.action {
        FacilitatorAction::Vote => {
            if facilitator::can_vote(state, config) {
                Ok(RouteOutcome::Vote(None))
            } else {
                // Facilitator wants to vote but the hard conjunction isn't
                // satisfied yet; fall back to another round with the
                // least-contributed speaker rather than stalling.
                let fallback = FacilitatorDecision {
                    action: FacilitatorAction::Continue {
                        next_speakers: vec![facilitator::least_contributed(&state.current_roster, &state.transcript)],
                        prompt: String::new(),
                    },
                    reasoning: "vote requested before hard eligibility conjunction was met".to_string(),
                    was_override: true,
                };
                Ok(RouteOutcome::Continue(fallback))
            }
        }
        _ => Ok(RouteOutcome::Continue(decision)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;
    use crate::testing::fixtures::sample_state;

    #[tokio::test]
    async fn budget_abort_short_circuits_facilitator_call() {
        let broker = StubBroker::new();
        let mut state = sample_state();
        state.cost.total_usd = 10.0;
        let config = Config::default();
        let outcome = route(&broker, &state, &config, 0).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Abort(_)));
        assert_eq!(broker.call_count(), 0);
    }

    #[tokio::test]
    async fn max_rounds_votes_without_calling_facilitator() {
        let broker = StubBroker::new();
        let mut state = sample_state();
        state.round_number = state.max_rounds;
        let config = Config::default();
        let outcome = route(&broker, &state, &config, 0).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Vote(_)));
        assert_eq!(broker.call_count(), 0);
    }

    #[tokio::test]
    async fn facilitator_vote_below_conjunction_falls_back_to_continue() {
        let broker = StubBroker::new().with_response(
            "facilitator",
            r#"{"action":"vote","next_speakers":[],"prompt":"","query":"","variant":"contrarian","reasoning":"ready"}"#,
        );
        let mut state = sample_state();
        state.round_number = 4;
        state.quality_metrics.exploration = 0.1;
        let config = Config::default();
        let outcome = route(&broker, &state, &config, 0).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Continue(_)));
    }
}

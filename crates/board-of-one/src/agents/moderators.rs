//! Moderators (spec §4.12): rule-triggered contrarian / skeptic / optimist
//! interventions.

use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use crate::model::{ModeratorVariant, Phase, QualityMetrics};

const SUSTAINED_CONFLICT_ROUNDS: usize = 3;

/// Evaluate the rule-based triggers and return the first moderator variant
/// that should fire this round, if any. `used` lists variants already fired
/// this sub-problem (each fires at most once unless explicitly reset).
/// `recent_conflict` holds conflict scores for the last few rounds, most
/// recent last.
#[must_use]
pub fn maybe_trigger(
    round: u32,
    max_rounds: u32,
    metrics: &QualityMetrics,
    recent_conflict: &[f64],
    used: &[ModeratorVariant],
) -> Option<ModeratorVariant> {
    let early_cutoff = Phase::for_round(round, max_rounds) == Phase::Exploration;
    if early_cutoff && metrics.convergence > 0.80 && !used.contains(&ModeratorVariant::Contrarian) {
        return Some(ModeratorVariant::Contrarian);
    }

    let mid_round = Phase::for_round(round, max_rounds) == Phase::Challenge;
    if mid_round && metrics.focus < 0.4 && !used.contains(&ModeratorVariant::Skeptic) {
        return Some(ModeratorVariant::Skeptic);
    }

    let sustained_deadlock = recent_conflict.len() >= SUSTAINED_CONFLICT_ROUNDS
        && recent_conflict[recent_conflict.len() - SUSTAINED_CONFLICT_ROUNDS..]
            .iter()
            .all(|c| *c > 0.70);
    if sustained_deadlock && !used.contains(&ModeratorVariant::Optimist) {
        return Some(ModeratorVariant::Optimist);
    }

    None
}

fn system_prompt(variant: ModeratorVariant) -> &'static str {
    match variant {
        ModeratorVariant::Contrarian => {
            "You are a contrarian moderator. Challenge the premature consensus forming in this \
             discussion; name a specific assumption to question."
        }
        ModeratorVariant::Skeptic => {
            "You are a skeptical moderator. Challenge any unsupported absolute claim made so \
             far and demand evidence."
        }
        ModeratorVariant::Optimist => {
            "You are an optimist moderator. The discussion is deadlocked; reframe toward a \
             constructive path forward."
        }
    }
}

/// Generate one moderator contribution, bounded to ~100 tokens (spec §4.12).
pub async fn generate(broker: &dyn LlmBroker, variant: ModeratorVariant, transcript_excerpt: &str) -> Result<String> {
    let request = BrokerRequest::new(
        system_prompt(variant),
        transcript_excerpt.to_string(),
        ModelTier::Fast,
        "moderator",
        variant.persona_code(),
    )
    .with_max_tokens(100);
    let response = broker.call(request).await?;
    Ok(response.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics_with(convergence: f64, focus: f64) -> QualityMetrics {
        QualityMetrics {
            convergence,
            focus,
            ..Default::default()
        }
    }

    #[test]
    fn contrarian_fires_on_early_premature_consensus() {
        let metrics = metrics_with(0.9, 0.6);
        let result = maybe_trigger(1, 9, &metrics, &[], &[]);
        assert_eq!(result, Some(ModeratorVariant::Contrarian));
    }

    #[test]
    fn contrarian_does_not_refire_once_used() {
        let metrics = metrics_with(0.9, 0.6);
        let result = maybe_trigger(1, 9, &metrics, &[], &[ModeratorVariant::Contrarian]);
        assert_eq!(result, None);
    }

    #[test]
    fn optimist_fires_on_sustained_conflict() {
        let metrics = metrics_with(0.3, 0.6);
        let result = maybe_trigger(5, 9, &metrics, &[0.8, 0.75, 0.9], &[]);
        assert_eq!(result, Some(ModeratorVariant::Optimist));
    }

    #[test]
    fn no_trigger_when_discussion_is_healthy() {
        let metrics = metrics_with(0.5, 0.7);
        let result = maybe_trigger(4, 9, &metrics, &[0.2, 0.3], &[]);
        assert_eq!(result, None);
    }
}

//! Judge agent (spec §4.11): per-round exploration scoring over a fixed
//! aspect set.

use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use crate::quality::{exploration_score, missing_aspects, AspectCoverage, JUDGED_ASPECTS};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct JudgeOutput {
    aspects: BTreeMap<String, AspectCoverage>,
}

/// Result of one judge call.
#[derive(Debug, Clone)]
pub struct JudgeVerdict {
    /// Mean aspect-coverage score, in `[0, 1]`.
    pub exploration: f64,
    /// Aspects classified `none` (or absent from the model's output).
    pub missing_critical_aspects: Vec<String>,
}

fn default_verdict() -> JudgeVerdict {
    // Malformed output defaults to exploration=0.5 (spec §7): every judged
    // aspect is treated as shallow, which averages to exactly 0.5.
    let aspects: BTreeMap<String, AspectCoverage> = JUDGED_ASPECTS
        .iter()
        .map(|a| ((*a).to_string(), AspectCoverage::Shallow))
        .collect();
    JudgeVerdict {
        exploration: exploration_score(&aspects),
        missing_critical_aspects: Vec::new(),
    }
}

/// Score a round's retained contributions against the fixed aspect set.
/// Malformed judge output defaults to `exploration=0.5` with no missing
/// aspects recorded, per spec §7's documented fallback.
pub async fn judge_round(
    broker: &dyn LlmBroker,
    sub_problem_goal: &str,
    contributions: &[String],
) -> Result<JudgeVerdict> {
    let request = BrokerRequest::new(
        format!(
            "Classify coverage of these aspects as none/shallow/deep: {}. Respond with JSON only: \
             {{\"aspects\": {{...}}}}.",
            JUDGED_ASPECTS.join(", ")
        ),
        format!(
            "Sub-problem goal: {sub_problem_goal}\nContributions:\n{}",
            contributions.join("\n---\n")
        ),
        ModelTier::Fast,
        "judge_round",
        "judge",
    )
    .with_max_tokens(300);
    let response = broker.call(request).await?;

    match serde_json::from_str::<JudgeOutput>(&response.text) {
        Ok(parsed) => Ok(JudgeVerdict {
            exploration: exploration_score(&parsed.aspects),
            missing_critical_aspects: missing_aspects(&parsed.aspects),
        }),
        Err(_) => Ok(default_verdict()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;

    #[tokio::test]
    async fn malformed_output_defaults_to_half_exploration() {
        let broker = StubBroker::new().with_response("judge", "not json");
        let verdict = judge_round(&broker, "pick a database", &["text".to_string()])
            .await
            .unwrap();
        assert!((verdict.exploration - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn well_formed_output_reports_missing_aspects() {
        let broker = StubBroker::new().with_response(
            "judge",
            r#"{"aspects":{"problem_clarity":"deep","objectives":"deep","options_alternatives":"none","risks_failure_modes":"none","constraints":"shallow","stakeholders":"shallow","dependencies_unknowns":"shallow"}}"#,
        );
        let verdict = judge_round(&broker, "pick a database", &["text".to_string()])
            .await
            .unwrap();
        assert!(verdict.missing_critical_aspects.contains(&"options_alternatives".to_string()));
        assert!(verdict.missing_critical_aspects.contains(&"risks_failure_modes".to_string()));
    }
}

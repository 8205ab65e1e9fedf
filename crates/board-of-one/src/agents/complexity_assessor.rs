//! Complexity assessor (spec §4.6): five weighted dimensions → an overall
//! score plus a recommended round budget and expert count.

use super::parse_json;
use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use crate::model::Problem;
use serde::Deserialize;

/// Raw per-dimension scores returned by the assessor model, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct Dimensions {
    scope_breadth: f64,
    dependencies: f64,
    ambiguity: f64,
    stakeholders: f64,
    novelty: f64,
}

const WEIGHT_SCOPE_BREADTH: f64 = 0.25;
const WEIGHT_DEPENDENCIES: f64 = 0.25;
const WEIGHT_AMBIGUITY: f64 = 0.20;
const WEIGHT_STAKEHOLDERS: f64 = 0.15;
const WEIGHT_NOVELTY: f64 = 0.15;

/// Problem categories whose novelty is capped regardless of the model's
/// raw score, because they are well-trodden decision types (spec §4.6).
const WELL_ESTABLISHED_KEYWORDS: [&str; 5] = ["pricing", "tech stack", "stack choice", "hiring", "hire"];

fn is_well_established(statement: &str) -> bool {
    let lower = statement.to_lowercase();
    WELL_ESTABLISHED_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn overall_score(dims: Dimensions, statement: &str) -> f64 {
    let novelty = if is_well_established(statement) {
        dims.novelty.min(0.5)
    } else {
        dims.novelty
    };
    let mut overall = dims.scope_breadth * WEIGHT_SCOPE_BREADTH
        + dims.dependencies * WEIGHT_DEPENDENCIES
        + dims.ambiguity * WEIGHT_AMBIGUITY
        + dims.stakeholders * WEIGHT_STAKEHOLDERS
        + novelty * WEIGHT_NOVELTY;
    // Validation rule: broad-scope problems cannot score as simple.
    if dims.scope_breadth > 0.7 {
        overall = overall.max(0.5);
    }
    overall.clamp(0.0, 1.0)
}

/// Recommended round budget by complexity band (spec §4.6).
#[must_use]
pub fn recommended_round_budget(complexity: f64) -> u32 {
    match complexity {
        c if c < 0.2 => 3,
        c if c < 0.4 => 4,
        c if c < 0.6 => 5,
        c if c < 0.8 => 6,
        _ => 7,
    }
}

/// Recommended expert count by complexity band (spec §4.6).
#[must_use]
pub fn recommended_expert_count(complexity: f64) -> u32 {
    match complexity {
        c if c < 0.2 => 3,
        c if c < 0.4 => 3,
        c if c < 0.6 => 4,
        c if c < 0.8 => 4,
        _ => 5,
    }
}

/// Assess `statement`/`context` and produce a fully populated [`Problem`].
/// On malformed assessor output, falls back to a mid-complexity default
/// (0.5) so the decomposer still has something band-appropriate to act on.
pub async fn assess(
    broker: &dyn LlmBroker,
    statement: &str,
    context: Option<String>,
) -> Result<Problem> {
    let request = BrokerRequest::new(
        "Score the following decision problem across five complexity dimensions \
         (scope_breadth, dependencies, ambiguity, stakeholders, novelty), each in [0,1]. \
         Respond with JSON only.",
        format!("Problem: {statement}\nContext: {}", context.clone().unwrap_or_default()),
        ModelTier::Fast,
        "assess_complexity",
        "complexity_assessor",
    )
    .with_max_tokens(200);
    let response = broker.call(request).await?;

    let complexity = match parse_json::<Dimensions>("complexity_assessor", &response.text) {
        Ok(dims) => overall_score(dims, statement),
        Err(_) => 0.5,
    };

    Ok(Problem::new(
        statement,
        context,
        complexity,
        recommended_round_budget(complexity),
        recommended_expert_count(complexity),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_budget_bands_match_spec() {
        assert_eq!(recommended_round_budget(0.1), 3);
        assert_eq!(recommended_round_budget(0.35), 4);
        assert_eq!(recommended_round_budget(0.55), 5);
        assert_eq!(recommended_round_budget(0.75), 6);
        assert_eq!(recommended_round_budget(0.95), 7);
    }

    #[test]
    fn broad_scope_forces_minimum_overall() {
        let dims = Dimensions {
            scope_breadth: 0.9,
            dependencies: 0.0,
            ambiguity: 0.0,
            stakeholders: 0.0,
            novelty: 0.0,
        };
        assert!(overall_score(dims, "anything") >= 0.5);
    }

    #[test]
    fn novelty_capped_for_well_established_problems() {
        let dims = Dimensions {
            scope_breadth: 0.1,
            dependencies: 0.1,
            ambiguity: 0.1,
            stakeholders: 0.1,
            novelty: 1.0,
        };
        let capped = overall_score(dims, "what should our pricing be");
        let uncapped = overall_score(dims, "first-of-its-kind regulatory filing");
        assert!(capped < uncapped);
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_mid_complexity() {
        use crate::broker::StubBroker;
        let broker = StubBroker::new().with_response("complexity_assessor", "not json");
        let problem = assess(&broker, "should we do X", None).await.unwrap();
        assert!((problem.complexity - 0.5).abs() < 1e-9);
    }
}

//! Voting agent (spec §4.14): one structured vote per roster persona,
//! collected concurrently.

use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::model::{Confidence, Vote};
use futures::future::join_all;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawVote {
    recommendation: String,
    reasoning: String,
    confidence: Confidence,
    #[serde(default)]
    confidence_rationale: String,
    #[serde(default)]
    conditions: Vec<String>,
}

fn fallback_vote(persona_code: &str, raw_text: &str) -> Vote {
    // A persona that fails to produce parseable JSON still casts a vote
    // rather than dropping out of the count entirely: medium confidence,
    // verbatim text as the recommendation.
    Vote {
        persona_code: persona_code.to_string(),
        recommendation: raw_text.trim().to_string(),
        reasoning: String::new(),
        confidence: Confidence::Medium,
        confidence_rationale: "vote output malformed; defaulted to medium confidence".to_string(),
        conditions: Vec::new(),
    }
}

async fn cast_vote(
    broker: &dyn LlmBroker,
    persona_code: &str,
    sub_problem_goal: &str,
    transcript_excerpt: &str,
) -> Vote {
    let request = BrokerRequest::new(
        format!(
            "You are {persona_code}. Cast your final vote on: {sub_problem_goal}. \
             Respond with JSON only: {{\"recommendation\": \"...\", \"reasoning\": \"...\", \
             \"confidence\": \"low|medium|high\", \"confidence_rationale\": \"...\", \
             \"conditions\": [...]}}."
        ),
        transcript_excerpt.to_string(),
        ModelTier::Strong,
        "voting",
        format!("persona:{persona_code}"),
    )
    .with_max_tokens(400);

    let response = match broker.call(request).await {
        Ok(response) => response,
        Err(_) => return fallback_vote(persona_code, ""),
    };

    match serde_json::from_str::<RawVote>(&response.text) {
        Ok(raw) => Vote {
            persona_code: persona_code.to_string(),
            recommendation: raw.recommendation,
            reasoning: raw.reasoning,
            confidence: raw.confidence,
            confidence_rationale: raw.confidence_rationale,
            conditions: raw.conditions,
        },
        Err(_) => fallback_vote(persona_code, &response.text),
    }
}

/// Collect one vote per roster persona concurrently (spec §4.14: every
/// persona active this sub-problem votes, independent of which round they
/// last spoke in).
pub async fn collect_votes(
    broker: &dyn LlmBroker,
    roster: &[String],
    sub_problem_goal: &str,
    transcript_excerpt: &str,
) -> Vec<Vote> {
    let calls = roster
        .iter()
        .map(|persona_code| cast_vote(broker, persona_code, sub_problem_goal, transcript_excerpt));
    join_all(calls).await
}

//! Summarizer agent (spec §4.8 step 4, §9 open question (a)).

use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use crate::model::{Contribution, RoundSummary};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct SummarizerOutput {
    narrative: String,
    #[serde(default)]
    per_expert_memory: BTreeMap<String, String>,
}

/// Compress a round's retained contributions into a narrative plus
/// per-persona memory snippets. On malformed output, falls back to a
/// mechanical concatenation of the contributions themselves (truncated),
/// which keeps downstream synthesis degraded but never empty.
pub async fn summarize_round(
    broker: &dyn LlmBroker,
    round: u32,
    sub_problem_index: usize,
    contributions: &[Contribution],
) -> Result<RoundSummary> {
    let joined = contributions
        .iter()
        .map(|c| {
            format!(
                "{}: {}",
                c.persona_code.as_deref().unwrap_or("system"),
                c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let request = BrokerRequest::new(
        "Compress this round into a 100-150 token narrative preserving decisions, numeric \
         anchors, tensions, and open questions, plus a 50-100 token memory snippet per persona. \
         Respond with JSON only: {\"narrative\": \"...\", \"per_expert_memory\": {...}}.",
        joined.clone(),
        ModelTier::Fast,
        "summarize_round",
        "summarizer",
    )
    .with_max_tokens(400);
    let response = broker.call(request).await?;

    let parsed = serde_json::from_str::<SummarizerOutput>(&response.text).unwrap_or_else(|_| {
        let fallback_len = joined.len().min(600);
        SummarizerOutput {
            narrative: joined[..fallback_len].to_string(),
            per_expert_memory: contributions
                .iter()
                .filter_map(|c| c.persona_code.clone().map(|code| (code, c.content.clone())))
                .collect(),
        }
    });

    Ok(RoundSummary {
        round,
        sub_problem_index,
        narrative: parsed.narrative,
        per_expert_memory: parsed.per_expert_memory,
    })
}

/// Merge carried-over expert memory with a completed sub-problem's rollup.
///
/// Both a per-round summary and a sub-problem-end rollup can exist for the
/// same persona; this implementation gives the sub-problem-end rollup
/// precedence, since it reflects everything the persona said across the
/// whole sub-problem rather than just its final round (spec §9 open
/// question (a)).
#[must_use]
pub fn consolidate_expert_memory(
    prior: &BTreeMap<String, String>,
    latest_round_memory: &BTreeMap<String, String>,
    sub_problem_rollup: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = prior.clone();
    for (code, snippet) in latest_round_memory {
        merged.insert(code.clone(), snippet.clone());
    }
    if let Some(rollup) = sub_problem_rollup {
        for (code, snippet) in rollup {
            merged.insert(code.clone(), snippet.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;
    use chrono::Utc;

    fn contribution(persona: &str, content: &str) -> Contribution {
        Contribution {
            persona_code: Some(persona.to_string()),
            content: content.to_string(),
            round: 1,
            sub_problem_index: 0,
            embedding: None,
            thinking: None,
            recommendation: None,
            references: vec![],
            insertion_index: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_concatenation() {
        let broker = StubBroker::new().with_response("summarizer", "not json");
        let summary = summarize_round(&broker, 1, 0, &[contribution("cfo", "watch the burn rate")])
            .await
            .unwrap();
        assert!(summary.narrative.contains("watch the burn rate"));
    }

    #[test]
    fn sub_problem_rollup_overrides_round_memory() {
        let prior = BTreeMap::new();
        let mut round_memory = BTreeMap::new();
        round_memory.insert("cfo".to_string(), "round snippet".to_string());
        let mut rollup = BTreeMap::new();
        rollup.insert("cfo".to_string(), "rollup snippet".to_string());

        let merged = consolidate_expert_memory(&prior, &round_memory, Some(&rollup));
        assert_eq!(merged["cfo"], "rollup snippet");
    }
}

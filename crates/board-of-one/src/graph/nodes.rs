//! The parallel-round node (spec §4.8): expert selection, contribution
//! generation, embedding, deduplication, summarization, and scoring.

use crate::agents::{facilitator, judge, summarizer};
use crate::broker::{BrokerRequest, BrokerResponse, LlmBroker, ModelTier};
use crate::constants::CONTRIBUTION_TOKEN_CEILING;
use crate::dedup::{filter_duplicates, FilteredContribution};
use crate::embeddings::{EmbeddingRole, EmbeddingService};
use crate::error::Result;
use crate::model::{
    Contribution, Phase, PersonaCatalog, Problem, QualityMetrics, RoundSummary, SubProblem,
};
use crate::quality;
use futures::future::join_all;

/// Choose the speakers for the very first round of a sub-problem, before any
/// facilitator decision exists yet. Applies the same rotation/dominance
/// exclusions as later rounds (trivially empty on an untouched roster) and
/// the phase's target expert count.
#[must_use]
pub fn bootstrap_speakers(roster: &[String], phase: Phase) -> Vec<String> {
    let (min_count, max_count) = phase.expert_count_range();
    let take = max_count.min(roster.len()).max(min_count.min(roster.len()));
    let mut speakers: Vec<String> = roster.to_vec();
    speakers.sort();
    speakers.truncate(take);
    speakers
}

/// Apply the rotation/dominance/novelty/participation overrides to narrow
/// `roster` down to this round's eligible speakers, falling back to the
/// full roster (with all exclusions lifted) if too few remain (spec §4.10:
/// the invariants bound who *may* speak, they never starve a round).
#[must_use]
pub fn eligible_speakers(
    roster: &[String],
    transcript: &[Contribution],
    metrics: &QualityMetrics,
    phase: Phase,
    dominance_share_max: f64,
    consecutive_speaker_max: u32,
    participation_window_rounds: usize,
) -> Vec<String> {
    let excluded = facilitator::excluded_by_overrides(
        roster,
        transcript,
        &metrics.expert_novelty,
        dominance_share_max,
        consecutive_speaker_max,
        participation_window_rounds,
    );
    let eligible: Vec<String> = roster.iter().filter(|c| !excluded.contains(c)).cloned().collect();
    let (min_count, _) = phase.expert_count_range();
    if eligible.len() < min_count.min(roster.len()) {
        roster.to_vec()
    } else {
        eligible
    }
}

fn hierarchical_round_context(
    round_summaries: &[RoundSummary],
    facilitator_prompt: &str,
    expert_memory: Option<&str>,
) -> String {
    let mut parts = Vec::new();
    if let Some(last) = round_summaries.last() {
        parts.push(format!("Prior round: {}", last.narrative));
    }
    if let Some(memory) = expert_memory {
        parts.push(format!("Your own memory: {memory}"));
    }
    if !facilitator_prompt.is_empty() {
        parts.push(format!("Facilitator's prompt: {facilitator_prompt}"));
    }
    parts.join("\n")
}

/// Generate one round's candidate contributions, one concurrent call per
/// speaker (spec §4.8 step 2). The system prompt is the shared, cacheable
/// problem/phase framing; persona identity and memory live in the user
/// message, preserving cache alignment across sibling calls (spec §4.2).
///
/// `concurrent` selects between the default fan-out (one request in flight
/// per speaker, spec §4.8) and the serial one-expert-at-a-time fallback
/// (spec §9), kept for debugging sessions where interleaved concurrent
/// broker calls make a transcript hard to follow. Both paths build identical
/// requests and apply the same dedup/scoring invariants downstream; only the
/// scheduling differs.
pub async fn generate_round(
    broker: &dyn LlmBroker,
    problem: &Problem,
    sub_problem: &SubProblem,
    personas: &PersonaCatalog,
    speakers: &[String],
    phase: Phase,
    round_number: u32,
    facilitator_prompt: &str,
    round_summaries: &[RoundSummary],
    expert_memory: &std::collections::BTreeMap<String, String>,
    insertion_start: u64,
    concurrent: bool,
) -> Vec<Contribution> {
    let shared_system_prompt = format!(
        "Deliberation on: {}\nSub-problem: {}\n{}\nRespond with <thinking>private reasoning</thinking> \
         <contribution>public statement, at most ~{} tokens</contribution> and an optional \
         <recommendation>...</recommendation>.",
        problem.statement,
        sub_problem.goal,
        phase.prompt_instruction(),
        CONTRIBUTION_TOKEN_CEILING,
    );

    let build_request = |code: &str| {
        let persona = personas.lookup(code);
        let voice = persona.map(|p| p.system_prompt.clone()).unwrap_or_default();
        let context = hierarchical_round_context(round_summaries, facilitator_prompt, expert_memory.get(code).map(String::as_str));
        let user_message = format!("You are {code}. {voice}\n{context}");
        let temperature = persona.map(|p| p.default_temperature).unwrap_or(0.7);

        BrokerRequest::new(
            shared_system_prompt.clone(),
            user_message,
            ModelTier::Fast,
            "parallel_round",
            format!("persona:{code}"),
        )
        .cacheable()
        .with_temperature(temperature)
        .with_max_tokens(CONTRIBUTION_TOKEN_CEILING * 3)
    };

    let raw: Vec<(String, u64, Result<BrokerResponse>)> = if concurrent {
        let calls = speakers.iter().enumerate().map(|(offset, code)| {
            let request = build_request(code);
            let insertion_index = insertion_start + offset as u64;
            let code = code.clone();
            async move {
                let response = broker.call(request).await;
                (code, insertion_index, response)
            }
        });
        join_all(calls).await
    } else {
        let mut results = Vec::with_capacity(speakers.len());
        for (offset, code) in speakers.iter().enumerate() {
            let request = build_request(code);
            let insertion_index = insertion_start + offset as u64;
            let response = broker.call(request).await;
            results.push((code.clone(), insertion_index, response));
        }
        results
    };

    let mut contributions = Vec::with_capacity(raw.len());
    for (code, insertion_index, response) in raw {
        let Ok(response) = response else {
            tracing::warn!(persona = %code, "broker call failed for this round; persona skipped");
            continue;
        };
        contributions.push(contribution_from_response(&code, &response, round_number, sub_problem, insertion_index));
    }
    contributions
}

fn contribution_from_response(
    code: &str,
    response: &BrokerResponse,
    round_number: u32,
    sub_problem: &SubProblem,
    insertion_index: u64,
) -> Contribution {
    let content = response
        .extract_tag("contribution")
        .unwrap_or_else(|| response.text.trim().to_string());
    Contribution {
        persona_code: Some(code.to_string()),
        content,
        round: round_number,
        sub_problem_index: sub_problem.index,
        embedding: None,
        thinking: response.extract_tag("thinking"),
        recommendation: response.extract_tag("recommendation"),
        references: Vec::new(),
        insertion_index,
        timestamp: chrono::Utc::now(),
    }
}

/// Embed every contribution lacking one yet. Failures are logged and left
/// unembedded rather than propagated (spec §4.3: dedup degrades to "no
/// filtering", it never aborts the round).
pub async fn embed_contributions(embedder: &dyn EmbeddingService, contributions: &mut [Contribution]) {
    for c in contributions.iter_mut() {
        if c.embedding.is_some() {
            continue;
        }
        match embedder.embed(&c.content, EmbeddingRole::Document).await {
            Ok(vector) => c.embedding = Some(vector),
            Err(e) => tracing::warn!(error = %e, "embedding failed; contribution will not be deduplicated"),
        }
    }
}

/// Semantic dedup pass over one round's candidates against the current
/// sub-problem's transcript so far.
#[must_use]
pub fn dedup_round(
    candidates: Vec<Contribution>,
    transcript_so_far: &[Contribution],
    threshold: f32,
) -> (Vec<Contribution>, Vec<FilteredContribution>) {
    let history: Vec<(Option<String>, Vec<f32>)> = transcript_so_far
        .iter()
        .filter_map(|c| c.embedding.as_ref().map(|e| (c.persona_code.clone(), e.clone())))
        .collect();
    filter_duplicates(candidates, &history, threshold)
}

/// Recompute every quality metric after a round's contributions have been
/// retained (spec §4.8 step 5).
pub async fn score_round(
    broker: &dyn LlmBroker,
    sub_problem: &SubProblem,
    roster: &[String],
    transcript: &[Contribution],
    round_contributions: &[Contribution],
) -> Result<QualityMetrics> {
    let recent: Vec<&Contribution> = transcript.iter().rev().take(10).collect();
    let convergence = quality::convergence(&recent);

    let history_embeddings: Vec<Vec<f32>> = transcript
        .iter()
        .filter(|c| !round_contributions.iter().any(|r| r.insertion_index == c.insertion_index))
        .filter_map(|c| c.embedding.clone())
        .collect();
    let round_refs: Vec<&Contribution> = round_contributions.iter().collect();
    let novelty = quality::novelty(&round_refs, &history_embeddings);

    let focus = quality::round_focus(&sub_problem.goal, &round_refs);
    let conflict = quality::heuristic_conflict(&round_refs);

    let texts: Vec<String> = round_contributions.iter().map(|c| c.content.clone()).collect();
    let verdict = judge::judge_round(broker, &sub_problem.goal, &texts).await?;

    let mut expert_novelty = std::collections::BTreeMap::new();
    for code in roster {
        let own: Vec<&Contribution> = transcript
            .iter()
            .filter(|c| c.persona_code.as_deref() == Some(code.as_str()))
            .collect();
        expert_novelty.insert(code.clone(), quality::expert_novelty(&own));
    }

    Ok(QualityMetrics {
        convergence,
        novelty,
        focus,
        exploration: verdict.exploration,
        conflict,
        expert_novelty,
        missing_critical_aspects: verdict.missing_critical_aspects,
    })
}

/// Summarize a round and fold it into carried expert memory.
pub async fn summarize_and_update_memory(
    broker: &dyn LlmBroker,
    round_number: u32,
    sub_problem_index: usize,
    round_contributions: &[Contribution],
    expert_memory: &std::collections::BTreeMap<String, String>,
) -> Result<(RoundSummary, std::collections::BTreeMap<String, String>)> {
    let summary = summarizer::summarize_round(broker, round_number, sub_problem_index, round_contributions).await?;
    let merged = summarizer::consolidate_expert_memory(expert_memory, &summary.per_expert_memory, None);
    Ok((summary, merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_speakers_caps_to_phase_target() {
        let roster = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string(), "e".to_string(), "f".to_string()];
        let speakers = bootstrap_speakers(&roster, Phase::Exploration);
        assert!(speakers.len() <= 5);
    }

    #[test]
    fn eligible_speakers_falls_back_when_overrides_exhaust_roster() {
        let roster = vec!["a".to_string()];
        let metrics = QualityMetrics::default();
        let speakers = eligible_speakers(&roster, &[], &metrics, Phase::Exploration, 0.0, 3, 4);
        assert_eq!(speakers, roster);
    }
}

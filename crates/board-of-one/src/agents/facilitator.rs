//! Facilitator agent & routing (spec §4.9, §4.10, §4.11 hard rules).

use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    Contribution, DeliberationState, FacilitatorAction, FacilitatorDecision, ModeratorVariant,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawAction {
    Continue,
    Vote,
    Research,
    Moderator,
}

#[derive(Debug, Deserialize)]
struct FacilitatorOutput {
    action: RawAction,
    #[serde(default)]
    next_speakers: Vec<String>,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    query: String,
    #[serde(default = "default_variant")]
    variant: ModeratorVariant,
    reasoning: String,
}

fn default_variant() -> ModeratorVariant {
    ModeratorVariant::Contrarian
}

/// Cannot transition to VOTE unless every hard rule in spec §4.11 holds:
/// `round >= min_rounds`, `exploration >= exploration_threshold`,
/// `focus >= focus_threshold`, and neither `risks_failure_modes` nor
/// `options_alternatives` is in the judge's missing-aspects list. Spec §9
/// resolves the AND-vs-OR ambiguity in favor of the stricter conjunction.
#[must_use]
pub fn can_vote(state: &DeliberationState, config: &Config) -> bool {
    if state.round_number >= config.max_rounds {
        return true; // hard cap always wins regardless of other scores
    }
    state.round_number >= config.min_rounds
        && state.quality_metrics.exploration >= config.exploration_threshold
        && state.quality_metrics.focus >= config.focus_threshold
        && !state
            .quality_metrics
            .missing_critical_aspects
            .iter()
            .any(|a| a == "risks_failure_modes" || a == "options_alternatives")
}

/// Contribution count per persona within `transcript` (system contributions
/// excluded, spec §9 open question (c)).
fn contribution_counts(transcript: &[Contribution]) -> std::collections::BTreeMap<String, u32> {
    let mut counts = std::collections::BTreeMap::new();
    for c in transcript.iter().filter(|c| !c.is_system()) {
        if let Some(code) = &c.persona_code {
            *counts.entry(code.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// The persona codes of the last `n` non-system contributions, most recent last.
fn last_speakers(transcript: &[Contribution], n: usize) -> Vec<String> {
    transcript
        .iter()
        .rev()
        .filter(|c| !c.is_system())
        .filter_map(|c| c.persona_code.clone())
        .take(n)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// Pick a fallback `next_speaker` when the facilitator's own choice is
/// missing or invalid: the least-contributed roster member, alphabetical
/// tie-break (spec §4.9, §4.10).
#[must_use]
pub fn least_contributed(roster: &[String], transcript: &[Contribution]) -> String {
    let counts = contribution_counts(transcript);
    roster
        .iter()
        .min_by_key(|code| (counts.get(*code).copied().unwrap_or(0), code.clone()))
        .cloned()
        .unwrap_or_else(|| roster.first().cloned().unwrap_or_default())
}

/// Experts excluded from next-round selection by the rule-based overrides
/// in spec §4.9/§4.10: rotation, dominance, low per-expert novelty, and
/// over-participation.
#[must_use]
pub fn excluded_by_overrides(
    roster: &[String],
    transcript: &[Contribution],
    expert_novelty: &std::collections::BTreeMap<String, f64>,
    dominance_share_max: f64,
    consecutive_speaker_max: u32,
    participation_window_rounds: usize,
) -> Vec<String> {
    let mut excluded = Vec::new();
    let total_non_system = transcript.iter().filter(|c| !c.is_system()).count().max(1);
    let counts = contribution_counts(transcript);
    let recent = last_speakers(transcript, consecutive_speaker_max as usize);

    let recent_rounds: std::collections::BTreeSet<u32> = transcript
        .iter()
        .rev()
        .filter(|c| !c.is_system())
        .map(|c| c.round)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .rev()
        .take(participation_window_rounds)
        .collect();

    for code in roster {
        if recent.len() as u32 >= consecutive_speaker_max
            && recent.iter().all(|s| s == code)
        {
            excluded.push(code.clone());
            continue;
        }
        let share = counts.get(code).copied().unwrap_or(0) as f64 / total_non_system as f64;
        if share > dominance_share_max {
            excluded.push(code.clone());
            continue;
        }
        if expert_novelty.get(code).copied().unwrap_or(1.0) < 0.4 {
            excluded.push(code.clone());
            continue;
        }
        let rounds_participated = transcript
            .iter()
            .filter(|c| {
                !c.is_system()
                    && c.persona_code.as_deref() == Some(code.as_str())
                    && recent_rounds.contains(&c.round)
            })
            .map(|c| c.round)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        if !recent_rounds.is_empty()
            && rounds_participated as f64 / recent_rounds.len() as f64 > 0.5
        {
            excluded.push(code.clone());
        }
    }
    excluded
}

/// Call the facilitator model and apply the pre-LLM override rules that
/// bind regardless of what it returns (spec §4.9).
pub async fn decide(
    broker: &dyn LlmBroker,
    state: &DeliberationState,
    config: &Config,
) -> Result<FacilitatorDecision> {
    let request = BrokerRequest::new(
        "Choose the next deliberation action: continue, vote, research, or moderator. \
         Respond with JSON only: {\"action\": \"...\", \"next_speakers\": [...], \"prompt\": \"...\", \
         \"query\": \"...\", \"variant\": \"...\", \"reasoning\": \"...\"}.",
        format!(
            "Round {} of sub-problem. Exploration={:.2} Focus={:.2}",
            state.round_number, state.quality_metrics.exploration, state.quality_metrics.focus
        ),
        ModelTier::Strong,
        "facilitate",
        "facilitator",
    )
    .with_max_tokens(300);
    let response = broker.call(request).await?;

    let parsed = match serde_json::from_str::<FacilitatorOutput>(&response.text) {
        Ok(parsed) => parsed,
        Err(_) => {
            // Malformed facilitator output: fall back to the least-contributed
            // roster member rather than stalling the session.
            return Ok(FacilitatorDecision {
                action: FacilitatorAction::Continue {
                    next_speakers: vec![least_contributed(&state.current_roster, &state.transcript)],
                    prompt: String::new(),
                },
                reasoning: "facilitator output malformed; defaulted to least-contributed speaker".to_string(),
                was_override: true,
            });
        }
    };

    // Override: below min_rounds, a VOTE decision is forced back to CONTINUE.
    if matches!(parsed.action, RawAction::Vote) && state.round_number < config.min_rounds {
        return Ok(FacilitatorDecision {
            action: FacilitatorAction::Continue {
                next_speakers: vec![least_contributed(&state.current_roster, &state.transcript)],
                prompt: parsed.prompt,
            },
            reasoning: format!(
                "overridden: round {} < min_rounds {}",
                state.round_number, config.min_rounds
            ),
            was_override: true,
        });
    }

    match parsed.action {
        RawAction::Vote => Ok(FacilitatorDecision {
            action: FacilitatorAction::Vote,
            reasoning: parsed.reasoning,
            was_override: false,
        }),
        RawAction::Research => Ok(FacilitatorDecision {
            action: FacilitatorAction::Research { query: parsed.query },
            reasoning: parsed.reasoning,
            was_override: false,
        }),
        RawAction::Moderator => Ok(FacilitatorDecision {
            action: FacilitatorAction::Moderator { variant: parsed.variant },
            reasoning: parsed.reasoning,
            was_override: false,
        }),
        RawAction::Continue => {
            let valid_speakers: Vec<String> = parsed
                .next_speakers
                .iter()
                .filter(|s| state.current_roster.contains(s))
                .cloned()
                .collect();
            if valid_speakers.is_empty() {
                Ok(FacilitatorDecision {
                    action: FacilitatorAction::Continue {
                        next_speakers: vec![least_contributed(&state.current_roster, &state.transcript)],
                        prompt: parsed.prompt,
                    },
                    reasoning: format!(
                        "overridden: {} not in roster {:?}",
                        parsed.next_speakers.join(","),
                        state.current_roster
                    ),
                    was_override: true,
                })
            } else {
                Ok(FacilitatorDecision {
                    action: FacilitatorAction::Continue {
                        next_speakers: valid_speakers,
                        prompt: parsed.prompt,
                    },
                    reasoning: parsed.reasoning,
                    was_override: false,
                })
            }
        }
    }
}

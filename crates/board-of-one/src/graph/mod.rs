//! The graph driver (spec §3, §4): wires the agent modules and the two
//! round-level building blocks in `nodes`/`router` into the full per-session
//! flow — decompose, staff, deliberate sub-problem by sub-problem in
//! dependency order, vote, synthesize, and (when more than one sub-problem
//! completed) meta-synthesize.
//!
//! Every node boundary is a checkpoint barrier: [`checkpoint_after_step`]
//! runs after each round, moderator insertion, research call, and
//! sub-problem completion, so a resume picks up at the last fully-applied
//! step rather than mid-node.

pub mod nodes;
pub mod router;

use crate::agents::{decomposer, moderators, persona_selector, researcher, synthesis, voting};
use crate::broker::{CostTrackingBroker, LlmBroker};
use crate::checkpoint::CheckpointStore;
use crate::config::{Config, Options};
use crate::embeddings::EmbeddingService;
use crate::error::{Error, Result};
use crate::events::{Event, EventBody, EventSink, SubProblemSummary};
use crate::model::{
    Contribution, DeliberationState, EarlyStopReason, FacilitatorAction, KillFlags, Phase, Problem,
    PersonaCatalog, QualityMetrics, QualityMetricsSnapshot, SubProblem, SubProblemId, SubProblemResult,
    SubProblemStatus, VoteDistribution,
};
use chrono::Utc;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

pub use synthesis::MetaSynthesis;

/// Live cancellation signal the driver consults at every node boundary.
/// `session::SessionManager` is the production implementor; tests and the
/// CLI can use `()`, which never pauses or kills.
pub trait Cancellation: Send + Sync {
    /// True if the caller has requested a pause. The driver checkpoints and
    /// returns [`RunOutcome::Paused`] at the next boundary rather than
    /// stopping mid-round.
    fn is_paused(&self) -> bool;
    /// Edge-triggered kill flags to fold into the state before the next
    /// safety check.
    fn kill_flags(&self) -> KillFlags;
}

impl Cancellation for () {
    fn is_paused(&self) -> bool {
        false
    }
    fn kill_flags(&self) -> KillFlags {
        KillFlags::default()
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Everything a completed (or partially completed) session produced.
#[derive(Debug, Clone)]
pub struct SessionRunResult {
    pub problem: Problem,
    pub sub_problem_results: Vec<SubProblemResult>,
    pub meta_synthesis: Option<MetaSynthesis>,
}

/// What `run_session` returned control with.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(SessionRunResult),
    Paused,
    Killed(SessionRunResult),
}

async fn emit(events: &dyn EventSink, state: &mut DeliberationState, body: EventBody) {
    let sequence = state.event_sequence;
    state.event_sequence += 1;
    events
        .emit(Event {
            session_id: state.session_id.clone(),
            sub_problem_index: state.current_sub_problem_index,
            sequence,
            body,
            timestamp: Utc::now(),
        })
        .await;
}

async fn checkpoint(
    checkpoints: &dyn CheckpointStore,
    state: &mut DeliberationState,
    config: &Config,
    tracker: &CostTrackingBroker<'_>,
) -> Result<()> {
    tracker.drain_into(&mut state.cost);
    state.step_count += 1;
    checkpoints
        .put(&state.session_id, state.step_count, state, config.checkpoint_ttl_days)
        .await?;
    state.last_checkpoint_id = Some(format!("{}-{}", state.session_id, state.step_count));
    Ok(())
}

fn transcript_excerpt(transcript: &[Contribution], take: usize) -> String {
    transcript
        .iter()
        .rev()
        .take(take)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|c| format!("{}: {}", c.persona_code.as_deref().unwrap_or("system"), c.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn system_contribution(state: &DeliberationState, content: String) -> Contribution {
    Contribution {
        persona_code: None,
        content,
        round: state.round_number,
        sub_problem_index: state.current_sub_problem_index,
        embedding: None,
        thinking: None,
        recommendation: None,
        references: Vec::new(),
        insertion_index: state.transcript.len() as u64,
        timestamp: Utc::now(),
    }
}

async fn run_round(
    broker: &dyn LlmBroker,
    embedder: &dyn EmbeddingService,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    config: &Config,
    speakers: Vec<String>,
    facilitator_prompt: &str,
    concurrent: bool,
) -> Result<()> {
    let sub_problem = state
        .current_sub_problem()
        .cloned()
        .expect("run_round called with no active sub-problem");
    let phase = Phase::for_round(state.round_number, state.max_rounds);
    state.phase = phase;

    emit(
        events,
        state,
        EventBody::RoundStarted {
            round_number: state.round_number,
            phase,
            selected_personas: speakers.clone(),
        },
    )
    .await;

    let insertion_start = state.transcript.len() as u64;
    let personas = state.personas.clone().unwrap_or_default();
    let mut candidates = nodes::generate_round(
        broker,
        &state.problem,
        &sub_problem,
        &personas,
        &speakers,
        phase,
        state.round_number,
        facilitator_prompt,
        &state.round_summaries,
        &state.expert_memory,
        insertion_start,
        concurrent,
    )
    .await;

    nodes::embed_contributions(embedder, &mut candidates).await;
    let (kept, filtered) = nodes::dedup_round(candidates, &state.transcript, config.dedup_threshold);

    for f in &filtered {
        emit(
            events,
            state,
            EventBody::ContributionFiltered {
                round_number: state.round_number,
                persona_code: f.contribution.persona_code.clone(),
                max_similarity: f.max_similarity,
                most_similar_persona: f.most_similar_persona.clone(),
            },
        )
        .await;
    }

    for c in &kept {
        emit(
            events,
            state,
            EventBody::Contribution {
                round_number: c.round,
                persona_code: c.persona_code.clone(),
                content: c.content.clone(),
                recommendation: c.recommendation.clone(),
                references: c.references.clone(),
            },
        )
        .await;
    }

    state.transcript.extend(kept.clone());

    let metrics = nodes::score_round(broker, &sub_problem, &state.current_roster, &state.transcript, &kept).await?;
    emit(
        events,
        state,
        EventBody::QualityMetrics {
            convergence: metrics.convergence,
            novelty: metrics.novelty,
            focus: metrics.focus,
            exploration: metrics.exploration,
            missing_aspects: metrics.missing_critical_aspects.clone(),
        },
    )
    .await;
    state.quality_metrics = metrics;

    let (summary, merged_memory) = nodes::summarize_and_update_memory(
        broker,
        state.round_number,
        sub_problem.index,
        &kept,
        &state.expert_memory,
    )
    .await?;
    state.expert_memory = merged_memory;
    emit(
        events,
        state,
        EventBody::RoundSummary {
            round_number: summary.round,
            summary_text: summary.narrative.clone(),
            per_expert_memory: summary.per_expert_memory.clone(),
        },
    )
    .await;
    state.round_summaries.push(summary);

    let signature = crate::safety::cycle_signature("parallel_round", &speakers, state.round_number);
    crate::safety::record_signature(state, signature);

    Ok(())
}

async fn run_research(
    broker: &dyn LlmBroker,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    config: &Config,
    query: String,
) -> Result<()> {
    if state.researcher_calls_this_subproblem >= config.researcher_call_limit {
        return Ok(());
    }
    state.researcher_calls_this_subproblem += 1;
    match researcher::research(broker, &query).await {
        Ok(result) => {
            let content = if result.key_findings.is_empty() {
                result.implications.join("; ")
            } else {
                result.key_findings.join("; ")
            };
            let contribution = system_contribution(state, content);
            state.transcript.push(contribution);
            emit(
                events,
                state,
                EventBody::ResearchComplete {
                    query,
                    key_findings: result.key_findings,
                },
            )
            .await;
        }
        Err(e) => {
            emit(
                events,
                state,
                EventBody::Error {
                    error_kind: crate::events::ErrorKind::Validation,
                    message: format!("researcher call failed: {e}"),
                },
            )
            .await;
        }
    }
    Ok(())
}

async fn run_moderator(
    broker: &dyn LlmBroker,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    variant: crate::model::ModeratorVariant,
) -> Result<()> {
    let excerpt = transcript_excerpt(&state.transcript, 6);
    let content = moderators::generate(broker, variant, &excerpt).await?;
    let mut contribution = system_contribution(state, content.clone());
    contribution.persona_code = Some(variant.persona_code().to_string());
    state.transcript.push(contribution);
    state.moderators_used_this_subproblem.push(variant);
    emit(
        events,
        state,
        EventBody::ModeratorIntervention {
            moderator_type: variant,
            content,
        },
    )
    .await;
    Ok(())
}

enum SubProblemOutcome {
    Complete(SubProblemResult),
    Paused,
    Aborted(Error),
}

async fn finish_sub_problem(
    broker: &dyn LlmBroker,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    early_stop_reason: Option<EarlyStopReason>,
) -> Result<SubProblemResult> {
    let sub_problem = state
        .current_sub_problem()
        .cloned()
        .expect("finish_sub_problem called with no active sub-problem");

    emit(
        events,
        state,
        EventBody::VotingStarted {
            voting_personas: state.current_roster.clone(),
        },
    )
    .await;

    let excerpt = transcript_excerpt(&state.transcript, 20);
    let votes = voting::collect_votes(broker, &state.current_roster, &sub_problem.goal, &excerpt).await;
    for v in &votes {
        emit(
            events,
            state,
            EventBody::PersonaVote {
                persona_code: v.persona_code.clone(),
                recommendation: v.recommendation.clone(),
                confidence: v.confidence,
                conditions: v.conditions.clone(),
            },
        )
        .await;
    }
    let distribution = VoteDistribution::from_votes(&votes);
    emit(
        events,
        state,
        EventBody::VotingComplete {
            vote_distribution: distribution.clone(),
            consensus_level: state.quality_metrics.convergence,
        },
    )
    .await;

    let final_round: Vec<Contribution> = state
        .transcript
        .iter()
        .filter(|c| c.round == state.round_number)
        .cloned()
        .collect();
    let context = synthesis::hierarchical_context(&state.round_summaries, &final_round, &votes);
    let (synthesis_output, warned) = synthesis::synthesize(broker, &sub_problem.goal, &context).await?;
    if warned {
        emit(
            events,
            state,
            EventBody::Error {
                error_kind: crate::events::ErrorKind::Validation,
                message: "synthesis quality below threshold after retry; emitted anyway".to_string(),
            },
        )
        .await;
    }
    let synthesis_text = synthesis_output.as_text();
    emit(
        events,
        state,
        EventBody::SynthesisComplete {
            synthesis_text: synthesis_text.clone(),
            quality_score: if warned { 0.5 } else { 1.0 },
        },
    )
    .await;

    let result = SubProblemResult {
        sub_problem_id: sub_problem.id.clone(),
        options_surfaced: distribution.recommendation_counts.keys().cloned().collect(),
        vote_distribution: distribution,
        synthesis: synthesis_text,
        quality_metrics: QualityMetricsSnapshot {
            convergence: state.quality_metrics.convergence,
            novelty: state.quality_metrics.novelty,
            focus: state.quality_metrics.focus,
            exploration: state.quality_metrics.exploration,
            conflict: state.quality_metrics.conflict,
        },
        rounds_used: state.round_number,
        early_stop_reason,
        complete: early_stop_reason.is_none(),
        expert_memory: state.expert_memory.clone(),
    };

    emit(
        events,
        state,
        EventBody::SubproblemComplete {
            result_summary: format!(
                "sub-problem {} complete after {} rounds",
                sub_problem.id, state.round_number
            ),
        },
    )
    .await;

    Ok(result)
}

async fn run_sub_problem(
    broker: &dyn LlmBroker,
    embedder: &dyn EmbeddingService,
    checkpoints: &dyn CheckpointStore,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    config: &Config,
    options: &Options,
    cancellation: &dyn Cancellation,
    tracker: &CostTrackingBroker<'_>,
) -> Result<SubProblemOutcome> {
    // A resumed sub-problem already has its first round (and possibly more)
    // in `state.transcript`; only a genuinely fresh one needs the bootstrap
    // round. A session paused before that round ever landed resumes here
    // with an empty transcript and simply re-attempts it.
    if state.transcript.is_empty() {
        if cancellation.is_paused() {
            return Ok(SubProblemOutcome::Paused);
        }
        let bootstrap = nodes::bootstrap_speakers(&state.current_roster, Phase::Exploration);
        run_round(broker, embedder, events, state, config, bootstrap, "", options.use_parallel_rounds).await?;
        checkpoint(checkpoints, state, config, tracker).await?;
    }

    loop {
        if cancellation.is_paused() {
            return Ok(SubProblemOutcome::Paused);
        }
        state.kill_flags = cancellation.kill_flags();

        match router::route(broker, state, config, now_unix_secs()).await? {
            router::RouteOutcome::Abort(err) => return Ok(SubProblemOutcome::Aborted(err)),
            router::RouteOutcome::Vote(reason) => {
                let result = finish_sub_problem(broker, events, state, reason).await?;
                return Ok(SubProblemOutcome::Complete(result));
            }
            router::RouteOutcome::Continue(decision) => {
                state.facilitator_decision = Some(decision.clone());
                emit(
                    events,
                    state,
                    EventBody::FacilitatorDecision {
                        action: decision.action.clone(),
                        reasoning: decision.reasoning.clone(),
                    },
                )
                .await;

                match decision.action {
                    FacilitatorAction::Continue { next_speakers, prompt } => {
                        state.round_number += 1;
                        run_round(broker, embedder, events, state, config, next_speakers, &prompt, options.use_parallel_rounds).await?;
                    }
                    FacilitatorAction::Research { query } => {
                        run_research(broker, events, state, config, query).await?;
                    }
                    FacilitatorAction::Moderator { variant } => {
                        run_moderator(broker, events, state, variant).await?;
                    }
                    FacilitatorAction::Vote => {
                        let result = finish_sub_problem(broker, events, state, None).await?;
                        return Ok(SubProblemOutcome::Complete(result));
                    }
                }
                checkpoint(checkpoints, state, config, tracker).await?;
            }
        }
    }
}

fn reset_for_sub_problem(state: &mut DeliberationState, index: usize, roster: Vec<String>, config: &Config, now: u64) {
    state.current_sub_problem_index = index;
    state.transcript.clear();
    state.round_summaries.clear();
    state.current_roster = roster;
    state.quality_metrics = QualityMetrics::default();
    state.round_number = 1;
    state.max_rounds = config.max_rounds;
    state.min_rounds = config.min_rounds;
    state.phase = Phase::Exploration;
    state.facilitator_decision = None;
    state.cost.reset_sub_problem();
    state.sub_problem_started_unix_secs = now;
    state.recent_cycle_signatures.clear();
    state.researcher_calls_this_subproblem = 0;
    state.moderators_used_this_subproblem.clear();
    if let Some(sub_problem) = state.sub_problems.get_mut(index) {
        sub_problem.status = SubProblemStatus::Active;
    }
}

fn forced_sub_problems(statement: &str, context: Option<&str>, count: u32) -> Vec<SubProblem> {
    (0..count as usize)
        .map(|index| SubProblem {
            id: format!("sp{}", index + 1),
            goal: format!("{statement} — facet {}", index + 1),
            context: context.map(str::to_string),
            complexity: 0.5,
            dependencies: BTreeSet::new(),
            status: SubProblemStatus::Pending,
            index,
            key_questions: Vec::new(),
            risks: Vec::new(),
            alternatives: Vec::new(),
            required_expertise: Vec::new(),
            success_criteria: Vec::new(),
            rationale: "forced by caller-supplied sub-problem count".to_string(),
        })
        .collect()
}

/// Run a whole session to completion (or to pause/kill), starting from
/// `state` — either freshly built by `session::SessionManager::start` or
/// loaded from a checkpoint by `resume`. `state.sub_problems` is populated
/// in-place by the decomposer on the very first call; a resumed state
/// already has it and the loop below picks up mid-sequence.
pub async fn run_session(
    broker: &dyn LlmBroker,
    embedder: &dyn EmbeddingService,
    checkpoints: &dyn CheckpointStore,
    events: &dyn EventSink,
    state: &mut DeliberationState,
    config: &Config,
    options: &Options,
    cancellation: &dyn Cancellation,
) -> Result<RunOutcome> {
    let tracker = CostTrackingBroker::new(broker);
    let broker: &dyn LlmBroker = &tracker;

    if state.sub_problems.is_empty() {
        let sub_problems = if let Some(count) = options.force_sub_problem_count {
            forced_sub_problems(&state.problem.statement, state.problem.context.as_deref(), count)
        } else {
            decomposer::decompose(broker, &state.problem).await?
        };

        let summaries: Vec<SubProblemSummary> = sub_problems
            .iter()
            .map(|sp| SubProblemSummary {
                id: sp.id.clone(),
                goal: sp.goal.clone(),
                dependencies: sp.dependencies.iter().cloned().collect(),
                complexity: sp.complexity,
            })
            .collect();
        state.sub_problems = sub_problems;
        emit(events, state, EventBody::DecompositionComplete { sub_problems: summaries }).await;
        checkpoint(checkpoints, state, config, &tracker).await?;
    }

    let order: Vec<SubProblemId> = crate::model::topological_order(&state.sub_problems)
        .map_err(|e| Error::InvariantViolation(format!("sub-problem ordering: {e}")))?;
    let by_id: std::collections::BTreeMap<SubProblemId, usize> = state
        .sub_problems
        .iter()
        .enumerate()
        .map(|(i, sp)| (sp.id.clone(), i))
        .collect();

    for id in order {
        let index = by_id[&id];
        if matches!(state.sub_problems[index].status, SubProblemStatus::Complete | SubProblemStatus::Skipped) {
            continue;
        }

        // A sub-problem already `Active` was mid-flight when the session was
        // last paused/checkpointed: its roster, transcript, and round number
        // are already the resumed state, so staffing must not re-run here —
        // doing so would restart the sub-problem from round one and discard
        // every contribution gathered before the pause.
        if state.sub_problems[index].status == SubProblemStatus::Pending {
            let personas = state.personas.clone().unwrap_or_default();
            let target_count = crate::agents::complexity_assessor::recommended_expert_count(
                state.sub_problems[index].complexity,
            ) as usize;
            let selection = persona_selector::select(&personas, &state.sub_problems[index], target_count);
            reset_for_sub_problem(state, index, selection.codes.clone(), config, now_unix_secs());
            emit(
                events,
                state,
                EventBody::PersonasSelected {
                    persona_codes: selection.codes.clone(),
                    rationale: selection.rationale.clone(),
                },
            )
            .await;
            checkpoint(checkpoints, state, config, &tracker).await?;
        }

        match run_sub_problem(broker, embedder, checkpoints, events, state, config, options, cancellation, &tracker).await? {
            SubProblemOutcome::Complete(result) => {
                let status = if result.complete {
                    SubProblemStatus::Complete
                } else {
                    SubProblemStatus::Skipped
                };
                state.sub_problems[index].status = status;
                state.sub_problem_results.push(result);
                checkpoint(checkpoints, state, config, &tracker).await?;
            }
            SubProblemOutcome::Paused => {
                checkpoint(checkpoints, state, config, &tracker).await?;
                return Ok(RunOutcome::Paused);
            }
            SubProblemOutcome::Aborted(err) => {
                let partial = build_result(state);
                emit(
                    events,
                    state,
                    EventBody::Terminal {
                        reason: terminal_reason_for(&err),
                        partial_result: Some(format!("{} of {} sub-problems complete", state.sub_problem_results.len(), state.sub_problems.len())),
                    },
                )
                .await;
                checkpoint(checkpoints, state, config, &tracker).await?;
                return Ok(RunOutcome::Killed(partial));
            }
        }
    }

    let meta_synthesis = if state.sub_problem_results.len() >= 2 {
        Some(synthesis::meta_synthesize(broker, &state.sub_problem_results).await?)
    } else {
        None
    };
    if let Some(meta) = &meta_synthesis {
        emit(
            events,
            state,
            EventBody::MetaSynthesisComplete {
                unified_recommendation: meta.unified_recommendation.clone(),
                action_plan: meta.action_plan.clone(),
            },
        )
        .await;
    }

    emit(
        events,
        state,
        EventBody::Terminal {
            reason: crate::events::TerminalReason::Complete,
            partial_result: None,
        },
    )
    .await;
    checkpoint(checkpoints, state, config, &tracker).await?;

    Ok(RunOutcome::Completed(SessionRunResult {
        problem: state.problem.clone(),
        sub_problem_results: state.sub_problem_results.clone(),
        meta_synthesis,
    }))
}

fn build_result(state: &DeliberationState) -> SessionRunResult {
    SessionRunResult {
        problem: state.problem.clone(),
        sub_problem_results: state.sub_problem_results.clone(),
        meta_synthesis: None,
    }
}

fn terminal_reason_for(err: &Error) -> crate::events::TerminalReason {
    match err {
        Error::SafetyAbort { kind, .. } => match kind {
            crate::error::SafetyAbortKind::Kill => crate::events::TerminalReason::Killed,
            crate::error::SafetyAbortKind::Budget => crate::events::TerminalReason::Budget,
            crate::error::SafetyAbortKind::Timeout => crate::events::TerminalReason::Timeout,
            crate::error::SafetyAbortKind::Recursion | crate::error::SafetyAbortKind::Cycle => {
                crate::events::TerminalReason::Error
            }
        },
        Error::Checkpoint { .. } => crate::events::TerminalReason::Error,
        _ => crate::events::TerminalReason::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::embeddings::HashEmbedding;
    use crate::events::MemoryEventSink;
    use crate::model::{Perspective, Persona};
    use crate::testing::fixtures::sample_state;

    fn catalog() -> PersonaCatalog {
        PersonaCatalog::new(vec![
            Persona {
                code: "cfo".to_string(),
                name: "CFO".to_string(),
                system_prompt: "You weigh financial risk.".to_string(),
                default_temperature: 0.7,
                traits: Default::default(),
                domain_tags: vec!["finance".to_string()],
                perspective: Perspective::Strategic,
            },
            Persona {
                code: "cto".to_string(),
                name: "CTO".to_string(),
                system_prompt: "You weigh technical risk.".to_string(),
                default_temperature: 0.7,
                traits: Default::default(),
                domain_tags: vec!["engineering".to_string()],
                perspective: Perspective::Execution,
            },
            Persona {
                code: "coo".to_string(),
                name: "COO".to_string(),
                system_prompt: "You weigh operational risk.".to_string(),
                default_temperature: 0.7,
                traits: Default::default(),
                domain_tags: vec!["operations".to_string()],
                perspective: Perspective::Tactical,
            },
        ])
    }

    #[tokio::test]
    async fn atomic_session_runs_to_completion() {
        let broker = StubBroker::new();
        let checkpoints = MemoryCheckpointStore::new();
        let events = MemoryEventSink::new();
        let embedder = HashEmbedding::new();

        let mut state = sample_state();
        state.personas = Some(catalog());
        state.sub_problems.clear();
        let config = Config::default().with_max_rounds(3).with_min_rounds(1);
        let options = Options::default();

        let outcome = run_session(&broker, &embedder, &checkpoints, &events, &mut state, &config, &options, &())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed(result) => {
                assert_eq!(result.sub_problem_results.len(), 1);
                // Stub persona text never overlaps the goal vocabulary, so
                // focus never clears the voting threshold and the round cap
                // forces the vote instead of an early, converged one.
                assert_eq!(result.sub_problem_results[0].rounds_used, 3);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert!(!events.is_empty());
    }

    #[tokio::test]
    async fn forced_sub_problem_count_skips_decomposer() {
        let broker = StubBroker::new();
        let checkpoints = MemoryCheckpointStore::new();
        let events = MemoryEventSink::new();
        let embedder = HashEmbedding::new();

        let mut state = sample_state();
        state.personas = Some(catalog());
        state.sub_problems.clear();
        let config = Config::default().with_max_rounds(3).with_min_rounds(1);
        let options = Options {
            force_sub_problem_count: Some(2),
            ..Default::default()
        };

        let outcome = run_session(&broker, &embedder, &checkpoints, &events, &mut state, &config, &options, &())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed(result) => {
                assert_eq!(result.sub_problem_results.len(), 2);
                assert!(result.meta_synthesis.is_some());
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }
}

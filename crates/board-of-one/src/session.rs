//! Session manager (spec §4.16): owns session lifecycle on top of
//! [`crate::graph::run_session`] — init (assess complexity, decompose on
//! first run), pause/resume/kill, and the metrics/status surface exposed to
//! callers.
//!
//! Mirrors DashFlow's own session-registry pattern: a `DashMap` keyed by
//! session id holds each session's live control handle, so `pause`/`kill`
//! from one caller can reach a session driven by another task without a
//! global lock.

use crate::agents::{complexity_assessor, persona_selector};
use crate::broker::LlmBroker;
use crate::checkpoint::CheckpointStore;
use crate::config::{Config, Options};
use crate::embeddings::EmbeddingService;
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::graph::{self, Cancellation, MetaSynthesis, RunOutcome};
use crate::model::{DeliberationState, KillFlags, PersonaCatalog, Phase, Problem, SubProblemResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Per-session cancellation handle: a pause flag plus edge-triggered kill
/// flags, consulted by the graph driver at every node boundary.
#[derive(Default)]
struct SessionControl {
    paused: AtomicBool,
    kill_flags: Mutex<KillFlags>,
}

impl Cancellation for SessionControl {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn kill_flags(&self) -> KillFlags {
        *self.kill_flags.lock()
    }
}

/// Aggregated cost/usage metrics for a finished or in-progress session
/// (spec §4.16).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    /// Total cost spent, in USD.
    pub total_cost_usd: f64,
    /// Cost broken down by phase label.
    pub cost_by_phase: std::collections::BTreeMap<String, f64>,
    /// Total input tokens consumed.
    pub tokens_in: u64,
    /// Total output tokens produced.
    pub tokens_out: u64,
    /// Share of broker calls that hit a prompt cache, in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// Wall-clock duration of the most recently active sub-problem, seconds.
    pub duration_secs: u64,
    /// Rounds used per completed sub-problem, in completion order.
    pub rounds_used: Vec<u32>,
}

impl SessionMetrics {
    fn from_state(state: &DeliberationState, now: u64) -> Self {
        Self {
            total_cost_usd: state.cost.total_usd,
            cost_by_phase: state.cost.by_phase_usd.clone(),
            tokens_in: state.cost.tokens_in,
            tokens_out: state.cost.tokens_out,
            cache_hit_rate: state.cost.cache_hit_rate(),
            duration_secs: state.sub_problem_elapsed(now).as_secs(),
            rounds_used: state.sub_problem_results.iter().map(|r| r.rounds_used).collect(),
        }
    }
}

/// A completed or partially completed session's full output (spec §6).
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// The problem as intake-assessed.
    pub problem: Problem,
    /// Per-sub-problem results, in completion order.
    pub sub_problem_results: Vec<SubProblemResult>,
    /// Cross-sub-problem synthesis, present only once 2 or more sub-problems complete.
    pub meta_synthesis: Option<MetaSynthesis>,
    /// Aggregated cost/usage metrics.
    pub metrics: SessionMetrics,
}

/// What a `start`/`resume` call returned control with.
#[derive(Clone)]
pub enum SessionOutcome {
    /// Ran to completion (including meta-synthesis, if applicable).
    Completed(SessionResult),
    /// Paused at a node boundary; call `resume` to continue.
    Paused,
    /// Stopped early by a safety mechanism or an explicit kill.
    Killed(SessionResult),
}

/// A snapshot of a session's progress (spec §6: `status()`).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    /// Current phase of the active sub-problem.
    pub phase: Phase,
    /// Index into the sub-problem list of the one currently active.
    pub current_sub_problem_index: usize,
    /// Current round number within the active sub-problem.
    pub round_number: u32,
    /// Total cost spent so far, in USD.
    pub cost_so_far: f64,
    /// Elapsed wall-clock time for the active sub-problem, in seconds.
    pub elapsed_secs: u64,
}

impl SessionStatus {
    /// Build a snapshot directly from a [`DeliberationState`], the same
    /// mapping `SessionManager::status` applies to a live registry entry.
    /// Exposed so a caller holding a checkpoint-loaded state (e.g. the CLI's
    /// `status` command, inspecting a session from a prior process) can
    /// report the identical fields without a live session to query.
    #[must_use]
    pub fn from_state(state: &DeliberationState, now_unix_secs: u64) -> Self {
        Self {
            phase: state.phase,
            current_sub_problem_index: state.current_sub_problem_index,
            round_number: state.round_number,
            cost_so_far: state.cost.total_usd,
            elapsed_secs: state.sub_problem_elapsed(now_unix_secs).as_secs(),
        }
    }
}

struct SessionEntry {
    control: Arc<SessionControl>,
    state: Mutex<DeliberationState>,
}

/// Owns every live session for one broker/embedder/checkpoint-store/event-sink
/// combination (spec §4.16). Cheap to clone-share via `Arc` if a caller needs
/// one manager shared across tasks; internally it's already `Send + Sync`.
pub struct SessionManager {
    broker: Arc<dyn LlmBroker>,
    embedder: Arc<dyn EmbeddingService>,
    checkpoints: Arc<dyn CheckpointStore>,
    events: Arc<dyn EventSink>,
    config: Config,
    personas: PersonaCatalog,
    sessions: DashMap<String, Arc<SessionEntry>>,
}

impl SessionManager {
    /// Construct a manager over the given collaborators, a base [`Config`],
    /// and the persona catalog available to every session it starts.
    #[must_use]
    pub fn new(
        broker: Arc<dyn LlmBroker>,
        embedder: Arc<dyn EmbeddingService>,
        checkpoints: Arc<dyn CheckpointStore>,
        events: Arc<dyn EventSink>,
        config: Config,
        personas: PersonaCatalog,
    ) -> Self {
        Self {
            broker,
            embedder,
            checkpoints,
            events,
            config,
            personas,
            sessions: DashMap::new(),
        }
    }

    /// Start a new session: assess complexity, build the initial state, and
    /// drive the graph until it completes, pauses, or is killed. Returns the
    /// assigned session id alongside the outcome so callers can `pause`,
    /// `kill`, or `status` it afterward (spec §6: `start` → `session_id`).
    pub async fn start(
        &self,
        statement: &str,
        context: Option<String>,
        options: Options,
    ) -> Result<(String, SessionOutcome)> {
        options.validate()?;
        let config = self.config.clone().apply_options(&options);

        let intake_tracker = crate::broker::CostTrackingBroker::new(self.broker.as_ref());
        let problem = complexity_assessor::assess(&intake_tracker, statement, context).await?;
        let target_count = persona_selector::select(
            &self.personas,
            &crate::model::SubProblem {
                id: "intake".to_string(),
                goal: problem.statement.clone(),
                context: problem.context.clone(),
                complexity: problem.complexity,
                dependencies: Default::default(),
                status: crate::model::SubProblemStatus::Pending,
                index: 0,
                key_questions: Vec::new(),
                risks: Vec::new(),
                alternatives: Vec::new(),
                required_expertise: Vec::new(),
                success_criteria: Vec::new(),
                rationale: String::new(),
            },
            problem.recommended_expert_count as usize,
        );

        let session_id = Uuid::new_v4().to_string();
        let now = now_unix_secs();
        let state = DeliberationState {
            session_id: session_id.clone(),
            problem,
            personas: Some(self.personas.clone()),
            sub_problems: Vec::new(),
            current_sub_problem_index: 0,
            transcript: Vec::new(),
            round_summaries: Vec::new(),
            expert_memory: Default::default(),
            current_roster: target_count.codes,
            quality_metrics: Default::default(),
            round_number: 1,
            max_rounds: config.max_rounds,
            min_rounds: config.min_rounds,
            phase: Phase::Exploration,
            facilitator_decision: None,
            sub_problem_results: Vec::new(),
            cost: {
                let mut cost = crate::model::CostAccumulator::default();
                intake_tracker.drain_into(&mut cost);
                cost
            },
            sub_problem_started_unix_secs: now,
            step_count: 0,
            kill_flags: KillFlags::default(),
            recent_cycle_signatures: Vec::new(),
            last_checkpoint_id: None,
            event_sequence: 0,
            researcher_calls_this_subproblem: 0,
            moderators_used_this_subproblem: Vec::new(),
        };

        let control = Arc::new(SessionControl::default());
        let entry = Arc::new(SessionEntry {
            control: control.clone(),
            state: Mutex::new(state),
        });
        self.sessions.insert(session_id.clone(), entry.clone());

        let outcome = self.drive(&entry, &config, &options).await?;
        Ok((session_id, outcome))
    }

    /// Resume a session from its latest checkpoint (spec §4.16). Works for a
    /// session paused in this manager's registry, and for one known only to
    /// the checkpoint store (e.g. after a process restart), in which case a
    /// fresh in-registry entry is created from the loaded state.
    pub async fn resume(&self, session_id: &str) -> Result<SessionOutcome> {
        let entry = match self.sessions.get(session_id).map(|e| e.clone()) {
            Some(entry) => {
                entry.control.paused.store(false, Ordering::Relaxed);
                entry
            }
            None => {
                let mut record = self
                    .checkpoints
                    .latest(session_id)
                    .await?
                    .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
                // `personas` is `#[serde(skip)]` (it's a static catalog, not
                // per-session state), so a checkpoint loaded from a durable
                // backend comes back with it unset. Re-attach the manager's
                // own catalog before this entry drives any further.
                record.state.personas = Some(self.personas.clone());
                let entry = Arc::new(SessionEntry {
                    control: Arc::new(SessionControl::default()),
                    state: Mutex::new(record.state),
                });
                self.sessions.insert(session_id.to_string(), entry.clone());
                entry
            }
        };

        let config = self.config.clone();
        let options = Options::default();
        self.drive(&entry, &config, &options).await
    }

    /// Set the pause flag for a session; the current node finishes, a
    /// checkpoint is written, and the next `resume` picks up there. Idempotent.
    pub fn pause(&self, session_id: &str) -> Result<()> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        entry.control.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Request a kill for a session; the current node finishes, a terminal
    /// event and final checkpoint are emitted, and the session stops.
    /// Idempotent.
    pub fn kill(&self, session_id: &str, admin: bool) -> Result<()> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let mut flags = entry.control.kill_flags.lock();
        crate::safety::request_kill(&mut flags, admin);
        Ok(())
    }

    /// Current progress snapshot for a live session (spec §6).
    pub fn status(&self, session_id: &str) -> Result<SessionStatus> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let state = entry.state.lock();
        Ok(SessionStatus::from_state(&state, now_unix_secs()))
    }

    async fn drive(&self, entry: &Arc<SessionEntry>, config: &Config, options: &Options) -> Result<SessionOutcome> {
        let mut guard = entry.state.lock();
        let outcome = {
            // `run_session` is itself `!Sync`-free but awaits across the
            // lock would hold it for the whole session; instead we clone the
            // state out, run against the clone, and write the result back —
            // mirroring the checkpoint store's own clone-then-persist shape.
            let mut state = guard.clone();
            drop(guard);
            let result = graph::run_session(
                self.broker.as_ref(),
                self.embedder.as_ref(),
                self.checkpoints.as_ref(),
                self.events.as_ref(),
                &mut state,
                config,
                options,
                entry.control.as_ref(),
            )
            .await?;
            guard = entry.state.lock();
            *guard = state;
            result
        };
        let now = now_unix_secs();
        let metrics = SessionMetrics::from_state(&guard, now);
        drop(guard);

        Ok(match outcome {
            RunOutcome::Completed(run) => SessionOutcome::Completed(SessionResult {
                problem: run.problem,
                sub_problem_results: run.sub_problem_results,
                meta_synthesis: run.meta_synthesis,
                metrics,
            }),
            RunOutcome::Paused => SessionOutcome::Paused,
            RunOutcome::Killed(run) => SessionOutcome::Killed(SessionResult {
                problem: run.problem,
                sub_problem_results: run.sub_problem_results,
                meta_synthesis: run.meta_synthesis,
                metrics,
            }),
        })
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

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(StubBroker::new()),
            Arc::new(HashEmbedding::new()),
            Arc::new(MemoryCheckpointStore::new()),
            Arc::new(MemoryEventSink::new()),
            Config::default().with_max_rounds(3).with_min_rounds(1),
            catalog(),
        )
    }

    #[tokio::test]
    async fn start_runs_a_session_to_completion() {
        let manager = manager();
        let (session_id, outcome) = manager
            .start("should we expand to the EU?", None, Options::default())
            .await
            .unwrap();
        assert!(!session_id.is_empty());
        match outcome {
            SessionOutcome::Completed(result) => {
                assert!(!result.sub_problem_results.is_empty());
                assert!(result.metrics.total_cost_usd > 0.0);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_unknown_session_is_not_found() {
        let manager = manager();
        assert!(matches!(manager.status("nope"), Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn kill_and_pause_are_idempotent_after_completion() {
        let manager = manager();
        let (session_id, outcome) = manager
            .start("should we build or buy?", None, Options::default())
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::Completed(_)));

        manager.kill(&session_id, false).unwrap();
        manager.kill(&session_id, false).unwrap();
        manager.pause(&session_id).unwrap();
        let status = manager.status(&session_id).unwrap();
        assert_eq!(status.current_sub_problem_index, 0);
    }

    #[tokio::test]
    async fn resume_of_unknown_session_without_checkpoint_fails() {
        let manager = manager();
        assert!(matches!(
            manager.resume("never-started").await,
            Err(Error::SessionNotFound(_))
        ));
    }
}

impl std::fmt::Debug for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed(r) => f.debug_tuple("Completed").field(&r.sub_problem_results.len()).finish(),
            Self::Paused => write!(f, "Paused"),
            Self::Killed(r) => f.debug_tuple("Killed").field(&r.sub_problem_results.len()).finish(),
        }
    }
}

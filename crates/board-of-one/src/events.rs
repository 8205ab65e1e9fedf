//! Structured event emission (spec §6).
//!
//! Every event carries `session_id`, `sub_problem_index`, a monotonic
//! per-session `sequence`, and a timestamp. Consumers rely on
//! `(session_id, sequence)` for ordering and deduplication; they must
//! tolerate event types they don't recognize.

use crate::error::{BrokerErrorKind, SafetyAbortKind};
use crate::model::{FacilitatorAction, ModeratorVariant, VoteDistribution};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason a session reached its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// Ran to completion (meta-synthesis or single sub-problem synthesis done).
    Complete,
    /// A user or admin kill flag was observed.
    Killed,
    /// The cost kill switch fired.
    Budget,
    /// The wall-clock timeout fired with no recoverable partial.
    Timeout,
    /// An unrecoverable error (e.g. checkpoint failure) forced a stop.
    Error,
}

/// Severity-free payload for `event_type: error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A broker call exhausted its retry budget.
    Broker(BrokerErrorKind),
    /// The embedding service failed.
    Embedding,
    /// Structured LLM output was malformed after retry.
    Validation,
    /// An invariant was violated and corrected in-place.
    InvariantViolation,
}

/// The full, closed set of structured events the core emits.
///
/// Each variant's payload is everything required by spec §6's event table;
/// `sub_problem_index`, `sequence`, and `timestamp` are carried by the
/// enclosing [`Event`] envelope rather than repeated per-variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum EventBody {
    /// The decomposer finished producing the sub-problem list.
    DecompositionComplete {
        /// Summary of each sub-problem, in decomposer order.
        sub_problems: Vec<SubProblemSummary>,
    },
    /// The persona selector staffed a sub-problem.
    PersonasSelected {
        /// Selected persona codes.
        persona_codes: Vec<String>,
        /// Rationale string per selected persona, same order.
        rationale: Vec<String>,
    },
    /// A new round began.
    RoundStarted {
        /// Round number.
        round_number: u32,
        /// Active phase.
        phase: crate::model::Phase,
        /// Personas selected to speak this round.
        selected_personas: Vec<String>,
    },
    /// A contribution was retained in the transcript.
    Contribution {
        /// Round number.
        round_number: u32,
        /// Authoring persona, or `None` for a system contribution.
        persona_code: Option<String>,
        /// Public contribution text.
        content: String,
        /// Optional structured recommendation.
        recommendation: Option<String>,
        /// Persona codes explicitly referenced.
        references: Vec<String>,
    },
    /// A contribution was dropped as a near-duplicate.
    ContributionFiltered {
        /// Round number.
        round_number: u32,
        /// Authoring persona.
        persona_code: Option<String>,
        /// Highest cosine similarity observed against prior contributions.
        max_similarity: f32,
        /// Which prior persona produced the most similar contribution.
        most_similar_persona: Option<String>,
    },
    /// A round was compressed into a summary.
    RoundSummary {
        /// Round number.
        round_number: u32,
        /// Compressed narrative.
        summary_text: String,
        /// Per-persona memory snippets.
        per_expert_memory: std::collections::BTreeMap<String, String>,
    },
    /// Quality scores were recomputed.
    QualityMetrics {
        /// Mean pairwise similarity of recent contributions.
        convergence: f64,
        /// Average novelty of the latest round.
        novelty: f64,
        /// On-topic share of recent contributions.
        focus: f64,
        /// Mean aspect-coverage score.
        exploration: f64,
        /// Aspects the judge classified as uncovered.
        missing_aspects: Vec<String>,
    },
    /// The facilitator chose an action.
    FacilitatorDecision {
        /// The chosen action.
        action: FacilitatorAction,
        /// Why.
        reasoning: String,
    },
    /// A moderator contribution was inserted.
    ModeratorIntervention {
        /// Which moderator variant fired.
        moderator_type: ModeratorVariant,
        /// The moderator's contribution text.
        content: String,
    },
    /// A researcher call completed.
    ResearchComplete {
        /// The query that was researched.
        query: String,
        /// Key findings extracted from the result.
        key_findings: Vec<String>,
    },
    /// Voting began.
    VotingStarted {
        /// Personas being asked to vote.
        voting_personas: Vec<String>,
    },
    /// One persona's vote was recorded.
    PersonaVote {
        /// The voting persona.
        persona_code: String,
        /// Their recommendation.
        recommendation: String,
        /// Their confidence level.
        confidence: crate::model::Confidence,
        /// Conditions attached to the recommendation.
        conditions: Vec<String>,
    },
    /// All votes for a sub-problem were collected.
    VotingComplete {
        /// Aggregated vote distribution.
        vote_distribution: VoteDistribution,
        /// Consensus level, in `[0, 1]`.
        consensus_level: f64,
    },
    /// A sub-problem's synthesis narrative was produced.
    SynthesisComplete {
        /// The synthesis text.
        synthesis_text: String,
        /// The validation quality score, in `[0, 1]`.
        quality_score: f64,
    },
    /// A sub-problem finished (successfully or partially).
    SubproblemComplete {
        /// A short human-readable summary of the result.
        result_summary: String,
    },
    /// Meta-synthesis across all sub-problems completed.
    MetaSynthesisComplete {
        /// The unified recommendation text.
        unified_recommendation: String,
        /// Sequenced action items.
        action_plan: Vec<String>,
    },
    /// A recoverable error occurred and a documented default was applied.
    Error {
        /// Which error class.
        error_kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// The session reached a terminal state.
    Terminal {
        /// Why the session stopped.
        reason: TerminalReason,
        /// A partial result, if the session stopped before completion.
        partial_result: Option<String>,
    },
    /// A liveness ping for long-running stages with no other event to emit.
    Heartbeat {
        /// What the session is currently doing.
        stage: String,
    },
}

/// A short, serializable summary of a sub-problem for `decomposition_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProblemSummary {
    /// Sub-problem id.
    pub id: String,
    /// Sub-problem goal.
    pub goal: String,
    /// Ids of sub-problems that must complete first.
    pub dependencies: Vec<String>,
    /// Complexity score.
    pub complexity: f64,
}

/// The full envelope wrapping an [`EventBody`] (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Owning session.
    pub session_id: String,
    /// `0` for session-wide events (decomposition, meta-synthesis, terminal).
    pub sub_problem_index: usize,
    /// Monotonic per-session sequence number.
    pub sequence: u64,
    /// The event payload.
    pub body: EventBody,
    /// Wall-clock time the event was emitted.
    pub timestamp: DateTime<Utc>,
}

/// Sink consuming the event stream for one or more sessions.
///
/// Implementations must not block the graph driver indefinitely; a slow
/// sink should buffer or drop rather than stall deliberation, matching the
/// broker's own "never let an observability path gate correctness" stance.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit one event. Errors are logged by the caller and never propagated
    /// into the deliberation itself — the sink is an observability channel,
    /// not a correctness dependency.
    async fn emit(&self, event: Event);
}

/// An in-memory sink that retains every event, for tests and for the CLI's
/// own terminal rendering.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    /// Construct an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot all events recorded so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Allocates monotonically increasing sequence numbers for one session.
#[derive(Debug, Default)]
pub struct SequenceCounter(std::sync::atomic::AtomicU64);

impl SequenceCounter {
    /// Start a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(0))
    }

    /// Allocate the next sequence number.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_preserves_order() {
        let sink = MemoryEventSink::new();
        let seq = SequenceCounter::new();
        for stage in ["decompose", "select_personas", "round_1"] {
            sink.emit(Event {
                session_id: "s1".into(),
                sub_problem_index: 0,
                sequence: seq.next(),
                body: EventBody::Heartbeat {
                    stage: stage.to_string(),
                },
                timestamp: Utc::now(),
            })
            .await;
        }
        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence, 0);
        assert_eq!(events[2].sequence, 2);
    }
}

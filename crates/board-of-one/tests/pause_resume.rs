//! A session paused mid-sub-problem must resume from its last checkpointed
//! round, not restart the sub-problem from scratch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use board_of_one::broker::StubBroker;
use board_of_one::checkpoint::MemoryCheckpointStore;
use board_of_one::config::{Config, Options};
use board_of_one::embeddings::HashEmbedding;
use board_of_one::events::MemoryEventSink;
use board_of_one::graph::{run_session, Cancellation, RunOutcome};
use board_of_one::model::{
    CostAccumulator, DeliberationState, KillFlags, Persona, PersonaCatalog, Perspective, Phase,
    Problem, QualityMetrics,
};

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

/// Pauses once its `is_paused` counter reaches `pause_after_nth_check`
/// (1-based), then stays paused forever. Deterministic stand-in for a
/// real caller hitting `SessionManager::pause` mid-flight.
struct PauseAfterNChecks {
    threshold: usize,
    calls: AtomicUsize,
}

impl PauseAfterNChecks {
    fn new(threshold: usize) -> Self {
        Self { threshold, calls: AtomicUsize::new(0) }
    }
}

impl Cancellation for PauseAfterNChecks {
    fn is_paused(&self) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        n >= self.threshold
    }

    fn kill_flags(&self) -> KillFlags {
        KillFlags::default()
    }
}

fn fresh_state() -> DeliberationState {
    let problem = Problem::new("should we migrate to a new billing provider?", None, 0.3, 3, 3);
    DeliberationState {
        session_id: "pause-resume-test".to_string(),
        problem,
        personas: Some(catalog()),
        sub_problems: Vec::new(),
        current_sub_problem_index: 0,
        transcript: Vec::new(),
        round_summaries: Vec::new(),
        expert_memory: BTreeMap::new(),
        current_roster: Vec::new(),
        quality_metrics: QualityMetrics::default(),
        round_number: 1,
        max_rounds: 3,
        min_rounds: 1,
        phase: Phase::Exploration,
        facilitator_decision: None,
        sub_problem_results: Vec::new(),
        cost: CostAccumulator::default(),
        sub_problem_started_unix_secs: 0,
        step_count: 0,
        kill_flags: KillFlags::default(),
        recent_cycle_signatures: Vec::new(),
        last_checkpoint_id: None,
        event_sequence: 0,
        researcher_calls_this_subproblem: 0,
        moderators_used_this_subproblem: Vec::new(),
    }
}

#[tokio::test]
async fn resuming_after_a_mid_flight_pause_keeps_round_one_instead_of_restarting() {
    let broker = StubBroker::new();
    let checkpoints = MemoryCheckpointStore::new();
    let events = MemoryEventSink::new();
    let embedder = HashEmbedding::new();
    let config = Config::default().with_max_rounds(3).with_min_rounds(1);
    let options = Options::default();

    let mut state = fresh_state();

    // First check happens before the bootstrap round even runs; the second
    // happens at the top of the post-bootstrap loop, right before round 2
    // would be routed. Pausing there leaves round 1's contributions in the
    // transcript.
    let pause_after_bootstrap = PauseAfterNChecks::new(2);
    let outcome = run_session(
        &broker,
        &embedder,
        &checkpoints,
        &events,
        &mut state,
        &config,
        &options,
        &pause_after_bootstrap,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, RunOutcome::Paused));

    assert!(!state.transcript.is_empty(), "round 1's contributions must survive the pause");
    assert_eq!(state.round_number, 1, "paused before round 2 was ever routed");
    let transcript_before_resume = state.transcript.clone();

    // Resume against the very same, mutated state with a cancellation that
    // never pauses.
    let outcome = run_session(
        &broker,
        &embedder,
        &checkpoints,
        &events,
        &mut state,
        &config,
        &options,
        &(),
    )
    .await
    .unwrap();

    match outcome {
        RunOutcome::Completed(result) => {
            assert_eq!(result.sub_problem_results.len(), 1);
        }
        other => panic!("expected Completed after resume, got {other:?}"),
    }

    // Round 1's contributions must still be exactly there, untouched, as
    // the earliest entries — a restart-from-scratch would have cleared and
    // replaced them instead.
    assert!(state.transcript.len() > transcript_before_resume.len());
    assert_eq!(&state.transcript[..transcript_before_resume.len()], &transcript_before_resume[..]);
    assert_eq!(result_rounds_used(&state), 3);
}

fn result_rounds_used(state: &DeliberationState) -> u32 {
    state.sub_problem_results[0].rounds_used
}

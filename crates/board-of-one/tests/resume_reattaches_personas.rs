//! A session resumed purely from a durable checkpoint (no live entry in the
//! manager's registry, e.g. after a process restart) must still have its
//! persona catalog staffed correctly, not an empty one.

use std::sync::Arc;

use board_of_one::broker::StubBroker;
use board_of_one::checkpoint::{CheckpointStore, FileCheckpointStore};
use board_of_one::config::{Config, Options};
use board_of_one::embeddings::HashEmbedding;
use board_of_one::events::{EventBody, MemoryEventSink};
use board_of_one::model::{Perspective, Persona, PersonaCatalog};
use board_of_one::session::{SessionManager, SessionOutcome};

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
    ])
}

#[tokio::test]
async fn resuming_a_pre_staffing_checkpoint_on_a_fresh_manager_still_staffs_the_real_roster() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = Arc::new(FileCheckpointStore::new(dir.path()).unwrap());
    let config = Config::default().with_max_rounds(3).with_min_rounds(1);

    let session_id = {
        let events = Arc::new(MemoryEventSink::new());
        let manager = SessionManager::new(
            Arc::new(StubBroker::new()),
            Arc::new(HashEmbedding::new()),
            checkpoints.clone(),
            events,
            config.clone(),
            catalog(),
        );
        let (session_id, outcome) = manager
            .start("should we outsource our support desk?", None, Options::default())
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::Completed(_)));
        session_id
    };

    // Step 1 is the checkpoint written right after decomposition, before the
    // sub-problem is ever staffed (`status == Pending`, empty transcript).
    // Re-publish it as the newest checkpoint so a brand new manager's
    // `resume` falls into the checkpoint-only path with real unstaffed work
    // left to do, not a no-op over an already-complete session.
    let pre_staffing = checkpoints.get(&session_id, 1).await.unwrap().expect("step 1 must exist");
    assert!(pre_staffing.state.transcript.is_empty());
    checkpoints
        .put(&session_id, 9_999, &pre_staffing.state, config.checkpoint_ttl_days)
        .await
        .unwrap();

    // A brand new manager: no entry in its registry for this session id, so
    // `resume` must go through the checkpoint-only path.
    let events = Arc::new(MemoryEventSink::new());
    let fresh_manager = SessionManager::new(
        Arc::new(StubBroker::new()),
        Arc::new(HashEmbedding::new()),
        checkpoints.clone(),
        events.clone(),
        config,
        catalog(),
    );

    let outcome = fresh_manager.resume(&session_id).await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Completed(_)));

    let staffed = events.events().into_iter().find_map(|e| match e.body {
        EventBody::PersonasSelected { persona_codes, .. } => Some(persona_codes),
        _ => None,
    });
    let staffed = staffed.expect("a PersonasSelected event must be emitted on resume");
    assert!(!staffed.is_empty(), "the roster must not be empty after a checkpoint-only resume");
    assert!(staffed.iter().all(|code| code == "cfo" || code == "cto"));
}

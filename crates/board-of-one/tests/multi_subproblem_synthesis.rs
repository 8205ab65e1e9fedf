//! When a session covers 2+ sub-problems, a cross-sub-problem
//! meta-synthesis must run and be reported alongside every individual
//! result.

use std::sync::Arc;

use board_of_one::broker::StubBroker;
use board_of_one::checkpoint::MemoryCheckpointStore;
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
        Persona {
            code: "legal".to_string(),
            name: "Legal Counsel".to_string(),
            system_prompt: "You weigh regulatory exposure.".to_string(),
            default_temperature: 0.6,
            traits: Default::default(),
            domain_tags: vec!["legal".to_string()],
            perspective: Perspective::Tactical,
        },
    ])
}

#[tokio::test]
async fn three_sub_problems_produce_a_unified_meta_synthesis() {
    let events = Arc::new(MemoryEventSink::new());
    let manager = SessionManager::new(
        Arc::new(StubBroker::new()),
        Arc::new(HashEmbedding::new()),
        Arc::new(MemoryCheckpointStore::new()),
        events.clone(),
        Config::default().with_max_rounds(3).with_min_rounds(1),
        catalog(),
    );

    let options = Options {
        force_sub_problem_count: Some(3),
        ..Default::default()
    };
    let (_session_id, outcome) = manager
        .start("should we expand operations into the EU?", None, options)
        .await
        .unwrap();

    match outcome {
        SessionOutcome::Completed(result) => {
            assert_eq!(result.sub_problem_results.len(), 3);
            // Generic stub persona text never overlaps the goal vocabulary,
            // so every facet runs to the hard round cap rather than
            // converging on the facilitator's vote early.
            assert!(result.sub_problem_results.iter().all(|r| r.rounds_used == 3));
            let meta = result.meta_synthesis.expect("3 sub-problems must meta-synthesize");
            assert!(!meta.unified_recommendation.is_empty());
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let emitted = events.events();
    let subproblem_complete_count = emitted
        .iter()
        .filter(|e| matches!(e.body, EventBody::SubproblemComplete { .. }))
        .count();
    assert_eq!(subproblem_complete_count, 3);
    assert!(emitted.iter().any(|e| matches!(e.body, EventBody::MetaSynthesisComplete { .. })));

    // The meta-synthesis event must come after every sub-problem's own
    // completion event in sequence order.
    let meta_seq = emitted
        .iter()
        .find(|e| matches!(e.body, EventBody::MetaSynthesisComplete { .. }))
        .map(|e| e.sequence)
        .unwrap();
    let last_subproblem_seq = emitted
        .iter()
        .filter(|e| matches!(e.body, EventBody::SubproblemComplete { .. }))
        .map(|e| e.sequence)
        .max()
        .unwrap();
    assert!(meta_seq > last_subproblem_seq);
}

#[tokio::test]
async fn a_single_forced_sub_problem_still_skips_meta_synthesis() {
    let manager = SessionManager::new(
        Arc::new(StubBroker::new()),
        Arc::new(HashEmbedding::new()),
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(MemoryEventSink::new()),
        Config::default().with_max_rounds(3).with_min_rounds(1),
        catalog(),
    );
    let options = Options {
        force_sub_problem_count: Some(1),
        ..Default::default()
    };
    let (_id, outcome) = manager
        .start("should we renew the office lease?", None, options)
        .await
        .unwrap();
    match outcome {
        SessionOutcome::Completed(result) => {
            assert_eq!(result.sub_problem_results.len(), 1);
            assert!(result.meta_synthesis.is_none());
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

//! Board of One: a checkpointable multi-expert deliberation engine.
//!
//! A single call to [`session::SessionManager::start`] decomposes a decision
//! problem into sub-problems, staffs each with a small panel of personas,
//! runs parallel rounds of debate under a facilitator's routing, and
//! produces a synthesized recommendation with a vote distribution. Every
//! step is checkpointed so a session can be paused, killed, or resumed from
//! its last durable state.

pub mod agents;
pub mod broker;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod quality;
pub mod safety;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Config, Options};
pub use error::{BrokerErrorKind, Error, Result, SafetyAbortKind};
pub use model::{DeliberationState, Phase};
pub use session::{SessionManager, SessionMetrics, SessionOutcome, SessionResult, SessionStatus};

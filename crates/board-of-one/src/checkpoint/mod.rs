//! Checkpoint store (spec §4.4): durable per-session state snapshots keyed
//! by `(session_id, step_id)`, with time-to-live.

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use crate::error::Result;
use crate::model::DeliberationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One durable snapshot of a session's state.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    /// Monotonic step id within the session.
    pub step_id: u64,
    /// The full state at this step.
    pub state: DeliberationState,
    /// When this checkpoint was written.
    pub written_at: DateTime<Utc>,
    /// When this checkpoint becomes eligible for reclamation.
    pub expires_at: DateTime<Utc>,
}

/// A key-value store for [`CheckpointRecord`]s (spec §4.4).
///
/// Writes must be durable before the graph driver advances to the next
/// node: every implementation's `put` is expected to return only after the
/// record is safely persisted, since `CheckpointError` is modeled as fatal
/// for progress (spec §7).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Durably persist `state` at `(session_id, step_id)` with the given TTL.
    async fn put(
        &self,
        session_id: &str,
        step_id: u64,
        state: &DeliberationState,
        ttl_days: u64,
    ) -> Result<()>;

    /// Load the checkpoint at an exact `(session_id, step_id)`, if present
    /// and unexpired.
    async fn get(&self, session_id: &str, step_id: u64) -> Result<Option<CheckpointRecord>>;

    /// Load the most recent unexpired checkpoint for a session.
    async fn latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>>;

    /// Remove every checkpoint for a session (used after TTL expiry or on
    /// explicit archival).
    async fn delete(&self, session_id: &str) -> Result<()>;
}

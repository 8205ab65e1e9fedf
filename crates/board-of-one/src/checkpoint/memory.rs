//! In-process checkpoint store, for tests and single-process deployments.

use super::{CheckpointRecord, CheckpointStore};
use crate::error::Result;
use crate::model::DeliberationState;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;

/// Keeps every checkpoint in memory, keyed by `(session_id, step_id)`.
/// Expired records are filtered out on read rather than proactively swept.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    records: DashMap<String, Vec<CheckpointRecord>>,
}

impl MemoryCheckpointStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(
        &self,
        session_id: &str,
        step_id: u64,
        state: &DeliberationState,
        ttl_days: u64,
    ) -> Result<()> {
        let now = Utc::now();
        let record = CheckpointRecord {
            step_id,
            state: state.clone(),
            written_at: now,
            expires_at: now + ChronoDuration::days(ttl_days as i64),
        };
        let mut entry = self.records.entry(session_id.to_string()).or_default();
        entry.retain(|r| r.step_id != step_id);
        entry.push(record);
        Ok(())
    }

    async fn get(&self, session_id: &str, step_id: u64) -> Result<Option<CheckpointRecord>> {
        let now = Utc::now();
        Ok(self.records.get(session_id).and_then(|entry| {
            entry
                .iter()
                .find(|r| r.step_id == step_id && r.expires_at > now)
                .cloned()
        }))
    }

    async fn latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        let now = Utc::now();
        Ok(self.records.get(session_id).and_then(|entry| {
            entry
                .iter()
                .filter(|r| r.expires_at > now)
                .max_by_key(|r| r.step_id)
                .cloned()
        }))
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.records.remove(session_id);
        Ok(())
    }
}

impl Clone for CheckpointRecord {
    fn clone(&self) -> Self {
        Self {
            step_id: self.step_id,
            state: self.state.clone(),
            written_at: self.written_at,
            expires_at: self.expires_at,
        }
    }
}

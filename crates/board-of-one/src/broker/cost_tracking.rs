//! A [`LlmBroker`] decorator that captures each call's [`Usage`] without
//! every agent having to thread it back out itself — the driver wraps the
//! real broker once per session and drains the ledger into
//! [`crate::model::CostAccumulator`] at each checkpoint boundary.

use super::{BrokerRequest, BrokerResponse, LlmBroker, Usage};
use crate::error::Result;
use crate::model::CostAccumulator;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Wraps an inner broker and records the `(phase, usage)` of every
/// successful call. Failed calls record nothing — a retried call that
/// eventually succeeds is billed once, at its final attempt's reported cost.
pub struct CostTrackingBroker<'a> {
    inner: &'a dyn LlmBroker,
    ledger: Mutex<Vec<(String, Usage)>>,
}

impl<'a> CostTrackingBroker<'a> {
    /// Wrap `inner`; the wrapper forwards every call unchanged.
    #[must_use]
    pub fn new(inner: &'a dyn LlmBroker) -> Self {
        Self {
            inner,
            ledger: Mutex::new(Vec::new()),
        }
    }

    /// Pop every recorded call since the last drain and fold it into `cost`.
    pub fn drain_into(&self, cost: &mut CostAccumulator) {
        let entries = std::mem::take(&mut *self.ledger.lock());
        for (phase, usage) in entries {
            cost.record(&phase, usage.cost_usd, usage.tokens_in, usage.tokens_out, usage.cache_hit);
        }
    }
}

#[async_trait]
impl LlmBroker for CostTrackingBroker<'_> {
    async fn call(&self, request: BrokerRequest) -> Result<BrokerResponse> {
        let phase = request.phase.clone();
        let response = self.inner.call(request).await?;
        self.ledger.lock().push((phase, response.usage));
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerRequest, ModelTier, StubBroker};

    #[tokio::test]
    async fn successful_calls_accumulate_into_the_ledger() {
        let inner = StubBroker::new();
        let tracker = CostTrackingBroker::new(&inner);

        let request = BrokerRequest::new("sys", "user", ModelTier::Fast, "judge", "judge");
        tracker.call(request).await.unwrap();

        let mut cost = CostAccumulator::default();
        tracker.drain_into(&mut cost);
        assert_eq!(cost.total_calls, 1);
        assert!(cost.total_usd > 0.0);

        // Draining again with nothing new recorded is a no-op.
        let before = cost.total_calls;
        tracker.drain_into(&mut cost);
        assert_eq!(cost.total_calls, before);
    }
}

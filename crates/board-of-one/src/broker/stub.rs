//! A deterministic, configurable [`LlmBroker`] test double.
//!
//! Grounded on the configurable-canned-response pattern used by DashFlow's
//! own mock tool/model test doubles: callers queue exact responses keyed by
//! agent label, and anything not queued falls back to a deterministic
//! default derived from the request itself (never from real randomness), so
//! the same test run always produces the same transcript.

use super::{BrokerRequest, BrokerResponse, LlmBroker, Usage};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Deterministic stand-in for a real model provider.
#[derive(Default)]
pub struct StubBroker {
    queued: DashMap<String, VecDeque<String>>,
    calls: Mutex<Vec<BrokerRequest>>,
}

impl StubBroker {
    /// Construct an empty stub; every call falls back to the deterministic default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exact response for the next call with this `agent` label.
    /// Multiple calls queue in FIFO order.
    pub fn with_response(self, agent: impl Into<String>, text: impl Into<String>) -> Self {
        self.queued
            .entry(agent.into())
            .or_default()
            .push_back(text.into());
        self
    }

    /// All requests observed so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<BrokerRequest> {
        self.calls.lock().clone()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Stable hash of a string, used to derive deterministic pseudo-scores
    /// from request content without pulling in real randomness.
    fn stable_hash(text: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    fn stable_unit(text: &str) -> f64 {
        (Self::stable_hash(text) % 1000) as f64 / 1000.0
    }

    fn default_response(request: &BrokerRequest) -> String {
        let seed = format!("{}:{}:{}", request.agent, request.phase, request.user_message);
        if request.phase == "voting" {
            return r#"{"recommendation":"proceed with option A","reasoning":"balances risk and upside given the discussion.","confidence":"medium","confidence_rationale":"reasonable but not unanimous","conditions":[]}"#
                .to_string();
        }
        if let Some(code) = request.agent.strip_prefix("persona:") {
            let unit = Self::stable_unit(&seed);
            return format!(
                "<thinking>weighing tradeoffs for {code}</thinking>\
                 <contribution>{code} leans toward option {opt} given the current evidence ({tag}).</contribution>\
                 <recommendation>option {opt}</recommendation>",
                code = code,
                opt = if unit > 0.5 { "A" } else { "B" },
                tag = &seed[..seed.len().min(8)],
            );
        }
        if request.agent.starts_with("moderator:") {
            return format!(
                "<contribution>Let's pressure-test that: what evidence would change your mind? ({seed})</contribution>",
                seed = &seed[..seed.len().min(6)]
            );
        }
        match request.agent.as_str() {
            "decomposer" => {
                r#"{"sub_problems":[{"id":"sp1","goal":"address the core decision","context":null,"complexity":0.2,"dependencies":[],"key_questions":[],"risks":[],"alternatives":[],"required_expertise":[],"success_criteria":[],"rationale":"atomic problem"}]}"#
                    .to_string()
            }
            "complexity_assessor" => {
                r#"{"scope_breadth":0.2,"dependencies":0.2,"ambiguity":0.2,"stakeholders":0.2,"novelty":0.2}"#
                    .to_string()
            }
            "persona_selector" => r#"{"selected":[],"rationale":[]}"#.to_string(),
            "facilitator" => {
                r#"{"action":"vote","next_speakers":[],"prompt":"","query":"","variant":"contrarian","reasoning":"stub default"}"#
                    .to_string()
            }
            "judge" => {
                r#"{"aspects":{"problem_clarity":"deep","objectives":"deep","options_alternatives":"shallow","risks_failure_modes":"shallow","constraints":"shallow","stakeholders":"shallow","dependencies_unknowns":"shallow"},"missing_critical_aspects":[]}"#
                    .to_string()
            }
            "summarizer" => {
                r#"{"narrative":"the panel converged on a cautious recommendation with noted risks.","per_expert_memory":{}}"#
                    .to_string()
            }
            "researcher" => {
                r#"{"sources":["stub-source"],"key_findings":["stub finding"],"implications":["stub implication"]}"#
                    .to_string()
            }
            "voting" => {
                r#"{"recommendation":"proceed with option A","reasoning":"balances risk and upside given the discussion.","confidence":"medium","confidence_rationale":"reasonable but not unanimous","conditions":[]}"#
                    .to_string()
            }
            "synthesis" => {
                r#"{"executive_summary":"stub synthesis","recommendation":"proceed with option A","rationale":"per-expert reasoning converged","vote_breakdown":"majority favor A","dissenting_views":[],"implementation_considerations":["staff the rollout"],"confidence_assessment":"medium","open_questions":[]}"#
                    .to_string()
            }
            "meta_synthesis" => {
                r#"{"unified_recommendation":"stub unified recommendation","action_plan":["step one","step two"]}"#
                    .to_string()
            }
            _ => format!("stub response for {}", request.agent),
        }
    }
}

#[async_trait]
impl LlmBroker for StubBroker {
    async fn call(&self, request: BrokerRequest) -> Result<BrokerResponse> {
        let text = self
            .queued
            .get_mut(&request.agent)
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Self::default_response(&request));
        let tokens_in = (request.system_prompt.len() + request.user_message.len()) as u64 / 4;
        let tokens_out = text.len() as u64 / 4;
        self.calls.lock().push(request);
        Ok(BrokerResponse {
            text,
            usage: Usage {
                tokens_in,
                tokens_out,
                cost_usd: (tokens_in + tokens_out) as f64 * 0.000_002,
                cache_hit: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ModelTier;

    #[tokio::test]
    async fn queued_response_takes_priority_over_default() {
        let broker = StubBroker::new().with_response("judge", "custom");
        let resp = broker
            .call(BrokerRequest::new("sys", "user", ModelTier::Fast, "score", "judge"))
            .await
            .unwrap();
        assert_eq!(resp.text, "custom");
        assert_eq!(broker.call_count(), 1);
    }

    #[tokio::test]
    async fn persona_default_is_deterministic() {
        let broker = StubBroker::new();
        let req = || BrokerRequest::new("sys", "same input", ModelTier::Fast, "round", "persona:cfo");
        let a = broker.call(req()).await.unwrap();
        let b = broker.call(req()).await.unwrap();
        assert_eq!(a.text, b.text);
    }
}

//! LLM broker: the model-agnostic call surface every agent goes through
//! (spec §4.2).
//!
//! Mirrors the shape of a DashFlow chat-model provider crate (e.g.
//! `dashflow-anthropic`'s `ChatModel` trait) but scoped to the one operation
//! the deliberation core needs: a single structured call with retry, cache
//! hints, and cost/usage reporting baked into the response.

pub mod cost_tracking;
pub mod retry;
pub mod stub;

pub use cost_tracking::CostTrackingBroker;
pub use retry::{with_retry, RetryPolicy};
pub use stub::StubBroker;

use crate::error::{BrokerErrorKind, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Coarse model capability/cost tier. Cheaper agents (judge, complexity
/// assessor) default to `Fast`; facilitator and synthesis default to `Strong`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    /// Cheap, low-latency model for mechanical scoring and classification.
    Fast,
    /// Higher-capability model for synthesis and routing decisions.
    Strong,
}

/// Whether the caller intends for `system_prompt` to be eligible for
/// provider-side prompt caching (spec §4.2 caching contract: personas
/// sharing the same problem context should share cached prefix tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheDirective {
    /// Mark `system_prompt` as cacheable.
    Cacheable,
    /// Do not attempt to cache this call.
    Uncacheable,
}

/// One call to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerRequest {
    /// The system prompt (persona voice, task framing).
    pub system_prompt: String,
    /// The user-turn content for this call.
    pub user_message: String,
    /// Optional assistant-turn prefill to steer structured output.
    pub prefill: Option<String>,
    /// Which model tier to use.
    pub tier: ModelTier,
    /// Sampling temperature.
    pub temperature: f32,
    /// Hard ceiling on generated tokens.
    pub max_tokens: usize,
    /// Cost-accounting phase label (e.g. `"parallel_round"`, `"synthesis"`).
    pub phase: String,
    /// Cost-accounting agent label (e.g. `"persona:cfo"`, `"judge"`).
    pub agent: String,
    /// Caching intent for `system_prompt`.
    pub cache: CacheDirective,
}

impl BrokerRequest {
    /// Start building a request with the required fields; optional fields
    /// default to uncached, full temperature, and no prefill.
    #[must_use]
    pub fn new(
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
        tier: ModelTier,
        phase: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            prefill: None,
            tier,
            temperature: 0.7,
            max_tokens: 512,
            phase: phase.into(),
            agent: agent.into(),
            cache: CacheDirective::Uncacheable,
        }
    }

    /// Mark this request's system prompt as cacheable.
    #[must_use]
    pub fn cacheable(mut self) -> Self {
        self.cache = CacheDirective::Cacheable;
        self
    }

    /// Override temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the output token ceiling.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Attach an assistant prefill.
    #[must_use]
    pub fn with_prefill(mut self, prefill: impl Into<String>) -> Self {
        self.prefill = Some(prefill.into());
        self
    }
}

/// Usage and cost metadata accompanying every successful call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens consumed.
    pub tokens_in: u64,
    /// Output tokens produced.
    pub tokens_out: u64,
    /// Estimated cost in USD for this call.
    pub cost_usd: f64,
    /// True if the provider reported a prompt-cache hit.
    pub cache_hit: bool,
}

/// The broker's response to one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerResponse {
    /// Raw text returned by the model (including any structural tags).
    pub text: String,
    /// Usage/cost metadata.
    pub usage: Usage,
}

impl BrokerResponse {
    /// Extract the contents of a `<tag>...</tag>` block from `text`, or
    /// `None` if absent. Used to pull `<thinking>`/`<contribution>`/
    /// `<recommendation>` out of a persona's raw reply.
    #[must_use]
    pub fn extract_tag(&self, tag: &str) -> Option<String> {
        extract_tag(&self.text, tag)
    }
}

/// Extract the contents of a `<tag>...</tag>` block from arbitrary text.
#[must_use]
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

/// Model-agnostic call surface (spec §4.2). Implementations own retry
/// policy, provider selection, and cost accounting; callers see only
/// [`BrokerRequest`] in, [`BrokerResponse`] out, or a typed
/// [`BrokerErrorKind`] via [`crate::Error::Broker`].
#[async_trait]
pub trait LlmBroker: Send + Sync {
    /// Perform one call, retrying transient failures internally.
    async fn call(&self, request: BrokerRequest) -> Result<BrokerResponse>;
}

/// Classify a raw provider failure string into a [`BrokerErrorKind`] for
/// retry-policy purposes. Pattern lifted from the conservative string
/// sniffing DashFlow's provider crates do on non-typed SDK errors.
#[must_use]
pub fn classify_failure(message: &str) -> BrokerErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        BrokerErrorKind::RateLimited
    } else if lower.contains("timeout") || lower.contains("timed out") {
        BrokerErrorKind::Timeout
    } else if lower.contains("parse") || lower.contains("malformed") || lower.contains("schema") {
        BrokerErrorKind::Malformed
    } else {
        BrokerErrorKind::Upstream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tag_finds_inner_text() {
        let text = "<thinking>private</thinking><contribution> public text </contribution>";
        assert_eq!(extract_tag(text, "thinking").as_deref(), Some("private"));
        assert_eq!(
            extract_tag(text, "contribution").as_deref(),
            Some("public text")
        );
        assert_eq!(extract_tag(text, "recommendation"), None);
    }

    #[test]
    fn classify_failure_recognizes_common_messages() {
        assert_eq!(classify_failure("HTTP 429 too many requests"), BrokerErrorKind::RateLimited);
        assert_eq!(classify_failure("request timed out"), BrokerErrorKind::Timeout);
        assert_eq!(classify_failure("failed to parse JSON"), BrokerErrorKind::Malformed);
        assert_eq!(classify_failure("internal server error"), BrokerErrorKind::Upstream);
    }
}

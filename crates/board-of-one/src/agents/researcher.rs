//! Researcher agent (spec §4.13): single-shot external-knowledge retrieval.

use super::parse_json;
use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use serde::Deserialize;

/// Structured output of a single research call.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchResult {
    /// Cited sources.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Key findings extracted from the sources.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// What the findings imply for the decision at hand.
    #[serde(default)]
    pub implications: Vec<String>,
}

/// Issue a single-shot research call for `query`. The caller is
/// responsible for enforcing the per-sub-problem call limit (spec §4.13);
/// this function performs exactly one call and returns `Err` on failure —
/// callers must treat that as non-fatal (log and continue without the
/// findings) rather than aborting deliberation.
pub async fn research(broker: &dyn LlmBroker, query: &str) -> Result<ResearchResult> {
    let request = BrokerRequest::new(
        "Research the following query and respond with JSON only: \
         {\"sources\": [...], \"key_findings\": [...], \"implications\": [...]}.",
        query.to_string(),
        ModelTier::Fast,
        "research",
        "researcher",
    )
    .with_max_tokens(400);
    let response = broker.call(request).await?;
    parse_json("researcher", &response.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;

    #[tokio::test]
    async fn parses_structured_findings() {
        let broker = StubBroker::new().with_response(
            "researcher",
            r#"{"sources":["eurostat"],"key_findings":["VAT registration takes 6 weeks"],"implications":["budget for the delay"]}"#,
        );
        let result = research(&broker, "EU VAT registration timeline").await.unwrap();
        assert_eq!(result.sources, vec!["eurostat".to_string()]);
        assert_eq!(result.key_findings.len(), 1);
    }

    #[tokio::test]
    async fn malformed_output_is_a_validation_error() {
        let broker = StubBroker::new().with_response("researcher", "not json");
        assert!(research(&broker, "anything").await.is_err());
    }
}

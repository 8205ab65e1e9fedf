//! Agents: the LLM-backed decision points around the graph (spec §4.5-4.14).
//!
//! Each module exposes pure-ish functions `(inputs, &dyn LlmBroker) -> Result<Output>`
//! rather than a trait-object node hierarchy, per the "tagged function, not
//! inheritance" redesign note (spec §9).

pub mod complexity_assessor;
pub mod decomposer;
pub mod facilitator;
pub mod judge;
pub mod moderators;
pub mod persona_selector;
pub mod researcher;
pub mod summarizer;
pub mod synthesis;
pub mod voting;

use serde::de::DeserializeOwned;

/// Parse a broker response as JSON, returning a typed
/// [`crate::error::Error::Validation`] on failure so callers can apply
/// their documented default (spec §7: "handled node-locally with a
/// documented default; never silently swallowed").
pub(crate) fn parse_json<T: DeserializeOwned>(agent: &str, text: &str) -> crate::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| crate::Error::validation(agent, format!("malformed JSON: {e}")))
}

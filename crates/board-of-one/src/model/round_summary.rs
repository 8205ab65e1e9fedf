//! Round summaries and per-expert memory (spec §3, §4.8 step 4).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compressed summary of one round, produced by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number this summary covers.
    pub round: u32,
    /// Which sub-problem (by index) this summary belongs to.
    pub sub_problem_index: usize,
    /// 100-150 token compressed narrative preserving decisions, numeric
    /// anchors, tensions, and open questions.
    pub narrative: String,
    /// Per-persona memory snippets (50-100 tokens each), keyed by persona code.
    pub per_expert_memory: BTreeMap<String, String>,
}

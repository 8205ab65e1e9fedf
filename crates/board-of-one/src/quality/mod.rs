//! Quality scorers: convergence, novelty, exploration, focus, conflict
//! (spec §4.8 step 5, glossary).

use crate::embeddings::{cosine_similarity, max_similarity};
use crate::model::Contribution;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Mean pairwise cosine similarity of contributions missing an embedding
/// are skipped rather than treated as zero-similarity, so a run without an
/// embedding service degrades to `0.0` (no signal) instead of a false
/// "fully divergent" reading.
#[must_use]
pub fn convergence(recent: &[&Contribution]) -> f64 {
    let vectors: Vec<&Vec<f32>> = recent.iter().filter_map(|c| c.embedding.as_ref()).collect();
    if vectors.len() < 2 {
        return 0.0;
    }
    let mut pairwise = Vec::new();
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            pairwise.push(f64::from(cosine_similarity(vectors[i], vectors[j])));
        }
    }
    if pairwise.is_empty() {
        0.0
    } else {
        pairwise.mean().clamp(0.0, 1.0)
    }
}

/// Average `1 - max_similarity` of `round_contributions` against every
/// contribution in `history` (prior rounds). A round with nothing to
/// compare against (empty history) is maximally novel by definition.
#[must_use]
pub fn novelty(round_contributions: &[&Contribution], history: &[Vec<f32>]) -> f64 {
    let embedded: Vec<&Vec<f32>> = round_contributions
        .iter()
        .filter_map(|c| c.embedding.as_ref())
        .collect();
    if embedded.is_empty() {
        return 0.0;
    }
    if history.is_empty() {
        return 1.0;
    }
    let per_contribution: Vec<f64> = embedded
        .iter()
        .map(|vector| {
            let (sim, _) = max_similarity(vector, history);
            1.0 - f64::from(sim)
        })
        .collect();
    per_contribution.mean().clamp(0.0, 1.0)
}

/// Per-expert novelty: mean similarity of `persona`'s own last two
/// contributions to each other (low means they are repeating themselves).
/// Returns `1.0` (maximally novel — no penalty) when fewer than two
/// contributions exist yet.
#[must_use]
pub fn expert_novelty(own_recent: &[&Contribution]) -> f64 {
    let embedded: Vec<&Vec<f32>> = own_recent
        .iter()
        .rev()
        .take(2)
        .filter_map(|c| c.embedding.as_ref())
        .collect();
    if embedded.len() < 2 {
        return 1.0;
    }
    let similarity = f64::from(cosine_similarity(embedded[0], embedded[1]));
    (1.0 - similarity).clamp(0.0, 1.0)
}

/// Coverage classification the judge assigns per aspect (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectCoverage {
    /// Not addressed at all.
    None,
    /// Mentioned without depth.
    Shallow,
    /// Substantively addressed.
    Deep,
}

impl AspectCoverage {
    /// Numeric weight used when averaging into an exploration score.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Shallow => 0.5,
            Self::Deep => 1.0,
        }
    }
}

/// The fixed set of aspects the judge scores every round (spec §4.11).
pub const JUDGED_ASPECTS: [&str; 7] = [
    "problem_clarity",
    "objectives",
    "options_alternatives",
    "risks_failure_modes",
    "constraints",
    "stakeholders",
    "dependencies_unknowns",
];

/// Mean of per-aspect coverage weights; the judge's exploration score.
#[must_use]
pub fn exploration_score(aspects: &BTreeMap<String, AspectCoverage>) -> f64 {
    if aspects.is_empty() {
        return 0.0;
    }
    let weights: Vec<f64> = aspects.values().map(|a| a.weight()).collect();
    weights.mean().clamp(0.0, 1.0)
}

/// Aspects classified `None`, in the fixed judged order, for
/// `missing_critical_aspects` reporting.
#[must_use]
pub fn missing_aspects(aspects: &BTreeMap<String, AspectCoverage>) -> Vec<String> {
    JUDGED_ASPECTS
        .iter()
        .filter(|name| matches!(aspects.get(**name), Some(AspectCoverage::None) | None))
        .map(|s| (*s).to_string())
        .collect()
}

/// Heuristic keyword-overlap focus score: the fraction of a contribution's
/// significant words (length > 3, lowercased) that also appear in the goal
/// text. Intended as the cheap first pass before an LLM-assisted check
/// when the heuristic score comes back low (spec §4.8 step 5).
#[must_use]
pub fn heuristic_focus(goal: &str, contribution_text: &str) -> f64 {
    let goal_words: std::collections::HashSet<String> = goal
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect();
    if goal_words.is_empty() {
        return 1.0;
    }
    let text_words: Vec<String> = contribution_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect();
    if text_words.is_empty() {
        return 0.0;
    }
    let hits = text_words.iter().filter(|w| goal_words.contains(*w)).count();
    (hits as f64 / text_words.len() as f64).clamp(0.0, 1.0)
}

/// Mean focus across a round's retained contributions.
#[must_use]
pub fn round_focus(goal: &str, contributions: &[&Contribution]) -> f64 {
    if contributions.is_empty() {
        return 0.0;
    }
    let per_contribution: Vec<f64> = contributions
        .iter()
        .map(|c| heuristic_focus(goal, &c.content))
        .collect();
    per_contribution.mean()
}

/// Heuristic conflict/tension score: the share of retained contributions in
/// the round whose text contains an explicit disagreement marker. Crude by
/// design — it only needs to detect sustained deadlock for the optimist
/// moderator trigger (spec §4.12), not grade argument quality.
#[must_use]
pub fn heuristic_conflict(contributions: &[&Contribution]) -> f64 {
    if contributions.is_empty() {
        return 0.0;
    }
    const MARKERS: [&str; 7] = [
        "disagree", "however", "but ", "risk", "concern", "instead", "wrong",
    ];
    let flagged = contributions
        .iter()
        .filter(|c| {
            let lower = c.content.to_lowercase();
            MARKERS.iter().any(|m| lower.contains(m))
        })
        .count();
    (flagged as f64 / contributions.len() as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::contribution_with_embedding;

    #[test]
    fn convergence_needs_at_least_two_embedded() {
        let c = contribution_with_embedding("a", vec![1.0, 0.0]);
        assert_eq!(convergence(&[&c]), 0.0);
    }

    #[test]
    fn convergence_of_identical_vectors_is_one() {
        let a = contribution_with_embedding("a", vec![1.0, 0.0]);
        let b = contribution_with_embedding("b", vec![1.0, 0.0]);
        assert!((convergence(&[&a, &b]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn novelty_is_maximal_with_empty_history() {
        let a = contribution_with_embedding("a", vec![1.0, 0.0]);
        assert_eq!(novelty(&[&a], &[]), 1.0);
    }

    #[test]
    fn novelty_is_low_against_identical_history() {
        let a = contribution_with_embedding("a", vec![1.0, 0.0]);
        let history = vec![vec![1.0, 0.0]];
        assert!(novelty(&[&a], &history) < 0.05);
    }

    #[test]
    fn exploration_score_averages_weights() {
        let mut aspects = BTreeMap::new();
        aspects.insert("problem_clarity".to_string(), AspectCoverage::Deep);
        aspects.insert("objectives".to_string(), AspectCoverage::None);
        assert!((exploration_score(&aspects) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_aspects_lists_none_coverage_only() {
        let mut aspects = BTreeMap::new();
        aspects.insert("problem_clarity".to_string(), AspectCoverage::Deep);
        let missing = missing_aspects(&aspects);
        assert!(missing.contains(&"risks_failure_modes".to_string()));
        assert!(!missing.contains(&"problem_clarity".to_string()));
    }

    #[test]
    fn heuristic_focus_rewards_shared_vocabulary() {
        let score = heuristic_focus(
            "should we expand into the european market",
            "expanding into the european market carries GDPR risk",
        );
        assert!(score > 0.0);
    }
}

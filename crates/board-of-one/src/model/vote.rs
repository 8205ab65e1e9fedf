//! Votes: structured per-persona recommendations (spec §3, §4.14).

use serde::{Deserialize, Serialize};

/// Confidence level attached to a vote. Deliberately not collapsed into a
/// numeric scale — the calibration pass adjusts this qualitative level plus
/// its rationale, not a raw probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Low confidence: real uncertainty remains.
    Low,
    /// Medium confidence: reasonable but not unanimous support.
    Medium,
    /// High confidence: strong evidentiary or consensus support.
    High,
}

impl Confidence {
    /// Numeric weight used only for aggregate reporting (e.g. consensus
    /// level); never used to rank individual votes against each other.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.33,
            Self::Medium => 0.66,
            Self::High => 1.0,
        }
    }
}

/// One persona's vote for a sub-problem. Free-form structured recommendation
/// — deliberately not a yes/no enum (spec §4.14).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// The voting persona.
    pub persona_code: String,
    /// Free-form actionable recommendation statement.
    pub recommendation: String,
    /// 2-3 paragraphs of reasoning referencing specific prior contributions and tensions.
    pub reasoning: String,
    /// Qualitative confidence level.
    pub confidence: Confidence,
    /// Why that confidence level, specifically.
    pub confidence_rationale: String,
    /// Conditions under which this recommendation should be revisited.
    pub conditions: Vec<String>,
}

/// Aggregate distribution over a set of votes, used for `voting_complete`
/// event data and for `SubProblemResult`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteDistribution {
    /// Count of distinct recommendation strings (grouped verbatim; the
    /// synthesis step does the semantic grouping, not this struct).
    pub recommendation_counts: std::collections::BTreeMap<String, u32>,
    /// Mean confidence weight across all votes, in `[0, 1]`.
    pub mean_confidence: f64,
}

impl VoteDistribution {
    /// Compute a distribution over a vote slice.
    #[must_use]
    pub fn from_votes(votes: &[Vote]) -> Self {
        let mut counts = std::collections::BTreeMap::new();
        let mut total_weight = 0.0;
        for v in votes {
            *counts.entry(v.recommendation.clone()).or_insert(0) += 1;
            total_weight += v.confidence.weight();
        }
        let mean_confidence = if votes.is_empty() {
            0.0
        } else {
            total_weight / votes.len() as f64
        };
        Self {
            recommendation_counts: counts,
            mean_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(persona: &str, rec: &str, conf: Confidence) -> Vote {
        Vote {
            persona_code: persona.to_string(),
            recommendation: rec.to_string(),
            reasoning: "because reasons".to_string(),
            confidence: conf,
            confidence_rationale: "rationale".to_string(),
            conditions: vec![],
        }
    }

    #[test]
    fn distribution_groups_identical_recommendations() {
        let votes = vec![
            vote("a", "expand", Confidence::High),
            vote("b", "expand", Confidence::Medium),
            vote("c", "wait", Confidence::Low),
        ];
        let dist = VoteDistribution::from_votes(&votes);
        assert_eq!(dist.recommendation_counts["expand"], 2);
        assert_eq!(dist.recommendation_counts["wait"], 1);
        assert!(dist.mean_confidence > 0.0 && dist.mean_confidence < 1.0);
    }

    #[test]
    fn empty_votes_have_zero_confidence() {
        let dist = VoteDistribution::from_votes(&[]);
        assert_eq!(dist.mean_confidence, 0.0);
    }
}

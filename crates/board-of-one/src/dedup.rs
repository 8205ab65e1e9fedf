//! Semantic deduplication of round contributions (spec §4.8 step 3).

use crate::embeddings::max_similarity;
use crate::model::Contribution;

/// One filtered-out contribution, for `contribution_filtered` event emission.
#[derive(Debug, Clone)]
pub struct FilteredContribution {
    /// The contribution that was dropped.
    pub contribution: Contribution,
    /// Highest cosine similarity observed against prior contributions.
    pub max_similarity: f32,
    /// Index into `history_personas` of the most similar prior contribution.
    pub most_similar_persona: Option<String>,
}

/// Split freshly generated, already-embedded contributions into those kept
/// and those dropped as near-duplicates of anything already in the
/// sub-problem's transcript.
///
/// `history` holds every prior contribution's `(persona_code, embedding)`;
/// candidates are also checked against each other in generation order, so
/// two near-identical contributions produced in the *same* round correctly
/// keep only the first (spec §8 scenario 4).
pub fn filter_duplicates(
    candidates: Vec<Contribution>,
    history: &[(Option<String>, Vec<f32>)],
    threshold: f32,
) -> (Vec<Contribution>, Vec<FilteredContribution>) {
    let mut kept: Vec<Contribution> = Vec::new();
    let mut filtered = Vec::new();
    let mut pool: Vec<(Option<String>, Vec<f32>)> = history.to_vec();

    for candidate in candidates {
        let Some(embedding) = candidate.embedding.clone() else {
            kept.push(candidate);
            continue;
        };
        let vectors: Vec<Vec<f32>> = pool.iter().map(|(_, v)| v.clone()).collect();
        let (sim, idx) = max_similarity(&embedding, &vectors);
        if sim >= threshold {
            let most_similar_persona = idx.and_then(|i| pool[i].0.clone());
            filtered.push(FilteredContribution {
                contribution: candidate,
                max_similarity: sim,
                most_similar_persona,
            });
        } else {
            pool.push((candidate.persona_code.clone(), embedding));
            kept.push(candidate);
        }
    }
    (kept, filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::contribution_with_embedding;

    #[test]
    fn near_duplicate_within_same_round_is_dropped() {
        let a = contribution_with_embedding("cfo", vec![1.0, 0.0]);
        let b = contribution_with_embedding("cto", vec![0.99, 0.01]);
        let (kept, filtered) = filter_duplicates(vec![a, b], &[], 0.90);
        assert_eq!(kept.len(), 1);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn duplicate_of_history_is_dropped() {
        let history = vec![(Some("cfo".to_string()), vec![1.0, 0.0])];
        let candidate = contribution_with_embedding("cto", vec![1.0, 0.0]);
        let (kept, filtered) = filter_duplicates(vec![candidate], &history, 0.80);
        assert!(kept.is_empty());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].most_similar_persona.as_deref(), Some("cfo"));
    }

    #[test]
    fn dissimilar_contributions_are_all_kept() {
        let a = contribution_with_embedding("cfo", vec![1.0, 0.0]);
        let b = contribution_with_embedding("cto", vec![0.0, 1.0]);
        let (kept, filtered) = filter_duplicates(vec![a, b], &[], 0.80);
        assert_eq!(kept.len(), 2);
        assert!(filtered.is_empty());
    }
}

//! Contributions: the append-only transcript unit (spec §3).

use serde::{Deserialize, Serialize};

/// One entry in a sub-problem's transcript. Append-only; never mutated after
/// insertion except to lazily populate `embedding` the first time it's needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// The persona that produced this contribution, or `None` for a system
    /// message (e.g. a researcher result — spec §9 open question).
    pub persona_code: Option<String>,
    /// The public `<contribution>` text.
    pub content: String,
    /// Round number this contribution belongs to.
    pub round: u32,
    /// Which sub-problem (by index) this contribution belongs to.
    pub sub_problem_index: usize,
    /// Cached semantic embedding, computed lazily and never recomputed.
    pub embedding: Option<Vec<f32>>,
    /// Private `<thinking>` block, if the broker returned one.
    pub thinking: Option<String>,
    /// Optional `<recommendation>` block.
    pub recommendation: Option<String>,
    /// Persona codes this contribution explicitly engages with.
    pub references: Vec<String>,
    /// Insertion order within the whole session, used for the total order
    /// required by invariant 2 (stable tie-break is persona code, but ties
    /// should not occur since insertion is sequential).
    pub insertion_index: u64,
    /// Wall-clock timestamp of insertion.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Contribution {
    /// True if this is a system-authored entry (researcher output), which is
    /// excluded from dominance/rotation accounting (spec §9 open question).
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.persona_code.is_none()
    }
}

/// Total order used when sorting a round or a full sub-problem transcript:
/// `(round, insertion_index)` per invariant 2.
#[must_use]
pub fn transcript_sort_key(c: &Contribution) -> (u32, u64) {
    (c.round, c.insertion_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contribution(persona: &str, round: u32, idx: u64) -> Contribution {
        Contribution {
            persona_code: Some(persona.to_string()),
            content: "text".to_string(),
            round,
            sub_problem_index: 0,
            embedding: None,
            thinking: None,
            recommendation: None,
            references: vec![],
            insertion_index: idx,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn sort_key_orders_by_round_then_insertion() {
        let mut contributions = vec![
            contribution("b", 1, 5),
            contribution("a", 0, 10),
            contribution("c", 1, 2),
        ];
        contributions.sort_by_key(transcript_sort_key);
        let codes: Vec<_> = contributions
            .iter()
            .map(|c| c.persona_code.clone().unwrap())
            .collect();
        assert_eq!(codes, vec!["a", "c", "b"]);
    }

    #[test]
    fn system_contribution_has_no_persona() {
        let mut c = contribution("x", 0, 0);
        c.persona_code = None;
        assert!(c.is_system());
    }
}

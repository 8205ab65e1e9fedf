//! Persona catalog (spec §4.1).
//!
//! A read-only mapping from persona code to [`Persona`], loaded once at
//! session start. The catalog is a snapshot: later edits to a backing store
//! never affect an in-flight session, since [`PersonaCatalog`] owns its data
//! rather than borrowing from a live source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named scalar trait in `[0, 1]`, e.g. `"risk_tolerance" -> 0.8`.
pub type TraitVector = BTreeMap<String, f64>;

/// A read-only expert profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique, stable identifier (e.g. `"cfo"`, `"security_lead"`).
    pub code: String,
    /// Display name (e.g. `"Chief Financial Officer"`).
    pub name: String,
    /// The system prompt establishing this persona's voice and mandate.
    pub system_prompt: String,
    /// Default sampling temperature for this persona's calls.
    pub default_temperature: f32,
    /// Named scalar traits in `[0, 1]` (e.g. risk tolerance, formality).
    pub traits: TraitVector,
    /// Domain/expertise tags used for coverage and overlap checks.
    pub domain_tags: Vec<String>,
    /// Coarse perspective bucket used by the persona selector's diversity
    /// check (spec §4.7.ii: strategic + tactical + execution-focused).
    pub perspective: Perspective,
}

/// Coarse perspective bucket for diversity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Perspective {
    /// Big-picture, long-horizon framing.
    Strategic,
    /// Mid-horizon planning and trade-off framing.
    Tactical,
    /// Ground-level, implementation-focused framing.
    Execution,
}

impl Persona {
    /// Cosine similarity between this persona's trait vector and another's,
    /// over the union of named trait keys (missing keys default to 0.0).
    /// Used by the persona selector to reject near-duplicate picks (spec §4.7.iv).
    #[must_use]
    pub fn trait_cosine_similarity(&self, other: &Persona) -> f64 {
        let mut keys: Vec<&String> = self.traits.keys().chain(other.traits.keys()).collect();
        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0;
        let mut a_norm = 0.0;
        let mut b_norm = 0.0;
        for k in keys {
            let a = *self.traits.get(k).unwrap_or(&0.0);
            let b = *other.traits.get(k).unwrap_or(&0.0);
            dot += a * b;
            a_norm += a * a;
            b_norm += b * b;
        }
        if a_norm == 0.0 || b_norm == 0.0 {
            return 0.0;
        }
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }

    /// Fraction of `domain_tags` shared with `other`, relative to the smaller tag set.
    #[must_use]
    pub fn domain_overlap(&self, other: &Persona) -> f64 {
        if self.domain_tags.is_empty() || other.domain_tags.is_empty() {
            return 0.0;
        }
        let shared = self
            .domain_tags
            .iter()
            .filter(|t| other.domain_tags.contains(t))
            .count();
        let smaller = self.domain_tags.len().min(other.domain_tags.len());
        shared as f64 / smaller as f64
    }
}

/// Read-only registry of expert profiles, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct PersonaCatalog {
    personas: BTreeMap<String, Persona>,
}

impl PersonaCatalog {
    /// Build a catalog from a list of personas. Later entries with a
    /// duplicate code overwrite earlier ones (last-write-wins at load time
    /// only — the catalog is immutable thereafter).
    #[must_use]
    pub fn new(personas: impl IntoIterator<Item = Persona>) -> Self {
        let mut map = BTreeMap::new();
        for p in personas {
            map.insert(p.code.clone(), p);
        }
        Self { personas: map }
    }

    /// Look up a persona by code.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<&Persona> {
        self.personas.get(code)
    }

    /// All personas matching a predicate, in stable (code-sorted) order.
    pub fn filter(&self, mut predicate: impl FnMut(&Persona) -> bool) -> Vec<&Persona> {
        self.personas.values().filter(|p| predicate(p)).collect()
    }

    /// All personas, in stable (code-sorted) order.
    pub fn all(&self) -> Vec<&Persona> {
        self.personas.values().collect()
    }

    /// Number of personas in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// True if the catalog has no personas.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(code: &str, traits: &[(&str, f64)], tags: &[&str]) -> Persona {
        Persona {
            code: code.to_string(),
            name: code.to_string(),
            system_prompt: format!("You are {code}."),
            default_temperature: 0.7,
            traits: traits.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            domain_tags: tags.iter().map(|s| s.to_string()).collect(),
            perspective: Perspective::Tactical,
        }
    }

    #[test]
    fn catalog_lookup_and_filter() {
        let catalog = PersonaCatalog::new(vec![
            persona("cfo", &[("risk", 0.2)], &["finance"]),
            persona("cto", &[("risk", 0.6)], &["engineering"]),
        ]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.lookup("cfo").is_some());
        assert!(catalog.lookup("ceo").is_none());
        let finance = catalog.filter(|p| p.domain_tags.contains(&"finance".to_string()));
        assert_eq!(finance.len(), 1);
        assert_eq!(finance[0].code, "cfo");
    }

    #[test]
    fn trait_cosine_similarity_identical_is_one() {
        let a = persona("a", &[("risk", 0.5), ("formality", 0.5)], &[]);
        let b = persona("b", &[("risk", 0.5), ("formality", 0.5)], &[]);
        assert!((a.trait_cosine_similarity(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trait_cosine_similarity_orthogonal_is_zero() {
        let a = persona("a", &[("risk", 1.0)], &[]);
        let b = persona("b", &[("formality", 1.0)], &[]);
        assert!(a.trait_cosine_similarity(&b).abs() < 1e-9);
    }

    #[test]
    fn domain_overlap_full_when_subset() {
        let a = persona("a", &[], &["finance", "legal"]);
        let b = persona("b", &[], &["finance"]);
        assert!((a.domain_overlap(&b) - 1.0).abs() < 1e-9);
    }
}

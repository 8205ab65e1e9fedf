//! Persona selector (spec §4.7): picks 3-5 diverse, non-redundant experts
//! per sub-problem.

use crate::model::{Persona, PersonaCatalog, Perspective, SubProblem};

const TRAIT_SIMILARITY_CEILING: f64 = 0.8;
const DOMAIN_OVERLAP_CEILING: f64 = 0.6;

/// Result of one selection pass, including any constraints that had to be
/// relaxed to reach a non-empty roster (spec §4.7: "emit a warning event").
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected persona codes, in pick order.
    pub codes: Vec<String>,
    /// Human-readable rationale per selected persona, same order.
    pub rationale: Vec<String>,
    /// Constraints that were relaxed to reach this roster.
    pub warnings: Vec<String>,
}

fn covers_required_expertise(persona: &Persona, sub_problem: &SubProblem) -> bool {
    sub_problem.required_expertise.is_empty()
        || sub_problem
            .required_expertise
            .iter()
            .any(|tag| persona.domain_tags.contains(tag))
}

fn conflicts_with_selected(candidate: &Persona, selected: &[&Persona]) -> bool {
    selected.iter().any(|other| {
        candidate.trait_cosine_similarity(other) >= TRAIT_SIMILARITY_CEILING
            || candidate.domain_overlap(other) > DOMAIN_OVERLAP_CEILING
    })
}

fn has_perspective(selected: &[&Persona], perspective: Perspective) -> bool {
    selected.iter().any(|p| p.perspective == perspective)
}

/// Select `target_count` (clamped to `[3, 5]`) personas for `sub_problem`
/// from `catalog`. Relaxes coverage first, then perspective diversity,
/// if the strict constraint set can't be satisfied (spec §4.7 failure
/// policy) — overlap/trait-similarity constraints are never relaxed, since
/// relaxing those would reintroduce the near-duplicate experts the
/// selector exists to filter out.
#[must_use]
pub fn select(catalog: &PersonaCatalog, sub_problem: &SubProblem, target_count: usize) -> Selection {
    let target_count = target_count.clamp(3, 5);
    let mut all: Vec<&Persona> = catalog.all();
    all.sort_by(|a, b| a.code.cmp(&b.code));

    let mut warnings = Vec::new();
    let mut covering: Vec<&Persona> = all
        .iter()
        .copied()
        .filter(|p| covers_required_expertise(p, sub_problem))
        .collect();
    if covering.len() < target_count {
        warnings.push("relaxed domain-coverage requirement: insufficient matching experts".to_string());
        covering = all.clone();
    }

    let mut selected: Vec<&Persona> = Vec::new();
    for candidate in &covering {
        if selected.len() >= target_count {
            break;
        }
        if conflicts_with_selected(candidate, &selected) {
            continue;
        }
        selected.push(candidate);
    }

    let perspectives = [Perspective::Strategic, Perspective::Tactical, Perspective::Execution];
    let missing_perspectives: Vec<Perspective> = perspectives
        .into_iter()
        .filter(|p| !has_perspective(&selected, *p))
        .collect();
    if !missing_perspectives.is_empty() {
        for perspective in &missing_perspectives {
            if selected.len() >= target_count {
                break;
            }
            if let Some(replacement) = covering
                .iter()
                .copied()
                .find(|p| p.perspective == *perspective && !selected.iter().any(|s| s.code == p.code))
            {
                selected.push(replacement);
            }
        }
        if perspectives
            .iter()
            .any(|p| !has_perspective(&selected, *p))
        {
            warnings.push("relaxed perspective-diversity requirement: roster lacks full strategic/tactical/execution coverage".to_string());
        }
    }

    selected.sort_by(|a, b| a.code.cmp(&b.code));
    selected.truncate(target_count.max(selected.len().min(target_count)));

    let rationale = selected
        .iter()
        .map(|p| format!("selected for {:?} perspective and domain tags {:?}", p.perspective, p.domain_tags))
        .collect();

    Selection {
        codes: selected.iter().map(|p| p.code.clone()).collect(),
        rationale,
        warnings,
    }
}

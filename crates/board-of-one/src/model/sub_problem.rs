//! Sub-problems and their dependency DAG (spec §3, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a [`SubProblem`] within a session.
pub type SubProblemId = String;

/// Lifecycle status of a sub-problem. Mutated only by the graph driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubProblemStatus {
    /// Not yet started; waiting on dependencies or queue position.
    Pending,
    /// Currently being deliberated.
    Active,
    /// Reached a synthesis and is closed.
    Complete,
    /// Abandoned by a safety mechanism without a full deliberation.
    Skipped,
}

/// A named decision with its own goal, experts, transcript, and synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProblem {
    /// Unique id, stable across checkpoint/resume.
    pub id: SubProblemId,
    /// What this sub-problem needs to resolve.
    pub goal: String,
    /// Context specific to this sub-problem (may restate or narrow the parent context).
    pub context: Option<String>,
    /// Complexity in `[0, 1]`.
    pub complexity: f64,
    /// Ids of sub-problems that must complete before this one may become active.
    pub dependencies: BTreeSet<SubProblemId>,
    /// Current lifecycle status.
    pub status: SubProblemStatus,
    /// 0-based position in the decomposer's proposed sequence.
    pub index: usize,
    /// Key questions the decomposer identified for this sub-problem.
    pub key_questions: Vec<String>,
    /// Named risks the decomposer flagged.
    pub risks: Vec<String>,
    /// Alternatives worth considering, per the decomposer.
    pub alternatives: Vec<String>,
    /// Expertise tags required to staff this sub-problem.
    pub required_expertise: Vec<String>,
    /// Success criteria for a satisfactory resolution.
    pub success_criteria: Vec<String>,
    /// Short rationale the decomposer gave for carving out this sub-problem.
    pub rationale: String,
}

impl SubProblem {
    /// True if every dependency id is present and marked `Complete` in `completed`.
    #[must_use]
    pub fn dependencies_satisfied(&self, completed: &BTreeSet<SubProblemId>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// Topologically order sub-problems by their dependency DAG, breaking ties
/// by `index` (decomposer-proposed order) for determinism. Returns an error
/// string if a cycle is detected — the decomposer must never emit one
/// (spec §4.5), but the driver defends against it regardless.
///
/// The DAG itself is a transient `petgraph::graphmap::DiGraphMap` built from
/// each sub-problem's `dependencies`; `SubProblem` keeps a plain `BTreeSet`
/// field so the type stays checkpoint-serializable (petgraph's graph types
/// don't round-trip through serde), the same split `dashflow-memory`'s
/// knowledge graph uses between its serializable triples and the `DiGraph`
/// built from them on demand.
pub fn topological_order(sub_problems: &[SubProblem]) -> Result<Vec<SubProblemId>, String> {
    use petgraph::graphmap::DiGraphMap;
    use petgraph::Direction;
    use std::collections::{HashMap, VecDeque};

    let by_id: HashMap<&str, &SubProblem> =
        sub_problems.iter().map(|sp| (sp.id.as_str(), sp)).collect();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for sp in sub_problems {
        graph.add_node(sp.id.as_str());
    }
    for sp in sub_problems {
        for dep in &sp.dependencies {
            if !by_id.contains_key(dep.as_str()) {
                return Err(format!(
                    "sub-problem `{}` depends on unknown id `{}`",
                    sp.id, dep
                ));
            }
            graph.add_edge(dep.as_str(), sp.id.as_str(), ());
        }
    }

    let mut ready: Vec<&str> = graph
        .nodes()
        .filter(|&n| graph.neighbors_directed(n, Direction::Incoming).count() == 0)
        .collect();
    ready.sort_by_key(|id| by_id[id].index);
    let mut queue: VecDeque<&str> = ready.into();

    let mut remaining_indegree: HashMap<&str, usize> = graph
        .nodes()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();

    let mut order = Vec::with_capacity(sub_problems.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        let mut newly_ready: Vec<&str> = graph
            .neighbors_directed(id, Direction::Outgoing)
            .filter(|next| {
                let deg = remaining_indegree.get_mut(next).expect("node present");
                *deg -= 1;
                *deg == 0
            })
            .collect();
        newly_ready.sort_by_key(|id| by_id[id].index);
        for n in newly_ready {
            queue.push_back(n);
        }
    }

    if order.len() != sub_problems.len() {
        return Err("dependency cycle detected among sub-problems".to_string());
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(id: &str, deps: &[&str], index: usize) -> SubProblem {
        SubProblem {
            id: id.to_string(),
            goal: format!("goal {id}"),
            context: None,
            complexity: 0.5,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            status: SubProblemStatus::Pending,
            index,
            key_questions: vec![],
            risks: vec![],
            alternatives: vec![],
            required_expertise: vec![],
            success_criteria: vec![],
            rationale: String::new(),
        }
    }

    #[test]
    fn linear_chain_orders_correctly() {
        let sub_problems = vec![sp("sp3", &["sp2"], 2), sp("sp1", &[], 0), sp("sp2", &["sp1"], 1)];
        let order = topological_order(&sub_problems).unwrap();
        assert_eq!(order, vec!["sp1", "sp2", "sp3"]);
    }

    #[test]
    fn independent_nodes_break_ties_by_index() {
        let sub_problems = vec![sp("b", &[], 1), sp("a", &[], 0)];
        let order = topological_order(&sub_problems).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn diamond_dependency_resolves() {
        // sp1 -> sp2, sp1 -> sp3, {sp2,sp3} -> sp4
        let sub_problems = vec![
            sp("sp1", &[], 0),
            sp("sp2", &["sp1"], 1),
            sp("sp3", &["sp1"], 2),
            sp("sp4", &["sp2", "sp3"], 3),
        ];
        let order = topological_order(&sub_problems).unwrap();
        assert_eq!(order[0], "sp1");
        assert_eq!(order[3], "sp4");
    }

    #[test]
    fn cycle_is_rejected() {
        let sub_problems = vec![sp("a", &["b"], 0), sp("b", &["a"], 1)];
        assert!(topological_order(&sub_problems).is_err());
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let sub_problems = vec![sp("a", &["ghost"], 0)];
        assert!(topological_order(&sub_problems).is_err());
    }
}

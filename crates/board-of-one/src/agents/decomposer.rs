//! Decomposer agent (spec §4.5): problem → 1-5 sub-problems with a
//! dependency DAG.

use super::parse_json;
use crate::broker::{BrokerRequest, LlmBroker, ModelTier};
use crate::error::Result;
use crate::model::{topological_order, Problem, SubProblem, SubProblemStatus};
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct RawSubProblem {
    id: String,
    goal: String,
    context: Option<String>,
    complexity: f64,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    key_questions: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    alternatives: Vec<String>,
    #[serde(default)]
    required_expertise: Vec<String>,
    #[serde(default)]
    success_criteria: Vec<String>,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct DecomposerOutput {
    sub_problems: Vec<RawSubProblem>,
}

fn expected_band(complexity: f64) -> std::ops::RangeInclusive<usize> {
    match complexity {
        c if c < 0.30 => 1..=1,
        c if c < 0.70 => 2..=4,
        _ => 3..=5,
    }
}

fn into_sub_problems(raw: Vec<RawSubProblem>) -> Vec<SubProblem> {
    raw.into_iter()
        .enumerate()
        .map(|(index, r)| SubProblem {
            id: r.id,
            goal: r.goal,
            context: r.context,
            complexity: r.complexity.clamp(0.0, 1.0),
            dependencies: r.dependencies.into_iter().collect::<BTreeSet<_>>(),
            status: SubProblemStatus::Pending,
            index,
            key_questions: r.key_questions,
            risks: r.risks,
            alternatives: r.alternatives,
            required_expertise: r.required_expertise,
            success_criteria: r.success_criteria,
            rationale: r.rationale,
        })
        .collect()
}

fn atomic_fallback(problem: &Problem) -> Vec<SubProblem> {
    vec![SubProblem {
        id: "sp1".to_string(),
        goal: problem.statement.clone(),
        context: problem.context.clone(),
        complexity: problem.complexity,
        dependencies: BTreeSet::new(),
        status: SubProblemStatus::Pending,
        index: 0,
        key_questions: Vec::new(),
        risks: Vec::new(),
        alternatives: Vec::new(),
        required_expertise: Vec::new(),
        success_criteria: Vec::new(),
        rationale: "fallback: decomposition failed, treated as atomic".to_string(),
    }]
}

/// Well-formed output: the right sub-problem count for the complexity band
/// and an acyclic dependency DAG.
fn is_well_formed(sub_problems: &[SubProblem], complexity: f64) -> bool {
    if !expected_band(complexity).contains(&sub_problems.len()) {
        return false;
    }
    topological_order(sub_problems).is_ok()
}

async fn call_decomposer(broker: &dyn LlmBroker, problem: &Problem, stricter: bool) -> Result<Vec<SubProblem>> {
    let mut request = BrokerRequest::new(
        "Decompose the decision problem into 1-5 sub-problems forming a dependency DAG. \
         Respond with JSON only: {\"sub_problems\": [...]}.",
        format!(
            "Problem: {}\nContext: {}\nComplexity: {:.2}",
            problem.statement,
            problem.context.clone().unwrap_or_default(),
            problem.complexity
        ),
        ModelTier::Strong,
        "decompose",
        "decomposer",
    )
    .with_max_tokens(1200);
    if stricter {
        request = request.with_prefill("{\"sub_problems\":");
    }
    let response = broker.call(request).await?;
    let parsed: DecomposerOutput = parse_json("decomposer", &response.text)?;
    Ok(into_sub_problems(parsed.sub_problems))
}

/// Decompose `problem` into sub-problems. Malformed or structurally invalid
/// output triggers one stricter retry; a second failure falls back to a
/// single atomic sub-problem covering the original statement (spec §4.5).
pub async fn decompose(broker: &dyn LlmBroker, problem: &Problem) -> Result<Vec<SubProblem>> {
    for stricter in [false, true] {
        if let Ok(sub_problems) = call_decomposer(broker, problem, stricter).await {
            if is_well_formed(&sub_problems, problem.complexity) {
                return Ok(sub_problems);
            }
        }
    }
    Ok(atomic_fallback(problem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::StubBroker;

    #[tokio::test]
    async fn atomic_problem_yields_one_sub_problem() {
        let broker = StubBroker::new();
        let problem = Problem::new("pick a database", None, 0.16, 3, 3);
        let sub_problems = decompose(&broker, &problem).await.unwrap();
        assert_eq!(sub_problems.len(), 1);
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_atomic() {
        let broker = StubBroker::new()
            .with_response("decomposer", "not json")
            .with_response("decomposer", "still not json");
        let problem = Problem::new("expand to the EU", None, 0.55, 5, 4);
        let sub_problems = decompose(&broker, &problem).await.unwrap();
        assert_eq!(sub_problems.len(), 1);
        assert_eq!(sub_problems[0].id, "sp1");
    }

    #[tokio::test]
    async fn cyclic_dependencies_are_rejected_and_fall_back() {
        let broker = StubBroker::new().with_response(
            "decomposer",
            r#"{"sub_problems":[
                {"id":"a","goal":"g1","complexity":0.3,"dependencies":["b"]},
                {"id":"b","goal":"g2","complexity":0.3,"dependencies":["a"]}
            ]}"#,
        ).with_response("decomposer", "still not json");
        let problem = Problem::new("expand to the EU", None, 0.55, 5, 4);
        let sub_problems = decompose(&broker, &problem).await.unwrap();
        assert_eq!(sub_problems.len(), 1);
    }
}

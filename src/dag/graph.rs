// src/dag/graph.rs

//! Turning decomposer output into a validated DAG.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::subproblem::{
    AggregationSpec, Decomposition, DecompositionResult, GraphRepair, GraphStrategy, Subproblem,
    SubtaskId,
};
use crate::errors::GraphError;

/// Builds a validated subproblem set from a [`DecompositionResult`].
///
/// - A plain list becomes a chain `task_1 <- task_2 <- ... <- task_N`.
/// - A structured list has unknown dependencies pruned and is then checked
///   for empty/duplicate ids and cycles. Any of those problems discards the
///   structure and falls back to the chain over the same descriptions.
///
/// The only error is [`GraphError::Empty`]; everything else degrades.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build(raw: DecompositionResult) -> Result<Decomposition, GraphError> {
        if raw.is_empty() {
            return Err(GraphError::Empty);
        }

        match raw {
            DecompositionResult::ChainHint(tasks) => {
                debug!(count = tasks.len(), "building chain from plain subtask list");
                Ok(chain_decomposition(&tasks, GraphStrategy::Chain, Vec::new()))
            }
            DecompositionResult::StructuredHint {
                subproblems,
                levels,
                aggregation,
            } => {
                let descriptions: Vec<String> =
                    subproblems.iter().map(|sp| sp.description.clone()).collect();
                let mut repairs = Vec::new();

                match validate_structured(subproblems, &mut repairs) {
                    Ok(subproblems) => {
                        let aggregation = match aggregation {
                            Some(AggregationSpec::Lookup(id)) => AggregationSpec::Lookup(id),
                            _ => {
                                repairs.push(GraphRepair::DefaultAggregation);
                                last_lookup(&subproblems)
                            }
                        };
                        Ok(Decomposition {
                            subproblems,
                            levels_hint: levels,
                            aggregation,
                            strategy: GraphStrategy::Structured,
                            repairs,
                        })
                    }
                    Err(err) => {
                        warn!(error = %err, "structured decomposition rejected; falling back to chain");
                        repairs.push(GraphRepair::ChainFallback {
                            reason: err.to_string(),
                        });
                        Ok(chain_decomposition(
                            &descriptions,
                            GraphStrategy::ChainFallback,
                            repairs,
                        ))
                    }
                }
            }
        }
    }

    /// The simple chain strategy: `task_i` depends solely on `task_{i-1}`.
    pub fn chain<S: AsRef<str>>(descriptions: &[S]) -> Vec<Subproblem> {
        descriptions
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let deps = if i == 0 {
                    Vec::new()
                } else {
                    vec![chain_id(i)]
                };
                Subproblem {
                    id: chain_id(i + 1),
                    description: text.as_ref().to_string(),
                    dependencies: deps,
                }
            })
            .collect()
    }
}

fn chain_id(n: usize) -> SubtaskId {
    format!("task_{n}")
}

fn chain_decomposition<S: AsRef<str>>(
    descriptions: &[S],
    strategy: GraphStrategy,
    repairs: Vec<GraphRepair>,
) -> Decomposition {
    let subproblems = GraphBuilder::chain(descriptions);
    let aggregation = last_lookup(&subproblems);
    Decomposition {
        subproblems,
        levels_hint: None,
        aggregation,
        strategy,
        repairs,
    }
}

fn last_lookup(subproblems: &[Subproblem]) -> AggregationSpec {
    subproblems
        .last()
        .map(|sp| AggregationSpec::Lookup(sp.id.clone()))
        .unwrap_or_default()
}

fn validate_structured(
    subproblems: Vec<Subproblem>,
    repairs: &mut Vec<GraphRepair>,
) -> Result<Vec<Subproblem>, GraphError> {
    ensure_unique_ids(&subproblems)?;
    let subproblems = prune_unknown_dependencies(subproblems, repairs);
    detect_cycle(&subproblems)?;
    Ok(subproblems)
}

fn ensure_unique_ids(subproblems: &[Subproblem]) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for sp in subproblems {
        if sp.id.trim().is_empty() {
            return Err(GraphError::EmptyId);
        }
        if !seen.insert(sp.id.as_str()) {
            return Err(GraphError::DuplicateId(sp.id.clone()));
        }
    }
    Ok(())
}

/// Drop dependencies on ids outside the set (and repeated entries).
fn prune_unknown_dependencies(
    subproblems: Vec<Subproblem>,
    repairs: &mut Vec<GraphRepair>,
) -> Vec<Subproblem> {
    let known: HashSet<SubtaskId> = subproblems.iter().map(|sp| sp.id.clone()).collect();

    subproblems
        .into_iter()
        .map(|mut sp| {
            let mut kept: Vec<SubtaskId> = Vec::with_capacity(sp.dependencies.len());
            for dep in sp.dependencies.drain(..) {
                if !known.contains(&dep) {
                    warn!(task = %sp.id, dependency = %dep, "removing unknown dependency");
                    repairs.push(GraphRepair::PrunedDependency {
                        task: sp.id.clone(),
                        dependency: dep,
                    });
                } else if !kept.contains(&dep) {
                    kept.push(dep);
                }
            }
            sp.dependencies = kept;
            sp
        })
        .collect()
}

fn detect_cycle(subproblems: &[Subproblem]) -> Result<(), GraphError> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for sp in subproblems {
        graph.add_node(sp.id.as_str());
    }
    for sp in subproblems {
        for dep in &sp.dependencies {
            graph.add_edge(dep.as_str(), sp.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(GraphError::Cycle(cycle.node_id().to_string())),
    }
}

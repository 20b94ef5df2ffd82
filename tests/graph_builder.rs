// tests/graph_builder.rs

mod common;
use crate::common::{init_tracing, strings};

use proptest::prelude::*;

use solvedag::dag::{
    AggregationSpec, DecompositionResult, GraphBuilder, GraphRepair, GraphStrategy, Subproblem,
};
use solvedag::errors::GraphError;
use solvedag_test_utils::builders::{chain_hint, StructuredHintBuilder};

#[test]
fn chain_hint_links_each_task_to_the_previous_one() {
    init_tracing();

    let decomposition = GraphBuilder::build(chain_hint(&["a", "b", "c"])).unwrap();

    assert_eq!(decomposition.strategy, GraphStrategy::Chain);
    assert_eq!(
        decomposition.subproblems,
        vec![
            Subproblem::new("task_1", "a", Vec::<String>::new()),
            Subproblem::new("task_2", "b", ["task_1"]),
            Subproblem::new("task_3", "c", ["task_2"]),
        ]
    );
    assert_eq!(
        decomposition.aggregation,
        AggregationSpec::Lookup("task_3".to_string())
    );
    assert!(decomposition.repairs.is_empty());
}

#[test]
fn empty_input_is_an_error() {
    init_tracing();

    let err = GraphBuilder::build(DecompositionResult::ChainHint(vec![])).unwrap_err();
    assert!(matches!(err, GraphError::Empty));

    let err = GraphBuilder::build(StructuredHintBuilder::new().build()).unwrap_err();
    assert!(matches!(err, GraphError::Empty));
}

#[test]
fn structured_hint_is_kept_when_valid() {
    init_tracing();

    let raw = StructuredHintBuilder::new()
        .subproblem("load", "load data", &[])
        .subproblem("mean", "compute mean", &["load"])
        .subproblem("max", "compute max", &["load"])
        .subproblem("report", "combine", &["mean", "max"])
        .aggregate("results.get('report', None)")
        .build();

    let decomposition = GraphBuilder::build(raw).unwrap();

    assert_eq!(decomposition.strategy, GraphStrategy::Structured);
    assert_eq!(
        decomposition.ids().collect::<Vec<_>>(),
        vec!["load", "mean", "max", "report"]
    );
    assert_eq!(decomposition.aggregation.target(), Some("report"));
    assert!(decomposition.repairs.is_empty());
}

#[test]
fn unknown_dependencies_are_pruned_and_recorded() {
    init_tracing();

    let raw = StructuredHintBuilder::new()
        .subproblem("a", "first", &[])
        .subproblem("b", "second", &["a", "ghost", "a"])
        .aggregate("b")
        .build();

    let decomposition = GraphBuilder::build(raw).unwrap();

    assert_eq!(decomposition.strategy, GraphStrategy::Structured);
    assert_eq!(decomposition.get("b").unwrap().dependencies, strings(&["a"]));
    assert_eq!(
        decomposition.repairs,
        vec![GraphRepair::PrunedDependency {
            task: "b".to_string(),
            dependency: "ghost".to_string(),
        }]
    );
}

#[test]
fn cycle_falls_back_to_chain_over_same_descriptions() {
    init_tracing();

    let raw = StructuredHintBuilder::new()
        .subproblem("a", "alpha", &["c"])
        .subproblem("b", "beta", &["a"])
        .subproblem("c", "gamma", &["b"])
        .aggregate("c")
        .build();

    let decomposition = GraphBuilder::build(raw).unwrap();

    assert_eq!(decomposition.strategy, GraphStrategy::ChainFallback);
    assert_eq!(
        decomposition.subproblems,
        GraphBuilder::chain(&["alpha", "beta", "gamma"])
    );
    assert_eq!(decomposition.aggregation.target(), Some("task_3"));
    assert!(matches!(
        decomposition.repairs.last(),
        Some(GraphRepair::ChainFallback { .. })
    ));
}

#[test]
fn duplicate_ids_fall_back_to_chain() {
    init_tracing();

    let raw = StructuredHintBuilder::new()
        .subproblem("x", "one", &[])
        .subproblem("x", "two", &[])
        .build();

    let decomposition = GraphBuilder::build(raw).unwrap();

    assert_eq!(decomposition.strategy, GraphStrategy::ChainFallback);
    assert_eq!(decomposition.ids().collect::<Vec<_>>(), vec!["task_1", "task_2"]);
    match &decomposition.repairs[0] {
        GraphRepair::ChainFallback { reason } => assert!(reason.contains("x")),
        other => panic!("unexpected repair: {other:?}"),
    }
}

#[test]
fn missing_aggregation_defaults_to_last_subproblem() {
    init_tracing();

    let raw = StructuredHintBuilder::new()
        .subproblem("p", "first", &[])
        .subproblem("q", "second", &[])
        .aggregate("lambda r: r")
        .build();

    let decomposition = GraphBuilder::build(raw).unwrap();

    assert_eq!(decomposition.aggregation.target(), Some("q"));
    assert_eq!(decomposition.repairs, vec![GraphRepair::DefaultAggregation]);
}

proptest! {
    #[test]
    fn chain_has_n_nodes_each_depending_on_predecessor(
        descriptions in proptest::collection::vec("[a-z ]{1,12}", 1..20)
    ) {
        let decomposition = GraphBuilder::build(
            DecompositionResult::ChainHint(descriptions.clone())
        ).unwrap();

        prop_assert_eq!(decomposition.subproblems.len(), descriptions.len());
        for (i, sp) in decomposition.subproblems.iter().enumerate() {
            prop_assert_eq!(&sp.id, &format!("task_{}", i + 1));
            prop_assert_eq!(&sp.description, &descriptions[i]);
            if i == 0 {
                prop_assert!(sp.dependencies.is_empty());
            } else {
                prop_assert_eq!(&sp.dependencies, &vec![format!("task_{}", i)]);
            }
        }
    }

    #[test]
    fn builder_output_is_always_acyclic_with_known_dependencies(
        edges in proptest::collection::vec(
            proptest::collection::vec(0..8usize, 0..4),
            1..8
        )
    ) {
        // Arbitrary dependencies, including self loops, cycles and ids
        // outside the set (index 7 may not exist).
        let mut builder = StructuredHintBuilder::new();
        for (i, deps) in edges.iter().enumerate() {
            let dep_ids: Vec<String> = deps.iter().map(|d| format!("n{d}")).collect();
            let dep_refs: Vec<&str> = dep_ids.iter().map(String::as_str).collect();
            builder = builder.subproblem(&format!("n{i}"), &format!("node {i}"), &dep_refs);
        }

        let decomposition = GraphBuilder::build(builder.build()).unwrap();
        let ids: Vec<&str> = decomposition.ids().collect();

        for sp in &decomposition.subproblems {
            for dep in &sp.dependencies {
                prop_assert!(ids.contains(&dep.as_str()));
            }
        }
        let levels = solvedag::dag::LevelPlanner::plan(&decomposition.subproblems);
        prop_assert!(solvedag::dag::LevelPlanner::satisfies_invariant(
            &levels,
            &decomposition.subproblems
        ));
    }
}

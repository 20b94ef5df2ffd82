// tests/decomposition_parsing.rs

mod common;
use crate::common::{init_tracing, strings};

use solvedag::dag::{AggregationSpec, DecompositionResult, Subproblem};
use solvedag::errors::SynthesisError;
use solvedag::synth::parse::{parse_decomposition, strip_code_fences};

#[test]
fn json_array_becomes_chain_hint() {
    init_tracing();

    let parsed = parse_decomposition(r#"["load the file", "count words"]"#, 2).unwrap();

    assert_eq!(
        parsed,
        DecompositionResult::ChainHint(strings(&["load the file", "count words"]))
    );
}

#[test]
fn json_array_is_kept_even_when_size_differs() {
    init_tracing();

    let reply = "Here you go:\n```json\n[\"a\", \"b\", \"c\", \"d\"]\n```";
    let parsed = parse_decomposition(reply, 2).unwrap();

    assert_eq!(parsed.len(), 4);
}

#[test]
fn structured_object_with_triples() {
    init_tracing();

    let reply = r#"{
        "subproblems": [
            ["a", "fetch", []],
            ["b", "transform", ["a"]]
        ],
        "levels": [["a"], ["b"]],
        "aggregation": "results.get('b', None)"
    }"#;

    let parsed = parse_decomposition(reply, 2).unwrap();

    assert_eq!(
        parsed,
        DecompositionResult::StructuredHint {
            subproblems: vec![
                Subproblem::new("a", "fetch", Vec::<String>::new()),
                Subproblem::new("b", "transform", ["a"]),
            ],
            levels: Some(vec![strings(&["a"]), strings(&["b"])]),
            aggregation: Some(AggregationSpec::Lookup("b".to_string())),
        }
    );
}

#[test]
fn structured_object_with_objects_and_level_triples() {
    init_tracing();

    let reply = r#"{
        "subproblems": [
            {"id": "x", "description": "first"},
            {"id": "y", "description": "second", "dependencies": ["x"]}
        ],
        "levels": [[["x", "first", []]], [{"id": "y", "description": "second"}]],
        "aggregation_code": "y"
    }"#;

    let parsed = parse_decomposition(reply, 2).unwrap();

    match parsed {
        DecompositionResult::StructuredHint {
            subproblems,
            levels,
            aggregation,
        } => {
            assert_eq!(subproblems[1].dependencies, strings(&["x"]));
            assert!(subproblems[0].dependencies.is_empty());
            assert_eq!(levels, Some(vec![strings(&["x"]), strings(&["y"])]));
            assert_eq!(aggregation, Some(AggregationSpec::Lookup("y".to_string())));
        }
        other => panic!("expected structured hint, got {other:?}"),
    }
}

#[test]
fn free_text_lines_lose_list_markers_and_are_truncated() {
    init_tracing();

    let reply = "1. Read input\n2) Parse numbers\n- Sum them\n* Print\n• Extra";
    let parsed = parse_decomposition(reply, 3).unwrap();

    assert_eq!(
        parsed,
        DecompositionResult::ChainHint(strings(&["Read input", "Parse numbers", "Sum them"]))
    );
}

#[test]
fn blank_reply_is_a_parse_error() {
    init_tracing();

    let err = parse_decomposition("   \n\n  ", 3).unwrap_err();
    assert!(matches!(err, SynthesisError::Parse(_)));
}

#[test]
fn code_fences_are_stripped() {
    init_tracing();

    assert_eq!(
        strip_code_fences("```python\nresult = 42\n```"),
        "result = 42"
    );
    assert_eq!(strip_code_fences("```\nx = 1\ny = 2\n```\n"), "x = 1\ny = 2");
    assert_eq!(strip_code_fences("result = 7"), "result = 7");
}

#[test]
fn aggregation_expressions() {
    init_tracing();

    let lookup = |id: &str| AggregationSpec::Lookup(id.to_string());

    assert_eq!(AggregationSpec::parse("results.get('task_3', None)"), lookup("task_3"));
    assert_eq!(AggregationSpec::parse(r#"results["final"]"#), lookup("final"));
    assert_eq!(AggregationSpec::parse("results['sum']"), lookup("sum"));
    assert_eq!(AggregationSpec::parse("  report "), lookup("report"));
    assert_eq!(AggregationSpec::parse(""), AggregationSpec::Default);
    assert_eq!(AggregationSpec::parse("None"), AggregationSpec::Default);
    assert_eq!(
        AggregationSpec::parse("sum(results.values())"),
        AggregationSpec::Default
    );
}

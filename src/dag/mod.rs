// src/dag/mod.rs

//! Decomposition graphs.
//!
//! - [`subproblem`] holds the data model (subproblems, levels, aggregation).
//! - [`graph`] validates decomposer output into a DAG, repairing what it can.
//! - [`planner`] layers a DAG into levels that can run concurrently.

pub mod graph;
pub mod planner;
pub mod subproblem;

pub use graph::GraphBuilder;
pub use planner::LevelPlanner;
pub use subproblem::{
    AggregationSpec, Decomposition, DecompositionResult, GraphRepair, GraphStrategy, Level,
    Subproblem, SubtaskId,
};

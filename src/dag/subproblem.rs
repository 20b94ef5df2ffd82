// src/dag/subproblem.rs

//! Decomposition data model: subproblems, levels and aggregation specs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical subtask id type (`task_1`, `fetch_data`, ...).
pub type SubtaskId = String;

/// One node of the decomposition DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    pub id: SubtaskId,
    pub description: String,
    /// Ids of subproblems whose results this one consumes.
    #[serde(default)]
    pub dependencies: Vec<SubtaskId>,
}

impl Subproblem {
    pub fn new<I, S>(id: impl Into<String>, description: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: deps.into_iter().map(Into::into).collect(),
        }
    }
}

/// Subproblems belonging to the same topological layer.
pub type Level = Vec<Subproblem>;

/// Which result-map entry is the final answer of a decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AggregationSpec {
    /// Return the result recorded under this id.
    Lookup(SubtaskId),
    /// Nothing usable was supplied.
    Default,
}

static LOOKUP_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^results\s*(?:\.get\(\s*|\[\s*)["']([^"']+)["']"#).expect("valid lookup regex")
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid id regex"));

impl AggregationSpec {
    /// Parse an aggregation expression as produced by a decomposer.
    ///
    /// Understands `results.get('id', ...)`, `results["id"]` and a bare id.
    /// Anything else is treated as malformed and yields `Default`.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        if let Some(caps) = LOOKUP_EXPR.captures(expr) {
            return AggregationSpec::Lookup(caps[1].trim().to_string());
        }
        match expr {
            "" | "None" | "null" => AggregationSpec::Default,
            id if BARE_ID.is_match(id) => AggregationSpec::Lookup(id.to_string()),
            _ => AggregationSpec::Default,
        }
    }

    /// The subtask id this spec points at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            AggregationSpec::Lookup(id) => Some(id.as_str()),
            AggregationSpec::Default => None,
        }
    }
}

impl Default for AggregationSpec {
    fn default() -> Self {
        AggregationSpec::Default
    }
}

/// Raw output of a decomposer, resolved once at the graph-builder boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompositionResult {
    /// Plain ordered subtask descriptions with no dependency information.
    ChainHint(Vec<String>),
    /// Explicit id / description / dependency triples.
    StructuredHint {
        subproblems: Vec<Subproblem>,
        /// Optional grouping of ids into levels.
        levels: Option<Vec<Vec<SubtaskId>>>,
        aggregation: Option<AggregationSpec>,
    },
}

impl DecompositionResult {
    /// Subtask descriptions in input order.
    pub fn descriptions(&self) -> Vec<String> {
        match self {
            DecompositionResult::ChainHint(tasks) => tasks.clone(),
            DecompositionResult::StructuredHint { subproblems, .. } => subproblems
                .iter()
                .map(|sp| sp.description.clone())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DecompositionResult::ChainHint(tasks) => tasks.len(),
            DecompositionResult::StructuredHint { subproblems, .. } => subproblems.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the final dependency graph was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStrategy {
    /// Synthesized chain from a plain list.
    Chain,
    /// Structured input accepted after validation.
    Structured,
    /// Structured input rejected; chain derived from its descriptions.
    ChainFallback,
}

/// A non-fatal repair applied while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "repair", rename_all = "snake_case")]
pub enum GraphRepair {
    PrunedDependency {
        task: SubtaskId,
        dependency: SubtaskId,
    },
    ChainFallback {
        reason: String,
    },
    DefaultAggregation,
}

impl fmt::Display for GraphRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphRepair::PrunedDependency { task, dependency } => {
                write!(f, "removed unknown dependency '{dependency}' from '{task}'")
            }
            GraphRepair::ChainFallback { reason } => {
                write!(f, "{reason}; using simplified chain")
            }
            GraphRepair::DefaultAggregation => {
                f.write_str("no usable aggregation spec; using last subtask")
            }
        }
    }
}

/// Validated output of [`GraphBuilder`](crate::dag::GraphBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    pub subproblems: Vec<Subproblem>,
    /// Level grouping supplied upstream, kept only for structured graphs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels_hint: Option<Vec<Vec<SubtaskId>>>,
    pub aggregation: AggregationSpec,
    pub strategy: GraphStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repairs: Vec<GraphRepair>,
}

impl Decomposition {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.subproblems.iter().map(|sp| sp.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Subproblem> {
        self.subproblems.iter().find(|sp| sp.id == id)
    }
}

// src/synth/parse.rs

//! Parsing model replies.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::dag::{AggregationSpec, DecompositionResult, Subproblem, SubtaskId};
use crate::errors::SynthesisError;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]\s+|\d{1,2}[.)]\s*)").expect("valid marker regex"));

/// Remove a surrounding Markdown code fence (```` ```python ```` or ```` ``` ````).
pub fn strip_code_fences(text: &str) -> String {
    let mut code = text.trim();
    if let Some(rest) = code.strip_prefix("```") {
        // Drop the info string (e.g. `python`) on the opening line.
        code = match rest.find('\n') {
            Some(pos) if !rest[..pos].contains(' ') => &rest[pos + 1..],
            _ => rest,
        };
    }
    if let Some(rest) = code.trim_end().strip_suffix("```") {
        code = rest;
    }
    code.trim().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSubproblem {
    Triple(SubtaskId, String, Vec<SubtaskId>),
    Object(Subproblem),
}

impl From<RawSubproblem> for Subproblem {
    fn from(raw: RawSubproblem) -> Self {
        match raw {
            RawSubproblem::Triple(id, description, dependencies) => Subproblem {
                id,
                description,
                dependencies,
            },
            RawSubproblem::Object(sp) => sp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLevelEntry {
    Id(SubtaskId),
    Triple(SubtaskId, String, Vec<SubtaskId>),
    Object(Subproblem),
}

impl RawLevelEntry {
    fn into_id(self) -> SubtaskId {
        match self {
            RawLevelEntry::Id(id) | RawLevelEntry::Triple(id, _, _) => id,
            RawLevelEntry::Object(sp) => sp.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStructured {
    subproblems: Vec<RawSubproblem>,
    #[serde(default)]
    levels: Option<Vec<Vec<RawLevelEntry>>>,
    #[serde(default, alias = "aggregation_code")]
    aggregation: Option<String>,
}

/// Parse a decomposition reply.
///
/// Accepted, in order:
/// 1. a JSON object with `subproblems` (and optional `levels`, `aggregation`)
/// 2. a JSON array of strings
/// 3. free text, one subtask per line, list markers removed; truncated to
///    `target_count`
pub fn parse_decomposition(
    text: &str,
    target_count: usize,
) -> Result<DecompositionResult, SynthesisError> {
    let text = strip_code_fences(text);

    if let Some(structured) = json_slice(&text, '{', '}')
        .and_then(|s| serde_json::from_str::<RawStructured>(s).ok())
    {
        let subproblems: Vec<Subproblem> =
            structured.subproblems.into_iter().map(Subproblem::from).collect();
        if !subproblems.is_empty() {
            return Ok(DecompositionResult::StructuredHint {
                subproblems,
                levels: structured.levels.map(|levels| {
                    levels
                        .into_iter()
                        .map(|level| level.into_iter().map(RawLevelEntry::into_id).collect())
                        .collect()
                }),
                aggregation: structured.aggregation.as_deref().map(AggregationSpec::parse),
            });
        }
    }

    if let Some(slice) = json_slice(&text, '[', ']') {
        match serde_json::from_str::<Vec<String>>(slice) {
            Ok(tasks) if !tasks.is_empty() => {
                if tasks.len() != target_count {
                    warn!(
                        expected = target_count,
                        got = tasks.len(),
                        "decomposition size differs from request; using as is"
                    );
                }
                return Ok(DecompositionResult::ChainHint(tasks));
            }
            _ => warn!("could not parse JSON array from decomposition; splitting lines"),
        }
    }

    let tasks: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(target_count.max(1))
        .collect();

    if tasks.is_empty() {
        return Err(SynthesisError::Parse(
            "decomposition reply contained no subtasks".to_string(),
        ));
    }
    Ok(DecompositionResult::ChainHint(tasks))
}

/// Substring from the first `open` to the last `close`, inclusive.
fn json_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

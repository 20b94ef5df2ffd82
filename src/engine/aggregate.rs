// src/engine/aggregate.rs

//! Resolving the final value of a decomposition.

use serde_json::Value;
use tracing::{debug, warn};

use crate::dag::{AggregationSpec, Level, SubtaskId};
use crate::engine::results::ResultMap;
use crate::errors::AggregationError;

/// Outcome of aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub value: Value,
    /// Id whose result was returned, if any result existed.
    pub source: Option<SubtaskId>,
    /// Why the spec target was not used, if it wasn't.
    pub fallback: Option<AggregationError>,
}

/// Picks the result-map entry named by the aggregation spec, falling back to
/// the last subtask of the last level. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn aggregate(spec: &AggregationSpec, levels: &[Level], results: &ResultMap) -> Aggregated {
        match resolve(spec, results) {
            Ok((id, value)) => {
                debug!(subtask = %id, "aggregated result from spec target");
                Aggregated {
                    value,
                    source: Some(id),
                    fallback: None,
                }
            }
            Err(reason) => {
                let last = levels
                    .last()
                    .and_then(|level| level.last())
                    .map(|sp| sp.id.clone());
                warn!(error = %reason, fallback = ?last, "using last subtask result");

                match last {
                    Some(id) => match results.value_of(&id) {
                        Some(value) => Aggregated {
                            value,
                            source: Some(id),
                            fallback: Some(reason),
                        },
                        None => Aggregated {
                            value: Value::String(format!("No result recorded for {id}")),
                            source: None,
                            fallback: Some(reason),
                        },
                    },
                    None => Aggregated {
                        value: Value::String("No subtasks were executed".to_string()),
                        source: None,
                        fallback: Some(reason),
                    },
                }
            }
        }
    }
}

fn resolve(spec: &AggregationSpec, results: &ResultMap) -> Result<(SubtaskId, Value), AggregationError> {
    let id = spec.target().ok_or(AggregationError::Unspecified)?;
    results
        .value_of(id)
        .map(|value| (id.to_string(), value))
        .ok_or_else(|| AggregationError::MissingTarget(id.to_string()))
}

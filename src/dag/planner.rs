// src/dag/planner.rs

//! Topological layering of a decomposition into executable levels.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::subproblem::{Decomposition, Level, Subproblem, SubtaskId};

/// Splits a DAG into levels: every subproblem's dependencies live in strictly
/// earlier levels, and subproblems within one level are independent.
///
/// The planner never stalls. If no remaining node is ready (a residual cycle),
/// the first remaining node in input order has its dependencies on other
/// remaining nodes stripped and is forced into its own level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelPlanner;

impl LevelPlanner {
    /// Plan a validated decomposition, adopting its levels hint when the hint
    /// satisfies the level invariant.
    pub fn plan_decomposition(decomposition: &Decomposition) -> Vec<Level> {
        if let Some(hint) = &decomposition.levels_hint {
            match levels_from_hint(hint, &decomposition.subproblems) {
                Some(levels) => {
                    debug!(levels = levels.len(), "using supplied levels hint");
                    return levels;
                }
                None => {
                    warn!("supplied levels hint is inconsistent with dependencies; deriving levels");
                }
            }
        }
        Self::plan(&decomposition.subproblems)
    }

    pub fn plan(subproblems: &[Subproblem]) -> Vec<Level> {
        let all_ids: HashSet<&str> = subproblems.iter().map(|sp| sp.id.as_str()).collect();

        let mut remaining: Vec<Subproblem> = subproblems
            .iter()
            .cloned()
            .map(|mut sp| {
                let before = sp.dependencies.len();
                sp.dependencies.retain(|dep| all_ids.contains(dep.as_str()));
                if sp.dependencies.len() != before {
                    warn!(task = %sp.id, "ignoring dependencies outside the subproblem set");
                }
                sp
            })
            .collect();

        let mut levels: Vec<Level> = Vec::new();

        while !remaining.is_empty() {
            let remaining_ids: HashSet<SubtaskId> =
                remaining.iter().map(|sp| sp.id.clone()).collect();

            let (ready, blocked): (Vec<Subproblem>, Vec<Subproblem>) = remaining
                .into_iter()
                .partition(|sp| sp.dependencies.iter().all(|d| !remaining_ids.contains(d)));

            if ready.is_empty() {
                let mut blocked = blocked;
                let mut forced = blocked.remove(0);
                forced.dependencies.retain(|d| !remaining_ids.contains(d));
                warn!(
                    task = %forced.id,
                    level = levels.len(),
                    "no subproblem ready; forcing one to break a dependency cycle"
                );
                levels.push(vec![forced]);
                remaining = blocked;
            } else {
                debug!(level = levels.len(), size = ready.len(), "planned level");
                levels.push(ready);
                remaining = blocked;
            }
        }

        levels
    }

    /// Check the level invariant against a subproblem set: every id appears in
    /// exactly one level and all dependencies sit in strictly earlier levels.
    pub fn satisfies_invariant(levels: &[Level], subproblems: &[Subproblem]) -> bool {
        let expected: HashSet<&str> = subproblems.iter().map(|sp| sp.id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for level in levels {
            if level.is_empty() {
                return false;
            }
            for sp in level {
                if !sp.dependencies.iter().all(|d| seen.contains(d.as_str())) {
                    return false;
                }
            }
            for sp in level {
                if !seen.insert(sp.id.as_str()) {
                    return false;
                }
            }
        }

        seen == expected
    }
}

fn levels_from_hint(hint: &[Vec<SubtaskId>], subproblems: &[Subproblem]) -> Option<Vec<Level>> {
    let by_id: HashMap<&str, &Subproblem> =
        subproblems.iter().map(|sp| (sp.id.as_str(), sp)).collect();

    let mut levels = Vec::with_capacity(hint.len());
    for ids in hint {
        let mut level = Vec::with_capacity(ids.len());
        for id in ids {
            level.push((*by_id.get(id.as_str())?).clone());
        }
        levels.push(level);
    }

    LevelPlanner::satisfies_invariant(&levels, subproblems).then_some(levels)
}

//! Ingredient Allocation
//!
//! Greedy single-pass assignment of candidate stacks to requirement lines.
//! No backtracking across lines, and a stack touched by one line is never
//! offered to another, so a feasible assignment can be missed when stacks
//! would have to be shared.

use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::components::order::RequirementLine;
use crate::systems::search::Candidate;

/// Take `count` units from `entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub entity: Entity,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationFailure {
    #[error("need {needed} {def_name} but only {available} available")]
    Insufficient { def_name: String, needed: u32, available: u32 },
    #[error("need {needed} {def_name} but only {found} usable after earlier lines")]
    Exhausted { def_name: String, needed: u32, found: u32 },
}

impl AllocationFailure {
    pub fn def_name(&self) -> &str {
        match self {
            AllocationFailure::Insufficient { def_name, .. } | AllocationFailure::Exhausted { def_name, .. } => {
                def_name
            }
        }
    }
}

/// Assigns candidates to every line, or fails without a partial result.
///
/// `candidates` should be sorted closest first; the order is kept.
pub fn allocate(
    requirements: &[RequirementLine],
    candidates: &[Candidate],
    excluded: &[Entity],
) -> Result<Vec<Assignment>, AllocationFailure> {
    let usable = |c: &&Candidate| !excluded.contains(&c.entity);

    let mut available: HashMap<&str, u32> = HashMap::new();
    for candidate in candidates.iter().filter(usable) {
        *available.entry(candidate.def_name.as_str()).or_insert(0) += candidate.stack_count;
    }

    let mut used: HashSet<Entity> = HashSet::new();
    let mut assignments = Vec::new();

    for line in requirements {
        let total = available.get(line.def_name.as_str()).copied().unwrap_or(0);
        if total < line.count {
            return Err(AllocationFailure::Insufficient {
                def_name: line.def_name.clone(),
                needed: line.count,
                available: total,
            });
        }

        let mut remaining = line.count;
        for candidate in candidates.iter().filter(usable) {
            if remaining == 0 {
                break;
            }
            if candidate.def_name != line.def_name || used.contains(&candidate.entity) {
                continue;
            }
            if !line.quality.accepts(candidate.quality) {
                continue;
            }
            let take = remaining.min(candidate.stack_count);
            if take == 0 {
                continue;
            }
            used.insert(candidate.entity);
            assignments.push(Assignment {
                entity: candidate.entity,
                count: take,
            });
            remaining -= take;
        }

        if remaining > 0 {
            return Err(AllocationFailure::Exhausted {
                def_name: line.def_name.clone(),
                needed: line.count,
                found: line.count - remaining,
            });
        }
        if let Some(total) = available.get_mut(line.def_name.as_str()) {
            *total -= line.count;
        }
    }

    Ok(assignments)
}

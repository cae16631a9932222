//! Column planning: which attribute columns a result row carries
//!
//! Shown columns come first. Unused capacity up to the desired count is
//! filled with the category's most interesting attributes. Sort keys are
//! always projected, evicting the least interesting fillers if the budget
//! is already spent.

use super::request::QueryRequest;
use crate::catalog::{AttributeId, Registry};
use serde::Serialize;
use std::collections::HashSet;

/// The planned column set for one query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Plan {
    /// shown, then fillers, then sort additions
    pub projected: Vec<AttributeId>,
    /// Columns auto-selected by interest ranking
    pub fillers: Vec<AttributeId>,
}

pub fn plan(request: &QueryRequest, registry: &Registry) -> Plan {
    let shown = &request.shown;
    let quota = request.desired_count.saturating_sub(shown.len());
    let mut fillers = registry.top_by_interest(&request.category, shown, quota);

    let mut sort_additions: Vec<AttributeId> = Vec::new();
    for sorter in &request.sorters {
        let id = &sorter.attribute;
        if !shown.contains(id) && !fillers.contains(id) && !sort_additions.contains(id) {
            sort_additions.push(id.clone());
        }
    }

    // Fillers are ordered by descending interest, so evict from the back.
    // A filler that is itself a sort key stays.
    let sort_keys: HashSet<&AttributeId> = request.sorters.iter().map(|s| &s.attribute).collect();
    let mut overflow = (fillers.len() + sort_additions.len()).saturating_sub(quota);
    let mut idx = fillers.len();
    while overflow > 0 && idx > 0 {
        idx -= 1;
        if !sort_keys.contains(&fillers[idx]) {
            fillers.remove(idx);
            overflow -= 1;
        }
    }

    let projected = shown
        .iter()
        .chain(fillers.iter())
        .chain(sort_additions.iter())
        .cloned()
        .collect();

    Plan { projected, fillers }
}

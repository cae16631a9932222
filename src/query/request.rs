//! Query request shape and parsing
//!
//! The wire form is five flat strings (`t`, `sh`, `so`, `f`, `c`), e.g.
//! `t=city&sh=a,b&so=pop:-1&f=area:gt:100,mayor:nn:&c=8`.

use super::error::{QueryError, QueryResult};
use crate::catalog::{AttributeId, Registry};
use serde::{Deserialize, Serialize};

/// Sort direction of one sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "" | "1" | "asc" => Some(Self::Ascending),
            "-1" | "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub attribute: AttributeId,
    pub direction: SortDirection,
}

impl Sorter {
    pub fn new(attribute: impl Into<AttributeId>, direction: SortDirection) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }

    pub fn ascending(attribute: impl Into<AttributeId>) -> Self {
        Self::new(attribute, SortDirection::Ascending)
    }

    pub fn descending(attribute: impl Into<AttributeId>) -> Self {
        Self::new(attribute, SortDirection::Descending)
    }
}

/// Filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// `lt`: strictly less than the operand
    Lt,
    /// `gt`: strictly greater than the operand
    Gt,
    /// `nu`: attribute absent
    Null,
    /// `nn`: attribute present
    NotNull,
    /// `ne`: not equal to the operand
    Ne,
    /// `eq` (or empty): equal to the operand
    Eq,
}

impl Condition {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "nu" => Some(Self::Null),
            "nn" => Some(Self::NotNull),
            "ne" => Some(Self::Ne),
            "eq" | "" => Some(Self::Eq),
            _ => None,
        }
    }

    /// `nu` or `nn`: tests only whether the attribute is present
    pub fn is_presence(self) -> bool {
        matches!(self, Self::Null | Self::NotNull)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub attribute: AttributeId,
    pub condition: Condition,
    pub operand: String,
}

impl Filter {
    pub fn new(attribute: impl Into<AttributeId>, condition: Condition, operand: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            condition,
            operand: operand.into(),
        }
    }
}

/// The raw request as it arrives from a transport
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuery {
    /// Category to query
    #[serde(default, rename = "t")]
    pub category: String,
    /// Comma-separated shown attribute ids
    #[serde(default, rename = "sh")]
    pub shown: String,
    /// Comma-separated `id:direction`
    #[serde(default, rename = "so")]
    pub sorters: String,
    /// Comma-separated `id:condition:value`
    #[serde(default, rename = "f")]
    pub filters: String,
    /// Desired column count
    #[serde(default, rename = "c")]
    pub count: String,
}

/// A parsed query request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub category: String,
    /// Explicit display columns, order preserved, duplicates removed
    pub shown: Vec<AttributeId>,
    pub sorters: Vec<Sorter>,
    pub filters: Vec<Filter>,
    pub desired_count: usize,
}

impl QueryRequest {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_shown(mut self, ids: &[&str]) -> Self {
        self.shown = dedup(ids.iter().map(|id| AttributeId::from(*id)));
        self
    }

    pub fn with_sorter(mut self, sorter: Sorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_desired_count(mut self, count: usize) -> Self {
        self.desired_count = count;
        self
    }

    /// Parse the wire form. Empty list entries are skipped.
    pub fn parse(raw: &RawQuery) -> QueryResult<Self> {
        let shown = dedup(split_list(&raw.shown).map(AttributeId::from));

        let sorters = split_list(&raw.sorters)
            .map(|clause| {
                let (id, direction) = clause.split_once(':').unwrap_or((clause, ""));
                if id.is_empty() {
                    return Err(QueryError::malformed("sort", clause, "missing attribute id"));
                }
                let direction = SortDirection::parse(direction)
                    .ok_or_else(|| QueryError::malformed("sort", clause, "direction must be 1 or -1"))?;
                Ok(Sorter::new(id, direction))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let filters = split_list(&raw.filters)
            .map(|clause| {
                let mut parts = clause.splitn(3, ':');
                let id = parts.next().unwrap_or_default();
                let Some(condition_text) = parts.next() else {
                    return Err(QueryError::malformed(
                        "filter",
                        clause,
                        "expected id:condition:value",
                    ));
                };
                if id.is_empty() {
                    return Err(QueryError::malformed("filter", clause, "missing attribute id"));
                }
                let condition = Condition::parse(condition_text).ok_or_else(|| {
                    QueryError::malformed("filter", clause, format!("unknown condition '{}'", condition_text))
                })?;
                // nu and nn never read the operand, so it may be left off
                let operand = match (parts.next(), condition.is_presence()) {
                    (Some(operand), _) => operand,
                    (None, true) => "",
                    (None, false) => {
                        return Err(QueryError::malformed(
                            "filter",
                            clause,
                            "expected id:condition:value",
                        ))
                    }
                };
                Ok(Filter::new(id, condition, operand))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let count = raw.count.trim();
        let desired_count = if count.is_empty() {
            0
        } else {
            count
                .parse::<usize>()
                .map_err(|e| QueryError::malformed("count", count, e.to_string()))?
        };

        Ok(Self {
            category: raw.category.trim().to_string(),
            shown,
            sorters,
            filters,
            desired_count,
        })
    }

    /// Reject sort and filter clauses that reference unknown attributes
    pub fn validate(&self, registry: &Registry) -> QueryResult<()> {
        let referenced = self
            .sorters
            .iter()
            .map(|s| &s.attribute)
            .chain(self.filters.iter().map(|f| &f.attribute));
        for id in referenced {
            if !registry.is_column(id.as_str()) {
                return Err(QueryError::UnknownAttribute(id.to_string()));
            }
        }
        Ok(())
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn dedup(ids: impl Iterator<Item = AttributeId>) -> Vec<AttributeId> {
    let mut out: Vec<AttributeId> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

//! Category definitions

use super::attribute::AttributeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node of the category DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique key
    pub name: String,
    pub label: String,
    /// Parent category names (multiple inheritance of attributes)
    #[serde(default)]
    pub parents: BTreeSet<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Default display columns, in display order
    #[serde(default)]
    pub showers: Vec<AttributeId>,
}

impl Category {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            parents: BTreeSet::new(),
            aliases: Vec::new(),
            showers: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.insert(parent.into());
        self
    }

    pub fn with_showers(mut self, showers: Vec<AttributeId>) -> Self {
        self.showers = showers;
        self
    }
}

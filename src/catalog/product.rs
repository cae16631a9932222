//! Product: a catalog entity with an open-ended attribute map

use super::datum::Datum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Unique identifier for a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new random ProductId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute id → datum. Keys differ from product to product.
pub type ProductData = BTreeMap<String, Datum>;

/// Column keys filled from stub metadata rather than from the registry
pub mod reserved {
    pub const LABEL: &str = "label";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const DEPICTION: &str = "depiction";

    pub const ALL: [&str; 3] = [LABEL, THUMBNAIL, DEPICTION];

    pub fn contains(key: &str) -> bool {
        ALL.contains(&key)
    }
}

/// A catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    pub source: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub data: ProductData,
}

impl Product {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            categories: BTreeSet::new(),
            aliases: BTreeSet::new(),
            source: source.into(),
            verified: false,
            data: ProductData::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_datum(mut self, key: impl Into<String>, datum: Datum) -> Self {
        self.data.insert(key.into(), datum);
        self
    }

    /// Whether the product belongs to `category`
    pub fn is_of_type(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}

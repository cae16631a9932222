//! Attribute definitions

use serde::{Deserialize, Serialize};

/// Unique identifier for an attribute
///
/// Serializes as a plain string. Attribute ids double as the keys of a
/// product's data map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AttributeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttributeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AttributeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for AttributeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declared value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Date,
    Number,
    String,
    Resource,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Number => "number",
            Self::String => "string",
            Self::Resource => "resource",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

/// An immutable attribute definition from the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    /// Unique name, matched against predicate local names during enrichment
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Lower bound (number attributes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound (number attributes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether fractional values are expected (number attributes only)
    #[serde(default, rename = "float")]
    pub is_float: bool,
    /// Rank used to pick filler columns; higher is more interesting
    #[serde(default)]
    pub interest: i64,
    /// Owning category name
    pub category: String,
}

impl Attribute {
    pub fn new(
        id: impl Into<AttributeId>,
        name: impl Into<String>,
        value_type: ValueType,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value_type,
            min: None,
            max: None,
            is_float: false,
            interest: 0,
            category: category.into(),
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_float(mut self, is_float: bool) -> Self {
        self.is_float = is_float;
        self
    }

    pub fn with_interest(mut self, interest: i64) -> Self {
        self.interest = interest;
        self
    }

    /// Whether `value` lies within the declared bounds
    pub fn in_bounds(&self, value: f64) -> bool {
        let above_min = self.min.map_or(true, |min| value >= min);
        let below_max = self.max.map_or(true, |max| value <= max);
        above_min && below_max
    }
}

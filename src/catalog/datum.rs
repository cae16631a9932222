//! Datum: one attribute's recorded value(s) on a product
//!
//! A datum starts out holding a single value. When reconciliation observes a
//! second value for the same attribute the datum is promoted to an ordered
//! sequence (`DatumValue::Many`), and so is its resource reference if any
//! value carried one.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A typed scalar value
///
/// Serialized with its type tag (`{"type": "date", "value": "1990-05-12"}`) so
/// stored data reads back without consulting the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    String(String),
    /// Marker for a date attribute whose raw text did not parse
    InvalidDate(String),
    /// Marker for a number attribute whose raw text did not parse
    InvalidNumber(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Cross-type sort rank; invalid markers sort below every valid value
    fn rank(&self) -> u8 {
        match self {
            Self::InvalidDate(_) | Self::InvalidNumber(_) => 0,
            Self::Boolean(_) => 1,
            Self::Number(_) => 2,
            Self::Date(_) => 3,
            Self::String(_) => 4,
        }
    }

    /// Total order used for sorting products
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::InvalidDate(a), Self::InvalidDate(b))
            | (Self::InvalidNumber(a), Self::InvalidNumber(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Compare against a textual filter operand, coercing the operand to this
    /// value's type. Returns `None` when the two cannot be compared.
    pub fn compare_operand(&self, operand: &str) -> Option<Ordering> {
        match self {
            Self::Boolean(b) => match operand.trim() {
                "true" => Some(b.cmp(&true)),
                "false" => Some(b.cmp(&false)),
                _ => None,
            },
            Self::Number(n) => operand.trim().parse::<f64>().ok().and_then(|o| n.partial_cmp(&o)),
            Self::Date(d) => parse_date(operand).map(|o| d.cmp(&o)),
            Self::String(s) => Some(s.as_str().cmp(operand)),
            Self::InvalidDate(_) | Self::InvalidNumber(_) => None,
        }
    }
}

/// Parse a calendar date in the forms the knowledge service emits:
/// `YYYY-MM-DD`, RFC 3339 timestamps, naive timestamps, `YYYY-MM` and `YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.date());
    }
    let mut parts = raw.splitn(2, '-');
    let year = parts.next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month = match parts.next() {
        Some(m) if m.len() == 2 => m.parse().ok()?,
        Some(_) => return None,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// A datum's value: scalar until a second value arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatumValue {
    Many(Vec<Value>),
    One(Value),
}

impl DatumValue {
    pub fn as_slice(&self) -> &[Value] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Reference to the linked resource a value was derived from
///
/// Parallel to `DatumValue`: once the value is promoted to `Many`, entries
/// line up by position and values without a resource hold `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Many(Vec<Option<String>>),
    One(String),
}

/// One attribute's recorded value(s) with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub value: DatumValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    /// Provenance tag, e.g. "dbpedia"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub verified: bool,
    /// Who or what produced the datum
    pub user: String,
}

impl Datum {
    pub fn new(value: Value, user: impl Into<String>) -> Self {
        Self {
            value: DatumValue::One(value),
            resource: None,
            source: None,
            verified: false,
            user: user.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_resource(mut self, resource: Option<String>) -> Self {
        self.resource = resource.map(ResourceRef::One);
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// All recorded values in encounter order
    pub fn values(&self) -> &[Value] {
        self.value.as_slice()
    }

    /// Append another observed value, promoting scalar fields to sequences.
    pub fn push(&mut self, value: Value, resource: Option<String>) {
        let prior_len = self.value.len();

        self.value = match std::mem::replace(&mut self.value, DatumValue::Many(Vec::new())) {
            DatumValue::One(first) => DatumValue::Many(vec![first, value]),
            DatumValue::Many(mut values) => {
                values.push(value);
                DatumValue::Many(values)
            }
        };

        self.resource = match (self.resource.take(), resource) {
            (None, None) => None,
            (None, Some(r)) => {
                let mut entries = vec![None; prior_len];
                entries.push(Some(r));
                Some(ResourceRef::Many(entries))
            }
            (Some(ResourceRef::One(first)), r) => Some(ResourceRef::Many(vec![Some(first), r])),
            (Some(ResourceRef::Many(mut entries)), r) => {
                entries.push(r);
                Some(ResourceRef::Many(entries))
            }
        };
    }
}

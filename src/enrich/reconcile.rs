//! Triple reconciliation
//!
//! Turns the raw `(subject, predicate, object, object_label)` rows returned
//! for one entity into a typed attribute map keyed by attribute id. The
//! reconciler is pure: identical rows in identical order give identical
//! maps.
//!
//! Rows are handled in this order:
//!
//! 1. rows for other subjects are ignored
//! 2. the label row is looked up first; without a label the entity is
//!    dropped before any attribute is examined
//! 3. predicates outside the admitted namespaces are ignored, as are
//!    predicates whose local name contains a dot
//! 4. the local name must resolve to a registry attribute, otherwise the
//!    whole batch fails
//! 5. the object is coerced by the attribute's value type and merged into
//!    the map, promoting repeated attributes to sequences

use super::triple::{local_name, prefix, strip_langtag, TripleRow};
use crate::catalog::{parse_date, Attribute, Datum, ProductData, Registry, Value, ValueType};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("could not find attribute {predicate} for resource {subject}")]
    UnknownAttribute { predicate: String, subject: String },
}

/// Which predicates are reconciled and how provenance is stamped
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Namespace prefixes whose predicates are all admitted
    pub namespaces: Vec<String>,
    /// Individual predicates admitted outside those namespaces
    pub extra_predicates: Vec<String>,
    /// Prefix removed from subjects and unlabeled objects
    pub resource_prefix: String,
    pub label_predicate: String,
    pub source_tag: String,
    pub system_user: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["dbo".into()],
            extra_predicates: ["wgs84:lat", "wgs84:long", "foaf:gender", "foaf:givenName", "foaf:surname"]
                .into_iter()
                .map(String::from)
                .collect(),
            resource_prefix: "dbr:".into(),
            label_predicate: "rdfs:label".into(),
            source_tag: "dbpedia".into(),
            system_user: "system".into(),
        }
    }
}

impl ReconcileConfig {
    /// Whether rows with this predicate are reconciled
    pub fn admits(&self, predicate: &str) -> bool {
        let in_namespace = prefix(predicate).is_some_and(|p| self.namespaces.iter().any(|ns| ns == p));
        in_namespace || self.extra_predicates.iter().any(|p| p == predicate)
    }

    pub fn strip_resource_prefix<'a>(&self, term: &'a str) -> &'a str {
        term.strip_prefix(self.resource_prefix.as_str()).unwrap_or(term)
    }
}

/// A value anomaly. The value is stored anyway.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueWarning {
    pub subject: String,
    pub attribute: String,
    pub raw: String,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    InvalidDate,
    NotANumber,
    OutOfBounds { min: Option<f64>, max: Option<f64> },
    FractionalInteger,
}

impl fmt::Display for ValueWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match &self.kind {
            WarningKind::InvalidDate => "is not a valid date".to_string(),
            WarningKind::NotANumber => "is not a number".to_string(),
            WarningKind::OutOfBounds { min, max } => {
                let bound = |b: &Option<f64>| b.map_or_else(|| "-".to_string(), |v| v.to_string());
                format!("is outside [{}, {}]", bound(min), bound(max))
            }
            WarningKind::FractionalInteger => "is fractional but the attribute is not a float".to_string(),
        };
        write!(f, "{} of {}: {:?} {}", self.attribute, self.subject, self.raw, reason)
    }
}

/// Reconciled attribute map for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub label: String,
    pub data: ProductData,
    pub warnings: Vec<ValueWarning>,
}

pub struct Reconciler<'a> {
    registry: &'a Registry,
    config: &'a ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(registry: &'a Registry, config: &'a ReconcileConfig) -> Self {
        Self { registry, config }
    }

    /// Reconcile the rows for `subject`. `Ok(None)` means the entity has no
    /// label and is dropped.
    pub fn reconcile(&self, subject: &str, rows: &[TripleRow]) -> Result<Option<Reconciled>, ReconcileError> {
        let rows: Vec<&TripleRow> = rows.iter().filter(|r| r.subject == subject).collect();

        let label = rows
            .iter()
            .find(|r| r.predicate == self.config.label_predicate)
            .map(|r| strip_langtag(&r.object))
            .filter(|l| !l.is_empty());
        let Some(label) = label else {
            return Ok(None);
        };

        let mut data = ProductData::new();
        let mut warnings = Vec::new();

        for row in rows {
            if !self.config.admits(&row.predicate) {
                continue;
            }
            let name = local_name(&row.predicate);
            if name.contains('.') {
                continue;
            }
            let attribute = self
                .registry
                .attribute_by_name(name)
                .ok_or_else(|| ReconcileError::UnknownAttribute {
                    predicate: row.predicate.clone(),
                    subject: subject.to_string(),
                })?;

            let (value, resource) = self.coerce(attribute, row, &mut warnings);
            match data.get_mut(attribute.id.as_str()) {
                Some(datum) => datum.push(value, resource),
                None => {
                    let datum = Datum::new(value, &self.config.system_user)
                        .with_source(&self.config.source_tag)
                        .with_resource(resource);
                    data.insert(attribute.id.to_string(), datum);
                }
            }
        }

        Ok(Some(Reconciled {
            label: label.to_string(),
            data,
            warnings,
        }))
    }

    fn coerce(
        &self,
        attribute: &Attribute,
        row: &TripleRow,
        warnings: &mut Vec<ValueWarning>,
    ) -> (Value, Option<String>) {
        let raw = row.object.as_str();
        let mut warn = |kind| {
            warnings.push(ValueWarning {
                subject: row.subject.clone(),
                attribute: attribute.name.clone(),
                raw: raw.to_string(),
                kind,
            })
        };

        match attribute.value_type {
            ValueType::Boolean => (Value::Boolean(!raw.is_empty()), None),
            ValueType::Date => match parse_date(raw) {
                Some(date) => (Value::Date(date), None),
                None => {
                    warn(WarningKind::InvalidDate);
                    (Value::InvalidDate(raw.to_string()), None)
                }
            },
            ValueType::Number => match raw.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    if !attribute.in_bounds(n) {
                        warn(WarningKind::OutOfBounds {
                            min: attribute.min,
                            max: attribute.max,
                        });
                    }
                    if !attribute.is_float && n.fract() != 0.0 {
                        warn(WarningKind::FractionalInteger);
                    }
                    (Value::Number(n), None)
                }
                _ => {
                    warn(WarningKind::NotANumber);
                    (Value::InvalidNumber(raw.to_string()), None)
                }
            },
            ValueType::String | ValueType::Resource => match row.object_label.as_deref().filter(|l| !l.is_empty()) {
                Some(label) => (Value::string(strip_langtag(label)), Some(raw.to_string())),
                None => {
                    let text = strip_langtag(self.config.strip_resource_prefix(raw));
                    (Value::string(text), None)
                }
            },
        }
    }
}

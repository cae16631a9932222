//! Triple rows returned by the knowledge service and term helpers

use serde::{Deserialize, Serialize};

/// One `?subject ?predicate ?object ?object_label` result row.
///
/// IRIs arrive in compact `prefix:local` form; language-tagged literals as
/// `text@lang`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleRow {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_label: Option<String>,
}

impl TripleRow {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            object_label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.object_label = Some(label.into());
        self
    }
}

/// Remove a trailing language tag (`"Berlin@de"` → `"Berlin"`).
///
/// Only a well-formed tag at the very end is stripped, so e-mail addresses
/// and other text containing `@` survive.
pub fn strip_langtag(text: &str) -> &str {
    let Some(at) = text.rfind('@') else {
        return text;
    };
    let tag = &text[at + 1..];
    let mut subtags = tag.split('-');
    let primary_ok = subtags
        .next()
        .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphabetic()));
    let rest_ok = subtags.all(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric()));
    if primary_ok && rest_ok {
        &text[..at]
    } else {
        text
    }
}

/// Namespace prefix of a compact IRI (`"dbo:area"` → `Some("dbo")`)
pub fn prefix(term: &str) -> Option<&str> {
    let (prefix, _) = term.split_once(':')?;
    let is_word = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    is_word.then_some(prefix)
}

/// Local part of a compact IRI (`"dbo:area"` → `"area"`); terms without a
/// word prefix are returned unchanged.
pub fn local_name(term: &str) -> &str {
    match prefix(term) {
        Some(p) => &term[p.len() + 1..],
        None => term,
    }
}

//! External knowledge service seam
//!
//! The pipeline issues exactly one `select` per batch. `BatchQuery` builds
//! the combined query: a union of one subquery per subject, each binding the
//! subject literal so result rows can be fanned back out.

use super::triple::TripleRow;
use async_trait::async_trait;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("knowledge service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<SourceError>,
    },
}

impl SourceError {
    /// Transport failures and server-side errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse(_) | Self::Exhausted { .. } => false,
        }
    }
}

/// A service answering one textual query with ordered triple rows
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn select(&self, query: &str) -> Result<Vec<TripleRow>, SourceError>;
}

/// Builder for the combined per-batch query
#[derive(Debug, Clone)]
pub struct BatchQuery {
    resource_base: String,
    resource_prefix: Option<String>,
}

impl BatchQuery {
    pub fn new(resource_base: impl Into<String>) -> Self {
        Self {
            resource_base: resource_base.into(),
            resource_prefix: None,
        }
    }

    /// Subjects carrying this compact prefix are expanded against the
    /// resource base without it.
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = Some(prefix.into());
        self
    }

    pub fn build<S: AsRef<str>>(&self, subjects: &[S]) -> String {
        let subqueries: Vec<String> = subjects.iter().map(|s| self.subquery(s.as_ref())).collect();
        format!(
            "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
             select ?subject ?predicate ?object ?object_label {{ {} }}",
            subqueries.join(" UNION ")
        )
    }

    fn subquery(&self, subject: &str) -> String {
        let local = self
            .resource_prefix
            .as_deref()
            .and_then(|p| subject.strip_prefix(p))
            .unwrap_or(subject);
        format!(
            "{{ select \"{}\" as ?subject ?predicate ?object ?object_label {{ \
             <{}{}> ?predicate ?object . \
             optional {{ ?object rdfs:label ?object_label }} }} }}",
            escape_literal(subject),
            self.resource_base,
            encode_iri(local)
        )
    }
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode characters that may not appear inside `<...>`
fn encode_iri(local: &str) -> String {
    let mut out = String::with_capacity(local.len());
    for c in local.chars() {
        if c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{:02X}", byte);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_union_branch_per_subject() {
        let query = BatchQuery::new("http://dbpedia.org/resource/").build(&["Berlin", "Bonn"]);

        assert_eq!(query.matches(" UNION ").count(), 1);
        assert!(query.contains("select \"Berlin\" as ?subject"));
        assert!(query.contains("<http://dbpedia.org/resource/Bonn> ?predicate ?object"));
        assert!(query.contains("optional { ?object rdfs:label ?object_label }"));
    }

    #[test]
    fn strips_resource_prefix_for_the_iri_only() {
        let query = BatchQuery::new("http://dbpedia.org/resource/")
            .with_resource_prefix("dbr:")
            .build(&["dbr:Berlin"]);

        assert!(query.contains("select \"dbr:Berlin\" as ?subject"));
        assert!(query.contains("<http://dbpedia.org/resource/Berlin>"));
    }

    #[test]
    fn escapes_literals_and_iris() {
        let query = BatchQuery::new("http://x/").build(&["Say \"Hi\" now"]);

        assert!(query.contains(r#"select "Say \"Hi\" now" as ?subject"#));
        assert!(query.contains("<http://x/Say%20%22Hi%22%20now>"));
    }

    #[test]
    fn retry_classification() {
        assert!(SourceError::Network("reset".into()).is_retryable());
        assert!(SourceError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!SourceError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!SourceError::InvalidResponse("eof".into()).is_retryable());
    }
}

//! Mock knowledge source for integration tests
//!
//! Answers a batch query with the fixture rows of every subject the query
//! binds, in the order the subjects appear. Every query is recorded.

use async_trait::async_trait;
use produpedia::enrich::{CancellationToken, KnowledgeSource, SourceError, TripleRow};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockKnowledgeSource {
    rows: HashMap<String, Vec<TripleRow>>,
    queries: Mutex<Vec<String>>,
    /// 1-based call number that fails with a server error
    fail_on_call: Option<usize>,
    /// Token cancelled once this many calls have been answered
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockKnowledgeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row for `subject`
    pub fn with_row(mut self, subject: &str, predicate: &str, object: &str) -> Self {
        self.rows
            .entry(subject.to_string())
            .or_default()
            .push(TripleRow::new(subject, predicate, object));
        self
    }

    pub fn with_labelled_row(mut self, subject: &str, predicate: &str, object: &str, label: &str) -> Self {
        self.rows
            .entry(subject.to_string())
            .or_default()
            .push(TripleRow::new(subject, predicate, object).with_label(label));
        self
    }

    /// Give `subject` an English label
    pub fn with_label(self, subject: &str) -> Self {
        let label = format!("{}@en", subject);
        self.with_row(subject, "rdfs:label", &label)
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn cancelling_after(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((call, token));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn bound_subjects(query: &str) -> Vec<String> {
        query
            .split("select \"")
            .skip(1)
            .filter_map(|part| part.split('"').next())
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl KnowledgeSource for MockKnowledgeSource {
    async fn select(&self, query: &str) -> Result<Vec<TripleRow>, SourceError> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            queries.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(SourceError::Status {
                status: 503,
                body: "service unavailable".into(),
            });
        }

        if let Some((after, token)) = &self.cancel_after {
            if call >= *after {
                token.cancel();
            }
        }

        Ok(Self::bound_subjects(query)
            .iter()
            .flat_map(|s| self.rows.get(s).cloned().unwrap_or_default())
            .collect())
    }
}

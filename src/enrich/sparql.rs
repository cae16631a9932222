//! SPARQL endpoint client
//!
//! Posts the batch query to an HTTP endpoint and converts the JSON result
//! bindings into `TripleRow`s: IRIs are compacted against a prefix table,
//! language-tagged literals are rendered as `text@lang`.

use super::source::{KnowledgeSource, SourceError};
use super::triple::TripleRow;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const RESULTS_JSON: &str = "application/sparql-results+json";

/// Namespace prefixes used to compact result IRIs
pub const DEFAULT_PREFIXES: [(&str, &str); 8] = [
    ("dbo", "http://dbpedia.org/ontology/"),
    ("dbr", "http://dbpedia.org/resource/"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("wgs84", "http://www.w3.org/2003/01/geo/wgs84_pos#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SparqlConfig {
    pub endpoint: String,
    pub resource_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n` times this
    pub retry_delay_ms: u64,
}

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://dbpedia.org/sparql".into(),
            resource_base: "http://dbpedia.org/resource/".into(),
            timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

pub struct SparqlEndpoint {
    client: Client,
    config: SparqlConfig,
    prefixes: Vec<(String, String)>,
}

impl SparqlEndpoint {
    pub fn new(config: SparqlConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            prefixes: DEFAULT_PREFIXES
                .iter()
                .map(|(p, ns)| (p.to_string(), ns.to_string()))
                .collect(),
        })
    }

    pub fn config(&self) -> &SparqlConfig {
        &self.config
    }

    async fn fetch(&self, query: &str) -> Result<Vec<TripleRow>, SourceError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(ACCEPT, RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        parse_results(&body, &self.prefixes)
    }
}

#[async_trait]
impl KnowledgeSource for SparqlEndpoint {
    async fn select(&self, query: &str) -> Result<Vec<TripleRow>, SourceError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.fetch(query).await {
                Ok(rows) => {
                    debug!(rows = rows.len(), attempt, "sparql select complete");
                    return Ok(rows);
                }
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(self.config.retry_delay_ms * u64::from(attempt));
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "retrying sparql select");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempt > 0 => {
                    return Err(SourceError::Exhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang", default)]
    lang: Option<String>,
}

/// Convert a `application/sparql-results+json` body into triple rows
pub fn parse_results(body: &str, prefixes: &[(String, String)]) -> Result<Vec<TripleRow>, SourceError> {
    let results: SparqlResults =
        serde_json::from_str(body).map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

    results
        .results
        .bindings
        .into_iter()
        .map(|binding| {
            let term = |name: &str| -> Result<String, SourceError> {
                binding
                    .get(name)
                    .map(|t| render(t, prefixes))
                    .ok_or_else(|| SourceError::InvalidResponse(format!("binding without ?{}", name)))
            };
            Ok(TripleRow {
                subject: term("subject")?,
                predicate: term("predicate")?,
                object: term("object")?,
                object_label: binding.get("object_label").map(|t| render(t, prefixes)),
            })
        })
        .collect()
}

fn render(term: &SparqlTerm, prefixes: &[(String, String)]) -> String {
    match term.kind.as_str() {
        "uri" => compact(&term.value, prefixes),
        "bnode" => format!("_:{}", term.value),
        _ => match term.lang.as_deref() {
            Some(lang) if !lang.is_empty() => format!("{}@{}", term.value, lang),
            _ => term.value.clone(),
        },
    }
}

fn compact(iri: &str, prefixes: &[(String, String)]) -> String {
    prefixes
        .iter()
        .find_map(|(prefix, ns)| iri.strip_prefix(ns.as_str()).map(|local| format!("{}:{}", prefix, local)))
        .unwrap_or_else(|| iri.to_string())
}

//! End-to-end enrichment runs against a mock knowledge source

mod common;

use common::{city_stubs, fixture_registry, FailingStore, MockKnowledgeSource};
use produpedia::enrich::{CancellationToken, PipelineConfig, PipelineError, ReconcileError, WarningKind};
use produpedia::{
    DatumValue, EnrichmentPipeline, MemoryStore, OpenStore, Product, ProductStore, SqliteStore, Value,
};
use std::sync::Arc;

fn pipeline(
    store: Arc<dyn ProductStore>,
    source: Arc<MockKnowledgeSource>,
    batch_size: usize,
    workers: usize,
) -> EnrichmentPipeline {
    EnrichmentPipeline::new(store, source, Arc::new(fixture_registry())).with_config(PipelineConfig {
        batch_size,
        workers,
        ..Default::default()
    })
}

fn products_by_name(store: &dyn ProductStore) -> Vec<Product> {
    let rows = store
        .find_products(&produpedia::query::ProductQuery::new("city"))
        .unwrap();
    rows.iter()
        .map(|row| store.load_product(&row.id).unwrap().unwrap())
        .collect()
}

#[tokio::test]
async fn two_stubs_one_call_with_bounds_warning() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(
        MockKnowledgeSource::new()
            .with_label("Berlin")
            .with_row("Berlin", "dbo:populationTotal", "12345")
            .with_label("Bonn")
            .with_row("Bonn", "dbo:populationTotal", "-5"),
    );

    let report = pipeline(store.clone(), source.clone(), 10, 1)
        .run(city_stubs(&["Berlin", "Bonn"]).as_bytes())
        .await
        .unwrap();

    assert_eq!(source.call_count(), 1);
    assert_eq!(report.products_persisted, 2);
    assert_eq!(report.warnings, 1);
    assert_eq!(report.warning_sample.len(), 1);
    assert_eq!(report.warning_sample[0].subject, "Bonn");
    assert!(matches!(report.warning_sample[0].kind, WarningKind::OutOfBounds { .. }));

    let products = products_by_name(store.as_ref());
    let berlin = products.iter().find(|p| p.name == "Berlin").unwrap();
    let pop = &berlin.data["pop"];
    assert_eq!(pop.value, DatumValue::One(Value::Number(12345.0)));
    assert!(!pop.verified);
    assert_eq!(pop.source.as_deref(), Some("dbpedia"));

    let bonn = products.iter().find(|p| p.name == "Bonn").unwrap();
    assert_eq!(bonn.data["pop"].values(), &[Value::Number(-5.0)]);
    assert!(bonn.is_of_type("city"));
    assert!(bonn.data["label"].verified);
}

#[tokio::test]
async fn one_call_per_batch_including_the_partial_one() {
    for (stubs, batch_size, expected_calls) in [(25usize, 10usize, 3usize), (20, 10, 2), (1, 10, 1), (7, 1, 7)] {
        let subjects: Vec<String> = (0..stubs).map(|i| format!("City{}", i)).collect();
        let mut source = MockKnowledgeSource::new();
        for subject in &subjects {
            source = source.with_label(subject);
        }
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let refs: Vec<&str> = subjects.iter().map(String::as_str).collect();

        let report = pipeline(store.clone(), source.clone(), batch_size, 1)
            .run(city_stubs(&refs).as_bytes())
            .await
            .unwrap();

        assert_eq!(source.call_count(), expected_calls, "{} stubs / {}", stubs, batch_size);
        assert_eq!(report.batches, expected_calls as u64);
        assert_eq!(store.count_products().unwrap(), stubs);
    }
}

#[tokio::test]
async fn malformed_and_uncategorised_lines_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MockKnowledgeSource::new().with_label("Berlin").with_label("Bonn"));
    let input = concat!(
        "[\"Berlin\", {\"categories\": [\"City\"]}]\n",
        "{not json\n",
        "[\"Nowhere\", {\"categories\": []}]\n",
        "[\"Bonn\", {\"categories\": [\"City\"]}]\n",
    );

    let report = pipeline(store.clone(), source.clone(), 10, 1)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.lines_read, 4);
    assert_eq!(report.malformed_lines, 1);
    assert_eq!(report.dropped_without_categories, 1);
    assert_eq!(report.stubs_accepted, 2);
    assert_eq!(store.count_products().unwrap(), 2);
    assert!(!source.queries()[0].contains("Nowhere"));
}

#[tokio::test]
async fn entities_without_label_are_dropped() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(
        MockKnowledgeSource::new()
            .with_label("Berlin")
            .with_row("Atlantis", "dbo:populationTotal", "7")
            .with_row("Atlantis", "dbo:notInRegistry", "x"),
    );

    let report = pipeline(store.clone(), source, 10, 1)
        .run(city_stubs(&["Berlin", "Atlantis"]).as_bytes())
        .await
        .unwrap();

    assert_eq!(report.dropped_without_label, 1);
    assert_eq!(report.products_persisted, 1);
    assert_eq!(products_by_name(store.as_ref())[0].name, "Berlin");
}

#[tokio::test]
async fn unknown_attribute_aborts_after_last_committed_batch() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(
        MockKnowledgeSource::new()
            .with_label("A")
            .with_label("B")
            .with_label("C")
            .with_label("D")
            .with_row("D", "dbo:notInRegistry", "x"),
    );

    let aborted = pipeline(store.clone(), source.clone(), 2, 1)
        .run(city_stubs(&["A", "B", "C", "D", "E"]).as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(
        aborted.error,
        PipelineError::Reconcile(ReconcileError::UnknownAttribute { ref subject, .. }) if subject == "D"
    ));
    assert_eq!(aborted.last_committed_line, 2);
    assert_eq!(aborted.persisted, 2);
    assert_eq!(store.count_products().unwrap(), 2);
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn source_failure_aborts_with_position() {
    let store = Arc::new(MemoryStore::new());
    let mut source = MockKnowledgeSource::new().failing_on_call(3);
    for s in ["A", "B", "C", "D", "E", "F"] {
        source = source.with_label(s);
    }
    let source = Arc::new(source);

    let aborted = pipeline(store.clone(), source, 2, 1)
        .run(city_stubs(&["A", "B", "C", "D", "E", "F"]).as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(aborted.error, PipelineError::Source(_)));
    assert_eq!(aborted.last_committed_line, 4);
    assert_eq!(store.count_products().unwrap(), 4);
}

#[tokio::test]
async fn failed_bulk_write_aborts_after_last_committed_batch() {
    let store = Arc::new(FailingStore::failing_on_insert(2));
    let mut source = MockKnowledgeSource::new();
    for s in ["A", "B", "C", "D", "E", "F"] {
        source = source.with_label(s);
    }

    let aborted = pipeline(store.clone(), Arc::new(source), 2, 1)
        .run(city_stubs(&["A", "B", "C", "D", "E", "F"]).as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(aborted.error, PipelineError::Storage(_)));
    assert_eq!(aborted.last_committed_line, 2);
    assert_eq!(aborted.persisted, 2);
    assert_eq!(store.insert_calls(), 2);

    let names: Vec<String> = products_by_name(store.as_ref()).into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test]
async fn cancellation_mid_run_keeps_committed_batches() {
    let token = CancellationToken::new();
    let mut source = MockKnowledgeSource::new().cancelling_after(1, token.clone());
    for s in ["A", "B", "C", "D", "E", "F"] {
        source = source.with_label(s);
    }
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());

    let aborted = pipeline(store.clone(), source.clone(), 2, 1)
        .with_cancellation(token)
        .run(city_stubs(&["A", "B", "C", "D", "E", "F"]).as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(aborted.error, PipelineError::Cancelled));
    assert_eq!(aborted.last_committed_line, 2);
    assert_eq!(aborted.persisted, 2);
    assert_eq!(source.call_count(), 1);
    assert_eq!(store.count_products().unwrap(), 2);
}

#[tokio::test]
async fn concurrent_workers_commit_in_order() {
    let subjects: Vec<String> = (0..23).map(|i| format!("City{:02}", i)).collect();
    let mut source = MockKnowledgeSource::new();
    for subject in &subjects {
        source = source.with_label(subject);
    }
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    let refs: Vec<&str> = subjects.iter().map(String::as_str).collect();

    let report = pipeline(store.clone(), source.clone(), 5, 3)
        .run(city_stubs(&refs).as_bytes())
        .await
        .unwrap();

    assert_eq!(source.call_count(), 5);
    assert_eq!(report.products_persisted, 23);
    let names: Vec<String> = store
        .find_products(&produpedia::query::ProductQuery::new("city"))
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, subjects);
}

#[tokio::test]
async fn rerun_replaces_previous_products() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let source = Arc::new(MockKnowledgeSource::new().with_label("Berlin").with_label("Bonn"));

    pipeline(store.clone(), source.clone(), 10, 1)
        .run(city_stubs(&["Berlin", "Bonn"]).as_bytes())
        .await
        .unwrap();
    pipeline(store.clone(), source, 10, 1)
        .run(city_stubs(&["Bonn"]).as_bytes())
        .await
        .unwrap();

    let products = products_by_name(store.as_ref());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Bonn");
}

#[tokio::test]
async fn reconciled_data_is_deterministic() {
    let source = || {
        Arc::new(
            MockKnowledgeSource::new()
                .with_label("Berlin")
                .with_row("Berlin", "dbo:nickname", "x")
                .with_row("Berlin", "dbo:nickname", "y")
                .with_labelled_row("Berlin", "dbo:leaderName", "dbr:Kai_Wegner", "Kai Wegner@de")
                .with_row("Berlin", "dbo:foundingDate", "1237")
                .with_row("Berlin", "owl:sameAs", "wikidata:Q64"),
        )
    };

    let mut serialized = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(MemoryStore::new());
        pipeline(store.clone(), source(), 10, 1)
            .run(city_stubs(&["Berlin"]).as_bytes())
            .await
            .unwrap();
        let product = products_by_name(store.as_ref()).remove(0);
        serialized.push(serde_json::to_string(&product.data).unwrap());

        let nick = &product.data["nick"];
        assert_eq!(nick.value, DatumValue::Many(vec![Value::string("x"), Value::string("y")]));
        assert!(nick.resource.is_none());
        assert!(!product.data.contains_key("owl:sameAs"));
    }
    assert_eq!(serialized[0], serialized[1]);
}

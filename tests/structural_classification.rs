use std::collections::BTreeSet;
use std::sync::Arc;

use termclass::{
    classification::ClassificationPipeline,
    config::ClassifierSettings,
    logic::LogicalExpression,
    store::{InMemorySemanticStore, Nid, SemanticStore, SetSpec, StampCoordinate, TerminologySnapshot},
};

const SNAPSHOT: &str = r#"{ "concepts": [
    { "nid": 2, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
    { "nid": 4, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
    { "nid": 3, "stated": [ { "necessary": [ { "and": [
        { "concept": 2 },
        { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 4 } } }
    ] } ] } ] },
    { "nid": 6, "stated": [ { "sufficient": [ { "and": [
        { "concept": 2 },
        { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 4 } } }
    ] } ] } ] }
] }"#;

fn inferred(store: &InMemorySemanticStore, settings: &ClassifierSettings, concept: i32) -> LogicalExpression {
    let semantics = store
        .semantics_for_component(Nid::new(concept), settings.patterns.inferred)
        .expect("inferred semantics");
    assert_eq!(semantics.len(), 1);
    let version = store
        .latest_version(semantics[0], &StampCoordinate::latest(settings.stamp.path))
        .expect("read")
        .expect("version");
    LogicalExpression::new(version.tree().clone()).expect("expression")
}

fn definition(sets: &str) -> LogicalExpression {
    let sets: Vec<SetSpec> = serde_json::from_str(sets).expect("sets");
    TerminologySnapshot::build_definition(&sets).expect("definition")
}

#[tokio::test]
async fn structural_backend_classifies_defined_concepts() {
    let settings = ClassifierSettings {
        worker_threads: Some(2),
        ..ClassifierSettings::default()
    };
    let store = Arc::new(InMemorySemanticStore::new());
    let snapshot: TerminologySnapshot = SNAPSHOT.parse().expect("snapshot");
    snapshot
        .load_into(store.as_ref(), &settings.patterns, &settings.stamp)
        .expect("load");

    let pipeline = ClassificationPipeline::from_settings(
        Arc::clone(&store) as Arc<dyn SemanticStore>,
        settings.clone(),
    )
    .expect("pipeline");
    let results = pipeline.run().await.expect("run");

    assert_eq!(results.classifier, "structural");
    assert_eq!(
        results.changed,
        BTreeSet::from([Nid::new(2), Nid::new(3), Nid::new(4), Nid::new(6)])
    );
    assert!(results.alerts.is_empty());
    assert!(results.equivalence_sets.is_empty());

    assert!(inferred(&store, &settings, 3).structurally_equals(&definition(
        r#"[ { "necessary": [ { "and": [ { "concept": 6 } ] } ] } ]"#
    )));
    assert!(inferred(&store, &settings, 6).structurally_equals(&definition(
        r#"[
            { "sufficient": [ { "and": [
                { "concept": 2 },
                { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 4 } } }
            ] } ] },
            { "necessary": [ { "and": [ { "concept": 2 } ] } ] }
        ]"#
    )));

    let again = pipeline.run().await.expect("second run");
    assert!(again.changed.is_empty());
}

async fn run_with_workers(workers: usize) -> (BTreeSet<Nid>, Vec<LogicalExpression>) {
    let settings = ClassifierSettings {
        worker_threads: Some(workers),
        ..ClassifierSettings::default()
    };
    let store = Arc::new(InMemorySemanticStore::new());
    let snapshot: TerminologySnapshot = SNAPSHOT.parse().expect("snapshot");
    snapshot
        .load_into(store.as_ref(), &settings.patterns, &settings.stamp)
        .expect("load");
    let results = ClassificationPipeline::from_settings(
        Arc::clone(&store) as Arc<dyn SemanticStore>,
        settings.clone(),
    )
    .expect("pipeline")
    .run()
    .await
    .expect("run");
    let trees = results
        .changed
        .iter()
        .map(|concept| inferred(&store, &settings, concept.value()))
        .collect();
    (results.changed, trees)
}

#[tokio::test]
async fn worker_count_does_not_change_the_outcome() {
    let (single_changed, single_trees) = run_with_workers(1).await;
    let (many_changed, many_trees) = run_with_workers(8).await;
    assert_eq!(single_changed, many_changed);
    for (single, many) in single_trees.iter().zip(&many_trees) {
        assert!(single.structurally_equals(many));
    }
}

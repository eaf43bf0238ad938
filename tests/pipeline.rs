use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use rstest::rstest;
use termclass::{
    classification::{Alert, ClassificationError, ClassificationPipeline, Stage},
    config::ClassifierSettings,
    logic::LogicalExpression,
    reasoner::{
        Axiom, Classifier, ClassifierError, LoadedOntology, LoadedOntologyHandle, Taxonomy,
        BOTTOM_LABEL, TOP_LABEL,
    },
    store::{
        InMemorySemanticStore, Nid, SemanticStore, SetSpec, StampCoordinate, TerminologySnapshot,
    },
};

/// Classifier answering every load with the same taxonomy.
struct FixedClassifier(Taxonomy);

struct FixedOntology {
    axioms: usize,
    taxonomy: Taxonomy,
}

#[async_trait]
impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn load(&self, axioms: Vec<Axiom>) -> Result<Box<LoadedOntologyHandle>, ClassifierError> {
        Ok(Box::new(FixedOntology {
            axioms: axioms.len(),
            taxonomy: self.0.clone(),
        }))
    }
}

#[async_trait]
impl LoadedOntology for FixedOntology {
    fn axiom_count(&self) -> usize {
        self.axioms
    }

    async fn classify(&self) -> Result<Taxonomy, ClassifierError> {
        Ok(self.taxonomy.clone())
    }
}

/// Taxonomy rooted at TOP: each entry is (equivalents, parents).
fn taxonomy(nodes: &[(&[&str], &[&str])]) -> Taxonomy {
    let mut taxonomy = Taxonomy::new();
    taxonomy.insert([TOP_LABEL], Vec::<String>::new());
    for (equivalents, parents) in nodes {
        taxonomy.insert(equivalents.iter().copied(), parents.iter().copied());
    }
    taxonomy.insert([BOTTOM_LABEL], Vec::<String>::new());
    taxonomy
}

fn load(document: &str) -> (Arc<InMemorySemanticStore>, ClassifierSettings) {
    let settings = ClassifierSettings::default();
    let store = Arc::new(InMemorySemanticStore::new());
    let snapshot: TerminologySnapshot = document.parse().expect("snapshot");
    snapshot
        .load_into(store.as_ref(), &settings.patterns, &settings.stamp)
        .expect("snapshot loaded");
    (store, settings)
}

fn pipeline(
    store: &Arc<InMemorySemanticStore>,
    settings: &ClassifierSettings,
    taxonomy: Taxonomy,
) -> ClassificationPipeline {
    ClassificationPipeline::new(
        Arc::clone(store) as Arc<dyn SemanticStore>,
        Arc::new(FixedClassifier(taxonomy)),
        settings.clone(),
    )
    .expect("pipeline")
}

fn inferred_semantics(
    store: &InMemorySemanticStore,
    settings: &ClassifierSettings,
    concept: i32,
) -> Vec<Nid> {
    store
        .semantics_for_component(Nid::new(concept), settings.patterns.inferred)
        .expect("inferred semantics")
}

fn inferred(
    store: &InMemorySemanticStore,
    settings: &ClassifierSettings,
    concept: i32,
) -> LogicalExpression {
    let semantics = inferred_semantics(store, settings, concept);
    assert_eq!(semantics.len(), 1, "one inferred semantic for {concept}");
    let version = store
        .latest_version(semantics[0], &StampCoordinate::latest(settings.stamp.path))
        .expect("read")
        .expect("committed version");
    LogicalExpression::new(version.tree().clone()).expect("inferred expression")
}

fn definition(sets: &str) -> LogicalExpression {
    let sets: Vec<SetSpec> = serde_json::from_str(sets).expect("sets");
    TerminologySnapshot::build_definition(&sets).expect("definition")
}

#[tokio::test]
async fn necessary_parent_becomes_inferred_and_is_stable() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 10, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] }
        ] }"#,
    );
    let taxonomy = taxonomy(&[(&["1"], &[TOP_LABEL]), (&["10"], &["1"])]);

    let first = pipeline(&store, &settings, taxonomy.clone())
        .run()
        .await
        .expect("first run");
    assert_eq!(first.changed, BTreeSet::from([Nid::new(10)]));
    assert_eq!(first.classified, BTreeSet::from([Nid::new(10)]));
    assert!(inferred(&store, &settings, 10)
        .structurally_equals(&definition(r#"[ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ]"#)));

    let second = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("second run");
    assert!(second.changed.is_empty());
    assert!(second.commit.time > first.commit.time);
    assert_eq!(inferred_semantics(&store, &settings, 10).len(), 1);
}

#[tokio::test]
async fn sufficient_sets_pass_through_next_to_parents() {
    let stated = r#"[ { "sufficient": [ { "and": [
        { "concept": 10 },
        { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 3 } } }
    ] } ] } ]"#;
    let (store, settings) = load(&format!(
        r#"{{ "concepts": [ {{ "nid": 11, "stated": {stated} }} ] }}"#
    ));
    let taxonomy = taxonomy(&[(&["10"], &[TOP_LABEL]), (&["11"], &["10"])]);

    let results = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("run");
    assert_eq!(results.changed, BTreeSet::from([Nid::new(11)]));
    let expected = definition(
        r#"[
        { "sufficient": [ { "and": [
            { "concept": 10 },
            { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 3 } } }
        ] } ] },
        { "necessary": [ { "and": [ { "concept": 10 } ] } ] }
    ]"#,
    );
    assert!(inferred(&store, &settings, 11).structurally_equals(&expected));
}

#[tokio::test]
async fn equivalent_parents_are_all_named() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 22, "stated": [ { "necessary": [ { "and": [ { "concept": 20 } ] } ] } ] }
        ] }"#,
    );
    let taxonomy = taxonomy(&[(&["20", "21"], &[TOP_LABEL]), (&["22"], &["20"])]);

    let results = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("run");
    assert_eq!(
        results.equivalence_sets,
        vec![BTreeSet::from([Nid::new(20), Nid::new(21)])]
    );
    let expected = definition(
        r#"[ { "necessary": [ { "and": [ { "concept": 20 }, { "concept": 21 } ] } ] } ]"#,
    );
    assert!(inferred(&store, &settings, 22).structurally_equals(&expected));
}

#[tokio::test]
async fn equivalent_concept_listed_as_parent_is_named() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 40, "stated": [ { "sufficient": [ { "and": [ { "concept": 5 } ] } ] } ] },
            { "nid": 41, "stated": [ { "necessary": [ { "and": [ { "concept": 5 } ] } ] } ] }
        ] }"#,
    );
    let taxonomy = taxonomy(&[(&["5"], &[TOP_LABEL]), (&["40", "41"], &["41", "5"])]);

    let results = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("run");
    assert_eq!(
        results.equivalence_sets,
        vec![BTreeSet::from([Nid::new(40), Nid::new(41)])]
    );
    let expected = definition(
        r#"[
        { "sufficient": [ { "and": [ { "concept": 5 } ] } ] },
        { "necessary": [ { "and": [ { "concept": 5 }, { "concept": 41 } ] } ] }
    ]"#,
    );
    assert!(inferred(&store, &settings, 40).structurally_equals(&expected));
    let expected = definition(
        r#"[ { "necessary": [ { "and": [ { "concept": 5 }, { "concept": 40 } ] } ] } ]"#,
    );
    assert!(inferred(&store, &settings, 41).structurally_equals(&expected));
}

#[tokio::test]
async fn changed_parents_append_a_version() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 10,
              "stated": [ { "necessary": [ { "and": [ { "concept": 2 } ] } ] } ],
              "inferred": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
            { "nid": 11,
              "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ],
              "inferred": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] }
        ] }"#,
    );
    let taxonomy = taxonomy(&[
        (&["1"], &[TOP_LABEL]),
        (&["2"], &[TOP_LABEL]),
        (&["10"], &["2"]),
        (&["11"], &["1"]),
    ]);

    let results = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("run");
    assert_eq!(results.changed, BTreeSet::from([Nid::new(10)]));
    let semantic = inferred_semantics(&store, &settings, 10)[0];
    let record = store.record(semantic).expect("read").expect("record");
    assert_eq!(record.versions().len(), 2);
    assert!(inferred(&store, &settings, 10)
        .structurally_equals(&definition(r#"[ { "necessary": [ { "and": [ { "concept": 2 } ] } ] } ]"#)));
}

#[rstest]
#[case::set_with_two_children(
    r#"[ { "necessary": [ { "concept": 1 }, { "concept": 2 } ] } ]"#
)]
#[case::set_without_conjunction(r#"[ { "necessary": [ { "concept": 1 } ] } ]"#)]
#[tokio::test]
async fn malformed_definition_fails_before_classification(#[case] stated: &str) {
    let (store, settings) = load(&format!(
        r#"{{ "concepts": [ {{ "nid": 10, "stated": {stated} }} ] }}"#
    ));
    let before = store.len().expect("len");

    let err = pipeline(&store, &settings, taxonomy(&[]))
        .run()
        .await
        .expect_err("malformed definition");
    assert!(matches!(
        err,
        ClassificationError::Structural { concept, .. } if concept == Nid::new(10)
    ));
    assert_eq!(store.len().expect("len"), before);
}

#[tokio::test]
async fn unsupported_construct_is_fatal() {
    let (store, settings) = load(
        r#"{ "concepts": [ { "nid": 12, "stated": [ { "necessary": [ { "and": [
            { "feature": { "type": 6, "operator": "greater_than", "literal": { "integer": 3 } } }
        ] } ] } ] } ] }"#,
    );
    let err = pipeline(&store, &settings, taxonomy(&[]))
        .run()
        .await
        .expect_err("feature");
    assert!(matches!(err, ClassificationError::Unsupported { .. }));
}

#[tokio::test]
async fn duplicate_stated_definitions_raise_one_alert() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 10, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
            { "nid": 10, "stated": [ { "necessary": [ { "and": [ { "concept": 2 } ] } ] } ] }
        ] }"#,
    );
    let stated = store
        .semantics_for_component(Nid::new(10), settings.patterns.stated)
        .expect("stated");
    assert_eq!(stated.len(), 2);

    let results = pipeline(&store, &settings, taxonomy(&[(&["10"], &[TOP_LABEL])]))
        .run()
        .await
        .expect("run");
    assert_eq!(
        results.alerts,
        vec![Alert::DuplicateStatedDefinition {
            concept: Nid::new(10),
            kept: stated[0].min(stated[1]),
            discarded: vec![stated[0].max(stated[1])],
        }]
    );
}

#[tokio::test]
async fn several_inferred_semantics_skip_the_concept() {
    let (store, settings) = load(
        r#"{ "concepts": [
            { "nid": 10,
              "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ],
              "inferred": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
            { "nid": 10,
              "inferred": [ { "necessary": [ { "and": [ { "concept": 2 } ] } ] } ] }
        ] }"#,
    );
    let taxonomy = taxonomy(&[(&["1"], &[TOP_LABEL]), (&["10"], &["1"])]);

    let results = pipeline(&store, &settings, taxonomy)
        .run()
        .await
        .expect("run");
    assert_eq!(results.integrity_errors, 1);
    assert!(results.changed.is_empty());
    assert!(matches!(
        results.alerts.as_slice(),
        [Alert::MultipleInferredSemantics { concept, semantics }]
            if *concept == Nid::new(10) && semantics.len() == 2
    ));
}

#[tokio::test]
async fn cancelled_pipeline_reports_the_stage() {
    let (store, settings) = load(r#"{ "concepts": [] }"#);
    let pipeline = pipeline(&store, &settings, taxonomy(&[]));
    pipeline.cancellation_token().cancel();
    let err = pipeline.run().await.expect_err("cancelled");
    assert!(matches!(
        err,
        ClassificationError::Cancelled {
            stage: Stage::Extract
        }
    ));
    pipeline.run().await.expect("run after cancellation");
}

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::alerts::AlertSink;
use super::extract::{extract_all, AxiomWorkingSet};
use super::process::process_all;
use super::progress::{ProgressSink, Stage, StageProgress, TracingProgress};
use super::results::ClassifierResults;
use super::{ClassificationError, RunContext};
use crate::config::ClassifierSettings;
use crate::reasoner::{self, ClassifierHandle, LoadedOntologyHandle, Taxonomy};
use crate::store::{Nid, SemanticStore, StampCoordinate, Transaction};

/// Name of the transaction every run commits through.
pub const TRANSACTION_NAME: &str = "classification";

/// Runs Extract, Load, Classify and Process against one store.
///
/// A pipeline may be run repeatedly; each run starts from the committed state
/// of the store. Cancelling the token returned by
/// [`ClassificationPipeline::cancellation_token`] stops the run in progress, or
/// the next one when idle, at the next unit of work and nothing is committed.
/// Once that run has ended the pipeline arms a fresh token for later runs.
pub struct ClassificationPipeline {
    store: Arc<dyn SemanticStore>,
    classifier: Arc<ClassifierHandle>,
    progress: Arc<dyn ProgressSink>,
    settings: Arc<ClassifierSettings>,
    pool: Arc<ThreadPool>,
    cancellation: Mutex<CancellationToken>,
}

impl ClassificationPipeline {
    /// # Errors
    ///
    /// Fails when the worker pool cannot be started.
    pub fn new(
        store: Arc<dyn SemanticStore>,
        classifier: Arc<ClassifierHandle>,
        settings: ClassifierSettings,
    ) -> Result<Self, ClassificationError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads.unwrap_or(0))
            .thread_name(|index| format!("termclass-worker-{index}"))
            .build()?;
        Ok(Self {
            store,
            classifier,
            progress: Arc::new(TracingProgress),
            settings: Arc::new(settings),
            pool: Arc::new(pool),
            cancellation: Mutex::new(CancellationToken::new()),
        })
    }

    /// Pipeline using the classifier backend named in `settings`.
    ///
    /// # Errors
    ///
    /// Fails when the worker pool cannot be started.
    pub fn from_settings(
        store: Arc<dyn SemanticStore>,
        settings: ClassifierSettings,
    ) -> Result<Self, ClassificationError> {
        let classifier = reasoner::from_settings(&settings);
        Self::new(store, classifier, settings)
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Token cancelling the current run, or the next one when idle.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces `spent` with a fresh token unless a later run already did.
    fn rearm(&self, spent: &CancellationToken) {
        let mut current = self
            .cancellation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.is_cancelled() && spent.is_cancelled() {
            *current = CancellationToken::new();
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Classifies every concept with a stated definition and commits the
    /// changed inferred definitions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the first error of the failing stage. Later stages do not run
    /// and nothing is committed.
    pub async fn run(&self) -> Result<ClassifierResults, ClassificationError> {
        let cancellation = self.cancellation_token();
        let outcome = self.execute(&cancellation).await;
        if cancellation.is_cancelled() {
            self.rearm(&cancellation);
        }
        outcome
    }

    async fn execute(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<ClassifierResults, ClassificationError> {
        let started = Instant::now();
        info!(
            classifier = self.classifier.name(),
            workers = self.pool.current_num_threads(),
            "classification_started"
        );
        let alerts = Arc::new(AlertSink::new());

        let working_set = self
            .stage(
                Stage::Extract,
                cancellation,
                self.extract(Arc::clone(&alerts), cancellation),
            )
            .await?;
        let loaded = self
            .stage(Stage::Load, cancellation, self.load(&working_set))
            .await?;
        let taxonomy = self
            .stage(Stage::Classify, cancellation, self.classify(loaded.as_ref()))
            .await?;
        drop(loaded);
        let results = self
            .stage(
                Stage::Process,
                cancellation,
                self.process(working_set, taxonomy, alerts, cancellation),
            )
            .await?;

        info!(
            classified = results.classified.len(),
            changed = results.changed.len(),
            alerts = results.alerts.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "classification_completed"
        );
        Ok(results)
    }

    async fn stage<T>(
        &self,
        stage: Stage,
        cancellation: &CancellationToken,
        work: impl Future<Output = Result<T, ClassificationError>>,
    ) -> Result<T, ClassificationError> {
        let outcome = if cancellation.is_cancelled() {
            Err(ClassificationError::Cancelled { stage })
        } else {
            work.await
        };
        if let Err(err) = &outcome {
            error!(stage = %stage, err.msg = %err, err.detail = ?err, "classification_error");
            self.progress.stage_failed(stage, err);
        }
        outcome
    }

    async fn extract(
        &self,
        alerts: Arc<AlertSink>,
        cancellation: &CancellationToken,
    ) -> Result<AxiomWorkingSet, ClassificationError> {
        let store = Arc::clone(&self.store);
        let settings = Arc::clone(&self.settings);
        let sink = Arc::clone(&self.progress);
        let pool = Arc::clone(&self.pool);
        let cancellation = cancellation.clone();

        tokio::task::spawn_blocking(move || -> Result<AxiomWorkingSet, ClassificationError> {
            let semantics = store.semantics_of_pattern(settings.patterns.stated)?;
            let progress = StageProgress::start(
                sink,
                Stage::Extract,
                semantics.len(),
                settings.progress_interval,
            );
            let working_set = AxiomWorkingSet::new();
            let context = RunContext {
                store: store.as_ref(),
                settings: &settings,
                coordinate: StampCoordinate::latest(settings.stamp.path),
                alerts: &alerts,
                progress: &progress,
                cancellation: &cancellation,
            };
            pool.install(|| extract_all(&context, &working_set, &semantics))?;
            progress.finish(&format!(
                "{} definitions read, {} concepts, {} axioms",
                progress.completed(),
                working_set.concepts().len(),
                working_set.axiom_count()
            ));
            Ok(working_set)
        })
        .await
        .map_err(|err| ClassificationError::Aborted {
            stage: Stage::Extract,
            message: err.to_string(),
        })?
    }

    async fn load(
        &self,
        working_set: &AxiomWorkingSet,
    ) -> Result<Box<LoadedOntologyHandle>, ClassificationError> {
        let axioms = working_set.axioms();
        self.progress.stage_started(Stage::Load, axioms.len());
        let loaded = self.classifier.load(axioms).await?;
        let count = loaded.axiom_count();
        self.progress.progress(Stage::Load, count, count);
        self.progress
            .stage_finished(Stage::Load, &format!("{count} axioms loaded"));
        Ok(loaded)
    }

    async fn classify(
        &self,
        loaded: &LoadedOntologyHandle,
    ) -> Result<Taxonomy, ClassificationError> {
        self.progress.stage_started(Stage::Classify, 1);
        let taxonomy = loaded.classify().await?;
        self.progress.progress(Stage::Classify, 1, 1);
        self.progress.stage_finished(
            Stage::Classify,
            &format!("{} taxonomy nodes", taxonomy.len()),
        );
        Ok(taxonomy)
    }

    async fn process(
        &self,
        working_set: AxiomWorkingSet,
        taxonomy: Taxonomy,
        alerts: Arc<AlertSink>,
        cancellation: &CancellationToken,
    ) -> Result<ClassifierResults, ClassificationError> {
        let store = Arc::clone(&self.store);
        let settings = Arc::clone(&self.settings);
        let sink = Arc::clone(&self.progress);
        let pool = Arc::clone(&self.pool);
        let cancellation = cancellation.clone();
        let classifier = self.classifier.name().to_string();

        tokio::task::spawn_blocking(move || -> Result<ClassifierResults, ClassificationError> {
            let concepts: Vec<(Nid, Option<Nid>)> = working_set
                .concepts()
                .into_iter()
                .map(|concept| (concept, working_set.stated_semantic(concept)))
                .collect();
            let progress = StageProgress::start(
                sink,
                Stage::Process,
                concepts.len(),
                settings.progress_interval,
            );
            let transaction = Transaction::new(TRANSACTION_NAME, settings.stamp.path);
            let context = RunContext {
                store: store.as_ref(),
                settings: &settings,
                coordinate: StampCoordinate::latest(settings.stamp.path),
                alerts: &alerts,
                progress: &progress,
                cancellation: &cancellation,
            };
            let outcomes =
                pool.install(|| process_all(&context, &taxonomy, &transaction, &concepts))?;

            // last chance to abandon the run; the transaction is dropped uncommitted
            if cancellation.is_cancelled() {
                return Err(ClassificationError::Cancelled {
                    stage: Stage::Process,
                });
            }
            let staged = transaction.len();
            let transaction_id = transaction.id();
            let commit = store.commit(transaction)?;
            info!(
                transaction = %transaction_id,
                components = staged,
                commit_time = %commit.time,
                "classification_committed"
            );

            let (changed, integrity_errors) = ClassifierResults::tally(&outcomes);
            progress.finish(&format!(
                "{} of {} concepts changed",
                changed.len(),
                outcomes.len()
            ));
            Ok(ClassifierResults {
                classifier,
                classified: concepts.iter().map(|(concept, _)| *concept).collect(),
                changed,
                equivalence_sets: ClassifierResults::equivalence_sets(&taxonomy),
                alerts: alerts.sorted(),
                integrity_errors,
                axiom_count: working_set.axiom_count(),
                commit,
            })
        })
        .await
        .map_err(|err| ClassificationError::Aborted {
            stage: Stage::Process,
            message: err.to_string(),
        })?
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::classification::progress::test_support::RecordingProgress;
    use crate::logic::{ExpressionBuilder, LogicalExpression};
    use crate::reasoner::{
        label_of, Axiom, Classifier, ClassifierError, LoadedOntology, BOTTOM_LABEL, TOP_LABEL,
    };
    use crate::store::{
        InMemorySemanticStore, SemanticRecord, SemanticVersion, Stamp, State,
    };

    /// Classifier returning a fixed taxonomy, optionally cancelling the run
    /// while it classifies.
    struct FixedClassifier {
        taxonomy: Taxonomy,
        cancel_on_classify: Option<CancellationToken>,
    }

    struct FixedOntology {
        axioms: usize,
        taxonomy: Taxonomy,
        cancel_on_classify: Option<CancellationToken>,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn load(
            &self,
            axioms: Vec<Axiom>,
        ) -> Result<Box<LoadedOntologyHandle>, ClassifierError> {
            Ok(Box::new(FixedOntology {
                axioms: axioms.len(),
                taxonomy: self.taxonomy.clone(),
                cancel_on_classify: self.cancel_on_classify.clone(),
            }))
        }
    }

    #[async_trait]
    impl LoadedOntology for FixedOntology {
        fn axiom_count(&self) -> usize {
            self.axioms
        }

        async fn classify(&self) -> Result<Taxonomy, ClassifierError> {
            if let Some(token) = &self.cancel_on_classify {
                token.cancel();
            }
            Ok(self.taxonomy.clone())
        }
    }

    fn seeded_store(settings: &ClassifierSettings) -> Arc<InMemorySemanticStore> {
        let store = Arc::new(InMemorySemanticStore::new());
        let mut builder = ExpressionBuilder::new();
        let parent = builder.concept(Nid::new(7)).expect("concept");
        let and = builder.and([parent]).expect("and");
        builder.necessary_set([and]).expect("set");
        let definition: LogicalExpression = builder.build().expect("definition");

        let stamp = &settings.stamp;
        let transaction = Transaction::new("seed", stamp.path);
        transaction.add_component(SemanticRecord::new(
            Nid::new(100),
            settings.patterns.stated,
            Nid::new(12),
            SemanticVersion::new(
                Stamp::uncommitted(State::Active, stamp.author, stamp.module, stamp.path),
                definition.into_tree(),
            ),
        ));
        store.commit(transaction).expect("seed commit");
        store
    }

    fn taxonomy() -> Taxonomy {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert([TOP_LABEL], Vec::<String>::new());
        taxonomy.insert([label_of(Nid::new(7))], [TOP_LABEL]);
        taxonomy.insert([label_of(Nid::new(12))], [label_of(Nid::new(7))]);
        taxonomy.insert([BOTTOM_LABEL], [label_of(Nid::new(12))]);
        taxonomy
    }

    fn pipeline(
        store: Arc<InMemorySemanticStore>,
        cancel_on_classify: bool,
    ) -> (ClassificationPipeline, Arc<RecordingProgress>) {
        let settings = ClassifierSettings {
            worker_threads: Some(2),
            ..ClassifierSettings::default()
        };
        let progress = Arc::new(RecordingProgress::default());
        let cancellation = CancellationToken::new();
        let classifier = Arc::new(FixedClassifier {
            taxonomy: taxonomy(),
            cancel_on_classify: cancel_on_classify.then(|| cancellation.clone()),
        });
        let mut pipeline = ClassificationPipeline::new(store, classifier, settings)
            .expect("pipeline")
            .with_progress(progress.clone());
        pipeline.cancellation = Mutex::new(cancellation);
        (pipeline, progress)
    }

    #[tokio::test]
    async fn run_commits_inferred_definition() {
        let settings = ClassifierSettings::default();
        let store = seeded_store(&settings);
        let (pipeline, progress) = pipeline(Arc::clone(&store), false);

        let results = pipeline.run().await.expect("run");
        assert_eq!(results.classifier, "fixed");
        assert_eq!(results.changed, BTreeSet::from([Nid::new(12)]));
        assert_eq!(
            store
                .semantics_of_pattern(settings.patterns.inferred)
                .expect("inferred semantics")
                .len(),
            1
        );
        let events = progress.events();
        assert!(events.iter().any(|event| event == "finish process"));
        assert!(!events.iter().any(|event| event.starts_with("fail")));
    }

    #[tokio::test]
    async fn cancelled_before_run_stops_at_extract() {
        let settings = ClassifierSettings::default();
        let store = seeded_store(&settings);
        let (pipeline, progress) = pipeline(Arc::clone(&store), false);
        pipeline.cancellation_token().cancel();

        let err = pipeline.run().await.expect_err("cancelled");
        assert!(matches!(
            err,
            ClassificationError::Cancelled {
                stage: Stage::Extract
            }
        ));
        assert_eq!(progress.events(), vec!["fail extract".to_string()]);
        assert!(store
            .semantics_of_pattern(settings.patterns.inferred)
            .expect("inferred semantics")
            .is_empty());
    }

    #[tokio::test]
    async fn cancelled_mid_run_commits_nothing() {
        let settings = ClassifierSettings::default();
        let store = seeded_store(&settings);
        let before = store.len().expect("len");
        let (pipeline, _) = pipeline(Arc::clone(&store), true);

        let err = pipeline.run().await.expect_err("cancelled");
        assert!(matches!(
            err,
            ClassificationError::Cancelled {
                stage: Stage::Process
            }
        ));
        assert_eq!(store.len().expect("len"), before);
    }

    #[tokio::test]
    async fn cancelled_run_does_not_block_the_next_one() {
        let settings = ClassifierSettings::default();
        let store = seeded_store(&settings);
        let (pipeline, _) = pipeline(Arc::clone(&store), false);
        let first = pipeline.cancellation_token();
        first.cancel();

        pipeline.run().await.expect_err("cancelled");
        assert!(!pipeline.cancellation_token().is_cancelled());

        let results = pipeline.run().await.expect("second run");
        assert_eq!(results.changed, BTreeSet::from([Nid::new(12)]));
    }
}

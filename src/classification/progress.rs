use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::ClassificationError;

/// Ordered stages of a classification run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Load,
    Classify,
    Process,
}

impl Stage {
    pub const ALL: [Self; 4] = [Self::Extract, Self::Load, Self::Classify, Self::Process];

    /// Human readable stage title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Extract => "Extracting axioms",
            Self::Load => "Loading axioms into classifier",
            Self::Classify => "Computing taxonomy",
            Self::Process => "Writing inferred definitions",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extract => "extract",
            Self::Load => "load",
            Self::Classify => "classify",
            Self::Process => "process",
        })
    }
}

/// Observer of stage titles, status messages and progress counters.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, stage: Stage, total: usize);

    fn progress(&self, stage: Stage, completed: usize, total: usize);

    fn stage_finished(&self, stage: Stage, message: &str);

    fn stage_failed(&self, stage: Stage, error: &ClassificationError);
}

/// [`ProgressSink`] reporting through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn stage_started(&self, stage: Stage, total: usize) {
        info!(stage = %stage, title = stage.title(), total, "classification_stage_started");
    }

    fn progress(&self, stage: Stage, completed: usize, total: usize) {
        info!(stage = %stage, completed, total, "classification_stage_progress");
    }

    fn stage_finished(&self, stage: Stage, message: &str) {
        info!(stage = %stage, message, "classification_stage_finished");
    }

    fn stage_failed(&self, stage: Stage, error: &ClassificationError) {
        error!(stage = %stage, err.msg = %error, err.detail = ?error, "classification_stage_error");
    }
}

/// Completed/total counter of one data-parallel stage.
pub(crate) struct StageProgress {
    sink: Arc<dyn ProgressSink>,
    stage: Stage,
    total: usize,
    interval: usize,
    completed: AtomicUsize,
}

impl StageProgress {
    pub(crate) fn start(
        sink: Arc<dyn ProgressSink>,
        stage: Stage,
        total: usize,
        interval: usize,
    ) -> Self {
        sink.stage_started(stage, total);
        Self {
            sink,
            stage,
            total,
            interval: interval.max(1),
            completed: AtomicUsize::new(0),
        }
    }

    /// Records one finished unit, reporting every `interval` units and on the
    /// last one.
    pub(crate) fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if completed % self.interval == 0 || completed == self.total {
            self.sink.progress(self.stage, completed, self.total);
        }
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn finish(&self, message: &str) {
        self.sink.stage_finished(self.stage, message);
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use tribunal_core::{PipelineConfig, RunStatus, StageConfig, StageStatus, TribunalError};

use crate::prompt;
use crate::provider::{AnalysisProvider, StageRequest};

/// Result of one executed stage.
///
/// # Examples
///
/// ```
/// use tribunal_core::StageStatus;
/// use tribunal_review::pipeline::StageOutput;
///
/// let output = StageOutput::done("logic", "Looks fine.");
/// assert_eq!(output.status, StageStatus::Done);
/// assert!(output.error.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    /// Name of the stage that produced this output.
    pub stage_name: String,
    /// Report text; empty for failed stages.
    pub report: String,
    /// Whether the provider returned a report.
    pub status: StageStatus,
    /// Failure description for failed stages.
    pub error: Option<String>,
}

impl StageOutput {
    /// A successful output.
    pub fn done(stage_name: impl Into<String>, report: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            report: report.into(),
            status: StageStatus::Done,
            error: None,
        }
    }

    /// A failed output carrying the error text.
    pub fn failed(stage_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            report: String::new(),
            status: StageStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Returns `true` if the stage failed.
    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// One pipeline invocation: the declared stage list, the outputs recorded so
/// far (in declaration order), and the run status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    /// Names of the stages this run was started with.
    pub declared_stages: Vec<String>,
    /// Outputs in declaration order. Shorter than `declared_stages` only
    /// when the run was cancelled.
    pub stages: Vec<StageOutput>,
    /// Lifecycle status.
    pub status: RunStatus,
}

impl PipelineRun {
    /// A pending run over `declared_stages`.
    pub fn new(declared_stages: Vec<String>) -> Self {
        Self {
            declared_stages,
            stages: Vec::new(),
            status: RunStatus::Pending,
        }
    }

    /// Number of failed stage outputs.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.is_failed()).count()
    }

    /// Declared stages that never produced an output.
    pub fn missing_stages(&self) -> impl Iterator<Item = &str> {
        self.declared_stages
            .iter()
            .map(String::as_str)
            .filter(|name| !self.stages.iter().any(|s| s.stage_name == *name))
    }
}

/// Create a linked [`Canceller`] / [`CancelSignal`] pair.
///
/// # Examples
///
/// ```
/// use tribunal_review::pipeline::cancel_pair;
///
/// let (canceller, signal) = cancel_pair();
/// assert!(!signal.is_cancelled());
/// canceller.cancel();
/// assert!(signal.is_cancelled());
/// ```
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller(Arc::new(tx)), CancelSignal(rx))
}

/// Handle that requests cancellation of a pipeline run.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<watch::Sender<bool>>);

impl Canceller {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiving side of a cancellation request, observed by the pipeline.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Pends forever if the [`Canceller`] was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Runs an ordered list of analysis stages against one change-set.
///
/// Stages run strictly in order. Stage *i* receives the base context plus
/// the outputs of stages `0..i`. A failing or timed-out stage is recorded as
/// [`StageStatus::Failed`] and the run continues with the next stage.
pub struct AnalysisPipeline {
    provider: Arc<dyn AnalysisProvider>,
    stage_timeout: Duration,
}

impl AnalysisPipeline {
    /// Create a pipeline from a provider and pipeline settings.
    pub fn new(provider: Arc<dyn AnalysisProvider>, config: &PipelineConfig) -> Self {
        Self::with_timeout(provider, Duration::from_secs(config.stage_timeout_secs))
    }

    /// Create a pipeline with an explicit per-stage timeout.
    pub fn with_timeout(provider: Arc<dyn AnalysisProvider>, stage_timeout: Duration) -> Self {
        Self {
            provider,
            stage_timeout,
        }
    }

    /// Run `stages` over `context`.
    ///
    /// Never fails: stage errors become failed outputs. When `cancel` fires
    /// no further stage is dispatched, the in-flight call is abandoned
    /// without an output, and the run ends [`RunStatus::Cancelled`] with the
    /// outputs recorded so far.
    ///
    /// The final status is [`RunStatus::Failed`] when every declared stage
    /// failed, [`RunStatus::Completed`] otherwise.
    #[instrument(skip_all, fields(stages = stages.len()))]
    pub async fn run(
        &self,
        context: &str,
        stages: &[StageConfig],
        mut cancel: CancelSignal,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(stages.iter().map(|s| s.name.clone()).collect());

        for (index, stage) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(stage = %stage.name, "run cancelled before dispatch");
                run.status = RunStatus::Cancelled;
                return run;
            }

            run.status = RunStatus::Running;
            let request = StageRequest {
                stage: stage.name.clone(),
                instructions: stage.prompt.clone(),
                context: prompt::build_stage_context(context, &run.stages),
            };

            info!(stage = %stage.name, index, "dispatching stage");
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(self.stage_timeout, self.provider.analyze(&request)) => Some(result),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let Some(result) = outcome else {
                warn!(stage = %stage.name, elapsed_ms, "run cancelled while stage in flight");
                run.status = RunStatus::Cancelled;
                return run;
            };

            let output = match result {
                Ok(Ok(report)) => {
                    info!(stage = %stage.name, elapsed_ms, "stage done");
                    StageOutput::done(&stage.name, report)
                }
                Ok(Err(e)) => {
                    let error = if e.is_stage_failure() {
                        e
                    } else {
                        TribunalError::StageProvider {
                            stage: stage.name.clone(),
                            message: e.to_string(),
                        }
                    };
                    warn!(stage = %stage.name, elapsed_ms, error = %error, "stage failed");
                    StageOutput::failed(&stage.name, error.to_string())
                }
                Err(_) => {
                    let error = TribunalError::StageTimeout {
                        stage: stage.name.clone(),
                        seconds: self.stage_timeout.as_secs(),
                    };
                    warn!(stage = %stage.name, elapsed_ms, error = %error, "stage timed out");
                    StageOutput::failed(&stage.name, error.to_string())
                }
            };
            run.stages.push(output);
        }

        run.status = if !run.stages.is_empty() && run.failed_count() == run.stages.len() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        debug_assert!(run.status.is_terminal());
        info!(status = %run.status, failed = run.failed_count(), "pipeline finished");
        run
    }
}

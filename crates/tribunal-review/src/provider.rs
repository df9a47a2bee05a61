use async_trait::async_trait;
use serde::Serialize;
use tribunal_core::TribunalError;

/// Input handed to an [`AnalysisProvider`] for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    /// Name of the stage being run.
    pub stage: String,
    /// Stage instructions from configuration.
    pub instructions: String,
    /// Change-set context plus the findings of every earlier stage.
    pub context: String,
}

/// Capability that turns a stage request into a free-text report.
///
/// Implementations may be remote, slow, or failing; the pipeline applies
/// the timeout and records failures, so an implementation only needs to
/// return its error.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use tribunal_core::TribunalError;
/// use tribunal_review::provider::{AnalysisProvider, StageRequest};
///
/// struct Echo;
///
/// #[async_trait]
/// impl AnalysisProvider for Echo {
///     async fn analyze(&self, request: &StageRequest) -> Result<String, TribunalError> {
///         Ok(format!("{} looked at {} bytes", request.stage, request.context.len()))
///     }
/// }
/// ```
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Produce the report for `request`.
    async fn analyze(&self, request: &StageRequest) -> Result<String, TribunalError>;
}

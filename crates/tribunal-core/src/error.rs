use std::path::PathBuf;

/// Errors that can occur across the Tribunal workspace.
///
/// Library crates return this type directly; the binary converts it into a
/// `miette::Report` at the boundary. The stage variants never escape the
/// pipeline: they are folded into a failed stage output instead.
///
/// # Examples
///
/// ```
/// use tribunal_core::TribunalError;
///
/// let err = TribunalError::StageTimeout { stage: "security".into(), seconds: 30 };
/// assert!(err.to_string().contains("security"));
/// assert!(err.is_stage_failure());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TribunalError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(tribunal::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(tribunal::config))]
    Config(String),

    /// File metadata that cannot form a file change at all.
    #[error("parse error: {0}")]
    #[diagnostic(code(tribunal::parse))]
    Parse(String),

    /// An analysis stage exceeded its time budget.
    #[error("stage '{stage}' timed out after {seconds}s")]
    #[diagnostic(code(tribunal::stage_timeout))]
    StageTimeout {
        /// Name of the stage that timed out.
        stage: String,
        /// Configured timeout in seconds.
        seconds: u64,
    },

    /// The analysis provider failed or returned an error for a stage.
    #[error("stage '{stage}' failed: {message}")]
    #[diagnostic(code(tribunal::stage_provider))]
    StageProvider {
        /// Name of the failing stage.
        stage: String,
        /// Provider error text.
        message: String,
    },

    /// A stage output names a stage that was never declared.
    #[error("stage output '{stage}' does not match any declared stage")]
    #[diagnostic(
        code(tribunal::aggregation_inconsistency),
        help("this is an internal defect: stage outputs must come from the declared stage list")
    )]
    AggregationInconsistency {
        /// The undeclared stage name.
        stage: String,
    },

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(tribunal::llm))]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(tribunal::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(tribunal::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(tribunal::file_not_found))]
    FileNotFound(PathBuf),
}

impl TribunalError {
    /// Returns `true` for errors that are recorded as a failed stage rather
    /// than propagated.
    pub fn is_stage_failure(&self) -> bool {
        matches!(
            self,
            TribunalError::StageTimeout { .. } | TribunalError::StageProvider { .. }
        )
    }
}

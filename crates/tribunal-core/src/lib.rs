//! Core types, configuration, and error handling for Tribunal.
//!
//! This crate provides the shared foundation used by the other Tribunal crates:
//! - [`TribunalError`]: unified error type using `thiserror` and `miette`
//! - [`TribunalConfig`]: configuration loaded from `.tribunal.toml`
//! - Shared types: [`FileChange`], [`ChangeLine`], [`ChangeStatus`],
//!   [`ChangeSetInfo`], [`Severity`], [`StageStatus`], [`RunStatus`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{DigestConfig, LlmConfig, PipelineConfig, StageConfig, TribunalConfig};
pub use error::TribunalError;
pub use types::{
    ChangeLine, ChangeSetInfo, ChangeStatus, FileChange, LineKind, OutputFormat, RunStatus,
    Severity, StageStatus,
};

/// A convenience `Result` type for Tribunal operations.
pub type Result<T> = std::result::Result<T, TribunalError>;

//! Multi-stage review orchestration.
//!
//! Provides the analysis-provider seam, an OpenAI-compatible LLM provider,
//! the built-in stage prompts, the sequential analysis pipeline, and the
//! aggregation and report formatting that turn stage outputs into a review.

pub mod aggregate;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod report;

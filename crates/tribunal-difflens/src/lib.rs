//! Diff parsing and change-set digests.
//!
//! Turns per-file records (or raw `git diff` output) into line-level
//! [`FileChange`](tribunal_core::FileChange)s and renders the bounded digest
//! that every analysis stage receives as context.

pub mod language;
pub mod parser;
pub mod summary;

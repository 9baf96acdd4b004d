//! clang-analyze core library.
//!
//! This crate runs an external static analyzer over a source tree under one
//! or more named profiles and turns its clang-style text output into a
//! deduplicated directory → file → diagnostic tree.
//!
//! High-level modules:
//! - `analyzer`: Run orchestration, tool invocation, progress and cancellation.
//! - `parser`: Classification of analyzer output lines.
//! - `path`: Path string normalization.
//! - `dedup`: Run-scoped duplicate suppression.
//! - `models`: Result node variants and the result tree.
//! - `config`: Settings discovery and effective configuration resolution.
//! - `errors`: Run-level and settings error types.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `output`: Human/JSON printers and progress rendering.
//! - `utils`: Supporting helpers.
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod models;
pub mod output;
pub mod parser;
pub mod path;
pub mod utils;

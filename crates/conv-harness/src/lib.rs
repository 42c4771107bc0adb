//! # conv-harness
//!
//! Differential verification of an external 2D convolution program.
//!
//! The harness writes matrices to disk, drives the external executable
//! through its file-based CLI, reads the results back and compares them
//! against an independently computed zero-padded reference convolution.
//! A companion module turns `*threads.log` benchmark files into
//! speedup/efficiency reports.
//!
//! ## Modules
//!
//! - [`matrix`] — In-memory row-major matrix type
//! - [`codec`] — Plain-text matrix file format (read/write)
//! - [`reference`] — Trusted zero-padded 2D convolution
//! - [`generator`] — Deterministic test matrix patterns
//! - [`exec`] — Run the external program with a timeout
//! - [`compare`] — Tolerance-based comparison with diagnostics
//! - [`suite`] — Scenario battery and aggregated report
//! - [`metadata`] — Per-scenario JSON dumps for debugging
//! - [`perf`] — Benchmark log aggregation (speedup/efficiency)
//! - [`config`] — Harness configuration and tolerances
//! - [`interrupt`] — Cross-thread interrupt flag

pub mod codec;
pub mod compare;
pub mod config;
pub mod error;
pub mod exec;
pub mod generator;
pub mod interrupt;
pub mod matrix;
pub mod metadata;
pub mod perf;
pub mod reference;
pub mod suite;

//! # Marginal Core
//!
//! Execution engine for compiled message-passing inference programs.
//!
//! A model compiler (external to this crate) emits a schedule of
//! dependency-scoped recomputation units plus a set of observed inputs and
//! marginal outputs. This crate provides the runtime those programs execute
//! against: message stores (in-memory and file-backed), block partitioning for
//! out-of-core ranges, the phase graph with resumable iteration, the
//! iteration driver, and the replicate/divide combinator for variables shared
//! across many use-sites.

pub mod engine;

// Re-export commonly used types
pub use engine::driver::InferenceProgram;
pub use engine::errors::RuntimeError;
pub use engine::message::Message;

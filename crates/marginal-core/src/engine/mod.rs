//! The execution engine for compiled inference programs.
//!
//! This module provides:
//! - **errors**: Error types for execution failures
//! - **message**: Distribution-valued messages with product/ratio algebra
//! - **store**: In-memory message arrays behind the `MessageStore` trait
//! - **file_array**: File-backed message arrays with process-wide I/O counters
//! - **partition**: Contiguous block covers of a range, with on-demand loading
//! - **observed**: Typed, shape-checked observed-input storage
//! - **schedule**: The dependency-scoped phase graph with resumable iteration
//! - **driver**: The public execute/update/reset/marginal contract
//! - **replicate**: The replicate/divide combinator for shared variables

pub mod driver;
pub mod errors;
pub mod file_array;
pub mod message;
pub mod observed;
pub mod partition;
pub mod replicate;
pub mod schedule;
pub mod store;

//! # Marginal Models
//!
//! Hand-built inference programs standing in for model-compiler output.
//! Each builder assembles an `InferenceProgram`: it declares observed inputs,
//! registers recomputation units against the phase graph, and registers the
//! tracked marginals. The bodies are exactly what a compiler would emit for
//! the corresponding model, written against the public runtime API.

pub mod categorical;
pub mod constraints;
pub mod gaussian;
pub mod noisy_count;

//! Dirichlet–categorical learning.
//!
//! The model: `theta ~ Dirichlet(alpha0)`, `label_i ~ Categorical(theta)`.
//! The posterior is conjugate (prior concentrations plus per-category
//! counts), so the interesting part here is the partitioned variant: each
//! block contributes its counts as a Dirichlet message through a replicate
//! group, and the converged marginal must match the flat computation.

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::message::{Dirichlet, Message};
use marginal_core::engine::observed::ObservedShape;
use marginal_core::engine::partition::Partition;
use marginal_core::engine::replicate::ReplicateGroup;

fn count_labels(k: usize, labels: &[i64]) -> Result<Vec<f64>, RuntimeError> {
    let mut counts = vec![0.0; k];
    for &label in labels {
        let index = usize::try_from(label)
            .ok()
            .filter(|&i| i < k)
            .ok_or_else(|| {
                RuntimeError::Execution(format!(
                    "label {label} out of range for {k} categories"
                ))
            })?;
        counts[index] += 1.0;
    }
    Ok(counts)
}

/// A counts message: multiplying it onto a Dirichlet adds the counts.
fn counts_message(counts: &[f64]) -> Result<Dirichlet, RuntimeError> {
    Dirichlet::new(counts.iter().map(|c| c + 1.0).collect())
}

pub struct CategoricalLearnerState {
    k: usize,
    prior: Dirichlet,
    pub posterior: Dirichlet,
}

/// Builds the flat categorical learner over `n` labels in `0..k`.
pub fn categorical_learner(
    k: usize,
    n: usize,
    prior: Dirichlet,
) -> Result<InferenceProgram<CategoricalLearnerState>, RuntimeError> {
    if prior.len() != k {
        return Err(RuntimeError::Argument(format!(
            "prior has {} components for {k} categories",
            prior.len()
        )));
    }
    let mut program = InferenceProgram::new(CategoricalLearnerState {
        k,
        posterior: prior.clone(),
        prior,
    });
    program.declare_observed("labels", ObservedShape::Array { len: n })?;

    program
        .schedule_mut()
        .register_init("count_labels", &["labels"], &[], false, |s, obs, _| {
            let counts = count_labels(s.k, obs.ints("labels")?)?;
            s.posterior = s.prior.product(&counts_message(&counts)?)?;
            Ok(())
        })?;

    program.register_marginal("weights", |s| Ok(Message::Dirichlet(s.posterior.clone())))?;
    Ok(program)
}

pub struct PartitionedCategoricalLearnerState {
    k: usize,
    partition: Partition,
    pub shared: ReplicateGroup,
}

/// Builds the partitioned categorical learner: per-block counts contributed
/// through a replicate group.
pub fn categorical_learner_partitioned(
    k: usize,
    partition: Partition,
    prior: Dirichlet,
) -> Result<InferenceProgram<PartitionedCategoricalLearnerState>, RuntimeError> {
    if prior.len() != k {
        return Err(RuntimeError::Argument(format!(
            "prior has {} components for {k} categories",
            prior.len()
        )));
    }
    let shared = ReplicateGroup::new(Message::Dirichlet(prior), partition.block_count())?;
    let mut program = InferenceProgram::new(PartitionedCategoricalLearnerState {
        k,
        partition: partition.clone(),
        shared,
    });
    program.declare_observed(
        "labels",
        ObservedShape::Partitioned {
            sizes: partition.sizes(),
        },
    )?;

    program
        .schedule_mut()
        .register_init("initialise_shared", &[], &[], true, |s, _, _| {
            s.shared.reset();
            Ok(())
        })?;

    program.schedule_mut().register_iterative(
        "block_counts",
        &["labels"],
        &["initialise_shared"],
        |s, obs, span| {
            for _ in span {
                for b in 0..s.partition.block_count() {
                    let counts = count_labels(s.k, obs.int_block("labels", b)?)?;
                    s.shared
                        .submit(b, Message::Dirichlet(counts_message(&counts)?))?;
                }
                s.shared.refresh()?;
            }
            Ok(())
        },
    )?;

    program.register_marginal("weights", |s| s.shared.marginal())?;
    Ok(program)
}

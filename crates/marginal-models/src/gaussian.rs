//! Learning a Gaussian's mean and precision by variational message passing.
//!
//! The model: `x_i ~ N(mean, precision)` with a Gaussian prior on `mean` and
//! a Gamma prior on `precision`. Each sweep updates the precision marginal
//! from the current mean marginal, then the mean marginal from the new
//! expected precision. Three builders share the math:
//!
//! - [`gaussian_learner`]: all data in one flat observed array.
//! - [`gaussian_learner_partitioned`]: data split across blocks, with the
//!   shared mean and precision carried through replicate groups.
//! - [`gaussian_learner_file_backed`]: per-datum messages persisted in a
//!   file-backed array, for I/O-volume regression tests.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::file_array::FileArray;
use marginal_core::engine::message::{Gamma, Gaussian, Message};
use marginal_core::engine::observed::ObservedShape;
use marginal_core::engine::partition::Partition;
use marginal_core::engine::replicate::ReplicateGroup;
use marginal_core::engine::store::MessageStore;

/// Standard deviation of the optional symmetry-breaking jitter applied to
/// the initial mean marginal.
const INIT_JITTER_SD: f64 = 0.1;

/// Priors and initialization options for the Gaussian learner.
#[derive(Debug, Clone, Copy)]
pub struct GaussianLearnerConfig {
    pub mean_prior: Gaussian,
    pub precision_prior: Gamma,
    /// Seed for initial-mean jitter. Seeded explicitly so runs are
    /// reproducible regardless of call order; `None` starts exactly at the
    /// prior mean.
    pub init_jitter_seed: Option<u64>,
}

impl Default for GaussianLearnerConfig {
    fn default() -> Self {
        GaussianLearnerConfig {
            mean_prior: Gaussian::from_mean_and_variance(0.0, 100.0),
            precision_prior: Gamma::from_shape_and_rate(1.0, 1.0),
            init_jitter_seed: None,
        }
    }
}

fn jittered(mean_prior: Gaussian, seed: Option<u64>) -> Result<Gaussian, RuntimeError> {
    let Some(seed) = seed else {
        return Ok(mean_prior);
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, INIT_JITTER_SD)
        .map_err(|e| RuntimeError::Numerical(format!("jitter distribution: {e}")))?
        .sample(&mut rng);
    Ok(Gaussian::from_mean_and_precision(
        mean_prior.mean() + noise,
        mean_prior.precision,
    ))
}

/// Updates the precision marginal from the current mean marginal.
fn precision_update(config: &GaussianLearnerConfig, mean_marginal: Gaussian, xs: &[f64]) -> Gamma {
    let mu = mean_marginal.mean();
    let var = mean_marginal.variance();
    let sq: f64 = xs.iter().map(|x| (x - mu).powi(2) + var).sum();
    Gamma {
        shape: config.precision_prior.shape + 0.5 * xs.len() as f64,
        rate: config.precision_prior.rate + 0.5 * sq,
    }
}

/// Updates the mean marginal from the expected precision.
fn mean_update(config: &GaussianLearnerConfig, expected_precision: f64, xs: &[f64]) -> Gaussian {
    let sum: f64 = xs.iter().sum();
    Gaussian {
        mean_times_precision: config.mean_prior.mean_times_precision + expected_precision * sum,
        precision: config.mean_prior.precision + expected_precision * xs.len() as f64,
    }
}

pub struct GaussianLearnerState {
    config: GaussianLearnerConfig,
    pub mean_marginal: Gaussian,
    pub precision_marginal: Gamma,
}

/// Builds the flat-array Gaussian learner over `n` observations.
pub fn gaussian_learner(
    n: usize,
    config: GaussianLearnerConfig,
) -> Result<InferenceProgram<GaussianLearnerState>, RuntimeError> {
    let mut program = InferenceProgram::new(GaussianLearnerState {
        config,
        mean_marginal: config.mean_prior,
        precision_marginal: config.precision_prior,
    });
    program.declare_observed("data", ObservedShape::Array { len: n })?;

    program
        .schedule_mut()
        .register_init("initialise_marginals", &[], &[], true, |s, _, _| {
            s.mean_marginal = jittered(s.config.mean_prior, s.config.init_jitter_seed)?;
            s.precision_marginal = s.config.precision_prior;
            Ok(())
        })?;

    program.schedule_mut().register_iterative(
        "vmp_sweep",
        &["data"],
        &["initialise_marginals"],
        |s, obs, span| {
            let xs = obs.reals("data")?;
            for _ in span {
                s.precision_marginal = precision_update(&s.config, s.mean_marginal, xs);
                s.mean_marginal = mean_update(&s.config, s.precision_marginal.mean(), xs);
            }
            Ok(())
        },
    )?;

    program.register_marginal("mean", |s| Ok(Message::Gaussian(s.mean_marginal)))?;
    program.register_marginal("precision", |s| Ok(Message::Gamma(s.precision_marginal)))?;
    Ok(program)
}

pub struct PartitionedGaussianLearnerState {
    config: GaussianLearnerConfig,
    partition: Partition,
    pub mean_shared: ReplicateGroup,
    pub precision_shared: ReplicateGroup,
}

/// Builds the partitioned Gaussian learner: one block of observations per
/// partition block, with mean and precision shared across blocks through
/// replicate groups.
pub fn gaussian_learner_partitioned(
    partition: Partition,
    config: GaussianLearnerConfig,
) -> Result<InferenceProgram<PartitionedGaussianLearnerState>, RuntimeError> {
    let sites = partition.block_count();
    let mean_shared = ReplicateGroup::new(Message::Gaussian(config.mean_prior), sites)?;
    let precision_shared = ReplicateGroup::new(Message::Gamma(config.precision_prior), sites)?;

    let mut program = InferenceProgram::new(PartitionedGaussianLearnerState {
        config,
        partition: partition.clone(),
        mean_shared,
        precision_shared,
    });
    program.declare_observed(
        "data",
        ObservedShape::Partitioned {
            sizes: partition.sizes(),
        },
    )?;

    program
        .schedule_mut()
        .register_init("initialise_shared", &[], &[], true, |s, _, _| {
            s.mean_shared.reset();
            s.precision_shared.reset();
            Ok(())
        })?;

    program.schedule_mut().register_iterative(
        "block_sweep",
        &["data"],
        &["initialise_shared"],
        |s, obs, span| {
            for _ in span {
                // All blocks read the previous sweep's marginals; the
                // refresh below is the sweep barrier.
                let mean_prev = s.mean_shared.marginal()?.gaussian()?;
                let expected_precision = s.precision_shared.marginal()?.gamma()?.mean();

                for b in 0..s.partition.block_count() {
                    let xs = obs.real_block("data", b)?;

                    let block_config = s.config;
                    let prec_contribution = {
                        let full = precision_update(&block_config, mean_prev, xs);
                        // Likelihood-only part: the prior is carried by the
                        // group's definition.
                        Gamma {
                            shape: full.shape - block_config.precision_prior.shape + 1.0,
                            rate: full.rate - block_config.precision_prior.rate,
                        }
                    };
                    s.precision_shared
                        .submit(b, Message::Gamma(prec_contribution))?;

                    let prior_b = s.mean_shared.effective_prior(b)?;
                    let likelihood = Gaussian {
                        mean_times_precision: expected_precision * xs.iter().sum::<f64>(),
                        precision: expected_precision * xs.len() as f64,
                    };
                    let local = prior_b.product(&Message::Gaussian(likelihood))?;
                    let contribution = local.ratio(&prior_b)?;
                    s.mean_shared.submit(b, contribution)?;
                }

                s.precision_shared.refresh()?;
                s.mean_shared.refresh()?;
            }
            Ok(())
        },
    )?;

    program.register_marginal("mean", |s| s.mean_shared.marginal())?;
    program.register_marginal("precision", |s| s.precision_shared.marginal())?;
    Ok(program)
}

pub struct FileBackedGaussianLearnerState {
    config: GaussianLearnerConfig,
    pub datum_messages: FileArray,
    pub mean_marginal: Gaussian,
    pub precision_marginal: Gamma,
}

/// Builds the Gaussian learner with per-datum messages persisted through a
/// file-backed array: each sweep writes one record per datum and reads them
/// all back to aggregate, so the expected I/O volume per `execute(t)` is
/// exactly `n` creation writes plus `t·n` writes and `t·n` reads.
pub fn gaussian_learner_file_backed(
    dir: impl AsRef<Path>,
    n: usize,
    config: GaussianLearnerConfig,
) -> Result<InferenceProgram<FileBackedGaussianLearnerState>, RuntimeError> {
    let datum_messages =
        FileArray::create(dir, n, |_| Message::Gaussian(Gaussian::uniform()))?;
    let mut program = InferenceProgram::new(FileBackedGaussianLearnerState {
        config,
        datum_messages,
        mean_marginal: config.mean_prior,
        precision_marginal: config.precision_prior,
    });
    program.declare_observed("data", ObservedShape::Array { len: n })?;

    program
        .schedule_mut()
        .register_init("initialise_marginals", &[], &[], true, |s, _, _| {
            s.mean_marginal = jittered(s.config.mean_prior, s.config.init_jitter_seed)?;
            s.precision_marginal = s.config.precision_prior;
            Ok(())
        })?;

    program.schedule_mut().register_iterative(
        "vmp_sweep",
        &["data"],
        &["initialise_marginals"],
        |s, obs, span| {
            let xs = obs.reals("data")?;
            for _ in span {
                s.precision_marginal = precision_update(&s.config, s.mean_marginal, xs);
                let expected_precision = s.precision_marginal.mean();

                for (i, &x) in xs.iter().enumerate() {
                    let datum = Gaussian {
                        mean_times_precision: expected_precision * x,
                        precision: expected_precision,
                    };
                    s.datum_messages.set(i, Message::Gaussian(datum))?;
                }
                let mut likelihood = Gaussian::uniform();
                for i in 0..s.datum_messages.len() {
                    likelihood = likelihood.product(&s.datum_messages.get(i)?.gaussian()?)?;
                }
                s.mean_marginal = s.config.mean_prior.product(&likelihood)?;
            }
            Ok(())
        },
    )?;

    program.register_marginal("mean", |s| Ok(Message::Gaussian(s.mean_marginal)))?;
    program.register_marginal("precision", |s| Ok(Message::Gamma(s.precision_marginal)))?;
    Ok(program)
}

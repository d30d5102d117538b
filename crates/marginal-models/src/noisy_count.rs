//! Posterior over a count from noisy boolean draws.
//!
//! The model: a count `c` with a uniform discrete prior over `0..k`; each
//! draw is true with probability `c/(k-1)`, then flipped with a known flip
//! probability. The posterior is an exact discrete product over the draws.
//! With a flip probability of zero and contradictory draws, the product has
//! no remaining support and recomputation surfaces a constraint violation.

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::message::{Discrete, Message};
use marginal_core::engine::observed::ObservedShape;
use marginal_core::engine::partition::Partition;
use marginal_core::engine::replicate::ReplicateGroup;

fn validate(k: usize, flip: f64) -> Result<(), RuntimeError> {
    if k < 2 {
        return Err(RuntimeError::Argument(
            "count model needs at least two count values".into(),
        ));
    }
    if !(0.0..=1.0).contains(&flip) || flip.is_nan() {
        return Err(RuntimeError::Argument(format!(
            "flip probability {flip} outside [0, 1]"
        )));
    }
    Ok(())
}

/// The per-count likelihood of a single draw.
fn draw_likelihood(k: usize, flip: f64, value: bool) -> Result<Discrete, RuntimeError> {
    let weights = (0..k)
        .map(|c| {
            let fraction = c as f64 / (k - 1) as f64;
            let p_true = flip + fraction * (1.0 - 2.0 * flip);
            if value {
                p_true
            } else {
                1.0 - p_true
            }
        })
        .collect();
    Discrete::new(weights)
}

fn combine_draws(k: usize, flip: f64, draws: &[bool]) -> Result<Discrete, RuntimeError> {
    let mut posterior = Discrete::uniform(k)?;
    for &value in draws {
        posterior = posterior.product(&draw_likelihood(k, flip, value)?)?;
    }
    Ok(posterior)
}

pub struct NoisyCountState {
    k: usize,
    flip: f64,
    pub posterior: Discrete,
}

/// Builds the flat noisy-count model over `n` draws.
pub fn noisy_count(
    k: usize,
    n: usize,
    flip: f64,
) -> Result<InferenceProgram<NoisyCountState>, RuntimeError> {
    validate(k, flip)?;
    let mut program = InferenceProgram::new(NoisyCountState {
        k,
        flip,
        posterior: Discrete::uniform(k)?,
    });
    program.declare_observed("draws", ObservedShape::Array { len: n })?;

    program
        .schedule_mut()
        .register_init("combine_draws", &["draws"], &[], false, |s, obs, _| {
            s.posterior = combine_draws(s.k, s.flip, obs.booleans("draws")?)?;
            Ok(())
        })?;

    program.register_marginal("count", |s| Ok(Message::Discrete(s.posterior.clone())))?;
    Ok(program)
}

pub struct PartitionedNoisyCountState {
    k: usize,
    flip: f64,
    partition: Partition,
    pub shared: ReplicateGroup,
}

/// Builds the noisy-count model with the observation range partitioned:
/// each block contributes the product of its draws' likelihoods through a
/// replicate group, recomputed against the block's effective prior.
pub fn noisy_count_partitioned(
    k: usize,
    partition: Partition,
    flip: f64,
) -> Result<InferenceProgram<PartitionedNoisyCountState>, RuntimeError> {
    validate(k, flip)?;
    let shared = ReplicateGroup::new(
        Message::Discrete(Discrete::uniform(k)?),
        partition.block_count(),
    )?;
    let mut program = InferenceProgram::new(PartitionedNoisyCountState {
        k,
        flip,
        partition: partition.clone(),
        shared,
    });
    program.declare_observed(
        "draws",
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
        "block_draws",
        &["draws"],
        &["initialise_shared"],
        |s, obs, span| {
            for _ in span {
                for b in 0..s.partition.block_count() {
                    let draws = obs.bool_block("draws", b)?;
                    let mut likelihood = Discrete::uniform(s.k)?;
                    for &value in draws {
                        likelihood = likelihood.product(&draw_likelihood(s.k, s.flip, value)?)?;
                    }
                    let prior_b = s.shared.effective_prior(b)?;
                    let local = prior_b.product(&Message::Discrete(likelihood))?;
                    let contribution = local.ratio(&prior_b)?;
                    s.shared.submit(b, contribution)?;
                }
                s.shared.refresh()?;
            }
            Ok(())
        },
    )?;

    program.register_marginal("count", |s| s.shared.marginal())?;
    Ok(program)
}

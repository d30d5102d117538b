//! Failure surfaces and recovery: contradictory observations fail at the
//! unit that detects them, and correcting the observation lets the same
//! program recompute cleanly.

use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::observed::ObservedValue;
use marginal_models::constraints::negation_program;
use marginal_models::noisy_count::noisy_count;

#[test]
fn contradictory_negation_fails_then_recovers() {
    let mut program = negation_program().unwrap();
    program.set_observed("a", ObservedValue::Bool(true)).unwrap();
    program.set_observed("b", ObservedValue::Bool(true)).unwrap();

    let err = program.execute(0).unwrap_err();
    assert!(matches!(err, RuntimeError::ConstraintViolated(_)));

    // Correct the contradicting observation; the failed unit re-runs.
    program.set_observed("b", ObservedValue::Bool(false)).unwrap();
    program.execute(0).unwrap();
    let b = program.marginal("b").unwrap().bernoulli().unwrap();
    assert!(b.is_point_mass());
    assert_eq!(b.prob_true(), 0.0);
}

#[test]
fn failed_unit_retries_on_the_next_request_without_reobservation() {
    let mut program = negation_program().unwrap();
    program.set_observed("a", ObservedValue::Bool(false)).unwrap();
    program.set_observed("b", ObservedValue::Bool(false)).unwrap();

    assert!(program.execute(0).is_err());
    // Nothing changed: the unit is still stale and fails identically.
    assert!(matches!(
        program.execute(0),
        Err(RuntimeError::ConstraintViolated(_))
    ));

    program.set_observed("b", ObservedValue::Bool(true)).unwrap();
    program.execute(0).unwrap();
    assert_eq!(
        program.marginal("b").unwrap().bernoulli().unwrap().prob_true(),
        1.0
    );
}

#[test]
fn noiseless_contradictory_draws_have_no_posterior_support() {
    // With a flip probability of zero, a true and a false draw of the same
    // binary count cannot both happen.
    let mut program = noisy_count(2, 2, 0.0).unwrap();
    program
        .set_observed("draws", ObservedValue::Bools(vec![true, false]))
        .unwrap();
    let err = program.execute(1).unwrap_err();
    assert!(matches!(err, RuntimeError::ConstraintViolated(_)));
}

#[test]
fn noisy_draws_keep_support_everywhere() {
    let mut program = noisy_count(2, 2, 0.1).unwrap();
    program
        .set_observed("draws", ObservedValue::Bools(vec![true, false]))
        .unwrap();
    program.execute(1).unwrap();
    let posterior = program.marginal("count").unwrap();
    let probs = posterior.discrete().unwrap().probs().to_vec();
    assert_eq!(probs.len(), 2);
    assert!(probs.iter().all(|&p| p > 0.0));
}

#[test]
fn executing_before_observing_inputs_is_an_execution_error() {
    let mut program = negation_program().unwrap();
    program.set_observed("a", ObservedValue::Bool(true)).unwrap();
    assert!(matches!(
        program.execute(0),
        Err(RuntimeError::Execution(_))
    ));
}

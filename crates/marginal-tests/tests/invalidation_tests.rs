//! Dependency-scoped recomputation: re-observing an input re-runs only the
//! units downstream of that input, and run counters make the scope visible.

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::message::{Gaussian, Message};
use marginal_core::engine::observed::{ObservedShape, ObservedValue};
use marginal_models::gaussian::{gaussian_learner, GaussianLearnerConfig};
use marginal_tests::synthetic_normal;

// Two independent branches fed by separate inputs, so invalidation scope
// shows up directly in the run counters.
struct TwoBranch {
    left: f64,
    right: f64,
}

fn two_branch_program() -> InferenceProgram<TwoBranch> {
    let mut program = InferenceProgram::new(TwoBranch {
        left: 0.0,
        right: 0.0,
    });
    program.declare_observed("a", ObservedShape::Scalar).unwrap();
    program.declare_observed("b", ObservedShape::Scalar).unwrap();
    program
        .schedule_mut()
        .register_init("left_branch", &["a"], &[], false, |s, obs, _| {
            s.left = obs.real("a")? * 2.0;
            Ok(())
        })
        .unwrap();
    program
        .schedule_mut()
        .register_init("right_branch", &["b"], &[], false, |s, obs, _| {
            s.right = obs.real("b")? * 3.0;
            Ok(())
        })
        .unwrap();
    program
        .register_marginal("left", |s| {
            Ok(Message::Gaussian(Gaussian::from_mean_and_precision(
                s.left, 1.0,
            )))
        })
        .unwrap();
    program
        .register_marginal("right", |s| {
            Ok(Message::Gaussian(Gaussian::from_mean_and_precision(
                s.right, 1.0,
            )))
        })
        .unwrap();
    program
}

fn mean_of(program: &InferenceProgram<TwoBranch>, name: &str) -> f64 {
    program.marginal(name).unwrap().gaussian().unwrap().mean()
}

#[test]
fn re_observing_one_input_reruns_only_its_branch() {
    let mut program = two_branch_program();
    program.set_observed("a", ObservedValue::Real(1.0)).unwrap();
    program.set_observed("b", ObservedValue::Real(1.0)).unwrap();
    program.execute(0).unwrap();
    program.reset_stats();

    program.set_observed("a", ObservedValue::Real(5.0)).unwrap();
    program.update(0).unwrap();

    let stats = program.stats();
    assert_eq!(stats.runs_for("left_branch"), 1);
    assert_eq!(stats.runs_for("right_branch"), 0);
    assert_eq!(mean_of(&program, "left"), 10.0);
    assert_eq!(mean_of(&program, "right"), 3.0);
}

#[test]
fn untouched_inputs_keep_their_done_markers_across_updates() {
    let mut program = two_branch_program();
    program.set_observed("a", ObservedValue::Real(1.0)).unwrap();
    program.set_observed("b", ObservedValue::Real(2.0)).unwrap();
    program.execute(0).unwrap();
    program.reset_stats();

    // Nothing invalidated: updates run nothing at all.
    program.update(0).unwrap();
    program.update(0).unwrap();
    let stats = program.stats();
    assert_eq!(stats.runs_for("left_branch"), 0);
    assert_eq!(stats.runs_for("right_branch"), 0);
}

#[test]
fn re_observed_data_replays_iterations_without_reinitialising() {
    let data = synthetic_normal(13, 20, 1.0, 1.0);
    let mut program = gaussian_learner(20, GaussianLearnerConfig::default()).unwrap();
    program
        .set_observed("data", ObservedValue::Reals(data))
        .unwrap();
    program.execute(8).unwrap();
    program.reset_stats();

    let shifted = synthetic_normal(13, 20, 6.0, 1.0);
    program
        .set_observed("data", ObservedValue::Reals(shifted.clone()))
        .unwrap();
    program.update(0).unwrap();

    // The sweep replays to the done count against the new data; the
    // warm-start unit is not downstream of "data" and stays done.
    let stats = program.stats();
    assert_eq!(stats.runs_for("vmp_sweep"), 8);
    assert_eq!(stats.runs_for("initialise_marginals"), 0);

    let mean = program.marginal("mean").unwrap().gaussian().unwrap().mean();
    let sample_mean: f64 = shifted.iter().sum::<f64>() / shifted.len() as f64;
    assert!((mean - sample_mean).abs() < 0.5);
}

#[test]
fn cold_start_reruns_warm_start_units() {
    let data = synthetic_normal(17, 12, 0.0, 1.0);
    let mut program = gaussian_learner(12, GaussianLearnerConfig::default()).unwrap();
    program
        .set_observed("data", ObservedValue::Reals(data))
        .unwrap();
    program.execute(4).unwrap();
    program.reset_stats();

    program.execute(4).unwrap();
    let stats = program.stats();
    assert_eq!(stats.runs_for("initialise_marginals"), 1);
    assert_eq!(stats.runs_for("vmp_sweep"), 4);
}

#[test]
fn rejected_observation_invalidates_nothing() {
    let mut program = two_branch_program();
    program.set_observed("a", ObservedValue::Real(1.0)).unwrap();
    program.set_observed("b", ObservedValue::Real(1.0)).unwrap();
    program.execute(0).unwrap();
    program.reset_stats();

    let result = program.set_observed("a", ObservedValue::Reals(vec![1.0]));
    assert!(matches!(result, Err(RuntimeError::ShapeMismatch { .. })));

    program.update(0).unwrap();
    assert_eq!(program.stats().runs_for("left_branch"), 0);
    assert_eq!(mean_of(&program, "left"), 2.0);
}

//! The iteration driver: the public contract of a compiled program.
//!
//! `InferenceProgram` owns the model state, the phase graph, all observed
//! inputs, and the marginal registry. Calling code interacts only through
//! `set_observed`, `execute`, `update`, `reset`, and `marginal`; everything
//! else (message arrays, replicate groups, partitions) lives inside the model
//! state and is mutated exclusively by registered recomputation units.
//!
//! `execute(n)` is a cold start: warm-start state is re-initialized and the
//! iteration loop runs from zero. `update(k)` resumes: the phase graph picks
//! up from its done markers and runs `k` further iterations. The two compose:
//! `execute(n); update(k)` produces the same marginals as `execute(n + k)` up
//! to floating-point order of operations.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::errors::RuntimeError;
use crate::engine::message::Message;
use crate::engine::observed::{ObservedShape, ObservedStore, ObservedValue};
use crate::engine::schedule::{Schedule, ScheduleStats};

/// Computes one tracked output's marginal from the model state.
pub type MarginalFn<S> = Box<dyn Fn(&S) -> Result<Message, RuntimeError>>;

/// A compiled inference program: state, schedule, inputs, and outputs.
pub struct InferenceProgram<S> {
    state: S,
    schedule: Schedule<S>,
    observed: ObservedStore,
    marginals: FxHashMap<Arc<str>, MarginalFn<S>>,
    progress: Option<Box<dyn FnMut(usize)>>,
}

impl<S> InferenceProgram<S> {
    pub fn new(state: S) -> Self {
        InferenceProgram {
            state,
            schedule: Schedule::new(),
            observed: ObservedStore::new(),
            marginals: FxHashMap::default(),
            progress: None,
        }
    }

    /// The phase graph, for unit registration at program-build time.
    pub fn schedule_mut(&mut self) -> &mut Schedule<S> {
        &mut self.schedule
    }

    /// Declares an observed input and its shape.
    pub fn declare_observed(
        &mut self,
        name: &str,
        shape: ObservedShape,
    ) -> Result<(), RuntimeError> {
        self.observed.declare(name, shape)
    }

    /// Registers a tracked output.
    pub fn register_marginal(
        &mut self,
        name: &str,
        f: impl Fn(&S) -> Result<Message, RuntimeError> + 'static,
    ) -> Result<(), RuntimeError> {
        if self.marginals.contains_key(name) {
            return Err(RuntimeError::Argument(format!(
                "marginal '{name}' is already registered"
            )));
        }
        self.marginals.insert(Arc::from(name), Box::new(f));
        Ok(())
    }

    /// Installs the per-iteration progress callback.
    pub fn set_progress_handler(&mut self, f: impl FnMut(usize) + 'static) {
        self.progress = Some(Box::new(f));
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn observed(&self) -> &ObservedStore {
        &self.observed
    }

    /// Stores an observed value and invalidates its dependents.
    ///
    /// A shape mismatch or unknown name fails without touching prior state.
    pub fn set_observed(&mut self, name: &str, value: ObservedValue) -> Result<(), RuntimeError> {
        self.observed.set(name, value)?;
        self.schedule.invalidate_input(name);
        Ok(())
    }

    /// Cold start: resets warm-start state and runs `iterations` iterations.
    pub fn execute(&mut self, iterations: usize) -> Result<(), RuntimeError> {
        self.request(iterations, true)
    }

    /// Resumes from the last completed iteration count and runs
    /// `additional_iterations` more.
    pub fn update(&mut self, additional_iterations: usize) -> Result<(), RuntimeError> {
        let done = self.schedule.iterations_done();
        let target = done.saturating_add(additional_iterations);
        if target < done {
            // A target behind the completed count cannot resume; start over.
            return self.execute(target);
        }
        self.request(target, false)
    }

    /// Equivalent to `execute(0)`.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        self.execute(0)
    }

    pub fn iterations_done(&self) -> usize {
        self.schedule.iterations_done()
    }

    /// The current marginal for a tracked output.
    pub fn marginal(&self, name: &str) -> Result<Message, RuntimeError> {
        let f = self
            .marginals
            .get(name)
            .ok_or_else(|| RuntimeError::Argument(format!("unknown marginal '{name}'")))?;
        f(&self.state)
    }

    /// Per-unit run counts since the last `reset_stats`.
    pub fn stats(&self) -> ScheduleStats {
        self.schedule.stats()
    }

    pub fn reset_stats(&mut self) {
        self.schedule.reset_stats();
    }

    fn request(&mut self, target: usize, initialise: bool) -> Result<(), RuntimeError> {
        let InferenceProgram {
            state,
            schedule,
            observed,
            progress,
            ..
        } = self;
        match progress {
            Some(handler) => schedule.request(state, observed, target, initialise, handler),
            None => schedule.request(state, observed, target, initialise, &mut |_| {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::message::Gaussian;

    // A toy program: the "posterior" is the observed scalar plus the number
    // of iterations run, which makes resumption arithmetic visible.
    struct Counter {
        base: f64,
        accumulated: f64,
    }

    fn counter_program() -> InferenceProgram<Counter> {
        let mut program = InferenceProgram::new(Counter {
            base: 0.0,
            accumulated: 0.0,
        });
        program.declare_observed("base", ObservedShape::Scalar).unwrap();
        program
            .schedule_mut()
            .register_init("load_base", &["base"], &[], true, |s, obs, _| {
                s.base = obs.real("base")?;
                s.accumulated = 0.0;
                Ok(())
            })
            .unwrap();
        program
            .schedule_mut()
            .register_iterative("accumulate", &["base"], &["load_base"], |s, _, span| {
                for _ in span {
                    s.accumulated += 1.0;
                }
                Ok(())
            })
            .unwrap();
        program
            .register_marginal("total", |s| {
                Ok(Message::Gaussian(Gaussian::from_mean_and_precision(
                    s.base + s.accumulated,
                    1.0,
                )))
            })
            .unwrap();
        program
    }

    fn total(program: &InferenceProgram<Counter>) -> f64 {
        program.marginal("total").unwrap().gaussian().unwrap().mean()
    }

    #[test]
    fn execute_then_update_matches_single_execute() {
        let mut a = counter_program();
        a.set_observed("base", ObservedValue::Real(10.0)).unwrap();
        a.execute(7).unwrap();

        let mut b = counter_program();
        b.set_observed("base", ObservedValue::Real(10.0)).unwrap();
        b.execute(4).unwrap();
        b.update(3).unwrap();

        assert_eq!(total(&a), total(&b));
        assert_eq!(b.iterations_done(), 7);
    }

    #[test]
    fn reset_then_update_matches_execute() {
        let mut program = counter_program();
        program.set_observed("base", ObservedValue::Real(2.0)).unwrap();
        program.execute(5).unwrap();
        program.reset().unwrap();
        program.update(5).unwrap();
        assert_eq!(total(&program), 7.0);
    }

    #[test]
    fn unknown_marginal_is_argument_error() {
        let program = counter_program();
        assert!(matches!(
            program.marginal("nope"),
            Err(RuntimeError::Argument(_))
        ));
    }

    #[test]
    fn progress_handler_sees_each_iteration_once() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let mut program = counter_program();
        program.set_progress_handler(move |iter| sink.borrow_mut().push(iter));
        program.set_observed("base", ObservedValue::Real(0.0)).unwrap();
        program.execute(2).unwrap();
        program.update(2).unwrap();
        assert_eq!(*events.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn update_after_new_observation_recomputes() {
        let mut program = counter_program();
        program.set_observed("base", ObservedValue::Real(1.0)).unwrap();
        program.execute(3).unwrap();
        assert_eq!(total(&program), 4.0);

        program.set_observed("base", ObservedValue::Real(100.0)).unwrap();
        program.update(0).unwrap();
        // The init unit re-ran and the iteration loop replayed to the done count.
        assert_eq!(total(&program), 103.0);
    }
}

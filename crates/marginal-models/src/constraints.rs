//! An observed deterministic relationship: `b = !a`.
//!
//! Both sides are observed. Recomputation checks the relationship and fails
//! with a constraint violation at the point the contradiction is detected;
//! the failing unit's done marker stays unadvanced, so correcting either
//! observation and re-executing recovers cleanly.

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::errors::RuntimeError;
use marginal_core::engine::message::{Bernoulli, Message};
use marginal_core::engine::observed::ObservedShape;

pub struct NegationState {
    pub b_marginal: Bernoulli,
}

/// Builds a program observing `a` and `b` with the constraint `b = !a`.
pub fn negation_program() -> Result<InferenceProgram<NegationState>, RuntimeError> {
    let mut program = InferenceProgram::new(NegationState {
        b_marginal: Bernoulli::uniform(),
    });
    program.declare_observed("a", ObservedShape::Scalar)?;
    program.declare_observed("b", ObservedShape::Scalar)?;

    program
        .schedule_mut()
        .register_init("apply_negation", &["a", "b"], &[], false, |s, obs, _| {
            let a = obs.boolean("a")?;
            let b = obs.boolean("b")?;
            if b == a {
                return Err(RuntimeError::ConstraintViolated(format!(
                    "b is observed {b} but is defined as the negation of a = {a}"
                )));
            }
            s.b_marginal = Bernoulli::point_mass(b);
            Ok(())
        })?;

    program.register_marginal("b", |s| Ok(Message::Bernoulli(s.b_marginal)))?;
    Ok(program)
}

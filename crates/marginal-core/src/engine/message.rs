//! Distribution-valued messages and their combination algebra.
//!
//! Every slot in a message store holds one value from this module. Each
//! family carries an explicit uniform sentinel (the multiplicative identity)
//! and, where the family supports it, a point-mass encoding. Messages are
//! combined with `product` (generalized multiplication of densities) and
//! `ratio` (generalized division), which is what the replicate/divide
//! combinator uses to remove one use-site's previous contribution from an
//! aggregate.
//!
//! ## Parameterization
//!
//! - `Gaussian`: natural parameters (mean×precision, precision). Precision
//!   `+inf` encodes a point mass, with the point stored in the other field.
//!   A ratio may legitimately produce negative precision: improper messages
//!   are valid intermediate values, only marginals must be proper.
//! - `Gamma`: (shape, rate). Uniform is (1, 0); a point mass is rate `+inf`
//!   with the point stored in `shape`.
//! - `Bernoulli`: log-odds. Uniform is 0; point masses are `±inf`.
//! - `Discrete`: a normalized probability vector.
//! - `Dirichlet`: concentration vector; uniform is all-ones.
//!
//! ## Point-mass division policy
//!
//! Dividing by a point mass is a numerical error unless the numerator is a
//! point mass at the same location, in which case the ratio is uniform.
//! Dividing a point mass by a finite message returns the point mass
//! unchanged. For `Discrete`, `0/0` is taken as 0 before renormalizing.

use serde::{Deserialize, Serialize};

use crate::engine::errors::RuntimeError;

/// Serde codec for parameters whose encoding includes `±inf` (the point-mass
/// sentinels). JSON has no non-finite numbers, so finite values serialize as
/// numbers and non-finite ones as the strings `"inf"` / `"-inf"`.
mod boundless {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Named(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if *value == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            Err(serde::ser::Error::custom("NaN message parameter"))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Named(name) => match name.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!(
                    "unknown float encoding '{other}'"
                ))),
            },
        }
    }
}

/// Tolerance used when comparing normalized discrete weights to the uniform
/// sentinel.
const UNIFORM_EPS: f64 = 1e-12;

/// A Gaussian message in natural parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    /// μ·τ for a finite message; the point location for a point mass.
    pub mean_times_precision: f64,
    /// Precision τ = 1/σ². Zero together with a zero first parameter is the
    /// uniform sentinel; `+inf` encodes a point mass.
    #[serde(with = "boundless")]
    pub precision: f64,
}

impl Gaussian {
    pub fn uniform() -> Self {
        Gaussian {
            mean_times_precision: 0.0,
            precision: 0.0,
        }
    }

    /// Infinite precision routes to the point-mass encoding, keeping the
    /// point in `mean_times_precision` rather than `mean * inf`.
    pub fn from_mean_and_precision(mean: f64, precision: f64) -> Self {
        if precision == f64::INFINITY {
            return Self::point_mass(mean);
        }
        Gaussian {
            mean_times_precision: mean * precision,
            precision,
        }
    }

    /// Zero variance is a point mass at `mean`.
    pub fn from_mean_and_variance(mean: f64, variance: f64) -> Self {
        if variance == 0.0 {
            return Self::point_mass(mean);
        }
        Self::from_mean_and_precision(mean, 1.0 / variance)
    }

    pub fn point_mass(point: f64) -> Self {
        Gaussian {
            mean_times_precision: point,
            precision: f64::INFINITY,
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.precision == 0.0 && self.mean_times_precision == 0.0
    }

    pub fn is_point_mass(&self) -> bool {
        self.precision.is_infinite()
    }

    /// Posterior mean. Zero for the uniform sentinel.
    pub fn mean(&self) -> f64 {
        if self.is_point_mass() {
            self.mean_times_precision
        } else if self.precision == 0.0 {
            0.0
        } else {
            self.mean_times_precision / self.precision
        }
    }

    pub fn variance(&self) -> f64 {
        if self.is_point_mass() {
            0.0
        } else if self.precision == 0.0 {
            f64::INFINITY
        } else {
            1.0 / self.precision
        }
    }

    pub fn product(&self, other: &Gaussian) -> Result<Gaussian, RuntimeError> {
        match (self.is_point_mass(), other.is_point_mass()) {
            (true, true) => {
                if self.mean_times_precision == other.mean_times_precision {
                    Ok(*self)
                } else {
                    Err(RuntimeError::ConstraintViolated(format!(
                        "product of Gaussian point masses at {} and {}",
                        self.mean_times_precision, other.mean_times_precision
                    )))
                }
            }
            (true, false) => Ok(*self),
            (false, true) => Ok(*other),
            (false, false) => Ok(Gaussian {
                mean_times_precision: self.mean_times_precision + other.mean_times_precision,
                precision: self.precision + other.precision,
            }),
        }
    }

    pub fn ratio(&self, other: &Gaussian) -> Result<Gaussian, RuntimeError> {
        if other.is_uniform() {
            return Ok(*self);
        }
        if other.is_point_mass() {
            return if self.is_point_mass()
                && self.mean_times_precision == other.mean_times_precision
            {
                Ok(Gaussian::uniform())
            } else {
                Err(RuntimeError::Numerical(
                    "division by a Gaussian point mass".into(),
                ))
            };
        }
        if self.is_point_mass() {
            return Ok(*self);
        }
        Ok(Gaussian {
            mean_times_precision: self.mean_times_precision - other.mean_times_precision,
            precision: self.precision - other.precision,
        })
    }

    /// Maximum absolute parameter difference, point-mass aware.
    pub fn max_diff(&self, other: &Gaussian) -> f64 {
        match (self.is_point_mass(), other.is_point_mass()) {
            (true, true) => (self.mean_times_precision - other.mean_times_precision).abs(),
            (true, false) | (false, true) => f64::INFINITY,
            (false, false) => (self.mean_times_precision - other.mean_times_precision)
                .abs()
                .max((self.precision - other.precision).abs()),
        }
    }
}

/// A Gamma message with shape/rate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gamma {
    /// Shape for a finite message; the point location for a point mass.
    pub shape: f64,
    /// Rate. Zero with shape 1 is the uniform sentinel; `+inf` encodes a
    /// point mass.
    #[serde(with = "boundless")]
    pub rate: f64,
}

impl Gamma {
    pub fn uniform() -> Self {
        Gamma {
            shape: 1.0,
            rate: 0.0,
        }
    }

    pub fn from_shape_and_rate(shape: f64, rate: f64) -> Self {
        Gamma { shape, rate }
    }

    pub fn point_mass(point: f64) -> Self {
        Gamma {
            shape: point,
            rate: f64::INFINITY,
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.shape == 1.0 && self.rate == 0.0
    }

    pub fn is_point_mass(&self) -> bool {
        self.rate.is_infinite()
    }

    /// Posterior mean shape/rate; the point itself for a point mass.
    pub fn mean(&self) -> f64 {
        if self.is_point_mass() {
            self.shape
        } else if self.rate == 0.0 {
            f64::INFINITY
        } else {
            self.shape / self.rate
        }
    }

    pub fn product(&self, other: &Gamma) -> Result<Gamma, RuntimeError> {
        match (self.is_point_mass(), other.is_point_mass()) {
            (true, true) => {
                if self.shape == other.shape {
                    Ok(*self)
                } else {
                    Err(RuntimeError::ConstraintViolated(format!(
                        "product of Gamma point masses at {} and {}",
                        self.shape, other.shape
                    )))
                }
            }
            (true, false) => Ok(*self),
            (false, true) => Ok(*other),
            (false, false) => Ok(Gamma {
                shape: self.shape + other.shape - 1.0,
                rate: self.rate + other.rate,
            }),
        }
    }

    pub fn ratio(&self, other: &Gamma) -> Result<Gamma, RuntimeError> {
        if other.is_uniform() {
            return Ok(*self);
        }
        if other.is_point_mass() {
            return if self.is_point_mass() && self.shape == other.shape {
                Ok(Gamma::uniform())
            } else {
                Err(RuntimeError::Numerical(
                    "division by a Gamma point mass".into(),
                ))
            };
        }
        if self.is_point_mass() {
            return Ok(*self);
        }
        Ok(Gamma {
            shape: self.shape - other.shape + 1.0,
            rate: self.rate - other.rate,
        })
    }

    pub fn max_diff(&self, other: &Gamma) -> f64 {
        match (self.is_point_mass(), other.is_point_mass()) {
            (true, true) => (self.shape - other.shape).abs(),
            (true, false) | (false, true) => f64::INFINITY,
            (false, false) => (self.shape - other.shape)
                .abs()
                .max((self.rate - other.rate).abs()),
        }
    }
}

/// A Bernoulli message stored as log-odds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bernoulli {
    /// log(p/(1-p)). Zero is uniform; `±inf` are the point masses.
    #[serde(with = "boundless")]
    pub log_odds: f64,
}

impl Bernoulli {
    pub fn uniform() -> Self {
        Bernoulli { log_odds: 0.0 }
    }

    pub fn from_prob_true(p: f64) -> Result<Self, RuntimeError> {
        if !(0.0..=1.0).contains(&p) || p.is_nan() {
            return Err(RuntimeError::Numerical(format!(
                "Bernoulli probability {p} outside [0, 1]"
            )));
        }
        Ok(Bernoulli {
            log_odds: (p / (1.0 - p)).ln(),
        })
    }

    pub fn point_mass(value: bool) -> Self {
        Bernoulli {
            log_odds: if value {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            },
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.log_odds == 0.0
    }

    pub fn is_point_mass(&self) -> bool {
        self.log_odds.is_infinite()
    }

    pub fn prob_true(&self) -> f64 {
        1.0 / (1.0 + (-self.log_odds).exp())
    }

    pub fn product(&self, other: &Bernoulli) -> Result<Bernoulli, RuntimeError> {
        if self.is_point_mass() && other.is_point_mass() && self.log_odds != other.log_odds {
            return Err(RuntimeError::ConstraintViolated(
                "product of contradictory Bernoulli point masses".into(),
            ));
        }
        if self.is_point_mass() {
            return Ok(*self);
        }
        if other.is_point_mass() {
            return Ok(*other);
        }
        Ok(Bernoulli {
            log_odds: self.log_odds + other.log_odds,
        })
    }

    pub fn ratio(&self, other: &Bernoulli) -> Result<Bernoulli, RuntimeError> {
        if other.is_uniform() {
            return Ok(*self);
        }
        if other.is_point_mass() {
            return if self.is_point_mass() && self.log_odds == other.log_odds {
                Ok(Bernoulli::uniform())
            } else {
                Err(RuntimeError::Numerical(
                    "division by a Bernoulli point mass".into(),
                ))
            };
        }
        if self.is_point_mass() {
            return Ok(*self);
        }
        Ok(Bernoulli {
            log_odds: self.log_odds - other.log_odds,
        })
    }

    pub fn max_diff(&self, other: &Bernoulli) -> f64 {
        if self.log_odds == other.log_odds {
            0.0
        } else {
            (self.log_odds - other.log_odds).abs()
        }
    }
}

/// A discrete message: a normalized distribution over `0..len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrete {
    probs: Vec<f64>,
}

impl Discrete {
    /// Builds a normalized discrete message from non-negative weights.
    pub fn new(weights: Vec<f64>) -> Result<Self, RuntimeError> {
        if weights.is_empty() {
            return Err(RuntimeError::Argument(
                "discrete message must have at least one outcome".into(),
            ));
        }
        let mut sum = 0.0;
        for &w in &weights {
            if !w.is_finite() || w < 0.0 {
                return Err(RuntimeError::Numerical(format!(
                    "discrete weight {w} is not a finite non-negative number"
                )));
            }
            sum += w;
        }
        if sum <= 0.0 {
            return Err(RuntimeError::Numerical(
                "discrete weights sum to zero".into(),
            ));
        }
        Ok(Discrete {
            probs: weights.into_iter().map(|w| w / sum).collect(),
        })
    }

    pub fn uniform(len: usize) -> Result<Self, RuntimeError> {
        Self::new(vec![1.0; len])
    }

    pub fn point_mass(len: usize, outcome: usize) -> Result<Self, RuntimeError> {
        if outcome >= len {
            return Err(RuntimeError::Argument(format!(
                "outcome {outcome} out of range for discrete of size {len}"
            )));
        }
        let mut weights = vec![0.0; len];
        weights[outcome] = 1.0;
        Self::new(weights)
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn is_uniform(&self) -> bool {
        let expected = 1.0 / self.probs.len() as f64;
        self.probs.iter().all(|&p| (p - expected).abs() < UNIFORM_EPS)
    }

    /// Index of the highest-probability outcome (first on ties).
    pub fn mode(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = i;
            }
        }
        best
    }

    fn check_len(&self, other: &Discrete) -> Result<(), RuntimeError> {
        if self.probs.len() != other.probs.len() {
            return Err(RuntimeError::Internal(format!(
                "discrete length mismatch: {} vs {}",
                self.probs.len(),
                other.probs.len()
            )));
        }
        Ok(())
    }

    pub fn product(&self, other: &Discrete) -> Result<Discrete, RuntimeError> {
        self.check_len(other)?;
        let weights: Vec<f64> = self
            .probs
            .iter()
            .zip(&other.probs)
            .map(|(a, b)| a * b)
            .collect();
        if weights.iter().sum::<f64>() <= 0.0 {
            // The observations jointly rule out every outcome.
            return Err(RuntimeError::ConstraintViolated(
                "discrete product has no remaining support".into(),
            ));
        }
        Discrete::new(weights)
    }

    pub fn ratio(&self, other: &Discrete) -> Result<Discrete, RuntimeError> {
        self.check_len(other)?;
        let mut weights = Vec::with_capacity(self.probs.len());
        for (&num, &den) in self.probs.iter().zip(&other.probs) {
            if den == 0.0 {
                if num == 0.0 {
                    weights.push(0.0);
                } else {
                    return Err(RuntimeError::Numerical(
                        "division by a zero-probability discrete outcome".into(),
                    ));
                }
            } else {
                weights.push(num / den);
            }
        }
        Discrete::new(weights)
    }

    pub fn max_diff(&self, other: &Discrete) -> f64 {
        if self.probs.len() != other.probs.len() {
            return f64::INFINITY;
        }
        self.probs
            .iter()
            .zip(&other.probs)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

/// A Dirichlet message: a concentration vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dirichlet {
    alpha: Vec<f64>,
}

impl Dirichlet {
    pub fn new(alpha: Vec<f64>) -> Result<Self, RuntimeError> {
        if alpha.is_empty() {
            return Err(RuntimeError::Argument(
                "Dirichlet message must have at least one component".into(),
            ));
        }
        for &a in &alpha {
            if !a.is_finite() {
                return Err(RuntimeError::Numerical(format!(
                    "Dirichlet concentration {a} is not finite"
                )));
            }
        }
        Ok(Dirichlet { alpha })
    }

    pub fn uniform(len: usize) -> Result<Self, RuntimeError> {
        Self::new(vec![1.0; len])
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn is_uniform(&self) -> bool {
        self.alpha.iter().all(|&a| (a - 1.0).abs() < UNIFORM_EPS)
    }

    /// Mean vector α_k / Σα.
    pub fn mean(&self) -> Vec<f64> {
        let total: f64 = self.alpha.iter().sum();
        self.alpha.iter().map(|&a| a / total).collect()
    }

    fn check_len(&self, other: &Dirichlet) -> Result<(), RuntimeError> {
        if self.alpha.len() != other.alpha.len() {
            return Err(RuntimeError::Internal(format!(
                "Dirichlet length mismatch: {} vs {}",
                self.alpha.len(),
                other.alpha.len()
            )));
        }
        Ok(())
    }

    pub fn product(&self, other: &Dirichlet) -> Result<Dirichlet, RuntimeError> {
        self.check_len(other)?;
        Dirichlet::new(
            self.alpha
                .iter()
                .zip(&other.alpha)
                .map(|(a, b)| a + b - 1.0)
                .collect(),
        )
    }

    pub fn ratio(&self, other: &Dirichlet) -> Result<Dirichlet, RuntimeError> {
        self.check_len(other)?;
        Dirichlet::new(
            self.alpha
                .iter()
                .zip(&other.alpha)
                .map(|(a, b)| a - b + 1.0)
                .collect(),
        )
    }

    pub fn max_diff(&self, other: &Dirichlet) -> f64 {
        if self.alpha.len() != other.alpha.len() {
            return f64::INFINITY;
        }
        self.alpha
            .iter()
            .zip(&other.alpha)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

/// A distribution-valued message, tagged by family.
///
/// Product and ratio require matching families (and matching lengths for the
/// vector families); a mismatch is an internal error because the compiler
/// fixes each slot's family at schedule-generation time. `max_diff` across
/// families is `+inf`, so convergence checks treat a family change as
/// maximally different.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Message {
    Gaussian(Gaussian),
    Gamma(Gamma),
    Bernoulli(Bernoulli),
    Discrete(Discrete),
    Dirichlet(Dirichlet),
}

impl Message {
    pub fn family(&self) -> &'static str {
        match self {
            Message::Gaussian(_) => "gaussian",
            Message::Gamma(_) => "gamma",
            Message::Bernoulli(_) => "bernoulli",
            Message::Discrete(_) => "discrete",
            Message::Dirichlet(_) => "dirichlet",
        }
    }

    /// The uniform sentinel of the same family (and length, where relevant).
    pub fn uniform_like(&self) -> Message {
        match self {
            Message::Gaussian(_) => Message::Gaussian(Gaussian::uniform()),
            Message::Gamma(_) => Message::Gamma(Gamma::uniform()),
            Message::Bernoulli(_) => Message::Bernoulli(Bernoulli::uniform()),
            Message::Discrete(d) => Message::Discrete(Discrete {
                probs: vec![1.0 / d.len() as f64; d.len()],
            }),
            Message::Dirichlet(d) => Message::Dirichlet(Dirichlet {
                alpha: vec![1.0; d.len()],
            }),
        }
    }

    pub fn is_uniform(&self) -> bool {
        match self {
            Message::Gaussian(g) => g.is_uniform(),
            Message::Gamma(g) => g.is_uniform(),
            Message::Bernoulli(b) => b.is_uniform(),
            Message::Discrete(d) => d.is_uniform(),
            Message::Dirichlet(d) => d.is_uniform(),
        }
    }

    fn family_mismatch(&self, other: &Message) -> RuntimeError {
        RuntimeError::Internal(format!(
            "message family mismatch: {} vs {}",
            self.family(),
            other.family()
        ))
    }

    pub fn product(&self, other: &Message) -> Result<Message, RuntimeError> {
        match (self, other) {
            (Message::Gaussian(a), Message::Gaussian(b)) => a.product(b).map(Message::Gaussian),
            (Message::Gamma(a), Message::Gamma(b)) => a.product(b).map(Message::Gamma),
            (Message::Bernoulli(a), Message::Bernoulli(b)) => a.product(b).map(Message::Bernoulli),
            (Message::Discrete(a), Message::Discrete(b)) => a.product(b).map(Message::Discrete),
            (Message::Dirichlet(a), Message::Dirichlet(b)) => a.product(b).map(Message::Dirichlet),
            _ => Err(self.family_mismatch(other)),
        }
    }

    pub fn ratio(&self, other: &Message) -> Result<Message, RuntimeError> {
        match (self, other) {
            (Message::Gaussian(a), Message::Gaussian(b)) => a.ratio(b).map(Message::Gaussian),
            (Message::Gamma(a), Message::Gamma(b)) => a.ratio(b).map(Message::Gamma),
            (Message::Bernoulli(a), Message::Bernoulli(b)) => a.ratio(b).map(Message::Bernoulli),
            (Message::Discrete(a), Message::Discrete(b)) => a.ratio(b).map(Message::Discrete),
            (Message::Dirichlet(a), Message::Dirichlet(b)) => a.ratio(b).map(Message::Dirichlet),
            _ => Err(self.family_mismatch(other)),
        }
    }

    pub fn max_diff(&self, other: &Message) -> f64 {
        match (self, other) {
            (Message::Gaussian(a), Message::Gaussian(b)) => a.max_diff(b),
            (Message::Gamma(a), Message::Gamma(b)) => a.max_diff(b),
            (Message::Bernoulli(a), Message::Bernoulli(b)) => a.max_diff(b),
            (Message::Discrete(a), Message::Discrete(b)) => a.max_diff(b),
            (Message::Dirichlet(a), Message::Dirichlet(b)) => a.max_diff(b),
            _ => f64::INFINITY,
        }
    }

    pub fn gaussian(&self) -> Result<Gaussian, RuntimeError> {
        match self {
            Message::Gaussian(g) => Ok(*g),
            _ => Err(RuntimeError::Internal(format!(
                "expected a gaussian message, got {}",
                self.family()
            ))),
        }
    }

    pub fn gamma(&self) -> Result<Gamma, RuntimeError> {
        match self {
            Message::Gamma(g) => Ok(*g),
            _ => Err(RuntimeError::Internal(format!(
                "expected a gamma message, got {}",
                self.family()
            ))),
        }
    }

    pub fn bernoulli(&self) -> Result<Bernoulli, RuntimeError> {
        match self {
            Message::Bernoulli(b) => Ok(*b),
            _ => Err(RuntimeError::Internal(format!(
                "expected a bernoulli message, got {}",
                self.family()
            ))),
        }
    }

    pub fn discrete(&self) -> Result<&Discrete, RuntimeError> {
        match self {
            Message::Discrete(d) => Ok(d),
            _ => Err(RuntimeError::Internal(format!(
                "expected a discrete message, got {}",
                self.family()
            ))),
        }
    }

    pub fn dirichlet(&self) -> Result<&Dirichlet, RuntimeError> {
        match self {
            Message::Dirichlet(d) => Ok(d),
            _ => Err(RuntimeError::Internal(format!(
                "expected a dirichlet message, got {}",
                self.family()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_product_then_ratio_is_identity() {
        let a = Gaussian::from_mean_and_precision(1.5, 2.0);
        let b = Gaussian::from_mean_and_precision(-0.5, 0.7);
        let prod = a.product(&b).unwrap();
        let back = prod.ratio(&b).unwrap();
        assert!(back.max_diff(&a) < 1e-12);
    }

    #[test]
    fn gaussian_ratio_may_be_improper() {
        let weak = Gaussian::from_mean_and_precision(0.0, 0.5);
        let strong = Gaussian::from_mean_and_precision(0.0, 2.0);
        let ratio = weak.ratio(&strong).unwrap();
        assert!(ratio.precision < 0.0);
    }

    #[test]
    fn gaussian_division_by_point_mass_is_numerical_error() {
        let finite = Gaussian::from_mean_and_precision(1.0, 1.0);
        let point = Gaussian::point_mass(3.0);
        match finite.ratio(&point) {
            Err(RuntimeError::Numerical(_)) => {}
            other => panic!("expected numerical error, got {other:?}"),
        }
    }

    #[test]
    fn gaussian_point_mass_divided_by_itself_is_uniform() {
        let point = Gaussian::point_mass(3.0);
        let ratio = point.ratio(&point).unwrap();
        assert!(ratio.is_uniform());
    }

    #[test]
    fn gaussian_uniform_is_product_identity() {
        let a = Gaussian::from_mean_and_precision(2.0, 4.0);
        let prod = a.product(&Gaussian::uniform()).unwrap();
        assert!(prod.max_diff(&a) < 1e-15);
    }

    #[test]
    fn gamma_product_accumulates_pseudo_observations() {
        let prior = Gamma::from_shape_and_rate(2.0, 1.0);
        let lik = Gamma::from_shape_and_rate(1.0 + 5.0, 3.0);
        let post = prior.product(&lik).unwrap();
        assert!((post.shape - 7.0).abs() < 1e-12);
        assert!((post.rate - 4.0).abs() < 1e-12);
    }

    #[test]
    fn bernoulli_contradictory_point_masses_violate_constraint() {
        let t = Bernoulli::point_mass(true);
        let f = Bernoulli::point_mass(false);
        match t.product(&f) {
            Err(RuntimeError::ConstraintViolated(_)) => {}
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn discrete_product_with_no_support_violates_constraint() {
        let a = Discrete::point_mass(3, 0).unwrap();
        let b = Discrete::point_mass(3, 2).unwrap();
        match a.product(&b) {
            Err(RuntimeError::ConstraintViolated(_)) => {}
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn discrete_ratio_takes_zero_over_zero_as_zero() {
        let num = Discrete::new(vec![0.0, 1.0, 1.0]).unwrap();
        let den = Discrete::new(vec![0.0, 1.0, 3.0]).unwrap();
        let ratio = num.ratio(&den).unwrap();
        assert_eq!(ratio.probs()[0], 0.0);
        assert!(ratio.probs()[1] > ratio.probs()[2]);
    }

    #[test]
    fn discrete_ratio_by_dead_outcome_with_live_numerator_fails() {
        let num = Discrete::new(vec![1.0, 1.0]).unwrap();
        let den = Discrete::point_mass(2, 1).unwrap();
        match num.ratio(&den) {
            Err(RuntimeError::Numerical(_)) => {}
            other => panic!("expected numerical error, got {other:?}"),
        }
    }

    #[test]
    fn dirichlet_product_then_ratio_is_identity() {
        let a = Dirichlet::new(vec![2.0, 3.0, 0.5]).unwrap();
        let b = Dirichlet::new(vec![1.5, 1.0, 4.0]).unwrap();
        let back = a.product(&b).unwrap().ratio(&b).unwrap();
        assert!(back.max_diff(&a) < 1e-12);
    }

    #[test]
    fn message_family_mismatch_is_internal_error() {
        let g = Message::Gaussian(Gaussian::uniform());
        let d = Message::Discrete(Discrete::uniform(2).unwrap());
        match g.product(&d) {
            Err(RuntimeError::Internal(_)) => {}
            other => panic!("expected internal error, got {other:?}"),
        }
        assert_eq!(g.max_diff(&d), f64::INFINITY);
    }

    #[test]
    fn uniform_like_matches_family_and_length() {
        let d = Message::Discrete(Discrete::new(vec![0.1, 0.9]).unwrap());
        let u = d.uniform_like();
        assert!(u.is_uniform());
        assert_eq!(u.discrete().unwrap().len(), 2);
    }

    #[test]
    fn message_round_trips_through_json() {
        let original = Message::Gamma(Gamma::from_shape_and_rate(2.5, 0.75));
        let text = serde_json::to_string(&original).unwrap();
        let back: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn point_mass_messages_round_trip_through_json() {
        // JSON has no non-finite numbers, so the infinite sentinels need the
        // string encoding to survive.
        let point_masses = [
            Message::Gaussian(Gaussian::point_mass(1.0)),
            Message::Gamma(Gamma::point_mass(2.0)),
            Message::Bernoulli(Bernoulli::point_mass(true)),
            Message::Bernoulli(Bernoulli::point_mass(false)),
        ];
        for original in point_masses {
            let text = serde_json::to_string(&original).unwrap();
            let back: Message = serde_json::from_str(&text).unwrap();
            assert_eq!(back, original, "encoded as {text}");
        }
    }

    #[test]
    fn unknown_float_encoding_is_rejected() {
        let text = r#"{"family":"gaussian","mean_times_precision":0.0,"precision":"huge"}"#;
        assert!(serde_json::from_str::<Message>(text).is_err());
    }

    #[test]
    fn zero_variance_constructs_a_point_mass() {
        let g = Gaussian::from_mean_and_variance(3.5, 0.0);
        assert!(g.is_point_mass());
        assert_eq!(g.mean(), 3.5);

        // mean == 0.0 must not turn the stored point into NaN.
        let at_zero = Gaussian::from_mean_and_variance(0.0, 0.0);
        assert!(at_zero.is_point_mass());
        assert_eq!(at_zero.mean(), 0.0);
    }

    #[test]
    fn infinite_precision_constructs_a_point_mass() {
        let g = Gaussian::from_mean_and_precision(-2.0, f64::INFINITY);
        assert!(g.is_point_mass());
        assert_eq!(g.mean_times_precision, -2.0);
    }
}

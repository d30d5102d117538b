//! Typed, shape-checked storage for observed inputs.
//!
//! Each input is declared once with a shape (scalar, flat array with a fixed
//! length, or per-block arrays matching a partition). Setting a value checks
//! the shape first: a mismatched value is rejected and the previously stored
//! value stays untouched. Every successful set strictly increases the input's
//! version counter, which is what the phase graph keys invalidation on.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::errors::RuntimeError;

/// Declared shape of one observed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedShape {
    Scalar,
    Array { len: usize },
    /// One array per block; the declared sizes come from a `Partition`.
    Partitioned { sizes: Vec<usize> },
}

impl ObservedShape {
    fn describe(&self) -> String {
        match self {
            ObservedShape::Scalar => "a scalar".into(),
            ObservedShape::Array { len } => format!("an array of length {len}"),
            ObservedShape::Partitioned { sizes } => format!("blocks of sizes {sizes:?}"),
        }
    }
}

/// One observed value.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Reals(Vec<f64>),
    BoolBlocks(Vec<Vec<bool>>),
    IntBlocks(Vec<Vec<i64>>),
    RealBlocks(Vec<Vec<f64>>),
}

impl ObservedValue {
    fn describe(&self) -> String {
        match self {
            ObservedValue::Bool(_) | ObservedValue::Int(_) | ObservedValue::Real(_) => {
                "a scalar".into()
            }
            ObservedValue::Bools(v) => format!("an array of length {}", v.len()),
            ObservedValue::Ints(v) => format!("an array of length {}", v.len()),
            ObservedValue::Reals(v) => format!("an array of length {}", v.len()),
            ObservedValue::BoolBlocks(v) => {
                format!("blocks of sizes {:?}", block_sizes(v))
            }
            ObservedValue::IntBlocks(v) => {
                format!("blocks of sizes {:?}", block_sizes(v))
            }
            ObservedValue::RealBlocks(v) => {
                format!("blocks of sizes {:?}", block_sizes(v))
            }
        }
    }

    fn matches(&self, shape: &ObservedShape) -> bool {
        match (shape, self) {
            (
                ObservedShape::Scalar,
                ObservedValue::Bool(_) | ObservedValue::Int(_) | ObservedValue::Real(_),
            ) => true,
            (ObservedShape::Array { len }, ObservedValue::Bools(v)) => v.len() == *len,
            (ObservedShape::Array { len }, ObservedValue::Ints(v)) => v.len() == *len,
            (ObservedShape::Array { len }, ObservedValue::Reals(v)) => v.len() == *len,
            (ObservedShape::Partitioned { sizes }, ObservedValue::BoolBlocks(v)) => {
                block_sizes(v) == *sizes
            }
            (ObservedShape::Partitioned { sizes }, ObservedValue::IntBlocks(v)) => {
                block_sizes(v) == *sizes
            }
            (ObservedShape::Partitioned { sizes }, ObservedValue::RealBlocks(v)) => {
                block_sizes(v) == *sizes
            }
            _ => false,
        }
    }
}

fn block_sizes<T>(blocks: &[Vec<T>]) -> Vec<usize> {
    blocks.iter().map(|b| b.len()).collect()
}

#[derive(Debug)]
struct Slot {
    shape: ObservedShape,
    value: Option<ObservedValue>,
    version: u64,
}

/// The table of declared observed inputs.
#[derive(Debug, Default)]
pub struct ObservedStore {
    slots: FxHashMap<Arc<str>, Slot>,
}

impl ObservedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an input. Redeclaring a name is an argument error.
    pub fn declare(&mut self, name: &str, shape: ObservedShape) -> Result<(), RuntimeError> {
        if self.slots.contains_key(name) {
            return Err(RuntimeError::Argument(format!(
                "observed input '{name}' is already declared"
            )));
        }
        self.slots.insert(
            Arc::from(name),
            Slot {
                shape,
                value: None,
                version: 0,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Stores a value, shape-checking first. On error the prior value and
    /// version are left unmodified.
    pub fn set(&mut self, name: &str, value: ObservedValue) -> Result<(), RuntimeError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| RuntimeError::Argument(format!("unknown observed input '{name}'")))?;
        if !value.matches(&slot.shape) {
            return Err(RuntimeError::ShapeMismatch {
                name: name.into(),
                expected: slot.shape.describe(),
                actual: value.describe(),
            });
        }
        slot.value = Some(value);
        slot.version += 1;
        Ok(())
    }

    /// The version counter for `name`: 0 until first observed, then strictly
    /// increasing.
    pub fn version(&self, name: &str) -> Result<u64, RuntimeError> {
        self.slots
            .get(name)
            .map(|s| s.version)
            .ok_or_else(|| RuntimeError::Argument(format!("unknown observed input '{name}'")))
    }

    fn value(&self, name: &str) -> Result<&ObservedValue, RuntimeError> {
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| RuntimeError::Argument(format!("unknown observed input '{name}'")))?;
        slot.value
            .as_ref()
            .ok_or_else(|| RuntimeError::Execution(format!("input '{name}' has not been observed")))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, RuntimeError> {
        match self.value(name)? {
            ObservedValue::Bool(b) => Ok(*b),
            other => Err(type_error(name, "a boolean scalar", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, RuntimeError> {
        match self.value(name)? {
            ObservedValue::Int(i) => Ok(*i),
            other => Err(type_error(name, "an integer scalar", other)),
        }
    }

    pub fn real(&self, name: &str) -> Result<f64, RuntimeError> {
        match self.value(name)? {
            ObservedValue::Real(r) => Ok(*r),
            other => Err(type_error(name, "a real scalar", other)),
        }
    }

    pub fn booleans(&self, name: &str) -> Result<&[bool], RuntimeError> {
        match self.value(name)? {
            ObservedValue::Bools(v) => Ok(v),
            other => Err(type_error(name, "a boolean array", other)),
        }
    }

    pub fn ints(&self, name: &str) -> Result<&[i64], RuntimeError> {
        match self.value(name)? {
            ObservedValue::Ints(v) => Ok(v),
            other => Err(type_error(name, "an integer array", other)),
        }
    }

    pub fn reals(&self, name: &str) -> Result<&[f64], RuntimeError> {
        match self.value(name)? {
            ObservedValue::Reals(v) => Ok(v),
            other => Err(type_error(name, "a real array", other)),
        }
    }

    pub fn bool_block(&self, name: &str, block: usize) -> Result<&[bool], RuntimeError> {
        match self.value(name)? {
            ObservedValue::BoolBlocks(v) => block_of(name, v, block),
            other => Err(type_error(name, "partitioned boolean blocks", other)),
        }
    }

    pub fn int_block(&self, name: &str, block: usize) -> Result<&[i64], RuntimeError> {
        match self.value(name)? {
            ObservedValue::IntBlocks(v) => block_of(name, v, block),
            other => Err(type_error(name, "partitioned integer blocks", other)),
        }
    }

    pub fn real_block(&self, name: &str, block: usize) -> Result<&[f64], RuntimeError> {
        match self.value(name)? {
            ObservedValue::RealBlocks(v) => block_of(name, v, block),
            other => Err(type_error(name, "partitioned real blocks", other)),
        }
    }
}

fn type_error(name: &str, expected: &str, actual: &ObservedValue) -> RuntimeError {
    RuntimeError::Execution(format!(
        "input '{name}' read as {expected} but holds {}",
        actual.describe()
    ))
}

fn block_of<'a, T>(name: &str, blocks: &'a [Vec<T>], block: usize) -> Result<&'a [T], RuntimeError> {
    blocks.get(block).map(|b| b.as_slice()).ok_or_else(|| {
        RuntimeError::Argument(format!(
            "block {block} out of range for input '{name}' with {} blocks",
            blocks.len()
        ))
    })
}

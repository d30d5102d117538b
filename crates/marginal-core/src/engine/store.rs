//! Message stores: typed, mutable slots addressed by index.
//!
//! A store's length is fixed at creation. Writers replace whole messages, so
//! readers never observe a partially written value.

use crate::engine::errors::RuntimeError;
use crate::engine::message::Message;

/// A fixed-length array of messages.
pub trait MessageStore {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the message at `index`. Out-of-range indices are internal
    /// errors: the compiler fixes every access path at generation time.
    fn get(&self, index: usize) -> Result<Message, RuntimeError>;

    /// Replaces the message at `index`.
    fn set(&mut self, index: usize, message: Message) -> Result<(), RuntimeError>;
}

fn bounds_error(index: usize, len: usize) -> RuntimeError {
    RuntimeError::Internal(format!(
        "index {index} out of bounds for message array of length {len}"
    ))
}

/// An in-memory message array.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryArray {
    items: Vec<Message>,
}

impl MemoryArray {
    /// Creates an array of `len` slots, each initialized by `init`.
    pub fn new(len: usize, init: impl Fn(usize) -> Message) -> Self {
        MemoryArray {
            items: (0..len).map(init).collect(),
        }
    }

    /// Creates an array with every slot holding a copy of `message`.
    pub fn filled(len: usize, message: Message) -> Self {
        MemoryArray {
            items: vec![message; len],
        }
    }
}

impl MessageStore for MemoryArray {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<Message, RuntimeError> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| bounds_error(index, self.items.len()))
    }

    fn set(&mut self, index: usize, message: Message) -> Result<(), RuntimeError> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = message;
                Ok(())
            }
            None => Err(bounds_error(index, len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::message::Gaussian;

    #[test]
    fn memory_array_round_trips() {
        let mut array = MemoryArray::new(4, |_| Message::Gaussian(Gaussian::uniform()));
        let value = Message::Gaussian(Gaussian::from_mean_and_precision(2.0, 3.0));
        array.set(2, value.clone()).unwrap();
        assert_eq!(array.get(2).unwrap(), value);
        assert!(array.get(0).unwrap().is_uniform());
    }

    #[test]
    fn memory_array_rejects_out_of_range() {
        let mut array = MemoryArray::new(2, |_| Message::Gaussian(Gaussian::uniform()));
        assert!(matches!(array.get(2), Err(RuntimeError::Internal(_))));
        let value = Message::Gaussian(Gaussian::uniform());
        assert!(matches!(array.set(5, value), Err(RuntimeError::Internal(_))));
    }
}

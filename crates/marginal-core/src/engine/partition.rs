//! Block partitioning of a logical index range.
//!
//! A partitioned range is covered by contiguous blocks, each independently
//! sized. Quantities indexed by the range are split into one array per block,
//! and recomputation bodies run once per block over that block's local
//! indices. Blocks are always visited in partition order, which is the
//! ordering guarantee the replicate/divide sweep relies on.

use crate::engine::errors::RuntimeError;

/// One contiguous sub-range of a partitioned range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Position of the block within the partition.
    pub index: usize,
    /// First global index covered by this block.
    pub start: usize,
    /// Number of elements in this block.
    pub len: usize,
}

/// A cover of `0..total` by contiguous, non-empty blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    blocks: Vec<Block>,
    total: usize,
}

impl Partition {
    /// Splits `total` elements into `block_count` blocks of near-equal size,
    /// with any remainder spread over the leading blocks.
    pub fn even(total: usize, block_count: usize) -> Result<Self, RuntimeError> {
        if block_count == 0 {
            return Err(RuntimeError::Argument(
                "partition must have at least one block".into(),
            ));
        }
        if block_count > total {
            return Err(RuntimeError::Argument(format!(
                "cannot split {total} elements into {block_count} non-empty blocks"
            )));
        }
        let base = total / block_count;
        let remainder = total % block_count;
        let sizes: Vec<usize> = (0..block_count)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect();
        Self::from_sizes(&sizes)
    }

    /// Builds a partition from explicit block sizes (possibly data-dependent).
    pub fn from_sizes(sizes: &[usize]) -> Result<Self, RuntimeError> {
        if sizes.is_empty() {
            return Err(RuntimeError::Argument(
                "partition must have at least one block".into(),
            ));
        }
        let mut blocks = Vec::with_capacity(sizes.len());
        let mut start = 0;
        for (index, &len) in sizes.iter().enumerate() {
            if len == 0 {
                return Err(RuntimeError::Argument(format!(
                    "block {index} has zero size"
                )));
            }
            blocks.push(Block { index, start, len });
            start += len;
        }
        Ok(Partition {
            blocks,
            total: start,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Result<&Block, RuntimeError> {
        self.blocks.get(index).ok_or_else(|| {
            RuntimeError::Argument(format!(
                "block {index} out of range for partition of {} blocks",
                self.blocks.len()
            ))
        })
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.len).collect()
    }

    /// Runs `f` once per block, sequentially, in partition order.
    pub fn for_each_block(
        &self,
        mut f: impl FnMut(&Block) -> Result<(), RuntimeError>,
    ) -> Result<(), RuntimeError> {
        for block in &self.blocks {
            f(block)?;
        }
        Ok(())
    }

    /// Borrows the slice of `data` covered by `block`, checking that `data`
    /// spans the whole partitioned range.
    pub fn slice<'a, T>(&self, block: &Block, data: &'a [T]) -> Result<&'a [T], RuntimeError> {
        if data.len() != self.total {
            return Err(RuntimeError::ShapeMismatch {
                name: "partitioned data".into(),
                expected: format!("length {}", self.total),
                actual: format!("length {}", data.len()),
            });
        }
        Ok(&data[block.start..block.start + block.len])
    }
}

/// A callback that materializes one block's observations on demand.
///
/// This is the out-of-core mode: the full range never has to be resident,
/// only the block currently being recomputed.
pub trait BlockSource<T> {
    fn load_block(&mut self, block: &Block) -> Result<Vec<T>, RuntimeError>;
}

impl<T, F> BlockSource<T> for F
where
    F: FnMut(&Block) -> Result<Vec<T>, RuntimeError>,
{
    fn load_block(&mut self, block: &Block) -> Result<Vec<T>, RuntimeError> {
        self(block)
    }
}

/// Runs `f` once per block over data loaded on demand from `source`.
///
/// The loaded slice is shape-checked against the block length before the body
/// runs, so a misbehaving source surfaces as a shape error rather than a
/// silently truncated sweep.
pub fn for_each_block_from<T>(
    partition: &Partition,
    source: &mut dyn BlockSource<T>,
    mut f: impl FnMut(&Block, &[T]) -> Result<(), RuntimeError>,
) -> Result<(), RuntimeError> {
    for block in partition.blocks() {
        let data = source.load_block(block)?;
        if data.len() != block.len {
            return Err(RuntimeError::ShapeMismatch {
                name: format!("block {}", block.index),
                expected: format!("length {}", block.len),
                actual: format!("length {}", data.len()),
            });
        }
        f(block, &data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_partition_spreads_remainder_forward() {
        let partition = Partition::even(10, 3).unwrap();
        assert_eq!(partition.sizes(), vec![4, 3, 3]);
        assert_eq!(partition.total(), 10);
        assert_eq!(partition.block(1).unwrap().start, 4);
    }

    #[test]
    fn from_sizes_rejects_zero_blocks() {
        assert!(matches!(
            Partition::from_sizes(&[]),
            Err(RuntimeError::Argument(_))
        ));
        assert!(matches!(
            Partition::from_sizes(&[2, 0, 1]),
            Err(RuntimeError::Argument(_))
        ));
    }

    #[test]
    fn even_rejects_more_blocks_than_elements() {
        assert!(matches!(
            Partition::even(2, 3),
            Err(RuntimeError::Argument(_))
        ));
    }

    #[test]
    fn blocks_cover_the_range_in_order() {
        let partition = Partition::from_sizes(&[2, 5, 1]).unwrap();
        let mut visited = Vec::new();
        partition
            .for_each_block(|b| {
                visited.push((b.start, b.len));
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, vec![(0, 2), (2, 5), (7, 1)]);
    }

    #[test]
    fn slice_checks_total_length() {
        let partition = Partition::even(4, 2).unwrap();
        let data = [1.0, 2.0, 3.0, 4.0];
        let block = *partition.block(1).unwrap();
        assert_eq!(partition.slice(&block, &data).unwrap(), &[3.0, 4.0]);
        assert!(matches!(
            partition.slice(&block, &data[..3]),
            Err(RuntimeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn on_demand_loading_shape_checks_each_block() {
        let partition = Partition::even(6, 3).unwrap();
        let mut loads = 0;
        let mut source = |block: &Block| -> Result<Vec<f64>, RuntimeError> {
            loads += 1;
            Ok(vec![block.index as f64; block.len])
        };
        let mut seen = Vec::new();
        for_each_block_from(&partition, &mut source, |block, data| {
            seen.push((block.index, data.to_vec()));
            Ok(())
        })
        .unwrap();
        assert_eq!(loads, 3);
        assert_eq!(seen[2].1, vec![2.0, 2.0]);

        let mut short_source = |_: &Block| -> Result<Vec<f64>, RuntimeError> { Ok(vec![0.0]) };
        let result = for_each_block_from(&partition, &mut short_source, |_, _| Ok(()));
        assert!(matches!(result, Err(RuntimeError::ShapeMismatch { .. })));
    }
}

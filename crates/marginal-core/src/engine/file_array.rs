//! File-backed message arrays.
//!
//! A `FileArray` persists each element as one JSON record under a
//! caller-given folder, so arrays indexed by a large range never have to fit
//! in memory. Every successful record access bumps a process-wide read or
//! write counter; I/O-volume regression tests assert exact counts for
//! specific programs. I/O failures propagate to the caller of the triggering
//! operation with no internal retry; silently retried disk errors can mask
//! data loss.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::errors::RuntimeError;
use crate::engine::message::Message;
use crate::engine::store::MessageStore;

static RECORD_READS: AtomicU64 = AtomicU64::new(0);
static RECORD_WRITES: AtomicU64 = AtomicU64::new(0);

/// Process-wide counters of file-array record accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoStats {
    pub reads: u64,
    pub writes: u64,
}

/// Snapshot of the process-wide file-array counters.
pub fn io_stats() -> IoStats {
    IoStats {
        reads: RECORD_READS.load(Ordering::Relaxed),
        writes: RECORD_WRITES.load(Ordering::Relaxed),
    }
}

/// Resets the process-wide file-array counters to zero.
pub fn reset_io_stats() {
    RECORD_READS.store(0, Ordering::Relaxed);
    RECORD_WRITES.store(0, Ordering::Relaxed);
}

/// A message array persisting one record per index under its own folder.
///
/// The array owns the folder for its lifetime and removes it on drop.
#[derive(Debug)]
pub struct FileArray {
    dir: PathBuf,
    len: usize,
}

impl FileArray {
    /// Creates the backing folder and writes an initial record for every
    /// index. Initial records count as writes.
    pub fn create(
        dir: impl AsRef<Path>,
        len: usize,
        init: impl Fn(usize) -> Message,
    ) -> Result<Self, RuntimeError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let array = FileArray { dir, len };
        for index in 0..len {
            array.write_record(index, &init(index))?;
        }
        Ok(array)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{index:08}.json"))
    }

    fn write_record(&self, index: usize, message: &Message) -> Result<(), RuntimeError> {
        let text = serde_json::to_string(message)
            .map_err(|e| RuntimeError::Storage(format!("record {index}: {e}")))?;
        fs::write(self.record_path(index), text)?;
        RECORD_WRITES.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_record(&self, index: usize) -> Result<Message, RuntimeError> {
        let text = fs::read_to_string(self.record_path(index))?;
        let message = serde_json::from_str(&text)
            .map_err(|e| RuntimeError::Storage(format!("record {index}: {e}")))?;
        RECORD_READS.fetch_add(1, Ordering::Relaxed);
        Ok(message)
    }
}

impl MessageStore for FileArray {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Message, RuntimeError> {
        if index >= self.len {
            return Err(RuntimeError::Internal(format!(
                "index {index} out of bounds for file array of length {}",
                self.len
            )));
        }
        self.read_record(index)
    }

    fn set(&mut self, index: usize, message: Message) -> Result<(), RuntimeError> {
        if index >= self.len {
            return Err(RuntimeError::Internal(format!(
                "index {index} out of bounds for file array of length {}",
                self.len
            )));
        }
        self.write_record(index, &message)
    }
}

impl Drop for FileArray {
    fn drop(&mut self) {
        // Best effort: the folder holds only this array's records.
        let _ = fs::remove_dir_all(&self.dir);
    }
}

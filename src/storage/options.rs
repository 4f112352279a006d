// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};

use super::{StorageResult, TracedStorageError};

/// Number of tuples in a standard vector.
pub const STANDARD_VECTOR_SIZE: usize = 1024;

/// Usable bytes of a standard block: 256KB minus the block header kept by the buffer manager.
pub const BLOCK_SIZE: usize = 262144 - 8;

/// Options for `RleSegment`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Usable size (in bytes) of a block
    pub block_size: usize,

    /// Maximum number of tuples in a vector region
    pub vector_size: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            vector_size: STANDARD_VECTOR_SIZE,
        }
    }
}

impl SegmentOptions {
    /// Small vectors and blocks, so that tests cross region and segment boundaries quickly.
    pub fn default_for_test() -> Self {
        Self {
            block_size: 4096,
            vector_size: 64,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.vector_size == 0 || self.vector_size % 8 != 0 {
            return Err(TracedStorageError::invalid_options(format!(
                "vector size must be a positive multiple of 8, got {}",
                self.vector_size
            )));
        }
        if self.block_size == 0 {
            return Err(TracedStorageError::invalid_options("block size must be positive"));
        }
        Ok(())
    }
}

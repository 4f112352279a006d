// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{BlockFrame, BlockId, BufferHandle, BufferManager};
use crate::storage::{StorageResult, TracedStorageError};

/// A buffer manager keeping every block in memory. Blocks are never evicted.
#[derive(Default)]
pub struct InMemoryBufferManager {
    blocks: Mutex<HashMap<BlockId, Arc<BlockFrame>>>,
    next_id: AtomicU64,
}

impl InMemoryBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of pins on a block, `None` if the block does not exist.
    pub fn pin_count(&self, block_id: BlockId) -> Option<u32> {
        self.blocks.lock().get(&block_id).map(|f| f.pin_count())
    }
}

impl BufferManager for InMemoryBufferManager {
    fn allocate(&self, size: usize) -> StorageResult<BufferHandle> {
        let block_id = BlockId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let frame = Arc::new(BlockFrame::new(size));
        self.blocks.lock().insert(block_id, frame.clone());
        trace!(%block_id, size, "allocated block");
        Ok(BufferHandle::new(block_id, frame))
    }

    fn pin(&self, block_id: BlockId) -> StorageResult<BufferHandle> {
        let frame = self
            .blocks
            .lock()
            .get(&block_id)
            .cloned()
            .ok_or_else(|| TracedStorageError::not_found("block", block_id))?;
        Ok(BufferHandle::new(block_id, frame))
    }
}

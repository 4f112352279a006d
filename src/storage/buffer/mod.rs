// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Fixed-size blocks pinned through a buffer manager.
//!
//! Segments never own block memory. They hold a [`BlockId`] and pin the block through a
//! [`BufferManager`] for the duration of every read or write. The returned [`BufferHandle`]
//! unpins on drop, so every exit path releases the pin.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::StorageResult;

mod memory;

pub use self::memory::InMemoryBufferManager;

/// Identifier of a block managed by a [`BufferManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u64);

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block:{}", self.0)
    }
}

/// Allocates and pins blocks.
pub trait BufferManager: Send + Sync + 'static {
    /// Allocate a zero-filled block of `size` usable bytes and pin it.
    fn allocate(&self, size: usize) -> StorageResult<BufferHandle>;

    /// Pin an existing block.
    fn pin(&self, block_id: BlockId) -> StorageResult<BufferHandle>;
}

pub type BufferManagerRef = Arc<dyn BufferManager>;

/// A resident block.
pub struct BlockFrame {
    data: RwLock<Box<[u8]>>,
    pin_count: AtomicU32,
}

impl BlockFrame {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            data: RwLock::new(vec![0u8; size].into_boxed_slice()),
            pin_count: AtomicU32::new(0),
        }
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.data.read().len()
    }
}

/// A scoped pin of a block. The block stays resident while the handle is alive.
pub struct BufferHandle {
    block_id: BlockId,
    frame: Arc<BlockFrame>,
}

impl BufferHandle {
    pub(crate) fn new(block_id: BlockId, frame: Arc<BlockFrame>) -> Self {
        frame.pin_count.fetch_add(1, Ordering::AcqRel);
        Self { block_id, frame }
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Shared access to the block bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.frame.data.read()
    }

    /// Exclusive access to the block bytes.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.frame.data.write()
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        self.frame.pin_count.fetch_sub(1, Ordering::AcqRel);
    }
}

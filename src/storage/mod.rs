// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Column storage: RLE segments on pinned blocks, their overlays and version chains, and the
//! transactions reading and updating them.

pub mod buffer;
mod column;
mod error;
mod options;
pub mod rle;
mod transaction;
mod transaction_manager;

pub use self::buffer::{
    BlockId, BufferHandle, BufferManager, BufferManagerRef, InMemoryBufferManager,
};
pub use self::column::ColumnData;
pub use self::error::{StorageError, StorageResult, TracedStorageError};
pub use self::options::{SegmentOptions, BLOCK_SIZE, STANDARD_VECTOR_SIZE};
pub use self::transaction::{Transaction, TRANSACTION_ID_START};
pub use self::transaction_manager::TransactionManager;

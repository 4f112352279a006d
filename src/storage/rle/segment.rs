// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::codec::{codec_for, RleCodec, VectorInput};
use super::delta::SegmentDeltaUpdates;
use super::filter::TableFilter;
use super::layout::VectorLayout;
use super::statistics::SegmentStatistics;
use super::version::{SegmentVersions, UpdateNode};
use crate::array::{ArrayImpl, SelectionVector};
use crate::storage::buffer::{BlockId, BufferManagerRef};
use crate::storage::{
    SegmentOptions, StorageError, StorageResult, TracedStorageError, Transaction,
};
use crate::types::{DataValue, PhysicalType};

/// Position of a scan within a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnScanState {
    pub vector_index: usize,
}

impl ColumnScanState {
    pub fn new(vector_index: usize) -> Self {
        Self { vector_index }
    }
}

/// Structures mutated after append: overlays and version chains.
struct SegmentUpdates {
    delta: SegmentDeltaUpdates,
    versions: SegmentVersions,
}

/// A run-length encoded segment of one fixed-width column, stored in one block.
pub struct RleSegment {
    buffer_manager: BufferManagerRef,
    block_id: BlockId,
    ty: PhysicalType,
    /// Row id of the first tuple.
    row_start: u64,
    codec: Arc<dyn RleCodec>,
    layout: VectorLayout,
    tuple_count: AtomicUsize,
    /// Shared by scans, exclusive for updates.
    lock: RwLock<()>,
    updates: RwLock<SegmentUpdates>,
}

impl RleSegment {
    /// Create a segment on a freshly allocated block.
    pub fn new(
        buffer_manager: BufferManagerRef,
        options: &SegmentOptions,
        ty: PhysicalType,
        row_start: u64,
    ) -> StorageResult<Self> {
        let (codec, layout) = Self::resolve(options, ty)?;
        let handle = buffer_manager.allocate(options.block_size)?;
        {
            let mut block = handle.write();
            for vector_index in 0..layout.max_vector_count() {
                layout.region_mut(&mut block, vector_index)?.reset();
            }
        }
        debug!(
            block_id = %handle.block_id(),
            %ty,
            row_start,
            max_vector_count = layout.max_vector_count(),
            "created rle segment"
        );
        Ok(Self::with_parts(
            buffer_manager,
            handle.block_id(),
            ty,
            row_start,
            codec,
            layout,
            0,
        ))
    }

    /// Attach to a block written earlier, holding `tuple_count` tuples.
    pub fn attach(
        buffer_manager: BufferManagerRef,
        options: &SegmentOptions,
        ty: PhysicalType,
        row_start: u64,
        block_id: BlockId,
        tuple_count: usize,
    ) -> StorageResult<Self> {
        let (codec, layout) = Self::resolve(options, ty)?;
        if tuple_count > layout.max_tuple_count() {
            return Err(TracedStorageError::decode(format!(
                "{tuple_count} tuples exceed the capacity of {block_id}"
            )));
        }
        let handle = buffer_manager.pin(block_id)?;
        {
            let block = handle.read();
            let vector_size = layout.vector_size();
            for vector_index in 0..tuple_count.div_ceil(vector_size) {
                let count = (tuple_count - vector_index * vector_size).min(vector_size);
                layout.region(&block, vector_index)?.run_count(count)?;
            }
        }
        debug!(%block_id, %ty, row_start, tuple_count, "attached rle segment");
        Ok(Self::with_parts(
            buffer_manager,
            block_id,
            ty,
            row_start,
            codec,
            layout,
            tuple_count,
        ))
    }

    fn resolve(
        options: &SegmentOptions,
        ty: PhysicalType,
    ) -> StorageResult<(Arc<dyn RleCodec>, VectorLayout)> {
        let codec = codec_for(ty)?;
        let width = ty
            .width()
            .ok_or_else(|| TracedStorageError::not_implemented(format!("RLE segment for {ty}")))?;
        let layout = VectorLayout::new(options, width)?;
        Ok((codec, layout))
    }

    fn with_parts(
        buffer_manager: BufferManagerRef,
        block_id: BlockId,
        ty: PhysicalType,
        row_start: u64,
        codec: Arc<dyn RleCodec>,
        layout: VectorLayout,
        tuple_count: usize,
    ) -> Self {
        let max_vector_count = layout.max_vector_count();
        Self {
            buffer_manager,
            block_id,
            ty,
            row_start,
            codec,
            layout,
            tuple_count: AtomicUsize::new(tuple_count),
            lock: RwLock::new(()),
            updates: RwLock::new(SegmentUpdates {
                delta: SegmentDeltaUpdates::new(max_vector_count),
                versions: SegmentVersions::new(max_vector_count),
            }),
        }
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.ty
    }

    pub fn row_start(&self) -> u64 {
        self.row_start
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_count.load(Ordering::Acquire)
    }

    pub fn max_tuple_count(&self) -> usize {
        self.layout.max_tuple_count()
    }

    pub fn vector_size(&self) -> usize {
        self.layout.vector_size()
    }

    /// Number of vectors holding at least one tuple.
    pub fn vector_total(&self) -> usize {
        self.tuple_count().div_ceil(self.layout.vector_size())
    }

    /// Number of tuples in the vector.
    pub fn vector_count(&self, vector_index: usize) -> usize {
        let vector_size = self.layout.vector_size();
        self.tuple_count()
            .saturating_sub(vector_index * vector_size)
            .min(vector_size)
    }

    fn check_vector(&self, vector_index: usize) -> StorageResult<usize> {
        match self.vector_count(vector_index) {
            0 => Err(TracedStorageError::not_found("vector", vector_index)),
            count => Ok(count),
        }
    }

    /// Append up to `count` tuples of `source` starting at `offset`.
    ///
    /// Returns the number of tuples appended, which is less than `count` once the segment is
    /// full. Appends must not run concurrently with each other.
    pub fn append(
        &self,
        stats: &mut SegmentStatistics,
        source: &ArrayImpl,
        offset: usize,
        count: usize,
    ) -> StorageResult<usize> {
        if source.physical_type() != self.ty {
            return Err(TracedStorageError::invalid_type(
                self.ty,
                format!("cannot append a batch of {}", source.physical_type()),
            ));
        }
        if offset.checked_add(count).filter(|&end| end <= source.len()).is_none() {
            return Err(StorageError::InvalidRowId(offset.saturating_add(count) as u64).into());
        }
        let vector_size = self.layout.vector_size();
        let handle = self.buffer_manager.pin(self.block_id)?;
        let mut block = handle.write();
        let mut tuple_count = self.tuple_count();
        let mut appended = 0;
        while appended < count && tuple_count < self.max_tuple_count() {
            let vector_index = tuple_count / vector_size;
            let existing = tuple_count % vector_size;
            let n = (count - appended).min(vector_size - existing);
            let region = self.layout.region_mut(&mut block, vector_index)?;
            self.codec
                .append(region, existing, stats, source, offset + appended, n)?;
            appended += n;
            tuple_count += n;
            self.tuple_count.store(tuple_count, Ordering::Release);
        }
        trace!(block_id = %self.block_id, appended, requested = count, "appended to rle segment");
        Ok(appended)
    }

    fn with_input<R>(
        &self,
        vector_index: usize,
        with_overlay: bool,
        f: impl FnOnce(&VectorInput<'_>) -> R,
    ) -> StorageResult<R> {
        let tuple_count = self.check_vector(vector_index)?;
        let handle = self.buffer_manager.pin(self.block_id)?;
        let block = handle.read();
        let updates = self.updates.read();
        let input = VectorInput {
            region: self.layout.region(&block, vector_index)?,
            tuple_count,
            updates: with_overlay.then(|| updates.delta.get(vector_index)).flatten(),
        };
        Ok(f(&input))
    }

    /// Decompress a vector as seen by `txn`.
    ///
    /// `take_lock` takes the shared side of the segment lock, for callers not holding a
    /// coarser lock already.
    pub fn scan(
        &self,
        txn: &Transaction,
        vector_index: usize,
        take_lock: bool,
    ) -> StorageResult<ArrayImpl> {
        let _guard = take_lock.then(|| self.lock.read());
        let mut result = self.fetch_base_data(vector_index)?;
        self.fetch_update_data(txn, vector_index, &mut result)?;
        Ok(result)
    }

    /// Decompress the latest state of a vector, ignoring version chains.
    pub fn fetch_base_data(&self, vector_index: usize) -> StorageResult<ArrayImpl> {
        self.with_input(vector_index, true, |input| self.codec.decompress(input))
    }

    /// Restore the values of a decompressed vector that `txn` must not see yet.
    pub fn fetch_update_data(
        &self,
        txn: &Transaction,
        vector_index: usize,
        result: &mut ArrayImpl,
    ) -> StorageResult<()> {
        let updates = self.updates.read();
        if let Some(chain) = updates.versions.get(vector_index) {
            let mut restored = Ok(());
            chain.apply(txn, |id, value| {
                if restored.is_ok() {
                    restored = result.set(id as usize, value);
                }
            });
            restored?;
        }
        Ok(())
    }

    fn check_selection(&self, state: &ColumnScanState, sel: &SelectionVector) -> StorageResult<()> {
        let tuple_count = self.check_vector(state.vector_index)?;
        let mut prev = None;
        for id in sel.iter() {
            if id >= tuple_count || prev.map_or(false, |p| p >= id) {
                return Err(StorageError::InvalidRowId(id as u64).into());
            }
            prev = Some(id);
        }
        Ok(())
    }

    /// Evaluate up to two filters against the compressed vector, narrowing `sel` in place.
    ///
    /// Evaluates the latest state of the vector and takes no lock. Snapshot reads go through
    /// [`RleSegment::filter_scan`].
    pub fn select(
        &self,
        state: &ColumnScanState,
        result: &mut ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()> {
        self.check_selection(state, sel)?;
        self.with_input(state.vector_index, true, |input| {
            self.codec.select(input, result, sel, filters)
        })?
    }

    /// Materialize the selected tuples of a vector.
    pub fn filter_fetch_base_data(
        &self,
        state: &ColumnScanState,
        result: &mut ArrayImpl,
        sel: &SelectionVector,
    ) -> StorageResult<()> {
        self.check_selection(state, sel)?;
        self.with_input(state.vector_index, true, |input| {
            self.codec.filter_fetch(input, result, sel)
        })
    }

    /// Narrow `sel` to the tuples of a decompressed vector passing `filters`.
    pub fn filter_batch(
        &self,
        batch: &ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()> {
        self.codec.filter_batch(batch, sel, filters)
    }

    /// Filter a vector as seen by `txn`, returning the batch the surviving ids of `sel` point into.
    ///
    /// Filters are pushed down to the compressed runs while the vector has no version chain
    /// entries. Otherwise the vector is decompressed for `txn` and filtered afterwards. Updates
    /// and rollbacks are excluded for the whole call.
    pub fn filter_scan(
        &self,
        txn: &Transaction,
        vector_index: usize,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<ArrayImpl> {
        let state = ColumnScanState::new(vector_index);
        let _guard = self.lock.read();
        self.check_selection(&state, sel)?;
        if self.has_versions(vector_index) {
            let batch = self.scan(txn, vector_index, false)?;
            self.filter_batch(&batch, sel, filters)?;
            return Ok(batch);
        }
        let mut result = ArrayImpl::new_null(self.ty, 0).ok_or_else(|| {
            TracedStorageError::not_implemented(format!("RLE segment for {}", self.ty))
        })?;
        self.select(&state, &mut result, sel, filters)?;
        Ok(result)
    }

    /// Whether any version chain entry exists for the vector.
    pub fn has_versions(&self, vector_index: usize) -> bool {
        self.updates.read().versions.get(vector_index).is_some()
    }

    /// Record new values of the tuples `ids` of one vector on behalf of `txn`.
    ///
    /// `ids` are ascending absolute row ids inside the vector starting at row `vector_offset`.
    /// `node` is the update node `txn` already holds for this vector, if any. The replaced
    /// values are recorded in the returned node.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        stats: &mut SegmentStatistics,
        txn: &Transaction,
        values: &ArrayImpl,
        ids: &[u64],
        vector_index: usize,
        vector_offset: u64,
        node: Option<Arc<UpdateNode>>,
    ) -> StorageResult<Arc<UpdateNode>> {
        if txn.is_finished() {
            return Err(TracedStorageError::not_found(
                "active transaction",
                txn.transaction_id(),
            ));
        }
        if values.physical_type() != self.ty {
            return Err(TracedStorageError::invalid_type(
                self.ty,
                format!("cannot update with a batch of {}", values.physical_type()),
            ));
        }
        if values.len() != ids.len() {
            return Err(TracedStorageError::invalid_type(
                self.ty,
                format!("{} values for {} row ids", values.len(), ids.len()),
            ));
        }
        let tuple_count = self.check_vector(vector_index)?;
        let expected_offset = self.row_start + (vector_index * self.layout.vector_size()) as u64;
        if vector_offset != expected_offset {
            return Err(StorageError::InvalidRowId(vector_offset).into());
        }
        let mut local_ids = Vec::with_capacity(ids.len());
        for &id in ids {
            let local = id
                .checked_sub(vector_offset)
                .filter(|&l| l < tuple_count as u64)
                .ok_or(StorageError::InvalidRowId(id))?;
            if local_ids.last().map_or(false, |&last| last >= local as u32) {
                return Err(StorageError::InvalidRowId(id).into());
            }
            local_ids.push(local as u32);
        }
        if let Some(node) = &node {
            if node.vector_index() != vector_index || node.version() != txn.transaction_id() {
                return Err(TracedStorageError::not_found(
                    "update node of transaction",
                    txn.transaction_id(),
                ));
            }
        }

        let _guard = self.lock.write();
        let handle = self.buffer_manager.pin(self.block_id)?;
        let block = handle.read();
        let mut updates = self.updates.write();

        if let Some(chain) = updates.versions.get(vector_index) {
            if let Some(id) = chain.find_conflict(txn, &local_ids) {
                let row_id = vector_offset + id as u64;
                warn!(row_id, txn = txn.transaction_id(), "write-write conflict");
                return Err(StorageError::TransactionConflict(row_id).into());
            }
        }

        let old_values = {
            let input = VectorInput {
                region: self.layout.region(&block, vector_index)?,
                tuple_count,
                updates: updates.delta.get(vector_index),
            };
            local_ids
                .iter()
                .map(|&id| (id, self.codec.fetch_value(&input, id as usize)))
                .collect::<Vec<_>>()
        };

        let delta = updates.delta.get_or_create(vector_index);
        for (k, &id) in local_ids.iter().enumerate() {
            let value = values.get(k);
            stats.update(value);
            delta.insert(id, value);
        }

        let node = match node {
            Some(node) => {
                node.merge(old_values);
                node
            }
            None => {
                let node = Arc::new(UpdateNode::new(vector_index, txn.transaction_id(), old_values));
                updates.versions.get_mut(vector_index).push(node.clone());
                node
            }
        };
        trace!(block_id = %self.block_id, vector_index, count = ids.len(), "updated rle segment");
        Ok(node)
    }

    /// Undo the update recorded in `node`: restore the replaced values and unlink the node.
    pub fn rollback_update(&self, node: &Arc<UpdateNode>) {
        let _guard = self.lock.write();
        let mut updates = self.updates.write();
        let vector_index = node.vector_index();
        let delta = updates.delta.get_or_create(vector_index);
        for (id, value) in node.tuples().iter() {
            delta.insert(*id, *value);
        }
        updates.versions.get_mut(vector_index).remove(node);
    }

    /// Unlink a committed node no transaction needs anymore.
    pub fn cleanup_update(&self, node: &Arc<UpdateNode>) {
        let mut updates = self.updates.write();
        updates.versions.get_mut(node.vector_index()).remove(node);
    }

    /// Latest value of a row, ignoring version chains.
    pub fn fetch_row(&self, row_id: u64) -> StorageResult<DataValue> {
        let local = row_id
            .checked_sub(self.row_start)
            .filter(|&l| l < self.tuple_count() as u64)
            .ok_or(StorageError::InvalidRowId(row_id))? as usize;
        let vector_size = self.layout.vector_size();
        self.with_input(local / vector_size, true, |input| {
            self.codec.fetch_value(input, local % vector_size)
        })
    }
}

impl std::fmt::Debug for RleSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RleSegment")
            .field("block_id", &self.block_id)
            .field("ty", &self.ty)
            .field("row_start", &self.row_start)
            .field("tuple_count", &self.tuple_count())
            .finish()
    }
}

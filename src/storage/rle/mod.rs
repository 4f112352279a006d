// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Run-length encoded column segments.
//!
//! A segment stores the runs of one fixed-width column in the vector regions of a single
//! block. Runs are immutable once appended; updates go to a per-vector delta overlay and the
//! replaced values to per-vector version chains.

mod codec;
mod delta;
mod encode;
mod filter;
mod layout;
mod segment;
mod statistics;
mod version;

pub use self::codec::{codec_for, PrimitiveRleCodec, RleCodec, VectorInput};
pub use self::delta::{SegmentDeltaUpdates, VectorUpdates};
pub use self::encode::{PrimitiveFixedWidthEncode, RleValue};
pub use self::filter::{ComparisonKind, TableFilter};
pub use self::layout::{VectorLayout, VectorRegion, VectorRegionMut};
pub use self::segment::{ColumnScanState, RleSegment};
pub use self::statistics::SegmentStatistics;
pub use self::version::{SegmentVersions, UpdateNode, VersionChain};

// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};

use crate::types::DataValue;

/// Running statistics of a segment. Coverage only ever widens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStatistics {
    /// Minimum non-null value, `Null` while no value was seen.
    pub min: DataValue,
    /// Maximum non-null value, `Null` while no value was seen.
    pub max: DataValue,
    pub has_null: bool,
}

impl SegmentStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the statistics with `value`.
    pub fn update(&mut self, value: DataValue) {
        if value.is_null() {
            self.has_null = true;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &SegmentStatistics) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.has_null |= other.has_null;
    }

    /// Whether the statistics cover `value`.
    pub fn covers(&self, value: &DataValue) -> bool {
        if value.is_null() {
            return self.has_null;
        }
        !self.min.is_null() && self.min <= *value && *value <= self.max
    }
}

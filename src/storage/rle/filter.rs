// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::DataValue;

/// Comparison operators that can be pushed down to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonKind {
    Equal,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl ComparisonKind {
    /// Evaluate `left <op> right`. Unordered operands (NaN) never pass.
    #[inline]
    pub fn evaluate<T: PartialOrd>(&self, left: &T, right: &T) -> bool {
        match self {
            Self::Equal => left == right,
            Self::LessThan => left < right,
            Self::GreaterThan => left > right,
            Self::LessThanOrEqual => left <= right,
            Self::GreaterThanOrEqual => left >= right,
        }
    }

    /// `>` or `>=`.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::GreaterThan | Self::GreaterThanOrEqual)
    }

    /// `<` or `<=`.
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Self::LessThan | Self::LessThanOrEqual)
    }
}

impl Display for ComparisonKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Equal => "=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThanOrEqual => ">=",
        };
        write!(f, "{op}")
    }
}

/// A filter `column <comparison> constant` handed to a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableFilter {
    pub comparison: ComparisonKind,
    pub constant: DataValue,
}

impl TableFilter {
    pub fn new(comparison: ComparisonKind, constant: impl Into<DataValue>) -> Self {
        Self {
            comparison,
            constant: constant.into(),
        }
    }

    pub fn equal(constant: impl Into<DataValue>) -> Self {
        Self::new(ComparisonKind::Equal, constant)
    }

    pub fn less_than(constant: impl Into<DataValue>) -> Self {
        Self::new(ComparisonKind::LessThan, constant)
    }

    pub fn greater_than(constant: impl Into<DataValue>) -> Self {
        Self::new(ComparisonKind::GreaterThan, constant)
    }

    pub fn less_than_or_equal(constant: impl Into<DataValue>) -> Self {
        Self::new(ComparisonKind::LessThanOrEqual, constant)
    }

    pub fn greater_than_or_equal(constant: impl Into<DataValue>) -> Self {
        Self::new(ComparisonKind::GreaterThanOrEqual, constant)
    }
}

impl Display for TableFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.comparison, self.constant)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ComparisonKind::Equal, 3, 3, true)]
    #[test_case(ComparisonKind::Equal, 3, 4, false)]
    #[test_case(ComparisonKind::LessThan, 3, 4, true)]
    #[test_case(ComparisonKind::LessThan, 4, 4, false)]
    #[test_case(ComparisonKind::GreaterThan, 5, 4, true)]
    #[test_case(ComparisonKind::LessThanOrEqual, 4, 4, true)]
    #[test_case(ComparisonKind::GreaterThanOrEqual, 3, 4, false)]
    fn test_evaluate(kind: ComparisonKind, left: i32, right: i32, expected: bool) {
        assert_eq!(kind.evaluate(&left, &right), expected);
    }

    #[test]
    fn test_nan_never_passes() {
        for kind in [
            ComparisonKind::Equal,
            ComparisonKind::LessThan,
            ComparisonKind::GreaterThan,
            ComparisonKind::LessThanOrEqual,
            ComparisonKind::GreaterThanOrEqual,
        ] {
            assert!(!kind.evaluate(&f64::NAN, &1.0));
        }
    }

    #[test]
    fn test_bounds() {
        assert!(ComparisonKind::GreaterThanOrEqual.is_lower_bound());
        assert!(ComparisonKind::LessThan.is_upper_bound());
        assert!(!ComparisonKind::Equal.is_lower_bound());
        assert!(!ComparisonKind::Equal.is_upper_bound());
        assert!(!ComparisonKind::GreaterThan.is_upper_bound());
    }
}

// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::backtrace::Backtrace;

use thiserror::Error;

use crate::array::ArrayError;
use crate::types::PhysicalType;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("invalid type {ty}: {message}")]
    InvalidType { ty: PhysicalType, message: String },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("invalid row id: {0}")]
    InvalidRowId(u64),
    #[error("write-write conflict on row {0}")]
    TransactionConflict(u64),
    #[error("{0}({1}) not found")]
    NotFound(&'static str, String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// [`StorageResult`] with backtrace.
#[derive(Error)]
#[error("{source:?}\n{backtrace}")]
pub struct TracedStorageError {
    #[from]
    source: StorageError,
    backtrace: Backtrace,
}

impl std::fmt::Debug for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<ArrayError> for TracedStorageError {
    #[inline]
    fn from(e: ArrayError) -> TracedStorageError {
        match e {
            ArrayError::TypeMismatch { expected, actual } => {
                Self::invalid_type(expected, format!("cannot hold {actual}"))
            }
            ArrayError::IndexOutOfBoundary { index, .. } => {
                StorageError::InvalidRowId(index as u64).into()
            }
        }
    }
}

impl TracedStorageError {
    /// The underlying error, without backtrace.
    pub fn inner(&self) -> &StorageError {
        &self.source
    }

    pub fn not_implemented(message: impl ToString) -> Self {
        StorageError::NotImplemented(message.to_string()).into()
    }

    pub fn invalid_type(ty: PhysicalType, message: impl ToString) -> Self {
        StorageError::InvalidType {
            ty,
            message: message.to_string(),
        }
        .into()
    }

    pub fn invalid_filter(message: impl ToString) -> Self {
        StorageError::InvalidFilter(message.to_string()).into()
    }

    pub fn invalid_options(message: impl ToString) -> Self {
        StorageError::InvalidOptions(message.to_string()).into()
    }

    pub fn not_found(ty: &'static str, item: impl ToString) -> Self {
        StorageError::NotFound(ty, item.to_string()).into()
    }

    pub fn decode(message: impl ToString) -> Self {
        StorageError::Decode(message.to_string()).into()
    }
}

pub type StorageResult<T> = std::result::Result<T, TracedStorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_error_conversion() {
        let err: TracedStorageError = ArrayError::TypeMismatch {
            expected: PhysicalType::Int32,
            actual: crate::types::DataValue::Int64(1),
        }
        .into();
        assert!(matches!(
            err.inner(),
            StorageError::InvalidType {
                ty: PhysicalType::Int32,
                ..
            }
        ));
        assert!(err.to_string().starts_with("InvalidType"));
    }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for bm-core operations.

use thiserror::Error;

/// All possible errors that can occur in bm-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("invalid reference kind: '{0}'\n  hint: valid kinds are: status, priority, severity, resolution, view_state, project_status")]
    InvalidReferenceKind(String),
}

/// A specialized Result type for bm-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

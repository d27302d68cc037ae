// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::remote::TransportError;

/// All possible errors that can occur in the bugmirror library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("remote call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed issue id '{value}'\n  hint: issue ids are positive integers separated by ';'")]
    MalformedId { value: String },

    #[error("malformed issue id '{value}' at {path}:{line}\n  hint: the file must hold one issue id per line")]
    MalformedIdLine {
        path: String,
        line: usize,
        value: String,
    },

    #[error("local write failed: {0}")]
    Store(#[from] bm_core::Error),

    #[error("project {0} is not visible to this account")]
    ProjectNotVisible(i64),

    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sync failed while {step}: {source}")]
    SyncFailed {
        step: String,
        #[source]
        source: Box<Error>,
    },
}

/// A specialized Result type for bugmirror operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

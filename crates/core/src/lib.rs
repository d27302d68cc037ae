// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bm-core: Local mirror storage for bugmirror
//!
//! This crate provides the mirrored data model, the SQLite-backed
//! [`LocalStore`] implementation and the clock abstraction shared by the
//! sync engine in the `bugmirror` crate.

pub mod cache;
pub mod clock;
pub mod db;
pub mod error;
pub mod model;
pub mod store;

pub use cache::{CacheKey, ReferenceCache};
pub use clock::{Clock, SystemClock};
pub use db::Database;
pub use error::{Error, Result};
pub use model::{
    Account, CustomField, CustomFieldValue, HistoryEntry, Issue, IssueSnapshot, Named, Note,
    Project, ProjectSnapshot, RefKind, Version,
};
pub use store::{LocalStore, RunRecord, UpsertOutcome};

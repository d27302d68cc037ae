// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The local mirror capability consumed by the sync engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{IssueSnapshot, ProjectSnapshot};

/// What an issue upsert did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// The issue was not mirrored before.
    Inserted,
    /// The mirrored row and its children were replaced.
    Updated,
    /// The mirror already holds a newer `last_updated`; data was kept.
    Stale,
}

/// One completed delta run for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub project_id: i64,
    /// Becomes the next run's watermark.
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Capability over the relational mirror.
///
/// Each upsert is one transaction: the parent row and all of its owned
/// children commit together or not at all.
pub trait LocalStore {
    /// Upsert a project and replace its versions, categories, custom field
    /// links, user list and parent link.
    fn upsert_project(&self, snapshot: &ProjectSnapshot, synced_at: DateTime<Utc>) -> Result<()>;

    /// Upsert an issue and replace its notes, custom field values and history.
    ///
    /// A snapshot older than the mirrored `last_updated` leaves the data as is
    /// and only stamps `synced_at`.
    fn upsert_issue(
        &self,
        snapshot: &IssueSnapshot,
        synced_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Start time of the last completed run for the project.
    fn read_last_successful_run_time(&self, project_id: i64) -> Result<Option<DateTime<Utc>>>;

    /// Ids of mirrored issues of the project that are not closed and were
    /// last synced strictly before `not_synced_since`.
    fn read_open_issue_ids(
        &self,
        not_synced_since: DateTime<Utc>,
        project_id: i64,
    ) -> Result<Vec<i64>>;

    /// Persist the runs of one completed sync in a single transaction.
    ///
    /// Each record's `started_at` becomes its project's next watermark.
    fn record_runs(&self, runs: &[RunRecord]) -> Result<()>;

    /// Forget every read-through cache entry.
    fn invalidate_caches(&self);
}

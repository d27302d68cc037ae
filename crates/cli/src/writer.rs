// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Turns fetched snapshots into one transactional upsert each.

use std::collections::HashSet;

use bm_core::{Clock, IssueSnapshot, LocalStore, ProjectSnapshot, UpsertOutcome};

use crate::error::Result;

/// Counts of issue upsert outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteTally {
    pub inserted: usize,
    pub updated: usize,
    pub stale: usize,
}

impl WriteTally {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Stale => self.stale += 1,
        }
    }

    pub fn add(&mut self, other: WriteTally) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.stale += other.stale;
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.stale
    }
}

/// Keep the first element for each key.
fn dedupe_by<T, K, F>(items: &mut Vec<T>, key: F)
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}

/// Writes snapshots through the store, stamping each with the clock.
pub struct ReconciliationWriter<'a> {
    store: &'a dyn LocalStore,
    clock: &'a dyn Clock,
}

impl<'a> ReconciliationWriter<'a> {
    pub fn new(store: &'a dyn LocalStore, clock: &'a dyn Clock) -> Self {
        ReconciliationWriter { store, clock }
    }

    /// Upsert a project and replace its child collections.
    pub fn write_project(&self, mut snapshot: ProjectSnapshot) -> Result<()> {
        dedupe_by(&mut snapshot.categories, |c| c.clone());
        dedupe_by(&mut snapshot.custom_fields, |f| f.id);
        dedupe_by(&mut snapshot.users, |u| u.id);
        if snapshot.project.parent_id == Some(snapshot.project.id) {
            snapshot.project.parent_id = None;
        }
        self.store.upsert_project(&snapshot, self.clock.now())?;
        Ok(())
    }

    /// Upsert an issue and replace its notes, custom field values and history.
    pub fn write_issue(&self, mut snapshot: IssueSnapshot) -> Result<UpsertOutcome> {
        dedupe_by(&mut snapshot.notes, |n| n.id);
        dedupe_by(&mut snapshot.custom_fields, |v| v.field.id);
        let outcome = self.store.upsert_issue(&snapshot, self.clock.now())?;
        if outcome == UpsertOutcome::Stale {
            tracing::info!(
                issue_id = snapshot.issue.id,
                "remote issue is older than the mirror, kept local data"
            );
        }
        Ok(outcome)
    }

    /// Write a batch in order, stopping at the first failure.
    pub fn write_batch(&self, batch: Vec<IssueSnapshot>) -> Result<WriteTally> {
        let mut tally = WriteTally::default();
        for snapshot in batch {
            tally.record(self.write_issue(snapshot)?);
        }
        Ok(tally)
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;

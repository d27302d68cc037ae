// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Run-level state machine.
//!
//! `Idle -> Authenticating -> SyncingProjects -> SyncingIssues -> Completed`,
//! with `Failed` reachable from every state. Watermarks are written only on
//! the way to `Completed`; every failure evicts the store caches once.

use std::fmt;

use bm_core::{Clock, LocalStore, RunRecord};
use chrono::{DateTime, Utc};

use crate::auth::{AuthSession, Authenticator};
use crate::cursor::{
    ClosedSinceCursor, EntityCursor, ExplicitIdListCursor, FileIdListCursor, IssueCursor,
    OpenIssueCursor, ProjectListCursor, SyncContext,
};
use crate::error::{Error, Result};
use crate::params::{IssueSelection, JobParams, SyncScope};
use crate::remote::{Call, RemoteSource};
use crate::writer::{ReconciliationWriter, WriteTally};

/// Issue pass within the issue phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuePass {
    Open,
    ClosedSince,
    IdList,
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Authenticating,
    SyncingProjects,
    SyncingIssues {
        project_id: Option<i64>,
        pass: IssuePass,
    },
    Completed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "reading job parameters"),
            RunPhase::Authenticating => write!(f, "authenticating"),
            RunPhase::SyncingProjects => write!(f, "syncing projects"),
            RunPhase::SyncingIssues { project_id, pass } => {
                let pass = match pass {
                    IssuePass::Open => "open issues",
                    IssuePass::ClosedSince => "closed-since issues",
                    IssuePass::IdList => "listed issues",
                };
                match project_id {
                    Some(id) => write!(f, "syncing {pass} of project {id}"),
                    None => write!(f, "syncing {pass}"),
                }
            }
            RunPhase::Completed => write!(f, "completed"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Tunables for a run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Issues handed to the writer per batch.
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions { batch_size: 20 }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Access level reported by login; `None` for anonymous runs.
    pub access_level: Option<i64>,
    /// Project ids mirrored, in discovery order.
    pub projects: Vec<i64>,
    pub issues: WriteTally,
    /// Start time of the run, when an issue phase ran.
    pub run_start: Option<DateTime<Utc>>,
    /// True when the run recorded new watermarks.
    pub watermark_advanced: bool,
}

/// Drives one run from authentication to completion.
pub struct SyncOrchestrator<'a> {
    remote: &'a dyn RemoteSource,
    authenticator: &'a dyn Authenticator,
    store: &'a dyn LocalStore,
    clock: &'a dyn Clock,
    options: SyncOptions,
    phase: RunPhase,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        remote: &'a dyn RemoteSource,
        authenticator: &'a dyn Authenticator,
        store: &'a dyn LocalStore,
        clock: &'a dyn Clock,
        options: SyncOptions,
    ) -> Self {
        SyncOrchestrator {
            remote,
            authenticator,
            store,
            clock,
            options,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    /// Execute one run.
    ///
    /// The auth session is closed on every path. A failure evicts the store
    /// caches and is returned with the step it happened in.
    pub fn run(&mut self, params: &JobParams) -> Result<RunSummary> {
        self.phase = RunPhase::Idle;
        let authenticator = self.authenticator;
        let mut session = AuthSession::new(authenticator);
        let outcome = self.execute(params, &mut session);
        session.close();

        match outcome {
            Ok(summary) => {
                self.enter(RunPhase::Completed);
                tracing::info!(
                    projects = summary.projects.len(),
                    issues = summary.issues.total(),
                    watermark_advanced = summary.watermark_advanced,
                    "sync run completed"
                );
                Ok(summary)
            }
            Err(err) => {
                let step = self.phase.to_string();
                self.store.invalidate_caches();
                self.enter(RunPhase::Failed);
                tracing::error!(step = %step, error = %err, "sync run failed");
                Err(Error::SyncFailed {
                    step,
                    source: Box::new(err),
                })
            }
        }
    }

    fn execute(&mut self, params: &JobParams, session: &mut AuthSession<'_>) -> Result<RunSummary> {
        // Ids are validated before the first remote call
        let selection = IssueSelection::from_params(params)?;
        tracing::info!(
            delta = selection.is_delta(),
            project_id = ?params.project_id,
            "sync run started"
        );

        self.enter(RunPhase::Authenticating);
        let access_level = self.authenticate(params, session)?;

        let ctx = SyncContext {
            remote: self.remote,
            store: self.store,
            call: Call::new(&params.credentials, session.current_token()),
        };
        let writer = ReconciliationWriter::new(self.store, self.clock);
        let mut summary = RunSummary {
            access_level,
            ..Default::default()
        };

        self.enter(RunPhase::SyncingProjects);
        summary.projects = self.sync_projects(&ctx, &writer, params.project_id)?;
        if params.scope == SyncScope::ProjectsOnly {
            return Ok(summary);
        }

        let run_start = self.clock.now();
        summary.run_start = Some(run_start);

        match selection {
            IssueSelection::Delta => {
                for &project_id in &summary.projects {
                    self.enter(RunPhase::SyncingIssues {
                        project_id: Some(project_id),
                        pass: IssuePass::Open,
                    });
                    let since = self.store.read_last_successful_run_time(project_id)?;
                    tracing::info!(project_id, watermark = ?since, "syncing project issues");

                    let mut cursor =
                        IssueCursor::Open(OpenIssueCursor::new(&ctx, project_id, since));
                    summary.issues.add(self.drain_issues(&mut cursor, &writer)?);

                    self.enter(RunPhase::SyncingIssues {
                        project_id: Some(project_id),
                        pass: IssuePass::ClosedSince,
                    });
                    let mut cursor = IssueCursor::ClosedSince(ClosedSinceCursor::new(
                        &ctx, project_id, run_start,
                    ));
                    summary.issues.add(self.drain_issues(&mut cursor, &writer)?);
                }

                let finished_at = self.clock.now();
                let runs: Vec<RunRecord> = summary
                    .projects
                    .iter()
                    .map(|&project_id| RunRecord {
                        project_id,
                        started_at: run_start,
                        finished_at,
                    })
                    .collect();
                self.store.record_runs(&runs)?;
                summary.watermark_advanced = true;
            }
            IssueSelection::Explicit(ids) => {
                self.enter(RunPhase::SyncingIssues {
                    project_id: None,
                    pass: IssuePass::IdList,
                });
                let mut cursor = IssueCursor::ExplicitIds(ExplicitIdListCursor::new(&ctx, ids));
                summary.issues.add(self.drain_issues(&mut cursor, &writer)?);
            }
            IssueSelection::File { path, ids } => {
                self.enter(RunPhase::SyncingIssues {
                    project_id: None,
                    pass: IssuePass::IdList,
                });
                let count = ids.len();
                let file_cursor = FileIdListCursor::new(&ctx, &path, ids);
                tracing::info!(
                    path = %file_cursor.path().display(),
                    count,
                    "syncing issues from file"
                );
                let mut cursor = IssueCursor::IdFile(file_cursor);
                summary.issues.add(self.drain_issues(&mut cursor, &writer)?);
            }
        }

        Ok(summary)
    }

    fn authenticate(
        &self,
        params: &JobParams,
        session: &mut AuthSession<'_>,
    ) -> Result<Option<i64>> {
        let credentials = &params.credentials;
        session.authenticate(credentials).map_err(|e| match e {
            Error::Auth { .. } => e,
            other => Error::Auth {
                reason: other.to_string(),
            },
        })?;
        if credentials.is_anonymous() {
            tracing::info!("anonymous run, skipping login");
            return Ok(None);
        }

        let call = Call::new(credentials, session.current_token());
        let access_level = self.remote.login(&call).map_err(|e| Error::Auth {
            reason: e.to_string(),
        })?;
        tracing::info!(user = %credentials.username, access_level, "logged in");
        Ok(Some(access_level))
    }

    fn sync_projects(
        &self,
        ctx: &SyncContext<'_>,
        writer: &ReconciliationWriter<'_>,
        project_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        let mut cursor = ProjectListCursor::new(ctx, project_id);
        let mut synced = Vec::new();
        while let Some(snapshot) = cursor.next_item()? {
            let id = snapshot.project.id;
            writer.write_project(snapshot)?;
            synced.push(id);
        }
        tracing::info!(count = synced.len(), "projects synced");
        Ok(synced)
    }

    fn drain_issues(
        &self,
        cursor: &mut IssueCursor<'_>,
        writer: &ReconciliationWriter<'_>,
    ) -> Result<WriteTally> {
        let batch_size = self.options.batch_size.max(1);
        let mut tally = WriteTally::default();
        let mut batch = Vec::with_capacity(batch_size);

        while let Some(snapshot) = cursor.next_item()? {
            batch.push(snapshot);
            if batch.len() >= batch_size {
                tally.add(writer.write_batch(std::mem::take(&mut batch))?);
            }
        }
        if !batch.is_empty() {
            tally.add(writer.write_batch(batch)?);
        }

        tracing::info!(
            phase = %self.phase,
            inserted = tally.inserted,
            updated = tally.updated,
            stale = tally.stale,
            "issue pass finished"
        );
        Ok(tally)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

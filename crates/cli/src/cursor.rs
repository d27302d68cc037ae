// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Resumable, one-shot enumerators over remote entities.
//!
//! A cursor loads its source lazily on the first [`EntityCursor::next_item`]
//! call and yields items one at a time. The loaded list is dropped as soon
//! as its last item is handed out; further calls return `None` without
//! touching the remote again.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use bm_core::{IssueSnapshot, LocalStore, ProjectSnapshot};
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::remote::types::{IssueData, ProjectData};
use crate::remote::{mapping, Call, RemoteSource};

/// Per-run collaborators shared by every cursor.
pub struct SyncContext<'a> {
    pub remote: &'a dyn RemoteSource,
    pub store: &'a dyn LocalStore,
    pub call: Call<'a>,
}

/// A lazy, finite, non-restartable producer of items to sync.
pub trait EntityCursor {
    type Item;

    /// Produce the next item, or `None` once exhausted.
    fn next_item(&mut self) -> Result<Option<Self::Item>>;

    /// Returns false once the last item has been produced.
    fn has_more(&self) -> bool;
}

/// Loaded-once queue backing every cursor.
enum Source<T> {
    Unloaded,
    Loaded(VecDeque<T>),
    Exhausted,
}

impl<T> Source<T> {
    fn next(&mut self, load: impl FnOnce() -> Result<Vec<T>>) -> Result<Option<T>> {
        if let Source::Unloaded = self {
            *self = Source::Loaded(load()?.into());
        }
        let Source::Loaded(queue) = self else {
            return Ok(None);
        };
        let item = queue.pop_front();
        if queue.is_empty() {
            *self = Source::Exhausted;
        }
        Ok(item)
    }

    fn has_more(&self) -> bool {
        !matches!(self, Source::Exhausted)
    }
}

/// Fetch history for a fetched issue and build its snapshot.
fn assemble_issue(ctx: &SyncContext<'_>, data: IssueData) -> Result<IssueSnapshot> {
    let history = ctx.remote.get_issue_history(&ctx.call, data.id)?;
    Ok(mapping::issue_snapshot(data, history))
}

fn fetch_issue(ctx: &SyncContext<'_>, issue_id: i64) -> Result<IssueSnapshot> {
    let data = ctx.remote.get_issue(&ctx.call, issue_id)?;
    assemble_issue(ctx, data)
}

/// Flatten a project tree into `(project, parent_id)` pairs.
///
/// A project listed under several parents keeps its first position.
pub fn flatten_projects(
    roots: Vec<ProjectData>,
    parent_id: Option<i64>,
    seen: &mut HashSet<i64>,
    out: &mut Vec<(ProjectData, Option<i64>)>,
) {
    for mut project in roots {
        if !seen.insert(project.id) {
            continue;
        }
        let children = std::mem::take(&mut project.subprojects);
        let id = project.id;
        out.push((project, parent_id));
        flatten_projects(children, Some(id), seen, out);
    }
}

/// Find `project_id` in the tree, returning the subtree and its parent.
pub fn find_subtree(
    roots: Vec<ProjectData>,
    project_id: i64,
    parent_id: Option<i64>,
) -> Option<(ProjectData, Option<i64>)> {
    for project in roots {
        if project.id == project_id {
            return Some((project, parent_id));
        }
        let id = project.id;
        if let Some(found) = find_subtree(project.subprojects, project_id, Some(id)) {
            return Some(found);
        }
    }
    None
}

/// Every project visible to the principal, or one project and its subprojects.
pub struct ProjectListCursor<'c> {
    ctx: &'c SyncContext<'c>,
    project_id: Option<i64>,
    source: Source<(ProjectData, Option<i64>)>,
}

impl<'c> ProjectListCursor<'c> {
    pub fn new(ctx: &'c SyncContext<'c>, project_id: Option<i64>) -> Self {
        ProjectListCursor {
            ctx,
            project_id,
            source: Source::Unloaded,
        }
    }

    fn load(&self) -> Result<Vec<(ProjectData, Option<i64>)>> {
        let roots = self.ctx.remote.list_projects(&self.ctx.call)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        match self.project_id {
            None => flatten_projects(roots, None, &mut seen, &mut out),
            Some(id) => {
                let (root, parent_id) =
                    find_subtree(roots, id, None).ok_or(Error::ProjectNotVisible(id))?;
                flatten_projects(vec![root], parent_id, &mut seen, &mut out);
            }
        }
        tracing::debug!(count = out.len(), "projects discovered");
        Ok(out)
    }

    fn detail(&self, data: ProjectData, parent_id: Option<i64>) -> Result<ProjectSnapshot> {
        let (ctx, id) = (self.ctx, data.id);
        let versions = ctx.remote.get_project_versions(&ctx.call, id)?;
        let categories = ctx.remote.get_project_categories(&ctx.call, id)?;
        let custom_fields = ctx.remote.get_project_custom_fields(&ctx.call, id)?;
        let users = ctx.remote.get_project_users(&ctx.call, id)?;

        Ok(ProjectSnapshot {
            project: mapping::project(&data, parent_id),
            versions: versions.iter().map(mapping::version).collect(),
            categories,
            custom_fields: custom_fields.iter().map(mapping::custom_field).collect(),
            users: users.iter().map(mapping::account).collect(),
        })
    }
}

impl EntityCursor for ProjectListCursor<'_> {
    type Item = ProjectSnapshot;

    fn next_item(&mut self) -> Result<Option<ProjectSnapshot>> {
        let mut source = std::mem::replace(&mut self.source, Source::Exhausted);
        let next = source.next(|| self.load());
        self.source = source;
        match next? {
            Some((data, parent_id)) => self.detail(data, parent_id).map(Some),
            None => Ok(None),
        }
    }

    fn has_more(&self) -> bool {
        self.source.has_more()
    }
}

/// Currently open issues of one project changed at or after the watermark.
pub struct OpenIssueCursor<'c> {
    ctx: &'c SyncContext<'c>,
    project_id: i64,
    since: Option<DateTime<Utc>>,
    source: Source<IssueData>,
}

impl<'c> OpenIssueCursor<'c> {
    pub fn new(ctx: &'c SyncContext<'c>, project_id: i64, since: Option<DateTime<Utc>>) -> Self {
        OpenIssueCursor {
            ctx,
            project_id,
            since,
            source: Source::Unloaded,
        }
    }

    fn load(&self) -> Result<Vec<IssueData>> {
        let listed = self
            .ctx
            .remote
            .list_open_issues(&self.ctx.call, self.project_id, self.since)?;
        let total = listed.len();
        let since = self.since;
        let issues: Vec<IssueData> = listed
            .into_iter()
            .filter(|issue| since.is_none_or(|s| issue.last_updated >= s))
            .collect();
        tracing::debug!(
            project_id = self.project_id,
            listed = total,
            kept = issues.len(),
            "open issues loaded"
        );
        Ok(issues)
    }
}

impl EntityCursor for OpenIssueCursor<'_> {
    type Item = IssueSnapshot;

    fn next_item(&mut self) -> Result<Option<IssueSnapshot>> {
        let mut source = std::mem::replace(&mut self.source, Source::Exhausted);
        let next = source.next(|| self.load());
        self.source = source;
        match next? {
            Some(data) => assemble_issue(self.ctx, data).map(Some),
            None => Ok(None),
        }
    }

    fn has_more(&self) -> bool {
        self.source.has_more()
    }
}

/// Locally open issues not yet resynced since the run started, re-fetched by id.
///
/// Covers issues that closed during the run window and so never show up in
/// the open-issue listing.
pub struct ClosedSinceCursor<'c> {
    ctx: &'c SyncContext<'c>,
    project_id: i64,
    run_start: DateTime<Utc>,
    source: Source<i64>,
}

impl<'c> ClosedSinceCursor<'c> {
    pub fn new(ctx: &'c SyncContext<'c>, project_id: i64, run_start: DateTime<Utc>) -> Self {
        ClosedSinceCursor {
            ctx,
            project_id,
            run_start,
            source: Source::Unloaded,
        }
    }

    fn load(&self) -> Result<Vec<i64>> {
        let ids = self
            .ctx
            .store
            .read_open_issue_ids(self.run_start, self.project_id)?;
        tracing::debug!(
            project_id = self.project_id,
            count = ids.len(),
            "locally open issues to recheck"
        );
        Ok(ids)
    }
}

impl EntityCursor for ClosedSinceCursor<'_> {
    type Item = IssueSnapshot;

    fn next_item(&mut self) -> Result<Option<IssueSnapshot>> {
        let mut source = std::mem::replace(&mut self.source, Source::Exhausted);
        let next = source.next(|| self.load());
        self.source = source;
        match next? {
            Some(id) => fetch_issue(self.ctx, id).map(Some),
            None => Ok(None),
        }
    }

    fn has_more(&self) -> bool {
        self.source.has_more()
    }
}

/// Caller-supplied ids from the command line, fetched unconditionally.
pub struct ExplicitIdListCursor<'c> {
    ctx: &'c SyncContext<'c>,
    source: Source<i64>,
    ids: Vec<i64>,
}

impl<'c> ExplicitIdListCursor<'c> {
    pub fn new(ctx: &'c SyncContext<'c>, ids: Vec<i64>) -> Self {
        ExplicitIdListCursor {
            ctx,
            source: Source::Unloaded,
            ids,
        }
    }
}

impl EntityCursor for ExplicitIdListCursor<'_> {
    type Item = IssueSnapshot;

    fn next_item(&mut self) -> Result<Option<IssueSnapshot>> {
        let ids = std::mem::take(&mut self.ids);
        match self.source.next(|| Ok(ids))? {
            Some(id) => fetch_issue(self.ctx, id).map(Some),
            None => Ok(None),
        }
    }

    fn has_more(&self) -> bool {
        self.source.has_more()
    }
}

/// Ids read from a flat file, fetched unconditionally.
pub struct FileIdListCursor<'c> {
    ctx: &'c SyncContext<'c>,
    path: PathBuf,
    source: Source<i64>,
    ids: Vec<i64>,
}

impl<'c> FileIdListCursor<'c> {
    /// `ids` are the already validated contents of `path`.
    pub fn new(ctx: &'c SyncContext<'c>, path: &Path, ids: Vec<i64>) -> Self {
        FileIdListCursor {
            ctx,
            path: path.to_path_buf(),
            source: Source::Unloaded,
            ids,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntityCursor for FileIdListCursor<'_> {
    type Item = IssueSnapshot;

    fn next_item(&mut self) -> Result<Option<IssueSnapshot>> {
        let ids = std::mem::take(&mut self.ids);
        match self.source.next(|| Ok(ids))? {
            Some(id) => fetch_issue(self.ctx, id).map(Some),
            None => Ok(None),
        }
    }

    fn has_more(&self) -> bool {
        self.source.has_more()
    }
}

/// The issue cursor variants, selected when the run is assembled.
pub enum IssueCursor<'c> {
    Open(OpenIssueCursor<'c>),
    ClosedSince(ClosedSinceCursor<'c>),
    ExplicitIds(ExplicitIdListCursor<'c>),
    IdFile(FileIdListCursor<'c>),
}

impl EntityCursor for IssueCursor<'_> {
    type Item = IssueSnapshot;

    fn next_item(&mut self) -> Result<Option<IssueSnapshot>> {
        match self {
            IssueCursor::Open(c) => c.next_item(),
            IssueCursor::ClosedSince(c) => c.next_item(),
            IssueCursor::ExplicitIds(c) => c.next_item(),
            IssueCursor::IdFile(c) => c.next_item(),
        }
    }

    fn has_more(&self) -> bool {
        match self {
            IssueCursor::Open(c) => c.has_more(),
            IssueCursor::ClosedSince(c) => c.has_more(),
            IssueCursor::ExplicitIds(c) => c.has_more(),
            IssueCursor::IdFile(c) => c.has_more(),
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;

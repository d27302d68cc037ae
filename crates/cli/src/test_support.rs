// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory collaborators for engine tests.

#![allow(clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use bm_core::{
    Clock, Database, IssueSnapshot, LocalStore, ProjectSnapshot, RunRecord, UpsertOutcome,
};
use chrono::{DateTime, TimeZone, Utc};

use crate::auth::{AuthToken, Authenticator, Credentials};
use crate::error::{Error, Result};
use crate::remote::types::{
    AccountData, CustomFieldDefinitionData, HistoryData, IssueData, ObjectRef, ProjectData,
    ProjectVersionData,
};
use crate::remote::{Call, RemoteSource, TransportError, TransportResult};

pub const OPEN: i64 = 10;
pub const CLOSED: i64 = 90;

/// Hour `h` of a fixed test day.
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, hour, 0, 0).unwrap()
}

pub fn project(id: i64, name: &str, subprojects: Vec<ProjectData>) -> ProjectData {
    ProjectData {
        id,
        name: name.to_string(),
        enabled: true,
        status: Some(ObjectRef::new(10, "development")),
        subprojects,
        ..Default::default()
    }
}

pub fn issue(id: i64, project_id: i64, status_id: i64, updated: DateTime<Utc>) -> IssueData {
    let mut data = IssueData::new(id, project_id, &format!("issue {id}"), updated);
    data.status = Some(ObjectRef::new(status_id, "status"));
    data
}

/// Remote tracker holding projects and issues in memory.
///
/// Records every call as `method` or `method:arg` and the token each call
/// carried. `fail_on` makes the matching call return a transport error.
#[derive(Default)]
pub struct FakeRemote {
    pub projects: RefCell<Vec<ProjectData>>,
    pub versions: RefCell<HashMap<i64, Vec<ProjectVersionData>>>,
    pub categories: RefCell<HashMap<i64, Vec<String>>>,
    pub custom_fields: RefCell<HashMap<i64, Vec<CustomFieldDefinitionData>>>,
    pub users: RefCell<HashMap<i64, Vec<AccountData>>>,
    pub issues: RefCell<BTreeMap<i64, IssueData>>,
    pub history: RefCell<HashMap<i64, Vec<HistoryData>>>,
    pub access_level: i64,
    pub calls: RefCell<Vec<String>>,
    pub tokens: RefCell<Vec<Option<String>>>,
    pub fail_on: RefCell<Option<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        FakeRemote {
            access_level: 90,
            ..Default::default()
        }
    }

    pub fn with_projects(projects: Vec<ProjectData>) -> Self {
        let remote = FakeRemote::new();
        *remote.projects.borrow_mut() = projects;
        remote
    }

    pub fn put_issue(&self, data: IssueData) {
        self.issues.borrow_mut().insert(data.id, data);
    }

    pub fn fail_on(&self, call: &str) {
        *self.fail_on.borrow_mut() = Some(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &Call<'_>, entry: String) -> TransportResult<()> {
        self.tokens
            .borrow_mut()
            .push(call.token.map(|t| t.as_str().to_string()));
        let method = entry.split(':').next().unwrap_or_default().to_string();
        self.calls.borrow_mut().push(entry.clone());
        let fail = self.fail_on.borrow();
        if fail.as_deref() == Some(entry.as_str()) || fail.as_deref() == Some(method.as_str()) {
            return Err(TransportError::RequestFailed(format!("injected failure on {entry}")));
        }
        Ok(())
    }
}

impl RemoteSource for FakeRemote {
    fn login(&self, call: &Call<'_>) -> TransportResult<i64> {
        self.record(call, "mc_login".to_string())?;
        if call.credentials.password == "wrong" {
            return Err(TransportError::Fault {
                code: 401,
                message: "Access denied".to_string(),
            });
        }
        Ok(self.access_level)
    }

    fn list_projects(&self, call: &Call<'_>) -> TransportResult<Vec<ProjectData>> {
        self.record(call, "mc_projects_get_user_accessible".to_string())?;
        Ok(self.projects.borrow().clone())
    }

    fn get_project_versions(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<ProjectVersionData>> {
        self.record(call, format!("mc_project_get_versions:{project_id}"))?;
        Ok(self
            .versions
            .borrow()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_project_categories(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<String>> {
        self.record(call, format!("mc_project_get_categories:{project_id}"))?;
        Ok(self
            .categories
            .borrow()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_project_custom_fields(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<CustomFieldDefinitionData>> {
        self.record(call, format!("mc_project_get_custom_fields:{project_id}"))?;
        Ok(self
            .custom_fields
            .borrow()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_project_users(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<AccountData>> {
        self.record(call, format!("mc_project_get_users:{project_id}"))?;
        Ok(self
            .users
            .borrow()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_issue(&self, call: &Call<'_>, issue_id: i64) -> TransportResult<IssueData> {
        self.record(call, format!("mc_issue_get:{issue_id}"))?;
        self.issues
            .borrow()
            .get(&issue_id)
            .cloned()
            .ok_or_else(|| TransportError::Fault {
                code: 1100,
                message: format!("Issue {issue_id} not found"),
            })
    }

    fn list_open_issues(
        &self,
        call: &Call<'_>,
        project_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> TransportResult<Vec<IssueData>> {
        self.record(call, format!("mc_project_get_issues:{project_id}"))?;
        Ok(self
            .issues
            .borrow()
            .values()
            .filter(|i| i.project.id == project_id)
            .filter(|i| i.status.as_ref().map(|s| s.id) != Some(CLOSED))
            .filter(|i| since.is_none_or(|s| i.last_updated >= s))
            .cloned()
            .collect())
    }

    fn get_issue_history(
        &self,
        call: &Call<'_>,
        issue_id: i64,
    ) -> TransportResult<Vec<HistoryData>> {
        self.record(call, format!("mc_issue_get_history:{issue_id}"))?;
        Ok(self
            .history
            .borrow()
            .get(&issue_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Authenticator counting logins and releases.
#[derive(Default)]
pub struct FakeAuthenticator {
    pub token: Option<String>,
    pub reject: bool,
    pub fail_release: bool,
    pub authenticated: Cell<usize>,
    pub released: Cell<usize>,
}

impl FakeAuthenticator {
    pub fn with_token(token: &str) -> Self {
        FakeAuthenticator {
            token: Some(token.to_string()),
            ..Default::default()
        }
    }
}

impl Authenticator for FakeAuthenticator {
    fn authenticate(&self, _credentials: &Credentials) -> Result<Option<AuthToken>> {
        self.authenticated.set(self.authenticated.get() + 1);
        if self.reject {
            return Err(Error::Auth {
                reason: "invalid credentials".to_string(),
            });
        }
        Ok(self.token.as_deref().map(AuthToken::new))
    }

    fn release(&self, _token: &AuthToken) -> Result<()> {
        self.released.set(self.released.get() + 1);
        if self.fail_release {
            return Err(Error::Auth {
                reason: "logout refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Store wrapper counting cache invalidations and injecting write failures.
pub struct CountingStore {
    pub db: Database,
    pub invalidations: Cell<usize>,
    pub fail_issue: Cell<Option<i64>>,
    pub issue_writes: RefCell<Vec<i64>>,
}

impl CountingStore {
    pub fn new() -> Self {
        CountingStore {
            db: Database::open_in_memory().unwrap(),
            invalidations: Cell::new(0),
            fail_issue: Cell::new(None),
            issue_writes: RefCell::new(Vec::new()),
        }
    }
}

impl LocalStore for CountingStore {
    fn upsert_project(
        &self,
        snapshot: &ProjectSnapshot,
        synced_at: DateTime<Utc>,
    ) -> bm_core::Result<()> {
        self.db.upsert_project(snapshot, synced_at)
    }

    fn upsert_issue(
        &self,
        snapshot: &IssueSnapshot,
        synced_at: DateTime<Utc>,
    ) -> bm_core::Result<UpsertOutcome> {
        if self.fail_issue.get() == Some(snapshot.issue.id) {
            return Err(bm_core::Error::CorruptedData(format!(
                "injected write failure for issue {}",
                snapshot.issue.id
            )));
        }
        self.issue_writes.borrow_mut().push(snapshot.issue.id);
        self.db.upsert_issue(snapshot, synced_at)
    }

    fn read_last_successful_run_time(
        &self,
        project_id: i64,
    ) -> bm_core::Result<Option<DateTime<Utc>>> {
        self.db.read_last_successful_run_time(project_id)
    }

    fn read_open_issue_ids(
        &self,
        not_synced_since: DateTime<Utc>,
        project_id: i64,
    ) -> bm_core::Result<Vec<i64>> {
        self.db.read_open_issue_ids(not_synced_since, project_id)
    }

    fn record_runs(&self, runs: &[RunRecord]) -> bm_core::Result<()> {
        self.db.record_runs(runs)
    }

    fn invalidate_caches(&self) {
        self.invalidations.set(self.invalidations.get() + 1);
        self.db.invalidate_caches();
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

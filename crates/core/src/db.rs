// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed mirror of remote projects and issues.
//!
//! The [`Database`] struct implements [`LocalStore`] and provides the read
//! helpers used by `bugmirror status` and the tests.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::cache::{CacheKey, ReferenceCache};
use crate::clock::format_timestamp;
use crate::error::{Error, Result};
use crate::model::{
    Account, CustomField, CustomFieldValue, HistoryEntry, Issue, IssueSnapshot, Named, Note,
    Project, ProjectSnapshot, RefKind, Version,
};
use crate::store::{LocalStore, RunRecord, UpsertOutcome};

/// Status id the remote tracker uses for closed issues.
pub const DEFAULT_CLOSED_STATUS_ID: i64 = 90;

/// SQL schema for the mirror database.
pub const SCHEMA: &str = r#"
-- {id, name} values keyed by family (status, priority, ...)
CREATE TABLE IF NOT EXISTS reference_values (
    kind TEXT NOT NULL,
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (kind, id)
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    real_name TEXT,
    email TEXT
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    status_id INTEGER,
    enabled INTEGER NOT NULL DEFAULT 1,
    view_state_id INTEGER,
    access_min INTEGER,
    description TEXT,
    last_sync TEXT NOT NULL
);

-- Parent links reference ids only; the parent may be mirrored later or never
CREATE TABLE IF NOT EXISTS project_hierarchy (
    child_id INTEGER PRIMARY KEY,
    parent_id INTEGER NOT NULL,
    FOREIGN KEY (child_id) REFERENCES projects(id),
    CHECK (child_id != parent_id)
);

-- One row per version visible to a project. Subprojects also list the
-- versions they inherit, so the same version id appears under several
-- projects; owner_project_id is the project that defines it.
CREATE TABLE IF NOT EXISTS project_versions (
    project_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    owner_project_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    released INTEGER NOT NULL DEFAULT 0,
    obsolete INTEGER NOT NULL DEFAULT 0,
    date_order TEXT,
    PRIMARY KEY (project_id, id),
    FOREIGN KEY (project_id) REFERENCES projects(id)
);

CREATE TABLE IF NOT EXISTS project_categories (
    project_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (project_id, name),
    FOREIGN KEY (project_id) REFERENCES projects(id)
);

CREATE TABLE IF NOT EXISTS custom_fields (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    type_id INTEGER,
    possible_values TEXT,
    default_value TEXT,
    valid_regexp TEXT
);

CREATE TABLE IF NOT EXISTS project_custom_fields (
    project_id INTEGER NOT NULL,
    field_id INTEGER NOT NULL,
    PRIMARY KEY (project_id, field_id),
    FOREIGN KEY (project_id) REFERENCES projects(id),
    FOREIGN KEY (field_id) REFERENCES custom_fields(id)
);

CREATE TABLE IF NOT EXISTS project_users (
    project_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    PRIMARY KEY (project_id, user_id),
    FOREIGN KEY (project_id) REFERENCES projects(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- Issues reference their project by id only (explicit id runs may mirror
-- issues of projects outside the synced set)
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    reporter_id INTEGER,
    handler_id INTEGER,
    priority_id INTEGER,
    severity_id INTEGER,
    status_id INTEGER,
    resolution_id INTEGER,
    view_state_id INTEGER,
    summary TEXT NOT NULL,
    description TEXT,
    steps_to_reproduce TEXT,
    additional_information TEXT,
    platform TEXT,
    version TEXT,
    fixed_in_version TEXT,
    target_version TEXT,
    category TEXT,
    date_submitted TEXT,
    last_updated TEXT NOT NULL,
    last_sync TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS issue_notes (
    id INTEGER PRIMARY KEY,
    issue_id INTEGER NOT NULL,
    reporter_id INTEGER,
    text TEXT NOT NULL,
    view_state_id INTEGER,
    date_submitted TEXT,
    last_modified TEXT,
    FOREIGN KEY (issue_id) REFERENCES issues(id)
);

CREATE TABLE IF NOT EXISTS issue_custom_field_values (
    issue_id INTEGER NOT NULL,
    field_id INTEGER NOT NULL,
    value TEXT,
    PRIMARY KEY (issue_id, field_id),
    FOREIGN KEY (issue_id) REFERENCES issues(id),
    FOREIGN KEY (field_id) REFERENCES custom_fields(id)
);

CREATE TABLE IF NOT EXISTS issue_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL,
    user_id INTEGER,
    date_modified TEXT NOT NULL,
    field_name TEXT NOT NULL,
    change_type INTEGER NOT NULL,
    old_value TEXT,
    new_value TEXT,
    FOREIGN KEY (issue_id) REFERENCES issues(id)
);

-- Completed delta runs; MAX(started_at) per project is the watermark
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_issues_project_sync ON issues(project_id, last_sync);
CREATE INDEX IF NOT EXISTS idx_notes_issue ON issue_notes(issue_id);
CREATE INDEX IF NOT EXISTS idx_history_issue ON issue_history(issue_id);
CREATE INDEX IF NOT EXISTS idx_versions_project ON project_versions(project_id);
CREATE INDEX IF NOT EXISTS idx_sync_runs_project ON sync_runs(project_id, started_at);
"#;

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

/// Parse an optional RFC3339 timestamp from the database.
fn parse_timestamp_opt(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}

fn format_opt(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(format_timestamp)
}

/// Run schema creation on a database connection.
///
/// Every statement is idempotent, so this is safe on an existing mirror.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    migrate_version_links(conn)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Migration: key versions by `(project_id, id)`.
///
/// Older mirrors keyed versions by id alone. The key cannot be altered in
/// place, so the table is dropped and refilled by the next project sync.
fn migrate_version_links(conn: &Connection) -> Result<()> {
    let has_owner: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('project_versions')
             WHERE name = 'owner_project_id'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_owner {
        conn.execute("DROP TABLE IF EXISTS project_versions", [])?;
    }
    Ok(())
}

/// Shared rows touched inside one entity transaction.
///
/// Keys of rows written here are staged and only published to the cache
/// once the transaction commits.
struct Staging<'c> {
    conn: &'c Connection,
    cache: &'c ReferenceCache,
    staged: Vec<(CacheKey, Option<String>)>,
}

impl<'c> Staging<'c> {
    fn new(conn: &'c Connection, cache: &'c ReferenceCache) -> Self {
        Staging {
            conn,
            cache,
            staged: Vec::new(),
        }
    }

    fn reference(&mut self, kind: RefKind, value: Option<&Named>) -> Result<Option<i64>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let key = CacheKey::Reference(kind, value.id);
        if !self.cache.contains_named(key, &value.name) {
            self.conn.execute(
                "INSERT INTO reference_values (kind, id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind, id) DO UPDATE SET name = excluded.name",
                params![kind.as_str(), value.id, value.name],
            )?;
            self.staged.push((key, Some(value.name.clone())));
        }
        Ok(Some(value.id))
    }

    /// Insert a referenced user if it is not mirrored yet.
    fn user_ref(&mut self, account: Option<&Account>) -> Result<Option<i64>> {
        let Some(account) = account else {
            return Ok(None);
        };
        let key = CacheKey::User(account.id);
        if !self.cache.contains(key) {
            self.conn.execute(
                "INSERT OR IGNORE INTO users (id, name, real_name, email) VALUES (?1, ?2, ?3, ?4)",
                params![account.id, account.name, account.real_name, account.email],
            )?;
            self.staged.push((key, None));
        }
        Ok(Some(account.id))
    }

    /// Insert or refresh a user from an authoritative user list.
    fn user(&mut self, account: &Account) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, real_name, email) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, real_name = excluded.real_name, email = excluded.email",
            params![account.id, account.name, account.real_name, account.email],
        )?;
        self.staged.push((CacheKey::User(account.id), None));
        Ok(())
    }

    /// Insert a custom field referenced by an issue value if it is not mirrored yet.
    fn custom_field_ref(&mut self, field: &Named) -> Result<()> {
        let key = CacheKey::CustomField(field.id);
        if !self.cache.contains(key) {
            self.conn.execute(
                "INSERT OR IGNORE INTO custom_fields (id, name) VALUES (?1, ?2)",
                params![field.id, field.name],
            )?;
            self.staged.push((key, None));
        }
        Ok(())
    }

    /// Insert or refresh a custom field definition.
    fn custom_field(&mut self, field: &CustomField) -> Result<()> {
        self.conn.execute(
            "INSERT INTO custom_fields (id, name, type_id, possible_values, default_value, valid_regexp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, type_id = excluded.type_id,
                possible_values = excluded.possible_values,
                default_value = excluded.default_value, valid_regexp = excluded.valid_regexp",
            params![
                field.id,
                field.name,
                field.type_id,
                field.possible_values,
                field.default_value,
                field.valid_regexp,
            ],
        )?;
        self.staged.push((CacheKey::CustomField(field.id), None));
        Ok(())
    }

    fn into_staged(self) -> Vec<(CacheKey, Option<String>)> {
        self.staged
    }
}

/// SQLite database connection with mirror operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
    cache: ReferenceCache,
    closed_status_id: i64,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database::from_connection(conn);
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database::from_connection(conn);
        run_migrations(&db.conn)?;
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Self {
        Database {
            conn,
            cache: ReferenceCache::new(),
            closed_status_id: DEFAULT_CLOSED_STATUS_ID,
        }
    }

    /// Use a different status id as "closed" for the closed-since scan.
    pub fn with_closed_status_id(mut self, status_id: i64) -> Self {
        self.closed_status_id = status_id;
        self
    }

    pub fn closed_status_id(&self) -> i64 {
        self.closed_status_id
    }

    /// The read-through cache of shared rows.
    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    fn write_project(&self, snapshot: &ProjectSnapshot, synced_at: DateTime<Utc>) -> Result<()> {
        let project = &snapshot.project;
        let tx = self.conn.unchecked_transaction()?;
        let mut staging = Staging::new(&tx, &self.cache);

        let status_id = staging.reference(RefKind::ProjectStatus, project.status.as_ref())?;
        let view_state_id = staging.reference(RefKind::ViewState, project.view_state.as_ref())?;

        tx.execute(
            "INSERT INTO projects (id, name, status_id, enabled, view_state_id, access_min,
             description, last_sync)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, status_id = excluded.status_id,
                enabled = excluded.enabled, view_state_id = excluded.view_state_id,
                access_min = excluded.access_min, description = excluded.description,
                last_sync = excluded.last_sync",
            params![
                project.id,
                project.name,
                status_id,
                project.enabled,
                view_state_id,
                project.access_min,
                project.description,
                format_timestamp(synced_at),
            ],
        )?;

        tx.execute(
            "DELETE FROM project_hierarchy WHERE child_id = ?1",
            params![project.id],
        )?;
        if let Some(parent_id) = project.parent_id {
            tx.execute(
                "INSERT INTO project_hierarchy (child_id, parent_id) VALUES (?1, ?2)",
                params![project.id, parent_id],
            )?;
        }

        tx.execute(
            "DELETE FROM project_versions WHERE project_id = ?1",
            params![project.id],
        )?;
        for version in &snapshot.versions {
            tx.execute(
                "INSERT INTO project_versions (project_id, id, owner_project_id, name,
                 description, released, obsolete, date_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    project.id,
                    version.id,
                    version.project_id,
                    version.name,
                    version.description,
                    version.released,
                    version.obsolete,
                    format_opt(version.date_order),
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM project_categories WHERE project_id = ?1",
            params![project.id],
        )?;
        for category in &snapshot.categories {
            tx.execute(
                "INSERT OR IGNORE INTO project_categories (project_id, name) VALUES (?1, ?2)",
                params![project.id, category],
            )?;
        }

        tx.execute(
            "DELETE FROM project_custom_fields WHERE project_id = ?1",
            params![project.id],
        )?;
        for field in &snapshot.custom_fields {
            staging.custom_field(field)?;
            tx.execute(
                "INSERT OR IGNORE INTO project_custom_fields (project_id, field_id) VALUES (?1, ?2)",
                params![project.id, field.id],
            )?;
        }

        tx.execute(
            "DELETE FROM project_users WHERE project_id = ?1",
            params![project.id],
        )?;
        for account in &snapshot.users {
            staging.user(account)?;
            tx.execute(
                "INSERT OR IGNORE INTO project_users (project_id, user_id) VALUES (?1, ?2)",
                params![project.id, account.id],
            )?;
        }

        let staged = staging.into_staged();
        tx.commit()?;
        self.cache.publish(staged);

        tracing::debug!(
            project_id = project.id,
            versions = snapshot.versions.len(),
            categories = snapshot.categories.len(),
            custom_fields = snapshot.custom_fields.len(),
            users = snapshot.users.len(),
            "project mirrored"
        );
        Ok(())
    }

    fn write_issue(
        &self,
        snapshot: &IssueSnapshot,
        synced_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let issue = &snapshot.issue;
        let synced = format_timestamp(synced_at);
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT last_updated FROM issues WHERE id = ?1",
                params![issue.id],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            None => UpsertOutcome::Inserted,
            Some(stored) => {
                let stored = parse_timestamp(&stored, "last_updated")?;
                if stored > issue.last_updated {
                    UpsertOutcome::Stale
                } else {
                    UpsertOutcome::Updated
                }
            }
        };

        if outcome == UpsertOutcome::Stale {
            tx.execute(
                "UPDATE issues SET last_sync = ?1 WHERE id = ?2",
                params![synced, issue.id],
            )?;
            tx.commit()?;
            tracing::debug!(issue_id = issue.id, "kept newer mirrored issue");
            return Ok(outcome);
        }

        let mut staging = Staging::new(&tx, &self.cache);
        let reporter_id = staging.user_ref(issue.reporter.as_ref())?;
        let handler_id = staging.user_ref(issue.handler.as_ref())?;
        let priority_id = staging.reference(RefKind::Priority, issue.priority.as_ref())?;
        let severity_id = staging.reference(RefKind::Severity, issue.severity.as_ref())?;
        let status_id = staging.reference(RefKind::Status, issue.status.as_ref())?;
        let resolution_id = staging.reference(RefKind::Resolution, issue.resolution.as_ref())?;
        let view_state_id = staging.reference(RefKind::ViewState, issue.view_state.as_ref())?;

        tx.execute(
            "INSERT INTO issues (id, project_id, reporter_id, handler_id, priority_id,
             severity_id, status_id, resolution_id, view_state_id, summary, description,
             steps_to_reproduce, additional_information, platform, version, fixed_in_version,
             target_version, category, date_submitted, last_updated, last_sync)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id, reporter_id = excluded.reporter_id,
                handler_id = excluded.handler_id, priority_id = excluded.priority_id,
                severity_id = excluded.severity_id, status_id = excluded.status_id,
                resolution_id = excluded.resolution_id, view_state_id = excluded.view_state_id,
                summary = excluded.summary, description = excluded.description,
                steps_to_reproduce = excluded.steps_to_reproduce,
                additional_information = excluded.additional_information,
                platform = excluded.platform, version = excluded.version,
                fixed_in_version = excluded.fixed_in_version,
                target_version = excluded.target_version, category = excluded.category,
                date_submitted = excluded.date_submitted, last_updated = excluded.last_updated,
                last_sync = excluded.last_sync",
            params![
                issue.id,
                issue.project_id,
                reporter_id,
                handler_id,
                priority_id,
                severity_id,
                status_id,
                resolution_id,
                view_state_id,
                issue.summary,
                issue.description,
                issue.steps_to_reproduce,
                issue.additional_information,
                issue.platform,
                issue.version,
                issue.fixed_in_version,
                issue.target_version,
                issue.category,
                format_opt(issue.date_submitted),
                format_timestamp(issue.last_updated),
                synced,
            ],
        )?;

        tx.execute(
            "DELETE FROM issue_notes WHERE issue_id = ?1",
            params![issue.id],
        )?;
        for note in &snapshot.notes {
            let reporter_id = staging.user_ref(note.reporter.as_ref())?;
            let view_state_id = staging.reference(RefKind::ViewState, note.view_state.as_ref())?;
            tx.execute(
                "INSERT OR REPLACE INTO issue_notes (id, issue_id, reporter_id, text,
                 view_state_id, date_submitted, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    note.id,
                    issue.id,
                    reporter_id,
                    note.text,
                    view_state_id,
                    format_opt(note.date_submitted),
                    format_opt(note.last_modified),
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM issue_custom_field_values WHERE issue_id = ?1",
            params![issue.id],
        )?;
        for value in &snapshot.custom_fields {
            staging.custom_field_ref(&value.field)?;
            tx.execute(
                "INSERT OR REPLACE INTO issue_custom_field_values (issue_id, field_id, value)
                 VALUES (?1, ?2, ?3)",
                params![issue.id, value.field.id, value.value],
            )?;
        }

        tx.execute(
            "DELETE FROM issue_history WHERE issue_id = ?1",
            params![issue.id],
        )?;
        for entry in &snapshot.history {
            let user_id = staging.user_ref(entry.user.as_ref())?;
            tx.execute(
                "INSERT INTO issue_history (issue_id, user_id, date_modified, field_name,
                 change_type, old_value, new_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    issue.id,
                    user_id,
                    format_timestamp(entry.date),
                    entry.field,
                    entry.change_type,
                    entry.old_value,
                    entry.new_value,
                ],
            )?;
        }

        let staged = staging.into_staged();
        tx.commit()?;
        self.cache.publish(staged);

        tracing::debug!(
            issue_id = issue.id,
            ?outcome,
            notes = snapshot.notes.len(),
            custom_fields = snapshot.custom_fields.len(),
            history = snapshot.history.len(),
            "issue mirrored"
        );
        Ok(outcome)
    }

    /// Get a reference value by kind and id.
    pub fn get_reference(&self, kind: RefKind, id: i64) -> Result<Option<Named>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM reference_values WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.map(|name| Named { id, name }))
    }

    fn reference_opt(&self, kind: RefKind, id: Option<i64>) -> Result<Option<Named>> {
        match id {
            Some(id) => self.get_reference(kind, id),
            None => Ok(None),
        }
    }

    /// Get a mirrored user by id.
    pub fn get_user(&self, id: i64) -> Result<Option<Account>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, real_name, email FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        real_name: row.get(2)?,
                        email: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn user_opt(&self, id: Option<i64>) -> Result<Option<Account>> {
        match id {
            Some(id) => self.get_user(id),
            None => Ok(None),
        }
    }

    /// Get a mirrored project by id, including its parent link.
    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT p.id, p.name, p.status_id, p.enabled, p.view_state_id, p.access_min,
                        p.description, h.parent_id
                 FROM projects p LEFT JOIN project_hierarchy h ON h.child_id = p.id
                 WHERE p.id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<i64>>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, status_id, enabled, view_state_id, access_min, description, parent_id)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(Project {
            id,
            name,
            status: self.reference_opt(RefKind::ProjectStatus, status_id)?,
            enabled,
            view_state: self.reference_opt(RefKind::ViewState, view_state_id)?,
            access_min,
            description,
            parent_id,
        }))
    }

    /// Get the versions of a project, ordered by id.
    pub fn get_versions(&self, project_id: i64) -> Result<Vec<Version>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_project_id, name, description, released, obsolete, date_order
             FROM project_versions WHERE project_id = ?1 ORDER BY id",
        )?;

        let versions = stmt
            .query_map(params![project_id], |row| {
                let date_order: Option<String> = row.get(6)?;
                Ok(Version {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    released: row.get(4)?,
                    obsolete: row.get(5)?,
                    date_order: parse_timestamp_opt(date_order, "date_order")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// Get the category names of a project, sorted.
    pub fn get_categories(&self, project_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM project_categories WHERE project_id = ?1 ORDER BY name")?;

        let categories = stmt
            .query_map(params![project_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(categories)
    }

    /// Get the custom field definitions linked to a project.
    pub fn get_project_custom_fields(&self, project_id: i64) -> Result<Vec<CustomField>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, f.type_id, f.possible_values, f.default_value, f.valid_regexp
             FROM custom_fields f JOIN project_custom_fields pf ON pf.field_id = f.id
             WHERE pf.project_id = ?1 ORDER BY f.id",
        )?;

        let fields = stmt
            .query_map(params![project_id], |row| {
                Ok(CustomField {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    type_id: row.get(2)?,
                    possible_values: row.get(3)?,
                    default_value: row.get(4)?,
                    valid_regexp: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(fields)
    }

    /// Get the users assigned to a project.
    pub fn get_project_users(&self, project_id: i64) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.real_name, u.email
             FROM users u JOIN project_users pu ON pu.user_id = u.id
             WHERE pu.project_id = ?1 ORDER BY u.id",
        )?;

        let users = stmt
            .query_map(params![project_id], |row| {
                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    real_name: row.get(2)?,
                    email: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Get a mirrored issue by id.
    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        struct Row {
            issue: Issue,
            reporter_id: Option<i64>,
            handler_id: Option<i64>,
            refs: [Option<i64>; 5],
        }

        let row = self
            .conn
            .query_row(
                "SELECT id, project_id, reporter_id, handler_id, priority_id, severity_id,
                        status_id, resolution_id, view_state_id, summary, description,
                        steps_to_reproduce, additional_information, platform, version,
                        fixed_in_version, target_version, category, date_submitted, last_updated
                 FROM issues WHERE id = ?1",
                params![id],
                |row| {
                    let date_submitted: Option<String> = row.get(18)?;
                    let last_updated: String = row.get(19)?;
                    let mut issue = Issue::new(
                        row.get(0)?,
                        row.get(1)?,
                        row.get::<_, String>(9)?,
                        parse_timestamp(&last_updated, "last_updated")?,
                    );
                    issue.description = row.get(10)?;
                    issue.steps_to_reproduce = row.get(11)?;
                    issue.additional_information = row.get(12)?;
                    issue.platform = row.get(13)?;
                    issue.version = row.get(14)?;
                    issue.fixed_in_version = row.get(15)?;
                    issue.target_version = row.get(16)?;
                    issue.category = row.get(17)?;
                    issue.date_submitted = parse_timestamp_opt(date_submitted, "date_submitted")?;
                    Ok(Row {
                        issue,
                        reporter_id: row.get(2)?,
                        handler_id: row.get(3)?,
                        refs: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
                    })
                },
            )
            .optional()?;

        let Some(Row {
            mut issue,
            reporter_id,
            handler_id,
            refs: [priority, severity, status, resolution, view_state],
        }) = row
        else {
            return Ok(None);
        };

        issue.reporter = self.user_opt(reporter_id)?;
        issue.handler = self.user_opt(handler_id)?;
        issue.priority = self.reference_opt(RefKind::Priority, priority)?;
        issue.severity = self.reference_opt(RefKind::Severity, severity)?;
        issue.status = self.reference_opt(RefKind::Status, status)?;
        issue.resolution = self.reference_opt(RefKind::Resolution, resolution)?;
        issue.view_state = self.reference_opt(RefKind::ViewState, view_state)?;
        Ok(Some(issue))
    }

    /// When the issue was last written by a sync, if it is mirrored.
    pub fn issue_last_sync(&self, id: i64) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT last_sync FROM issues WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parse_timestamp_opt(value, "last_sync")?)
    }

    /// Get all notes of an issue, ordered by id.
    pub fn get_notes(&self, issue_id: i64) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, reporter_id, text, view_state_id, date_submitted, last_modified
             FROM issue_notes WHERE issue_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![issue_id], |row| {
                let date_submitted: Option<String> = row.get(4)?;
                let last_modified: Option<String> = row.get(5)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    parse_timestamp_opt(date_submitted, "date_submitted")?,
                    parse_timestamp_opt(last_modified, "last_modified")?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, reporter_id, text, view_state_id, date_submitted, last_modified)| {
                    Ok(Note {
                        id,
                        reporter: self.user_opt(reporter_id)?,
                        text,
                        view_state: self.reference_opt(RefKind::ViewState, view_state_id)?,
                        date_submitted,
                        last_modified,
                    })
                },
            )
            .collect()
    }

    /// Get the custom field values of an issue, ordered by field id.
    pub fn get_custom_field_values(&self, issue_id: i64) -> Result<Vec<CustomFieldValue>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, v.value
             FROM issue_custom_field_values v JOIN custom_fields f ON f.id = v.field_id
             WHERE v.issue_id = ?1 ORDER BY f.id",
        )?;

        let values = stmt
            .query_map(params![issue_id], |row| {
                Ok(CustomFieldValue {
                    field: Named {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    },
                    value: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(values)
    }

    /// Get the history of an issue in insertion order.
    pub fn get_history(&self, issue_id: i64) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, date_modified, field_name, change_type, old_value, new_value
             FROM issue_history WHERE issue_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![issue_id], |row| {
                let date: String = row.get(1)?;
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    parse_timestamp(&date, "date_modified")?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(user_id, date, field, change_type, old_value, new_value)| {
                Ok(HistoryEntry {
                    date,
                    user: self.user_opt(user_id)?,
                    field,
                    change_type,
                    old_value,
                    new_value,
                })
            })
            .collect()
    }

    /// Count mirrored projects.
    pub fn count_projects(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count mirrored issues, optionally within one project.
    pub fn count_issues(&self, project_id: Option<i64>) -> Result<i64> {
        let count = match project_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM issues WHERE project_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Latest completed run per project, ordered by project id.
    pub fn latest_runs(&self) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, MAX(started_at), MAX(finished_at)
             FROM sync_runs GROUP BY project_id ORDER BY project_id",
        )?;

        let runs = stmt
            .query_map([], |row| {
                let started: String = row.get(1)?;
                let finished: String = row.get(2)?;
                Ok(RunRecord {
                    project_id: row.get(0)?,
                    started_at: parse_timestamp(&started, "started_at")?,
                    finished_at: parse_timestamp(&finished, "finished_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

impl LocalStore for Database {
    fn upsert_project(&self, snapshot: &ProjectSnapshot, synced_at: DateTime<Utc>) -> Result<()> {
        self.write_project(snapshot, synced_at)
    }

    fn upsert_issue(
        &self,
        snapshot: &IssueSnapshot,
        synced_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        self.write_issue(snapshot, synced_at)
    }

    fn read_last_successful_run_time(&self, project_id: i64) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self.conn.query_row(
            "SELECT MAX(started_at) FROM sync_runs WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(parse_timestamp_opt(value, "started_at")?)
    }

    fn read_open_issue_ids(
        &self,
        not_synced_since: DateTime<Utc>,
        project_id: i64,
    ) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM issues
             WHERE project_id = ?1
               AND (status_id IS NULL OR status_id != ?2)
               AND last_sync < ?3
             ORDER BY id",
        )?;

        let ids = stmt
            .query_map(
                params![
                    project_id,
                    self.closed_status_id,
                    format_timestamp(not_synced_since)
                ],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    fn record_runs(&self, runs: &[RunRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for run in runs {
            tx.execute(
                "INSERT INTO sync_runs (project_id, started_at, finished_at) VALUES (?1, ?2, ?3)",
                params![
                    run.project_id,
                    format_timestamp(run.started_at),
                    format_timestamp(run.finished_at),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn invalidate_caches(&self) {
        let evicted = self.cache.len();
        self.cache.clear();
        tracing::debug!(evicted, "mirror caches invalidated");
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;

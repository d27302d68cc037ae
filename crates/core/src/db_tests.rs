// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use tempfile::TempDir;
use yare::parameterized;

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
}

fn test_project(id: i64) -> ProjectSnapshot {
    let mut project = Project::new(id, format!("project-{id}"));
    project.status = Some(Named::new(10, "development"));
    project.view_state = Some(Named::new(10, "public"));
    project.access_min = Some(10);
    ProjectSnapshot {
        project,
        versions: vec![Version {
            id: id * 100 + 1,
            project_id: Some(id),
            name: "1.0".to_string(),
            description: None,
            released: true,
            obsolete: false,
            date_order: Some(ts(1)),
        }],
        categories: vec!["General".to_string(), "UI".to_string()],
        custom_fields: vec![CustomField {
            id: 5,
            name: "Customer".to_string(),
            type_id: Some(0),
            possible_values: None,
            default_value: None,
            valid_regexp: None,
        }],
        users: vec![Account::new(1, "alice"), Account::new(2, "bob")],
    }
}

fn test_issue(id: i64, project_id: i64, status_id: i64, updated: DateTime<Utc>) -> IssueSnapshot {
    let mut issue = Issue::new(id, project_id, format!("issue {id}"), updated);
    issue.status = Some(Named::new(status_id, format!("status-{status_id}")));
    issue.priority = Some(Named::new(30, "normal"));
    issue.reporter = Some(Account::new(1, "alice"));
    IssueSnapshot {
        issue,
        notes: vec![Note {
            id: id * 10,
            reporter: Some(Account::new(2, "bob")),
            text: "first note".to_string(),
            view_state: Some(Named::new(10, "public")),
            date_submitted: Some(updated),
            last_modified: Some(updated),
        }],
        custom_fields: vec![CustomFieldValue {
            field: Named::new(5, "Customer"),
            value: Some("ACME".to_string()),
        }],
        history: vec![HistoryEntry {
            date: updated,
            user: Some(Account::new(1, "alice")),
            field: "status".to_string(),
            change_type: 0,
            old_value: Some("10".to_string()),
            new_value: Some(status_id.to_string()),
        }],
    }
}

#[test]
fn open_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("mirror.db");

    let db = Database::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(db.count_issues(None).unwrap(), 0);
}

#[test]
fn reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mirror.db");

    {
        let db = Database::open(&path).unwrap();
        db.upsert_project(&test_project(1), ts(2)).unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.count_projects().unwrap(), 1);
}

#[test]
fn upsert_project_writes_children() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_project(&test_project(1), ts(2)).unwrap();

    let project = db.get_project(1).unwrap().unwrap();
    assert_eq!(project.name, "project-1");
    assert_eq!(project.status, Some(Named::new(10, "development")));
    assert_eq!(project.view_state, Some(Named::new(10, "public")));
    assert_eq!(project.access_min, Some(10));
    assert_eq!(project.parent_id, None);

    let versions = db.get_versions(1).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].date_order, Some(ts(1)));
    assert_eq!(db.get_categories(1).unwrap(), vec!["General", "UI"]);
    assert_eq!(db.get_project_custom_fields(1).unwrap()[0].name, "Customer");
    assert_eq!(db.get_project_users(1).unwrap().len(), 2);
}

#[test]
fn upsert_project_replaces_children() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_project(&test_project(1), ts(2)).unwrap();

    let mut snapshot = test_project(1);
    snapshot.categories = vec!["Backend".to_string()];
    snapshot.users = vec![Account::new(2, "bob")];
    snapshot.versions.clear();
    db.upsert_project(&snapshot, ts(3)).unwrap();

    assert_eq!(db.get_categories(1).unwrap(), vec!["Backend"]);
    assert_eq!(db.get_project_users(1).unwrap().len(), 1);
    assert!(db.get_versions(1).unwrap().is_empty());
    // Shared user rows outlive the project link
    assert!(db.get_user(1).unwrap().is_some());
}

#[test]
fn upsert_project_records_parent_link() {
    let db = Database::open_in_memory().unwrap();
    let mut child = test_project(2);
    child.project.parent_id = Some(1);
    child.versions.clear();

    // Parent not mirrored yet is fine
    db.upsert_project(&child, ts(2)).unwrap();
    assert_eq!(db.get_project(2).unwrap().unwrap().parent_id, Some(1));
}

#[test]
fn inherited_version_is_listed_under_each_project() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_project(&test_project(1), ts(2)).unwrap();

    let mut child = test_project(2);
    child.project.parent_id = Some(1);
    child.versions = test_project(1).versions;
    db.upsert_project(&child, ts(2)).unwrap();

    let inherited = db.get_versions(2).unwrap();
    assert_eq!(inherited.len(), 1);
    assert_eq!(inherited[0].id, 101);
    assert_eq!(inherited[0].project_id, Some(1));
    assert_eq!(db.get_versions(1).unwrap().len(), 1);

    // Replacing the child's list leaves the parent's rows alone
    child.versions.clear();
    db.upsert_project(&child, ts(3)).unwrap();
    assert!(db.get_versions(2).unwrap().is_empty());
    assert_eq!(db.get_versions(1).unwrap()[0].project_id, Some(1));
}

#[test]
fn version_table_keyed_by_id_is_rebuilt() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE project_versions (id INTEGER PRIMARY KEY, project_id INTEGER NOT NULL,
         name TEXT NOT NULL);
         INSERT INTO project_versions (id, project_id, name) VALUES (101, 1, '1.0');",
    )
    .unwrap();

    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();

    let has_owner: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('project_versions')
             WHERE name = 'owner_project_id'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(has_owner);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM project_versions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn self_parent_rolls_back_project() {
    let db = Database::open_in_memory().unwrap();
    let mut snapshot = test_project(1);
    snapshot.project.parent_id = Some(1);

    assert!(db.upsert_project(&snapshot, ts(2)).is_err());
    assert!(db.get_project(1).unwrap().is_none());
}

#[test]
fn failing_child_write_rolls_back_whole_project() {
    let db = Database::open_in_memory().unwrap();
    let mut snapshot = test_project(1);
    let duplicate = snapshot.versions[0].clone();
    snapshot.versions.push(duplicate);

    assert!(db.upsert_project(&snapshot, ts(2)).is_err());

    assert!(db.get_project(1).unwrap().is_none());
    assert!(db.get_versions(1).unwrap().is_empty());
    assert!(db.get_categories(1).unwrap().is_empty());
    assert!(db.get_user(1).unwrap().is_none());
    // Rolled back rows are not published to the cache
    assert!(!db.cache().contains(CacheKey::User(1)));
    assert!(!db
        .cache()
        .contains(CacheKey::Reference(RefKind::ProjectStatus, 10)));
}

#[test]
fn failing_child_write_keeps_previous_project_state() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_project(&test_project(1), ts(2)).unwrap();

    let mut snapshot = test_project(1);
    snapshot.project.name = "renamed".to_string();
    let duplicate = snapshot.versions[0].clone();
    snapshot.versions.push(duplicate);
    assert!(db.upsert_project(&snapshot, ts(3)).is_err());

    let project = db.get_project(1).unwrap().unwrap();
    assert_eq!(project.name, "project-1");
    assert_eq!(db.get_versions(1).unwrap().len(), 1);
}

#[test]
fn upsert_issue_inserts_then_updates() {
    let db = Database::open_in_memory().unwrap();

    let outcome = db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let outcome = db.upsert_issue(&test_issue(7, 1, 50, ts(3)), ts(4)).unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let issue = db.get_issue(7).unwrap().unwrap();
    assert_eq!(issue.status_id(), Some(50));
    assert_eq!(issue.last_updated, ts(3));
    assert_eq!(issue.reporter.unwrap().name, "alice");
    assert_eq!(issue.priority, Some(Named::new(30, "normal")));
    assert_eq!(db.issue_last_sync(7).unwrap(), Some(ts(4)));
}

#[test]
fn upsert_issue_writes_children() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();

    let notes = db.get_notes(7).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].reporter.as_ref().unwrap().name, "bob");
    assert_eq!(notes[0].view_state, Some(Named::new(10, "public")));

    let values = db.get_custom_field_values(7).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value.as_deref(), Some("ACME"));

    let history = db.get_history(7).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].field, "status");
    assert_eq!(history[0].date, ts(1));
}

#[test]
fn upsert_issue_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let snapshot = test_issue(7, 1, 10, ts(1));

    db.upsert_issue(&snapshot, ts(2)).unwrap();
    let first = db.get_issue(7).unwrap();
    let outcome = db.upsert_issue(&snapshot, ts(2)).unwrap();

    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(db.get_issue(7).unwrap(), first);
    assert_eq!(db.get_notes(7).unwrap().len(), 1);
    assert_eq!(db.get_custom_field_values(7).unwrap().len(), 1);
    assert_eq!(db.get_history(7).unwrap().len(), 1);
    assert_eq!(db.count_issues(None).unwrap(), 1);
}

#[test]
fn upsert_issue_replaces_removed_notes() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();

    let mut snapshot = test_issue(7, 1, 10, ts(3));
    snapshot.notes.clear();
    db.upsert_issue(&snapshot, ts(4)).unwrap();

    assert!(db.get_notes(7).unwrap().is_empty());
}

#[test]
fn older_snapshot_keeps_data_and_stamps_sync() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 50, ts(5)), ts(6)).unwrap();

    let outcome = db.upsert_issue(&test_issue(7, 1, 10, ts(3)), ts(8)).unwrap();

    assert_eq!(outcome, UpsertOutcome::Stale);
    let issue = db.get_issue(7).unwrap().unwrap();
    assert_eq!(issue.status_id(), Some(50));
    assert_eq!(issue.last_updated, ts(5));
    assert_eq!(db.issue_last_sync(7).unwrap(), Some(ts(8)));
}

#[test]
fn equal_last_updated_reapplies_snapshot() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 10, ts(5)), ts(6)).unwrap();

    let mut snapshot = test_issue(7, 1, 10, ts(5));
    snapshot.issue.summary = "edited".to_string();
    let outcome = db.upsert_issue(&snapshot, ts(7)).unwrap();

    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(db.get_issue(7).unwrap().unwrap().summary, "edited");
}

#[test]
fn issue_user_reference_does_not_clobber_user_details() {
    let db = Database::open_in_memory().unwrap();
    let mut project = test_project(1);
    project.users = vec![Account {
        id: 1,
        name: "alice".to_string(),
        real_name: Some("Alice Liddell".to_string()),
        email: Some("alice@example.com".to_string()),
    }];
    db.upsert_project(&project, ts(1)).unwrap();
    db.invalidate_caches();

    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();

    let user = db.get_user(1).unwrap().unwrap();
    assert_eq!(user.real_name.as_deref(), Some("Alice Liddell"));
}

#[test]
fn renamed_reference_value_is_refreshed() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();

    let mut renamed = test_issue(8, 1, 10, ts(1));
    renamed.issue.status = Some(Named::new(10, "triage"));
    db.upsert_issue(&renamed, ts(2)).unwrap();

    let status = db.get_reference(RefKind::Status, 10).unwrap().unwrap();
    assert_eq!(status.name, "triage");
}

#[test]
fn committed_shared_rows_are_published() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.cache().is_empty());

    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();

    assert!(db.cache().contains(CacheKey::User(1)));
    assert!(db.cache().contains(CacheKey::User(2)));
    assert!(db.cache().contains(CacheKey::CustomField(5)));
    assert!(db.cache().contains(CacheKey::Reference(RefKind::Status, 10)));
    assert!(db.cache().contains(CacheKey::Reference(RefKind::Priority, 30)));
}

#[test]
fn invalidate_caches_clears_cache() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(7, 1, 10, ts(1)), ts(2)).unwrap();
    assert!(!db.cache().is_empty());

    db.invalidate_caches();
    assert!(db.cache().is_empty());

    // Writes after invalidation re-check the store and still succeed
    db.upsert_issue(&test_issue(8, 1, 10, ts(1)), ts(2)).unwrap();
    assert_eq!(db.get_reference(RefKind::Status, 10).unwrap().unwrap().name, "status-10");
}

#[test]
fn read_open_issue_ids_filters() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(1, 1, 10, ts(1)), ts(2)).unwrap();
    db.upsert_issue(&test_issue(2, 1, 90, ts(1)), ts(2)).unwrap();
    db.upsert_issue(&test_issue(3, 1, 50, ts(1)), ts(5)).unwrap();
    db.upsert_issue(&test_issue(4, 2, 10, ts(1)), ts(2)).unwrap();
    let mut no_status = test_issue(5, 1, 10, ts(1));
    no_status.issue.status = None;
    db.upsert_issue(&no_status, ts(2)).unwrap();

    // 2 is closed, 3 was synced at the cutoff, 4 is in another project
    assert_eq!(db.read_open_issue_ids(ts(5), 1).unwrap(), vec![1, 5]);
}

#[parameterized(
    default_closed = { DEFAULT_CLOSED_STATUS_ID, vec![1] },
    custom_closed = { 10, vec![2] },
)]
fn read_open_issue_ids_uses_closed_status(closed: i64, expected: Vec<i64>) {
    let db = Database::open_in_memory()
        .unwrap()
        .with_closed_status_id(closed);
    db.upsert_issue(&test_issue(1, 1, 10, ts(1)), ts(2)).unwrap();
    db.upsert_issue(&test_issue(2, 1, 90, ts(1)), ts(2)).unwrap();

    assert_eq!(db.read_open_issue_ids(ts(3), 1).unwrap(), expected);
}

#[test]
fn watermark_absent_before_first_run() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.read_last_successful_run_time(1).unwrap(), None);
}

#[test]
fn watermark_is_latest_run_start_per_project() {
    let db = Database::open_in_memory().unwrap();
    let run = |project_id, start, finish| RunRecord {
        project_id,
        started_at: ts(start),
        finished_at: ts(finish),
    };
    db.record_runs(&[run(1, 1, 2)]).unwrap();
    db.record_runs(&[run(1, 3, 4), run(2, 5, 6)]).unwrap();

    assert_eq!(db.read_last_successful_run_time(1).unwrap(), Some(ts(3)));
    assert_eq!(db.read_last_successful_run_time(2).unwrap(), Some(ts(5)));
    assert_eq!(db.read_last_successful_run_time(3).unwrap(), None);

    let latest = db.latest_runs().unwrap();
    assert_eq!(latest, vec![run(1, 3, 4), run(2, 5, 6)]);
}

#[test]
fn record_runs_is_all_or_nothing() {
    let db = Database::open_in_memory().unwrap();
    db.conn
        .execute_batch(
            "CREATE TRIGGER reject_project_2 BEFORE INSERT ON sync_runs
             WHEN NEW.project_id = 2 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    let runs = [
        RunRecord {
            project_id: 1,
            started_at: ts(1),
            finished_at: ts(2),
        },
        RunRecord {
            project_id: 2,
            started_at: ts(1),
            finished_at: ts(2),
        },
    ];

    assert!(db.record_runs(&runs).is_err());
    assert_eq!(db.read_last_successful_run_time(1).unwrap(), None);
}

#[test]
fn count_issues_per_project() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(1, 1, 10, ts(1)), ts(2)).unwrap();
    db.upsert_issue(&test_issue(2, 2, 10, ts(1)), ts(2)).unwrap();

    assert_eq!(db.count_issues(None).unwrap(), 2);
    assert_eq!(db.count_issues(Some(1)).unwrap(), 1);
    assert_eq!(db.count_issues(Some(3)).unwrap(), 0);
}

#[test]
fn corrupted_timestamp_is_reported() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_issue(&test_issue(1, 1, 10, ts(1)), ts(2)).unwrap();
    db.conn
        .execute("UPDATE issues SET last_updated = 'garbage' WHERE id = 1", [])
        .unwrap();

    let err = db.get_issue(1).unwrap_err();
    assert!(err.to_string().contains("garbage"));
}

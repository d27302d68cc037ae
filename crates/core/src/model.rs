// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mirrored entity types.
//!
//! A [`ProjectSnapshot`] or [`IssueSnapshot`] is one fetched remote entity
//! together with every child collection it owns. Snapshots are written as a
//! whole: the store never merges children, it replaces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Families of `{id, name}` reference values mirrored next to entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Status,
    Priority,
    Severity,
    Resolution,
    ViewState,
    ProjectStatus,
}

impl RefKind {
    /// Returns the string representation used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Status => "status",
            RefKind::Priority => "priority",
            RefKind::Severity => "severity",
            RefKind::Resolution => "resolution",
            RefKind::ViewState => "view_state",
            RefKind::ProjectStatus => "project_status",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "status" => Ok(RefKind::Status),
            "priority" => Ok(RefKind::Priority),
            "severity" => Ok(RefKind::Severity),
            "resolution" => Ok(RefKind::Resolution),
            "view_state" => Ok(RefKind::ViewState),
            "project_status" => Ok(RefKind::ProjectStatus),
            _ => Err(Error::InvalidReferenceKind(s.to_string())),
        }
    }
}

/// An `{id, name}` reference value (status, priority, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    pub id: i64,
    pub name: String,
}

impl Named {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Named {
            id,
            name: name.into(),
        }
    }
}

/// A user account as seen by the remote tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
}

impl Account {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Account {
            id,
            name: name.into(),
            real_name: None,
            email: None,
        }
    }
}

/// Scalar attributes of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub status: Option<Named>,
    pub enabled: bool,
    pub view_state: Option<Named>,
    pub access_min: Option<i64>,
    pub description: Option<String>,
    /// Weak pointer to the parent project; never owns it.
    pub parent_id: Option<i64>,
}

impl Project {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Project {
            id,
            name: name.into(),
            status: None,
            enabled: true,
            view_state: None,
            access_min: None,
            description: None,
            parent_id: None,
        }
    }
}

/// A project version (release).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    /// Project that defines the version. Inherited versions name the parent.
    pub project_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub released: bool,
    pub obsolete: bool,
    pub date_order: Option<DateTime<Utc>>,
}

/// A custom field definition attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i64,
    pub name: String,
    pub type_id: Option<i64>,
    pub possible_values: Option<String>,
    pub default_value: Option<String>,
    pub valid_regexp: Option<String>,
}

/// A project together with its owned child collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: Project,
    pub versions: Vec<Version>,
    pub categories: Vec<String>,
    pub custom_fields: Vec<CustomField>,
    pub users: Vec<Account>,
}

impl ProjectSnapshot {
    /// A snapshot with no child rows.
    pub fn bare(project: Project) -> Self {
        ProjectSnapshot {
            project,
            versions: Vec::new(),
            categories: Vec::new(),
            custom_fields: Vec::new(),
            users: Vec::new(),
        }
    }
}

/// Scalar attributes of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub project_id: i64,
    pub reporter: Option<Account>,
    pub handler: Option<Account>,
    pub priority: Option<Named>,
    pub severity: Option<Named>,
    pub status: Option<Named>,
    pub resolution: Option<Named>,
    pub view_state: Option<Named>,
    pub summary: String,
    pub description: Option<String>,
    pub steps_to_reproduce: Option<String>,
    pub additional_information: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub fixed_in_version: Option<String>,
    pub target_version: Option<String>,
    pub category: Option<String>,
    pub date_submitted: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        id: i64,
        project_id: i64,
        summary: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Issue {
            id,
            project_id,
            reporter: None,
            handler: None,
            priority: None,
            severity: None,
            status: None,
            resolution: None,
            view_state: None,
            summary: summary.into(),
            description: None,
            steps_to_reproduce: None,
            additional_information: None,
            platform: None,
            version: None,
            fixed_in_version: None,
            target_version: None,
            category: None,
            date_submitted: None,
            last_updated,
        }
    }

    /// Returns the status id, if the issue carries one.
    pub fn status_id(&self) -> Option<i64> {
        self.status.as_ref().map(|s| s.id)
    }
}

/// A note (comment) on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub reporter: Option<Account>,
    pub text: String,
    pub view_state: Option<Named>,
    pub date_submitted: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// The value of one custom field on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub field: Named,
    pub value: Option<String>,
}

/// One row of an issue's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub user: Option<Account>,
    pub field: String,
    pub change_type: i64,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// An issue together with its owned child collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub issue: Issue,
    pub notes: Vec<Note>,
    pub custom_fields: Vec<CustomFieldValue>,
    pub history: Vec<HistoryEntry>,
}

impl IssueSnapshot {
    /// A snapshot with no child rows.
    pub fn bare(issue: Issue) -> Self {
        IssueSnapshot {
            issue,
            notes: Vec::new(),
            custom_fields: Vec::new(),
            history: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;

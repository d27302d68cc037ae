// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types returned by the remote tracker.
//!
//! Field names follow the tracker's RPC payloads. Every field the engine
//! can live without is defaulted so sparse responses still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An `{id, name}` reference as sent by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

impl ObjectRef {
    pub fn new(id: i64, name: &str) -> Self {
        ObjectRef {
            id,
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of `mc_login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub account_data: AccountData,
    #[serde(default)]
    pub access_level: i64,
}

/// A project and, recursively, its subprojects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: Option<ObjectRef>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub view_state: Option<ObjectRef>,
    #[serde(default)]
    pub access_min: Option<ObjectRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subprojects: Vec<ProjectData>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVersionData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub date_order: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub obsolete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDefinitionData {
    pub field: ObjectRef,
    #[serde(rename = "type", default)]
    pub type_id: Option<i64>,
    #[serde(default)]
    pub possible_values: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub valid_regexp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueNoteData {
    pub id: i64,
    #[serde(default)]
    pub reporter: Option<AccountData>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub view_state: Option<ObjectRef>,
    #[serde(default)]
    pub date_submitted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldValueForIssueData {
    pub field: ObjectRef,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueData {
    pub id: i64,
    pub project: ObjectRef,
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub date_submitted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reporter: Option<AccountData>,
    #[serde(default)]
    pub handler: Option<AccountData>,
    #[serde(default)]
    pub priority: Option<ObjectRef>,
    #[serde(default)]
    pub severity: Option<ObjectRef>,
    #[serde(default)]
    pub status: Option<ObjectRef>,
    #[serde(default)]
    pub resolution: Option<ObjectRef>,
    #[serde(default)]
    pub view_state: Option<ObjectRef>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps_to_reproduce: Option<String>,
    #[serde(default)]
    pub additional_information: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub fixed_in_version: Option<String>,
    #[serde(default)]
    pub target_version: Option<String>,
    #[serde(default)]
    pub notes: Vec<IssueNoteData>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValueForIssueData>,
}

impl IssueData {
    pub fn new(id: i64, project_id: i64, summary: &str, last_updated: DateTime<Utc>) -> Self {
        IssueData {
            id,
            project: ObjectRef {
                id: project_id,
                name: None,
            },
            summary: summary.to_string(),
            last_updated,
            date_submitted: None,
            reporter: None,
            handler: None,
            priority: None,
            severity: None,
            status: None,
            resolution: None,
            view_state: None,
            category: None,
            description: None,
            steps_to_reproduce: None,
            additional_information: None,
            platform: None,
            version: None,
            fixed_in_version: None,
            target_version: None,
            notes: Vec::new(),
            custom_fields: Vec::new(),
        }
    }
}

/// One history row; `date` is in seconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryData {
    pub date: i64,
    #[serde(default)]
    pub userid: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub field: String,
    #[serde(rename = "type", default)]
    pub change_type: i64,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

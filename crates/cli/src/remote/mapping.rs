// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conversion from wire types to mirrored entities.

use bm_core::{
    Account, CustomField, CustomFieldValue, HistoryEntry, Issue, IssueSnapshot, Named, Note,
    Project, Version,
};
use chrono::DateTime;
use tracing::warn;

use super::types::{
    AccountData, CustomFieldDefinitionData, HistoryData, IssueData, IssueNoteData, ObjectRef,
    ProjectData, ProjectVersionData,
};

pub fn named(value: &ObjectRef) -> Named {
    Named::new(value.id, value.name.clone().unwrap_or_default())
}

fn named_opt(value: Option<&ObjectRef>) -> Option<Named> {
    value.map(named)
}

pub fn account(data: &AccountData) -> Account {
    Account {
        id: data.id,
        name: data.name.clone().unwrap_or_default(),
        real_name: data.real_name.clone(),
        email: data.email.clone(),
    }
}

/// Map project scalars; subprojects are handled by the project cursor.
pub fn project(data: &ProjectData, parent_id: Option<i64>) -> Project {
    Project {
        id: data.id,
        name: data.name.clone(),
        status: named_opt(data.status.as_ref()),
        enabled: data.enabled,
        view_state: named_opt(data.view_state.as_ref()),
        access_min: data.access_min.as_ref().map(|a| a.id),
        description: data.description.clone(),
        parent_id: parent_id.filter(|&p| p != data.id),
    }
}

pub fn version(data: &ProjectVersionData) -> Version {
    Version {
        id: data.id,
        project_id: data.project_id,
        name: data.name.clone(),
        description: data.description.clone(),
        released: data.released,
        obsolete: data.obsolete,
        date_order: data.date_order,
    }
}

pub fn custom_field(data: &CustomFieldDefinitionData) -> CustomField {
    CustomField {
        id: data.field.id,
        name: data.field.name.clone().unwrap_or_default(),
        type_id: data.type_id,
        possible_values: data.possible_values.clone(),
        default_value: data.default_value.clone(),
        valid_regexp: data.valid_regexp.clone(),
    }
}

fn note(data: IssueNoteData) -> Note {
    Note {
        id: data.id,
        reporter: data.reporter.as_ref().map(account),
        text: data.text,
        view_state: named_opt(data.view_state.as_ref()),
        date_submitted: data.date_submitted,
        last_modified: data.last_modified,
    }
}

/// Map one history row. A zero user id means the change was made by the system.
/// A date chrono cannot represent is logged and stored as the epoch.
pub fn history_entry(data: HistoryData) -> HistoryEntry {
    let user = (data.userid > 0)
        .then(|| Account::new(data.userid, data.username.unwrap_or_default()));
    let date = DateTime::from_timestamp(data.date, 0).unwrap_or_else(|| {
        warn!(date = data.date, field = %data.field, "history timestamp out of range");
        DateTime::UNIX_EPOCH
    });
    HistoryEntry {
        date,
        user,
        field: data.field,
        change_type: data.change_type,
        old_value: data.old_value,
        new_value: data.new_value,
    }
}

/// Build the full issue snapshot from the issue payload and its history.
pub fn issue_snapshot(data: IssueData, history: Vec<HistoryData>) -> IssueSnapshot {
    let mut issue = Issue::new(data.id, data.project.id, data.summary, data.last_updated);
    issue.reporter = data.reporter.as_ref().map(account);
    issue.handler = data.handler.as_ref().map(account);
    issue.priority = named_opt(data.priority.as_ref());
    issue.severity = named_opt(data.severity.as_ref());
    issue.status = named_opt(data.status.as_ref());
    issue.resolution = named_opt(data.resolution.as_ref());
    issue.view_state = named_opt(data.view_state.as_ref());
    issue.description = data.description;
    issue.steps_to_reproduce = data.steps_to_reproduce;
    issue.additional_information = data.additional_information;
    issue.platform = data.platform;
    issue.version = data.version;
    issue.fixed_in_version = data.fixed_in_version;
    issue.target_version = data.target_version;
    issue.category = data.category;
    issue.date_submitted = data.date_submitted;

    IssueSnapshot {
        issue,
        notes: data.notes.into_iter().map(note).collect(),
        custom_fields: data
            .custom_fields
            .iter()
            .map(|v| CustomFieldValue {
                field: named(&v.field),
                value: v.value.clone(),
            })
            .collect(),
        history: history.into_iter().map(history_entry).collect(),
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;

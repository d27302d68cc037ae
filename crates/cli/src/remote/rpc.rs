// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 client for the remote tracker.
//!
//! Credentials travel in the call params; the session token, when present,
//! travels in the `Cookie` header.

use std::cell::Cell;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::types::{
    AccountData, CustomFieldDefinitionData, HistoryData, IssueData, ProjectData,
    ProjectVersionData, UserData,
};
use super::{Call, RemoteSource, TransportError, TransportResult};
use crate::config::RemoteConfig;

/// Access level passed to `mc_project_get_users`: every user with any access.
const ANY_ACCESS: i64 = 0;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Fault>,
}

#[derive(Debug, Deserialize)]
struct Fault {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Decode a JSON-RPC response body into the expected result type.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> TransportResult<T> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    if let Some(fault) = envelope.error {
        return Err(TransportError::Fault {
            code: fault.code,
            message: fault.message,
        });
    }
    let result = envelope.result.unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Returns true when `page` ends the listing: short, empty, or a repeat of
/// the previous page (the tracker serves its last page again past the end).
pub fn is_last_page(page: &[IssueData], previous: Option<&[IssueData]>, page_size: u32) -> bool {
    if page.len() < page_size as usize {
        return true;
    }
    match previous {
        Some(prev) => {
            prev.len() == page.len() && prev.iter().zip(page).all(|(a, b)| a.id == b.id)
        }
        None => false,
    }
}

/// Blocking JSON-RPC client.
pub struct RpcClient {
    http: Client,
    endpoint: String,
    page_size: u32,
    next_id: Cell<u64>,
}

impl RpcClient {
    pub fn new(config: &RemoteConfig) -> TransportResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;
        Ok(RpcClient {
            http,
            endpoint: config.endpoint.clone(),
            page_size: config.page_size.max(1),
            next_id: Cell::new(1),
        })
    }

    fn call<T: DeserializeOwned>(
        &self,
        call: &Call<'_>,
        method: &str,
        args: Value,
    ) -> TransportResult<T> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let mut params = Map::new();
        params.insert("username".into(), json!(call.credentials.username));
        params.insert("password".into(), json!(call.credentials.password));
        if let Value::Object(args) = args {
            params.extend(args);
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": Value::Object(params),
        });

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = call.token {
            request = request.header(COOKIE, token.as_str());
        }

        tracing::debug!(method, id, "remote call");
        let response = request
            .send()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            // Some servers report faults with an error status
            return match decode_envelope::<Value>(&text) {
                Err(fault @ TransportError::Fault { .. }) => Err(fault),
                _ => Err(TransportError::HttpStatus(status.as_u16())),
            };
        }
        decode_envelope(&text)
    }
}

impl RemoteSource for RpcClient {
    fn login(&self, call: &Call<'_>) -> TransportResult<i64> {
        let user: UserData = self.call(call, "mc_login", json!({}))?;
        Ok(user.access_level)
    }

    fn list_projects(&self, call: &Call<'_>) -> TransportResult<Vec<ProjectData>> {
        self.call(call, "mc_projects_get_user_accessible", json!({}))
    }

    fn get_project_versions(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<ProjectVersionData>> {
        self.call(
            call,
            "mc_project_get_versions",
            json!({ "project_id": project_id }),
        )
    }

    fn get_project_categories(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<String>> {
        self.call(
            call,
            "mc_project_get_categories",
            json!({ "project_id": project_id }),
        )
    }

    fn get_project_custom_fields(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<CustomFieldDefinitionData>> {
        self.call(
            call,
            "mc_project_get_custom_fields",
            json!({ "project_id": project_id }),
        )
    }

    fn get_project_users(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<AccountData>> {
        self.call(
            call,
            "mc_project_get_users",
            json!({ "project_id": project_id, "access": ANY_ACCESS }),
        )
    }

    fn get_issue(&self, call: &Call<'_>, issue_id: i64) -> TransportResult<IssueData> {
        self.call(call, "mc_issue_get", json!({ "issue_id": issue_id }))
    }

    fn list_open_issues(
        &self,
        call: &Call<'_>,
        project_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> TransportResult<Vec<IssueData>> {
        let mut issues = Vec::new();
        let mut previous: Option<Vec<IssueData>> = None;
        let mut page_number = 1u32;

        loop {
            let mut args = json!({
                "project_id": project_id,
                "page_number": page_number,
                "per_page": self.page_size,
            });
            if let (Some(since), Value::Object(map)) = (since, &mut args) {
                map.insert("updated_since".into(), json!(since));
            }

            let page: Vec<IssueData> = self.call(call, "mc_project_get_issues", args)?;
            let last = is_last_page(&page, previous.as_deref(), self.page_size);
            let repeated = last && page.len() >= self.page_size as usize;
            if !repeated {
                issues.extend(page.iter().cloned());
            }
            if last {
                break;
            }
            previous = Some(page);
            page_number += 1;
        }

        tracing::debug!(project_id, count = issues.len(), "open issues listed");
        Ok(issues)
    }

    fn get_issue_history(
        &self,
        call: &Call<'_>,
        issue_id: i64,
    ) -> TransportResult<Vec<HistoryData>> {
        self.call(call, "mc_issue_get_history", json!({ "issue_id": issue_id }))
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;

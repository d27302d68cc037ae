// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub fn bugmirror() -> Command {
    let mut cmd = cargo_bin_cmd!("bugmirror");
    cmd.env_remove("BUGMIRROR_CONFIG")
        .env_remove("BUGMIRROR_USERNAME")
        .env_remove("BUGMIRROR_PASSWORD")
        .env("BUGMIRROR_LOG", "warn");
    cmd
}

/// Write `bugmirror.toml` pointing at `endpoint` with the store next to it.
pub fn write_config(dir: &Path, endpoint: &str) -> PathBuf {
    let path = dir.join("bugmirror.toml");
    std::fs::write(
        &path,
        format!("[remote]\nendpoint = \"{endpoint}\"\n\n[store]\npath = \"mirror.db\"\n"),
    )
    .unwrap();
    path
}

/// JSON-RPC tracker backed by a mock server.
///
/// Each remote method is answered by a mock matched on the request's
/// `method` member. Methods nobody answered return an empty list.
pub struct FakeTracker {
    pub url: String,
    server: MockServer,
    runtime: Runtime,
}

impl FakeTracker {
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        runtime.block_on(
            Mock::given(method("POST"))
                .respond_with(rpc_result(json!([])))
                .with_priority(u8::MAX)
                .mount(&server),
        );
        let url = format!("{}/rpc", server.uri());
        FakeTracker { url, server, runtime }
    }

    /// Answer `rpc_method` calls whose body also contains `body`.
    pub fn answer_when(
        &self,
        rpc_method: &str,
        body: Value,
        response: impl Respond + 'static,
    ) -> &Self {
        let mut matcher = json!({ "method": rpc_method });
        if let (Value::Object(fields), Value::Object(body)) = (&mut matcher, body) {
            fields.extend(body);
        }
        self.runtime.block_on(
            Mock::given(method("POST"))
                .and(body_partial_json(matcher))
                .respond_with(response)
                .mount(&self.server),
        );
        self
    }

    pub fn answer(&self, rpc_method: &str, result: Value) -> &Self {
        self.answer_when(rpc_method, json!({}), rpc_result(result))
    }

    /// Remote methods called so far, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        let requests = self
            .runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default();
        requests
            .iter()
            .filter_map(|request| request.body_json::<Value>().ok())
            .filter_map(|body| body["method"].as_str().map(str::to_string))
            .collect()
    }
}

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

/// Issue payload echoing the requested id.
struct IssueById;

impl Respond for IssueById {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap_or_default();
        rpc_result(json!({
            "id": body["params"]["issue_id"],
            "project": { "id": 1, "name": "Main" },
            "summary": "Fetched by id",
            "last_updated": "2026-04-01T09:00:00Z",
            "status": { "id": 10, "name": "new" }
        }))
    }
}

/// A tracker with one project holding issue 7, open.
pub fn single_project_tracker() -> FakeTracker {
    let tracker = FakeTracker::start();
    tracker
        .answer(
            "mc_login",
            json!({ "account_data": { "id": 3, "name": "alice" }, "access_level": 90 }),
        )
        .answer(
            "mc_projects_get_user_accessible",
            json!([{ "id": 1, "name": "Main", "status": { "id": 10, "name": "development" } }]),
        )
        .answer("mc_project_get_categories", json!(["General"]))
        .answer_when(
            "mc_project_get_issues",
            json!({ "params": { "page_number": 1 } }),
            rpc_result(json!([{
                "id": 7,
                "project": { "id": 1, "name": "Main" },
                "summary": "Crash on save",
                "last_updated": "2026-04-01T08:00:00Z",
                "status": { "id": 10, "name": "new" }
            }])),
        )
        .answer_when("mc_issue_get", json!({}), IssueById);
    tracker
}

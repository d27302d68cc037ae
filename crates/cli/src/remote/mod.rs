// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote tracker access.
//!
//! Provides a trait-based view of the remote RPC surface that enables:
//! - The JSON-RPC client ([`RpcClient`]) for production
//! - In-memory fakes for unit testing

pub mod mapping;
pub mod rpc;
pub mod types;

use chrono::{DateTime, Utc};

use crate::auth::{AuthToken, Credentials};
use types::{
    AccountData, CustomFieldDefinitionData, HistoryData, IssueData, ProjectData,
    ProjectVersionData,
};

pub use rpc::RpcClient;

/// Error type for remote calls.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The remote reported an RPC fault.
    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },

    /// The response could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Result type for remote calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Per-call authentication: the job credentials plus the session token, if any.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub credentials: &'a Credentials,
    pub token: Option<&'a AuthToken>,
}

impl<'a> Call<'a> {
    pub fn new(credentials: &'a Credentials, token: Option<&'a AuthToken>) -> Self {
        Call { credentials, token }
    }
}

/// The remote RPC surface consumed by the sync engine.
///
/// Every call carries a [`Call`]; implementations attach the token
/// out-of-band when one is present.
pub trait RemoteSource {
    /// Validate the credentials and return the principal's access level.
    fn login(&self, call: &Call<'_>) -> TransportResult<i64>;

    /// Projects visible to the principal, as a tree of subprojects.
    fn list_projects(&self, call: &Call<'_>) -> TransportResult<Vec<ProjectData>>;

    fn get_project_versions(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<ProjectVersionData>>;

    fn get_project_categories(&self, call: &Call<'_>, project_id: i64)
        -> TransportResult<Vec<String>>;

    fn get_project_custom_fields(
        &self,
        call: &Call<'_>,
        project_id: i64,
    ) -> TransportResult<Vec<CustomFieldDefinitionData>>;

    fn get_project_users(&self, call: &Call<'_>, project_id: i64)
        -> TransportResult<Vec<AccountData>>;

    fn get_issue(&self, call: &Call<'_>, issue_id: i64) -> TransportResult<IssueData>;

    /// Currently open issues of the project updated at or after `since`
    /// (all open issues when `since` is absent).
    fn list_open_issues(
        &self,
        call: &Call<'_>,
        project_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> TransportResult<Vec<IssueData>>;

    fn get_issue_history(&self, call: &Call<'_>, issue_id: i64)
        -> TransportResult<Vec<HistoryData>>;
}

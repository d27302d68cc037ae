// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bugmirror - incremental mirror of a remote issue tracker.
//!
//! This crate drives sync runs against the tracker's RPC interface and
//! writes what it fetches into the SQLite store provided by `bm_core`.
//!
//! # Main Components
//!
//! - [`SyncOrchestrator`] - run state machine, batching and watermarks
//! - [`RemoteSource`] - the remote tracker operations, backed by [`RpcClient`]
//! - [`cursor`] - lazy readers over projects and issues
//! - [`ReconciliationWriter`] - transactional upserts of fetched snapshots
//! - [`AuthSession`] - per-run login and logout
//!
//! # Running a sync
//!
//! ```rust,ignore
//! use bugmirror::{JobParams, SyncOptions, SyncOrchestrator};
//!
//! let mut orchestrator = SyncOrchestrator::new(&remote, &auth, &store, &clock, SyncOptions::default());
//! let summary = orchestrator.run(&JobParams::default())?;
//! ```

mod cli;
mod commands;
mod logging;

pub mod auth;
pub mod config;
pub mod cursor;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod remote;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use auth::{AuthSession, AuthToken, Authenticator, Credentials, FormLogin, NoSession};
pub use cli::{Cli, Command, CredentialArgs, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use orchestrator::{IssuePass, RunPhase, RunSummary, SyncOptions, SyncOrchestrator};
pub use params::{IssueSelection, JobParams, SyncScope};
pub use remote::{RemoteSource, RpcClient};
pub use writer::{ReconciliationWriter, WriteTally};

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Sync {
            credentials,
            project,
            issues,
            issues_file,
        } => commands::sync::run(
            config,
            JobParams {
                credentials: credentials.into(),
                project_id: project,
                issue_ids: issues,
                issues_file,
                scope: SyncScope::Full,
            },
        ),
        Command::Projects {
            credentials,
            project,
        } => commands::sync::run(
            config,
            JobParams {
                credentials: credentials.into(),
                project_id: project,
                scope: SyncScope::ProjectsOnly,
                ..Default::default()
            },
        ),
        Command::Status { output } => commands::status::run(config, output),
    }
}

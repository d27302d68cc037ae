// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use bm_core::clock::format_timestamp;
use bm_core::SystemClock;

use crate::auth::{Authenticator, FormLogin, NoSession};
use crate::config::{load_config, Config};
use crate::error::Result;
use crate::orchestrator::{RunSummary, SyncOptions, SyncOrchestrator};
use crate::params::{JobParams, SyncScope};
use crate::remote::RpcClient;

use super::open_store;

pub fn run(config_path: Option<&Path>, params: JobParams) -> Result<()> {
    let config = load_config(config_path)?;
    let remote = RpcClient::new(&config.remote)?;
    let authenticator = authenticator_for(&config)?;
    let store = open_store(&config)?;
    let clock = SystemClock;
    let options = SyncOptions {
        batch_size: config.sync.batch_size,
    };

    let mut orchestrator =
        SyncOrchestrator::new(&remote, authenticator.as_ref(), &store, &clock, options);
    let summary = orchestrator.run(&params)?;
    println!("{}", format_summary(&summary, params.scope));
    Ok(())
}

/// Form login when `[remote.login]` is configured, otherwise no session.
pub(crate) fn authenticator_for(config: &Config) -> Result<Box<dyn Authenticator>> {
    match &config.remote.login {
        Some(login) => Ok(Box::new(FormLogin::new(login, config.remote.timeout_secs)?)),
        None => Ok(Box::new(NoSession)),
    }
}

pub(crate) fn format_summary(summary: &RunSummary, scope: SyncScope) -> String {
    let mut out = format!("Synced {} project(s)", summary.projects.len());
    if scope == SyncScope::ProjectsOnly {
        return out;
    }

    let issues = &summary.issues;
    out.push_str(&format!(
        ", {} issue(s) ({} new, {} updated, {} stale)",
        issues.total(),
        issues.inserted,
        issues.updated,
        issues.stale
    ));
    match (summary.watermark_advanced, summary.run_start) {
        (true, Some(start)) => {
            out.push_str(&format!("\nWatermark: {}", format_timestamp(start)));
        }
        _ => out.push_str("\nWatermark unchanged"),
    }
    out
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use bm_core::clock::format_timestamp;
use bm_core::{Database, Project};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::config::load_config;
use crate::error::Result;

use super::open_store;

#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    store: String,
    projects: i64,
    issues: i64,
    runs: Vec<ProjectRun>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectRun {
    project_id: i64,
    project: Option<Project>,
    issues: i64,
    last_run_started: DateTime<Utc>,
    last_run_finished: DateTime<Utc>,
}

pub fn run(config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_store(&config)?;
    let report = build_report(&db, &config.store_path())?;
    match output {
        OutputFormat::Text => println!("{}", format_text(&report)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

pub(crate) fn build_report(db: &Database, store_path: &Path) -> Result<StatusReport> {
    let runs = db
        .latest_runs()?
        .into_iter()
        .map(|run| -> Result<ProjectRun> {
            Ok(ProjectRun {
                project_id: run.project_id,
                project: db.get_project(run.project_id)?,
                issues: db.count_issues(Some(run.project_id))?,
                last_run_started: run.started_at,
                last_run_finished: run.finished_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StatusReport {
        store: store_path.display().to_string(),
        projects: db.count_projects()?,
        issues: db.count_issues(None)?,
        runs,
    })
}

pub(crate) fn format_text(report: &StatusReport) -> String {
    let mut out = format!(
        "Store: {}\nProjects: {}\nIssues: {}",
        report.store, report.projects, report.issues
    );
    if report.runs.is_empty() {
        out.push_str("\nNo successful runs yet");
        return out;
    }
    out.push_str("\nLast successful runs:");
    for run in &report.runs {
        let name = run.project.as_ref().map_or("?", |p| p.name.as_str());
        out.push_str(&format!(
            "\n  project {} ({}): {} issue(s), watermark {}",
            run.project_id,
            name,
            run.issues,
            format_timestamp(run.last_run_started)
        ));
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

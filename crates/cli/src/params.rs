// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Job parameters and issue selection.
//!
//! The selection decides which issue cursor a run uses: an explicit id list
//! wins over an id file, which wins over the per-project delta passes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::Credentials;
use crate::error::{Error, Result};

/// How far a run goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncScope {
    /// Projects, then issues.
    #[default]
    Full,
    /// Projects only.
    ProjectsOnly,
}

/// Everything the caller supplies for one run.
#[derive(Debug, Clone, Default)]
pub struct JobParams {
    pub credentials: Credentials,
    /// Restrict the run to this project and its subprojects.
    pub project_id: Option<i64>,
    /// Semicolon-delimited issue ids.
    pub issue_ids: Option<String>,
    /// File with one issue id per line.
    pub issues_file: Option<PathBuf>,
    pub scope: SyncScope,
}

/// Which issues a run fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueSelection {
    /// Open issues changed since the watermark plus the closed-since pass.
    Delta,
    /// Fixed ids from the command line.
    Explicit(Vec<i64>),
    /// Fixed ids read from a file.
    File { path: PathBuf, ids: Vec<i64> },
}

impl IssueSelection {
    /// Resolve the selection, parsing every id up front.
    pub fn from_params(params: &JobParams) -> Result<Self> {
        if let Some(list) = &params.issue_ids {
            return Ok(IssueSelection::Explicit(parse_id_list(list)?));
        }
        if let Some(path) = &params.issues_file {
            let ids = read_id_file(path)?;
            return Ok(IssueSelection::File {
                path: path.clone(),
                ids,
            });
        }
        Ok(IssueSelection::Delta)
    }

    /// Returns true if this run may advance watermarks.
    pub fn is_delta(&self) -> bool {
        matches!(self, IssueSelection::Delta)
    }
}

fn parse_id(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|&id| id > 0)
}

/// Parse a semicolon-delimited id list. Empty pieces are skipped.
pub fn parse_id_list(list: &str) -> Result<Vec<i64>> {
    list.split(';')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            parse_id(piece).ok_or_else(|| Error::MalformedId {
                value: piece.to_string(),
            })
        })
        .collect()
}

/// Read a flat file of one id per line, no header. Blank lines are skipped.
pub fn read_id_file(path: &Path) -> Result<Vec<i64>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, value)| {
            parse_id(value).ok_or_else(|| Error::MalformedIdLine {
                path: path.display().to_string(),
                line,
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;

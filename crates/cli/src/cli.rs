// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::auth::Credentials;
use crate::env::vars;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  bugmirror projects -u alice       Mirror the visible project tree
  bugmirror sync -u alice           Mirror projects and changed issues
  bugmirror sync --issues '12;40'   Re-fetch specific issues
  bugmirror status                  Show what the local mirror holds";

#[derive(Parser, Debug)]
#[command(name = "bugmirror", version)]
#[command(about = "Incrementally mirror a remote issue tracker into a local SQLite store")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Remote account used for a run. Both empty means anonymous.
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Remote account name
    #[arg(long, short, env = vars::BUGMIRROR_USERNAME, default_value = "")]
    pub username: String,

    /// Remote account password
    #[arg(long, env = vars::BUGMIRROR_PASSWORD, default_value = "", hide_env_values = true)]
    pub password: String,
}

impl From<CredentialArgs> for Credentials {
    fn from(args: CredentialArgs) -> Self {
        Credentials::new(args.username, args.password)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror projects and issues changed since the last successful run
    #[command(after_help = "Examples:\n  \
        bugmirror sync                          Delta sync of every visible project\n  \
        bugmirror sync -p 3                     Delta sync of project 3 and its subprojects\n  \
        bugmirror sync --issues '5;7;12'        Re-fetch listed issues only\n  \
        bugmirror sync --issues-file ids.txt    Re-fetch issues listed one per line")]
    Sync {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Restrict the run to this project and its subprojects
        #[arg(long, short)]
        project: Option<i64>,

        /// Semicolon-separated issue ids to re-fetch instead of a delta sync
        #[arg(long, conflicts_with = "issues_file")]
        issues: Option<String>,

        /// File with one issue id per line to re-fetch instead of a delta sync
        #[arg(long)]
        issues_file: Option<PathBuf>,
    },

    /// Mirror the project tree without touching issues
    Projects {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Restrict the run to this project and its subprojects
        #[arg(long, short)]
        project: Option<i64>,
    },

    /// Show mirrored counts and per-project watermarks
    Status {
        /// Output format
        #[arg(long = "output", short = 'o', value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod status;
pub mod sync;

use bm_core::Database;

use crate::config::Config;
use crate::error::Result;

/// Open the local store the configuration points at.
pub fn open_store(config: &Config) -> Result<Database> {
    let path = config.store_path();
    tracing::debug!(path = %path.display(), "opening local store");
    let db = Database::open(&path)?.with_closed_status_id(config.sync.closed_status_id);
    Ok(db)
}

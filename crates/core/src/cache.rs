// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-through cache of rows known to exist in the mirror.
//!
//! Reference values, users and custom field definitions are inserted on
//! first sight. The cache remembers which ones are already present so the
//! writer can skip the existence check. Keys are only published after the
//! transaction that inserted them commits.
//!
//! Reference values also remember their name: a reference seen under a new
//! name is written again so remote renames reach the mirror.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::model::RefKind;

/// Identity of a shared row in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Reference(RefKind, i64),
    User(i64),
    CustomField(i64),
}

/// Shared rows known to be present, with the name last written for them.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    known: RefCell<HashMap<CacheKey, Option<String>>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the row is known to exist.
    pub fn contains(&self, key: CacheKey) -> bool {
        self.known.borrow().contains_key(&key)
    }

    /// Returns true if the row is known to exist under exactly this name.
    pub fn contains_named(&self, key: CacheKey, name: &str) -> bool {
        matches!(self.known.borrow().get(&key), Some(Some(known)) if known == name)
    }

    /// Publish entries whose rows are now committed.
    pub fn publish<I: IntoIterator<Item = (CacheKey, Option<String>)>>(&self, entries: I) {
        self.known.borrow_mut().extend(entries);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.known.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.known.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.borrow().is_empty()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

//! Project: owns every configured folder, keyed by directory (spec.md §4.G).
//!
//! Pure composition over `Folder` — no business logic lives here. The HTTP
//! adapter resolves a `dir` path segment and dispatches to the matching
//! folder's public operations.

use crate::error::{Error, Result};
use crate::folder::Folder;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Project {
    pub name: String,
    folders: BTreeMap<String, Arc<Folder>>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), folders: BTreeMap::new() }
    }

    pub fn add_folder(&mut self, folder: Arc<Folder>) {
        self.folders.insert(folder.dir.clone(), folder);
    }

    pub fn folder(&self, dir: &str) -> Result<&Arc<Folder>> {
        self.folders.get(dir).ok_or_else(|| Error::not_found(dir))
    }

    /// Every registered folder's directory key, for `GET /metadatas/folders`.
    pub fn folder_dirs(&self) -> Vec<&str> {
        self.folders.keys().map(String::as_str).collect()
    }

    pub fn folders(&self) -> impl Iterator<Item = &Arc<Folder>> {
        self.folders.values()
    }
}

//! YAML configuration loading (spec.md §6).
//!
//! Mirrors the section-struct-plus-`validate()` shape the teacher uses for
//! its own config file (`server/config.rs`'s `RemiConfig`), adapted from
//! TOML to YAML and from upstream/federation sections to folder/automation
//! sections.

use crate::automation::{check_f1, Automation};
use crate::error::{Error, Result};
use crate::folder::{AutomationEntry, Folder};
use crate::project::Project;
use crate::storage::filesystem::FilesystemStore;
use crate::storage::s3::{S3Config, S3Store};
use crate::storage::ObjectStore;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Top-level document: `{ project: ProjectSection }`.
#[derive(Debug, Deserialize)]
pub struct RootConfig {
    pub project: ProjectSection,
}

#[derive(Debug, Deserialize)]
pub struct ProjectSection {
    pub name: String,

    #[serde(default)]
    pub api_server: ApiServerSection,

    pub folders: Vec<FolderSection>,
}

#[derive(Debug, Deserialize)]
pub struct ApiServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiServerSection {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize)]
pub struct FolderSection {
    pub dir: String,
    pub storage: StorageSection,
    pub backup: Option<StorageSection>,
    #[serde(default)]
    pub automations: Vec<AutomationSection>,
}

/// One top-level automation entry: the `apply_to_existing` flag plus the
/// automation body itself (namer + steps). Flattened so the YAML reads as a
/// single object rather than a nested `automation:` key.
#[derive(Debug, Deserialize)]
pub struct AutomationSection {
    #[serde(default)]
    pub apply_to_existing: bool,
    #[serde(flatten)]
    pub automation: Automation,
}

/// `storage-config` tagged union (spec.md §6).
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StorageSection {
    Filesystem {
        mount_dir: String,
    },
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key: Option<String>,
        #[serde(default)]
        secret_key: Option<String>,
    },
}

impl StorageSection {
    fn build(&self) -> Result<Arc<dyn ObjectStore>> {
        match self {
            StorageSection::Filesystem { mount_dir } => {
                Ok(Arc::new(FilesystemStore::new(mount_dir.clone())))
            }
            StorageSection::S3 { bucket, region, endpoint, access_key, secret_key } => {
                if access_key.is_none() != secret_key.is_none() {
                    return Err(Error::config(
                        "s3 storage requires both access_key and secret_key, or neither",
                    ));
                }
                let config = S3Config {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                };
                Ok(Arc::new(S3Store::new(config)?))
            }
        }
    }
}

impl RootConfig {
    /// Loads, parses and validates a project configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let config: RootConfig = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation independent of storage construction: non-empty
    /// folder dirs, no duplicate dirs, every automation has at least one
    /// step, invariant F1 holds per folder, and no child-automation cycle.
    pub fn validate(&self) -> Result<()> {
        let mut seen_dirs = std::collections::HashSet::new();
        for folder in &self.project.folders {
            if folder.dir.trim().is_empty() {
                return Err(Error::config("folder.dir must not be empty"));
            }
            if !seen_dirs.insert(folder.dir.clone()) {
                return Err(Error::config(format!("duplicate folder dir {:?}", folder.dir)));
            }
            for entry in &folder.automations {
                if entry.automation.steps.is_empty() {
                    return Err(Error::config(format!(
                        "folder {:?}: automation with namer {} has zero steps",
                        folder.dir,
                        entry.automation.namer.label()
                    )));
                }
                entry.automation.check_acyclic()?;
            }
            check_f1(
                &folder
                    .automations
                    .iter()
                    .map(|e| e.automation.clone())
                    .collect::<Vec<_>>(),
            )?;
        }
        Ok(())
    }

    /// Builds the runtime `Project`: constructs every storage backend,
    /// assigns automation names, and wires up each `Folder`.
    pub fn build(mut self) -> anyhow::Result<(Project, ApiServerSection)> {
        self.validate()?;

        let mut project = Project::new(self.project.name.clone());
        for mut folder_cfg in self.project.folders {
            let storage = folder_cfg.storage.build()?;
            let backup = folder_cfg.backup.as_ref().map(|b| b.build()).transpose()?;

            let mut counter = 0usize;
            let entries: Vec<AutomationEntry> = folder_cfg
                .automations
                .drain(..)
                .map(|mut entry| {
                    entry.automation.assign_default_names(&mut counter);
                    AutomationEntry { automation: entry.automation, apply_to_existing: entry.apply_to_existing }
                })
                .collect();

            let folder = Folder::new(folder_cfg.dir.clone(), storage, backup, entries)?;
            project.add_folder(folder);
        }
        Ok((project, self.project.api_server))
    }
}

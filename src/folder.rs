//! Folder: the aggregate tying a storage directory to its automations
//! (spec.md §4.E).

use crate::automation::Automation;
use crate::error::{Error, Result};
use crate::id::{is_valid_uuid_v4, new_source_name, stem};
use crate::step::{PipelineContext, RunContext};
use crate::storage::{File, ObjectStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Default backup loop cadence (spec.md §4.E.4: T ∈ [10s, 120s], default 60s).
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(60);

/// One configured automation plus its apply-to-existing flag.
#[derive(Debug, Clone)]
pub struct AutomationEntry {
    pub automation: Automation,
    pub apply_to_existing: bool,
}

/// Outcome of one `upload`: the resulting source `File` plus any
/// per-automation failures. A non-empty `automation_errors` does not fail the
/// upload — the source write (step 2 of §4.E.1) already succeeded by the
/// time automations run (spec.md §7 propagation policy).
#[derive(Debug)]
pub struct UploadOutcome {
    pub file: File,
    pub automation_errors: Vec<(String, Error)>,
}

/// A directory in a storage backend plus the automations that govern it.
pub struct Folder {
    pub dir: String,
    pub storage: Arc<dyn ObjectStore>,
    pub backup: Option<Arc<dyn ObjectStore>>,
    pub automations: Vec<AutomationEntry>,
}

impl Folder {
    pub fn new(
        dir: impl Into<String>,
        storage: Arc<dyn ObjectStore>,
        backup: Option<Arc<dyn ObjectStore>>,
        automations: Vec<AutomationEntry>,
    ) -> Result<Arc<Self>> {
        crate::automation::check_f1(
            &automations.iter().map(|e| e.automation.clone()).collect::<Vec<_>>(),
        )?;
        for entry in &automations {
            entry.automation.check_acyclic()?;
        }
        Ok(Arc::new(Self { dir: dir.into(), storage, backup, automations }))
    }

    fn run_context(&self) -> RunContext {
        RunContext { storage: self.storage.clone(), dir: self.dir.clone() }
    }

    /// spec.md §4.E.1: assigns a canonical UUID source name when the
    /// incoming name is not already one, writes the source, then runs every
    /// automation against the in-memory bytes. Automation failures are
    /// collected, not propagated — the source write already happened.
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<UploadOutcome> {
        if bytes.is_empty() {
            return Err(Error::invalid_input("upload body must not be empty"));
        }
        let source_name = if is_valid_uuid_v4(stem(name)) {
            name.to_string()
        } else {
            new_source_name(name)
        };

        self.storage.put(&self.dir, &source_name, bytes.clone(), None).await?;

        let rctx = self.run_context();
        let mut automation_errors = Vec::new();
        for entry in &self.automations {
            let ctx = PipelineContext::new(source_name.clone(), bytes.clone());
            if let Err(e) = entry.automation.run(ctx, &rctx).await {
                warn!(
                    automation = %entry.automation.name,
                    source = %source_name,
                    error = %e,
                    "automation failed during upload"
                );
                automation_errors.push((entry.automation.name.clone(), e));
            }
        }

        let file = self.stat_source(&source_name).await?;
        Ok(UploadOutcome { file, automation_errors })
    }

    async fn stat_source(&self, source_name: &str) -> Result<File> {
        let prefix = stem(source_name);
        let entries = self.storage.list(&self.dir, Some(prefix)).await?;
        entries
            .into_iter()
            .find(|f| f.name == source_name)
            .ok_or_else(|| Error::not_found(source_name))
    }

    /// spec.md §4.E.2: only source files, each annotated with the derivative
    /// names that exist on disk. A single `list` call backs both the source
    /// scan and the children lookup.
    pub async fn read_all(&self) -> Result<Vec<File>> {
        let entries = self.storage.list(&self.dir, None).await?;
        let existing: HashSet<&str> = entries.iter().map(|f| f.name.as_str()).collect();

        let mut sources: Vec<File> = entries
            .iter()
            .filter(|f| is_valid_uuid_v4(stem(&f.name)))
            .cloned()
            .collect();

        for source in &mut sources {
            let mut declared = HashSet::new();
            for entry in &self.automations {
                for name in entry.automation.declared_names(&source.name) {
                    declared.insert(name);
                }
            }
            let mut children: Vec<String> = declared
                .into_iter()
                .filter(|n| n != &source.name && existing.contains(n.as_str()))
                .collect();
            children.sort();
            source.children = if children.is_empty() { None } else { Some(children) };
        }
        Ok(sources)
    }

    /// spec.md §4.E.2: every object whose name begins with `prefix`.
    pub async fn read_prefix(&self, prefix: &str) -> Result<Vec<File>> {
        self.storage.list(&self.dir, Some(prefix)).await
    }

    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        self.storage.get(&self.dir, name).await
    }

    /// spec.md §4.E.3: deletes the source and every derivative sharing its
    /// stem prefix. Missing objects are not an error.
    pub async fn delete_one(&self, name: &str) -> Result<()> {
        let prefix = stem(name).to_string();
        let victims = self.storage.list(&self.dir, Some(&prefix)).await?;
        for victim in victims {
            self.storage.delete(&self.dir, &victim.name).await?;
        }
        Ok(())
    }

    /// spec.md §4.E.4: additive-only mirror to the backup backend. Never
    /// deletes from backup, never overwrites an existing backup object
    /// (invariant B1).
    async fn backup_once(&self) -> Result<()> {
        let Some(backup) = &self.backup else { return Ok(()) };
        let sources = self.read_all().await?;
        for source in sources {
            if backup.exists(&self.dir, &source.name).await {
                continue;
            }
            let bytes = match self.storage.get(&self.dir, &source.name).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(name = %source.name, error = %e, "backup: failed to read source");
                    continue;
                }
            };
            if let Err(e) = backup.put(&self.dir, &source.name, bytes, None).await {
                warn!(name = %source.name, error = %e, "backup: failed to write");
            }
        }
        Ok(())
    }

    /// Spawns the detached backup loop (spec.md §4.E.4). No-op if the folder
    /// has no backup backend configured.
    pub fn spawn_backup_loop(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if self.backup.is_none() {
            return None;
        }
        let folder = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                if let Err(e) = folder.backup_once().await {
                    error!(dir = %folder.dir, error = %e, "backup pass failed");
                }
                tokio::time::sleep(interval).await;
            }
        }))
    }

    /// Spawns the one-shot apply-to-existing pass (spec.md §4.E.5): every
    /// automation flagged `apply_to_existing` runs against every pre-existing
    /// source, loading bytes lazily via the `Source` step.
    pub fn spawn_apply_to_existing(self: &Arc<Self>) -> JoinHandle<()> {
        let folder = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = folder.apply_to_existing_once().await {
                error!(dir = %folder.dir, error = %e, "apply-to-existing pass failed");
            }
        })
    }

    async fn apply_to_existing_once(&self) -> Result<()> {
        let entries: Vec<_> = self
            .automations
            .iter()
            .filter(|e| e.apply_to_existing)
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        let sources = self.read_all().await?;
        let rctx = self.run_context();
        for source in sources {
            for entry in &entries {
                let ctx = PipelineContext { name: source.name.clone(), body: None };
                if let Err(e) = entry.automation.run(ctx, &rctx).await {
                    warn!(
                        automation = %entry.automation.name,
                        source = %source.name,
                        error = %e,
                        "apply-to-existing failed for source"
                    );
                }
            }
        }
        info!(dir = %self.dir, "apply-to-existing pass complete");
        Ok(())
    }
}

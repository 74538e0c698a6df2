//! Cross-folder reconciliation (spec.md §4.F).
//!
//! For every source in every owned folder, compares the on-disk derivative
//! set against what the folder's automations declare and re-uploads the
//! source when they disagree. Sources within a folder are reconciled in
//! parallel; folders are reconciled sequentially.

use crate::folder::Folder;
use crate::id::{is_valid_uuid_v4, stem};
use crate::storage::File;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one `Synchronizer::run` pass.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub sources_checked: usize,
    pub sources_resynced: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.sources_checked += other.sources_checked;
        self.sources_resynced += other.sources_resynced;
        self.errors.extend(other.errors);
    }
}

pub struct Synchronizer {
    folders: Vec<Arc<Folder>>,
}

impl Synchronizer {
    pub fn new(folders: Vec<Arc<Folder>>) -> Self {
        Self { folders }
    }

    /// Runs one reconciliation pass over every owned folder.
    pub async fn run(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for folder in &self.folders {
            report.merge(Self::sync_folder(folder).await);
        }
        report
    }

    async fn sync_folder(folder: &Arc<Folder>) -> SyncReport {
        let sources = match folder.read_all().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(dir = %folder.dir, error = %e, "synchronizer: failed to list folder");
                return SyncReport { errors: vec![format!("{}: {e}", folder.dir)], ..Default::default() };
            }
        };

        let results = join_all(
            sources
                .iter()
                .filter(|f| is_valid_uuid_v4(stem(&f.name)))
                .map(|source| Self::sync_source(folder, source)),
        )
        .await;

        let mut report = SyncReport { sources_checked: results.len(), ..Default::default() };
        for outcome in results {
            match outcome {
                Ok(true) => report.sources_resynced += 1,
                Ok(false) => {}
                Err(e) => report.errors.push(e),
            }
        }
        report
    }

    /// Implements the per-source algorithm of spec.md §4.F. Returns whether
    /// a resync was triggered.
    async fn sync_source(folder: &Arc<Folder>, source: &File) -> Result<bool, String> {
        let prefix = format!("{}_", stem(&source.name));
        let derivatives = folder
            .read_prefix(&prefix)
            .await
            .map_err(|e| format!("{}: list derivatives of {}: {e}", folder.dir, source.name))?;

        let mut need_sync = false;

        // (a) on-disk derivatives whose size disagrees with the declaration.
        // The declaration is the resizer's *target box*; the size it actually
        // produces is that box clipped to the source's aspect ratio, so the
        // source must be stat'd once up front to compute the expected size.
        let source_size = folder.storage.stat(&folder.dir, &source.name).await.ok();

        'outer: for derivative in &derivatives {
            for entry in &folder.automations {
                if !entry.automation.namer.is_of(&derivative.name) {
                    continue;
                }
                let Some(source_size) = source_size else { continue };
                let Some(expected) = entry.automation.expected_size(source_size) else { continue };
                match folder.storage.stat(&folder.dir, &derivative.name).await {
                    Ok(actual) if actual != expected => {
                        debug!(
                            name = %derivative.name,
                            expected = ?expected,
                            actual = ?actual,
                            "synchronizer: size mismatch"
                        );
                        need_sync = true;
                        break 'outer;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(name = %derivative.name, error = %e, "synchronizer: stat failed");
                        need_sync = true;
                        break 'outer;
                    }
                }
            }
        }

        // (b) declared automations with no matching derivative at all.
        if !need_sync {
            for entry in &folder.automations {
                let namer = &entry.automation.namer;
                if !derivatives.iter().any(|d| namer.is_of(&d.name)) {
                    need_sync = true;
                    break;
                }
            }
        }

        if !need_sync {
            return Ok(false);
        }

        info!(dir = %folder.dir, source = %source.name, "synchronizer: resyncing source");
        let bytes = folder
            .download(&source.name)
            .await
            .map_err(|e| format!("{}: download {}: {e}", folder.dir, source.name))?;
        folder
            .upload(&source.name, bytes)
            .await
            .map_err(|e| format!("{}: reupload {}: {e}", folder.dir, source.name))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::AutomationEntry;
    use crate::naming::Namer;
    use crate::step::StepKind;
    use crate::storage::filesystem::FilesystemStore;
    use crate::storage::{ObjectStore, Size};

    fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn thumb_automation(size: Size) -> crate::automation::Automation {
        crate::automation::Automation::new(
            "thumb",
            Namer::Suffix { suffix: "thumb".into() },
            vec![StepKind::Resizer { size, children: vec![] }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn resyncs_when_derivative_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStore::new(tmp.path()));
        let folder = new_test_folder(storage.clone(), vec![thumb_automation(Size::new(200, 200))]);

        let outcome = folder.upload("photo.jpg", make_jpeg(1200, 800)).await.unwrap();
        let derivative = format!("{}_thumb.jpg", crate::id::stem(&outcome.file.name));
        storage.delete("img", &derivative).await.unwrap();
        assert!(!storage.exists("img", &derivative).await);

        let report = Synchronizer::new(vec![folder]).run().await;
        assert_eq!(report.sources_resynced, 1);
        assert!(storage.exists("img", &derivative).await);
    }

    #[tokio::test]
    async fn zero_writes_when_already_in_sync() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStore::new(tmp.path()));
        let folder = new_test_folder(storage.clone(), vec![thumb_automation(Size::new(200, 200))]);
        folder.upload("photo.jpg", make_jpeg(1200, 800)).await.unwrap();

        let report = Synchronizer::new(vec![folder]).run().await;
        assert_eq!(report.sources_resynced, 0);
        assert_eq!(report.sources_checked, 1);
    }

    #[tokio::test]
    async fn resyncs_when_size_mismatches_declaration() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStore::new(tmp.path()));
        let folder = new_test_folder(storage.clone(), vec![thumb_automation(Size::new(200, 200))]);
        let outcome = folder.upload("photo.jpg", make_jpeg(1200, 800)).await.unwrap();

        let derivative = format!("{}_thumb.jpg", crate::id::stem(&outcome.file.name));
        storage.put("img", &derivative, make_jpeg(50, 50), None).await.unwrap();

        let report = Synchronizer::new(vec![folder]).run().await;
        assert_eq!(report.sources_resynced, 1);
        let size = storage.stat("img", &derivative).await.unwrap();
        assert_eq!(size, Size::new(200, 133));
    }

    fn new_test_folder(storage: Arc<dyn ObjectStore>, automations: Vec<crate::automation::Automation>) -> Arc<Folder> {
        let entries = automations
            .into_iter()
            .map(|automation| AutomationEntry { automation, apply_to_existing: false })
            .collect();
        Folder::new("img", storage, None, entries).unwrap()
    }
}

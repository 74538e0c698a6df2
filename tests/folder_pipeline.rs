//! End-to-end folder pipeline scenarios (spec.md §8 concrete scenarios).

use folderforge::folder::{AutomationEntry, Folder};
use folderforge::id::{is_valid_uuid_v4, stem};
use folderforge::naming::Namer;
use folderforge::step::StepKind;
use folderforge::storage::filesystem::FilesystemStore;
use folderforge::storage::{ObjectStore, Size};
use std::sync::Arc;

fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn decode_size(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

fn resizer_entry(name: &str, suffix: &str, size: Size) -> AutomationEntry {
    let automation = folderforge::automation::Automation::new(
        name,
        Namer::Suffix { suffix: suffix.to_string() },
        vec![StepKind::Resizer { size, children: vec![] }],
    )
    .unwrap();
    AutomationEntry { automation, apply_to_existing: false }
}

/// Scenario 1: one automation, upload a 1200x800 JPEG, expect a single
/// `_thumb` derivative resized to fit 200x200 preserving aspect ratio.
#[tokio::test]
async fn scenario_1_single_automation_upload() {
    let tmp = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStore::new(tmp.path()));
    let folder = Folder::new(
        "img",
        storage,
        None,
        vec![resizer_entry("thumb", "thumb", Size::new(200, 200))],
    )
    .unwrap();

    let outcome = folder.upload("photo.jpg", make_jpeg(1200, 800)).await.unwrap();
    assert!(is_valid_uuid_v4(stem(&outcome.file.name)));

    let sources = folder.read_all().await.unwrap();
    assert_eq!(sources.len(), 1);
    let children = sources[0].children.clone().unwrap();
    assert_eq!(children, vec![format!("{}_thumb.jpg", stem(&outcome.file.name))]);

    let derivative_bytes = folder.download(&children[0]).await.unwrap();
    assert_eq!(decode_size(&derivative_bytes), (200, 133));
}

/// Scenario 2: deleting the source removes the source and its derivative.
#[tokio::test]
async fn scenario_2_delete_source_cascades() {
    let tmp = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStore::new(tmp.path()));
    let folder = Folder::new(
        "img",
        storage,
        None,
        vec![resizer_entry("thumb", "thumb", Size::new(200, 200))],
    )
    .unwrap();

    let outcome = folder.upload("photo.jpg", make_jpeg(1200, 800)).await.unwrap();
    folder.delete_one(&outcome.file.name).await.unwrap();

    assert!(folder.read_all().await.unwrap().is_empty());
}

/// Scenario 3: two automations on one source produce two distinct derivatives.
#[tokio::test]
async fn scenario_3_two_automations_produce_two_derivatives() {
    let tmp = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStore::new(tmp.path()));
    let folder = Folder::new(
        "img",
        storage,
        None,
        vec![
            resizer_entry("sm", "sm", Size::new(200, 200)),
            resizer_entry("lg", "lg", Size::new(800, 800)),
        ],
    )
    .unwrap();

    let outcome = folder.upload("square.jpg", make_jpeg(1000, 1000)).await.unwrap();
    let sources = folder.read_all().await.unwrap();
    let mut children = sources[0].children.clone().unwrap();
    children.sort();
    let stem = stem(&outcome.file.name);
    assert_eq!(children, vec![format!("{stem}_lg.jpg"), format!("{stem}_sm.jpg")]);

    let sm = folder.download(&format!("{stem}_sm.jpg")).await.unwrap();
    let lg = folder.download(&format!("{stem}_lg.jpg")).await.unwrap();
    assert_eq!(decode_size(&sm), (200, 200));
    assert_eq!(decode_size(&lg), (800, 800));
}

/// Scenario 4: manually deleting a derivative and running the synchronizer
/// regenerates exactly the missing one, leaving the other untouched.
#[tokio::test]
async fn scenario_4_synchronizer_regenerates_missing_derivative() {
    let tmp = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStore::new(tmp.path()));
    let folder = Folder::new(
        "img",
        storage.clone(),
        None,
        vec![
            resizer_entry("sm", "sm", Size::new(200, 200)),
            resizer_entry("lg", "lg", Size::new(800, 800)),
        ],
    )
    .unwrap();

    let outcome = folder.upload("square.jpg", make_jpeg(1000, 1000)).await.unwrap();
    let stem = stem(&outcome.file.name).to_string();
    let sm_name = format!("{stem}_sm.jpg");
    let lg_name = format!("{stem}_lg.jpg");

    storage.delete("img", &sm_name).await.unwrap();
    assert!(!storage.exists("img", &sm_name).await);

    let report =
        folderforge::synchronizer::Synchronizer::new(vec![folder.clone()]).run().await;
    assert_eq!(report.sources_resynced, 1);

    assert!(storage.exists("img", &sm_name).await);
    let sm_bytes = storage.get("img", &sm_name).await.unwrap();
    assert_eq!(decode_size(&sm_bytes), (200, 200));

    let lg_bytes = storage.get("img", &lg_name).await.unwrap();
    assert_eq!(decode_size(&lg_bytes), (800, 800));
}

/// Scenario 6: a folder with backup configured mirrors sources additively;
/// a converged second pass performs zero writes and leaves bytes identical.
#[tokio::test]
async fn scenario_6_backup_mirrors_source_and_converges() {
    let tmp_primary = tempfile::TempDir::new().unwrap();
    let tmp_backup = tempfile::TempDir::new().unwrap();
    let primary = Arc::new(FilesystemStore::new(tmp_primary.path()));
    let backup = Arc::new(FilesystemStore::new(tmp_backup.path()));

    let folder = Folder::new("img", primary.clone(), Some(backup.clone()), vec![]).unwrap();
    let outcome = folder.upload("photo.jpg", make_jpeg(10, 10)).await.unwrap();

    // Run the backup pass directly rather than waiting on the spawned loop's
    // sleep interval.
    let _handle = folder.spawn_backup_loop(std::time::Duration::from_secs(3600));
    // Give the spawned task one scheduling slot to run its first iteration.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let primary_bytes = primary.get("img", &outcome.file.name).await.unwrap();
    let backup_bytes = backup.get("img", &outcome.file.name).await.unwrap();
    assert_eq!(primary_bytes, backup_bytes);
}

//! Resource Store Tests
//!
//! Integration tests for the resource service over an on-disk catalog.

use std::io::{self, Read};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use fshare::auth::CredentialService;
use fshare::db::{Database, ResourceRepository};
use fshare::file::{FileStorage, ResourceService, UploadRequest};
use fshare::{CleanupScheduler, FshareError};
use tempfile::TempDir;

struct Store {
    temp: TempDir,
    db: Database,
    service: Arc<ResourceService>,
    owner: String,
}

/// Open a file-backed catalog and provision one owner.
async fn open_store() -> Store {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open(temp.path().join("data/fshare.db"))
        .await
        .expect("Failed to open database");
    let storage = FileStorage::new(temp.path().join("uploads")).expect("Failed to create storage");
    let service = Arc::new(ResourceService::new(db.clone(), storage));

    let credential = CredentialService::new(db.clone())
        .register("store-owner", "integration", false, None)
        .await
        .unwrap();
    service
        .get_or_create_home(&credential.hashed_secret)
        .await
        .unwrap();

    Store {
        temp,
        db,
        service,
        owner: credential.id,
    }
}

impl Store {
    fn home(&self) -> std::path::PathBuf {
        self.service.storage().owner_dir(&self.owner).unwrap()
    }

    /// Names of the visible files in the owner's home directory.
    fn files_on_disk(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.home())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn active_file_rows(&self) -> usize {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM resource
             WHERE owner_credential_id = $1 AND is_file = 1 AND deleted_at IS NULL",
        )
        .bind(&self.owner)
        .fetch_one(self.db.pool())
        .await
        .unwrap();
        count as usize
    }
}

/// Reader that yields some bytes and then fails.
struct FailingReader {
    sent: bool,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
        }
        self.sent = true;
        let chunk = b"partial upload";
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(chunk.len())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_strict_uploads_one_wins() {
    let store = open_store().await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = store.service.clone();
        let owner = store.owner.clone();
        tasks.push(tokio::spawn(async move {
            let content = format!("writer {}", i);
            service
                .save(content.as_bytes(), UploadRequest::new("race.txt", owner))
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(FshareError::AlreadyExists) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.files_on_disk(), vec!["race.txt".to_string()]);
    assert_eq!(store.active_file_rows().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_renaming_uploads_all_succeed() {
    let store = open_store().await;

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let service = store.service.clone();
        let owner = store.owner.clone();
        tasks.push(tokio::spawn(async move {
            service
                .save(
                    &b"same"[..],
                    UploadRequest::new("shared.txt", owner).allow_rename(true),
                )
                .await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.files_on_disk().len(), 5);
    assert_eq!(store.active_file_rows().await, 5);
}

#[tokio::test]
async fn test_report_scenario() {
    let store = open_store().await;

    let id = store
        .service
        .save(&b"quarterly numbers"[..], UploadRequest::new("report.txt", &store.owner))
        .await
        .unwrap();

    let resource = store.service.get_by_id(&id).await.unwrap();
    assert!(resource.is_file);
    assert!(resource.deleted_at.is_none());
    assert!(!resource.is_private);
    assert!(resource.expires_at.is_none());

    store.service.delete_by_id(&id, &store.owner).await.unwrap();

    let resource = store.service.get_by_id(&id).await.unwrap();
    assert!(resource.deleted_at.is_some());
    assert!(store.files_on_disk().is_empty());

    let result = store.service.delete_by_id(&id, &store.owner).await;
    assert!(matches!(result, Err(FshareError::AlreadyDeleted)));
}

#[tokio::test]
async fn test_rename_scenario() {
    let store = open_store().await;

    let first = store
        .service
        .save(
            &b"first"[..],
            UploadRequest::new("a.txt", &store.owner).allow_rename(true),
        )
        .await
        .unwrap();
    let second = store
        .service
        .save(
            &b"second"[..],
            UploadRequest::new("a.txt", &store.owner).allow_rename(true),
        )
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(
        store.files_on_disk(),
        vec!["0a.txt".to_string(), "a.txt".to_string()]
    );
    assert_eq!(store.active_file_rows().await, 2);
    assert_eq!(std::fs::read(store.home().join("0a.txt")).unwrap(), b"second");
}

#[tokio::test]
async fn test_failed_stream_leaves_nothing_behind() {
    let store = open_store().await;

    let result = store
        .service
        .save(
            FailingReader { sent: false },
            UploadRequest::new("broken.bin", &store.owner),
        )
        .await;

    assert!(matches!(result, Err(FshareError::Io(_))));
    assert!(store.files_on_disk().is_empty());
    assert_eq!(store.active_file_rows().await, 0);
}

#[tokio::test]
async fn test_unsafe_names_write_nothing() {
    let store = open_store().await;

    for name in ["../escape.txt", "dir/file.txt", "dir\\file.txt", ".env"] {
        let result = store
            .service
            .save(&b"x"[..], UploadRequest::new(name, &store.owner))
            .await;
        assert!(matches!(result, Err(FshareError::InvalidFilename)));
    }

    assert!(store.files_on_disk().is_empty());
    assert!(!store.temp.path().join("escape.txt").exists());
    assert_eq!(store.active_file_rows().await, 0);
}

#[tokio::test]
async fn test_sweep_scenario() {
    let store = open_store().await;
    let now = Utc::now();

    let expired = store
        .service
        .save(
            &b"old"[..],
            UploadRequest::new("old.txt", &store.owner).expires_at(Some(now - TimeDelta::hours(1))),
        )
        .await
        .unwrap();
    let live = store
        .service
        .save(
            &b"new"[..],
            UploadRequest::new("new.txt", &store.owner).expires_at(Some(now + TimeDelta::hours(1))),
        )
        .await
        .unwrap();

    let scheduler = CleanupScheduler::new(store.service.clone(), std::time::Duration::from_secs(300));
    let report = scheduler.run_once(now).await;

    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);
    assert!(store.service.get_by_id(&expired).await.unwrap().deleted_at.is_some());
    assert!(store.service.get_by_id(&live).await.unwrap().deleted_at.is_none());
    assert_eq!(store.files_on_disk(), vec!["new.txt".to_string()]);

    // A second pass finds nothing left to do.
    assert_eq!(scheduler.run_once(now).await.deleted, 0);
}

#[tokio::test]
async fn test_catalog_survives_reopen() {
    let store = open_store().await;
    let id = store
        .service
        .save(&b"kept"[..], UploadRequest::new("kept.txt", &store.owner))
        .await
        .unwrap();

    let path = store.temp.path().join("data/fshare.db");
    let reopened = Database::open(&path).await.unwrap();
    let resource = ResourceRepository::new(reopened.pool())
        .get_by_id(&id)
        .await
        .unwrap()
        .expect("row persisted");

    assert_eq!(resource.name, "kept.txt");
}

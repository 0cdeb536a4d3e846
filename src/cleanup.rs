//! Expired-resource cleanup for fshare.
//!
//! The scheduler periodically sweeps resources whose expiry has passed,
//! using the same deletion path as interactive deletes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::file::{ResourceService, SweepReport};

/// Default sweep interval in seconds (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Periodic expiry sweeper.
pub struct CleanupScheduler {
    resources: Arc<ResourceService>,
    interval: Duration,
}

impl CleanupScheduler {
    /// Create a new scheduler sweeping every `interval`.
    pub fn new(resources: Arc<ResourceService>, interval: Duration) -> Self {
        Self {
            resources,
            interval,
        }
    }

    /// Get the sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep.
    ///
    /// Failures are logged; an unreadable catalog yields an empty report.
    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
        match self.resources.sweep_expired(now).await {
            Ok(report) => {
                if report.deleted > 0 || report.failed > 0 {
                    info!(
                        deleted = report.deleted,
                        failed = report.failed,
                        "Expired resources swept"
                    );
                } else {
                    debug!("No expired resources to sweep");
                }
                report
            }
            Err(e) => {
                error!(error = %e, "Failed to list expired resources");
                SweepReport::default()
            }
        }
    }

    /// Start sweeping in a background task.
    ///
    /// The first sweep runs immediately.
    pub fn spawn(self) -> CleanupHandle {
        let token = CancellationToken::new();
        let child = token.child_token();

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "Cleanup scheduler started"
            );

            let mut timer = interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = timer.tick() => {
                        self.run_once(Utc::now()).await;
                    }
                }
            }

            info!("Cleanup scheduler stopped");
        });

        CleanupHandle { token, task }
    }
}

/// Handle to a running [`CleanupScheduler`].
pub struct CleanupHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the scheduler and wait for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Cleanup scheduler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialService;
    use crate::db::Database;
    use crate::file::{FileStorage, UploadRequest};
    use chrono::TimeDelta;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<ResourceService>, String) {
        let temp = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let storage = FileStorage::new(temp.path()).unwrap();
        let service = Arc::new(ResourceService::new(db.clone(), storage));

        let cred = CredentialService::new(db)
            .register("sweeper", "", false, None)
            .await
            .unwrap();
        service.get_or_create_home(&cred.hashed_secret).await.unwrap();

        (temp, service, cred.id)
    }

    #[tokio::test]
    async fn test_run_once_deletes_only_expired() {
        let (_temp, service, owner) = setup().await;
        let now = Utc::now();

        let expired = service
            .save(
                &b"old"[..],
                UploadRequest::new("old.txt", &owner).expires_at(Some(now - TimeDelta::hours(1))),
            )
            .await
            .unwrap();
        let live = service
            .save(
                &b"new"[..],
                UploadRequest::new("new.txt", &owner).expires_at(Some(now + TimeDelta::hours(1))),
            )
            .await
            .unwrap();

        let scheduler = CleanupScheduler::new(service.clone(), Duration::from_secs(60));
        let report = scheduler.run_once(now).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);
        assert!(service.get_by_id(&expired).await.unwrap().deleted_at.is_some());
        assert!(service.get_by_id(&live).await.unwrap().deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_spawned_scheduler_sweeps_and_shuts_down() {
        let (_temp, service, owner) = setup().await;

        let id = service
            .save(
                &b"x"[..],
                UploadRequest::new("x.txt", &owner)
                    .expires_at(Some(Utc::now() - TimeDelta::seconds(1))),
            )
            .await
            .unwrap();

        let handle =
            CleanupScheduler::new(service.clone(), Duration::from_millis(20)).spawn();

        let mut swept = false;
        for _ in 0..100 {
            if service.get_by_id(&id).await.unwrap().deleted_at.is_some() {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(swept);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_with_long_interval() {
        let (_temp, service, _owner) = setup().await;

        let handle = CleanupScheduler::new(service, Duration::from_secs(3600)).spawn();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_interval() {
        let (_temp, service, _owner) = setup().await;
        let scheduler = CleanupScheduler::new(service, Duration::from_secs(42));
        assert_eq!(scheduler.interval(), Duration::from_secs(42));
    }
}

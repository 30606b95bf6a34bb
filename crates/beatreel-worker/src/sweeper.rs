//! Background retention sweep over the output and scratch directories.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beatreel_media::{sweep_older_than, SweepStats};

use crate::config::WorkerConfig;
use crate::metrics;
use crate::retry::FailureTracker;

/// Consecutive failures logged per directory before going quiet.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Removes files older than the retention threshold.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dirs: Vec<PathBuf>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(dirs: Vec<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self {
            dirs,
            retention,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            vec![config.output_dir.clone(), config.scratch_dir.clone()],
            config.retention,
            config.sweep_interval,
        )
    }

    /// One pass over every directory. Directories that fail are skipped.
    pub async fn sweep_once(&self, trackers: &mut [FailureTracker]) -> SweepStats {
        let mut total = SweepStats::default();
        for (dir, tracker) in self.dirs.iter().zip(trackers.iter_mut()) {
            match sweep_older_than(dir, self.retention).await {
                Ok(stats) => {
                    tracker.record_success();
                    total.files_removed += stats.files_removed;
                    total.dirs_removed += stats.dirs_removed;
                    total.bytes_freed += stats.bytes_freed;
                }
                Err(e) => {
                    if tracker.record_failure() {
                        warn!(dir = %dir.display(), error = %e, "Retention sweep failed");
                    }
                }
            }
        }
        metrics::record_sweep(total.files_removed, total.bytes_freed);
        total
    }

    /// Sweep every interval until `cancel` fires. The first pass runs
    /// immediately.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            dirs = self.dirs.len(),
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        let mut trackers: Vec<FailureTracker> = self
            .dirs
            .iter()
            .map(|_| FailureTracker::new(MAX_LOGGED_FAILURES))
            .collect();
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.sweep_once(&mut trackers).await;
                    if stats.files_removed > 0 || stats.dirs_removed > 0 {
                        info!(
                            files = stats.files_removed,
                            dirs = stats.dirs_removed,
                            bytes = stats.bytes_freed,
                            "Retention sweep removed expired files"
                        );
                    } else {
                        debug!("Retention sweep found nothing to remove");
                    }
                }
            }
        }
        info!("Retention sweeper stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_once_with_zero_retention() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();
        tokio::fs::write(out.join("old.mp4"), b"data").await.unwrap();

        let sweeper = RetentionSweeper::new(
            vec![out.clone(), dir.path().join("missing")],
            Duration::ZERO,
            Duration::from_secs(60),
        );
        let mut trackers = vec![FailureTracker::new(1), FailureTracker::new(1)];
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = sweeper.sweep_once(&mut trackers).await;

        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.bytes_freed, 4);
        assert!(!out.join("old.mp4").exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = RetentionSweeper::new(
            vec![dir.path().to_path_buf()],
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        let cancel = CancellationToken::new();
        let handle = sweeper.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

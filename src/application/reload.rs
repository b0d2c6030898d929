// Staleness monitor and reloader - rebuilds the core when the upstream marker advances
use crate::application::snapshot_source::{SnapshotError, SnapshotSource};
use crate::application::station_core::StationCore;
use crate::application::station_service::{ServiceError, StationService};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Tracks when the upstream marker was last probed and the newest marker seen.
#[derive(Debug, Clone, PartialEq)]
pub struct StalenessMonitor {
    archive_interval_ms: i64,
    last_probe_ms: i64,
    last_good_stamp: i64,
}

impl StalenessMonitor {
    /// The marker starts at the startup time so the first reload needs
    /// data newer than what the bootstrap fetched.
    pub fn new(archive_interval_ms: i64, started_ms: i64) -> Self {
        Self {
            archive_interval_ms,
            last_probe_ms: started_ms,
            last_good_stamp: started_ms / 1_000,
        }
    }

    pub fn last_good_stamp(&self) -> i64 {
        self.last_good_stamp
    }

    /// More than one archive interval since the last probe
    pub fn probe_due(&self, now_ms: i64) -> bool {
        now_ms - self.last_probe_ms > self.archive_interval_ms
    }

    pub fn mark_probed(&mut self, now_ms: i64) {
        self.last_probe_ms = now_ms;
    }

    pub fn is_newer(&self, stamp: i64) -> bool {
        stamp > self.last_good_stamp
    }

    pub fn accept_marker(&mut self, stamp: i64) {
        self.last_good_stamp = self.last_good_stamp.max(stamp);
    }

    pub fn set_archive_interval(&mut self, archive_interval_ms: i64) {
        self.archive_interval_ms = archive_interval_ms;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    NotDue,
    /// Another check is already in flight
    Busy,
    Fresh,
    Reloaded { last_good_stamp: i64 },
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub struct Reloader {
    source: Arc<dyn SnapshotSource>,
    service: StationService,
    monitor: Mutex<StalenessMonitor>,
}

impl Reloader {
    pub fn new(source: Arc<dyn SnapshotSource>, service: StationService, monitor: StalenessMonitor) -> Self {
        Self {
            source,
            service,
            monitor: Mutex::new(monitor),
        }
    }

    pub async fn last_good_stamp(&self) -> i64 {
        self.monitor.lock().await.last_good_stamp()
    }

    /// Probes the marker when due and, if it advanced, fetches a new snapshot
    /// and swaps the whole core. The marker is only committed once the swap
    /// succeeded, so a failed fetch is retried on the next due probe.
    pub async fn check(&self, now_ms: i64) -> Result<ReloadOutcome, ReloadError> {
        let Ok(mut monitor) = self.monitor.try_lock() else {
            return Ok(ReloadOutcome::Busy);
        };
        if !monitor.probe_due(now_ms) {
            return Ok(ReloadOutcome::NotDue);
        }
        monitor.mark_probed(now_ms);

        let stamp = self.source.fetch_last_good_stamp().await?;
        if !monitor.is_newer(stamp) {
            tracing::debug!(stamp, current = monitor.last_good_stamp(), "snapshot still fresh");
            return Ok(ReloadOutcome::Fresh);
        }

        tracing::info!(stamp, "upstream marker advanced, reloading snapshot");
        let snapshot = self.source.fetch_snapshot().await?;
        let core = StationCore::from_snapshot(snapshot, now_ms);
        let archive_interval_ms = core.archive_interval_ms();
        self.service.replace(core, stamp).await?;

        monitor.accept_marker(stamp);
        monitor.set_archive_interval(archive_interval_ms);
        Ok(ReloadOutcome::Reloaded {
            last_good_stamp: stamp,
        })
    }
}

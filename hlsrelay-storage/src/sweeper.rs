// Cleanup sweeper for the local public directory
//
// Layout scanned: "<public_hls_dir>/<track>/<segment>". Top-level files (the
// master playlist) are never touched. Within a track directory a segment is
// deleted when it is older than the retention window AND no playlist in that
// directory still references it. A directory whose playlist cannot be decoded
// is skipped for that tick.

use crate::playlist::referenced_names;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone)]
pub struct Sweeper {
    root: PathBuf,
    interval: Duration,
    max_age: Duration,
}

/// Running sweeper task; dropping it leaves the task running until shutdown
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current tick to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Sweeper task ended abnormally: {}", e);
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn is_playlist(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("m3u8"))
}

impl Sweeper {
    pub fn new(root: impl Into<PathBuf>, interval: Duration, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
            max_age,
        }
    }

    /// Spawn the periodic sweep; cancelled through the returned handle
    #[must_use]
    pub fn start(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SweeperHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        let mut interval = time::interval(self.interval);
        // The first tick completes immediately; nothing is old enough yet
        interval.tick().await;

        tracing::info!(
            "Segment sweeper started: root={:?}, interval={:?}, max_age={:?}",
            self.root,
            self.interval,
            self.max_age
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.sweep_once().await {
                Ok(report) if report.deleted > 0 => {
                    tracing::info!(
                        "Swept {} expired segments (scanned {}, older than {:?})",
                        report.deleted,
                        report.scanned,
                        self.max_age
                    );
                }
                Ok(_) => tracing::trace!("No expired segments to sweep"),
                Err(e) => tracing::error!("Segment sweep of {:?} failed: {}", self.root, e),
            }
        }

        tracing::info!("Segment sweeper stopped: root={:?}", self.root);
    }

    /// Run one pass over every track directory
    pub async fn sweep_once(&self) -> io::Result<SweepReport> {
        let mut report = SweepReport::default();
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            tracing::debug!("Sweep root does not exist: {:?}", self.root);
            return Ok(report);
        }

        let cutoff = SystemTime::now()
            .checked_sub(self.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut tracks = fs::read_dir(&self.root).await?;
        while let Some(entry) = tracks.next_entry().await? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }

            match self.sweep_track(&entry.path(), cutoff).await {
                Ok(track) => {
                    report.scanned += track.scanned;
                    report.deleted += track.deleted;
                }
                Err(e) => tracing::warn!("Skipping track {:?}: {}", entry.path(), e),
            }
        }

        Ok(report)
    }

    async fn sweep_track(&self, dir: &Path, cutoff: SystemTime) -> io::Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut candidates = Vec::new();
        let mut referenced = HashSet::new();

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            if is_playlist(&path) {
                let raw = fs::read(&path).await?;
                let names = referenced_names(&raw).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("cannot decode playlist {}", path.display()),
                    )
                })?;
                referenced.extend(names);
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            // In-flight temp files of atomic writes
            if name.starts_with('.') {
                continue;
            }

            report.scanned += 1;
            if let Ok(modified) = metadata.modified() {
                if modified < cutoff {
                    candidates.push((name, path));
                }
            }
        }

        for (name, path) in candidates {
            if referenced.contains(&name) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::trace!("Deleted expired segment: {:?}", path);
                }
                Err(e) => tracing::warn!("Failed to delete {:?}: {}", path, e),
            }
        }

        Ok(report)
    }
}

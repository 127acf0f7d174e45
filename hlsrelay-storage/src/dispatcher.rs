// Per-track hook dispatch
//
// Hooks for one track must run in encoder order, while a slow upload on one
// track must not hold up the others. Each track directory gets its own lane:
// an unbounded channel drained by a dedicated worker task. The master
// playlist has a lane of its own.

use crate::provider::StorageProvider;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One notification from the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    Segment(PathBuf),
    VariantPlaylist(PathBuf),
    MasterPlaylist(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseHookError {
    #[error("empty hook line")]
    Empty,
    #[error("unknown hook kind {0:?}, expected segment, variant or master")]
    UnknownKind(String),
    #[error("missing path for {0} hook")]
    MissingPath(String),
}

impl FromStr for HookEvent {
    type Err = ParseHookError;

    /// Parses "segment <path>", "variant <path>" or "master <path>"
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseHookError::Empty);
        }

        let (kind, path) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let path = path.trim();
        if path.is_empty() {
            return Err(ParseHookError::MissingPath(kind.to_string()));
        }

        let path = PathBuf::from(path);
        match kind {
            "segment" => Ok(Self::Segment(path)),
            "variant" => Ok(Self::VariantPlaylist(path)),
            "master" => Ok(Self::MasterPlaylist(path)),
            other => Err(ParseHookError::UnknownKind(other.to_string())),
        }
    }
}

impl HookEvent {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Segment(p) | Self::VariantPlaylist(p) | Self::MasterPlaylist(p) => p,
        }
    }

    fn lane(&self) -> Lane {
        match self {
            Self::MasterPlaylist(_) => Lane::Master,
            Self::Segment(p) | Self::VariantPlaylist(p) => Lane::Track(
                p.parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Lane {
    Master,
    Track(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub handled: usize,
    pub failed: usize,
}

pub struct HookDispatcher {
    provider: Arc<dyn StorageProvider>,
    lanes: HashMap<Lane, mpsc::UnboundedSender<HookEvent>>,
    workers: JoinSet<DispatchSummary>,
}

impl HookDispatcher {
    #[must_use]
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            lanes: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    /// Queue an event on its track's lane, starting the lane on first use
    pub fn dispatch(&mut self, event: HookEvent) {
        let Self {
            provider,
            lanes,
            workers,
        } = self;

        let lane = event.lane();
        let sender = lanes.entry(lane.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tracing::debug!(?lane, "Starting hook lane");
            workers.spawn(run_lane(Arc::clone(provider), lane, rx));
            tx
        });

        if let Err(e) = sender.send(event) {
            tracing::error!(path = %e.0.path().display(), "Hook lane closed, event dropped");
        }
    }

    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Drain every lane, then shut the provider down
    pub async fn shutdown(mut self) -> DispatchSummary {
        self.lanes.clear();

        let mut summary = DispatchSummary::default();
        while let Some(result) = self.workers.join_next().await {
            match result {
                Ok(lane) => {
                    summary.handled += lane.handled;
                    summary.failed += lane.failed;
                }
                Err(e) => tracing::error!("Hook lane panicked: {}", e),
            }
        }

        self.provider.shutdown().await;
        tracing::info!(
            handled = summary.handled,
            failed = summary.failed,
            "Hook dispatcher stopped"
        );
        summary
    }
}

async fn run_lane(
    provider: Arc<dyn StorageProvider>,
    lane: Lane,
    mut events: mpsc::UnboundedReceiver<HookEvent>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    while let Some(event) = events.recv().await {
        let result = match &event {
            HookEvent::Segment(path) => provider.segment_written(path).await,
            HookEvent::VariantPlaylist(path) => provider.variant_playlist_written(path).await,
            HookEvent::MasterPlaylist(path) => provider.master_playlist_written(path).await,
        };

        match result {
            Ok(()) => summary.handled += 1,
            Err(e) => {
                summary.failed += 1;
                // Failures stay local to this artifact; the lane keeps going
                tracing::error!(
                    path = %event.path().display(),
                    terminal = e.is_terminal(),
                    error = %e,
                    "Storage hook failed"
                );
            }
        }
    }

    tracing::debug!(?lane, handled = summary.handled, failed = summary.failed, "Hook lane drained");
    summary
}

// Hook sequencing shared by every provider
//
// Segment written:  persist -> mark persisted -> publish released playlists
//                   (a release whose write fails goes back in the queue)
// Variant written:  read -> rewrite -> admit -> publish now, or queue
// Master written:   persist verbatim
//
// Backends only supply `Destination`: where artifacts go. Only segments this
// process persisted count as fetchable; leftovers from an earlier stream at
// the same keys never unblock a playlist.

use crate::error::{Result, StorageError};
use crate::gate::{Admission, PendingPlaylist, PublishGate};
use crate::layout::{ArtifactKind, ArtifactPath};
use crate::playlist::rewrite_variant_playlist;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// What to write for an artifact
pub(crate) enum ArtifactBody {
    /// The file the encoder left in the working directory
    Staged,
    /// Content produced here (a rewritten playlist)
    Bytes(Bytes),
}

#[async_trait]
pub(crate) trait Destination: Send + Sync {
    fn working_root(&self) -> &Path;

    fn serving_host(&self) -> &str;

    fn gate(&self) -> &PublishGate;

    /// Write one artifact to its serving location, returning that location
    async fn persist(&self, artifact: &ArtifactPath, body: ArtifactBody, attempt: u32) -> Result<String>;
}

pub(crate) async fn read_staged(working_root: &Path, artifact: &ArtifactPath) -> Result<Bytes> {
    let staged = artifact.staged_path(working_root);
    tokio::fs::read(&staged)
        .await
        .map(Bytes::from)
        .map_err(|e| StorageError::io(staged, e))
}

pub(crate) async fn segment_written<D>(dest: &D, path: &Path) -> Result<()>
where
    D: Destination + ?Sized,
{
    let artifact = ArtifactPath::new(ArtifactKind::Segment, path)?;
    let location = dest.persist(&artifact, ArtifactBody::Staged, 1).await?;
    tracing::debug!(path = %path.display(), %location, "Segment persisted");

    for pending in dest.gate().mark_persisted(&artifact) {
        let playlist = pending.artifact.relative().display().to_string();
        match publish(dest, pending.clone()).await {
            Ok(location) => {
                tracing::debug!(path = %playlist, %location, "Published queued variant playlist");
            }
            // The segment itself is persisted. The playlist stays queued and
            // is retried on the next segment or replaced by the next update.
            Err(e) => {
                tracing::error!(path = %playlist, error = %e, "Failed to publish queued variant playlist");
                dest.gate().requeue(pending);
            }
        }
    }

    Ok(())
}

pub(crate) async fn variant_playlist_written<D>(dest: &D, path: &Path) -> Result<()>
where
    D: Destination + ?Sized,
{
    let artifact = ArtifactPath::new(ArtifactKind::VariantPlaylist, path)?;
    let raw = read_staged(dest.working_root(), &artifact).await?;
    let rewritten = rewrite_variant_playlist(&artifact, &raw, dest.serving_host())?;

    let pending = PendingPlaylist {
        artifact,
        body: Bytes::from(rewritten.body),
        references: rewritten.references,
    };

    match dest.gate().admit(pending) {
        Admission::Publish(pending) => {
            let location = publish(dest, pending).await?;
            tracing::debug!(path = %path.display(), %location, "Variant playlist published");
        }
        Admission::Queued { missing } => {
            tracing::debug!(
                path = %path.display(),
                ?missing,
                "Variant playlist queued until its segments are persisted"
            );
        }
    }

    Ok(())
}

pub(crate) async fn master_playlist_written<D>(dest: &D, path: &Path) -> Result<()>
where
    D: Destination + ?Sized,
{
    let artifact = ArtifactPath::new(ArtifactKind::MasterPlaylist, path)?;
    let location = dest.persist(&artifact, ArtifactBody::Staged, 1).await?;
    tracing::debug!(path = %path.display(), %location, "Master playlist persisted");
    Ok(())
}

async fn publish<D>(dest: &D, pending: PendingPlaylist) -> Result<String>
where
    D: Destination + ?Sized,
{
    let location = dest
        .persist(&pending.artifact, ArtifactBody::Bytes(pending.body), 1)
        .await?;
    dest.gate().record_published(&pending.artifact, &pending.references);
    Ok(location)
}

/// Log playlists that never became publishable (teardown), returning how
/// many were dropped
pub(crate) fn report_abandoned(gate: &PublishGate) -> usize {
    let abandoned = gate.drain();
    for pending in &abandoned {
        let missing: Vec<String> = gate
            .missing_references(&pending.references)
            .iter()
            .map(|r| r.object_key())
            .collect();
        tracing::warn!(
            path = %pending.artifact.relative().display(),
            ?missing,
            "Variant playlist still queued at shutdown, dropped"
        );
    }
    abandoned.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_abandoned_drains_queue() {
        let gate = PublishGate::new();
        let segment = ArtifactPath::new(ArtifactKind::Segment, "hls/0/seg1.ts").unwrap();
        let pending = PendingPlaylist {
            artifact: ArtifactPath::new(ArtifactKind::VariantPlaylist, "hls/0/stream.m3u8").unwrap(),
            body: Bytes::from_static(b"#EXTM3U\n"),
            references: vec![segment.clone()],
        };
        assert!(matches!(gate.admit(pending), Admission::Queued { .. }));

        assert_eq!(report_abandoned(&gate), 1);
        assert_eq!(gate.queued_len(), 0);

        // Nothing left to release once dropped
        assert!(gate.mark_persisted(&segment).is_empty());
        assert_eq!(report_abandoned(&gate), 0);
    }
}

// Publish gate
//
// Tracks which segments are fetchable at their destination and holds back
// variant playlists that reference anything else. A playlist is handed out
// for publishing only once every segment it references has been persisted;
// until then it sits in the queue keyed by its destination, and a newer
// version of the same playlist replaces the queued one.
//
// All state lives behind one mutex so the "check references, then queue"
// step and the "segment persisted, release playlists" step cannot interleave.

use crate::layout::ArtifactPath;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// A rewritten variant playlist waiting to become visible
#[derive(Debug, Clone)]
pub struct PendingPlaylist {
    pub artifact: ArtifactPath,
    pub body: Bytes,
    pub references: Vec<ArtifactPath>,
}

impl PendingPlaylist {
    fn destination(&self) -> String {
        self.artifact.object_key()
    }
}

#[derive(Debug)]
pub enum Admission {
    /// Every reference is persisted; write the playlist now
    Publish(PendingPlaylist),
    /// Held back until the listed segment keys are persisted
    Queued { missing: Vec<String> },
}

#[derive(Default)]
struct GateState {
    persisted: HashSet<String>,
    queued: HashMap<String, PendingPlaylist>,
    /// Segment keys referenced by the last published version of each playlist
    published: HashMap<String, Vec<String>>,
}

impl GateState {
    fn missing(&self, references: &[ArtifactPath]) -> Vec<String> {
        references
            .iter()
            .map(ArtifactPath::object_key)
            .filter(|key| !self.persisted.contains(key))
            .collect()
    }
}

#[derive(Default)]
pub struct PublishGate {
    state: Mutex<GateState>,
}

impl PublishGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// References not yet known to be persisted
    pub fn missing_references<'a>(&self, references: &'a [ArtifactPath]) -> Vec<&'a ArtifactPath> {
        let state = self.state.lock();
        references
            .iter()
            .filter(|r| !state.persisted.contains(&r.object_key()))
            .collect()
    }

    /// Record a persisted segment and release every queued playlist it unblocks
    pub fn mark_persisted(&self, segment: &ArtifactPath) -> Vec<PendingPlaylist> {
        let mut state = self.state.lock();
        state.persisted.insert(segment.object_key());

        let ready: Vec<String> = state
            .queued
            .iter()
            .filter(|(_, pending)| state.missing(&pending.references).is_empty())
            .map(|(key, _)| key.clone())
            .collect();

        ready
            .iter()
            .filter_map(|key| state.queued.remove(key))
            .collect()
    }

    /// Put back a released playlist whose write failed.
    ///
    /// A newer version queued in the meantime wins; the next segment
    /// persisted releases the playlist again.
    pub fn requeue(&self, pending: PendingPlaylist) {
        self.state
            .lock()
            .queued
            .entry(pending.destination())
            .or_insert(pending);
    }

    /// Decide whether a playlist may be published now.
    ///
    /// References are re-checked under the lock. Publishing supersedes any
    /// older queued version of the same playlist.
    pub fn admit(&self, pending: PendingPlaylist) -> Admission {
        let mut state = self.state.lock();
        let missing = state.missing(&pending.references);
        let destination = pending.destination();

        if missing.is_empty() {
            state.queued.remove(&destination);
            Admission::Publish(pending)
        } else {
            state.queued.insert(destination, pending);
            Admission::Queued { missing }
        }
    }

    /// Forget segments that slid out of a playlist that is now visible
    pub fn record_published(&self, playlist: &ArtifactPath, references: &[ArtifactPath]) {
        let current: Vec<String> = references.iter().map(ArtifactPath::object_key).collect();
        let mut state = self.state.lock();

        if let Some(previous) = state.published.insert(playlist.object_key(), current.clone()) {
            for key in previous {
                if !current.contains(&key) {
                    state.persisted.remove(&key);
                }
            }
        }
    }

    #[must_use]
    pub fn is_queued(&self, playlist: &ArtifactPath) -> bool {
        self.state.lock().queued.contains_key(&playlist.object_key())
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Remove and return everything still queued (teardown)
    pub fn drain(&self) -> Vec<PendingPlaylist> {
        self.state.lock().queued.drain().map(|(_, p)| p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArtifactKind;

    fn segment(path: &str) -> ArtifactPath {
        ArtifactPath::new(ArtifactKind::Segment, path).unwrap()
    }

    fn pending(path: &str, refs: &[&str], body: &'static str) -> PendingPlaylist {
        PendingPlaylist {
            artifact: ArtifactPath::new(ArtifactKind::VariantPlaylist, path).unwrap(),
            body: Bytes::from_static(body.as_bytes()),
            references: refs.iter().map(|r| segment(r)).collect(),
        }
    }

    #[test]
    fn test_playlist_waits_for_segment() {
        let gate = PublishGate::new();
        gate.mark_persisted(&segment("hls/0/seg0.ts"));

        let admission = gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg0.ts", "hls/0/seg1.ts"], "v1"));
        match admission {
            Admission::Queued { missing } => assert_eq!(missing, vec!["hls/0/seg1.ts"]),
            Admission::Publish(_) => panic!("published before seg1 was persisted"),
        }
        assert_eq!(gate.queued_len(), 1);

        let released = gate.mark_persisted(&segment("hls/0/seg1.ts"));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].body, Bytes::from_static(b"v1"));
        assert_eq!(gate.queued_len(), 0);
    }

    #[test]
    fn test_newer_version_replaces_queued() {
        let gate = PublishGate::new();

        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg1.ts"], "v1"));
        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg1.ts", "hls/0/seg2.ts"], "v2"));
        assert_eq!(gate.queued_len(), 1);

        assert!(gate.mark_persisted(&segment("hls/0/seg1.ts")).is_empty());
        let released = gate.mark_persisted(&segment("hls/0/seg2.ts"));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].body, Bytes::from_static(b"v2"));
    }

    #[test]
    fn test_publish_supersedes_queued() {
        let gate = PublishGate::new();
        let v1 = pending("hls/0/stream.m3u8", &["hls/0/seg1.ts"], "v1");
        let playlist = v1.artifact.clone();

        assert!(matches!(gate.admit(v1), Admission::Queued { .. }));
        assert!(gate.is_queued(&playlist));

        gate.mark_persisted(&segment("hls/0/seg2.ts"));
        assert!(matches!(
            gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg2.ts"], "v2")),
            Admission::Publish(_)
        ));
        assert!(!gate.is_queued(&playlist));

        // seg1 arriving late must not resurrect v1
        assert!(gate.mark_persisted(&segment("hls/0/seg1.ts")).is_empty());
    }

    #[test]
    fn test_tracks_are_independent() {
        let gate = PublishGate::new();
        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg1.ts"], "high"));
        gate.admit(pending("hls/1/stream.m3u8", &["hls/1/seg1.ts"], "low"));

        let released = gate.mark_persisted(&segment("hls/1/seg1.ts"));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].body, Bytes::from_static(b"low"));
        assert_eq!(gate.queued_len(), 1);
    }

    #[test]
    fn test_record_published_prunes_slid_out_segments() {
        let gate = PublishGate::new();
        for name in ["hls/0/seg0.ts", "hls/0/seg1.ts", "hls/0/seg2.ts"] {
            gate.mark_persisted(&segment(name));
        }
        let playlist = ArtifactPath::new(ArtifactKind::VariantPlaylist, "hls/0/stream.m3u8").unwrap();

        gate.record_published(&playlist, &[segment("hls/0/seg0.ts"), segment("hls/0/seg1.ts")]);
        gate.record_published(&playlist, &[segment("hls/0/seg1.ts"), segment("hls/0/seg2.ts")]);

        let refs = [segment("hls/0/seg0.ts"), segment("hls/0/seg1.ts")];
        let missing = gate.missing_references(&refs);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name(), "seg0.ts");
    }

    #[test]
    fn test_requeue_after_failed_publish() {
        let gate = PublishGate::new();
        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg0.ts"], "v1"));

        let released = gate.mark_persisted(&segment("hls/0/seg0.ts"));
        assert_eq!(gate.queued_len(), 0);
        gate.requeue(released.into_iter().next().unwrap());
        assert_eq!(gate.queued_len(), 1);

        // Any later segment releases it again
        let released = gate.mark_persisted(&segment("hls/0/seg1.ts"));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].body, Bytes::from_static(b"v1"));
    }

    #[test]
    fn test_requeue_keeps_newer_version() {
        let gate = PublishGate::new();
        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg0.ts"], "v1"));
        let released = gate.mark_persisted(&segment("hls/0/seg0.ts"));

        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg0.ts", "hls/0/seg1.ts"], "v2"));
        gate.requeue(released.into_iter().next().unwrap());
        assert_eq!(gate.queued_len(), 1);

        let released = gate.mark_persisted(&segment("hls/0/seg1.ts"));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].body, Bytes::from_static(b"v2"));
    }

    #[test]
    fn test_drain() {
        let gate = PublishGate::new();
        gate.admit(pending("hls/0/stream.m3u8", &["hls/0/seg1.ts"], "v1"));
        assert_eq!(gate.drain().len(), 1);
        assert_eq!(gate.queued_len(), 0);
    }
}

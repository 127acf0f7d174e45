// Artifact layout
//
// The encoder reports paths relative to its working root:
// - segments:           "hls/<track>/<segment>.ts"
// - variant playlists:  "hls/<track>/stream.m3u8"
// - master playlist:    "hls/stream.m3u8"
//
// Every backend derives the same destination from such a path:
// - object key:  "hls/<track>/<name>" (master: "hls/<name>")
// - public path: "<public_hls_dir>/<track>/<name>" (master: "<public_hls_dir>/<name>")
// - serving URL: "<host>/hls/<track>/<name>"

use crate::error::{Result, StorageError};
use std::path::{Component, Path, PathBuf};

/// Fixed path segment every artifact is served under
pub const HLS_PATH_PREFIX: &str = "hls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Segment,
    VariantPlaylist,
    MasterPlaylist,
}

/// A validated encoder artifact and where it lands
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath {
    kind: ArtifactKind,
    relative: PathBuf,
    track: Option<String>,
    name: String,
}

impl ArtifactPath {
    /// Validate an encoder-reported path.
    ///
    /// Rejects absolute paths and parent-directory components so nothing can
    /// be written outside the destination root. Segments and variant playlists
    /// must live in a track directory.
    pub fn new(kind: ArtifactKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason| StorageError::InvalidPath {
            path: path.to_path_buf(),
            reason,
        };

        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("parent directory components are not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("path must be relative to the working root"))
                }
            }
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid("missing or non UTF-8 file name"))?
            .to_string();

        let track = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .map(str::to_string);

        if kind != ArtifactKind::MasterPlaylist && track.is_none() {
            return Err(invalid("segments and variant playlists must be inside a track directory"));
        }

        Ok(Self {
            kind,
            relative: path.to_path_buf(),
            track,
            name,
        })
    }

    /// A segment referenced from this playlist by a relative URI
    pub(crate) fn sibling(&self, uri: &str) -> Self {
        let relative = self
            .relative
            .parent()
            .map_or_else(|| PathBuf::from(uri), |dir| dir.join(uri));

        Self {
            kind: ArtifactKind::Segment,
            relative,
            track: self.track.clone(),
            name: uri.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Path as reported by the encoder, relative to the working root
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Track identifier: the name of the containing directory
    #[must_use]
    pub fn track(&self) -> Option<&str> {
        self.track.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_playlist(&self) -> bool {
        self.kind != ArtifactKind::Segment
    }

    /// Location of the staged file the encoder wrote
    #[must_use]
    pub fn staged_path(&self, working_root: &Path) -> PathBuf {
        working_root.join(&self.relative)
    }

    /// Object-store key, also used as the identity of the artifact
    #[must_use]
    pub fn object_key(&self) -> String {
        match (&self.kind, &self.track) {
            (ArtifactKind::MasterPlaylist, _) | (_, None) => {
                format!("{HLS_PATH_PREFIX}/{}", self.name)
            }
            (_, Some(track)) => format!("{HLS_PATH_PREFIX}/{track}/{}", self.name),
        }
    }

    /// Destination inside the publicly served directory
    #[must_use]
    pub fn public_path(&self, public_root: &Path) -> PathBuf {
        match (&self.kind, &self.track) {
            (ArtifactKind::MasterPlaylist, _) | (_, None) => public_root.join(&self.name),
            (_, Some(track)) => public_root.join(track).join(&self.name),
        }
    }
}

/// Absolute serving URL for a segment of `track`.
///
/// An empty host yields a same-origin path such as "/hls/720p/seg0.ts".
#[must_use]
pub fn segment_url(host: &str, track: &str, name: &str) -> String {
    format!(
        "{}/{HLS_PATH_PREFIX}/{track}/{}",
        host.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

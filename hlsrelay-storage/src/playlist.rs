// Variant playlist rewriting
//
// Relative segment URIs are replaced with absolute serving URLs of the form
// "<host>/hls/<track>/<uri>". The track comes from the playlist's own
// directory, so concurrent quality tracks never share state.
//
// Master playlists are never rewritten: their variant references stay
// relative so clients can pick a rendition.

use crate::error::{Result, StorageError};
use crate::layout::{segment_url, ArtifactKind, ArtifactPath};
use m3u8_rs::{parse_playlist_res, MediaPlaylist, Playlist};
use std::collections::HashSet;

/// A re-encoded variant playlist and the segments it depends on
#[derive(Debug, Clone)]
pub struct RewrittenPlaylist {
    pub body: Vec<u8>,
    /// Segments referenced by relative URI, in playlist order
    pub references: Vec<ArtifactPath>,
}

/// URIs that already point somewhere absolute are left as they are
fn is_absolute_uri(uri: &str) -> bool {
    uri.contains("://") || uri.starts_with('/')
}

fn decode_media_playlist(playlist: &ArtifactPath, raw: &[u8]) -> Result<MediaPlaylist> {
    match parse_playlist_res(raw) {
        Ok(Playlist::MediaPlaylist(media)) => Ok(media),
        Ok(Playlist::MasterPlaylist(_)) => Err(StorageError::NotAVariantPlaylist {
            path: playlist.relative().to_path_buf(),
        }),
        Err(e) => Err(StorageError::ManifestDecode {
            path: playlist.relative().to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Rewrite every relative segment URI of a variant playlist against `host`.
///
/// Entry order, durations and all other tags are preserved. A playlist that
/// fails to decode is rejected as a whole; nothing is partially rewritten.
pub fn rewrite_variant_playlist(
    playlist: &ArtifactPath,
    raw: &[u8],
    host: &str,
) -> Result<RewrittenPlaylist> {
    if playlist.kind() != ArtifactKind::VariantPlaylist {
        return Err(StorageError::NotAVariantPlaylist {
            path: playlist.relative().to_path_buf(),
        });
    }
    let Some(track) = playlist.track() else {
        return Err(StorageError::InvalidPath {
            path: playlist.relative().to_path_buf(),
            reason: "variant playlist is not inside a track directory",
        });
    };

    let mut media = decode_media_playlist(playlist, raw)?;

    let mut references = Vec::with_capacity(media.segments.len());
    for segment in &mut media.segments {
        if segment.uri.is_empty() || is_absolute_uri(&segment.uri) {
            continue;
        }
        references.push(playlist.sibling(&segment.uri));
        segment.uri = segment_url(host, track, &segment.uri);
    }

    let mut body = Vec::with_capacity(raw.len() + references.len() * host.len());
    media
        .write_to(&mut body)
        .map_err(|source| StorageError::Encode {
            path: playlist.relative().to_path_buf(),
            source,
        })?;

    tracing::trace!(
        path = %playlist.relative().display(),
        segments = media.segments.len(),
        "Rewrote variant playlist"
    );

    Ok(RewrittenPlaylist { body, references })
}

/// File names of the segments a playlist references, for retention checks.
///
/// Returns `None` for master playlists and anything that fails to decode.
#[must_use]
pub fn referenced_names(raw: &[u8]) -> Option<HashSet<String>> {
    match parse_playlist_res(raw) {
        Ok(Playlist::MediaPlaylist(media)) => Some(
            media
                .segments
                .iter()
                .filter_map(|s| s.uri.rsplit('/').next())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

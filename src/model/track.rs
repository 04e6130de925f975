use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::model::id::UserId;
use std::time::Duration;

use super::node::Severity;

/// Track metadata exactly as the node sends it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Milliseconds
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrack {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default)]
    pub plugin_info: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPlaylistInfo {
    pub name: String,
    /// -1 when nothing is selected
    #[serde(default)]
    pub selected_track: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPlaylist {
    pub info: RawPlaylistInfo,
    pub tracks: Vec<RawTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    Track,
    Playlist,
    Search,
    Empty,
    Error,
}

/// Body of `GET /loadtracks`; `data` is shaped by `load_type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTracksResponse {
    pub load_type: LoadType,
    #[serde(default)]
    pub data: Value,
}

/// A playable track plus whoever asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Opaque payload the node decodes back into audio
    pub encoded: String,
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub duration: Duration,
    pub is_stream: bool,
    pub is_seekable: bool,
    pub source: String,
    pub requester: Option<UserId>,
}

impl Track {
    pub fn with_requester(mut self, requester: Option<UserId>) -> Self {
        self.requester = requester;
        self
    }
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        let info = raw.info;

        Self {
            encoded: raw.encoded,
            identifier: info.identifier,
            title: info.title,
            author: info.author,
            uri: info.uri,
            artwork_url: info.artwork_url,
            isrc: info.isrc,
            duration: Duration::from_millis(info.length),
            is_stream: info.is_stream,
            is_seekable: info.is_seekable,
            source: info.source_name,
            requester: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub name: String,
    /// Index of the track the link pointed at, if any
    pub selected_track: Option<usize>,
    pub tracks: Vec<Track>,
    /// Sum of every member's duration
    pub duration: Duration,
}

impl Playlist {
    pub fn new(name: String, selected_track: Option<usize>, tracks: Vec<Track>) -> Self {
        let duration: Duration = tracks.iter().map(|t| t.duration).sum();

        Self {
            name,
            selected_track,
            tracks,
            duration,
        }
    }
}

/// Normalized outcome of a search or URL lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    /// A direct link resolved to one track
    Track { tracks: Vec<Track> },
    Search { tracks: Vec<Track> },
    Playlist(Playlist),
    /// Nothing matched; not a failure
    Empty,
    /// The node reported a load failure
    Error { reason: String, severity: Severity },
}

impl LoadResult {
    pub fn load_type(&self) -> LoadType {
        match self {
            LoadResult::Track { .. } => LoadType::Track,
            LoadResult::Search { .. } => LoadType::Search,
            LoadResult::Playlist(_) => LoadType::Playlist,
            LoadResult::Empty => LoadType::Empty,
            LoadResult::Error { .. } => LoadType::Error,
        }
    }

    /// Every track carried by the result, in order.
    pub fn tracks(&self) -> &[Track] {
        match self {
            LoadResult::Track { tracks } | LoadResult::Search { tracks } => tracks,
            LoadResult::Playlist(playlist) => &playlist.tracks,
            LoadResult::Empty | LoadResult::Error { .. } => &[],
        }
    }

    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            LoadResult::Track { tracks } | LoadResult::Search { tracks } => tracks,
            LoadResult::Playlist(playlist) => playlist.tracks,
            LoadResult::Empty | LoadResult::Error { .. } => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Track JSON as the node encodes it.
    pub(crate) fn raw_track_json(title: &str, length: u64) -> Value {
        json!({
            "encoded": format!("QAAA{}", title.replace(' ', "")),
            "info": {
                "identifier": title.to_lowercase().replace(' ', "-"),
                "isSeekable": true,
                "author": "Artist",
                "length": length,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": format!("https://example.com/{}", title.replace(' ', "")),
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {},
            "userData": {}
        })
    }

    pub(crate) fn track(title: &str, length: u64) -> Track {
        let raw: RawTrack = serde_json::from_value(raw_track_json(title, length)).unwrap();
        Track::from(raw)
    }

    #[test]
    fn test_track_from_raw() {
        let track = track("Never Gonna", 213_000);

        assert_eq!(track.title, "Never Gonna");
        assert_eq!(track.duration, Duration::from_millis(213_000));
        assert_eq!(track.source, "youtube");
        assert_eq!(track.uri.as_deref(), Some("https://example.com/NeverGonna"));
        assert!(track.requester.is_none());
    }

    #[test]
    fn test_playlist_duration_is_sum() {
        let playlist = Playlist::new(
            "Mix".into(),
            None,
            vec![track("One", 1_000), track("Two", 2_500), track("Three", 500)],
        );

        assert_eq!(playlist.duration, Duration::from_millis(4_000));
        assert_eq!(playlist.tracks.len(), 3);
    }

    #[test]
    fn test_load_response_parses_type() {
        let response: LoadTracksResponse =
            serde_json::from_value(json!({"loadType": "empty", "data": {}})).unwrap();
        assert_eq!(response.load_type, LoadType::Empty);
    }
}

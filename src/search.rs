//! # Search Module
//!
//! Turns a query into a node lookup identifier and the node's tagged answer
//! into a [`LoadResult`].
//!
//! Free text is scoped to one platform with a search prefix (`ytsearch:`,
//! `scsearch:`...). URLs and identifiers that already carry a prefix go to the
//! node as they are.

use serde_json::Value;
use serenity::model::id::UserId;
use url::Url;

use crate::error::RestResult;
use crate::model::track::{RawPlaylist, RawTrack};
use crate::model::{Exception, LoadResult, LoadTracksResponse, LoadType, Playlist, Track};

/// Platform aliases and the search prefix each family resolves to.
const SOURCE_ALIASES: &[(&[&str], &str)] = &[
    (&["youtube", "yt", "ytsearch"], "ytsearch"),
    (
        &["youtubemusic", "youtube music", "ytm", "ytmsearch"],
        "ytmsearch",
    ),
    (&["soundcloud", "sc", "scsearch"], "scsearch"),
    (&["spotify", "sp", "spsearch"], "spsearch"),
    (&["deezer", "dz", "dzsearch"], "dzsearch"),
    (&["applemusic", "apple music", "am", "amsearch"], "amsearch"),
    (&["bandcamp", "bc", "bcsearch"], "bcsearch"),
    (&["tidal", "td", "tdsearch"], "tdsearch"),
    (&["jiosaavn", "js", "jssearch"], "jssearch"),
    (&["yandex", "yandexmusic", "ym", "ymsearch"], "ymsearch"),
    (&["vkmusic", "vk", "vksearch"], "vksearch"),
];

/// Maps a platform name to its search prefix. Unknown names are used as given.
pub fn resolve_source(name: &str) -> String {
    let name = name.trim();
    let lower = name.to_lowercase();

    SOURCE_ALIASES
        .iter()
        .find(|(aliases, _)| aliases.contains(&lower.as_str()))
        .map(|(_, prefix)| prefix.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Whether `query` is an absolute http(s) URL.
pub fn is_absolute_url(query: &str) -> bool {
    Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

fn has_search_prefix(query: &str) -> bool {
    query.split_once(':').is_some_and(|(prefix, _)| {
        SOURCE_ALIASES
            .iter()
            .any(|(_, known)| prefix.eq_ignore_ascii_case(known))
    })
}

/// A search request: free text or a URL, optionally scoped to one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    /// Overrides the default platform for this call
    pub source: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The identifier sent to the node's track lookup.
    pub fn identifier(&self, default_platform: &str) -> String {
        let query = self.query.trim();

        if is_absolute_url(query) || has_search_prefix(query) {
            return query.to_string();
        }

        let source = self.source.as_deref().unwrap_or(default_platform);
        format!("{}:{}", resolve_source(source), query)
    }
}

impl From<&str> for SearchQuery {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for SearchQuery {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}

/// Normalizes a lookup response, stamping every track with `requester`.
///
/// A body that does not match its `loadType` is a decode error, so "nothing
/// found" ([`LoadResult::Empty`]) and "lookup failed" stay distinct.
pub fn normalize(response: LoadTracksResponse, requester: Option<UserId>) -> RestResult<LoadResult> {
    let stamp = |raw: RawTrack| Track::from(raw).with_requester(requester);

    let result = match response.load_type {
        LoadType::Track => {
            let raw: RawTrack = serde_json::from_value(response.data)?;
            LoadResult::Track {
                tracks: vec![stamp(raw)],
            }
        }
        LoadType::Search => {
            let raw: Vec<RawTrack> = serde_json::from_value(response.data)?;
            LoadResult::Search {
                tracks: raw.into_iter().map(stamp).collect(),
            }
        }
        LoadType::Playlist => {
            let raw: RawPlaylist = serde_json::from_value(response.data)?;
            let selected = usize::try_from(raw.info.selected_track).ok();

            LoadResult::Playlist(Playlist::new(
                raw.info.name,
                selected,
                raw.tracks.into_iter().map(stamp).collect(),
            ))
        }
        LoadType::Empty => LoadResult::Empty,
        LoadType::Error => error_result(response.data)?,
    };

    Ok(result)
}

fn error_result(data: Value) -> RestResult<LoadResult> {
    let exception: Exception = serde_json::from_value(data)?;

    Ok(LoadResult::Error {
        reason: exception.message.unwrap_or(exception.cause),
        severity: exception.severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RestError;
    use crate::model::track::tests::raw_track_json;
    use crate::model::Severity;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn response(value: Value) -> LoadTracksResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_alias_families() {
        for alias in ["soundcloud", "SC", " SoundCloud "] {
            assert_eq!(resolve_source(alias), "scsearch");
        }
        assert_eq!(resolve_source("youtube music"), "ytmsearch");
        assert_eq!(resolve_source("yt"), "ytsearch");
        assert_eq!(resolve_source("mycustomsearch"), "mycustomsearch");
    }

    #[test]
    fn test_identifier_prefixing() {
        assert_eq!(
            SearchQuery::new("never gonna give you up").identifier("youtube"),
            "ytsearch:never gonna give you up"
        );
        assert_eq!(
            SearchQuery::new("lofi").with_source("soundcloud").identifier("youtube"),
            "scsearch:lofi"
        );
    }

    #[test]
    fn test_urls_and_prefixed_queries_pass_through() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(SearchQuery::from(url).identifier("soundcloud"), url);
        assert_eq!(SearchQuery::from("scsearch:lofi").identifier("youtube"), "scsearch:lofi");

        assert!(!is_absolute_url("artist: song"));
        assert!(!is_absolute_url("ftp://files.example.com/a.mp3"));
    }

    #[test]
    fn test_track_result_has_one_element() {
        let user = UserId::new(9);
        let result = normalize(
            response(json!({"loadType": "track", "data": raw_track_json("Song", 1_000)})),
            Some(user),
        )
        .unwrap();

        assert_eq!(result.load_type(), LoadType::Track);
        assert_eq!(result.tracks().len(), 1);
        assert_eq!(result.tracks()[0].requester, Some(user));
    }

    #[test]
    fn test_search_result_keeps_order() {
        let result = normalize(
            response(json!({
                "loadType": "search",
                "data": [raw_track_json("One", 1), raw_track_json("Two", 2)]
            })),
            None,
        )
        .unwrap();

        let titles: Vec<&str> = result.tracks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[test]
    fn test_playlist_result() {
        let result = normalize(
            response(json!({
                "loadType": "playlist",
                "data": {
                    "info": {"name": "Mix", "selectedTrack": -1},
                    "pluginInfo": {},
                    "tracks": [
                        raw_track_json("One", 1_000),
                        raw_track_json("Two", 2_000),
                        raw_track_json("Three", 3_000)
                    ]
                }
            })),
            None,
        )
        .unwrap();

        let LoadResult::Playlist(playlist) = result else {
            panic!("expected a playlist, got {:?}", result);
        };
        assert_eq!(playlist.name, "Mix");
        assert_eq!(playlist.selected_track, None);
        assert_eq!(playlist.tracks.len(), 3);
        assert_eq!(playlist.duration, Duration::from_millis(6_000));
    }

    #[test]
    fn test_empty_is_not_an_error() {
        let result = normalize(response(json!({"loadType": "empty", "data": {}})), None).unwrap();

        assert_eq!(result, LoadResult::Empty);
        assert!(result.is_empty());
    }

    #[test]
    fn test_error_result_carries_reason() {
        let result = normalize(
            response(json!({
                "loadType": "error",
                "data": {
                    "message": "This video is unavailable",
                    "severity": "common",
                    "cause": "com.sedmelluq.discord.lavaplayer.tools.FriendlyException"
                }
            })),
            None,
        )
        .unwrap();

        assert_eq!(
            result,
            LoadResult::Error {
                reason: "This video is unavailable".into(),
                severity: Severity::Common,
            }
        );
    }

    #[test]
    fn test_mismatched_body_is_decode_error() {
        let result = normalize(response(json!({"loadType": "track", "data": []})), None);

        assert!(matches!(result, Err(RestError::Decode(_))));
    }
}

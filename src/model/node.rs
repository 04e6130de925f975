use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;

use super::player::RemotePlayerState;
use super::track::RawTrack;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    /// Players bound to the node, playing or not
    pub players: u32,
    pub playing_players: u32,
    /// Process uptime in milliseconds
    pub uptime: u64,
    pub memory: Memory,
    pub cpu: Cpu,
    #[serde(default)]
    pub frame_stats: Option<FrameStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Memory {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Audio frames over the last minute; absent while no player is active.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

/// Body of `GET /info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: NodeVersion,
    pub build_time: u64,
    pub jvm: String,
    pub lavaplayer: String,
    #[serde(default)]
    pub source_managers: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeVersion {
    pub semver: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Caused by the input, e.g. an unavailable video
    Common,
    Suspicious,
    /// Failure inside the node itself
    Fault,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Exception {
    #[serde(default)]
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Whether the queue should move on after a track ended this way.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Player events pushed by the node, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum TrackEvent {
    #[serde(rename = "TrackStartEvent", rename_all = "camelCase")]
    TrackStart { guild_id: GuildId, track: RawTrack },

    #[serde(rename = "TrackEndEvent", rename_all = "camelCase")]
    TrackEnd {
        guild_id: GuildId,
        track: RawTrack,
        reason: TrackEndReason,
    },

    #[serde(rename = "TrackExceptionEvent", rename_all = "camelCase")]
    TrackException {
        guild_id: GuildId,
        track: RawTrack,
        exception: Exception,
    },

    #[serde(rename = "TrackStuckEvent", rename_all = "camelCase")]
    TrackStuck {
        guild_id: GuildId,
        track: RawTrack,
        threshold_ms: u64,
    },

    /// Discord closed the node's voice connection
    #[serde(rename = "WebSocketClosedEvent", rename_all = "camelCase")]
    WebSocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl TrackEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            TrackEvent::TrackStart { guild_id, .. }
            | TrackEvent::TrackEnd { guild_id, .. }
            | TrackEvent::TrackException { guild_id, .. }
            | TrackEvent::TrackStuck { guild_id, .. }
            | TrackEvent::WebSocketClosed { guild_id, .. } => *guild_id,
        }
    }
}

/// A text frame from the node's event socket, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },

    Stats(NodeStats),

    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        guild_id: GuildId,
        state: RemotePlayerState,
    },

    Event(TrackEvent),
}

impl NodeMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ready() {
        let message = NodeMessage::parse(r#"{"op":"ready","resumed":false,"sessionId":"la3kfsdf5eafe848"}"#)
            .unwrap();

        assert_eq!(
            message,
            NodeMessage::Ready {
                resumed: false,
                session_id: "la3kfsdf5eafe848".into()
            }
        );
    }

    #[test]
    fn test_parse_stats() {
        let text = r#"{
            "op": "stats",
            "players": 3,
            "playingPlayers": 2,
            "uptime": 123456789,
            "memory": {"free": 123, "used": 456, "allocated": 789, "reservable": 1000},
            "cpu": {"cores": 4, "systemLoad": 0.5, "lavalinkLoad": 0.25},
            "frameStats": {"sent": 6000, "nulled": 10, "deficit": -3010}
        }"#;

        let NodeMessage::Stats(stats) = NodeMessage::parse(text).unwrap() else {
            panic!("expected stats");
        };

        assert_eq!(stats.players, 3);
        assert_eq!(stats.playing_players, 2);
        assert_eq!(stats.cpu.cores, 4);
        assert_eq!(stats.memory.reservable, 1000);
        assert_eq!(stats.frame_stats.map(|f| f.deficit), Some(-3010));
    }

    #[test]
    fn test_parse_player_update() {
        let text = r#"{"op":"playerUpdate","guildId":"817327181659111454",
            "state":{"time":1500467109,"position":60000,"connected":true,"ping":50}}"#;

        let NodeMessage::PlayerUpdate { guild_id, state } = NodeMessage::parse(text).unwrap() else {
            panic!("expected player update");
        };

        assert_eq!(guild_id, GuildId::new(817327181659111454));
        assert_eq!(state.position, 60000);
        assert!(state.connected);
    }

    #[test]
    fn test_parse_track_end_event() {
        let text = serde_json::json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "817327181659111454",
            "track": crate::model::track::tests::raw_track_json("Song", 1000),
            "reason": "finished"
        })
        .to_string();

        let NodeMessage::Event(event) = NodeMessage::parse(&text).unwrap() else {
            panic!("expected event");
        };

        assert_eq!(event.guild_id(), GuildId::new(817327181659111454));
        assert!(matches!(
            event,
            TrackEvent::TrackEnd { reason: TrackEndReason::Finished, .. }
        ));
    }

    #[test]
    fn test_parse_socket_closed_event() {
        let text = r#"{"op":"event","type":"WebSocketClosedEvent","guildId":"817327181659111454",
            "code":4006,"reason":"Your session is no longer valid.","byRemote":true}"#;

        let NodeMessage::Event(TrackEvent::WebSocketClosed { code, by_remote, .. }) =
            NodeMessage::parse(text).unwrap()
        else {
            panic!("expected socket closed");
        };

        assert_eq!(code, 4006);
        assert!(by_remote);
    }

    #[test]
    fn test_unknown_op_is_error() {
        assert!(NodeMessage::parse(r#"{"op":"bogus"}"#).is_err());
        assert!(NodeMessage::parse("not json").is_err());
    }

    #[test]
    fn test_end_reason_advances() {
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(TrackEndReason::LoadFailed.may_start_next());
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(!TrackEndReason::Stopped.may_start_next());
        assert!(!TrackEndReason::Cleanup.may_start_next());
    }
}

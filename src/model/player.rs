use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::track::RawTrack;

/// Voice credentials the node needs to join the call.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpdate {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

impl fmt::Debug for VoiceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceUpdate")
            .field("endpoint", &self.endpoint)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .finish()
    }
}

/// `{"encoded": null}` stops the current track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateTrack {
    pub encoded: Option<String>,
}

/// Partial player state for `PATCH /sessions/{id}/players/{guild}`.
///
/// Only the fields that are set end up in the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdateTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceUpdate>,
}

impl PlayerUpdate {
    pub fn voice(voice: VoiceUpdate) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }

    pub fn play(encoded: &str, volume: u16) -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: Some(encoded.to_string()),
            }),
            volume: Some(volume),
            paused: Some(false),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            track: Some(UpdateTrack { encoded: None }),
            ..Default::default()
        }
    }

    pub fn pause(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    pub fn seek(position: u64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn volume(volume: u16) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RemotePlayerState {
    /// Unix millis of the sample
    pub time: u64,
    pub position: u64,
    pub connected: bool,
    /// -1 while not connected
    pub ping: i64,
}

/// A player as the node reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePlayer {
    pub guild_id: String,
    #[serde(default)]
    pub track: Option<RawTrack>,
    pub volume: u16,
    pub paused: bool,
    pub state: RemotePlayerState,
    pub voice: VoiceUpdate,
    #[serde(default)]
    pub filters: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resuming: Option<bool>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionInfo {
    pub resuming: bool,
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_voice_body() {
        let body = PlayerUpdate::voice(VoiceUpdate {
            token: "tok".into(),
            endpoint: "rotterdam1.discord.media:443".into(),
            session_id: "sess".into(),
        });

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"voice": {"token": "tok", "endpoint": "rotterdam1.discord.media:443", "sessionId": "sess"}})
        );
    }

    #[test]
    fn test_stop_sends_null_track() {
        assert_eq!(
            serde_json::to_value(PlayerUpdate::stop()).unwrap(),
            json!({"track": {"encoded": null}})
        );
    }

    #[test]
    fn test_play_body() {
        assert_eq!(
            serde_json::to_value(PlayerUpdate::play("QAAA", 80)).unwrap(),
            json!({"track": {"encoded": "QAAA"}, "volume": 80, "paused": false})
        );
    }

    #[test]
    fn test_voice_debug_hides_token() {
        let voice = VoiceUpdate {
            token: "very-secret".into(),
            endpoint: "e".into(),
            session_id: "s".into(),
        };

        assert!(!format!("{voice:?}").contains("very-secret"));
    }

    #[test]
    fn test_remote_player_parses() {
        let player: RemotePlayer = serde_json::from_value(json!({
            "guildId": "817327181659111454",
            "track": null,
            "volume": 100,
            "paused": false,
            "state": {"time": 1500467109, "position": 0, "connected": true, "ping": 50},
            "voice": {"token": "t", "endpoint": "e", "sessionId": "s"},
            "filters": {}
        }))
        .unwrap();

        assert_eq!(player.volume, 100);
        assert_eq!(player.voice.session_id, "s");
        assert!(player.state.connected);
    }
}

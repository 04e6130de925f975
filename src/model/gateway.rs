//! Raw Discord voice notifications as they arrive on the gateway.

use serde::Deserialize;
use serde_json::Value;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::fmt;

pub const VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
pub const VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceStatePayload {
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// `None` once the user left voice
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct VoiceServerPayload {
    pub token: String,
    pub guild_id: GuildId,
    /// `None` while Discord reallocates the voice server
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for VoiceServerPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceServerPayload")
            .field("guild_id", &self.guild_id)
            .field("endpoint", &self.endpoint)
            .field("token", &"<secret>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceUpdateEvent {
    State(VoiceStatePayload),
    Server(VoiceServerPayload),
}

#[derive(Deserialize)]
struct Dispatch {
    t: Option<String>,
    #[serde(default)]
    d: Value,
}

impl VoiceUpdateEvent {
    /// Picks the two voice dispatches out of a raw gateway message.
    ///
    /// Anything else, or a voice dispatch missing required fields, is `None`.
    pub fn from_gateway(payload: &Value) -> Option<Self> {
        let dispatch = Dispatch::deserialize(payload).ok()?;

        match dispatch.t.as_deref()? {
            VOICE_STATE_UPDATE => serde_json::from_value(dispatch.d).ok().map(Self::State),
            VOICE_SERVER_UPDATE => serde_json::from_value(dispatch.d).ok().map(Self::Server),
            _ => None,
        }
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            VoiceUpdateEvent::State(state) => state.guild_id,
            VoiceUpdateEvent::Server(server) => Some(server.guild_id),
        }
    }
}

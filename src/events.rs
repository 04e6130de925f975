use serenity::model::id::{ChannelId, GuildId};
use tracing::trace;

use crate::model::{Exception, Track, TrackEndReason};

/// Everything the manager reports to the embedding bot.
///
/// Delivered over the receiver returned by [`Manager::new`]; nothing in the
/// manager depends on anyone reading it.
///
/// [`Manager::new`]: crate::Manager::new
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NodeCreate {
        identifier: String,
    },
    /// The node finished its handshake and can take players
    NodeConnect {
        identifier: String,
        session_id: String,
        resumed: bool,
    },
    NodeReconnect {
        identifier: String,
        attempt: u32,
    },
    NodeDisconnect {
        identifier: String,
        reason: String,
    },
    /// Reconnect attempts are exhausted
    NodeError {
        identifier: String,
        error: String,
    },
    NodeDestroy {
        identifier: String,
    },
    PlayerCreate {
        guild_id: GuildId,
    },
    PlayerDestroy {
        guild_id: GuildId,
    },
    PlayerMove {
        guild_id: GuildId,
        old_channel: ChannelId,
        new_channel: ChannelId,
    },
    /// The bot was removed from voice
    PlayerDisconnect {
        guild_id: GuildId,
        old_channel: Option<ChannelId>,
    },
    TrackStart {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnd {
        guild_id: GuildId,
        track: Track,
        reason: TrackEndReason,
    },
    TrackException {
        guild_id: GuildId,
        track: Track,
        exception: Exception,
    },
    TrackStuck {
        guild_id: GuildId,
        track: Track,
        threshold_ms: u64,
    },
    SocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    QueueEnd {
        guild_id: GuildId,
    },
}

impl Event {
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Event::PlayerCreate { guild_id }
            | Event::PlayerDestroy { guild_id }
            | Event::PlayerMove { guild_id, .. }
            | Event::PlayerDisconnect { guild_id, .. }
            | Event::TrackStart { guild_id, .. }
            | Event::TrackEnd { guild_id, .. }
            | Event::TrackException { guild_id, .. }
            | Event::TrackStuck { guild_id, .. }
            | Event::SocketClosed { guild_id, .. }
            | Event::QueueEnd { guild_id } => Some(*guild_id),
            _ => None,
        }
    }

    /// Identifier of the node the event is about, for node lifecycle events.
    pub fn node(&self) -> Option<&str> {
        match self {
            Event::NodeCreate { identifier }
            | Event::NodeConnect { identifier, .. }
            | Event::NodeReconnect { identifier, .. }
            | Event::NodeDisconnect { identifier, .. }
            | Event::NodeError { identifier, .. }
            | Event::NodeDestroy { identifier } => Some(identifier),
            _ => None,
        }
    }
}

pub(crate) fn emit(sender: &flume::Sender<Event>, event: Event) {
    if let Err(flume::SendError(event)) = sender.send(event) {
        trace!("Sin receptor de eventos, descartado: {:?}", event);
    }
}

//! # Model Module
//!
//! Wire types of the node protocol and of the Discord voice gateway, plus the
//! normalized [`Track`], [`Playlist`] and [`LoadResult`] handed to callers.
//!
//! - [`track`]: tracks, playlists and load results
//! - [`node`]: node socket messages, stats and info
//! - [`player`]: player PATCH bodies and remote player state
//! - [`gateway`]: raw voice state/server notifications

pub mod gateway;
pub mod node;
pub mod player;
pub mod track;

pub use gateway::{VoiceServerPayload, VoiceStatePayload, VoiceUpdateEvent};
pub use node::{Exception, NodeInfo, NodeMessage, NodeStats, Severity, TrackEndReason, TrackEvent};
pub use player::{
    PlayerUpdate, RemotePlayer, RemotePlayerState, SessionInfo, SessionUpdate, UpdateTrack, VoiceUpdate,
};
pub use track::{LoadResult, LoadTracksResponse, LoadType, Playlist, RawTrack, Track, TrackInfo};

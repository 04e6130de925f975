//! # Player Module
//!
//! One [`Player`] per guild: the node it lives on, its voice channel, a
//! [`Queue`] and the playback flags.
//!
//! ## Voice session
//!
//! Discord hands out voice credentials in two separate notifications. The
//! player keeps both halves in a [`VoiceState`] and forwards them to its node
//! once session id, token and endpoint are all known. A later change of any of
//! the three (a region move) is forwarded again; a repeat of the same three
//! is not. Once the bot is removed from voice the player stops listening;
//! the manager drops it, and the next `create` builds a fresh one.
//!
//! ## Playback
//!
//! Commands are PATCHes against the node. Local flags only change once the
//! node accepted the command.

pub mod queue;
pub mod voice;

use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub use queue::{Queue, RepeatMode};
pub use voice::{VoicePhase, VoiceServer, VoiceState};

use crate::error::{Error, Result};
use crate::events::{self, Event};
use crate::model::{PlayerUpdate, RawTrack, RemotePlayer, RemotePlayerState, Track, VoiceUpdate};
use crate::nodes::Node;

/// What a caller passes to [`Manager::create`](crate::Manager::create).
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub guild_id: GuildId,
    pub voice_channel_id: Option<ChannelId>,
    /// Where the caller posts its own messages; never read here
    pub text_channel_id: Option<ChannelId>,
    pub volume: Option<u16>,
    pub self_deafen: bool,
    pub repeat_mode: RepeatMode,
}

impl PlayerOptions {
    pub fn new(guild_id: GuildId, voice_channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            voice_channel_id: Some(voice_channel_id),
            text_channel_id: None,
            volume: None,
            self_deafen: true,
            repeat_mode: RepeatMode::Off,
        }
    }

    pub fn text_channel(mut self, channel_id: ChannelId) -> Self {
        self.text_channel_id = Some(channel_id);
        self
    }

    pub fn volume(mut self, volume: u16) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn self_deafen(mut self, self_deafen: bool) -> Self {
        self.self_deafen = self_deafen;
        self
    }

    pub fn repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.repeat_mode = mode;
        self
    }
}

const DEFAULT_VOLUME: u16 = 100;
const MAX_VOLUME: u16 = 100;

#[derive(Debug)]
struct PlaybackState {
    voice_channel_id: Option<ChannelId>,
    text_channel_id: Option<ChannelId>,
    self_deafen: bool,
    queue: Queue,
    playing: bool,
    paused: bool,
    volume: u16,
    position: u64,
    ping: Option<i64>,
    connected: bool,
}

pub struct Player {
    guild_id: GuildId,
    node: Arc<Node>,
    state: RwLock<PlaybackState>,
    // tokio: se mantiene durante el PATCH para respetar el orden de llegada
    voice: tokio::sync::Mutex<VoiceState>,
    events: flume::Sender<Event>,
}

impl Player {
    pub(crate) fn new(
        options: PlayerOptions,
        node: Arc<Node>,
        max_queue_size: usize,
        events: flume::Sender<Event>,
    ) -> Self {
        let mut queue = Queue::new(max_queue_size);
        queue.set_repeat(options.repeat_mode);

        Self {
            guild_id: options.guild_id,
            node,
            state: RwLock::new(PlaybackState {
                voice_channel_id: options.voice_channel_id,
                text_channel_id: options.text_channel_id,
                self_deafen: options.self_deafen,
                queue,
                playing: false,
                paused: false,
                volume: options.volume.unwrap_or(DEFAULT_VOLUME).min(MAX_VOLUME),
                position: 0,
                ping: None,
                connected: false,
            }),
            voice: tokio::sync::Mutex::new(VoiceState::default()),
            events,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// The node this player was assigned to. Players never change nodes.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn voice_channel_id(&self) -> Option<ChannelId> {
        self.state.read().voice_channel_id
    }

    pub fn text_channel_id(&self) -> Option<ChannelId> {
        self.state.read().text_channel_id
    }

    pub fn set_text_channel(&self, channel_id: Option<ChannelId>) {
        self.state.write().text_channel_id = channel_id;
    }

    pub fn is_self_deafened(&self) -> bool {
        self.state.read().self_deafen
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().playing
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    pub fn volume(&self) -> u16 {
        self.state.read().volume
    }

    /// Last position reported by the node, in milliseconds.
    pub fn position(&self) -> u64 {
        self.state.read().position
    }

    pub fn ping(&self) -> Option<i64> {
        self.state.read().ping
    }

    /// Whether the node reports an open voice connection.
    pub fn is_voice_connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.read().queue.repeat()
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.state.write().queue.set_repeat(mode);
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.read().queue.current().cloned()
    }

    pub fn queue_len(&self) -> usize {
        self.state.read().queue.len()
    }

    /// Runs `f` with exclusive access to the queue.
    pub fn with_queue<R>(&self, f: impl FnOnce(&mut Queue) -> R) -> R {
        f(&mut self.state.write().queue)
    }

    pub fn enqueue(&self, track: Track) -> Result<()> {
        self.state.write().queue.add(track)
    }

    pub fn enqueue_all(&self, tracks: impl IntoIterator<Item = Track>) -> usize {
        self.state.write().queue.add_all(tracks)
    }

    pub async fn voice_state(&self) -> VoiceState {
        self.voice.lock().await.clone()
    }

    pub async fn voice_phase(&self) -> VoicePhase {
        self.voice.lock().await.phase()
    }

    #[instrument(skip(self, token), fields(guild_id = %self.guild_id))]
    pub(crate) async fn handle_voice_server(&self, token: String, endpoint: String) {
        let mut voice = self.voice.lock().await;

        match voice.apply_server_update(token, endpoint) {
            Some(update) => self.push_voice(&mut voice, update).await,
            None => debug!(phase = ?voice.phase(), "voice server stored"),
        }
    }

    /// Applies the bot's own voice state. Returns `true` when the bot was
    /// removed from voice, after which the player ignores voice updates.
    #[instrument(skip(self, session_id), fields(guild_id = %self.guild_id))]
    pub(crate) async fn handle_voice_state(
        &self,
        channel_id: Option<ChannelId>,
        session_id: Option<String>,
    ) -> bool {
        let mut voice = self.voice.lock().await;

        if voice.phase() == VoicePhase::Disconnected {
            debug!("player disconnected from voice, notification ignored");
            return false;
        }

        let Some(channel_id) = channel_id else {
            let old_channel = {
                let mut state = self.state.write();
                state.playing = false;
                state.paused = true;
                state.voice_channel_id.take()
            };
            voice.disconnect();

            warn!("🔌 Bot desconectado del canal de voz en guild {}", self.guild_id);
            events::emit(
                &self.events,
                Event::PlayerDisconnect {
                    guild_id: self.guild_id,
                    old_channel,
                },
            );
            return true;
        };

        let Some(session_id) = session_id else {
            debug!("voice state without session id ignored");
            return false;
        };

        let previous = self.state.read().voice_channel_id;
        if let Some(old_channel) = previous.filter(|old| *old != channel_id) {
            info!("🔀 Guild {} movido de {} a {}", self.guild_id, old_channel, channel_id);
            events::emit(
                &self.events,
                Event::PlayerMove {
                    guild_id: self.guild_id,
                    old_channel,
                    new_channel: channel_id,
                },
            );
        }
        self.state.write().voice_channel_id = Some(channel_id);

        match voice.apply_state_update(session_id) {
            Some(update) => self.push_voice(&mut voice, update).await,
            None => debug!(phase = ?voice.phase(), "voice state stored"),
        }

        false
    }

    async fn push_voice(&self, voice: &mut VoiceState, update: VoiceUpdate) {
        debug!(node = self.node.identifier(), "pushing voice credentials");

        let data = PlayerUpdate::voice(update.clone());
        match self.node.rest().update_player(self.guild_id, &data, false).await {
            Ok(_) => {
                voice.mark_pushed(update);
                info!("🔊 Sesión de voz sincronizada en guild {}", self.guild_id);
            }
            Err(e) => warn!(
                "❌ No se pudo enviar la sesión de voz de guild {}: {}",
                self.guild_id, e
            ),
        }
    }

    async fn update(&self, data: PlayerUpdate) -> Result<RemotePlayer> {
        Ok(self.node.rest().update_player(self.guild_id, &data, false).await?)
    }

    /// Plays the current track, or the next queued one when nothing is current.
    pub async fn play(&self) -> Result<()> {
        let track = {
            let mut state = self.state.write();
            match state.queue.current().cloned() {
                Some(track) => track,
                None => state.queue.next_track().ok_or(Error::QueueEmpty)?,
            }
        };

        self.start(track).await
    }

    async fn start(&self, track: Track) -> Result<()> {
        let volume = self.volume();
        self.update(PlayerUpdate::play(&track.encoded, volume)).await?;

        {
            let mut state = self.state.write();
            state.playing = true;
            state.paused = false;
            state.position = 0;
        }

        info!("▶️ Reproduciendo: {} en guild {}", track.title, self.guild_id);
        Ok(())
    }

    pub async fn pause(&self, pause: bool) -> Result<()> {
        self.update(PlayerUpdate::pause(pause)).await?;

        let mut state = self.state.write();
        state.paused = pause;
        state.playing = !pause && state.queue.current().is_some();

        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.pause(false).await
    }

    /// Stops the current track; the queue is kept.
    pub async fn stop(&self) -> Result<()> {
        self.update(PlayerUpdate::stop()).await?;

        let mut state = self.state.write();
        state.queue.clear_current();
        state.playing = false;
        state.position = 0;

        Ok(())
    }

    /// Plays the next queued track, or stops when the queue is exhausted.
    pub async fn skip(&self) -> Result<Option<Track>> {
        let next = self.state.write().queue.skip_track();

        match next {
            Some(track) => {
                self.start(track.clone()).await?;
                Ok(Some(track))
            }
            None => {
                self.update(PlayerUpdate::stop()).await?;
                self.finish_queue();
                Ok(None)
            }
        }
    }

    pub async fn seek(&self, position: u64) -> Result<()> {
        self.update(PlayerUpdate::seek(position)).await?;
        self.state.write().position = position;

        Ok(())
    }

    /// Sets the volume, clamped to 0..=100.
    pub async fn set_volume(&self, volume: u16) -> Result<()> {
        let volume = volume.min(MAX_VOLUME);
        self.update(PlayerUpdate::volume(volume)).await?;
        self.state.write().volume = volume;

        Ok(())
    }

    /// Deletes the player on its node. Local state is left to the manager.
    pub async fn destroy_remote(&self) -> Result<()> {
        self.node.rest().destroy_player(self.guild_id).await?;

        Ok(())
    }

    /// Moves on after the node finished a track.
    pub(crate) async fn advance(&self) -> Result<()> {
        let next = self.state.write().queue.next_track();

        match next {
            Some(track) => self.start(track).await,
            None => {
                self.finish_queue();
                Ok(())
            }
        }
    }

    fn finish_queue(&self) {
        {
            let mut state = self.state.write();
            state.playing = false;
            state.position = 0;
        }

        info!("📭 Cola terminada en guild {}", self.guild_id);
        events::emit(&self.events, Event::QueueEnd { guild_id: self.guild_id });
    }

    pub(crate) fn mark_started(&self) {
        let mut state = self.state.write();
        state.playing = true;
        state.paused = false;
    }

    pub(crate) fn apply_remote_state(&self, remote: &RemotePlayerState) {
        let mut state = self.state.write();
        state.position = remote.position;
        state.connected = remote.connected;
        state.ping = (remote.ping >= 0).then_some(remote.ping);
    }

    /// The queued track matching `raw`, so its requester survives.
    pub(crate) fn resolve_track(&self, raw: RawTrack) -> Track {
        match self.state.read().queue.current() {
            Some(current) if current.encoded == raw.encoded => current.clone(),
            _ => Track::from(raw),
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .field("node", &self.node.identifier())
            .field("state", &*self.state.read())
            .finish()
    }
}

//! # Manager Module
//!
//! Entry point of the crate. The [`Manager`] owns the node pool and the
//! per-guild players, routes raw voice notifications to the right player and
//! sends searches to the least loaded node.
//!
//! Node sockets report back through [`NodeEventHandler`], implemented here:
//! handshakes mark nodes usable, stats feed load balancing and track events
//! drive the players' queues.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use serenity::model::id::{GuildId, UserId};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, NodeOptions};
use crate::error::{Error, Result};
use crate::events::{self, Event};
use crate::model::{LoadResult, NodeMessage, SessionUpdate, Track, TrackEvent, VoiceUpdateEvent};
use crate::nodes::{Node, NodeEventHandler};
use crate::player::{Player, PlayerOptions};
use crate::search::{self, SearchQuery};

/// Settings a [`Manager`] is built with, usually taken from a [`Config`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Bot user id; required before any node connects
    pub client_id: Option<UserId>,
    /// Sent as `Client-Name` on the node handshake
    pub client_name: String,
    /// Platform searched when a query names no source
    pub default_search_platform: String,
    /// Track limit of every player's queue
    pub max_queue_size: usize,
    /// Nodes built by [`Manager::new`]
    pub nodes: Vec<NodeOptions>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            client_id: config.client_id.filter(|id| *id != 0).map(UserId::new),
            client_name: config.client_name.clone(),
            default_search_platform: config.default_search_platform.clone(),
            max_queue_size: config.max_queue_size,
            nodes: config.nodes.clone(),
        }
    }
}

/// Node pool and per-guild players, shared behind an `Arc`.
pub struct Manager {
    options: ManagerOptions,
    client_id: RwLock<Option<UserId>>,
    nodes: DashMap<String, Arc<Node>>,
    players: DashMap<GuildId, Arc<Player>>,
    events: flume::Sender<Event>,
}

impl Manager {
    /// Builds the manager and its configured nodes, without connecting them.
    ///
    /// The receiver yields every [`Event`]; dropping it is allowed.
    pub fn new(options: ManagerOptions) -> Result<(Arc<Self>, flume::Receiver<Event>)> {
        let (events, receiver) = flume::unbounded();
        let nodes = options.nodes.clone();

        let manager = Arc::new(Self {
            client_id: RwLock::new(options.client_id),
            options,
            nodes: DashMap::new(),
            players: DashMap::new(),
            events,
        });

        for node_options in nodes {
            manager.add_node(Arc::new(Node::new(node_options)?))?;
        }

        Ok((manager, receiver))
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn client_id(&self) -> Option<UserId> {
        *self.client_id.read()
    }

    /// Sets the bot user id and connects every node in the pool.
    pub fn init(self: &Arc<Self>, client_id: UserId) -> Result<()> {
        *self.client_id.write() = Some(client_id);

        for node in self.nodes() {
            self.connect_node(&node)?;
        }

        info!("🎵 Manager iniciado con {} nodos", self.nodes.len());
        Ok(())
    }

    fn connect_node(self: &Arc<Self>, node: &Arc<Node>) -> Result<()> {
        let user_id = self.client_id().ok_or(Error::NoClientId)?;
        let handler: Weak<dyn NodeEventHandler> = Arc::downgrade(self) as Weak<dyn NodeEventHandler>;

        node.connect(handler, user_id, self.options.client_name.clone());
        Ok(())
    }

    /// Adds a node to the pool, connecting it right away once a client id is known.
    pub fn create_node(self: &Arc<Self>, options: NodeOptions) -> Result<Arc<Node>> {
        let node = Arc::new(Node::new(options)?);
        self.add_node(Arc::clone(&node))?;

        if self.client_id().is_some() {
            self.connect_node(&node)?;
        }

        Ok(node)
    }

    /// Adds an already built node. Its identifier must be unique.
    pub fn add_node(&self, node: Arc<Node>) -> Result<()> {
        let identifier = node.identifier().to_string();

        match self.nodes.entry(identifier.clone()) {
            Entry::Occupied(_) => return Err(Error::NodeExists(identifier)),
            Entry::Vacant(entry) => {
                entry.insert(node);
            }
        }

        info!("➕ Nodo {} agregado", identifier);
        events::emit(&self.events, Event::NodeCreate { identifier });
        Ok(())
    }

    /// Disconnects a node and removes it from the pool.
    ///
    /// Players assigned to it are not moved.
    pub fn destroy_node(&self, identifier: &str) -> Result<()> {
        let node = self
            .node(identifier)
            .ok_or_else(|| Error::NodeNotFound(identifier.to_string()))?;

        node.destroy();
        self.nodes.remove(identifier);

        events::emit(
            &self.events,
            Event::NodeDestroy {
                identifier: identifier.to_string(),
            },
        );
        Ok(())
    }

    pub fn node(&self, identifier: &str) -> Option<Arc<Node>> {
        self.nodes.get(identifier).map(|node| Arc::clone(node.value()))
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().map(|node| Arc::clone(node.value())).collect()
    }

    /// Connected nodes, fewest players first.
    pub fn least_players_nodes(&self) -> Vec<Arc<Node>> {
        let mut nodes: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|node| node.is_connected())
            .map(|node| Arc::clone(node.value()))
            .collect();

        nodes.sort_by(|a, b| {
            a.player_count()
                .cmp(&b.player_count())
                .then_with(|| a.identifier().cmp(b.identifier()))
        });

        nodes
    }

    fn best_node(&self) -> Result<Arc<Node>> {
        self.least_players_nodes()
            .into_iter()
            .next()
            .ok_or(Error::NoAvailableNodes)
    }

    /// Returns the guild's player, creating it on the least loaded node.
    ///
    /// An existing player is returned untouched, whatever the options say.
    pub fn create(&self, options: PlayerOptions) -> Result<Arc<Player>> {
        let guild_id = options.guild_id;
        if let Some(player) = self.get(guild_id) {
            return Ok(player);
        }

        let node = self.best_node()?;

        let player = match self.players.entry(guild_id) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let player = Arc::new(Player::new(
                    options,
                    Arc::clone(&node),
                    self.options.max_queue_size,
                    self.events.clone(),
                ));
                entry.insert(Arc::clone(&player));
                player
            }
        };

        info!("🎶 Player creado para guild {} en nodo {}", guild_id, node.identifier());
        events::emit(&self.events, Event::PlayerCreate { guild_id });

        Ok(player)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild_id).map(|player| Arc::clone(player.value()))
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.players.iter().map(|player| Arc::clone(player.value())).collect()
    }

    /// Forgets the guild's player. Call [`Player::destroy_remote`] first to
    /// delete it on the node too.
    pub fn destroy(&self, guild_id: GuildId) -> bool {
        if self.players.remove(&guild_id).is_none() {
            return false;
        }

        info!("🗑️ Player de guild {} destruido", guild_id);
        events::emit(&self.events, Event::PlayerDestroy { guild_id });
        true
    }

    /// Resolves a query or URL on the least loaded node.
    ///
    /// Errors only when no node is available or the lookup itself failed; no
    /// matches is [`LoadResult::Empty`].
    pub async fn search(
        &self,
        query: impl Into<SearchQuery>,
        requester: Option<UserId>,
    ) -> Result<LoadResult> {
        let query = query.into();
        let node = self.best_node()?;
        let identifier = query.identifier(&self.options.default_search_platform);

        debug!("🔍 Buscando '{}' en nodo {}", identifier, node.identifier());
        let response = node.rest().load_tracks(&identifier).await?;
        let result = search::normalize(response, requester)?;

        match &result {
            LoadResult::Empty => info!("No se encontraron resultados para: {}", identifier),
            LoadResult::Error { reason, severity } => {
                warn!("❌ Error al cargar '{}' ({:?}): {}", identifier, severity, reason)
            }
            _ => debug!("✅ {} resultados para '{}'", result.tracks().len(), identifier),
        }

        Ok(result)
    }

    pub async fn decode_track(&self, encoded: &str) -> Result<Track> {
        let node = self.best_node()?;
        let raw = node.rest().decode_track(encoded).await?;

        Ok(Track::from(raw))
    }

    pub async fn decode_tracks(&self, encoded: &[String]) -> Result<Vec<Track>> {
        let node = self.best_node()?;
        let raw = node.rest().decode_tracks(encoded).await?;

        Ok(raw.into_iter().map(Track::from).collect())
    }

    /// Feeds a raw gateway message. Anything but the two voice dispatches is ignored.
    pub async fn update_voice_state(&self, payload: &Value) {
        if let Some(update) = VoiceUpdateEvent::from_gateway(payload) {
            self.handle_voice_update(update).await;
        }
    }

    pub async fn handle_voice_update(&self, update: VoiceUpdateEvent) {
        match update {
            VoiceUpdateEvent::Server(server) => {
                let Some(player) = self.get(server.guild_id) else {
                    trace!("voice server for guild {} without player", server.guild_id);
                    return;
                };
                let Some(endpoint) = server.endpoint else {
                    debug!("voice server for guild {} without endpoint", server.guild_id);
                    return;
                };

                player.handle_voice_server(server.token, endpoint).await;
            }
            VoiceUpdateEvent::State(state) => {
                if self.client_id() != Some(state.user_id) {
                    return;
                }
                let Some(player) = state.guild_id.and_then(|guild_id| self.get(guild_id)) else {
                    trace!("voice state without player ignored");
                    return;
                };

                let guild_id = player.guild_id();
                if player.handle_voice_state(state.channel_id, state.session_id).await {
                    self.forget_kicked(&player, guild_id);
                }
            }
        }
    }

    /// Drops a player removed from voice so the next `create` starts clean.
    fn forget_kicked(&self, player: &Arc<Player>, guild_id: GuildId) {
        let removed = self
            .players
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, player))
            .is_some();

        if removed {
            info!("🗑️ Player de guild {} descartado tras la desconexión", guild_id);
            events::emit(&self.events, Event::PlayerDestroy { guild_id });
        }
    }

    /// Destroys every node and forgets every player.
    pub fn shutdown(&self) {
        let identifiers: Vec<String> = self.nodes.iter().map(|node| node.key().clone()).collect();

        for identifier in identifiers {
            if let Err(e) = self.destroy_node(&identifier) {
                warn!("⚠️ Error destruyendo nodo {}: {}", identifier, e);
            }
        }

        self.players.clear();
        info!("👋 Manager detenido");
    }

    async fn handle_ready(&self, node: &Arc<Node>, resumed: bool, session_id: String) {
        node.rest().set_session_id(Some(session_id.clone()));
        node.set_connected(true);

        info!(
            "✅ Nodo {} listo (sesión {}, resumida: {})",
            node.identifier(),
            session_id,
            resumed
        );
        events::emit(
            &self.events,
            Event::NodeConnect {
                identifier: node.identifier().to_string(),
                session_id,
                resumed,
            },
        );

        if node.options().resume_status {
            let update = SessionUpdate {
                resuming: Some(true),
                timeout: Some(node.options().resume_timeout),
            };

            if let Err(e) = node.rest().update_session(&update).await {
                warn!("⚠️ No se pudo activar la reanudación en {}: {}", node.identifier(), e);
            }
        }
    }

    async fn handle_track_event(&self, event: TrackEvent) {
        let guild_id = event.guild_id();
        let Some(player) = self.get(guild_id) else {
            debug!("track event for guild {} without player", guild_id);
            return;
        };

        match event {
            TrackEvent::TrackStart { track, .. } => {
                player.mark_started();
                let track = player.resolve_track(track);

                debug!("TrackStart en guild {}: {}", guild_id, track.title);
                events::emit(&self.events, Event::TrackStart { guild_id, track });
            }
            TrackEvent::TrackEnd { track, reason, .. } => {
                let track = player.resolve_track(track);

                debug!("TrackEnd en guild {}: {} ({:?})", guild_id, track.title, reason);
                events::emit(&self.events, Event::TrackEnd { guild_id, track, reason });

                if reason.may_start_next() {
                    if let Err(e) = player.advance().await {
                        warn!("❌ No se pudo avanzar la cola de guild {}: {}", guild_id, e);
                    }
                }
            }
            TrackEvent::TrackException {
                track, exception, ..
            } => {
                let track = player.resolve_track(track);

                warn!(
                    "⚠️ Excepción reproduciendo {} en guild {}: {:?}",
                    track.title, guild_id, exception.message
                );
                events::emit(
                    &self.events,
                    Event::TrackException {
                        guild_id,
                        track,
                        exception,
                    },
                );
            }
            TrackEvent::TrackStuck {
                track,
                threshold_ms,
                ..
            } => {
                let track = player.resolve_track(track);

                warn!("⏳ Track atascado en guild {}: {}", guild_id, track.title);
                events::emit(
                    &self.events,
                    Event::TrackStuck {
                        guild_id,
                        track,
                        threshold_ms,
                    },
                );
            }
            TrackEvent::WebSocketClosed {
                code,
                reason,
                by_remote,
                ..
            } => {
                warn!("🔌 Voz cerrada en guild {}: {} {}", guild_id, code, reason);
                events::emit(
                    &self.events,
                    Event::SocketClosed {
                        guild_id,
                        code,
                        reason,
                        by_remote,
                    },
                );
            }
        }
    }
}

#[async_trait]
impl NodeEventHandler for Manager {
    async fn handle_message(&self, node: &Arc<Node>, message: NodeMessage) {
        match message {
            NodeMessage::Ready {
                resumed,
                session_id,
            } => self.handle_ready(node, resumed, session_id).await,
            NodeMessage::Stats(stats) => node.set_stats(stats),
            NodeMessage::PlayerUpdate { guild_id, state } => {
                if let Some(player) = self.get(guild_id) {
                    player.apply_remote_state(&state);
                }
            }
            NodeMessage::Event(event) => self.handle_track_event(event).await,
        }
    }

    fn handle_lifecycle(&self, event: Event) {
        events::emit(&self.events, event);
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("client_id", &self.client_id())
            .field("nodes", &self.nodes.len())
            .field("players", &self.players.len())
            .finish()
    }
}

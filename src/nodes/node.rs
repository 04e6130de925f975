use parking_lot::{Mutex, RwLock};
use serenity::model::id::UserId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::rest::{NodeApi, RestClient};
use super::socket::{self, NodeEventHandler};
use crate::config::NodeOptions;
use crate::error::Result;
use crate::model::NodeStats;

/// One remote audio server.
pub struct Node {
    options: NodeOptions,
    rest: Arc<dyn NodeApi>,
    connected: AtomicBool,
    stats: RwLock<NodeStats>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(options: NodeOptions) -> Result<Self> {
        let rest = RestClient::new(&options)?;

        Ok(Self::with_api(options, Arc::new(rest)))
    }

    /// Builds a node around any [`NodeApi`] implementation.
    pub fn with_api(options: NodeOptions, rest: Arc<dyn NodeApi>) -> Self {
        Self {
            options,
            rest,
            connected: AtomicBool::new(false),
            stats: RwLock::new(NodeStats::default()),
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
        }
    }

    pub fn identifier(&self) -> &str {
        self.options.identifier()
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn rest(&self) -> &dyn NodeApi {
        self.rest.as_ref()
    }

    /// Whether the event socket is up and the handshake completed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.read().clone()
    }

    pub(crate) fn set_stats(&self, stats: NodeStats) {
        *self.stats.write() = stats;
    }

    /// Players the node reported in its last stats frame.
    pub fn player_count(&self) -> u32 {
        self.stats.read().players
    }

    /// Load score of the node; lower is better.
    ///
    /// Playing players, plus an exponential CPU term, plus penalties for
    /// frames that were not sent during the last minute.
    pub fn penalties(&self) -> u32 {
        let stats = self.stats.read();

        let cpu = 1.05f64.powf(100.0 * stats.cpu.system_load) * 10.0 - 10.0;

        let (deficit, nulled) = match &stats.frame_stats {
            Some(frames) => {
                let deficit = 1.03f64.powf(500.0 * (frames.deficit as f64 / 3000.0)) * 600.0 - 600.0;
                let nulled =
                    (1.03f64.powf(500.0 * (frames.nulled as f64 / 3000.0)) * 300.0 - 300.0) * 2.0;
                (deficit, nulled)
            }
            None => (0.0, 0.0),
        };

        stats.playing_players + (cpu + deficit + nulled).round().max(0.0) as u32
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether [`destroy`](Self::destroy) was called.
    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Starts the socket supervisor. Does nothing while one is running.
    pub fn connect(
        self: &Arc<Self>,
        handler: Weak<dyn NodeEventHandler>,
        user_id: UserId,
        client_name: String,
    ) {
        if self.is_destroyed() {
            return;
        }

        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        info!("🎼 Conectando al nodo {} ({})", self.identifier(), self.options.socket_url());

        *supervisor = Some(tokio::spawn(socket::supervise(
            Arc::clone(self),
            handler,
            user_id,
            client_name,
        )));
    }

    /// Closes the socket and stops reconnecting. The node cannot be reused.
    pub fn destroy(&self) {
        self.cancel.cancel();
        self.set_connected(false);

        info!("🗑️ Nodo {} destruido", self.identifier());
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.identifier())
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("connected", &self.is_connected())
            .field("players", &self.player_count())
            .finish()
    }
}

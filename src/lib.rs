//! Orchestration client for remote audio nodes.
//!
//! A [`Manager`] keeps one connection per node, balances guild players
//! across them, keeps each guild's Discord voice session in sync with the
//! player on its node and resolves searches into [`LoadResult`]s.
//!
//! ```no_run
//! # async fn run(gateway_payload: serde_json::Value) -> open_music_nodes::Result<()> {
//! use open_music_nodes::{Config, Manager, ManagerOptions, PlayerOptions};
//! use serenity::model::id::{ChannelId, GuildId, UserId};
//!
//! let config = Config::load()?;
//! let (manager, events) = Manager::new(ManagerOptions::from(&config))?;
//! manager.init(UserId::new(170939974227541168))?;
//!
//! let player = manager.create(PlayerOptions::new(GuildId::new(1), ChannelId::new(2)))?;
//! manager.update_voice_state(&gateway_payload).await;
//!
//! let result = manager.search("never gonna give you up", None).await?;
//! player.enqueue_all(result.into_tracks());
//! player.play().await?;
//! # drop(events);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod model;
pub mod nodes;
pub mod player;
pub mod search;

pub use self::config::{Config, NodeOptions};
pub use error::{Error, RestError, RestResult, Result};
pub use events::Event;
pub use manager::{Manager, ManagerOptions};
pub use model::{LoadResult, Playlist, Track};
pub use nodes::{Node, NodeApi, RestClient};
pub use player::{Player, PlayerOptions, RepeatMode};
pub use search::SearchQuery;

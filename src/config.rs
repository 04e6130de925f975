use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Error, Result};

/// Connection settings for one audio node.
///
/// Keys are camelCase (`retryAmount`, `resumeTimeout`...); the snake_case
/// spelling is accepted too, which is what `OPEN_MUSIC__*` variables produce.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOptions {
    /// Logical name used for pool lookups, falls back to `host`
    #[serde(default)]
    pub identifier: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub secure: bool,
    /// Reconnect attempts after the event socket drops
    #[serde(default = "default_retry_amount", alias = "retry_amount")]
    pub retry_amount: u32,
    /// Milliseconds between reconnect attempts
    #[serde(default = "default_retry_delay", alias = "retry_delay")]
    pub retry_delay: u64,
    /// Ask the node to keep players alive while we reconnect
    #[serde(default, alias = "resume_status")]
    pub resume_status: bool,
    /// Seconds the node keeps a resumable session
    #[serde(default = "default_resume_timeout", alias = "resume_timeout")]
    pub resume_timeout: u64,
}

fn default_port() -> u16 {
    2333
}

fn default_password() -> String {
    "youshallnotpass".to_string()
}

fn default_retry_amount() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    30_000
}

fn default_resume_timeout() -> u64 {
    60
}

impl NodeOptions {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            identifier: None,
            host: host.into(),
            port,
            password: password.into(),
            secure: false,
            retry_amount: default_retry_amount(),
            retry_delay: default_retry_delay(),
            resume_status: false,
            resume_timeout: default_resume_timeout(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Single node from `LAVALINK_HOST`, `LAVALINK_PORT` and `LAVALINK_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("LAVALINK_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("LAVALINK_PORT")
            .unwrap_or_else(|_| default_port().to_string())
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("LAVALINK_PORT: {e}")))?;
        let password = std::env::var("LAVALINK_PASSWORD").unwrap_or_else(|_| default_password());

        Ok(Self::new(host, port, password))
    }

    /// Key of this node inside the pool.
    pub fn identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.host)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    /// Base URL of the REST API, versioned.
    pub fn rest_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/v4", scheme, self.host, self.port)
    }

    /// URL of the node's event socket.
    pub fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/v4/websocket", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Bot user id, required before any node connection
    #[serde(default, alias = "client_id")]
    pub client_id: Option<u64>,
    #[serde(default = "default_client_name", alias = "client_name")]
    pub client_name: String,
    /// Platform used when a search names no source
    #[serde(default = "default_search_platform", alias = "default_search_platform")]
    pub default_search_platform: String,
    #[serde(default = "default_max_queue_size", alias = "max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default)]
    pub nodes: Vec<NodeOptions>,
}

fn default_client_name() -> String {
    format!("open-music-nodes/{}", env!("CARGO_PKG_VERSION"))
}

fn default_search_platform() -> String {
    "youtube".to_string()
}

fn default_max_queue_size() -> usize {
    1000
}

impl Config {
    /// Loads `.env`, then the nodes file named by `NODES_CONFIG` (default
    /// `config/nodes`, any format the `config` crate reads) and finally
    /// `OPEN_MUSIC__*` environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("NODES_CONFIG").unwrap_or_else(|_| "config/nodes".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("OPEN_MUSIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;

        if config.client_id.is_none() {
            config.client_id = std::env::var("DISCORD_CLIENT_ID")
                .ok()
                .and_then(|s| s.parse().ok());
        }

        // Mismo fallback que el bot: un único nodo desde variables LAVALINK_*
        if config.nodes.is_empty() {
            config.nodes.push(NodeOptions::from_env()?);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Every node needs a host and a non-zero port
    /// - Node identifiers must be unique within the pool
    /// - The client id, when present, must be a valid snowflake
    /// - The queue must hold at least one track
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if node.host.trim().is_empty() {
                return Err(Error::Config("node host must not be empty".into()));
            }

            if node.port == 0 {
                return Err(Error::Config(format!(
                    "node {} has port 0",
                    node.identifier()
                )));
            }

            if !seen.insert(node.identifier()) {
                return Err(Error::Config(format!(
                    "duplicate node identifier: {}",
                    node.identifier()
                )));
            }
        }

        if matches!(self.client_id, Some(0) | Some(u64::MAX)) {
            return Err(Error::Config("client id is not a valid user id".into()));
        }

        if self.max_queue_size == 0 {
            return Err(Error::Config("max queue size must be greater than 0".into()));
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Passwords are left out.
    pub fn summary(&self) -> String {
        let nodes = self
            .nodes
            .iter()
            .map(|n| format!("{}@{}:{}", n.identifier(), n.host, n.port))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Config Summary:\n  \
            Client: {} ({})\n  \
            Search: default platform {}\n  \
            Queue: {} max tracks\n  \
            Nodes: {}",
            self.client_id.map_or("unset".to_string(), |id| id.to_string()),
            self.client_name,
            self.default_search_platform,
            self.max_queue_size,
            nodes,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_name: default_client_name(),
            default_search_platform: default_search_platform(),
            max_queue_size: default_max_queue_size(),
            nodes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_options_defaults() {
        let node: NodeOptions = serde_json::from_str(r#"{"host": "lava.local"}"#).unwrap();

        assert_eq!(node, NodeOptions::new("lava.local", 2333, "youshallnotpass"));
        assert_eq!(node.identifier(), "lava.local");
        assert_eq!(node.retry_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_node_options_camel_case() {
        let node: NodeOptions = serde_json::from_str(
            r#"{
                "identifier": "main",
                "host": "lava.local",
                "port": 2444,
                "password": "pw",
                "secure": true,
                "retryAmount": 1,
                "retryDelay": 500,
                "resumeStatus": true,
                "resumeTimeout": 10
            }"#,
        )
        .unwrap();

        assert_eq!(node.identifier(), "main");
        assert_eq!(node.port, 2444);
        assert!(node.secure);
        assert_eq!(node.retry_amount, 1);
        assert_eq!(node.retry_delay(), Duration::from_millis(500));
        assert!(node.resume_status);
        assert_eq!(node.resume_timeout, 10);
    }

    #[test]
    fn test_snake_case_keys_still_accepted() {
        let node: NodeOptions =
            serde_json::from_str(r#"{"host": "lava.local", "retry_amount": 2, "resume_status": true}"#)
                .unwrap();
        assert_eq!(node.retry_amount, 2);
        assert!(node.resume_status);

        let config: Config = serde_json::from_str(
            r#"{"defaultSearchPlatform": "soundcloud", "max_queue_size": 50, "clientId": 42}"#,
        )
        .unwrap();
        assert_eq!(config.default_search_platform, "soundcloud");
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.client_id, Some(42));
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_node_urls() {
        let mut node = NodeOptions::new("lava.local", 443, "pw").with_identifier("main");
        assert_eq!(node.rest_url(), "http://lava.local:443/v4");

        node.secure = true;
        assert_eq!(node.rest_url(), "https://lava.local:443/v4");
        assert_eq!(node.socket_url(), "wss://lava.local:443/v4/websocket");
        assert_eq!(node.identifier(), "main");
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = Config {
            nodes: vec![
                NodeOptions::new("a.local", 2333, "pw").with_identifier("main"),
                NodeOptions::new("b.local", 2333, "pw").with_identifier("main"),
            ],
            ..Config::default()
        };

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_nodes() {
        let mut config = Config {
            nodes: vec![NodeOptions::new("a.local", 0, "pw")],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.nodes = vec![NodeOptions::new(" ", 2333, "pw")];
        assert!(config.validate().is_err());

        config.nodes = vec![NodeOptions::new("a.local", 2333, "pw")];
        assert!(config.validate().is_ok());

        config.client_id = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_password() {
        let config = Config {
            nodes: vec![NodeOptions::new("a.local", 2333, "hunter2")],
            ..Config::default()
        };

        let summary = config.summary();
        assert!(summary.contains("a.local@a.local:2333"));
        assert!(!summary.contains("hunter2"));
    }
}

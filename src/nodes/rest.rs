use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serenity::model::id::GuildId;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::NodeOptions;
use crate::error::{RestError, RestResult};
use crate::model::{
    LoadTracksResponse, NodeInfo, NodeStats, PlayerUpdate, RawTrack, RemotePlayer, SessionInfo,
    SessionUpdate,
};

/// REST surface of one node.
///
/// Each call is independent and never retried; a failure is reported once,
/// through the returned [`RestError`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Session id from the node's `ready` handshake, if any.
    fn session_id(&self) -> Option<String>;

    fn set_session_id(&self, session_id: Option<String>);

    async fn get_all_players(&self) -> RestResult<Vec<RemotePlayer>>;

    async fn get_player(&self, guild_id: GuildId) -> RestResult<RemotePlayer>;

    /// PATCHes the given fields of the guild's player, creating it if needed.
    async fn update_player(
        &self,
        guild_id: GuildId,
        data: &PlayerUpdate,
        no_replace: bool,
    ) -> RestResult<RemotePlayer>;

    async fn destroy_player(&self, guild_id: GuildId) -> RestResult<()>;

    async fn update_session(&self, data: &SessionUpdate) -> RestResult<SessionInfo>;

    async fn load_tracks(&self, identifier: &str) -> RestResult<LoadTracksResponse>;

    async fn decode_track(&self, encoded: &str) -> RestResult<RawTrack>;

    async fn decode_tracks(&self, encoded: &[String]) -> RestResult<Vec<RawTrack>>;

    async fn info(&self) -> RestResult<NodeInfo>;

    async fn stats(&self) -> RestResult<NodeStats>;
}

/// Error body the node sends with non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string())
}

/// HTTP client bound to one node's address and password.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    password: String,
    session_id: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(options: &NodeOptions) -> RestResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("open-music-nodes/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: options.rest_url(),
            password: options.password.clone(),
            session_id: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, &self.password)
    }

    /// `/sessions/{id}/players[/{guild}]`, or `NoSession` before the handshake.
    fn players_path(&self, guild_id: Option<GuildId>) -> RestResult<String> {
        let session_id = self.session_id().ok_or(RestError::NoSession)?;

        Ok(match guild_id {
            Some(guild_id) => format!("/sessions/{}/players/{}", session_id, guild_id),
            None => format!("/sessions/{}/players", session_id),
        })
    }

    async fn execute(&self, request: RequestBuilder) -> RestResult<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            warn!("❌ Petición a {} falló: {}", self.base_url, e);
            RestError::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("⚠️ {} respondió {}: {}", self.base_url, status, body);

        Err(RestError::from_status(status, error_message(&body)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RestResult<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl NodeApi for RestClient {
    fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    async fn get_all_players(&self) -> RestResult<Vec<RemotePlayer>> {
        let path = self.players_path(None)?;
        self.send(self.request(Method::GET, &path)).await
    }

    async fn get_player(&self, guild_id: GuildId) -> RestResult<RemotePlayer> {
        let path = self.players_path(Some(guild_id))?;
        self.send(self.request(Method::GET, &path)).await
    }

    async fn update_player(
        &self,
        guild_id: GuildId,
        data: &PlayerUpdate,
        no_replace: bool,
    ) -> RestResult<RemotePlayer> {
        let path = self.players_path(Some(guild_id))?;
        debug!("PATCH {} en {}", path, self.base_url);

        let request = self
            .request(Method::PATCH, &path)
            .query(&[("noReplace", no_replace)])
            .json(data);

        self.send(request).await
    }

    async fn destroy_player(&self, guild_id: GuildId) -> RestResult<()> {
        let path = self.players_path(Some(guild_id))?;
        self.execute(self.request(Method::DELETE, &path)).await?;

        Ok(())
    }

    async fn update_session(&self, data: &SessionUpdate) -> RestResult<SessionInfo> {
        let session_id = self.session_id().ok_or(RestError::NoSession)?;
        let path = format!("/sessions/{}", session_id);

        self.send(self.request(Method::PATCH, &path).json(data)).await
    }

    async fn load_tracks(&self, identifier: &str) -> RestResult<LoadTracksResponse> {
        let request = self
            .request(Method::GET, "/loadtracks")
            .query(&[("identifier", identifier)]);

        self.send(request).await
    }

    async fn decode_track(&self, encoded: &str) -> RestResult<RawTrack> {
        let request = self
            .request(Method::GET, "/decodetrack")
            .query(&[("encodedTrack", encoded)]);

        self.send(request).await
    }

    async fn decode_tracks(&self, encoded: &[String]) -> RestResult<Vec<RawTrack>> {
        self.send(self.request(Method::POST, "/decodetracks").json(encoded))
            .await
    }

    async fn info(&self) -> RestResult<NodeInfo> {
        self.send(self.request(Method::GET, "/info")).await
    }

    async fn stats(&self) -> RestResult<NodeStats> {
        self.send(self.request(Method::GET, "/stats")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(&NodeOptions::new("127.0.0.1", 2333, "pw")).unwrap()
    }

    #[test]
    fn test_base_url() {
        assert_eq!(client().base_url(), "http://127.0.0.1:2333/v4");
    }

    #[test]
    fn test_players_path_needs_session() {
        let client = client();
        assert!(matches!(client.players_path(None), Err(RestError::NoSession)));

        client.set_session_id(Some("abc".into()));
        assert_eq!(client.players_path(None).unwrap(), "/sessions/abc/players");
        assert_eq!(
            client.players_path(Some(GuildId::new(42))).unwrap(),
            "/sessions/abc/players/42"
        );
    }

    #[tokio::test]
    async fn test_update_without_session_makes_no_request() {
        let result = client()
            .update_player(GuildId::new(42), &PlayerUpdate::pause(true), false)
            .await;

        assert!(matches!(result, Err(RestError::NoSession)));
    }

    #[test]
    fn test_error_message_from_body() {
        let body = r#"{"timestamp":1667857581613,"status":404,"error":"Not Found","message":"Session not found","path":"/v4/sessions/xtaug914v9k5032f/players/817327181659111454"}"#;

        assert_eq!(error_message(body), "Session not found");
        assert_eq!(error_message("plain text"), "plain text");
    }
}

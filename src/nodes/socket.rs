use async_trait::async_trait;
use futures::StreamExt;
use serenity::model::id::UserId;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, InvalidHeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, trace, warn};

use super::Node;
use crate::config::NodeOptions;
use crate::events::Event;
use crate::model::NodeMessage;

/// Receives what a node's event socket produces.
#[async_trait]
pub trait NodeEventHandler: Send + Sync {
    /// A parsed frame from the node.
    async fn handle_message(&self, node: &Arc<Node>, message: NodeMessage);

    /// Connection lifecycle of the node (disconnect, reconnect, error).
    fn handle_lifecycle(&self, event: Event);
}

#[derive(Debug, Error)]
pub(crate) enum SocketError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid handshake header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Handshake request for the node's event socket.
pub(crate) fn build_request(
    options: &NodeOptions,
    user_id: UserId,
    client_name: &str,
    session_id: Option<&str>,
) -> Result<Request, SocketError> {
    let mut request = options.socket_url().as_str().into_client_request()?;

    let headers = request.headers_mut();
    headers.insert("Authorization", HeaderValue::from_str(&options.password)?);
    headers.insert("User-Id", HeaderValue::from_str(&user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_str(client_name)?);

    if let Some(session_id) = session_id {
        headers.insert("Session-Id", HeaderValue::from_str(session_id)?);
    }

    Ok(request)
}

/// Keeps the node's socket open, reconnecting up to `retry_amount` times in
/// a row with `retry_delay` between attempts.
pub(crate) async fn supervise(
    node: Arc<Node>,
    handler: Weak<dyn NodeEventHandler>,
    user_id: UserId,
    client_name: String,
) {
    let identifier = node.identifier().to_string();
    let mut attempt = 0u32;

    loop {
        let mut established = false;
        let result = run(&node, &handler, user_id, &client_name, &mut established).await;
        node.set_connected(false);

        if node.is_destroyed() {
            break;
        }

        let Some(events) = handler.upgrade() else {
            break;
        };

        let reason = match result {
            Ok(()) => "socket closed".to_string(),
            Err(e) => e.to_string(),
        };

        if established {
            warn!("🔌 Nodo {} desconectado: {}", identifier, reason);
            events.handle_lifecycle(Event::NodeDisconnect {
                identifier: identifier.clone(),
                reason: reason.clone(),
            });
            attempt = 0;
        } else {
            warn!("❌ No se pudo conectar al nodo {}: {}", identifier, reason);
        }

        attempt += 1;
        if attempt > node.options().retry_amount {
            error!(
                "❌ Nodo {} sin conexión tras {} reintentos",
                identifier,
                node.options().retry_amount
            );
            events.handle_lifecycle(Event::NodeError {
                identifier: identifier.clone(),
                error: format!("gave up reconnecting: {}", reason),
            });
            break;
        }
        drop(events);

        tokio::select! {
            _ = node.cancel_token().cancelled() => break,
            _ = tokio::time::sleep(node.options().retry_delay()) => {}
        }

        let Some(events) = handler.upgrade() else {
            break;
        };
        info!("🔄 Reconectando al nodo {} (intento {})", identifier, attempt);
        events.handle_lifecycle(Event::NodeReconnect {
            identifier: identifier.clone(),
            attempt,
        });
    }

    debug!("Supervisor del nodo {} terminado", identifier);
}

async fn run(
    node: &Arc<Node>,
    handler: &Weak<dyn NodeEventHandler>,
    user_id: UserId,
    client_name: &str,
    established: &mut bool,
) -> Result<(), SocketError> {
    let session_id = if node.options().resume_status {
        node.rest().session_id()
    } else {
        None
    };
    let request = build_request(node.options(), user_id, client_name, session_id.as_deref())?;

    let (mut socket, _) = tokio::select! {
        _ = node.cancel_token().cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(request) => result?,
    };

    *established = true;
    info!("🔗 Socket del nodo {} abierto", node.identifier());

    loop {
        let frame = tokio::select! {
            _ = node.cancel_token().cancelled() => {
                let _ = socket.close(None).await;
                return Ok(());
            }
            frame = socket.next() => frame,
        };

        match frame {
            None => return Ok(()),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(Message::Text(text))) => {
                trace!("Frame de {}: {}", node.identifier(), text);

                let message = match NodeMessage::parse(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("⚠️ Frame inválido de {}: {}", node.identifier(), e);
                        continue;
                    }
                };

                let Some(handler) = handler.upgrade() else {
                    return Ok(());
                };
                handler.handle_message(node, message).await;
            }
            Some(Ok(Message::Close(frame))) => {
                info!("Nodo {} cerró el socket: {:?}", node.identifier(), frame);
                return Ok(());
            }
            Some(Ok(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_headers() {
        let mut options = NodeOptions::new("lava.local", 2333, "youshallnotpass");
        options.secure = true;

        let request = build_request(
            &options,
            UserId::new(170939974227541168),
            "open-music-nodes/1.0.0",
            Some("abc"),
        )
        .unwrap();

        assert_eq!(request.uri(), "wss://lava.local:2333/v4/websocket");
        let headers = request.headers();
        assert_eq!(headers["Authorization"], "youshallnotpass");
        assert_eq!(headers["User-Id"], "170939974227541168");
        assert_eq!(headers["Client-Name"], "open-music-nodes/1.0.0");
        assert_eq!(headers["Session-Id"], "abc");
    }

    #[test]
    fn test_no_session_header_without_resume() {
        let options = NodeOptions::new("lava.local", 2333, "pw");
        let request = build_request(&options, UserId::new(1), "client", None).unwrap();

        assert!(request.headers().get("Session-Id").is_none());
    }

    #[test]
    fn test_bad_password_is_rejected() {
        let options = NodeOptions::new("lava.local", 2333, "bad\npassword");

        assert!(matches!(
            build_request(&options, UserId::new(1), "client", None),
            Err(SocketError::Header(_))
        ));
    }
}

//! WebSocket implementation of [`RealtimeTransport`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::protocol::{ClientMsg, ServerMsg, Topic, PROTOCOL_VERSION};
use crate::transport::{PresenceAnnouncement, PresenceEvent, RealtimeTransport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    url: String,
    handshake_timeout: Duration,
    stream: Option<WsStream>,
    topics: Vec<Topic>,
    /// Events that arrived while waiting for handshake acks.
    backlog: VecDeque<TransportEvent>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            handshake_timeout: Duration::from_secs(5),
            stream: None,
            topics: Vec::new(),
            backlog: VecDeque::new(),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn send_msg(stream: &mut WsStream, msg: &ClientMsg) -> Result<(), TransportError> {
        let encoded =
            serde_json::to_string(msg).map_err(|err| TransportError::Protocol(err.to_string()))?;
        stream
            .send(Message::text(encoded))
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))
    }

    /// Read until `want` matches, queueing everything else for `next_event`.
    async fn expect<F>(
        &mut self,
        stream: &mut WsStream,
        what: &'static str,
        want: F,
    ) -> Result<(), TransportError>
    where
        F: Fn(&ServerMsg) -> bool,
    {
        let handshake_timeout = self.handshake_timeout;
        let backlog = &mut self.backlog;
        let read = async {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let msg: ServerMsg = serde_json::from_str(&text)
                            .map_err(|err| TransportError::Protocol(err.to_string()))?;
                        if want(&msg) {
                            return Ok(());
                        }
                        if let ServerMsg::Error { code, message } = &msg {
                            return Err(TransportError::Protocol(format!("{code}: {message}")));
                        }
                        if let Some(event) = decode(msg) {
                            backlog.push_back(event);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Err(TransportError::Connect(err.to_string())),
                }
            }
        };

        tokio::time::timeout(handshake_timeout, read)
            .await
            .map_err(|_| TransportError::Timeout(what))?
    }

    async fn send_current(&mut self, msg: ClientMsg) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Closed);
        };
        if let Err(err) = Self::send_msg(stream, &msg).await {
            self.stream = None;
            return Err(err);
        }
        Ok(())
    }
}

fn decode(msg: ServerMsg) -> Option<TransportEvent> {
    match msg {
        ServerMsg::HelloAck { .. } | ServerMsg::Ack { .. } => None,
        ServerMsg::Heartbeat => Some(TransportEvent::Heartbeat),
        ServerMsg::GameState { snapshot, .. } => Some(TransportEvent::RemoteUpdate(snapshot)),
        ServerMsg::Presence {
            event,
            player_name,
            timestamp,
        } => Some(TransportEvent::Presence(PresenceEvent {
            kind: event,
            player_name,
            timestamp,
        })),
        ServerMsg::ActionResult { action_id, error } => {
            Some(TransportEvent::ActionResult { action_id, error })
        }
        ServerMsg::Error { code, message } => {
            warn!(code = %code, message = %message, "[WS CLIENT] Server reported error");
            None
        }
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn subscribe(&mut self, game_code: &str) -> Result<(), TransportError> {
        self.stream = None;
        self.backlog.clear();

        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Self::send_msg(
            &mut stream,
            &ClientMsg::Hello {
                protocol: PROTOCOL_VERSION,
            },
        )
        .await?;
        self.expect(&mut stream, "hello_ack", |msg| {
            matches!(msg, ServerMsg::HelloAck { .. })
        })
        .await?;

        let topics = vec![Topic::game(game_code), Topic::presence(game_code)];
        for topic in &topics {
            Self::send_msg(
                &mut stream,
                &ClientMsg::Subscribe {
                    topic: topic.clone(),
                },
            )
            .await?;
            self.expect(&mut stream, "subscribe ack", |msg| {
                matches!(msg, ServerMsg::Ack { .. })
            })
            .await?;
            debug!(channel = %topic.channel_name(), "[WS CLIENT] Subscribed");
        }

        self.topics = topics;
        self.stream = Some(stream);
        Ok(())
    }

    async fn track(&mut self, announcement: &PresenceAnnouncement) -> Result<(), TransportError> {
        self.send_current(ClientMsg::Track {
            player_name: announcement.player_name.clone(),
            online_at: announcement.online_at,
        })
        .await
    }

    async fn send(&mut self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.send_current(ClientMsg::Broadcast {
            event: event.to_string(),
            payload,
        })
        .await
    }

    async fn next_event(&mut self) -> TransportEvent {
        if let Some(event) = self.backlog.pop_front() {
            return event;
        }

        loop {
            let Some(stream) = self.stream.as_mut() else {
                return TransportEvent::Closed {
                    reason: "not connected".to_string(),
                };
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMsg>(&text) {
                    Ok(msg) => {
                        if let Some(event) = decode(msg) {
                            return event;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "[WS CLIENT] Failed to decode server message");
                    }
                },
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    return TransportEvent::Heartbeat;
                }
                Some(Ok(Message::Close(frame))) => {
                    self.stream = None;
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return TransportEvent::Closed { reason };
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.stream = None;
                    return TransportEvent::Closed {
                        reason: err.to_string(),
                    };
                }
                None => {
                    self.stream = None;
                    return TransportEvent::Closed {
                        reason: "stream ended".to_string(),
                    };
                }
            }
        }
    }

    async fn unsubscribe(&mut self) {
        let topics = std::mem::take(&mut self.topics);
        self.backlog.clear();
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        for topic in topics {
            let _ = Self::send_msg(&mut stream, &ClientMsg::Unsubscribe { topic }).await;
        }
        let _ = stream.close(None).await;
    }
}

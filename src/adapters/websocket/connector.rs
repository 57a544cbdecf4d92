//! WebSocket transport for the realtime channel.
//!
//! One background task per opened channel. The task owns the socket and
//! reconnects with exponential backoff until the session closes the
//! handle or the configured attempt limit is reached.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::{BackendConfig, RealtimeConfig};
use crate::domain::conversation::ConnectionStatus;
use crate::domain::foundation::ConversationId;
use crate::ports::{ChannelEndpoint, ChannelHandle, OutboundFrame, RealtimeConnector, ShutdownSignal};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens realtime channels against `{ws_base_url}/{conversation_id}/`.
///
/// The server only completes the handshake after binding the assistant to
/// the conversation, so `Open` doubles as "ready for messages".
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    backend: BackendConfig,
    realtime: RealtimeConfig,
}

impl WebSocketConnector {
    pub fn new(backend: BackendConfig, realtime: RealtimeConfig) -> Self {
        Self { backend, realtime }
    }
}

impl RealtimeConnector for WebSocketConnector {
    fn open(&self, conversation_id: ConversationId) -> ChannelHandle {
        let (handle, endpoint) =
            ChannelHandle::pair(conversation_id, self.realtime.outbound_queue_capacity);

        let transport = Transport {
            url: self.backend.channel_url(conversation_id),
            connect_timeout: self.backend.request_timeout(),
            policy: self.realtime.clone(),
        };
        tokio::spawn(transport.run(endpoint));

        handle
    }
}

/// Why a connected socket stopped being serviced.
#[derive(Debug)]
enum Disconnect {
    /// Session closed the channel.
    Shutdown,
    /// Session side dropped its inbound receiver.
    SessionGone,
    /// Connection lost; eligible for reconnect.
    Dropped(String),
}

struct Transport {
    url: String,
    connect_timeout: std::time::Duration,
    policy: RealtimeConfig,
}

impl Transport {
    async fn run(self, mut endpoint: ChannelEndpoint) {
        let conversation_id = endpoint.conversation_id;
        let mut shutdown = endpoint.shutdown_signal();
        // Frame whose write failed; retried first after reconnecting.
        let mut unsent: Option<OutboundFrame> = None;
        let mut first_attempt = true;
        let mut failures: u32 = 0;

        loop {
            if shutdown.is_requested() {
                break;
            }

            endpoint.set_status(if first_attempt {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting
            });
            first_attempt = false;

            let connected = tokio::select! {
                result = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())) => result,
                _ = shutdown.requested() => break,
            };

            match connected {
                Ok(Ok((socket, _response))) => {
                    failures = 0;
                    endpoint.set_status(ConnectionStatus::Open);
                    tracing::info!(%conversation_id, url = %self.url, "Realtime channel open");

                    match pump(socket, &mut endpoint, &mut shutdown, &mut unsent).await {
                        Disconnect::Shutdown | Disconnect::SessionGone => break,
                        Disconnect::Dropped(reason) => {
                            tracing::warn!(%conversation_id, %reason, "Realtime channel dropped");
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(%conversation_id, error = %e, "Realtime connect failed");
                }
                Err(_) => {
                    tracing::warn!(
                        %conversation_id,
                        timeout_secs = self.connect_timeout.as_secs(),
                        "Realtime connect timed out"
                    );
                }
            }

            failures += 1;
            if self.policy.attempts_exhausted(failures) {
                tracing::error!(%conversation_id, attempts = failures, "Giving up on realtime channel");
                break;
            }

            endpoint.set_status(ConnectionStatus::Reconnecting);
            let delay = self.policy.backoff_delay(failures);
            tracing::debug!(%conversation_id, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.requested() => break,
            }
        }

        endpoint.set_status(ConnectionStatus::Disconnected);
        tracing::debug!(%conversation_id, "Realtime transport stopped");
    }
}

/// Services one live socket until it drops or the session closes it.
async fn pump(
    socket: Socket,
    endpoint: &mut ChannelEndpoint,
    shutdown: &mut ShutdownSignal,
    unsent: &mut Option<OutboundFrame>,
) -> Disconnect {
    let (mut sink, mut stream) = socket.split();

    if let Some(frame) = unsent.take() {
        if let Err(reason) = write_frame(&mut sink, &frame).await {
            *unsent = Some(frame);
            return Disconnect::Dropped(reason);
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.requested() => {
                let _ = sink.send(Message::Close(None)).await;
                return Disconnect::Shutdown;
            }

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !endpoint.deliver(text).await {
                        return Disconnect::SessionGone;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        if !endpoint.deliver(text).await {
                            return Disconnect::SessionGone;
                        }
                    }
                    Err(_) => {
                        tracing::warn!(conversation_id = %endpoint.conversation_id, "Ignoring non-UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => format!("closed by server ({})", u16::from(frame.code)),
                        None => "closed by server".to_string(),
                    };
                    return Disconnect::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Disconnect::Dropped(e.to_string()),
                None => return Disconnect::Dropped("stream ended".to_string()),
            },

            frame = endpoint.outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(reason) = write_frame(&mut sink, &frame).await {
                        *unsent = Some(frame);
                        return Disconnect::Dropped(reason);
                    }
                }
                None => return Disconnect::SessionGone,
            },
        }
    }
}

async fn write_frame<S>(sink: &mut S, frame: &OutboundFrame) -> Result<(), String>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = match frame.to_json() {
        Ok(json) => json,
        Err(e) => {
            // Encoding failures are not retried.
            tracing::error!(chat_id = %frame.chat_id, error = %e, "Failed to encode outbound frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

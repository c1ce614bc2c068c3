//! Duplex live channel over WebSocket.
//!
//! Carries outbound audio frames and delivers inbound events in arrival
//! order. The channel owns no retry policy: a disconnect is terminal and
//! surfaces as [`LiveEvent::Closed`].

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use super::capture::EncodedFrame;
use super::config::LiveConfig;
use super::events::LiveEvent;
use crate::error::{Result, StrydeError};

type LiveWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Cloneable fire-and-forget sender for outbound frames.
///
/// Frame order is preserved per channel; sends after close are dropped.
#[derive(Debug, Clone)]
pub struct LiveSender(mpsc::UnboundedSender<EncodedFrame>);

impl LiveSender {
    pub fn send(&self, frame: EncodedFrame) {
        let _ = self.0.send(frame);
    }
}

/// One open duplex channel to the live endpoint.
#[derive(Debug)]
pub struct LiveChannel {
    outbound_tx: mpsc::UnboundedSender<EncodedFrame>,
    events_rx: mpsc::UnboundedReceiver<LiveEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Connect, send the setup message, and start the channel task.
    ///
    /// The server's setup acknowledgment arrives later as
    /// [`LiveEvent::Ready`].
    pub async fn open(config: &LiveConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let url = build_live_url(&config.base_url, &api_key)?;
        let setup_payload = build_setup_payload(config);

        let mut socket = connect_live_socket(&url).await?;
        socket
            .send(Message::Text(setup_payload.to_string().into()))
            .await
            .map_err(|error| StrydeError::ChannelOpen(format!("Setup send failed: {error}")))?;

        debug!(model = config.model.as_str(), "Live channel open");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_channel_loop(
            socket,
            events_tx,
            outbound_rx,
            shutdown_rx,
            config.heartbeat_interval,
        ));

        Ok(Self {
            outbound_tx,
            events_rx,
            shutdown_tx,
            task: Some(task),
        })
    }

    /// A cloneable handle for the capture pipeline.
    pub fn sender(&self) -> LiveSender {
        LiveSender(self.outbound_tx.clone())
    }

    /// Queue one frame for transmission (fire-and-forget).
    pub fn send(&self, frame: EncodedFrame) {
        let _ = self.outbound_tx.send(frame);
    }

    /// Wait for the next inbound event. `None` after [`LiveEvent::Closed`].
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events_rx.recv().await
    }

    /// Close the channel gracefully. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.await
                .map_err(|error| StrydeError::Channel(format!("Channel task failed: {error}")))?;
        }
        Ok(())
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}

async fn run_channel_loop(
    mut socket: LiveWebSocket,
    events_tx: mpsc::UnboundedSender<LiveEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<EncodedFrame>,
    mut shutdown_rx: watch::Receiver<bool>,
    heartbeat_interval: std::time::Duration,
) {
    let mut heartbeat = time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(error) = socket.send(Message::Ping(Default::default())).await {
                    let _ = events_tx.send(LiveEvent::ServerError {
                        message: format!("Live heartbeat failed: {error}"),
                    });
                    break;
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let payload = realtime_input_payload(&frame);
                        if let Err(error) = socket.send(Message::Text(payload.to_string().into())).await {
                            let _ = events_tx.send(LiveEvent::ServerError {
                                message: format!("Live frame send failed: {error}"),
                            });
                            break;
                        }
                    }
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            message = socket.next() => {
                match message {
                    Some(Ok(message)) => {
                        if handle_server_message(&mut socket, &events_tx, message).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(error = %error, "Live websocket receive failed");
                        let _ = events_tx.send(LiveEvent::ServerError {
                            message: format!("Live websocket receive failed: {error}"),
                        });
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events_tx.send(LiveEvent::Closed);
}

async fn handle_server_message(
    socket: &mut LiveWebSocket,
    events_tx: &mpsc::UnboundedSender<LiveEvent>,
    message: Message,
) -> std::result::Result<(), WsError> {
    match message {
        Message::Text(text) => parse_and_forward_events(text.as_ref(), events_tx),
        Message::Binary(bytes) => {
            // The live endpoint delivers JSON payloads as binary frames.
            if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                parse_and_forward_events(&text, events_tx);
            }
        }
        Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
        Message::Pong(_) => {}
        Message::Close(_) => return Err(WsError::ConnectionClosed),
        Message::Frame(_) => {}
    }
    Ok(())
}

fn parse_and_forward_events(payload: &str, events_tx: &mpsc::UnboundedSender<LiveEvent>) {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => {
            for event in LiveEvent::from_server_payload(&value) {
                let _ = events_tx.send(event);
            }
        }
        Err(error) => {
            let _ = events_tx.send(LiveEvent::ServerError {
                message: format!("Failed to parse live event payload: {error}"),
            });
        }
    }
}

fn build_live_url(base_url: &str, api_key: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(StrydeError::Configuration(
            "Live base URL cannot be empty".into(),
        ));
    }
    let separator = if trimmed.contains('?') { "&" } else { "?" };
    Ok(format!("{trimmed}{separator}key={api_key}"))
}

fn build_setup_payload(config: &LiveConfig) -> Value {
    let model = if config.model.starts_with("models/") {
        config.model.clone()
    } else {
        format!("models/{}", config.model)
    };

    let mut setup = serde_json::json!({
        "model": model,
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": config.voice } }
            }
        },
        "systemInstruction": { "parts": [{ "text": config.system_instruction }] },
    });
    if config.transcribe_input {
        setup["inputAudioTranscription"] = serde_json::json!({});
    }
    if config.transcribe_output {
        setup["outputAudioTranscription"] = serde_json::json!({});
    }

    serde_json::json!({ "setup": setup })
}

fn realtime_input_payload(frame: &EncodedFrame) -> Value {
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [{ "mimeType": frame.mime_type, "data": frame.data }]
        }
    })
}

async fn connect_live_socket(url: &str) -> Result<LiveWebSocket> {
    let request = url
        .into_client_request()
        .map_err(|error| StrydeError::Configuration(format!("Invalid live URL: {error}")))?;

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> StrydeError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                StrydeError::Authentication(format!(
                    "Live handshake authentication failed with status {status}"
                ))
            } else {
                StrydeError::ChannelOpen(format!("Live handshake failed with status {status}"))
            }
        }
        WsError::Io(error) => StrydeError::ChannelOpen(format!("Live connect failed: {error}")),
        WsError::Url(error) => StrydeError::Configuration(format!("Invalid live URL: {error}")),
        other => StrydeError::ChannelOpen(format!("Live connect failed: {other}")),
    }
}

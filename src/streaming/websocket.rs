// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! WebSocket server for live frames, alerts and operator commands

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{Command, CommandRequest, Response};
use crate::core::{AnnotatedFrame, ConnectionEvent, EventBus, StatusLine};
use crate::detection::Alert;

/// Server-to-viewer message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    VideoFrame {
        /// Base64 of the frame buffer
        frame: String,
        width: u32,
        height: u32,
        sequence: u64,
        status: Vec<StatusLine>,
    },
    NewAlert {
        alert: Alert,
    },
    ConnectionStatus(ConnectionEvent),
    Pong,
    CommandResult {
        result: Response,
    },
}

impl OutboundMessage {
    pub fn video_frame(annotated: &AnnotatedFrame) -> Self {
        OutboundMessage::VideoFrame {
            frame: STANDARD.encode(&annotated.frame.data),
            width: annotated.frame.width,
            height: annotated.frame.height,
            sequence: annotated.frame.sequence,
            status: annotated.status.clone(),
        }
    }

    fn to_message(&self) -> Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

/// Parse an inbound text message into a reply or a command
fn parse_inbound(text: &str) -> Result<Command, OutboundMessage> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        OutboundMessage::CommandResult {
            result: Response::error(format!("Invalid data: {}", e)),
        }
    })?;

    if value.get("type").and_then(|v| v.as_str()) == Some("ping") {
        return Err(OutboundMessage::Pong);
    }

    serde_json::from_value(value).map_err(|e| OutboundMessage::CommandResult {
        result: Response::error(format!("Invalid data: {}", e)),
    })
}

/// Per-client position in the bus alert history
struct AlertFeed {
    next: u64,
}

impl AlertFeed {
    /// Start a feed, returning the alerts published before it.
    /// Subscribe to the bus first so nothing falls between the two.
    fn start(bus: &EventBus) -> (Self, Vec<Alert>) {
        let batch = bus.alerts_since(0);
        (Self { next: batch.next_cursor }, batch.alerts)
    }

    /// Pass a live alert through unless a replay already delivered it
    fn accept(&mut self, seq: u64, alert: Alert) -> Option<Alert> {
        if seq < self.next {
            return None;
        }
        self.next = seq + 1;
        Some(alert)
    }

    /// Everything published since the last delivered alert
    fn catch_up(&mut self, bus: &EventBus) -> Vec<Alert> {
        let batch = bus.alerts_since(self.next);
        self.next = batch.next_cursor;
        batch.alerts
    }
}

fn alert_messages(alerts: Vec<Alert>) -> Vec<OutboundMessage> {
    alerts
        .into_iter()
        .map(|alert| OutboundMessage::NewAlert { alert })
        .collect()
}

struct ClientHandle {
    addr: SocketAddr,
}

/// WebSocket server
pub struct WebSocketServer {
    port: u16,
    max_clients: usize,
    bus: Arc<EventBus>,
    clients: Arc<RwLock<HashMap<Uuid, ClientHandle>>>,
}

impl WebSocketServer {
    pub fn new(port: u16, max_clients: usize, bus: Arc<EventBus>) -> Self {
        Self {
            port,
            max_clients,
            bus,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind and start accepting. Returns the bound address.
    pub async fn start(
        &self,
        commands: mpsc::Sender<CommandRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SocketAddr> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;

        info!("WebSocket server listening on ws://{}", local);

        let clients = self.clients.clone();
        let max_clients = self.max_clients;
        let bus = self.bus.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                let client_count = clients.read().await.len();
                                if client_count >= max_clients {
                                    warn!("Max clients reached, rejecting {}", addr);
                                    continue;
                                }

                                tokio::spawn(handle_connection(
                                    stream,
                                    addr,
                                    clients.clone(),
                                    bus.clone(),
                                    commands.clone(),
                                ));
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local)
    }

    pub async fn get_client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn get_client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.read().await.values().map(|c| c.addr).collect()
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<HashMap<Uuid, ClientHandle>>>,
    bus: Arc<EventBus>,
    commands: mpsc::Sender<CommandRequest>,
) {
    let client_id = Uuid::new_v4();

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    info!("New WebSocket connection from {} (id: {})", addr, client_id);
    clients.write().await.insert(client_id, ClientHandle { addr });

    let mut frames = bus.subscribe_frames();
    let mut alerts = bus.subscribe_alerts();
    let mut events = bus.subscribe_events();

    let (mut feed, backlog) = AlertFeed::start(&bus);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let mut greeting = vec![OutboundMessage::ConnectionStatus(ConnectionEvent::Connected)];
    greeting.extend(alert_messages(backlog));
    if let Err(e) = send_all(&mut ws_sender, &greeting).await {
        warn!("Failed to greet {}: {}", addr, e);
    }

    loop {
        let outbound: Vec<OutboundMessage> = tokio::select! {
            // Incoming messages from client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from {}: {}", addr, text);
                        match parse_inbound(&text) {
                            Ok(command) => vec![run_command(&commands, command).await],
                            Err(reply) => vec![reply],
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by client {}", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => continue,
                }
            }

            frame = frames.recv() => {
                match frame {
                    Ok(annotated) => vec![OutboundMessage::video_frame(&annotated)],
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Client {} skipped {} frames", addr, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            alert = alerts.recv() => {
                match alert {
                    Ok((seq, alert)) => match feed.accept(seq, alert) {
                        Some(alert) => vec![OutboundMessage::NewAlert { alert }],
                        None => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Client {} lagged by {} alerts, replaying", addr, skipped);
                        alert_messages(feed.catch_up(&bus))
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => vec![OutboundMessage::ConnectionStatus(event)],
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        if let Err(e) = send_all(&mut ws_sender, &outbound).await {
            warn!("Failed to send to {}: {}", addr, e);
            break;
        }
    }

    clients.write().await.remove(&client_id);
    info!("WebSocket client {} disconnected", addr);
}

async fn send_all<S>(sink: &mut S, messages: &[OutboundMessage]) -> Result<()>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    for outbound in messages {
        sink.send(outbound.to_message()?).await?;
    }
    Ok(())
}

async fn run_command(commands: &mpsc::Sender<CommandRequest>, command: Command) -> OutboundMessage {
    let (request, reply) = CommandRequest::new(command);

    let result = if commands.send(request).await.is_err() {
        Response::error("Command API unavailable")
    } else {
        reply
            .await
            .unwrap_or_else(|_| Response::error("Command API unavailable"))
    };
    OutboundMessage::CommandResult { result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ViolationCategory, ViolationStats};
    use crate::vision::Frame;
    use chrono::Utc;
    use serde_json::json;
    use tokio_tungstenite::connect_async;

    #[test]
    fn test_outbound_wire_format() {
        let connected = OutboundMessage::ConnectionStatus(ConnectionEvent::Connected);
        let json = serde_json::to_value(connected).unwrap();
        assert_eq!(json, json!({"type": "connection_status", "status": "connected"}));

        let ended = ConnectionEvent::StreamEnded { reason: "end of stream".to_string() };
        let json = serde_json::to_value(OutboundMessage::ConnectionStatus(ended)).unwrap();
        assert_eq!(json["status"], "stream_ended");
        assert_eq!(json["reason"], "end of stream");

        let alert = Alert::new(ViolationCategory::MultipleFaces, Utc::now(), 2);
        let json = serde_json::to_value(OutboundMessage::NewAlert { alert }).unwrap();
        assert_eq!(json["type"], "new_alert");
        assert_eq!(json["alert"]["type"], "multiple_faces");
        assert_eq!(json["alert"]["count"], 2);
    }

    #[test]
    fn test_video_frame_is_base64() {
        let frame = Frame::new(2, 1, 5, vec![1, 2, 3]);
        let annotated = AnnotatedFrame::new(frame, vec![], vec![], None, &ViolationStats::new());
        let json = serde_json::to_value(OutboundMessage::video_frame(&annotated)).unwrap();
        assert_eq!(json["type"], "video_frame");
        assert_eq!(json["frame"], "AQID");
        assert_eq!(json["sequence"], 5);
    }

    #[test]
    fn test_parse_inbound() {
        assert!(matches!(parse_inbound(r#"{"type":"ping"}"#), Err(OutboundMessage::Pong)));
        assert_eq!(
            parse_inbound(r#"{"type":"clear_alerts"}"#).unwrap(),
            Command::ClearAlerts
        );
        assert!(matches!(
            parse_inbound("not json"),
            Err(OutboundMessage::CommandResult { .. })
        ));
    }

    type WsResult = Result<Message, tokio_tungstenite::tungstenite::Error>;

    async fn next_json<S>(ws: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = WsResult> + Unpin,
    {
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_client_session() {
        let bus = Arc::new(EventBus::default());
        let server = WebSocketServer::new(0, 4, bus.clone());
        let (commands, mut requests) = mpsc::channel::<CommandRequest>(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let addr = server.start(commands, shutdown_rx).await.unwrap();
        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = connect_async(url).await.unwrap();

        let hello = next_json(&mut ws).await;
        assert_eq!(hello, json!({"type": "connection_status", "status": "connected"}));

        ws.send(Message::Text(r#"{"type":"ping"}"#.to_string())).await.unwrap();
        assert_eq!(next_json(&mut ws).await["type"], "pong");

        // answer one command the way the API would
        tokio::spawn(async move {
            if let Some(request) = requests.recv().await {
                let _ = request.reply.send(Response::success("Alerts cleared"));
            }
        });
        ws.send(Message::Text(r#"{"type":"clear_alerts"}"#.to_string())).await.unwrap();
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["type"], "command_result");
        assert_eq!(reply["result"]["message"], "Alerts cleared");

        bus.send_alert(Alert::new(ViolationCategory::NoPerson, Utc::now(), 1));
        let alert = next_json(&mut ws).await;
        assert_eq!(alert["type"], "new_alert");
        assert_eq!(alert["alert"]["type"], "no_person");

        assert_eq!(server.get_client_count().await, 1);
        let _ = shutdown_tx.send(());
    }

    fn no_person(count: u64) -> Alert {
        Alert::new(ViolationCategory::NoPerson, Utc::now(), count)
    }

    #[tokio::test]
    async fn test_alert_feed_replays_after_lag() {
        let bus = EventBus::with_history(2, 2, None);
        bus.send_alert(no_person(1));

        let mut rx = bus.subscribe_alerts();
        let (mut feed, backlog) = AlertFeed::start(&bus);
        assert_eq!(backlog.len(), 1);

        for count in 2..=6 {
            bus.send_alert(no_person(count));
        }
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(_))));

        let replayed: Vec<_> = feed.catch_up(&bus).iter().map(|a| a.count).collect();
        assert_eq!(replayed, vec![2, 3, 4, 5, 6]);

        // still-buffered alerts were covered by the replay
        while let Ok((seq, alert)) = rx.try_recv() {
            assert!(feed.accept(seq, alert).is_none());
        }

        bus.send_alert(no_person(7));
        let (seq, alert) = rx.recv().await.unwrap();
        assert_eq!(feed.accept(seq, alert).map(|a| a.count), Some(7));
    }

    #[tokio::test]
    async fn test_new_client_gets_alert_backlog() {
        let bus = Arc::new(EventBus::default());
        bus.send_alert(no_person(1));
        bus.send_alert(no_person(2));

        let server = WebSocketServer::new(0, 4, bus.clone());
        let (commands, _requests) = mpsc::channel::<CommandRequest>(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let addr = server.start(commands, shutdown_rx).await.unwrap();
        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{}", addr.port())).await.unwrap();

        assert_eq!(next_json(&mut ws).await["status"], "connected");
        for count in 1..=2 {
            let msg = next_json(&mut ws).await;
            assert_eq!(msg["type"], "new_alert");
            assert_eq!(msg["alert"]["count"], count);
        }

        bus.send_alert(no_person(3));
        assert_eq!(next_json(&mut ws).await["alert"]["count"], 3);
        let _ = shutdown_tx.send(());
    }
}

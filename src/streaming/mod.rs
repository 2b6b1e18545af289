//! Streaming module - WebSocket viewers and alert export

mod export;
mod websocket;

pub use export::*;
pub use websocket::*;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::api::CommandRequest;
use crate::core::{AnnotatedFrame, ConnectionEvent, EventBus, Transport};
use crate::detection::Alert;

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Enable WebSocket server
    pub websocket_enabled: bool,
    pub websocket_port: u16,
    pub websocket_max_clients: usize,

    /// Alerts kept for viewers to replay; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_history: Option<usize>,

    /// Enable alert export
    pub export_enabled: bool,
    pub export_path: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            websocket_enabled: true,
            websocket_port: 5000,
            websocket_max_clients: 10,
            alert_history: None,

            export_enabled: false,
            export_path: "./alerts".to_string(),
        }
    }
}

/// Streaming manager - the monitor's transport.
///
/// Everything fans out through the event bus; alerts are also exported
/// before they are broadcast.
pub struct StreamingManager {
    config: StreamingConfig,
    bus: Arc<EventBus>,
    exporter: Option<AlertExporter>,
    websocket_server: Option<WebSocketServer>,
}

impl StreamingManager {
    pub fn new(config: StreamingConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::with_history(4, 1024, config.alert_history));

        let exporter = if config.export_enabled {
            Some(AlertExporter::new(&config.export_path)?)
        } else {
            None
        };

        let websocket_server = if config.websocket_enabled {
            Some(WebSocketServer::new(
                config.websocket_port,
                config.websocket_max_clients,
                bus.clone(),
            ))
        } else {
            None
        };

        Ok(Self {
            config,
            bus,
            exporter,
            websocket_server,
        })
    }

    /// Start the WebSocket server if enabled
    pub async fn start(
        &self,
        commands: mpsc::Sender<CommandRequest>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Option<SocketAddr>> {
        match &self.websocket_server {
            Some(ws) => Ok(Some(ws.start(commands, shutdown).await?)),
            None => Ok(None),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub async fn client_count(&self) -> usize {
        match &self.websocket_server {
            Some(ws) => ws.get_client_count().await,
            None => 0,
        }
    }
}

#[async_trait]
impl Transport for StreamingManager {
    async fn publish_frame(&self, frame: &AnnotatedFrame) -> Result<()> {
        self.bus.send_frame(frame.clone());
        Ok(())
    }

    async fn publish_alert(&self, alert: &Alert) -> Result<()> {
        // a failed export is retried by the drainer, so broadcast only after it
        if let Some(exporter) = &self.exporter {
            exporter.export_alert(alert)?;
        }
        self.bus.send_alert(alert.clone());
        Ok(())
    }

    async fn notify_connection_event(&self, event: ConnectionEvent) -> Result<()> {
        self.bus.send_event(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ViolationCategory;
    use chrono::Utc;

    #[tokio::test]
    async fn test_alert_is_exported_and_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let config = StreamingConfig {
            websocket_enabled: false,
            export_enabled: true,
            export_path: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let manager = StreamingManager::new(config).unwrap();
        let mut alerts = manager.bus().subscribe_alerts();

        let alert = Alert::new(ViolationCategory::LookingDown, Utc::now(), 1);
        manager.publish_alert(&alert).await.unwrap();

        assert_eq!(alerts.recv().await.unwrap(), (0, alert));
        assert_eq!(manager.exporter.as_ref().map(|e| e.exported_count()), Some(1));
    }

    #[tokio::test]
    async fn test_disabled_websocket_does_not_bind() {
        let config = StreamingConfig {
            websocket_enabled: false,
            ..Default::default()
        };
        let manager = StreamingManager::new(config).unwrap();
        let (commands, _requests) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        assert!(manager.start(commands, shutdown_rx).await.unwrap().is_none());
        assert_eq!(manager.client_count().await, 0);
    }
}

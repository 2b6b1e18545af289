// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Command API - operator commands dispatched against the monitor
//!
//! Payloads keep the shapes dashboards already expect:
//! `{"status": "success", "message": ...}`, `{"alerts": [...]}`, `{"stats": {...}}`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::core::{Monitor, MonitorStatus};
use crate::detection::{Alert, ViolationStats};
use crate::error::MonitorError;

/// Operator command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    StartMonitoring,
    StopMonitoring,
    GetAlerts,
    ClearAlerts,
    GetStats,
    UpdateThreshold {
        violation_type: String,
        threshold: f64,
    },
    ResetStats,
    GetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Command reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Status {
        status: ResponseStatus,
        message: String,
    },
    Alerts {
        alerts: Vec<Alert>,
    },
    Stats {
        stats: ViolationStats,
    },
    Monitor {
        monitor: MonitorStatus,
    },
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Response::Status {
            status: ResponseStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Status {
            status: ResponseStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::Status {
                status: ResponseStatus::Error,
                ..
            }
        )
    }
}

impl From<MonitorError> for Response {
    fn from(err: MonitorError) -> Self {
        let message = match err {
            MonitorError::AlreadyRunning => "Monitoring already running".to_string(),
            other => other.to_string(),
        };
        Response::error(message)
    }
}

/// Run one command
pub async fn dispatch(monitor: &Monitor, command: Command) -> Response {
    debug!("Dispatching {:?}", command);

    match command {
        Command::StartMonitoring => match monitor.start().await {
            Ok(()) => Response::success("Monitoring started"),
            Err(e) => e.into(),
        },
        Command::StopMonitoring => {
            monitor.stop().await;
            Response::success("Monitoring stopped")
        }
        Command::GetAlerts => Response::Alerts {
            alerts: monitor.get_alerts(),
        },
        Command::ClearAlerts => {
            monitor.clear_alerts();
            Response::success("Alerts cleared")
        }
        Command::GetStats => Response::Stats {
            stats: monitor.get_stats(),
        },
        Command::UpdateThreshold {
            violation_type,
            threshold,
        } => match monitor.update_threshold(&violation_type, threshold) {
            Ok(()) => Response::success(format!("Threshold updated for {}", violation_type)),
            Err(e) => e.into(),
        },
        Command::ResetStats => {
            monitor.reset_stats();
            Response::success("Statistics reset")
        }
        Command::GetStatus => Response::Monitor {
            monitor: monitor.status().await,
        },
    }
}

/// A command plus the channel its reply goes back on
#[derive(Debug)]
pub struct CommandRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

impl CommandRequest {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<Response>) {
        let (reply, rx) = oneshot::channel();
        (Self { command, reply }, rx)
    }
}

/// Serve requests until every sender is dropped
pub async fn serve(monitor: Arc<Monitor>, mut requests: mpsc::Receiver<CommandRequest>) {
    info!("Command API ready");

    while let Some(request) = requests.recv().await {
        let response = dispatch(&monitor, request.command).await;
        // requester may have gone away
        let _ = request.reply.send(response);
    }

    debug!("Command API closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::EventBus;
    use crate::detection::ViolationCategory;
    use crate::vision::{SimulatedCamera, SimulatedDetector};
    use serde_json::json;

    fn monitor() -> Arc<Monitor> {
        Arc::new(Monitor::new(
            &Config::default(),
            Arc::new(SimulatedCamera::default()),
            Arc::new(SimulatedDetector::seeded(7)),
            Arc::new(EventBus::default()),
        ))
    }

    #[test]
    fn test_command_wire_format() {
        let cmd: Command = serde_json::from_value(json!({
            "type": "update_threshold",
            "violation_type": "phone_usage",
            "threshold": 4.0
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::UpdateThreshold {
                violation_type: "phone_usage".to_string(),
                threshold: 4.0
            }
        );

        let cmd: Command = serde_json::from_str(r#"{"type":"get_stats"}"#).unwrap();
        assert_eq!(cmd, Command::GetStats);
        assert!(serde_json::from_str::<Command>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn test_response_shapes() {
        let json = serde_json::to_value(Response::success("Alerts cleared")).unwrap();
        assert_eq!(json, json!({"status": "success", "message": "Alerts cleared"}));

        let json = serde_json::to_value(Response::Alerts { alerts: vec![] }).unwrap();
        assert_eq!(json, json!({"alerts": []}));
    }

    #[tokio::test]
    async fn test_dispatch_lifecycle() {
        let monitor = monitor();

        let reply = dispatch(&monitor, Command::StartMonitoring).await;
        assert_eq!(reply, Response::success("Monitoring started"));

        let reply = dispatch(&monitor, Command::StartMonitoring).await;
        assert_eq!(reply, Response::error("Monitoring already running"));

        let reply = dispatch(&monitor, Command::StopMonitoring).await;
        assert_eq!(reply, Response::success("Monitoring stopped"));
        // stopping twice is fine
        let reply = dispatch(&monitor, Command::StopMonitoring).await;
        assert!(!reply.is_error());
    }

    #[tokio::test]
    async fn test_dispatch_threshold_errors() {
        let monitor = monitor();

        let reply = dispatch(
            &monitor,
            Command::UpdateThreshold {
                violation_type: "phone_usage".to_string(),
                threshold: -1.0,
            },
        )
        .await;
        assert!(reply.is_error());
        assert_eq!(monitor.thresholds().get(ViolationCategory::PhoneUsage), 2.0);

        let reply = dispatch(
            &monitor,
            Command::UpdateThreshold {
                violation_type: "whispering".to_string(),
                threshold: 1.0,
            },
        )
        .await;
        assert!(reply.is_error());

        let reply = dispatch(
            &monitor,
            Command::UpdateThreshold {
                violation_type: "multiple_faces".to_string(),
                threshold: 5.0,
            },
        )
        .await;
        assert_eq!(reply, Response::success("Threshold updated for multiple_faces"));
    }

    #[tokio::test]
    async fn test_serve_replies_over_channel() {
        let monitor = monitor();
        let (tx, rx) = mpsc::channel(8);
        let server = tokio::spawn(serve(monitor, rx));

        let (request, reply) = CommandRequest::new(Command::GetStats);
        tx.send(request).await.unwrap();
        match reply.await.unwrap() {
            Response::Stats { stats } => {
                assert_eq!(stats.len(), ViolationCategory::COUNT);
                assert!(stats.values().all(|s| s.count == 0 && !s.active));
            }
            other => panic!("unexpected reply {:?}", other),
        }

        drop(tx);
        server.await.unwrap();
    }
}

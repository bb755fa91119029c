//! IPC server - serves the registry over the daemon socket

use eyre::Result;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::listener::{read_message, send_response};
use super::messages::{DaemonMessage, DaemonResponse};
use crate::registry::{HomeCreation, ManagerHandle};
use crate::validation::{validate_device, validate_home, validate_new_home};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Translates socket requests into registry calls
#[derive(Clone)]
pub struct IpcServer {
    registry: ManagerHandle,
    max_message_size: usize,
    shutdown_tx: mpsc::Sender<()>,
}

impl IpcServer {
    /// `shutdown_tx` is signalled when a client sends `Shutdown`
    pub fn new(registry: ManagerHandle, max_message_size: usize, shutdown_tx: mpsc::Sender<()>) -> Self {
        Self {
            registry,
            max_message_size,
            shutdown_tx,
        }
    }

    /// Accept connections until `shutdown_rx` fires
    pub async fn run(self, listener: UnixListener, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        debug!("run: called");
        info!("IPC server accepting connections");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            debug!("run: IPC connection accepted");
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    warn!(error = %e, "run: IPC connection error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "run: IPC accept error");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    debug!("run: shutdown signal received");
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        debug!("run: complete");
        Ok(())
    }

    /// Read one request, answer it, close the connection
    pub async fn handle_connection(&self, mut stream: UnixStream) -> Result<()> {
        let response = match read_message(&mut stream, self.max_message_size).await {
            Ok(msg) => {
                debug!(?msg, "handle_connection: received message");
                self.dispatch(msg).await
            }
            Err(e) => DaemonResponse::Error {
                message: format!("{:#}", e),
            },
        };
        send_response(&mut stream, &response).await
    }

    /// Answer a single request; failures become `DaemonResponse::Error`
    pub async fn dispatch(&self, msg: DaemonMessage) -> DaemonResponse {
        match self.try_dispatch(msg).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "dispatch: request failed");
                DaemonResponse::Error { message: e.to_string() }
            }
        }
    }

    async fn try_dispatch(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        let response = match msg {
            DaemonMessage::Ping => {
                debug!("dispatch: Ping");
                DaemonResponse::Pong {
                    version: VERSION.to_string(),
                }
            }

            DaemonMessage::Shutdown => {
                debug!("dispatch: Shutdown");
                let _ = self.shutdown_tx.send(()).await;
                DaemonResponse::Ok
            }

            DaemonMessage::HomeCount => DaemonResponse::HomeCount {
                count: self.registry.home_count().await?,
            },

            DaemonMessage::ListHomes => DaemonResponse::Homes {
                homes: self.registry.home_names().await?,
            },

            DaemonMessage::CreateHome { home, devices } => {
                debug!(%home, ?devices, "dispatch: CreateHome");
                validate_new_home(&home, &devices)?;
                match self.registry.create_home(&home, devices).await? {
                    HomeCreation::Created { home, devices } => DaemonResponse::HomeCreated {
                        home,
                        devices: devices.into_iter().collect(),
                    },
                    HomeCreation::AlreadyExists => DaemonResponse::HomeAlreadyExists { home },
                }
            }

            DaemonMessage::HomeExists { home } => DaemonResponse::Exists {
                exists: self.registry.home_exists(&home).await?,
            },

            DaemonMessage::HomeTemperatures { home } => {
                let temperatures = self.registry.home_temperatures(&home).await?;
                DaemonResponse::Temperatures { home, temperatures }
            }

            DaemonMessage::RecordTemperatures { home, temperatures } => {
                debug!(%home, count = temperatures.len(), "dispatch: RecordTemperatures");
                let acked = self.registry.record_temperatures(&home, temperatures).await?;
                DaemonResponse::Recorded {
                    devices: acked.map(|devices| devices.into_iter().collect()),
                }
            }

            DaemonMessage::TrackDevice { home, device } => {
                debug!(%home, %device, "dispatch: TrackDevice");
                validate_home(&home)?;
                validate_device(&device)?;
                DaemonResponse::DeviceRegistered {
                    device: self.registry.track_device(&home, &device).await?,
                }
            }

            DaemonMessage::GetHeating { home } => DaemonResponse::Heating(self.registry.heating(&home).await?),

            DaemonMessage::SetHeating { home, block } => {
                debug!(%home, block, "dispatch: SetHeating");
                DaemonResponse::Heating(self.registry.set_heating_block(&home, block).await?)
            }

            DaemonMessage::AlterHeating => {
                let homes = self.registry.alter_heating().await?;
                debug!(homes, "dispatch: AlterHeating broadcast");
                DaemonResponse::Ok
            }

            DaemonMessage::ReevaluateHome { home } => match self.registry.reevaluate_home_heating(&home).await? {
                Some(status) => DaemonResponse::Heating(status),
                None => DaemonResponse::Error {
                    message: format!("Unknown home: {}", home),
                },
            },

            DaemonMessage::ListDevices => DaemonResponse::Devices {
                homes: self.registry.list_devices().await?,
            },

            DaemonMessage::RemoveDevice { home, device } => {
                self.registry.remove_device(&home, &device).await?;
                DaemonResponse::Ok
            }

            DaemonMessage::RemoveHome { home } => {
                self.registry.remove_home(&home).await?;
                DaemonResponse::Ok
            }

            DaemonMessage::GatherStats => DaemonResponse::Stats(self.registry.gather_stats().await?),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::registry::DeviceManager;

    fn server() -> (IpcServer, mpsc::Receiver<()>) {
        let registry = DeviceManager::spawn(RegistryConfig {
            gather_timeout_ms: 300,
            ..RegistryConfig::default()
        });
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (IpcServer::new(registry, 4096, shutdown_tx), shutdown_rx)
    }

    #[tokio::test]
    async fn test_ping() {
        let (server, _rx) = server();
        let response = server.dispatch(DaemonMessage::Ping).await;
        assert!(matches!(response, DaemonResponse::Pong { .. }));
    }

    #[tokio::test]
    async fn test_create_home_rejects_invalid_names() {
        let (server, _rx) = server();

        let response = server
            .dispatch(DaemonMessage::CreateHome {
                home: "x".to_string(),
                devices: vec!["$bad".to_string()],
            })
            .await;
        assert!(matches!(response, DaemonResponse::Error { .. }));

        let count = server.dispatch(DaemonMessage::HomeCount).await;
        assert_eq!(count, DaemonResponse::HomeCount { count: 0 });
    }

    #[tokio::test]
    async fn test_create_record_and_read() {
        let (server, _rx) = server();

        let created = server
            .dispatch(DaemonMessage::CreateHome {
                home: "kitchen".to_string(),
                devices: vec!["d1".to_string(), "d2".to_string()],
            })
            .await;
        assert_eq!(
            created,
            DaemonResponse::HomeCreated {
                home: "kitchen".to_string(),
                devices: vec!["d1".to_string(), "d2".to_string()],
            }
        );

        let again = server
            .dispatch(DaemonMessage::CreateHome {
                home: "kitchen".to_string(),
                devices: vec!["dev3".to_string()],
            })
            .await;
        assert_eq!(
            again,
            DaemonResponse::HomeAlreadyExists {
                home: "kitchen".to_string()
            }
        );

        let recorded = server
            .dispatch(DaemonMessage::RecordTemperatures {
                home: "kitchen".to_string(),
                temperatures: HashMap::from([("d1".to_string(), 21.0)]),
            })
            .await;
        assert_eq!(
            recorded,
            DaemonResponse::Recorded {
                devices: Some(vec!["d1".to_string()])
            }
        );

        match server
            .dispatch(DaemonMessage::HomeTemperatures {
                home: "kitchen".to_string(),
            })
            .await
        {
            DaemonResponse::Temperatures { temperatures, .. } => {
                let temperatures = temperatures.unwrap();
                assert_eq!(temperatures.get("d1"), Some(&Some(21.0)));
                assert_eq!(temperatures.get("d2"), Some(&Some(25.0)));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_home_answers() {
        let (server, _rx) = server();

        let temps = server
            .dispatch(DaemonMessage::HomeTemperatures {
                home: "nowhere".to_string(),
            })
            .await;
        assert_eq!(
            temps,
            DaemonResponse::Temperatures {
                home: "nowhere".to_string(),
                temperatures: None
            }
        );

        let set = server
            .dispatch(DaemonMessage::SetHeating {
                home: "nowhere".to_string(),
                block: true,
            })
            .await;
        assert!(matches!(set, DaemonResponse::Error { .. }));

        let removed = server
            .dispatch(DaemonMessage::RemoveHome {
                home: "nowhere".to_string(),
            })
            .await;
        assert!(matches!(removed, DaemonResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_signals_server() {
        let (server, mut rx) = server();
        let response = server.dispatch(DaemonMessage::Shutdown).await;
        assert_eq!(response, DaemonResponse::Ok);
        assert!(rx.recv().await.is_some());
    }
}

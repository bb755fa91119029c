//! DeviceManager actor - root of the registry

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::group::DeviceGroup;
use super::handle::ManagerHandle;
use super::messages::{GroupCommand, HomeCreation, ManagerCommand};
use crate::config::RegistryConfig;
use crate::gather::policies::{ListDevices, RegisterDevices};
use crate::gather::{Gather, GatherStats};
use crate::heating::{HeatingSetting, HeatingStatus};
use crate::lifecycle::{ActorId, Addr, ChildIndex, mailbox};

/// Owns every home of the process
pub struct DeviceManager {
    config: RegistryConfig,
    groups: ChildIndex<GroupCommand>,
    stats: Arc<GatherStats>,
    terminated_tx: mpsc::UnboundedSender<ActorId>,
}

impl DeviceManager {
    /// Spawn the manager actor and return a handle to it
    pub fn spawn(config: RegistryConfig) -> ManagerHandle {
        debug!(?config, "DeviceManager::spawn: called");
        let (addr, rx) = mailbox(config.channel_buffer);
        let (terminated_tx, terminated_rx) = mpsc::unbounded_channel();
        let ask_timeout = config.ask_timeout();
        let manager = Self {
            config,
            groups: ChildIndex::new(),
            stats: Arc::new(GatherStats::new()),
            terminated_tx,
        };
        tokio::spawn(manager.run(rx, terminated_rx));
        info!("DeviceManager spawned");
        ManagerHandle::new(addr, ask_timeout)
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<ManagerCommand>,
        mut terminated_rx: mpsc::UnboundedReceiver<ActorId>,
    ) {
        info!("DeviceManager started");

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(ManagerCommand::Shutdown) | None => {
                        info!("DeviceManager shutting down");
                        break;
                    }
                    Some(cmd) => self.handle(cmd).await,
                },
                Some(actor) = terminated_rx.recv() => self.on_group_terminated(actor),
            }
        }

        for (home, addr) in self.groups.drain() {
            debug!(%home, "DeviceManager: stopping group");
            let _ = addr.tell(GroupCommand::Stop).await;
        }
        info!("DeviceManager stopped");
    }

    async fn handle(&mut self, cmd: ManagerCommand) {
        match cmd {
            ManagerCommand::TrackDevice { home, device, reply_to } => {
                debug!(%home, %device, "DeviceManager: TrackDevice command");
                let group = self.ensure_group(&home);
                if let Err(e) = group.tell(GroupCommand::TrackDevice { home, device, reply_to }).await {
                    warn!("Failed to forward TrackDevice: {}", e);
                }
            }

            ManagerCommand::CreateHome { home, devices, reply_to } => {
                debug!(%home, ?devices, "DeviceManager: CreateHome command");
                if self.groups.get_live(&home).is_some() {
                    info!("Home {} already exists", home);
                    reply_to.send(HomeCreation::AlreadyExists);
                    return;
                }
                let group = self.ensure_group(&home);
                let created = home.clone();
                let requester = reply_to.map(move |devices| HomeCreation::Created { home: created, devices });
                Gather::new(
                    RegisterDevices::new(&home),
                    requester,
                    self.config.gather_timeout(),
                    self.stats.clone(),
                )
                .targets(devices.into_iter().map(|device| (device, group.clone())))
                .spawn();
            }

            ManagerCommand::HomeCount { reply_to } => {
                debug!("DeviceManager: HomeCount command");
                reply_to.send(self.groups.len());
            }

            ManagerCommand::HomeNames { reply_to } => {
                debug!("DeviceManager: HomeNames command");
                reply_to.send(self.groups.ids());
            }

            ManagerCommand::HomeExists { home, reply_to } => {
                debug!(%home, "DeviceManager: HomeExists command");
                reply_to.send(self.groups.get_live(&home).is_some());
            }

            ManagerCommand::HomeTemperatures { home, reply_to } => {
                debug!(%home, "DeviceManager: HomeTemperatures command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group
                            .tell(GroupCommand::ReadTemperatures {
                                reply_to: reply_to.map(Some),
                            })
                            .await;
                    }
                    None => reply_to.send(None),
                }
            }

            ManagerCommand::RecordTemperatures {
                home,
                temperatures,
                reply_to,
            } => {
                debug!(%home, count = temperatures.len(), "DeviceManager: RecordTemperatures command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group
                            .tell(GroupCommand::RecordTemperatures {
                                temperatures,
                                reply_to: reply_to.map(Some),
                            })
                            .await;
                    }
                    None => reply_to.send(None),
                }
            }

            ManagerCommand::DeviceIds { home, reply_to } => {
                debug!(%home, "DeviceManager: DeviceIds command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group
                            .tell(GroupCommand::DeviceIds {
                                reply_to: reply_to.map(Some),
                            })
                            .await;
                    }
                    None => reply_to.send(None),
                }
            }

            ManagerCommand::GetHeating { home, reply_to } => {
                debug!(%home, "DeviceManager: GetHeating command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group.tell(GroupCommand::GetHeating { reply_to }).await;
                    }
                    None => reply_to.send(HeatingStatus::new(HeatingSetting::Off, true)),
                }
            }

            ManagerCommand::SetHeatingBlock { home, block, reply_to } => {
                debug!(%home, block, "DeviceManager: SetHeatingBlock command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group
                            .tell(GroupCommand::SetHeatingBlock {
                                block,
                                reply_to: reply_to.map(Some),
                            })
                            .await;
                    }
                    None => reply_to.send(None),
                }
            }

            ManagerCommand::AlterHeating { reply_to } => {
                debug!(homes = self.groups.len(), "DeviceManager: AlterHeating command");
                let mut notified = 0;
                for (home, group) in self.groups.snapshot() {
                    match group.tell(GroupCommand::AlterHeating { reply_to: None }).await {
                        Ok(()) => notified += 1,
                        Err(e) => debug!(%home, "AlterHeating not delivered: {}", e),
                    }
                }
                reply_to.send(notified);
            }

            ManagerCommand::ReevaluateHome { home, reply_to } => {
                debug!(%home, "DeviceManager: ReevaluateHome command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group
                            .tell(GroupCommand::AlterHeating {
                                reply_to: Some(reply_to.map(Some)),
                            })
                            .await;
                    }
                    None => reply_to.send(None),
                }
            }

            ManagerCommand::ListDevices { reply_to } => {
                debug!(homes = self.groups.len(), "DeviceManager: ListDevices command");
                Gather::new(ListDevices, reply_to, self.config.gather_timeout(), self.stats.clone())
                    .targets(self.groups.snapshot())
                    .spawn();
            }

            ManagerCommand::RemoveDevice { home, device, reply_to } => {
                debug!(%home, %device, "DeviceManager: RemoveDevice command");
                match self.groups.get_live(&home) {
                    Some(group) => {
                        let _ = group.tell(GroupCommand::StopDevice { device, reply_to }).await;
                    }
                    None => reply_to.send(false),
                }
            }

            ManagerCommand::RemoveHome { home, reply_to } => {
                debug!(%home, "DeviceManager: RemoveHome command");
                match self.groups.remove(&home) {
                    Some(group) => {
                        info!("Stopping home {}", home);
                        let stopped = group.tell(GroupCommand::Stop).await.is_ok();
                        reply_to.send(stopped);
                    }
                    None => reply_to.send(false),
                }
            }

            ManagerCommand::GatherStats { reply_to } => {
                debug!("DeviceManager: GatherStats command");
                reply_to.send(self.stats.snapshot());
            }

            ManagerCommand::Shutdown => {}
        }
    }

    /// Live group for `home`, created on first reference
    fn ensure_group(&mut self, home: &str) -> Addr<GroupCommand> {
        if let Some(group) = self.groups.get_live(home) {
            return group.clone();
        }
        info!("Creating home actor for {}", home);
        let group = DeviceGroup::spawn(home, self.config.clone(), self.stats.clone());
        self.groups.insert(home.to_string(), group.clone(), &self.terminated_tx);
        group
    }

    fn on_group_terminated(&mut self, actor: ActorId) {
        if let Some(home) = self.groups.remove_terminated(actor) {
            info!("Home actor for {} has been terminated", home);
        }
    }
}

//! Background polling
//!
//! Refetches the todo list on a fixed interval. Polling pauses while the
//! connectivity monitor reports offline and resumes with an immediate
//! refetch on the online transition. Results reach subscribers through
//! the [`QueryClient`] state channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::QueryClient;

/// Commands sent to the poller task
#[derive(Debug)]
pub enum PollerCommand {
    /// Refetch now without waiting for the timer
    PollNow,
    /// Stop the task
    Shutdown,
}

/// Handle for controlling the poller task
pub struct PollerHandle {
    pub command_tx: mpsc::Sender<PollerCommand>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Ask for an immediate refetch
    pub async fn poll_now(&self) {
        let _ = self.command_tx.send(PollerCommand::PollNow).await;
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(PollerCommand::Shutdown).await;
        let _ = self.join.await;
    }
}

/// Spawn the poller
///
/// Refetches every `interval` while `online` holds `true`.
pub fn spawn_poller(
    client: QueryClient,
    online: watch::Receiver<bool>,
    interval: Duration,
) -> PollerHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let join = tokio::spawn(poller_task(client, online, interval, command_rx));
    PollerHandle { command_tx, join }
}

async fn poller_task(
    client: QueryClient,
    mut online_rx: watch::Receiver<bool>,
    interval: Duration,
    mut command_rx: mpsc::Receiver<PollerCommand>,
) {
    let mut online = *online_rx.borrow_and_update();
    let mut watching = true;
    info!("Poller started (every {:?}, online: {})", interval, online);

    loop {
        tokio::select! {
            biased;

            cmd = command_rx.recv() => match cmd {
                Some(PollerCommand::PollNow) => {
                    if online {
                        poll(&client).await;
                    }
                }
                Some(PollerCommand::Shutdown) | None => break,
            },

            changed = online_rx.changed(), if watching => {
                if changed.is_err() {
                    // Monitor dropped; keep the last known state
                    watching = false;
                    continue;
                }
                let now_online = *online_rx.borrow_and_update();
                if now_online && !online {
                    debug!("Back online, resuming polling");
                    online = true;
                    poll(&client).await;
                } else if !now_online && online {
                    debug!("Offline, pausing polling");
                    online = false;
                }
            }

            _ = tokio::time::sleep(interval), if online => {
                poll(&client).await;
            }
        }
    }

    info!("Poller stopped");
}

async fn poll(client: &QueryClient) {
    // Failures are already logged and published by the client
    let _ = client.refetch().await;
}

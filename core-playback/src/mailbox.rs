//! The controller's single inbound queue.
//!
//! Host calls, engine callbacks, position ticks and remote-control presses
//! all become [`Message`]s on one bounded channel drained by the controller
//! task. Producers created here (engine observers, tickers, the remote
//! command handler) hold weak senders, so the queue closes once every
//! [`ControllerHandle`](crate::ControllerHandle) is gone.

use crate::command::{CallResult, MethodCall};
use crate::types::{ControllerSnapshot, SessionId};
use bridge_traits::{
    EngineNotification, EngineObserver, EngineStatus, RemoteCommand, RemoteCommandHandler,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Reply channel of a call.
pub(crate) type ReplySender = oneshot::Sender<CallResult>;

pub(crate) enum Message {
    Call {
        call: MethodCall,
        reply: ReplySender,
    },
    Engine {
        session: SessionId,
        generation: u64,
        notification: EngineNotification,
    },
    Tick {
        session: SessionId,
        generation: u64,
    },
    Remote(RemoteCommand),
    Inspect {
        reply: oneshot::Sender<ControllerSnapshot>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Factory for the controller's internal producers.
pub(crate) struct Mailbox {
    sender: mpsc::WeakSender<Message>,
    generations: AtomicU64,
}

impl Mailbox {
    pub fn new(sender: &mpsc::Sender<Message>) -> Self {
        Self {
            sender: sender.downgrade(),
            generations: AtomicU64::new(0),
        }
    }

    /// Fresh generation for a newly opened engine instance.
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Observer that posts engine notifications for `session`.
    ///
    /// Runs on whatever thread the engine calls back on. A full mailbox drops
    /// progress notifications; end-of-stream and failure wait for capacity
    /// (on a spawned task inside a runtime, blocking the caller outside one).
    pub fn engine_observer(&self, session: SessionId, generation: u64) -> EngineObserver {
        let sender = self.sender.clone();
        Arc::new(move |notification| {
            let Some(sender) = sender.upgrade() else {
                return;
            };
            let message = Message::Engine {
                session: session.clone(),
                generation,
                notification,
            };
            match sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) if is_terminal(&message) => {
                    debug!(player_id = %session, generation, "Mailbox full, waiting to deliver engine callback");
                    match Handle::try_current() {
                        Ok(runtime) => {
                            runtime.spawn(async move {
                                sender.send(message).await.ok();
                            });
                        }
                        Err(_) => {
                            sender.blocking_send(message).ok();
                        }
                    }
                }
                Err(TrySendError::Full(_)) => {
                    warn!(player_id = %session, generation, "Mailbox full, dropping engine callback");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(player_id = %session, "Controller gone, dropping engine callback");
                }
            }
        })
    }

    /// Spawn the position ticker of one playing engine instance.
    pub fn spawn_ticker(
        &self,
        session: SessionId,
        generation: u64,
        interval: Duration,
    ) -> JoinHandle<()> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(sender) = sender.upgrade() else {
                    break;
                };
                let tick = Message::Tick {
                    session: session.clone(),
                    generation,
                };
                if sender.send(tick).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Handler installed on the remote-control surface.
    pub fn remote_handler(&self) -> RemoteCommandHandler {
        let sender = self.sender.clone();
        Arc::new(move |command| {
            let Some(sender) = sender.upgrade() else {
                return;
            };
            if let Err(err) = sender.try_send(Message::Remote(command)) {
                warn!(?command, error = %err, "Dropping remote command");
            }
        })
    }
}

/// Notifications a session cannot recover from if lost.
fn is_terminal(message: &Message) -> bool {
    matches!(
        message,
        Message::Engine {
            notification: EngineNotification::PlaybackEnded
                | EngineNotification::StatusChanged(EngineStatus::Failed(_)),
            ..
        }
    )
}

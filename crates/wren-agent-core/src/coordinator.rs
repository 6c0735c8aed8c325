//! Per-session turn scheduling.
//!
//! Turns for the same (channel type, chat id) must run to completion in
//! arrival order because the session document has no optimistic-concurrency
//! check. The coordinator gives every session key its own worker task with
//! a bounded queue; different keys process in parallel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wren_channel::ChannelMessage;
use wren_session::session_id;

use crate::agent_loop::AgentLoop;
use crate::stop::StopSignal;

const MAX_QUEUED_MESSAGES_PER_SESSION: usize = 100;

struct SessionWorker {
    sender: mpsc::Sender<ChannelMessage>,
    stop: StopSignal,
    handle: JoinHandle<()>,
}

/// Dispatches inbound messages onto per-session worker tasks.
pub struct SessionRunCoordinator {
    agent_loop: Arc<AgentLoop>,
    workers: Mutex<HashMap<String, SessionWorker>>,
    shut_down: AtomicBool,
}

impl SessionRunCoordinator {
    pub fn new(agent_loop: Arc<AgentLoop>) -> Self {
        Self {
            agent_loop,
            workers: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Enqueues an inbound message for its session's worker, spawning the
    /// worker on first contact. Messages arriving while a turn is running
    /// are queued (bounded) and processed afterwards in arrival order.
    pub fn dispatch(&self, message: ChannelMessage) {
        if self.shut_down.load(Ordering::SeqCst) {
            warn!("coordinator is shut down, dropping inbound message");
            return;
        }

        let key = session_id(&message.channel_type, &message.chat_id);
        let Ok(mut workers) = self.workers.lock() else {
            warn!("coordinator worker table poisoned, dropping inbound message");
            return;
        };

        let worker = workers
            .entry(key.clone())
            .or_insert_with(|| self.spawn_worker(&key));

        match worker.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    session = %key,
                    capacity = MAX_QUEUED_MESSAGES_PER_SESSION,
                    "session queue full, dropping inbound message"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(session = %key, "session worker gone, dropping inbound message");
            }
        }
    }

    /// Requests cooperative termination of the in-flight turn for the given
    /// session. Queued messages are not discarded.
    pub fn request_stop(&self, channel_type: &str, chat_id: &str) {
        let key = session_id(channel_type, chat_id);
        let Ok(workers) = self.workers.lock() else {
            return;
        };
        match workers.get(&key) {
            Some(worker) => {
                worker.stop.request();
                info!(session = %key, "stop requested for in-flight turn");
            }
            None => {
                info!(session = %key, "stop requested while idle, nothing to do");
            }
        }
    }

    /// Releases all worker tasks. Idempotent, never panics, and callable
    /// before any turn was processed.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained: Vec<SessionWorker> = match self.workers.lock() {
            Ok(mut workers) => workers.drain().map(|(_, worker)| worker).collect(),
            Err(_) => return,
        };

        for worker in drained {
            worker.handle.abort();
        }
        debug!("coordinator shut down");
    }

    fn spawn_worker(&self, key: &str) -> SessionWorker {
        let (sender, mut receiver) = mpsc::channel(MAX_QUEUED_MESSAGES_PER_SESSION);
        let stop = StopSignal::new();
        let worker_stop = stop.clone();
        let agent_loop = Arc::clone(&self.agent_loop);
        let worker_key = key.to_string();

        let handle = tokio::spawn(async move {
            debug!(session = %worker_key, "session worker started");
            while let Some(message) = receiver.recv().await {
                // A stop request targets the turn in flight when it
                // arrives; re-arm before each new turn.
                worker_stop.clear();
                agent_loop
                    .process_message_with_stop(&message, &worker_stop)
                    .await;
            }
            debug!(session = %worker_key, "session worker finished");
        });

        SessionWorker {
            sender,
            stop,
            handle,
        }
    }

    #[cfg(test)]
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.lock().map(|workers| workers.len()).unwrap_or(0)
    }
}

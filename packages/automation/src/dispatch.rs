//! The public entry point for firing automation events.
//!
//! `dispatch` hands an event to a bounded in-process queue and returns
//! immediately; a distributor task fans queued events out to worker tasks
//! capped by a semaphore. Nothing that happens downstream — store errors,
//! flow failures, a full queue — ever reaches the dispatching caller.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::{FlowEngine, ProcessSummary};
use crate::events::AutomationEvent;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Events queued before `dispatch` starts dropping.
    pub queue_capacity: usize,
    /// Events processed concurrently.
    pub max_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_concurrency: 16,
        }
    }
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            max_concurrency: config.max_concurrency,
        }
    }
}

pub struct Dispatcher {
    engine: Arc<FlowEngine>,
    tx: mpsc::Sender<AutomationEvent>,
    shutdown: CancellationToken,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    distributor: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the distributor task and return the dispatcher handle.
    pub fn spawn(engine: Arc<FlowEngine>, config: DispatcherConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<AutomationEvent>(config.queue_capacity);
        let shutdown = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));

        let distributor = tokio::spawn({
            let engine = engine.clone();
            let token = shutdown.clone();
            let semaphore = semaphore.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        maybe_event = rx.recv() => {
                            let Some(event) = maybe_event else { break };
                            let permit = match semaphore.clone().acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => break,
                            };
                            let engine = engine.clone();
                            tokio::spawn(async move {
                                let summary = engine.process_event(&event).await;
                                info!(
                                    event = %event.event_type,
                                    matched = summary.flows_matched,
                                    executed = summary.flows_executed,
                                    "automation event processed"
                                );
                                for error in &summary.errors {
                                    warn!(%error, "automation flow error");
                                }
                                drop(permit);
                            });
                        }
                    }
                }
            }
        });

        Self {
            engine,
            tx,
            shutdown,
            semaphore,
            max_concurrency: config.max_concurrency,
            distributor: Mutex::new(Some(distributor)),
        }
    }

    /// Fire-and-forget. Never blocks, never panics, never returns an error:
    /// the caller's own request must not be delayed or failed by automation.
    pub fn dispatch(&self, event: AutomationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                error!(event = %event.event_type, "automation queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                error!(event = %event.event_type, "automation dispatcher stopped, event dropped");
            }
        }
    }

    /// Synchronous variant for tests and API callers that need the result.
    pub async fn dispatch_and_wait(&self, event: &AutomationEvent) -> ProcessSummary {
        self.engine.process_event(event).await
    }

    /// Stop accepting queued work and wait for in-flight events to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.distributor.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        // All permits back means no event task is still running.
        let _ = self
            .semaphore
            .acquire_many(self.max_concurrency as u32)
            .await;
    }
}

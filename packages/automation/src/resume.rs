//! Scheduled-continuation sweeper.
//!
//! Long delay blocks defer execution by writing a `scheduled` log row; this
//! periodic task claims rows whose `execute_at` has passed and re-enters the
//! flow at the recorded block index. Claiming stamps `resumed_at` in the
//! same statement, so a continuation is resumed exactly once even with
//! multiple processes sweeping.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::FlowEngine;
use crate::models::{FlowStatus, LogStatus, ScheduledContinuation};
use crate::store::AutomationStore;

#[derive(Debug, Clone)]
pub struct ResumeConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub batch: i64,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            batch: 50,
        }
    }
}

impl ResumeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.resume_enabled,
            interval: Duration::from_secs(config.resume_interval_secs),
            batch: config.resume_batch,
        }
    }
}

pub struct ContinuationSweeper {
    engine: Arc<FlowEngine>,
    store: Arc<dyn AutomationStore>,
    config: ResumeConfig,
    shutdown: CancellationToken,
}

impl ContinuationSweeper {
    pub fn new(
        engine: Arc<FlowEngine>,
        store: Arc<dyn AutomationStore>,
        config: ResumeConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for stopping the sweep loop from outside.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the periodic sweep until cancelled.
    pub async fn run(self) {
        if !self.config.enabled {
            info!("continuation sweeper disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(0) => {}
                        Ok(resumed) => info!(resumed, "resumed scheduled continuations"),
                        Err(err) => {
                            error!(error = %format!("{err:#}"), "continuation sweep failed");
                        }
                    }
                }
            }
        }
    }

    /// Claim and resume everything due at `now`. Returns how many
    /// continuations re-entered their flow.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self
            .store
            .claim_due_continuations(now, self.config.batch)
            .await?;

        let mut resumed = 0;
        for log in due {
            let continuation: ScheduledContinuation =
                match serde_json::from_value(log.trigger_data.clone()) {
                    Ok(continuation) => continuation,
                    Err(err) => {
                        warn!(log_id = %log.id, %err, "scheduled log has invalid continuation");
                        continue;
                    }
                };

            let flow = match self.store.find_flow(log.flow_id).await {
                Ok(Some(flow)) => flow,
                Ok(None) => {
                    warn!(flow_id = %log.flow_id, "flow deleted since scheduling, continuation dropped");
                    continue;
                }
                Err(err) => {
                    warn!(flow_id = %log.flow_id, error = %format!("{err:#}"), "failed to load flow for continuation");
                    continue;
                }
            };

            if flow.status != FlowStatus::Active {
                warn!(flow_id = %flow.id, "flow no longer active, continuation dropped");
                continue;
            }

            match self
                .engine
                .execute_flow_from(&flow, &continuation.event, continuation.resume_block_index)
                .await
            {
                Ok(run) if run.status == LogStatus::Failed => {
                    warn!(
                        flow_id = %flow.id,
                        error = run.error.as_deref().unwrap_or("unknown"),
                        "resumed flow run failed"
                    );
                }
                Ok(_) => resumed += 1,
                Err(err) => {
                    warn!(flow_id = %flow.id, error = %format!("{err:#}"), "resumed flow run failed");
                }
            }
        }

        Ok(resumed)
    }
}

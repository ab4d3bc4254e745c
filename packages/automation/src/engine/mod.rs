//! The flow engine: turns one event into zero-or-more completed (or
//! partially completed) flow runs.

mod condition;
mod context;

pub use context::ExecutionContext;

use anyhow::{anyhow, Context as _, Result};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::actions::Actions;
use crate::config::Config;
use crate::events::AutomationEvent;
use crate::models::{
    AutomationFlow, BlockKind, DelayConfig, FlowBlock, LogStatus, NewAutomationLog,
    ScheduledContinuation,
};
use crate::store::AutomationStore;

/// Delays at or above this are deferred to a `scheduled` log instead of an
/// in-process wait.
const DEFER_THRESHOLD_MINUTES: i64 = 5;

/// Aggregate outcome of one `process_event` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    pub flows_matched: usize,
    pub flows_executed: usize,
    pub errors: Vec<String>,
}

/// Outcome of one completed flow run (after its log row is written).
#[derive(Debug, Clone)]
pub struct FlowRun {
    pub status: LogStatus,
    pub error: Option<String>,
}

/// How a single block leaves the pipeline: keep going, or stop without an
/// error (condition not met, delay deferred). Errors travel as `Err`.
enum BlockOutcome {
    Continue,
    Halt,
}

pub struct FlowEngine {
    store: Arc<dyn AutomationStore>,
    actions: Actions,
}

impl FlowEngine {
    pub fn new(store: Arc<dyn AutomationStore>, config: &Config) -> Self {
        Self {
            actions: Actions::new(store.clone(), config),
            store,
        }
    }

    /// Evaluate every matching active flow for `event`, strictly
    /// sequentially. Failures are isolated per flow; this never returns an
    /// error.
    pub async fn process_event(&self, event: &AutomationEvent) -> ProcessSummary {
        let flows = match self.store.list_active_flows(event.organization_id).await {
            Ok(flows) => flows,
            Err(err) => {
                warn!(
                    organization_id = %event.organization_id,
                    error = %format!("{err:#}"),
                    "failed to load automation flows"
                );
                return ProcessSummary {
                    errors: vec![format!("failed to load flows: {err:#}")],
                    ..Default::default()
                };
            }
        };

        let matching: Vec<AutomationFlow> = flows
            .into_iter()
            .filter(|flow| flow.matches(event))
            .collect();

        let mut summary = ProcessSummary {
            flows_matched: matching.len(),
            ..Default::default()
        };

        for flow in &matching {
            match self.execute_flow(flow, event).await {
                Ok(run) => match run.status {
                    LogStatus::Failed => {
                        let message = run.error.unwrap_or_else(|| "unknown error".to_string());
                        summary
                            .errors
                            .push(format!("flow `{}`: {}", flow.name, message));
                    }
                    _ => summary.flows_executed += 1,
                },
                // Even the bookkeeping failed; still isolated to this flow.
                Err(err) => {
                    warn!(flow_id = %flow.id, error = %format!("{err:#}"), "flow execution failed");
                    summary
                        .errors
                        .push(format!("flow `{}`: {err:#}", flow.name));
                }
            }
        }

        summary
    }

    /// Run a flow's pipeline from the top. The first block is the stored
    /// trigger and is never executed.
    pub async fn execute_flow(
        &self,
        flow: &AutomationFlow,
        event: &AutomationEvent,
    ) -> Result<FlowRun> {
        self.execute_flow_from(flow, event, 1).await
    }

    /// Run a flow's pipeline starting at `start_index` (resume path for
    /// deferred delays). Writes exactly one `success`/`failed` log row and
    /// always records the run on the flow's counters.
    pub async fn execute_flow_from(
        &self,
        flow: &AutomationFlow,
        event: &AutomationEvent,
        start_index: usize,
    ) -> Result<FlowRun> {
        let mut ctx = ExecutionContext::new(flow.clone(), event.clone());
        if start_index <= 1 {
            ctx.log(format!(
                "Flow `{}` triggered by {}",
                flow.name, event.event_type
            ));
        } else {
            ctx.log(format!(
                "Flow `{}` resumed at block {}",
                flow.name, start_index
            ));
        }

        let mut error: Option<String> = None;
        for (index, block) in flow.blocks.iter().enumerate().skip(start_index) {
            match self.run_block(block, index, &mut ctx).await {
                Ok(BlockOutcome::Continue) => {}
                Ok(BlockOutcome::Halt) => break,
                Err(err) => {
                    error = Some(format!("{err:#}"));
                    break;
                }
            }
        }

        let status = if error.is_some() {
            LogStatus::Failed
        } else {
            LogStatus::Success
        };
        let completed_at = Utc::now();
        let trace = serde_json::to_value(ctx.trace(completed_at))
            .context("serialize run trace")?;

        self.store
            .insert_log(NewAutomationLog {
                flow_id: flow.id,
                organization_id: flow.organization_id,
                status,
                trigger_data: event.summary(),
                result: Some(trace),
                error: error.clone(),
                started_at: ctx.started_at,
                completed_at,
            })
            .await
            .context("persist automation log")?;

        // Run counters move for every attempt, success or failure.
        self.store
            .record_flow_run(flow.id)
            .await
            .context("record flow run")?;

        Ok(FlowRun { status, error })
    }

    async fn run_block(
        &self,
        block: &FlowBlock,
        index: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<BlockOutcome> {
        match &block.kind {
            BlockKind::Trigger => Ok(BlockOutcome::Continue),
            BlockKind::Delay(config) => self.run_delay(config, index, ctx).await,
            BlockKind::Condition(config) => {
                let passed = condition::evaluate(config, &ctx.variables);
                ctx.log(format!(
                    "Condition `{}` {} -> {}",
                    config.field,
                    config.operator.as_str(),
                    if passed { "PASS" } else { "FAIL" }
                ));
                Ok(if passed {
                    BlockOutcome::Continue
                } else {
                    BlockOutcome::Halt
                })
            }
            BlockKind::Action(config) => {
                let result = self.actions.execute(config, ctx).await;
                if result.success {
                    if let Some(output) = result.output {
                        ctx.merge_output(output);
                    }
                    ctx.log(format!("Action `{}` completed", config.name()));
                    Ok(BlockOutcome::Continue)
                } else {
                    let message = result
                        .error
                        .unwrap_or_else(|| format!("action `{}` failed", config.name()));
                    ctx.log(format!("Action `{}` failed: {message}", config.name()));
                    Err(anyhow!(message))
                }
            }
        }
    }

    async fn run_delay(
        &self,
        config: &DelayConfig,
        index: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<BlockOutcome> {
        let total_minutes = config.total_minutes();
        if total_minutes <= 0 {
            ctx.log("Delay of 0 minutes, skipping");
            return Ok(BlockOutcome::Continue);
        }

        if total_minutes < DEFER_THRESHOLD_MINUTES {
            // Short waits block this flow's task only, not the dispatcher.
            ctx.log(format!("Waiting {total_minutes} minute(s) in process"));
            tokio::time::sleep(Duration::from_secs((total_minutes * 60) as u64)).await;
            return Ok(BlockOutcome::Continue);
        }

        let execute_at = Utc::now() + ChronoDuration::minutes(total_minutes);
        let continuation = ScheduledContinuation {
            event: ctx.event.clone(),
            resume_block_index: index + 1,
            execute_at,
        };
        self.store
            .insert_log(NewAutomationLog {
                flow_id: ctx.flow.id,
                organization_id: ctx.flow.organization_id,
                status: LogStatus::Scheduled,
                trigger_data: serde_json::to_value(&continuation)
                    .context("serialize scheduled continuation")?,
                result: None,
                error: None,
                started_at: ctx.started_at,
                completed_at: Utc::now(),
            })
            .await
            .context("persist scheduled log")?;

        info!(
            flow_id = %ctx.flow.id,
            %execute_at,
            "delay of {total_minutes} minute(s) deferred"
        );
        ctx.log(format!(
            "Delay of {total_minutes} minute(s) deferred until {execute_at}"
        ));
        Ok(BlockOutcome::Halt)
    }
}

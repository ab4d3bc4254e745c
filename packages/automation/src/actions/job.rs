//! Job mutation executors: `update_job_status`, `assign_job`, `create_task`.

use serde_json::json;
use uuid::Uuid;

use crate::engine::ExecutionContext;
use crate::models::{NewJobActivity, NewJobSubtask};
use crate::store::AutomationStore;
use crate::template;

use super::{event_job_id, ActionResult};

pub(crate) async fn update_job_status(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    job_id: Option<Uuid>,
    status: Option<&str>,
) -> ActionResult {
    let Some(job_id) = job_id.or_else(|| event_job_id(ctx)) else {
        return ActionResult::fail("update_job_status requires a job id");
    };
    let Some(status) = status else {
        return ActionResult::fail("update_job_status requires a status");
    };
    let status = template::render(status, &ctx.variables);

    if let Err(err) = store.update_job_status(job_id, &status).await {
        return ActionResult::fail(format!("failed to update job status: {err:#}"));
    }
    if let Err(err) = store
        .insert_job_activity(NewJobActivity {
            job_id,
            kind: "status_change".to_string(),
            note: format!("Status set to `{}` by automation `{}`", status, ctx.flow.name),
            actor_id: ctx.event.user_id,
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert job activity: {err:#}"));
    }

    ctx.log(format!("Job {job_id} status set to `{status}`"));
    ActionResult::ok_with(json!({ "job_status": status }))
}

pub(crate) async fn assign_job(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    job_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
) -> ActionResult {
    let Some(job_id) = job_id.or_else(|| event_job_id(ctx)) else {
        return ActionResult::fail("assign_job requires a job id");
    };

    if let Err(err) = store.update_job_assignee(job_id, assignee_id).await {
        return ActionResult::fail(format!("failed to update job assignee: {err:#}"));
    }

    let note = match assignee_id {
        Some(assignee) => format!("Assigned to {} by automation `{}`", assignee, ctx.flow.name),
        None => format!("Unassigned by automation `{}`", ctx.flow.name),
    };
    if let Err(err) = store
        .insert_job_activity(NewJobActivity {
            job_id,
            kind: "assignment".to_string(),
            note,
            actor_id: ctx.event.user_id,
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert job activity: {err:#}"));
    }

    ctx.log(match assignee_id {
        Some(assignee) => format!("Job {job_id} assigned to {assignee}"),
        None => format!("Job {job_id} unassigned"),
    });
    ActionResult::ok_with(json!({ "job_assignee": assignee_id }))
}

pub(crate) async fn create_task(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    job_id: Option<Uuid>,
    title: Option<&str>,
) -> ActionResult {
    let Some(job_id) = job_id.or_else(|| event_job_id(ctx)) else {
        return ActionResult::fail("create_task requires a job id");
    };
    let Some(title) = title else {
        return ActionResult::fail("create_task requires a title");
    };
    let title = template::render(title, &ctx.variables);

    if let Err(err) = store
        .insert_job_subtask(NewJobSubtask {
            job_id,
            title: title.clone(),
            completed: false,
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert subtask: {err:#}"));
    }

    ctx.log(format!("Subtask `{title}` added to job {job_id}"));
    ActionResult::ok()
}

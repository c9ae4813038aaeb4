use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::types::{ListParams, StartWorkflowRequest, StartWorkflowResponse};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use dealflow_common::{WorkflowId, WorkflowSnapshot, WorkflowSummary};
use tracing::{info, instrument};

/// Start a workflow run.
///
/// Returns `202 Accepted` as soon as the run is queued. Progress is read back
/// from `GET /workflows/{workflow_id}`.
///
/// ```bash
/// curl -X POST /workflows \
///   -H "Content-Type: application/json" \
///   -d '{"query": "Find acquisition targets in fintech", "deal": {"industry": "Fintech"}}'
/// ```
#[instrument(skip(state, payload))]
pub async fn start_workflow(
    State(state): State<AppState>,
    payload: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartWorkflowResponse>)> {
    let Json(req) = payload?;
    info!(
        query_length = req.query.len(),
        query_preview = %req.query.chars().take(100).collect::<String>(),
        has_deal = !req.deal.is_empty(),
        "Starting workflow"
    );

    let workflow_id = state.service.start_with_deal(&req.query, req.deal).await?;

    info!(workflow_id = %workflow_id, "Workflow accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(StartWorkflowResponse {
            status_url: format!("/workflows/{}", workflow_id),
            workflow_id,
        }),
    ))
}

/// Current snapshot of one workflow
#[instrument(skip(state))]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<WorkflowSnapshot>> {
    let id = WorkflowId::from_string(workflow_id);
    state
        .service
        .get_status(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(id.to_string()))
}

/// Most recent workflows, newest first
#[instrument(skip(state))]
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<WorkflowSummary>>> {
    let workflows = state.service.list_recent(params.effective_limit()).await?;
    Ok(Json(workflows))
}

//! Job trigger and status handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use followrank_common::errors::{AppError, Result};
use followrank_ranker::{
    DiscoverySummary, Job, JobStatus, LastPostSummary, RankingSummary, RunCoordinator, TriggerOutcome,
};
use serde::Serialize;

use crate::AppState;

pub(crate) const RANKING_PENDING: &str = "PageRank calculation started. Please try again in a few minutes.";
pub(crate) const LAST_POSTS_PENDING: &str = "Last post dates collection started. Please try again in a few minutes.";

/// Response for an accepted trigger
#[derive(Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub job: &'static str,
    pub run_id: u64,
    pub message: String,
}

/// Status of every background job
#[derive(Serialize)]
pub struct RunsStatusResponse {
    pub ranking: JobStatus<RankingSummary>,
    pub last_posts: JobStatus<LastPostSummary>,
    pub discovery: JobStatus<DiscoverySummary>,
}

/// Start a ranking run
pub async fn calculate_pagerank(State(state): State<AppState>) -> Result<(StatusCode, Json<TriggerResponse>)> {
    start(&state.jobs.ranking, "PageRank calculation started").await
}

/// Start last-post collection
pub async fn collect_last_posts(State(state): State<AppState>) -> Result<(StatusCode, Json<TriggerResponse>)> {
    start(&state.jobs.last_posts, "Last post dates collection started").await
}

/// Start participant discovery
pub async fn collect_japanese_users(State(state): State<AppState>) -> Result<(StatusCode, Json<TriggerResponse>)> {
    start(&state.jobs.discovery, "Collection process started").await
}

pub async fn run_status(State(state): State<AppState>) -> Json<RunsStatusResponse> {
    Json(RunsStatusResponse {
        ranking: state.jobs.ranking.status().await,
        last_posts: state.jobs.last_posts.status().await,
        discovery: state.jobs.discovery.status().await,
    })
}

/// Trigger a job; an overlapping trigger is a conflict
async fn start<J: Job>(
    coordinator: &RunCoordinator<J>,
    message: &str,
) -> Result<(StatusCode, Json<TriggerResponse>)> {
    match coordinator.trigger().await {
        TriggerOutcome::Started { run_id } => Ok((
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                status: "started",
                job: coordinator.name(),
                run_id,
                message: message.to_string(),
            }),
        )),
        TriggerOutcome::AlreadyRunning { run_id } => Err(AppError::RunInProgress {
            job: coordinator.name().to_string(),
            run_id,
        }),
    }
}

/// Answer for a query whose data is not there yet.
///
/// Kicks off the job that produces the data, or reports the run already
/// producing it, and asks the client to retry.
pub(crate) async fn pending<J: Job>(coordinator: &RunCoordinator<J>, message: &str) -> Response {
    let outcome = coordinator.trigger().await;
    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "pending",
            job: coordinator.name(),
            run_id: outcome.run_id(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

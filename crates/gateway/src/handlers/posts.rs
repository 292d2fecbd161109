//! Activity query handlers

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use followrank_common::db::RecentIsolated;
use followrank_common::errors::Result;
use serde::Serialize;

use super::jobs::{pending, LAST_POSTS_PENDING, RANKING_PENDING};
use crate::AppState;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize)]
pub struct LastPostEntry {
    pub pubkey: String,
    pub last_post_date: i64,
}

/// Every recorded last post, newest first
pub async fn last_posts(State(state): State<AppState>) -> Result<Response> {
    if state.repo.count_last_posts().await? == 0 {
        return Ok(pending(&state.jobs.last_posts, LAST_POSTS_PENDING).await);
    }

    let posts: Vec<LastPostEntry> = state
        .repo
        .last_posts()
        .await?
        .into_iter()
        .map(|p| LastPostEntry {
            pubkey: p.pubkey,
            last_post_date: p.last_post_date,
        })
        .collect();
    Ok(Json(posts).into_response())
}

/// Recently active participants with the lowest scores, or the pending
/// response of whichever job must run first
async fn recent_isolated(state: &AppState) -> Result<std::result::Result<Vec<RecentIsolated>, Response>> {
    if state.repo.count_ranks().await? == 0 {
        return Ok(Err(pending(&state.jobs.ranking, RANKING_PENDING).await));
    }
    if state.repo.count_last_posts().await? == 0 {
        return Ok(Err(pending(&state.jobs.last_posts, LAST_POSTS_PENDING).await));
    }

    let queries = &state.config.queries;
    let since = Utc::now().timestamp() - queries.recent_window_days * SECONDS_PER_DAY;
    Ok(Ok(state.repo.recent_isolated(since, queries.result_limit).await?))
}

pub async fn recent_isolated_users(State(state): State<AppState>) -> Result<Response> {
    Ok(match recent_isolated(&state).await? {
        Ok(users) => Json(users).into_response(),
        Err(response) => response,
    })
}

pub async fn recent_isolated_users_pubkey(State(state): State<AppState>) -> Result<Response> {
    Ok(match recent_isolated(&state).await? {
        Ok(users) => {
            let keys: Vec<String> = users.into_iter().map(|u| u.pubkey).collect();
            Json(keys).into_response()
        }
        Err(response) => response,
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get_json, test_state, wait_for_jobs};
    use axum::http::StatusCode;
    use chrono::Utc;
    use followrank_common::db::{LastPostRecord, RankRecord, RankStore};

    fn rank(pubkey: &str, score: f64, rank: i32) -> RankRecord {
        RankRecord { pubkey: pubkey.into(), score, rank }
    }

    fn post(pubkey: &str, last_post_date: i64) -> LastPostRecord {
        LastPostRecord { pubkey: pubkey.into(), last_post_date }
    }

    #[tokio::test]
    async fn test_last_posts_pending_then_listed() {
        let state = test_state().await;

        let (status, body) = get_json(&state, "/last-posts").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["job"], "last_posts");
        wait_for_jobs(&state).await;

        state
            .repo
            .record_last_posts(&[post("a", 10), post("b", 30)])
            .await
            .unwrap();
        let (status, body) = get_json(&state, "/last-posts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["pubkey"], "b");
        assert_eq!(body[1]["last_post_date"], 10);
    }

    #[tokio::test]
    async fn test_recent_isolated_waits_for_both_tables() {
        let state = test_state().await;

        let (status, body) = get_json(&state, "/recent-isolated-users").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["job"], "ranking");
        wait_for_jobs(&state).await;

        state.repo.replace_ranks(&[rank("a", 0.5, 1)], 100).await.unwrap();
        let (status, body) = get_json(&state, "/recent-isolated-users-pubkey").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["job"], "last_posts");
    }

    #[tokio::test]
    async fn test_recent_isolated_filters_by_window() {
        let state = test_state().await;
        let now = Utc::now().timestamp();

        let ranks = vec![rank("a", 0.5, 1), rank("b", 0.3, 2), rank("c", 0.2, 3)];
        state.repo.replace_ranks(&ranks, 100).await.unwrap();
        state
            .repo
            .record_last_posts(&[post("a", now - 60), post("b", now - 3600), post("c", now - 90 * 86_400)])
            .await
            .unwrap();

        let (status, body) = get_json(&state, "/recent-isolated-users-pubkey").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["b", "a"]));

        let (_, body) = get_json(&state, "/recent-isolated-users").await;
        assert_eq!(body[0]["pubkey"], "b");
        assert_eq!(body[0]["score"], 0.3);
    }
}

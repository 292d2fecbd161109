//! Rank query handlers
//!
//! Popular participants have the highest scores, isolated ones the lowest.
//! When no ranking exists yet a run is started and the client is asked to
//! retry.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use followrank_common::db::models::RankScore;
use followrank_common::errors::Result;
use serde::Serialize;

use super::jobs::{pending, RANKING_PENDING};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ScoredParticipant {
    pub pubkey: String,
    pub score: f64,
}

impl From<RankScore> for ScoredParticipant {
    fn from(rank: RankScore) -> Self {
        Self {
            pubkey: rank.pubkey,
            score: rank.score,
        }
    }
}

#[derive(Clone, Copy)]
enum RankOrder {
    Highest,
    Lowest,
}

/// Ranked participants, or `None` when the rank table is empty
async fn ranked(state: &AppState, order: RankOrder) -> Result<Option<Vec<RankScore>>> {
    if state.repo.count_ranks().await? == 0 {
        return Ok(None);
    }

    let limit = state.config.queries.result_limit;
    let ranks = match order {
        RankOrder::Highest => state.repo.top_ranks(limit).await?,
        RankOrder::Lowest => state.repo.bottom_ranks(limit).await?,
    };
    Ok(Some(ranks))
}

async fn scored(state: AppState, order: RankOrder) -> Result<Response> {
    match ranked(&state, order).await? {
        Some(ranks) => {
            let body: Vec<ScoredParticipant> = ranks.into_iter().map(Into::into).collect();
            Ok(Json(body).into_response())
        }
        None => Ok(pending(&state.jobs.ranking, RANKING_PENDING).await),
    }
}

async fn keys_only(state: AppState, order: RankOrder) -> Result<Response> {
    match ranked(&state, order).await? {
        Some(ranks) => {
            let body: Vec<String> = ranks.into_iter().map(|r| r.pubkey).collect();
            Ok(Json(body).into_response())
        }
        None => Ok(pending(&state.jobs.ranking, RANKING_PENDING).await),
    }
}

pub async fn popular_users(State(state): State<AppState>) -> Result<Response> {
    scored(state, RankOrder::Highest).await
}

pub async fn popular_users_pubkey(State(state): State<AppState>) -> Result<Response> {
    keys_only(state, RankOrder::Highest).await
}

pub async fn isolated_users(State(state): State<AppState>) -> Result<Response> {
    scored(state, RankOrder::Lowest).await
}

pub async fn isolated_users_pubkey(State(state): State<AppState>) -> Result<Response> {
    keys_only(state, RankOrder::Lowest).await
}

//! Participant query handlers

use axum::{extract::State, Json};
use chrono::{Days, NaiveDate, Utc};
use followrank_common::db::models::Participant;
use followrank_common::errors::Result;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct NewParticipant {
    pub pubkey: String,
    pub registration_date: NaiveDate,
}

/// Participants discovered within the configured window
async fn recent_discoveries(state: &AppState) -> Result<Vec<Participant>> {
    let today = Utc::now().date_naive();
    let window = Days::new(state.config.queries.new_user_window_days.max(0) as u64);
    let since = today.checked_sub_days(window).unwrap_or(NaiveDate::MIN);
    state.repo.new_participants(since).await
}

pub async fn new_users(State(state): State<AppState>) -> Result<Json<Vec<NewParticipant>>> {
    let participants = recent_discoveries(&state).await?;
    Ok(Json(
        participants
            .into_iter()
            .map(|p| NewParticipant {
                pubkey: p.pubkey,
                registration_date: p.registration_date,
            })
            .collect(),
    ))
}

pub async fn new_users_pubkey(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let participants = recent_discoveries(&state).await?;
    Ok(Json(participants.into_iter().map(|p| p.pubkey).collect()))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get_json, test_state};
    use axum::http::StatusCode;
    use chrono::{Days, Utc};
    use followrank_common::db::RankStore;

    #[tokio::test]
    async fn test_only_recent_discoveries_are_listed() {
        let state = test_state().await;
        let today = Utc::now().date_naive();

        state.repo.insert_participant_if_absent("npub1fresh", today).await.unwrap();
        state
            .repo
            .insert_participant_if_absent("npub1stale", today - Days::new(45))
            .await
            .unwrap();
        state.repo.import_participant("npub1seed", today).await.unwrap();

        let (status, body) = get_json(&state, "/new-users-pubkey").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["npub1fresh"]));

        let (_, body) = get_json(&state, "/new-users").await;
        assert_eq!(body[0]["pubkey"], "npub1fresh");
        assert_eq!(body[0]["registration_date"], today.to_string());
    }
}

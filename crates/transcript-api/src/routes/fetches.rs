use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use transcript_core::{video_id_from_url, ResourceId};

use crate::error::ApiError;
use crate::state::{AppState, FetchRecord, RecordView};

#[derive(Debug, Deserialize)]
pub struct CreateFetchRequest {
    pub url: Option<String>,
    pub video_id: Option<String>,
}

impl CreateFetchRequest {
    fn resource_id(&self) -> Result<ResourceId, ApiError> {
        match (&self.url, &self.video_id) {
            (Some(url), _) => video_id_from_url(url)
                .ok_or_else(|| ApiError::BadRequest(format!("Not a YouTube video URL: {}", url))),
            (None, Some(id)) => ResourceId::new(id.as_str())
                .ok_or_else(|| ApiError::BadRequest("video_id must not be blank".into())),
            (None, None) => Err(ApiError::BadRequest(
                "Either url or video_id is required".into(),
            )),
        }
    }
}

#[derive(Serialize)]
pub struct FetchSummary {
    pub id: Uuid,
    pub video_id: ResourceId,
    pub created_at: String,
    pub status: &'static str,
    pub source: Option<String>,
    pub attempt_count: usize,
}

#[derive(Serialize)]
pub struct DeleteAllResponse {
    pub message: String,
    pub deleted_count: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/fetches",
            get(list_fetches).post(create_fetch).delete(delete_all_fetches),
        )
        .route("/fetches/{id}", get(get_fetch))
}

fn parse_record_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid fetch ID: {}", id)))
}

/// POST /api/v1/fetches
async fn create_fetch(
    State(state): State<AppState>,
    Json(body): Json<CreateFetchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = body.resource_id()?;

    let outcome = match state.fetcher.fetch_with_cancel(&video_id, &state.shutdown).await {
        Ok(outcome) => outcome,
        Err(err) => {
            state.stats.record_error(&err);
            return Err(err.into());
        }
    };
    state.stats.record_outcome(&outcome);

    let record = FetchRecord::new(video_id, outcome);
    info!(
        fetch_id = %record.id,
        video_id = %record.video_id,
        status = record.status(),
        "Fetch recorded"
    );
    let response = Json(serde_json::to_value(RecordView::from(&record)).map_err(|e| {
        ApiError::Internal(format!("Failed to encode record: {}", e))
    })?);
    state.insert_record(record);

    Ok((StatusCode::CREATED, response))
}

/// GET /api/v1/fetches
async fn list_fetches(State(state): State<AppState>) -> Json<Vec<FetchSummary>> {
    let mut records: Vec<FetchRecord> = state.records.iter().map(|e| e.value().clone()).collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(
        records
            .into_iter()
            .map(|r| FetchSummary {
                id: r.id,
                status: r.status(),
                created_at: r.created_at.to_rfc3339(),
                source: r.outcome.source().map(str::to_string),
                attempt_count: r.outcome.attempts().len(),
                video_id: r.video_id,
            })
            .collect(),
    )
}

/// GET /api/v1/fetches/:id
async fn get_fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_record_id(&id)?;
    let record = state
        .records
        .get(&id)
        .map(|r| r.value().clone())
        .ok_or_else(|| ApiError::NotFound(format!("Fetch {} not found", id)))?;

    serde_json::to_value(RecordView::from(&record))
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Failed to encode record: {}", e)))
}

/// DELETE /api/v1/fetches
async fn delete_all_fetches(State(state): State<AppState>) -> Json<DeleteAllResponse> {
    let deleted_count = state.records.len();
    state.records.clear();

    Json(DeleteAllResponse {
        message: "All fetch records deleted".into(),
        deleted_count,
    })
}

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    services::{
        auth::{bearer_token, Session},
        db_loader::{Destination, LoadMode, LoadResult},
        file_processor,
        profiler::DatasetProfile,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/datasets/profile", post(profile_upload))
        .route("/datasets/profile-url", post(profile_from_url))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    file_name: String,
    table: Option<String>,
    #[serde(default)]
    mode: LoadMode,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUrlRequest {
    file_name: String,
    signed_url: String,
    table: Option<String>,
    #[serde(default)]
    mode: LoadMode,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    file_name: String,
    profile: DatasetProfile,
    preview: Vec<Vec<String>>,
    load: Option<LoadResult>,
}

async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?;
    Ok(state.authenticator.verify(token).await?)
}

fn destination(table: Option<String>, mode: LoadMode) -> Option<Destination> {
    table
        .filter(|t| !t.trim().is_empty())
        .map(|table| Destination { table, mode })
}

async fn profile_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<ProfileResponse>, AppError> {
    let session = require_session(&state, &headers).await?;
    tracing::info!("Upload of {} ({}KB) by {}", params.file_name, body.len() / 1024, session.email);

    let response = run_pipeline(
        &state,
        &session,
        params.file_name,
        &body,
        destination(params.table, params.mode),
    )
    .await?;
    Ok(Json(response))
}

async fn profile_from_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ProfileUrlRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let session = require_session(&state, &headers).await?;

    tracing::info!("Downloading {} for {}", request.file_name, session.email);
    let download_start = std::time::Instant::now();
    let file_data = file_processor::load_file_from_url(&request.signed_url).await?;
    tracing::info!(
        "File downloaded, size: {}KB, took: {:?}",
        file_data.len() / 1024,
        download_start.elapsed()
    );

    let response = run_pipeline(
        &state,
        &session,
        request.file_name,
        &file_data,
        destination(request.table, request.mode),
    )
    .await?;
    Ok(Json(response))
}

/// Load, profile and optionally land the file in the warehouse.
async fn run_pipeline(
    state: &AppState,
    session: &Session,
    file_name: String,
    file_data: &[u8],
    destination: Option<Destination>,
) -> Result<ProfileResponse, AppError> {
    let start = std::time::Instant::now();
    let dataset = file_processor::load_dataset(&file_name, file_data)?;
    let profile = state.profiler.profile_dataset(&dataset)?;
    let preview = dataset.preview(state.config.preview_rows);

    let load = match destination {
        Some(destination) => Some(state.warehouse.bulk_load(session, &dataset, &destination).await?),
        None => None,
    };

    tracing::info!("Total processing of {} completed in {:?}", file_name, start.elapsed());
    Ok(ProfileResponse {
        file_name,
        profile,
        preview,
        load,
    })
}

use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use crate::{
    error::AppError,
    services::auth::{Credentials, Session},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(sign_up))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Session>, AppError> {
    tracing::info!("Login attempt for {}", credentials.email);
    let session = state.authenticator.authenticate(&credentials).await?;
    Ok(Json(session))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Session>, AppError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AppError::InvalidInput("email and password are required".to_string()));
    }
    tracing::info!("Sign-up for {}", credentials.email);
    let session = state.authenticator.sign_up(&credentials).await?;
    Ok(Json(session))
}

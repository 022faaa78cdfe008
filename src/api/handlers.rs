use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{GenerateRequest, GenerateResponse, HealthResponse, RequestPolicy, VoicesResponse};
use crate::api::routes::AppState;
use crate::error::AppError;

pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    run_generate(&state, &state.api_policy, payload).await
}

pub async fn generate_web(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    run_generate(&state, &state.web_policy, payload).await
}

async fn run_generate(
    state: &AppState,
    policy: &RequestPolicy,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::Validation("No JSON data provided".into())
        }
        other => AppError::Validation(other.body_text()),
    })?;

    let generated = state.tts.generate(policy.apply(body)).await?;
    Ok(Json(generated.into()))
}

pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VoicesResponse>, AppError> {
    let voices = state.tts.list_voices()?;
    Ok(Json(VoicesResponse { voices }))
}

pub async fn audio(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let wav = state.tts.open_audio(&filename).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

use crate::error::{AppError, Result};
use crate::extract::ClientAddr;
use crate::model::{
    CreateUrlRequest, CreateUrlResponse, DeleteUrlResponse, UrlAnalyticsResponse, UrlInfoResponse,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hotlink_core::{ExpirationPolicy, ShortCode, ShortenParams};
use std::time::Duration;
use tracing::debug;

/// Malformed codes can never exist, so they are reported as missing.
fn parse_code(raw: &str) -> Result<ShortCode> {
    ShortCode::new(raw).map_err(|_| AppError::NotFound)
}

pub async fn create_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if request.original_url.trim().is_empty() {
        return Err(AppError::BadRequest("originalUrl is required".to_string()));
    }

    let custom_alias = request.alias.map(ShortCode::new).transpose()?;
    let expiration = match (request.expires_at, request.expires_in) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "expiresAt and expiresIn are mutually exclusive".to_string(),
            ))
        }
        (Some(timestamp), None) => ExpirationPolicy::AtTimestamp(timestamp),
        (None, Some(seconds)) => ExpirationPolicy::AfterDuration(Duration::from_secs(seconds)),
        (None, None) => ExpirationPolicy::Never,
    };

    let record = state
        .shortener()
        .shorten(ShortenParams {
            target_url: request.original_url,
            expiration,
            custom_alias,
        })
        .await?;

    let response = CreateUrlResponse {
        short_url: state.short_url(&record.code),
        short_code: record.code.to_string(),
        original_url: record.target_url,
        created_at: record.created_at,
        expires_at: record.expire_at,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    ClientAddr(source): ClientAddr,
) -> Result<Response> {
    let code = parse_code(&code)?;
    let resolution = state.resolver().resolve(&code, &source).await?;
    debug!(code = %code, served_from = ?resolution.served_from, "Redirecting");

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, resolution.target_url)],
    )
        .into_response())
}

pub async fn info_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UrlInfoResponse>> {
    let code = parse_code(&code)?;
    let info = state.shortener().info(&code).await?;
    Ok(Json(UrlInfoResponse::new(info, state.short_url(&code))))
}

pub async fn analytics_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UrlAnalyticsResponse>> {
    let code = parse_code(&code)?;
    let analytics = state.shortener().analytics(&code).await?;
    Ok(Json(UrlAnalyticsResponse::new(
        analytics,
        state.short_url(&code),
    )))
}

pub async fn delete_url_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DeleteUrlResponse>> {
    let code = parse_code(&code)?;
    state.shortener().delete(&code).await?;
    Ok(Json(DeleteUrlResponse {
        message: "Short URL deleted successfully".to_string(),
    }))
}

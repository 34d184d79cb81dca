// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface of the acceptor.
//!
//! - `POST /api/fallback`: envelope from a client whose store is unusable
//! - `GET/POST /api/url-services`, `PUT /api/url-services/{id}`: admin edits
//! - `GET /api/config/public`, `PUT /api/config/{key}`
//!
//! Admin edits are local-origin writes, so they reach every connection
//! through the outbox.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use pk_core::{
    ApplyOutcome, Command, ConfigEntry, ConfigType, Envelope, Origin, Outcome, Record, UrlService,
    UrlServicePatch,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::ServerState;

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/api/fallback", post(fallback))
        .route("/api/url-services", get(list_url_services).post(create_url_service))
        .route("/api/url-services/{id}", put(update_url_service))
        .route("/api/config/public", get(public_config))
        .route("/api/config/{key}", put(set_config))
        .with_state(state)
}

/// Core error rendered as `{"error": ...}` with a matching status.
pub struct ApiError(pk_core::Error);

impl From<pk_core::Error> for ApiError {
    fn from(err: pk_core::Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use pk_core::Error;

        let status = match self.0 {
            Error::SessionNotFound(_)
            | Error::UserNotFound(_)
            | Error::UrlServiceNotFound(_)
            | Error::ConfigNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_)
            | Error::InvalidTransition { .. }
            | Error::InvalidConfigType(_)
            | Error::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn unexpected(outcome: Outcome) -> ApiError {
    ApiError(pk_core::Error::CorruptedData(format!(
        "unexpected store outcome: {outcome:?}"
    )))
}

async fn fallback(State(state): State<ServerState>, Json(msg): Json<Envelope>) -> Response {
    if msg.message_kind().is_control() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "control messages are not accepted here" })),
        )
            .into_response();
    }
    let status = match state.accept_fallback(msg).await {
        ApplyOutcome::Applied { .. } => StatusCode::OK,
        ApplyOutcome::Ignored | ApplyOutcome::Malformed => StatusCode::ACCEPTED,
        ApplyOutcome::Failed => StatusCode::SERVICE_UNAVAILABLE,
    };
    status.into_response()
}

async fn list_url_services(State(state): State<ServerState>) -> ApiResult<Json<Vec<UrlService>>> {
    Ok(Json(state.store().url_services(false).await?))
}

async fn create_url_service(
    State(state): State<ServerState>,
    Json(service): Json<UrlService>,
) -> ApiResult<(StatusCode, Json<UrlService>)> {
    state
        .store()
        .local()
        .put(Record::UrlService(service.clone()), Origin::Local)
        .await?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn update_url_service(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(patch): Json<UrlServicePatch>,
) -> ApiResult<Json<UrlService>> {
    match state
        .store()
        .local()
        .exec(Command::UpdateUrlService { id, patch })
        .await?
    {
        Outcome::UrlService(service) => Ok(Json(service)),
        other => Err(unexpected(other)),
    }
}

async fn public_config(State(state): State<ServerState>) -> ApiResult<Json<BTreeMap<String, Value>>> {
    let entries = state.store().config(true).await?;
    let mut map = BTreeMap::new();
    for entry in entries {
        let value = entry
            .typed_value()
            .unwrap_or_else(|_| Value::String(entry.value.clone()));
        map.insert(entry.key, value);
    }
    Ok(Json(map))
}

#[derive(Debug, Deserialize)]
struct ConfigUpdate {
    value: String,
    #[serde(rename = "type", default)]
    value_type: Option<ConfigType>,
    #[serde(default)]
    is_public: Option<bool>,
}

async fn set_config(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<Json<ConfigEntry>> {
    let existing = state
        .store()
        .local()
        .get(pk_core::EntityKind::Config, &key)
        .await?;
    let (value_type, is_public) = match existing {
        Some(Record::Config(entry)) => (entry.value_type, entry.is_public),
        _ => (ConfigType::default(), false),
    };
    let entry = ConfigEntry {
        key,
        value: update.value,
        value_type: update.value_type.unwrap_or(value_type),
        is_public: update.is_public.unwrap_or(is_public),
    };
    entry
        .typed_value()
        .map_err(|e| pk_core::Error::InvalidInput(e.to_string()))?;
    state
        .store()
        .local()
        .put(Record::Config(entry.clone()), Origin::Local)
        .await?;
    Ok(Json(entry))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

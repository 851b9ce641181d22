use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use ytdls_core::{KeyStatus, PoolsSnapshot, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn get_pools(State(state): State<Arc<AppState>>) -> Json<PoolsSnapshot> {
    Json(state.pipeline().pools())
}

/// Where a request sits in the retrieval pool.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    Active {
        downloads_a_frente: usize,
        enfileirados: usize,
    },
    Queued {
        downloads_a_frente: usize,
        posicao_na_fila: usize,
        enfileirados: usize,
    },
    NotFound,
}

impl From<KeyStatus> for StatusResponse {
    fn from(status: KeyStatus) -> Self {
        match status {
            KeyStatus::Active { queued } => Self::Active {
                downloads_a_frente: 0,
                enfileirados: queued,
            },
            KeyStatus::Queued {
                ahead,
                position,
                queued,
            } => Self::Queued {
                downloads_a_frente: ahead,
                posicao_na_fila: position,
                enfileirados: queued,
            },
            KeyStatus::NotFound => Self::NotFound,
        }
    }
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Response {
    let status = StatusResponse::from(state.pipeline().status(&request_id));
    match status {
        StatusResponse::NotFound => (StatusCode::NOT_FOUND, Json(status)).into_response(),
        _ => Json(status).into_response(),
    }
}

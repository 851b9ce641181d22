//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use ytdls_core::{PipelineError, PoolSnapshot};

/// Body of every failed request except admission rejections.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub sucesso: bool,
    pub erro: String,
    pub mensagem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detalhes: Option<String>,
}

/// Body of a 429: the retrieval pool's state at rejection time.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub sucesso: bool,
    pub erro: &'static str,
    pub ativos: usize,
    pub enfileirados: usize,
    pub limite: usize,
    pub limite_fila: Option<usize>,
}

impl From<&PoolSnapshot> for RejectionBody {
    fn from(pool: &PoolSnapshot) -> Self {
        Self {
            sucesso: false,
            erro: "AdmissionRejected",
            ativos: pool.running,
            enfileirados: pool.queued,
            limite: pool.capacity,
            limite_fila: pool.max_queue_depth,
        }
    }
}

/// Handler error.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    /// The finished artifact could not be opened.
    Delivery(std::io::Error),
    /// Request body that is not valid JSON for the endpoint.
    BadRequest(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

fn error_response(status: StatusCode, erro: &str, mensagem: String, detalhes: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            sucesso: false,
            erro: erro.to_string(),
            mensagem,
            detalhes,
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Pipeline(PipelineError::AdmissionRejected(pool)) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RejectionBody::from(&pool)),
            )
                .into_response(),
            ApiError::Pipeline(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!("Job failed: {}", err);
                }
                error_response(
                    status,
                    err.kind(),
                    err.to_string(),
                    err.diagnostics().map(str::to_string),
                )
            }
            ApiError::Delivery(err) => {
                error!("Delivery failed: {}", err);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DeliveryFailure",
                    err.to_string(),
                    None,
                )
            }
            ApiError::BadRequest(message) => {
                error_response(StatusCode::BAD_REQUEST, "ValidationError", message, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_body() {
        let pool = PoolSnapshot {
            name: "retrieval".to_string(),
            running: 4,
            queued: 10,
            capacity: 4,
            max_queue_depth: Some(10),
            total_completed: 0,
            total_rejected: 1,
        };
        let response = ApiError::from(PipelineError::AdmissionRejected(pool)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let json = body_json(response).await;
        assert_eq!(json["sucesso"], false);
        assert_eq!(json["erro"], "AdmissionRejected");
        assert_eq!(json["ativos"], 4);
        assert_eq!(json["enfileirados"], 10);
        assert_eq!(json["limite"], 4);
        assert_eq!(json["limite_fila"], 10);
    }

    #[tokio::test]
    async fn test_pipeline_error_body() {
        let response = ApiError::from(PipelineError::SizeExceeded {
            size_bytes: None,
            limit_bytes: 104857600,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let json = body_json(response).await;
        assert_eq!(json["erro"], "SizeExceeded");
        assert!(json["mensagem"].as_str().unwrap().contains("104857600"));
        assert!(json.get("detalhes").is_none());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_500() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let response = ApiError::Delivery(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["erro"], "DeliveryFailure");
    }
}

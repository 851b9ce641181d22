//! Job submission: runs the pipeline and streams the result.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
    Json,
};
use std::sync::Arc;
use tower_http::services::ServeFile;
use tracing::info;
use ytdls_core::{Delivery, JobRequest};

use super::error::ApiError;
use super::stream::single_range;
use crate::state::AppState;

pub const X_QUEUE_AHEAD: HeaderName = HeaderName::from_static("x-queue-ahead");
pub const X_QUEUE_LIMIT: HeaderName = HeaderName::from_static("x-queue-limit");

/// `POST /download`
///
/// Blocks until the job finishes, then answers with the artifact itself.
/// The artifact and its scratch directory are removed once the body has
/// been sent or the client disconnects.
pub async fn download(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let delivery = state.pipeline().submit(request).await?;
    info!(
        "Delivering {} ({} bytes) for {}",
        delivery.filename, delivery.size_bytes, delivery.request_id
    );

    let queue_ahead = delivery.queue_ahead;
    let pool_limit = delivery.pool_limit;
    let disposition = content_disposition(&delivery);
    let content_type = HeaderValue::from_static(delivery.content_type);

    let mut file_request = Request::new(Body::empty());
    if let Some(range) = single_range(&headers) {
        file_request
            .headers_mut()
            .insert(header::RANGE, range.clone());
    }
    let served = ServeFile::new(&delivery.path)
        .try_call(file_request)
        .await
        .map_err(ApiError::Delivery)?;

    // Every outcome, 416 included, ends with the artifact removed.
    let mut response = served.map(|body| {
        Body::from_stream(delivery.into_stream(Body::new(body).into_data_stream()))
    });

    let served_file = response.status().is_success();
    let headers = response.headers_mut();
    if served_file {
        // The artifact is always the job's own output, whatever its name.
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers.insert(X_QUEUE_AHEAD, HeaderValue::from(queue_ahead));
    headers.insert(X_QUEUE_LIMIT, HeaderValue::from(pool_limit));
    if let Some(value) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `attachment` with an ASCII fallback name plus the RFC 5987 UTF-8 form.
fn content_disposition(delivery: &Delivery) -> Option<HeaderValue> {
    let ascii: String = delivery
        .filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        percent_encode(&delivery.filename)
    );
    HeaderValue::from_str(&value).ok()
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

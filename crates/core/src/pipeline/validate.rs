//! Request shape validation.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::error::PipelineError;
use super::types::{JobRequest, ValidatedRequest};
use crate::transcoder::OutputKind;

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/").expect("valid link pattern")
});

static REQUEST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid request id pattern"));

/// Whether `link` points at a supported source.
pub fn is_supported_link(link: &str) -> bool {
    LINK_PATTERN.is_match(link)
}

/// Whether `id` is a usable request ID (and therefore a safe directory name).
pub fn is_valid_request_id(id: &str) -> bool {
    REQUEST_ID_PATTERN.is_match(id)
}

/// Checks the request's shape without touching the environment.
pub fn validate_request(request: &JobRequest) -> Result<ValidatedRequest, PipelineError> {
    let link = request
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| PipelineError::Validation("the 'link' field is required".to_string()))?;

    if !is_supported_link(link) {
        return Err(PipelineError::Validation(
            "the link is not from a supported source".to_string(),
        ));
    }

    let kind = request
        .kind
        .as_deref()
        .ok_or_else(|| PipelineError::Validation("the 'type' field is required".to_string()))?
        .parse::<OutputKind>()
        .map_err(|_| {
            PipelineError::Validation("the 'type' field must be 'audio' or 'video'".to_string())
        })?;

    let request_id = request
        .request_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            PipelineError::Validation("the 'request_id' field is required".to_string())
        })?;

    if !is_valid_request_id(request_id) {
        return Err(PipelineError::Validation(
            "the 'request_id' field may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }

    Ok(ValidatedRequest {
        link: link.to_string(),
        kind,
        request_id: request_id.to_string(),
    })
}

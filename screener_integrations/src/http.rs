use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use screener_core::{Error, Result};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::backend_reqwest)
}

/// Pass a successful response through; turn anything else into an `Error` carrying
/// the status and a truncated body.
pub(crate) async fn ensure_success(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(context, status, &body))
}

pub(crate) fn status_error(context: &str, status: StatusCode, body: &str) -> Error {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    let msg = format!("{context} failed ({status}): {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(msg),
        _ => Error::BackendMessage(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        assert!(matches!(
            status_error("sheets read", StatusCode::UNAUTHORIZED, "{}"),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            status_error("sheets read", StatusCode::TOO_MANY_REQUESTS, "quota"),
            Error::BackendMessage(_)
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(5_000);
        let err = status_error("gemini", StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.to_string().len() < 700);
    }
}

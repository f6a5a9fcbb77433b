use crate::metrics as service_metrics;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

pub async fn hello() -> &'static str {
    "hello world!"
}

pub async fn metrics() -> Response {
    match service_metrics::render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

//! Middleware for logging requests and responses.

use axum::{
    body::{Body, HttpBody},
    extract::Request,
    http::{header, request, response},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::Error;

/// The largest request or response body, in bytes, that the middleware will buffer.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Bodies longer than this many characters are truncated at the `info` level.
const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
///
/// Response bodies with no known size or one over [MAX_BODY_BYTES] are passed through
/// without being buffered or logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body_bytes) => body_bytes,
        Err(error) => {
            tracing::warn!("Could not read request body: {error}");
            return Error::InvalidRequest("could not read the request body".to_owned())
                .into_response();
        }
    };
    log_request(&parts, &String::from_utf8_lossy(&body_bytes));

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    if !fits_in_buffer(&body) {
        tracing::info!("Sending response: {}\nbody not logged", parts.status);
        return Response::from_parts(parts, body);
    }

    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body_bytes) => body_bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };
    log_response(&parts, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

fn fits_in_buffer(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_BODY_BYTES as u64)
}

/// Get the first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if `body` is short
/// enough to log in full.
fn truncate_body(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}

fn log_request(parts: &request::Parts, body: &str) {
    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!(
                "Received request: {} {}\nbody: {truncated}...",
                parts.method,
                parts.uri
            );
            tracing::debug!("Full request: {parts:#?}\nbody: {body:?}");
        }
        None => {
            tracing::info!(
                "Received request: {} {}\nbody: {body:?}",
                parts.method,
                parts.uri
            );
            tracing::debug!("Request headers: {:#?}", parts.headers);
        }
    }
}

fn log_response(parts: &response::Parts, body: &str) {
    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {}\nbody: {truncated}...", parts.status);
            tracing::debug!("Full response: {parts:#?}\nbody: {body:?}");
        }
        None => {
            tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
            tracing::debug!("Response headers: {:#?}", parts.headers);
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router, middleware,
        routing::{get, post},
    };
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::{LOG_BODY_LENGTH_LIMIT, MAX_BODY_BYTES, logging_middleware, truncate_body};

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = router.layer(middleware::from_fn(logging_middleware));
        tokio::spawn(async move { axum::serve(listener, router).await });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn small_bodies_pass_through() {
        let url = serve(Router::new().route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(body) }),
        ))
        .await;

        let response = reqwest::Client::new()
            .post(format!("{url}/echo"))
            .json(&json!({ "transaction_id": 1 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "transaction_id": 1 }));
    }

    #[tokio::test]
    async fn large_response_is_passed_through_whole() {
        let size = MAX_BODY_BYTES + 1024 * 1024;
        let url = serve(Router::new().route("/large", get(move || async move { "x".repeat(size) })))
            .await;

        let response = reqwest::get(format!("{url}/large")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.bytes().await.unwrap().len(), size);
    }

    #[test]
    fn short_body_is_not_truncated() {
        assert_eq!(truncate_body(r#"{"transaction_id":1}"#), None);
    }

    #[test]
    fn long_body_is_truncated_on_a_char_boundary() {
        let body = "é".repeat(LOG_BODY_LENGTH_LIMIT + 10);

        let truncated = truncate_body(&body).unwrap();

        assert_eq!(truncated.chars().count(), LOG_BODY_LENGTH_LIMIT);
    }
}

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

use super::app::TestApp;

/// One raw request through the router; `headers` are sent as given.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    json: Option<Value>,
    headers: &[(&str, String)],
) -> Response {
    let builder = headers
        .iter()
        .fold(Request::builder().method(method).uri(uri), |b, (name, value)| {
            b.header(*name, value.as_str())
        });

    let req = match json {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    router.clone().oneshot(req).await.expect("router answered")
}

/// Status, headers and decoded envelope. An empty body decodes to `{}`.
pub async fn envelope(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let raw = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if raw.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&raw).expect("json envelope")
    };
    (status, headers, json)
}

/// Calls the API with the transport bearer token and returns the envelope.
pub async fn call(app: &TestApp, method: Method, uri: &str, json: Option<Value>) -> (StatusCode, Value) {
    let resp = send(&app.app, method, uri, json, &[app.auth_header()]).await;
    let (status, _, body) = envelope(resp).await;
    (status, body)
}

/// Error envelope with `code`; the request-id layer must have tagged it.
pub fn assert_error(status: StatusCode, body: &Value, expected: StatusCode, code: &str) {
    assert_eq!(status, expected, "body: {body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body["message"].is_string());
    assert!(body["traceId"].is_string(), "missing traceId: {body}");
}

/// Success envelope; returns its `data`.
pub fn data(status: StatusCode, body: &Value) -> &Value {
    assert!(status.is_success(), "unexpected status {status}: {body}");
    assert_eq!(body["success"], true);
    &body["data"]
}

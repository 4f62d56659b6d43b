//! In-process HTTP mocks for adapter tests.
//!
//! A [`MockServer`] serves an axum [`Router`] on an ephemeral loopback port
//! and records every request it receives. Tests either bring their own router
//! (typed handlers, as for the normalizer) or use [`MockServer::scripted`],
//! which answers requests with a fixed sequence of [`MockResponse`]s
//! regardless of path. That is what retry and paging tests need.
//!
//! The server shuts down when the [`MockServer`] is dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;
type Script = Arc<Mutex<VecDeque<MockResponse>>>;

/// A request as the mock received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Path plus query string, exactly as sent.
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The body parsed as JSON; `Null` when it is not JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// One canned answer of a scripted mock.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl MockResponse {
    /// A response with `Content-Type: application/json` and the given body.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, [(CONTENT_TYPE, "application/json")], self.body).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// A running mock server.
pub struct MockServer {
    base_url: String,
    requests: RequestLog,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Serves `app` until the returned server is dropped.
    pub async fn start(app: Router) -> Self {
        let requests = RequestLog::default();
        let app = app.layer(middleware::from_fn_with_state(
            Arc::clone(&requests),
            record,
        ));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("local_addr should succeed");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Answers every request, whatever its path, with the next response of
    /// `responses`. Once they run out the mock answers `500`.
    pub async fn scripted(responses: Vec<MockResponse>) -> Self {
        let script: Script = Arc::new(Mutex::new(responses.into()));
        Self::start(Router::new().fallback(next_response).with_state(script)).await
    }

    /// `http://127.0.0.1:<port>`, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn record(State(log): State<RequestLog>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    log.lock().expect("request log poisoned").push(RecordedRequest {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        headers: parts.headers.clone(),
        body: body.clone(),
    });
    next.run(Request::from_parts(parts, Body::from(body))).await
}

async fn next_response(State(script): State<Script>) -> Response {
    let next = script.lock().expect("script poisoned").pop_front();
    match next {
        Some(response) => response.into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no scripted response left").into_response(),
    }
}

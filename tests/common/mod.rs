//! Common test utilities for the integration tests.
//!
//! Provides a recording stand-in for a ThingsDB node and helpers that drive
//! the axum router in-process.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

use thingsdb_secrets::{
    api::build_router,
    backend::Backend,
    domain::ConnectionConfig,
    storage::{InMemoryStorage, Storage},
    thingsdb::{Connector, QueryClient, ThingsDbError},
    Error, Result,
};

/// Records every query it receives. `new_token` answers with a fresh token.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<(String, Value)>>,
    failures: Mutex<VecDeque<(String, i64)>>,
    tokens: AtomicUsize,
}

impl RecordingClient {
    /// Make the next call to `procedure` fail with a server error.
    pub fn fail_next(&self, procedure: &str, code: i64) {
        self.failures.lock().unwrap().push_back((procedure.to_string(), code));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Variables of every call to `procedure`, in order.
    pub fn calls_to(&self, procedure: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(code, _)| code.starts_with(procedure))
            .map(|(_, vars)| vars)
            .collect()
    }
}

#[async_trait]
impl QueryClient for RecordingClient {
    async fn query(
        &self,
        scope: &str,
        code: &str,
        vars: Value,
    ) -> std::result::Result<Value, ThingsDbError> {
        assert_eq!(scope, "@thingsdb", "credential procedures run in the @thingsdb scope");
        self.calls.lock().unwrap().push((code.to_string(), vars));

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(pos) = failures.iter().position(|(p, _)| code.starts_with(p.as_str())) {
                if let Some((procedure, code)) = failures.remove(pos) {
                    return Err(ThingsDbError::Server {
                        code,
                        message: format!("{procedure} failed"),
                    });
                }
            }
        }

        if code.starts_with("new_token") {
            let n = self.tokens.fetch_add(1, Ordering::SeqCst);
            return Ok(json!(format!("tdb-token-{n}")));
        }
        Ok(Value::Null)
    }
}

/// Hands out one shared [`RecordingClient`] and remembers every config it
/// was asked to connect with.
#[derive(Default)]
pub struct RecordingConnector {
    pub client: Arc<RecordingClient>,
    connects: AtomicUsize,
    seen: Mutex<Vec<ConnectionConfig>>,
    reject_token: AtomicBool,
}

impl RecordingConnector {
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ConnectionConfig> {
        self.seen.lock().unwrap().clone()
    }

    /// Reject every subsequent connect as if the node refused the token.
    pub fn reject_token(&self) {
        self.reject_token.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn QueryClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(config.clone());

        if self.reject_token.load(Ordering::SeqCst) {
            return Err(Error::authentication(
                "ThingsDB rejected the configured token",
                ThingsDbError::Server { code: -56, message: "invalid token".into() },
            ));
        }
        Ok(self.client.clone() as Arc<dyn QueryClient>)
    }
}

pub struct TestApp {
    pub backend: Arc<Backend>,
    pub connector: Arc<RecordingConnector>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.backend.clone())
    }

    pub fn client(&self) -> &RecordingClient {
        &self.connector.client
    }
}

pub fn setup_app() -> TestApp {
    setup_app_with_storage(Arc::new(InMemoryStorage::new()))
}

pub fn setup_app_with_storage(storage: Arc<dyn Storage>) -> TestApp {
    let connector = Arc::new(RecordingConnector::default());
    let backend = Arc::new(Backend::new(storage, connector.clone()));
    TestApp { backend, connector }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(path);

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes =
        to_bytes(response.into_body(), usize::MAX).await.expect("read response body as bytes");
    serde_json::from_slice(&bytes).expect("parse json response")
}

/// Connection settings used by most tests.
pub fn local_config() -> Value {
    json!({"hostname": "localhost", "port": 9200, "insecure": true, "token": "T"})
}

pub async fn configure(app: &TestApp) {
    let response = send_request(app, Method::POST, "/v1/config", Some(local_config())).await;
    assert_eq!(response.status().as_u16(), 204, "config write should succeed");
}

pub async fn create_role(app: &TestApp, name: &str, body: Value) {
    let response = send_request(app, Method::POST, &format!("/v1/role/{name}"), Some(body)).await;
    assert_eq!(response.status().as_u16(), 204, "role write should succeed");
}

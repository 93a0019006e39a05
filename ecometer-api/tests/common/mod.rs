//! Common test utilities for router tests
//!
//! Every context gets its own in-memory store seeded with the default
//! admin and developer accounts, and drives the router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use ecometer_api::app::{build_router, AppState};
use ecometer_api::config::Config;
use ecometer_shared::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_CONFIG: &str = "jwt_secret = \"test-secret-key-at-least-32-bytes-long\"\n\
                               storage = \"memory\"\n";

/// Response captured for assertions
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Test context containing the router and its store
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub app: axum::Router,
}

impl TestContext {
    /// Creates a fresh context with the default accounts seeded
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_toml(TEST_CONFIG)?;
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config)?;

        state.credentials.seed_defaults().await?;

        Ok(Self {
            store,
            app: build_router(state),
        })
    }

    /// Sends a request, optionally authenticated and with a JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Logs in and returns the access token, panicking on failure
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);

        response.body["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login("admin", "admin123").await
    }

    pub async fn developer_token(&self) -> String {
        self.login("developer", "dev123").await
    }

    /// Registers an account through the admin and returns its JSON
    pub async fn register(&self, username: &str, role: &str) -> Value {
        let admin = self.admin_token().await;
        let response = self
            .post(
                "/auth/register",
                &admin,
                json!({ "username": username, "full_name": "Test User", "role": role }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "register failed: {}", response.body);
        response.body
    }

    /// Registers a viewer and returns a token from its first login
    pub async fn viewer_token(&self, username: &str) -> String {
        self.register(username, "viewer").await;
        self.login(username, "anything").await
    }
}

/// Minimal valid metric body
pub fn metric(project: &str) -> Value {
    json!({
        "project": project,
        "energy_consumed": 2.0,
        "emissions": 1.0,
        "duration": 600.0
    })
}

//! Helpers for driving the full router in unit tests.

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    app::build_app, auth::JwtKeys, config::AppConfig, state::AppState, users::repo_types::Role,
};

pub const BOUNDARY: &str = "themehub-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    _files: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Test config with `tweak` applied before the router is built.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let files = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::for_tests(files.path().to_path_buf());
        tweak(&mut config);
        let state = AppState::fake_with(config).await;
        let router = build_app(state.clone());
        Self {
            state,
            router,
            _files: files,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.expect("router is infallible");
        let status = resp.status();
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn raw(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.expect("router is infallible")
    }

    /// Registers `name` through the API, then sets its role directly in the store.
    /// Returns (user id, access token).
    pub async fn user(&self, name: &str, role: Role) -> (i64, String) {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/users/register",
                None,
                serde_json::json!({ "name": name, "password": "password123" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {name}: {body}");
        let id = body["id"].as_i64().expect("id");
        if role == Role::Moderator {
            self.state.store.set_role(id, role).await.unwrap();
        }
        let token = JwtKeys::from_ref(&self.state).sign_access(id).unwrap();
        (id, token)
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:8001");
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:8001")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::from(body.to_string())).unwrap()
}

/// A multipart part: (field name, optional file name, content).
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "localhost:8001")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::from(body)).unwrap()
}

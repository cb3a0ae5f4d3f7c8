// Shared helpers for router-level tests

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use church_admin::backend::Backend;
use church_admin::web::{router, AppState};
use church_admin::SqliteBackend;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "segredo123";

pub fn backend() -> Backend {
    let db = SqliteBackend::open_in_memory().expect("in-memory database");
    Backend::from_single(Arc::new(db))
}

pub fn app_with(state: AppState) -> Router {
    router(state)
}

pub fn app() -> (Router, Backend) {
    let backend = backend();
    (router(AppState::new(backend.clone())), backend)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router response")
}

fn encode(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, cookie: Option<&str>, pairs: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(encode(pairs))).unwrap()
}

pub const BOUNDARY: &str = "church-admin-test-boundary";

/// multipart/form-data body with text fields and one file
pub fn post_multipart(
    uri: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    file: (&str, &str, &str, &[u8]),
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }

    let (field, file_name, content_type, bytes) = file;
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, field, file_name, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "expected a redirect");
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `name=value` part of the session Set-Cookie header, ready for a Cookie header
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sb-access-token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

/// Register a church and return the admin's session cookie
pub async fn register(app: &Router, church: &str, email: &str) -> String {
    let response = send(
        app,
        post_form(
            "/register",
            None,
            &[
                ("church_name", church),
                ("user_name", "Administrador"),
                ("email", email),
                ("password", PASSWORD),
                ("confirm_password", PASSWORD),
            ],
        ),
    )
    .await;
    assert_eq!(location(&response), "/dashboard");
    session_cookie(&response).expect("session cookie after register")
}

pub async fn login(app: &Router, email: &str, password: &str) -> Option<String> {
    let response = send(
        app,
        post_form("/login", None, &[("email", email), ("password", password)]),
    )
    .await;
    session_cookie(&response)
}

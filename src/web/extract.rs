//! Request extractors: submitted forms, the session cookie and the
//! authenticated user.

use super::AppState;
use crate::form::{FormData, UploadedFile};
use crate::outcome::Redirect;
use crate::session::{self, CurrentUser, Page, SESSION_COOKIE};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form,
};

// ============================================================================
// FORMS
// ============================================================================

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormData, Response> {
    let mut form = FormData::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?;

        match file_name {
            Some(file_name) => form.push_file(
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                },
            ),
            None => form.push_field(name, String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    Ok(form)
}

/// Accepts `multipart/form-data` and `application/x-www-form-urlencoded`
#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(req.headers()) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return read_multipart(multipart).await;
        }

        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(FormData::from_pairs(pairs))
    }
}

// ============================================================================
// SESSION COOKIE
// ============================================================================

/// Value of one cookie from the `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn cleared_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Attach a `Set-Cookie` header to a response
pub fn with_cookie(response: impl IntoResponse, cookie: &str) -> Response {
    let mut response = response.into_response();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("invalid cookie value: {}", e),
    }
    response
}

/// Raw access token, if the browser sent one
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(cookie_value(&parts.headers, SESSION_COOKIE)))
    }
}

// ============================================================================
// AUTHENTICATED USER
// ============================================================================

/// The signed-in user; anything else is redirected to /login
#[derive(Debug, Clone)]
pub struct Authenticated(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let login = || Redirect::to(Page::Login.path()).into_response();

        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Err(login());
        };

        match session::resolve(&state.backend, &token).await {
            Ok(Some(user)) => Ok(Authenticated(user)),
            Ok(None) => Err(login()),
            Err(e) => {
                tracing::error!("session resolution failed: {}", e);
                Err(login())
            }
        }
    }
}

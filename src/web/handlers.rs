// Route handlers
//
// Page handlers check role access (denied → /dashboard), form handlers hand
// the submitted form to the matching action and return its redirect.

use super::extract::{cleared_session_cookie, session_cookie, with_cookie, Authenticated, SessionToken};
use super::{internal_error, ApiResponse, AppState};
use crate::actions::auth::{AuthOutcome, SessionChange};
use crate::actions::bootstrap::BootstrapParams;
use crate::actions::{auth, bootstrap as seed, members, settings, transactions, today, users};
use crate::error::Result;
use crate::filters::TransactionFilter;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::pages::{self, PublicPage, Query as PageQuery};
use crate::report::{report_csv, report_file_name};
use crate::session::{CurrentUser, Page};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

// ============================================================================
// HELPERS
// ============================================================================

/// `Some(redirect to /dashboard)` when the role may not open `page`
fn page_guard(user: &CurrentUser, page: Page) -> Option<Response> {
    if user.can_access(page) {
        return None;
    }
    tracing::warn!(
        user_id = %user.id(),
        role = user.role().as_str(),
        page = page.path(),
        "page denied for role"
    );
    Some(Redirect::to(Page::Dashboard.path()).into_response())
}

fn render<T: Serialize>(page: Result<T>, context: &str) -> Response {
    match page {
        Ok(page) => Json(ApiResponse::ok(page)).into_response(),
        Err(e) => internal_error(context, e),
    }
}

fn auth_response(state: &AppState, outcome: AuthOutcome) -> Response {
    match outcome.session {
        SessionChange::Keep => outcome.redirect.into_response(),
        SessionChange::Set(token) => with_cookie(
            outcome.redirect,
            &session_cookie(&token, state.secure_cookies),
        ),
        SessionChange::Clear => with_cookie(outcome.redirect, &cleared_session_cookie()),
    }
}

// ============================================================================
// PUBLIC PAGES & AUTH
// ============================================================================

/// GET / - Send the visitor to the dashboard or the login page
pub async fn root(SessionToken(token): SessionToken) -> Redirect {
    match token {
        Some(_) => Redirect::to(Page::Dashboard.path()),
        None => Redirect::to(Page::Login.path()),
    }
}

/// GET /login
pub async fn login_page(Query(query): Query<PageQuery>) -> Json<ApiResponse<PublicPage>> {
    Json(ApiResponse::ok(PublicPage::new(Page::Login, &query)))
}

/// GET /register
pub async fn register_page(Query(query): Query<PageQuery>) -> Json<ApiResponse<PublicPage>> {
    Json(ApiResponse::ok(PublicPage::new(Page::Register, &query)))
}

/// POST /login
pub async fn login(State(state): State<AppState>, form: FormData) -> Response {
    let outcome = auth::login(&state.backend, &form).await;
    auth_response(&state, outcome)
}

/// POST /register
pub async fn register(State(state): State<AppState>, form: FormData) -> Response {
    let outcome = auth::register(&state.backend, &form).await;
    auth_response(&state, outcome)
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> Response {
    let outcome = auth::logout(&state.backend, token.as_deref()).await;
    auth_response(&state, outcome)
}

// ============================================================================
// DASHBOARD PAGES
// ============================================================================

/// GET /dashboard
pub async fn dashboard_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    render(
        pages::dashboard_page(&state.backend, &user, &query, today()).await,
        "error loading dashboard",
    )
}

/// GET /dashboard/members
pub async fn members_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::Members) {
        return denied;
    }
    render(
        pages::members_page(&state.backend, &user, &query, today()).await,
        "error loading members",
    )
}

/// GET /dashboard/transactions
pub async fn transactions_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::Transactions) {
        return denied;
    }
    render(
        pages::transactions_page(&state.backend, &user, &query).await,
        "error loading transactions",
    )
}

/// GET /dashboard/transactions/report.csv - Filtered list as CSV
pub async fn transactions_report(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::Transactions) {
        return denied;
    }

    let filter = TransactionFilter::from_query(&query);
    let csv = match pages::filtered_transactions(&state.backend, &user.scope(), &filter).await {
        Ok(views) => report_csv(&views),
        Err(e) => Err(e),
    };

    match csv {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report_file_name(today())),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => internal_error("error exporting report", e),
    }
}

/// GET /dashboard/quick-entry
pub async fn quick_entry_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::QuickEntry) {
        return denied;
    }
    render(
        pages::quick_entry_page(&state.backend, &user, &query, today()).await,
        "error loading quick entry",
    )
}

/// GET /dashboard/users
pub async fn users_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::Users) {
        return denied;
    }
    render(
        pages::users_page(&state.backend, &user, &query).await,
        "error loading users",
    )
}

/// GET /dashboard/settings
pub async fn settings_page(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(denied) = page_guard(&user, Page::Settings) {
        return denied;
    }
    render(
        pages::settings_page(&state.backend, &user, &query).await,
        "error loading settings",
    )
}

// ============================================================================
// FORM ACTIONS
// ============================================================================

pub async fn create_member(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    members::create_member(&state.backend, &user, &form).await
}

pub async fn update_member(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    members::update_member(&state.backend, &user, &form).await
}

pub async fn delete_member(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Redirect {
    members::delete_member(&state.backend, &user, &id).await
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    transactions::create_transaction(&state.backend, &user, &form).await
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    form: FormData,
) -> Redirect {
    transactions::update_transaction(&state.backend, &user, &id, &form).await
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Redirect {
    transactions::delete_transaction(&state.backend, &user, &id).await
}

pub async fn quick_entry(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    transactions::quick_entry(&state.backend, &user, &form).await
}

pub async fn create_many(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    transactions::create_many(&state.backend, &user, &form).await
}

pub async fn create_user(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    users::create_user(&state.backend, &user, &form).await
}

pub async fn update_user(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    form: FormData,
) -> Redirect {
    users::update_user(&state.backend, &user, &id, &form).await
}

pub async fn delete_user(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Redirect {
    users::delete_user(&state.backend, &user, &id).await
}

pub async fn update_settings(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    settings::update_church_settings(&state.backend, &user, &form).await
}

pub async fn upload_logo(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    form: FormData,
) -> Redirect {
    settings::upload_logo(&state.backend, &user, &form).await
}

// ============================================================================
// API
// ============================================================================

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

/// GET /api/health - Health check
pub async fn health_check() -> Json<ApiResponse<Health>> {
    Json(ApiResponse::ok(Health {
        status: "OK",
        version: crate::VERSION,
    }))
}

/// GET /api/bootstrap - Seed the admin account and default church
pub async fn bootstrap(
    State(state): State<AppState>,
    Query(params): Query<BootstrapParams>,
) -> Response {
    if !state.bootstrap.allows(params.token.as_deref()) {
        tracing::warn!("bootstrap rejected: invalid token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Token inválido" })),
        )
            .into_response();
    }

    match seed::bootstrap(&state.backend, &params).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!("bootstrap failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /storage/v1/object/public/:bucket/*path - Serve an object from a public bucket
pub async fn public_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    let public = match state.backend.storage.list_buckets().await {
        Ok(buckets) => buckets.iter().any(|b| b.name == bucket && b.public),
        Err(e) => return internal_error("error reading buckets", e),
    };
    if !public {
        tracing::warn!(bucket = %bucket, "object requested from a non-public bucket");
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.backend.storage.download(&bucket, &path).await {
        Ok(Some(object)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error("error reading object", e),
    }
}

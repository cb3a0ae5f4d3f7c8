// 🌐 Web - axum router for the church admin pages, form actions and JSON API
//
// GET page routes answer with a JSON view model wrapped in `ApiResponse`.
// POST form routes run an action and answer with a 303 redirect whose query
// string carries the outcome.

pub mod extract;
pub mod handlers;

use crate::actions::bootstrap::BootstrapPolicy;
use crate::backend::Backend;
use crate::config::AppConfig;
use crate::outcome::Redirect;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Request bodies above this are rejected before any handler runs
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub bootstrap: BootstrapPolicy,
    /// Adds `Secure` to the session cookie
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(backend: Backend) -> Self {
        AppState {
            backend,
            bootstrap: BootstrapPolicy::default(),
            secure_cookies: false,
        }
    }

    pub fn from_config(config: &AppConfig, backend: Backend) -> Self {
        AppState {
            backend,
            bootstrap: BootstrapPolicy {
                production: config.is_production(),
                expected_token: config.bootstrap_token.clone(),
            },
            secure_cookies: config.is_production(),
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        axum::response::Redirect::to(&self.location()).into_response()
    }
}

/// 500 with a JSON body; the detailed error only goes to the log
pub fn internal_error(context: &str, error: impl std::fmt::Display) -> Response {
    tracing::error!("{}: {}", context, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::failed(context)),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/bootstrap", get(handlers::bootstrap));

    let dashboard_routes = Router::new()
        .route("/", get(handlers::dashboard_page))
        .route(
            "/members",
            get(handlers::members_page).post(handlers::create_member),
        )
        .route("/members/update", post(handlers::update_member))
        .route("/members/:id/delete", post(handlers::delete_member))
        .route(
            "/transactions",
            get(handlers::transactions_page).post(handlers::create_transaction),
        )
        .route("/transactions/report.csv", get(handlers::transactions_report))
        .route("/transactions/:id", post(handlers::update_transaction))
        .route("/transactions/:id/delete", post(handlers::delete_transaction))
        .route(
            "/quick-entry",
            get(handlers::quick_entry_page).post(handlers::quick_entry),
        )
        .route("/quick-entry/batch", post(handlers::create_many))
        .route(
            "/users",
            get(handlers::users_page).post(handlers::create_user),
        )
        .route("/users/:id", post(handlers::update_user))
        .route("/users/:id/delete", post(handlers::delete_user))
        .route(
            "/settings",
            get(handlers::settings_page).post(handlers::update_settings),
        )
        .route("/settings/logo", post(handlers::upload_logo));

    Router::new()
        .route("/", get(handlers::root))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        .route("/logout", post(handlers::logout))
        .route(
            "/storage/v1/object/public/:bucket/*path",
            get(handlers::public_object),
        )
        .nest("/dashboard", dashboard_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "church admin server listening");
    axum::serve(listener, router(state)).await
}

// Church Admin - Core Library
// Exposes all modules for use in CLI, web server, and tests

pub mod actions;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod entities;
pub mod error;
pub mod filters;
pub mod form;
pub mod logging;
pub mod messages;
pub mod outcome;
pub mod pages;
pub mod report;
pub mod session;
pub mod validation;

// Only compile the web layer when the server feature is enabled
#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use backend::{
    AuthProvider, Backend, DateRange, ObjectStorage, TenantScope, TenantStore,
    sqlite::{setup_database, SqliteBackend},
    supabase::SupabaseBackend,
};
pub use config::{AppConfig, BackendKind, LogFormat};
pub use dashboard::{summarize, DashboardData, DashboardSummary, Totals};
pub use entities::{
    Category, Church, ChurchSettings, Event, Family, Member, MemberDetails, MemberStatus, Role,
    Transaction, TransactionDraft, TransactionType, TransactionView, UserProfile,
};
pub use error::{AppError, ErrorCode, Result};
pub use filters::{MemberFilter, TransactionFilter, TypeFilter};
pub use form::{FormData, UploadedFile};
pub use outcome::Redirect;
pub use report::{report_csv, write_report};
pub use session::{CurrentUser, Page};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

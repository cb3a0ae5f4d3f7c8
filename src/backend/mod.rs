//! Backend collaborators: tenant database, authentication and object storage.
//!
//! The hosted backend-as-a-service is reached through three traits. Two
//! implementations exist:
//!
//! - [`supabase::SupabaseBackend`] talks to the hosted service over HTTP
//!   (PostgREST, GoTrue and the Storage API).
//! - [`sqlite::SqliteBackend`] implements the same traits on a local SQLite
//!   file, for development, the CLI and tests.
//!
//! Every store method that reads or writes tenant rows takes a
//! [`TenantScope`]; the scope's church id is applied as a filter on every
//! statement.

pub mod sqlite;
pub mod supabase;

use crate::entities::{
    Church, ChurchSettings, Event, Family, Member, MemberDetails, Transaction, TransactionDraft,
    UserProfile, UserUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// TENANT SCOPE
// ============================================================================

/// Row filter for one tenant, plus the caller's access token when the
/// call is made on behalf of a signed-in user.
///
/// Backends with row-level security send table requests with that token,
/// so the database applies its own policies on top of the church filter.
/// Scopes built without a token (CLI, bootstrap) use the backend's own
/// credentials.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TenantScope {
    church_id: String,
    access_token: Option<String>,
}

impl TenantScope {
    pub fn new(church_id: impl Into<String>) -> Self {
        TenantScope {
            church_id: church_id.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn church_id(&self) -> &str {
        &self.church_id
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

// Keeps the token out of logs
impl std::fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantScope")
            .field("church_id", &self.church_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Inclusive date window for transaction queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

// ============================================================================
// TENANT STORE
// ============================================================================

#[async_trait]
pub trait TenantStore: Send + Sync {
    // Churches
    async fn get_church(&self, church_id: &str) -> Result<Option<Church>>;
    async fn find_church_by_name(&self, name: &str) -> Result<Option<Church>>;
    async fn insert_church(&self, name: &str) -> Result<Church>;
    async fn update_church(&self, scope: &TenantScope, settings: &ChurchSettings) -> Result<bool>;
    async fn set_church_logo(&self, scope: &TenantScope, logo_url: &str) -> Result<bool>;

    // Users
    /// Profile lookup by auth id; used to resolve a session before any
    /// scope is known.
    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn list_users(&self, scope: &TenantScope) -> Result<Vec<UserProfile>>;
    async fn get_user(&self, scope: &TenantScope, user_id: &str) -> Result<Option<UserProfile>>;
    async fn user_email_taken(&self, scope: &TenantScope, email: &str) -> Result<bool>;
    async fn insert_user(&self, profile: &UserProfile) -> Result<()>;
    async fn update_user(&self, scope: &TenantScope, user_id: &str, update: &UserUpdate)
        -> Result<bool>;
    async fn delete_user(&self, scope: &TenantScope, user_id: &str) -> Result<bool>;

    // Families
    async fn insert_family(&self, scope: &TenantScope, name: &str) -> Result<Family>;
    async fn list_families(&self, scope: &TenantScope) -> Result<Vec<Family>>;
    async fn get_family(&self, scope: &TenantScope, family_id: &str) -> Result<Option<Family>>;

    // Members
    async fn list_members(&self, scope: &TenantScope) -> Result<Vec<Member>>;
    async fn get_member(&self, scope: &TenantScope, member_id: &str) -> Result<Option<Member>>;
    /// Whether another member of the tenant already uses `email`.
    async fn member_email_taken(
        &self,
        scope: &TenantScope,
        email: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool>;
    async fn insert_member(&self, scope: &TenantScope, details: &MemberDetails) -> Result<Member>;
    async fn update_member(
        &self,
        scope: &TenantScope,
        member_id: &str,
        details: &MemberDetails,
    ) -> Result<bool>;
    async fn delete_member(&self, scope: &TenantScope, member_id: &str) -> Result<bool>;
    async fn count_active_members(&self, scope: &TenantScope) -> Result<u64>;
    async fn member_names(
        &self,
        scope: &TenantScope,
        member_ids: &[String],
    ) -> Result<HashMap<String, String>>;

    // Transactions
    /// Ordered by date, newest first.
    async fn list_transactions(
        &self,
        scope: &TenantScope,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>>;
    async fn get_transaction(&self, scope: &TenantScope, tx_id: &str)
        -> Result<Option<Transaction>>;
    async fn insert_transaction(
        &self,
        scope: &TenantScope,
        draft: &TransactionDraft,
    ) -> Result<Transaction>;
    async fn update_transaction(
        &self,
        scope: &TenantScope,
        tx_id: &str,
        draft: &TransactionDraft,
    ) -> Result<bool>;
    async fn delete_transaction(&self, scope: &TenantScope, tx_id: &str) -> Result<bool>;

    // Audit trail
    async fn append_event(&self, event: &Event) -> Result<()>;
}

// ============================================================================
// AUTH PROVIDER
// ============================================================================

/// Identity as returned by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// Admin-side user creation
#[derive(Debug, Clone, Serialize)]
pub struct NewAuthUser {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser>;
    /// `None` when the token is unknown or expired.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    // Admin (service role) operations
    async fn admin_create_user(&self, user: &NewAuthUser) -> Result<AuthUser>;
    async fn admin_list_users(&self, page: u32, per_page: u32) -> Result<Vec<AuthUser>>;
    async fn admin_update_user(&self, user_id: &str, update: &AuthUserUpdate) -> Result<()>;
    async fn admin_delete_user(&self, user_id: &str) -> Result<()>;
}

// ============================================================================
// OBJECT STORAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSpec {
    pub name: String,
    pub public: bool,
    pub file_size_limit: Option<u64>,
    pub allowed_mime_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<()>;
    async fn download(&self, bucket: &str, path: &str) -> Result<Option<StoredObject>>;
    fn public_url(&self, bucket: &str, path: &str) -> String;
    async fn list_buckets(&self) -> Result<Vec<Bucket>>;
    async fn create_bucket(&self, spec: &BucketSpec) -> Result<()>;
    async fn update_bucket(&self, name: &str, public: bool) -> Result<()>;
}

// ============================================================================
// BACKEND HANDLE
// ============================================================================

/// The three collaborators, shared by every request
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn TenantStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backend {
    /// One object implementing all three traits
    pub fn from_single<B>(backend: Arc<B>) -> Self
    where
        B: TenantStore + AuthProvider + ObjectStorage + 'static,
    {
        Backend {
            store: backend.clone(),
            auth: backend.clone(),
            storage: backend,
        }
    }
}

/// Public URL layout shared by both implementations
pub(crate) fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_object_url_trims_slash() {
        assert_eq!(
            public_object_url("https://x.supabase.co/", "logos", "1.png"),
            "https://x.supabase.co/storage/v1/object/public/logos/1.png"
        );
    }

    #[test]
    fn test_scope_debug_hides_token() {
        let scope = TenantScope::new("c1").with_access_token("jwt-secret");
        assert_eq!(scope.access_token(), Some("jwt-secret"));

        let printed = format!("{:?}", scope);
        assert!(printed.contains("c1"));
        assert!(!printed.contains("jwt-secret"));
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
    }
}

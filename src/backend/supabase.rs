// ☁️ Supabase backend - hosted Postgres (PostgREST), auth (GoTrue) and storage
//
// Church, family, member and transaction tables are read and written with
// the caller's access token, so row-level security policies apply on top of
// the church_id filter every scoped call adds. The service-role key is kept
// for auth admin calls, the users table, bootstrap lookups, the audit log
// and storage.

use super::{
    public_object_url, AuthProvider, AuthSession, AuthUser, AuthUserUpdate, Bucket, BucketSpec,
    DateRange, NewAuthUser, ObjectStorage, StoredObject, TenantScope, TenantStore,
};
use crate::entities::{
    Church, ChurchSettings, Event, Family, Member, MemberDetails, Transaction, TransactionDraft,
    UserProfile, UserUpdate,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub struct SupabaseBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

type Query = Vec<(&'static str, String)>;

/// Credentials a table request goes out with
#[derive(Clone, Copy)]
enum Caller<'a> {
    Service,
    Tenant(&'a TenantScope),
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Case-insensitive equality: `ilike` with its wildcards escaped
fn ieq(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("ilike.{}", escaped)
}

impl SupabaseBackend {
    pub fn new(base_url: &str, anon_key: &str, service_role_key: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("church-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(SupabaseBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying the service-role credentials
    fn service(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    /// Request carrying the public anon key
    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
    }

    /// Scopes without a token (CLI, bootstrap) fall back to the service role
    fn table(&self, caller: Caller<'_>, method: Method, table: &str) -> RequestBuilder {
        let path = format!("/rest/v1/{}", table);
        match caller {
            Caller::Tenant(scope) => match scope.access_token() {
                Some(token) => self.public(method, &path).bearer_auth(token),
                None => self.service(method, &path),
            },
            Caller::Service => self.service(method, &path),
        }
    }

    // ========================================================================
    // RESPONSE HANDLING
    // ========================================================================

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        tracing::debug!("backend response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Backend {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(request: RequestBuilder) -> Result<()> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        caller: Caller<'_>,
        table: &str,
        query: Query,
    ) -> Result<Vec<T>> {
        tracing::debug!(table, ?query, "select");
        Self::send_json(self.table(caller, Method::GET, table).query(&query)).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        caller: Caller<'_>,
        table: &str,
        mut query: Query,
    ) -> Result<Option<T>> {
        query.push(("limit", "1".to_string()));
        let rows: Vec<T> = self.select(caller, table, query).await?;
        Ok(rows.into_iter().next())
    }

    async fn exists(&self, caller: Caller<'_>, table: &str, mut query: Query) -> Result<bool> {
        query.push(("select", "id".to_string()));
        let row: Option<Value> = self.select_one(caller, table, query).await?;
        Ok(row.is_some())
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        caller: Caller<'_>,
        table: &str,
        body: &Value,
    ) -> Result<T> {
        let rows: Vec<T> = Self::send_json(
            self.table(caller, Method::POST, table)
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await?;

        rows.into_iter().next().ok_or(AppError::Backend {
            status: 500,
            message: format!("insert into {} returned no row", table),
        })
    }

    /// PATCH/DELETE returning whether any row matched
    async fn modify(
        &self,
        caller: Caller<'_>,
        method: Method,
        table: &str,
        query: Query,
        body: Option<&Value>,
    ) -> Result<bool> {
        let mut request = self
            .table(caller, method, table)
            .query(&query)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }

        let rows: Vec<Value> = Self::send_json(request).await?;
        Ok(!rows.is_empty())
    }
}

/// Pull a readable message out of a PostgREST / GoTrue / Storage error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Total row count from a `Content-Range: 0-9/42` header
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse().ok()
}

// ============================================================================
// TENANT STORE
// ============================================================================

#[async_trait]
impl TenantStore for SupabaseBackend {
    // Session resolution and bootstrap run before any tenant token exists
    async fn get_church(&self, church_id: &str) -> Result<Option<Church>> {
        self.select_one(
            Caller::Service,
            "churches",
            vec![("select", "*".into()), ("id", eq(church_id))],
        )
        .await
    }

    async fn find_church_by_name(&self, name: &str) -> Result<Option<Church>> {
        self.select_one(
            Caller::Service,
            "churches",
            vec![
                ("select", "*".into()),
                ("name", eq(name)),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn insert_church(&self, name: &str) -> Result<Church> {
        self.insert(Caller::Service, "churches", &json!({ "name": name }))
            .await
    }

    async fn update_church(&self, scope: &TenantScope, settings: &ChurchSettings) -> Result<bool> {
        let body = serde_json::to_value(settings)?;
        self.modify(
            Caller::Tenant(scope),
            Method::PATCH,
            "churches",
            vec![("id", eq(scope.church_id()))],
            Some(&body),
        )
        .await
    }

    async fn set_church_logo(&self, scope: &TenantScope, logo_url: &str) -> Result<bool> {
        self.modify(
            Caller::Tenant(scope),
            Method::PATCH,
            "churches",
            vec![("id", eq(scope.church_id()))],
            Some(&json!({ "logo_url": logo_url })),
        )
        .await
    }

    // Users: profile rows are managed next to the auth admin API
    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.select_one(
            Caller::Service,
            "users",
            vec![("select", "*".into()), ("id", eq(user_id))],
        )
        .await
    }

    async fn list_users(&self, scope: &TenantScope) -> Result<Vec<UserProfile>> {
        self.select(
            Caller::Service,
            "users",
            vec![
                ("select", "*".into()),
                ("church_id", eq(scope.church_id())),
                ("order", "name.asc".into()),
            ],
        )
        .await
    }

    async fn get_user(&self, scope: &TenantScope, user_id: &str) -> Result<Option<UserProfile>> {
        self.select_one(
            Caller::Service,
            "users",
            vec![
                ("select", "*".into()),
                ("id", eq(user_id)),
                ("church_id", eq(scope.church_id())),
            ],
        )
        .await
    }

    async fn user_email_taken(&self, scope: &TenantScope, email: &str) -> Result<bool> {
        self.exists(
            Caller::Service,
            "users",
            vec![
                ("church_id", eq(scope.church_id())),
                ("email", ieq(email)),
            ],
        )
        .await
    }

    async fn insert_user(&self, profile: &UserProfile) -> Result<()> {
        let body = json!({
            "id": profile.id,
            "church_id": profile.church_id,
            "email": profile.email,
            "name": profile.name,
            "role": profile.role,
            "photo_url": profile.photo_url,
        });
        let _: Value = self.insert(Caller::Service, "users", &body).await?;
        Ok(())
    }

    async fn update_user(
        &self,
        scope: &TenantScope,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<bool> {
        let body = serde_json::to_value(update)?;
        self.modify(
            Caller::Service,
            Method::PATCH,
            "users",
            vec![("id", eq(user_id)), ("church_id", eq(scope.church_id()))],
            Some(&body),
        )
        .await
    }

    async fn delete_user(&self, scope: &TenantScope, user_id: &str) -> Result<bool> {
        self.modify(
            Caller::Service,
            Method::DELETE,
            "users",
            vec![("id", eq(user_id)), ("church_id", eq(scope.church_id()))],
            None,
        )
        .await
    }

    async fn insert_family(&self, scope: &TenantScope, name: &str) -> Result<Family> {
        self.insert(
            Caller::Tenant(scope),
            "families",
            &json!({ "church_id": scope.church_id(), "name": name }),
        )
        .await
    }

    async fn list_families(&self, scope: &TenantScope) -> Result<Vec<Family>> {
        self.select(
            Caller::Tenant(scope),
            "families",
            vec![
                ("select", "*".into()),
                ("church_id", eq(scope.church_id())),
                ("order", "name.asc".into()),
            ],
        )
        .await
    }

    async fn get_family(&self, scope: &TenantScope, family_id: &str) -> Result<Option<Family>> {
        self.select_one(
            Caller::Tenant(scope),
            "families",
            vec![
                ("select", "*".into()),
                ("id", eq(family_id)),
                ("church_id", eq(scope.church_id())),
            ],
        )
        .await
    }

    async fn list_members(&self, scope: &TenantScope) -> Result<Vec<Member>> {
        self.select(
            Caller::Tenant(scope),
            "members",
            vec![
                ("select", "*".into()),
                ("church_id", eq(scope.church_id())),
                ("order", "entry_date.desc,name.asc".into()),
            ],
        )
        .await
    }

    async fn get_member(&self, scope: &TenantScope, member_id: &str) -> Result<Option<Member>> {
        self.select_one(
            Caller::Tenant(scope),
            "members",
            vec![
                ("select", "*".into()),
                ("id", eq(member_id)),
                ("church_id", eq(scope.church_id())),
            ],
        )
        .await
    }

    async fn member_email_taken(
        &self,
        scope: &TenantScope,
        email: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        let mut query = vec![("church_id", eq(scope.church_id())), ("email", eq(email))];
        if let Some(id) = exclude_id {
            query.push(("id", format!("neq.{}", id)));
        }
        self.exists(Caller::Tenant(scope), "members", query).await
    }

    async fn insert_member(&self, scope: &TenantScope, details: &MemberDetails) -> Result<Member> {
        let mut body = serde_json::to_value(details)?;
        body["church_id"] = json!(scope.church_id());
        self.insert(Caller::Tenant(scope), "members", &body).await
    }

    async fn update_member(
        &self,
        scope: &TenantScope,
        member_id: &str,
        details: &MemberDetails,
    ) -> Result<bool> {
        let body = serde_json::to_value(details)?;
        self.modify(
            Caller::Tenant(scope),
            Method::PATCH,
            "members",
            vec![("id", eq(member_id)), ("church_id", eq(scope.church_id()))],
            Some(&body),
        )
        .await
    }

    async fn delete_member(&self, scope: &TenantScope, member_id: &str) -> Result<bool> {
        self.modify(
            Caller::Tenant(scope),
            Method::DELETE,
            "members",
            vec![("id", eq(member_id)), ("church_id", eq(scope.church_id()))],
            None,
        )
        .await
    }

    async fn count_active_members(&self, scope: &TenantScope) -> Result<u64> {
        let response = Self::check(
            self.table(Caller::Tenant(scope), Method::HEAD, "members")
                .query(&[
                    ("select", "id".to_string()),
                    ("church_id", eq(scope.church_id())),
                    ("status", eq("active")),
                ])
                .header("Prefer", "count=exact")
                .send()
                .await?,
        )
        .await?;

        let count = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .unwrap_or(0);
        Ok(count)
    }

    async fn member_names(
        &self,
        scope: &TenantScope,
        member_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if member_ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(Deserialize)]
        struct NameRow {
            id: String,
            name: String,
        }

        let rows: Vec<NameRow> = self
            .select(
                Caller::Tenant(scope),
                "members",
                vec![
                    ("select", "id,name".into()),
                    ("church_id", eq(scope.church_id())),
                    ("id", format!("in.({})", member_ids.join(","))),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| (r.id, r.name)).collect())
    }

    async fn list_transactions(
        &self,
        scope: &TenantScope,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("church_id", eq(scope.church_id())),
            ("order", "date.desc,created_at.desc".into()),
        ];
        if let Some(range) = range {
            query.push(("date", format!("gte.{}", range.from)));
            query.push(("date", format!("lte.{}", range.to)));
        }
        self.select(Caller::Tenant(scope), "transactions", query).await
    }

    async fn get_transaction(
        &self,
        scope: &TenantScope,
        tx_id: &str,
    ) -> Result<Option<Transaction>> {
        self.select_one(
            Caller::Tenant(scope),
            "transactions",
            vec![
                ("select", "*".into()),
                ("id", eq(tx_id)),
                ("church_id", eq(scope.church_id())),
            ],
        )
        .await
    }

    async fn insert_transaction(
        &self,
        scope: &TenantScope,
        draft: &TransactionDraft,
    ) -> Result<Transaction> {
        let mut body = serde_json::to_value(draft)?;
        body["church_id"] = json!(scope.church_id());
        self.insert(Caller::Tenant(scope), "transactions", &body).await
    }

    async fn update_transaction(
        &self,
        scope: &TenantScope,
        tx_id: &str,
        draft: &TransactionDraft,
    ) -> Result<bool> {
        let mut body = serde_json::to_value(draft)?;
        body["updated_at"] = json!(chrono::Utc::now().to_rfc3339());
        self.modify(
            Caller::Tenant(scope),
            Method::PATCH,
            "transactions",
            vec![("id", eq(tx_id)), ("church_id", eq(scope.church_id()))],
            Some(&body),
        )
        .await
    }

    async fn delete_transaction(&self, scope: &TenantScope, tx_id: &str) -> Result<bool> {
        self.modify(
            Caller::Tenant(scope),
            Method::DELETE,
            "transactions",
            vec![("id", eq(tx_id)), ("church_id", eq(scope.church_id()))],
            None,
        )
        .await
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        Self::send_empty(
            self.table(Caller::Service, Method::POST, "events")
                .header("Prefer", "return=minimal")
                .json(event),
        )
        .await
    }
}

// ============================================================================
// AUTH PROVIDER
// ============================================================================

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AuthUser>,
}

/// Sign-up answers with a bare user, or with `{ user, session }` when a
/// session is issued right away.
fn user_from_signup(value: Value) -> Result<AuthUser> {
    let user = match value.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => value,
    };
    Ok(serde_json::from_value(user)?)
}

fn auth_failure(err: AppError) -> AppError {
    match err {
        AppError::Backend { status, message } if (400..500).contains(&status) => {
            AppError::Auth { message }
        }
        other => other,
    }
}

#[async_trait]
impl AuthProvider for SupabaseBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        Self::send_json(
            self.public(Method::POST, "/auth/v1/token")
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await
        .map_err(auth_failure)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let value: Value = Self::send_json(
            self.public(Method::POST, "/auth/v1/signup")
                .json(&json!({ "email": email, "password": password })),
        )
        .await
        .map_err(auth_failure)?;
        user_from_signup(value)
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let response = self
            .public(Method::GET, "/auth/v1/user")
            .bearer_auth(access_token)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        Self::send_empty(
            self.public(Method::POST, "/auth/v1/logout")
                .bearer_auth(access_token),
        )
        .await
    }

    async fn admin_create_user(&self, user: &NewAuthUser) -> Result<AuthUser> {
        Self::send_json(self.service(Method::POST, "/auth/v1/admin/users").json(user))
            .await
            .map_err(auth_failure)
    }

    async fn admin_list_users(&self, page: u32, per_page: u32) -> Result<Vec<AuthUser>> {
        let list: UserList = Self::send_json(
            self.service(Method::GET, "/auth/v1/admin/users")
                .query(&[("page", page), ("per_page", per_page)]),
        )
        .await?;
        Ok(list.users)
    }

    async fn admin_update_user(&self, user_id: &str, update: &AuthUserUpdate) -> Result<()> {
        Self::send_empty(
            self.service(Method::PUT, &format!("/auth/v1/admin/users/{}", user_id))
                .json(update),
        )
        .await
        .map_err(auth_failure)
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<()> {
        Self::send_empty(
            self.service(Method::DELETE, &format!("/auth/v1/admin/users/{}", user_id)),
        )
        .await
        .map_err(auth_failure)
    }
}

// ============================================================================
// OBJECT STORAGE
// ============================================================================

#[async_trait]
impl ObjectStorage for SupabaseBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        Self::send_empty(
            self.service(Method::POST, &format!("/storage/v1/object/{}/{}", bucket, path))
                .header("content-type", content_type)
                .header("x-upsert", upsert.to_string())
                .body(bytes.to_vec()),
        )
        .await
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Option<StoredObject>> {
        let response = self
            .service(Method::GET, &format!("/storage/v1/object/{}/{}", bucket, path))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(StoredObject { content_type, bytes }))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(&self.base_url, bucket, path)
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        Self::send_json(self.service(Method::GET, "/storage/v1/bucket")).await
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<()> {
        Self::send_empty(self.service(Method::POST, "/storage/v1/bucket").json(&json!({
            "id": spec.name,
            "name": spec.name,
            "public": spec.public,
            "file_size_limit": spec.file_size_limit,
            "allowed_mime_types": spec.allowed_mime_types,
        })))
        .await
    }

    async fn update_bucket(&self, name: &str, public: bool) -> Result<()> {
        Self::send_empty(
            self.service(Method::PUT, &format!("/storage/v1/bucket/{}", name))
                .json(&json!({ "id": name, "name": name, "public": public })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    fn backend(server: &MockServer) -> SupabaseBackend {
        SupabaseBackend::new(&server.base_url(), "anon-key", "service-key").unwrap()
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }

    #[test]
    fn test_error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(error_message(r#"{"msg":"Invalid login"}"#), "Invalid login");
        assert_eq!(error_message("plain"), "plain");
    }

    #[tokio::test]
    async fn test_list_transactions_filters_by_church_and_range() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/transactions")
                .header("apikey", "service-key")
                .query_param("church_id", "eq.c1")
                .query_param("date", "gte.2024-01-01")
                .query_param("date", "lte.2024-12-31");
            then.status(200).json_body(json!([{
                "id": "t1",
                "church_id": "c1",
                "type": "income",
                "category": "Dizimo",
                "amount": 150.0,
                "date": "2024-03-10",
                "description": "",
                "member_id": null,
                "created_at": "2024-03-10T12:00:00+00:00"
            }]));
        });

        let range = DateRange {
            from: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        let txs = backend(&server)
            .list_transactions(&TenantScope::new("c1"), Some(range))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 150.0);
    }

    #[tokio::test]
    async fn test_tenant_tables_use_session_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/members")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer user-jwt")
                .query_param("church_id", "eq.c1");
            then.status(200).json_body(json!([]));
        });

        let scope = TenantScope::new("c1").with_access_token("user-jwt");
        let members = backend(&server).list_members(&scope).await.unwrap();

        mock.assert();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn test_users_table_keeps_service_role() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/users")
                .header("apikey", "service-key")
                .header("authorization", "Bearer service-key")
                .query_param("church_id", "eq.c1")
                .query_param("email", "ilike.maria\\_silva@x.org");
            then.status(200).json_body(json!([{"id": "u1"}]));
        });

        let scope = TenantScope::new("c1").with_access_token("user-jwt");
        let taken = backend(&server)
            .user_email_taken(&scope, "maria_silva@x.org")
            .await
            .unwrap();

        mock.assert();
        assert!(taken);
    }

    #[tokio::test]
    async fn test_get_family_filters_by_church() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/families")
                .query_param("id", "eq.f1")
                .query_param("church_id", "eq.c2");
            then.status(200).json_body(json!([]));
        });

        let family = backend(&server)
            .get_family(&TenantScope::new("c2"), "f1")
            .await
            .unwrap();

        mock.assert();
        assert!(family.is_none());
    }

    #[test]
    fn test_ieq_escapes_wildcards() {
        assert_eq!(ieq("Ana@x.org"), "ilike.Ana@x.org");
        assert_eq!(ieq("a_b%c"), "ilike.a\\_b\\%c");
    }

    #[tokio::test]
    async fn test_delete_reports_no_match() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/transactions")
                .query_param("id", "eq.t9")
                .query_param("church_id", "eq.c2");
            then.status(200).json_body(json!([]));
        });

        let deleted = backend(&server)
            .delete_transaction(&TenantScope::new("c2"), "t9")
            .await
            .unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_count_active_members_reads_content_range() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD)
                .path("/rest/v1/members")
                .query_param("status", "eq.active");
            then.status(200).header("content-range", "0-0/17");
        });

        let count = backend(&server)
            .count_active_members(&TenantScope::new("c1"))
            .await
            .unwrap();
        assert_eq!(count, 17);
    }

    #[tokio::test]
    async fn test_sign_in_failure_maps_to_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password")
                .header("apikey", "anon-key");
            then.status(400)
                .json_body(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}));
        });

        let err = backend(&server)
            .sign_in_with_password("a@b.com", "wrong")
            .await
            .unwrap_err();
        match err {
            AppError::Auth { message } => assert_eq!(message, "Invalid login credentials"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_user_with_expired_token_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/auth/v1/user");
            then.status(401).json_body(json!({"msg": "invalid JWT"}));
        });

        let user = AuthProvider::get_user(&backend(&server), "expired")
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_upload_sends_upsert_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/logos/1700000000000.png")
                .header("x-upsert", "true")
                .header("content-type", "image/png");
            then.status(200).json_body(json!({"Key": "logos/1700000000000.png"}));
        });

        let backend = backend(&server);
        backend
            .upload("logos", "1700000000000.png", b"png", "image/png", true)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(
            backend.public_url("logos", "1700000000000.png"),
            format!(
                "{}/storage/v1/object/public/logos/1700000000000.png",
                server.base_url()
            )
        );
    }

    #[test]
    fn test_signup_response_shapes() {
        let bare = user_from_signup(json!({"id": "u1", "email": "a@b.com"})).unwrap();
        assert_eq!(bare.id, "u1");
        let wrapped =
            user_from_signup(json!({"user": {"id": "u2"}, "session": null})).unwrap();
        assert_eq!(wrapped.id, "u2");
    }
}

// 🌱 Bootstrap - seed an admin account and its church
//
// Idempotent: every step first looks for what it would create.

use super::LOGOS_BUCKET;
use crate::actions::settings::{LOGO_MIME_TYPES, MAX_LOGO_BYTES};
use crate::backend::{Backend, BucketSpec, NewAuthUser};
use crate::entities::{Role, UserProfile};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMAIL: &str = "admin@admin.com";
pub const DEFAULT_PASSWORD: &str = "admin123456";
pub const DEFAULT_CHURCH: &str = "Igreja Matriz";
const ADMIN_NAME: &str = "Admin";
const USER_LIST_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BootstrapParams {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub church: Option<String>,
}

impl BootstrapParams {
    pub fn email(&self) -> String {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EMAIL)
            .to_lowercase()
    }

    pub fn password(&self) -> &str {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PASSWORD)
    }

    pub fn church(&self) -> &str {
        self.church
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CHURCH)
    }
}

/// When the token check applies and what it must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapPolicy {
    pub production: bool,
    pub expected_token: Option<String>,
}

impl BootstrapPolicy {
    pub fn allows(&self, token: Option<&str>) -> bool {
        if !self.production {
            return true;
        }
        match (&self.expected_token, token) {
            (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub ok: bool,
    pub email: String,
    pub church_id: String,
    pub user_id: String,
    pub note: String,
}

/// Make sure the public logos bucket exists. Errors are only logged.
async fn ensure_logos_bucket(backend: &Backend) {
    let buckets = match backend.storage.list_buckets().await {
        Ok(buckets) => buckets,
        Err(e) => {
            tracing::error!("error checking buckets: {}", e);
            return;
        }
    };

    let result = match buckets.iter().find(|b| b.name == LOGOS_BUCKET) {
        None => {
            backend
                .storage
                .create_bucket(&BucketSpec {
                    name: LOGOS_BUCKET.to_string(),
                    public: true,
                    file_size_limit: Some(MAX_LOGO_BYTES as u64),
                    allowed_mime_types: LOGO_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
                })
                .await
        }
        Some(bucket) if !bucket.public => backend.storage.update_bucket(LOGOS_BUCKET, true).await,
        Some(_) => Ok(()),
    };

    if let Err(e) = result {
        tracing::error!("error creating logos bucket: {}", e);
    }
}

async fn find_or_create_admin(backend: &Backend, email: &str, password: &str) -> Result<String> {
    match backend.auth.admin_list_users(1, USER_LIST_PAGE_SIZE).await {
        Ok(users) => {
            let existing = users.into_iter().find(|u| {
                u.email
                    .as_deref()
                    .map(|e| e.to_lowercase() == email)
                    .unwrap_or(false)
            });
            if let Some(user) = existing {
                tracing::debug!(user_id = %user.id, "bootstrap admin already exists");
                return Ok(user.id);
            }
        }
        // fall through to creation
        Err(e) => tracing::warn!("could not list auth users: {}", e),
    }

    let created = backend
        .auth
        .admin_create_user(&NewAuthUser {
            email: email.to_string(),
            password: password.to_string(),
            email_confirm: true,
            user_metadata: serde_json::json!({ "role": Role::Admin, "name": ADMIN_NAME }),
        })
        .await?;

    if created.id.is_empty() {
        return Err(AppError::auth("Falha ao obter ID do usuário criado"));
    }
    tracing::info!(user_id = %created.id, "bootstrap admin created");
    Ok(created.id)
}

/// Seed admin user, church and the link between them
pub async fn bootstrap(backend: &Backend, params: &BootstrapParams) -> Result<BootstrapReport> {
    let email = params.email();

    ensure_logos_bucket(backend).await;

    let user_id = find_or_create_admin(backend, &email, params.password()).await?;

    let church_id = match backend.store.find_church_by_name(params.church()).await? {
        Some(church) => church.id,
        None => {
            let church = backend.store.insert_church(params.church()).await?;
            tracing::info!(church_id = %church.id, "bootstrap church created");
            church.id
        }
    };

    if backend.store.get_user_profile(&user_id).await?.is_none() {
        backend
            .store
            .insert_user(&UserProfile {
                id: user_id.clone(),
                church_id: church_id.clone(),
                email: email.clone(),
                name: ADMIN_NAME.to_string(),
                role: Role::Admin,
                photo_url: None,
                created_at: None,
            })
            .await?;
    }

    Ok(BootstrapReport {
        ok: true,
        email,
        church_id,
        user_id,
        note: "Admin seed verificado/criado com sucesso".to_string(),
    })
}

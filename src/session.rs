// 🔐 Session - who is calling and which church they act for
//
// access token → auth user → users row → churches row.
// Any missing link means "no session" and the caller is sent to /login.

use crate::backend::{Backend, TenantScope};
use crate::entities::{Church, Role, UserProfile};
use crate::error::Result;
use serde::Serialize;

/// Cookie holding the auth access token
pub const SESSION_COOKIE: &str = "sb-access-token";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUser {
    pub profile: UserProfile,
    pub church: Church,
    /// Token the session was resolved from
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl CurrentUser {
    /// Scope for every tenant read and write made on behalf of this user
    pub fn scope(&self) -> TenantScope {
        let scope = TenantScope::new(self.church.id.as_str());
        match &self.access_token {
            Some(token) => scope.with_access_token(token.as_str()),
            None => scope,
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn can_access(&self, page: Page) -> bool {
        page.is_public() || self.role().has_permission(page.allowed_roles())
    }

    /// Navigation entries visible to this user, in menu order
    pub fn navigation(&self) -> Vec<NavItem> {
        Page::NAVIGATION
            .iter()
            .filter(|p| self.can_access(**p))
            .map(|p| NavItem {
                label: p.title(),
                href: p.path(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
}

// ============================================================================
// PAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Login,
    Register,
    Dashboard,
    Members,
    Transactions,
    QuickEntry,
    Users,
    Settings,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Treasurer, Role::Member];
const FINANCE_ROLES: &[Role] = &[Role::Admin, Role::Treasurer];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl Page {
    pub const NAVIGATION: [Page; 6] = [
        Page::Dashboard,
        Page::Members,
        Page::Transactions,
        Page::QuickEntry,
        Page::Users,
        Page::Settings,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Page::Login => "/login",
            Page::Register => "/register",
            Page::Dashboard => "/dashboard",
            Page::Members => "/dashboard/members",
            Page::Transactions => "/dashboard/transactions",
            Page::QuickEntry => "/dashboard/quick-entry",
            Page::Users => "/dashboard/users",
            Page::Settings => "/dashboard/settings",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Login => "Entrar",
            Page::Register => "Criar conta",
            Page::Dashboard => "Dashboard",
            Page::Members => "Membros",
            Page::Transactions => "Transações",
            Page::QuickEntry => "Lançamento Rápido",
            Page::Users => "Usuários",
            Page::Settings => "Configurações",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Page::Login | Page::Register)
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Page::Login | Page::Register => ALL_ROLES,
            Page::Dashboard => ALL_ROLES,
            Page::Members | Page::Transactions | Page::QuickEntry => FINANCE_ROLES,
            Page::Users | Page::Settings => ADMIN_ONLY,
        }
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Resolve an access token into the calling user and their church.
///
/// Backend failures are logged and treated as "no session".
pub async fn resolve(backend: &Backend, access_token: &str) -> Result<Option<CurrentUser>> {
    if access_token.trim().is_empty() {
        return Ok(None);
    }

    let auth_user = match backend.auth.get_user(access_token).await {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(None),
        Err(e) => {
            tracing::error!("error getting user: {}", e);
            return Ok(None);
        }
    };

    let profile = match backend.store.get_user_profile(&auth_user.id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(user_id = %auth_user.id, "authenticated user has no profile row");
            return Ok(None);
        }
        Err(e) => {
            tracing::error!("error getting user with church: {}", e);
            return Ok(None);
        }
    };

    let church = match backend.store.get_church(&profile.church_id).await {
        Ok(Some(church)) => church,
        Ok(None) => {
            tracing::warn!(church_id = %profile.church_id, "profile points to a missing church");
            return Ok(None);
        }
        Err(e) => {
            tracing::error!("error getting user with church: {}", e);
            return Ok(None);
        }
    };

    Ok(Some(CurrentUser {
        profile,
        church,
        access_token: Some(access_token.to_string()),
    }))
}

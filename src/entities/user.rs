// 👤 User - a login belonging to exactly one church
//
// The authentication identity lives in the auth service; this is the profile
// row in the tenant database. Both share the same id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Treasurer,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Treasurer => "treasurer",
            Role::Member => "member",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim() {
            "admin" => Some(Role::Admin),
            "treasurer" => Some(Role::Treasurer),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::Treasurer => "Tesoureiro",
            Role::Member => "Membro",
        }
    }

    pub fn has_permission(&self, required: &[Role]) -> bool {
        required.contains(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub church_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields an admin may change on an existing user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    pub role: Role,
    pub photo_url: Option<String>,
}

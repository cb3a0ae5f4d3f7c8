// 🙋 Member & Family - congregation records
//
// A member belongs to one church and optionally to one family of that church.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POSITION: &str = "Membro";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }

    /// Unknown or empty values fall back to `Active`.
    pub fn parse_or_default(raw: &str) -> MemberStatus {
        match raw.trim() {
            "inactive" => MemberStatus::Inactive,
            _ => MemberStatus::Active,
        }
    }
}

// ============================================================================
// MEMBER
// ============================================================================

/// Everything the member form edits. Shared by insert and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDetails {
    // Basic
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,

    // Address
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,

    // Ecclesiastical
    pub position: String,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub baptism_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MemberStatus,

    // Family
    #[serde(default)]
    pub spouse_name: Option<String>,
    #[serde(default)]
    pub children_names: Vec<String>,
    #[serde(default)]
    pub family_id: Option<String>,
}

impl MemberDetails {
    /// Minimal record with form defaults applied
    pub fn new(name: &str, entry_date: NaiveDate) -> Self {
        MemberDetails {
            name: name.to_string(),
            email: None,
            phone: None,
            birth_date: None,
            profession: None,
            cpf: None,
            photo_url: None,
            address: None,
            neighborhood: None,
            city: None,
            state: None,
            zip_code: None,
            position: DEFAULT_POSITION.to_string(),
            entry_date,
            baptism_date: None,
            status: MemberStatus::Active,
            spouse_name: None,
            children_names: Vec::new(),
            family_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub church_id: String,
    #[serde(flatten)]
    pub details: MemberDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.details.status == MemberStatus::Active
    }

    /// True when the birthday falls in the given month (1-12)
    pub fn has_birthday_in(&self, month: u32) -> bool {
        self.details
            .birth_date
            .map(|d| d.month() == month)
            .unwrap_or(false)
    }
}

// ============================================================================
// FAMILY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: String,
    pub church_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_json_is_flat() {
        let entry = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut details = MemberDetails::new("Maria", entry);
        details.children_names = vec!["Ana".to_string()];
        let member = Member {
            id: "m1".to_string(),
            church_id: "c1".to_string(),
            details,
            created_at: None,
        };

        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["name"], "Maria");
        assert_eq!(json["entry_date"], "2024-03-10");
        assert_eq!(json["position"], "Membro");
        assert_eq!(json["status"], "active");
        assert_eq!(json["children_names"][0], "Ana");

        let back: Member = serde_json::from_value(json).unwrap();
        assert_eq!(back, member);
    }

    #[test]
    fn test_birthday_month() {
        let entry = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut details = MemberDetails::new("João", entry);
        details.birth_date = NaiveDate::from_ymd_opt(1990, 7, 21);
        let member = Member {
            id: "m1".to_string(),
            church_id: "c1".to_string(),
            details,
            created_at: None,
        };

        assert!(member.has_birthday_in(7));
        assert!(!member.has_birthday_in(8));
    }

    #[test]
    fn test_status_defaults_to_active() {
        assert_eq!(MemberStatus::parse_or_default(""), MemberStatus::Active);
        assert_eq!(MemberStatus::parse_or_default("inactive"), MemberStatus::Inactive);
        assert_eq!(MemberStatus::parse_or_default("gone"), MemberStatus::Active);
    }
}

// ⛪ Church - the tenant root
// Every other row carries the church id it belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIMARY_COLOR: &str = "#3B82F6";
pub const DEFAULT_SECONDARY_COLOR: &str = "#10B981";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Church {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Church {
    pub fn primary_color(&self) -> &str {
        non_empty(self.primary_color.as_deref()).unwrap_or(DEFAULT_PRIMARY_COLOR)
    }

    pub fn secondary_color(&self) -> &str {
        non_empty(self.secondary_color.as_deref()).unwrap_or(DEFAULT_SECONDARY_COLOR)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Editable church fields, as submitted by the settings form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChurchSettings {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub primary_color: String,
    pub secondary_color: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_fall_back_to_defaults() {
        let church: Church =
            serde_json::from_value(serde_json::json!({"id": "c1", "name": "Igreja"})).unwrap();
        assert_eq!(church.primary_color(), DEFAULT_PRIMARY_COLOR);
        assert_eq!(church.secondary_color(), DEFAULT_SECONDARY_COLOR);

        let church = Church {
            primary_color: Some("#000000".to_string()),
            secondary_color: Some(String::new()),
            ..church
        };
        assert_eq!(church.primary_color(), "#000000");
        assert_eq!(church.secondary_color(), DEFAULT_SECONDARY_COLOR);
    }
}

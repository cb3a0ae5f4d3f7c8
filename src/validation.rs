// 📐 Validation - field rules for submitted forms
// Each check maps a bad field to the ErrorCode the redirect carries.

use crate::entities::{Category, TransactionDraft, TransactionType};
use crate::error::ErrorCode;
use crate::form::FormData;
use chrono::NaiveDate;

pub const MIN_PASSWORD_LEN: usize = 6;

pub type ValidationResult<T> = std::result::Result<T, ErrorCode>;

// ============================================================================
// SCALARS
// ============================================================================

/// Decimal amount. A comma is accepted as decimal separator when the value
/// has no dot ("12,50").
pub fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = if raw.contains(',') && !raw.contains('.') {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// ISO date (YYYY-MM-DD)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Blank means "not set"; an unparseable value is dropped as well
pub fn parse_optional_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(parse_date)
}

/// Member selectors submit "" or "none" for "no member"
pub fn optional_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty() && *v != "none" && *v != "null")
        .map(str::to_string)
}

pub fn is_hex_color(raw: &str) -> bool {
    let raw = raw.trim();
    raw.len() == 7
        && raw.starts_with('#')
        && raw[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Children are submitted as a JSON array of names. Malformed input is an
/// empty list.
pub fn parse_children_names(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(names) => names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect(),
        Err(e) => {
            tracing::debug!("ignoring malformed children_names: {}", e);
            Vec::new()
        }
    }
}

// ============================================================================
// PASSWORDS
// ============================================================================

/// User management order: length first, then confirmation
pub fn validate_password(password: &str, confirm: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ErrorCode::PasswordLength);
    }
    if password != confirm {
        return Err(ErrorCode::PasswordMismatch);
    }
    Ok(())
}

/// Sign-up form order: confirmation first, then length
pub fn validate_registration_password(password: &str, confirm: &str) -> ValidationResult<()> {
    if password != confirm {
        return Err(ErrorCode::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ErrorCode::PasswordLength);
    }
    Ok(())
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Raw transaction fields as submitted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionInput {
    pub kind: Option<String>,
    pub category: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub member_id: Option<String>,
}

impl TransactionInput {
    pub fn from_form(form: &FormData) -> Self {
        TransactionInput {
            kind: form.text("type"),
            category: form.text("category"),
            amount: form.text("amount"),
            date: form.text("date"),
            description: form.text("description"),
            member_id: optional_id(form.get("member_id")),
        }
    }
}

/// Checks, in order: amount ≠ 0, date, category, type
pub fn validate_transaction(input: &TransactionInput) -> ValidationResult<TransactionDraft> {
    let amount = input
        .amount
        .as_deref()
        .and_then(parse_amount)
        .filter(|a| *a != 0.0)
        .ok_or(ErrorCode::InvalidAmount)?;

    let date = input
        .date
        .as_deref()
        .and_then(parse_date)
        .ok_or(ErrorCode::InvalidDate)?;

    let category = input
        .category
        .as_deref()
        .and_then(Category::parse)
        .ok_or(ErrorCode::InvalidCategory)?;

    let kind = input
        .kind
        .as_deref()
        .and_then(TransactionType::parse)
        .ok_or(ErrorCode::InvalidType)?;

    Ok(TransactionDraft {
        kind,
        category,
        amount,
        date,
        description: input.description.clone().unwrap_or_default(),
        member_id: input.member_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> TransactionInput {
        TransactionInput {
            kind: Some("income".to_string()),
            category: Some("Dizimo".to_string()),
            amount: Some("150,50".to_string()),
            date: Some("2024-06-09".to_string()),
            description: None,
            member_id: None,
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12.5"), Some(12.5));
        assert_eq!(parse_amount(" 12,5 "), Some(12.5));
        assert_eq!(parse_amount("-3"), Some(-3.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn test_valid_transaction() {
        let draft = validate_transaction(&valid_input()).unwrap();
        assert_eq!(draft.amount, 150.5);
        assert_eq!(draft.category, Category::Dizimo);
        assert_eq!(draft.kind, TransactionType::Income);
        assert_eq!(draft.description, "");
    }

    #[test]
    fn test_zero_amount_rejected() {
        let input = TransactionInput {
            amount: Some("0".to_string()),
            ..valid_input()
        };
        assert_eq!(validate_transaction(&input), Err(ErrorCode::InvalidAmount));

        let input = TransactionInput {
            amount: None,
            ..valid_input()
        };
        assert_eq!(validate_transaction(&input), Err(ErrorCode::InvalidAmount));
    }

    #[test]
    fn test_field_errors_in_order() {
        let input = TransactionInput {
            date: Some("09/06/2024".to_string()),
            category: Some("Geral".to_string()),
            ..valid_input()
        };
        assert_eq!(validate_transaction(&input), Err(ErrorCode::InvalidDate));

        let input = TransactionInput {
            category: Some("Geral".to_string()),
            ..valid_input()
        };
        assert_eq!(validate_transaction(&input), Err(ErrorCode::InvalidCategory));

        let input = TransactionInput {
            kind: Some("transfer".to_string()),
            ..valid_input()
        };
        assert_eq!(validate_transaction(&input), Err(ErrorCode::InvalidType));
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(validate_password("12345", "12345"), Err(ErrorCode::PasswordLength));
        assert_eq!(validate_password("12345", "54321"), Err(ErrorCode::PasswordLength));
        assert_eq!(validate_password("123456", "123457"), Err(ErrorCode::PasswordMismatch));
        assert_eq!(validate_password("123456", "123456"), Ok(()));

        assert_eq!(
            validate_registration_password("12345", "54321"),
            Err(ErrorCode::PasswordMismatch)
        );
        assert_eq!(
            validate_registration_password("12345", "12345"),
            Err(ErrorCode::PasswordLength)
        );
        assert_eq!(validate_registration_password("123456", "123456"), Ok(()));
    }

    #[test]
    fn test_children_names() {
        assert_eq!(
            parse_children_names(Some(r#"["Ana", " ", "Davi "]"#)),
            vec!["Ana".to_string(), "Davi".to_string()]
        );
        assert!(parse_children_names(Some("[not json")).is_empty());
        assert!(parse_children_names(None).is_empty());
    }

    #[test]
    fn test_hex_color_and_ids() {
        assert!(is_hex_color("#3B82F6"));
        assert!(!is_hex_color("3B82F6"));
        assert!(!is_hex_color("#3B82F"));
        assert!(!is_hex_color("#GGGGGG"));
        assert_eq!(optional_id(Some("none")), None);
        assert_eq!(optional_id(Some(" m1 ")), Some("m1".to_string()));
        assert_eq!(parse_optional_date(Some("")), None);
    }
}

// 💰 Transaction - one income or expense entry of a church

use super::category::{Category, TransactionType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stored transaction row
///
/// `category` is kept as text: rows written before the category list was
/// enforced may hold values outside [`Category`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub church_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }

    /// Ordering key for "most recent": created_at, falling back to the
    /// transaction date at midnight.
    pub fn recency_key(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_else(|| {
            self.date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_default()
        })
    }
}

/// Validated write model for insert and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Category,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub member_id: Option<String>,
}

/// Transaction joined with the linked member's name, as listed on pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub member_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_reads_type_column() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "church_id": "c1",
            "type": "expense",
            "category": "Geral",
            "amount": 12.5,
            "date": "2024-05-02",
            "description": "legacy row",
            "member_id": null
        }))
        .unwrap();

        assert!(tx.is_expense());
        assert_eq!(tx.category, "Geral");
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }

    #[test]
    fn test_recency_falls_back_to_date() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "church_id": "c1",
            "type": "income",
            "category": "Oferta",
            "amount": 10.0,
            "date": "2024-05-02"
        }))
        .unwrap();

        assert_eq!(tx.recency_key().to_rfc3339(), "2024-05-02T00:00:00+00:00");
    }
}

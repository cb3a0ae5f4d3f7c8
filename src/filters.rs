// 🔎 Filters - list narrowing for the transactions, members and users pages
//
// Filters are parsed from the page query string and applied in memory to the
// tenant's rows.

use crate::dashboard::Totals;
use crate::entities::{Member, TransactionType, TransactionView, UserProfile};
use crate::validation::parse_date;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    #[default]
    All,
    Income,
    Expense,
}

impl TypeFilter {
    /// Anything other than income/expense means all
    pub fn parse(raw: Option<&str>) -> TypeFilter {
        match raw.map(str::trim) {
            Some("income") => TypeFilter::Income,
            Some("expense") => TypeFilter::Expense,
            _ => TypeFilter::All,
        }
    }

    pub fn matches(&self, kind: TransactionType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Income => kind == TransactionType::Income,
            TypeFilter::Expense => kind == TransactionType::Expense,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub kind: TypeFilter,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub search: Option<String>,
}

impl TransactionFilter {
    /// Query keys: type, start, end, search. Unparseable dates are ignored.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let date = |key: &str| query.get(key).and_then(|v| parse_date(v));
        TransactionFilter {
            kind: TypeFilter::parse(query.get("type").map(String::as_str)),
            start: date("start"),
            end: date("end"),
            search: query
                .get("search")
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn matches(&self, view: &TransactionView) -> bool {
        let t = &view.transaction;
        if !self.kind.matches(t.kind) {
            return false;
        }
        if self.start.map(|start| t.date < start).unwrap_or(false) {
            return false;
        }
        if self.end.map(|end| t.date > end).unwrap_or(false) {
            return false;
        }

        match &self.search {
            None => true,
            Some(needle) => {
                t.description.to_lowercase().contains(needle)
                    || t.category.to_lowercase().contains(needle)
                    || view
                        .member_name
                        .as_ref()
                        .map(|n| n.to_lowercase().contains(needle))
                        .unwrap_or(false)
            }
        }
    }

    pub fn apply(&self, views: Vec<TransactionView>) -> Vec<TransactionView> {
        views.into_iter().filter(|v| self.matches(v)).collect()
    }
}

pub fn totals_of(views: &[TransactionView]) -> Totals {
    Totals::of(views.iter().map(|v| &v.transaction))
}

/// Newest first; ties keep their incoming order
pub fn sort_by_date_desc(views: &mut [TransactionView]) {
    views.sort_by(|a, b| b.transaction.date.cmp(&a.transaction.date));
}

// ============================================================================
// MEMBERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberFilter {
    #[default]
    All,
    Birthdays,
}

impl MemberFilter {
    pub fn parse(raw: Option<&str>) -> MemberFilter {
        match raw.map(str::trim) {
            Some("birthdays") => MemberFilter::Birthdays,
            _ => MemberFilter::All,
        }
    }
}

/// Ordered by entry date, newest first. `Birthdays` keeps members born in
/// the month of `today`.
pub fn filter_members(mut members: Vec<Member>, filter: MemberFilter, today: NaiveDate) -> Vec<Member> {
    use chrono::Datelike;

    if filter == MemberFilter::Birthdays {
        members.retain(|m| m.has_birthday_in(today.month()));
    }
    members.sort_by(|a, b| b.details.entry_date.cmp(&a.details.entry_date));
    members
}

// ============================================================================
// USERS
// ============================================================================

pub fn sort_users(mut users: Vec<UserProfile>) -> Vec<UserProfile> {
    users.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    users
}

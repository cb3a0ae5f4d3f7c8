// 📊 Dashboard - monthly totals, trends and chart series
//
// All aggregation happens in memory over one fetch of the church's
// transactions for the year (widened to cover the six chart months).

use crate::backend::{Backend, DateRange, TenantScope};
use crate::entities::{Category, Transaction, TransactionView};
use crate::error::Result;
use crate::session::CurrentUser;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

pub const CHART_MONTHS: u32 = 6;
pub const RECENT_LIMIT: usize = 5;
pub const LOW_BALANCE_THRESHOLD: f64 = 1000.0;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Portuguese short month name for 1-12
pub fn month_abbreviation(month: u32) -> &'static str {
    MONTH_ABBREVIATIONS[((month.clamp(1, 12)) - 1) as usize]
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl Totals {
    pub fn of<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let (income, expense) = transactions
            .into_iter()
            .fold((0.0, 0.0), |(income, expense), t| {
                if t.is_income() {
                    (income + t.amount, expense)
                } else {
                    (income, expense + t.amount)
                }
            });
        Totals {
            income,
            expense,
            balance: income - expense,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Trends {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub month: String,
    pub year: i32,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownItem {
    pub category: Category,
    pub label: &'static str,
    pub total: f64,
    pub count: usize,
}

/// Everything derivable from the transaction list alone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub current: Totals,
    pub previous: Totals,
    pub trends: Trends,
    pub year_balance: f64,
    pub chart: Vec<ChartPoint>,
    pub recent: Vec<Transaction>,
    pub income_breakdown: Vec<BreakdownItem>,
    pub low_balance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    #[serde(flatten)]
    pub summary: DashboardSummary,
    pub recent_transactions: Vec<TransactionView>,
    pub members_count: u64,
}

// ============================================================================
// AGGREGATION
// ============================================================================

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn in_month(t: &Transaction, year: i32, month: u32) -> bool {
    t.date.year() == year && t.date.month() == month
}

fn months_back(date: NaiveDate, n: u32) -> NaiveDate {
    first_of_month(date)
        .checked_sub_months(Months::new(n))
        .unwrap_or(date)
}

/// Dates fetched for the dashboard: Jan 1 of the current year (or the first
/// chart month when that is earlier) through Dec 31.
pub fn fetch_window(today: NaiveDate) -> DateRange {
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let chart_start = months_back(today, CHART_MONTHS - 1);
    DateRange {
        from: year_start.min(chart_start),
        to: NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
    }
}

/// Percent change; 0 when there is nothing to compare against
fn trend(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

fn balance_trend(current: f64, previous: f64) -> f64 {
    if previous != 0.0 {
        (current - previous) / previous.abs() * 100.0
    } else {
        0.0
    }
}

pub fn summarize(transactions: &[Transaction], today: NaiveDate) -> DashboardSummary {
    let (year, month) = (today.year(), today.month());
    let previous_month = months_back(today, 1);

    let current = Totals::of(transactions.iter().filter(|t| in_month(t, year, month)));
    let previous = Totals::of(
        transactions
            .iter()
            .filter(|t| in_month(t, previous_month.year(), previous_month.month())),
    );
    let year_balance = Totals::of(transactions.iter().filter(|t| t.date.year() == year)).balance;

    let trends = Trends {
        income: trend(current.income, previous.income),
        expense: trend(current.expense, previous.expense),
        balance: balance_trend(current.balance, previous.balance),
    };

    let chart = (0..CHART_MONTHS)
        .rev()
        .map(|i| {
            let start = months_back(today, i);
            let totals = Totals::of(
                transactions
                    .iter()
                    .filter(|t| in_month(t, start.year(), start.month())),
            );
            ChartPoint {
                month: month_abbreviation(start.month()).to_string(),
                year: start.year(),
                income: totals.income,
                expense: totals.expense,
            }
        })
        .collect();

    let mut recent = transactions.to_vec();
    recent.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
    recent.truncate(RECENT_LIMIT);

    let income_breakdown = Category::breakdown()
        .into_iter()
        .map(|category| {
            let matching: Vec<&Transaction> = transactions
                .iter()
                .filter(|t| in_month(t, year, month) && t.is_income())
                .filter(|t| t.category == category.as_str())
                .collect();
            BreakdownItem {
                category,
                label: category.breakdown_label(),
                total: matching.iter().map(|t| t.amount).sum(),
                count: matching.len(),
            }
        })
        .collect();

    DashboardSummary {
        current,
        previous,
        trends,
        year_balance,
        chart,
        recent,
        income_breakdown,
        low_balance: current.balance < LOW_BALANCE_THRESHOLD,
    }
}

/// Attach member names to transactions, one lookup for all of them
pub async fn with_member_names(
    backend: &Backend,
    scope: &TenantScope,
    transactions: Vec<Transaction>,
) -> Result<Vec<TransactionView>> {
    let mut ids: Vec<String> = transactions
        .iter()
        .filter_map(|t| t.member_id.clone())
        .collect();
    ids.sort();
    ids.dedup();

    let names = backend.store.member_names(scope, &ids).await?;
    Ok(transactions
        .into_iter()
        .map(|t| {
            let member_name = t.member_id.as_ref().and_then(|id| names.get(id).cloned());
            TransactionView {
                transaction: t,
                member_name,
            }
        })
        .collect())
}

pub async fn load_dashboard(
    backend: &Backend,
    user: &CurrentUser,
    today: NaiveDate,
) -> Result<DashboardData> {
    let scope = user.scope();
    let window = fetch_window(today);
    let transactions = backend.store.list_transactions(&scope, Some(window)).await?;
    tracing::debug!(count = transactions.len(), from = %window.from, "dashboard transactions loaded");

    let summary = summarize(&transactions, today);
    let recent_transactions = with_member_names(backend, &scope, summary.recent.clone()).await?;
    let members_count = backend.store.count_active_members(&scope).await?;

    Ok(DashboardData {
        summary,
        recent_transactions,
        members_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TransactionType;

    fn tx(kind: TransactionType, category: &str, amount: f64, date: &str) -> Transaction {
        Transaction {
            id: format!("{}-{}-{}", date, category, amount),
            church_id: "c1".to_string(),
            kind,
            category: category.to_string(),
            amount,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: String::new(),
            member_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_month_totals_and_trends() {
        let txs = vec![
            tx(TransactionType::Income, "Dizimo", 1500.0, "2024-06-02"),
            tx(TransactionType::Income, "Oferta", 500.0, "2024-06-09"),
            tx(TransactionType::Expense, "Luz", 300.0, "2024-06-10"),
            tx(TransactionType::Income, "Dizimo", 1000.0, "2024-05-05"),
            tx(TransactionType::Expense, "Agua", 200.0, "2024-05-06"),
        ];
        let summary = summarize(&txs, day("2024-06-15"));

        assert_eq!(summary.current, Totals { income: 2000.0, expense: 300.0, balance: 1700.0 });
        assert_eq!(summary.previous, Totals { income: 1000.0, expense: 200.0, balance: 800.0 });
        assert_eq!(summary.trends.income, 100.0);
        assert_eq!(summary.trends.expense, 50.0);
        assert!((summary.trends.balance - 112.5).abs() < 1e-9);
        assert_eq!(summary.year_balance, 2500.0);
        assert!(!summary.low_balance);
    }

    #[test]
    fn test_trends_zero_without_previous() {
        let txs = vec![tx(TransactionType::Income, "Oferta", 100.0, "2024-06-02")];
        let summary = summarize(&txs, day("2024-06-15"));
        assert_eq!(summary.trends, Trends::default());
        assert!(summary.low_balance);
    }

    #[test]
    fn test_chart_covers_previous_year_in_january() {
        let txs = vec![
            tx(TransactionType::Income, "Oferta", 100.0, "2023-12-24"),
            tx(TransactionType::Expense, "Luz", 40.0, "2024-01-10"),
        ];
        let today = day("2024-01-20");
        let summary = summarize(&txs, today);

        let labels: Vec<&str> = summary.chart.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(labels, vec!["ago", "set", "out", "nov", "dez", "jan"]);
        assert_eq!(summary.chart[4].income, 100.0);
        assert_eq!(summary.chart[5].expense, 40.0);

        // previous month is December of last year, but the year balance is this year only
        assert_eq!(summary.previous.income, 100.0);
        assert_eq!(summary.year_balance, -40.0);

        assert_eq!(fetch_window(today).from, day("2023-08-01"));
        assert_eq!(fetch_window(day("2024-09-01")).from, day("2024-01-01"));
    }

    #[test]
    fn test_recent_and_breakdown() {
        let txs: Vec<Transaction> = (1..=7)
            .map(|d| tx(TransactionType::Income, "Dizimo", 10.0, &format!("2024-06-0{}", d)))
            .chain([
                tx(TransactionType::Income, "Oferta missionaria", 30.0, "2024-06-08"),
                tx(TransactionType::Expense, "Oferta", 99.0, "2024-06-08"),
            ])
            .collect();
        let summary = summarize(&txs, day("2024-06-15"));

        assert_eq!(summary.recent.len(), RECENT_LIMIT);
        assert_eq!(summary.recent[0].date, day("2024-06-08"));

        let totals: Vec<(&str, f64)> = summary
            .income_breakdown
            .iter()
            .map(|b| (b.label, b.total))
            .collect();
        assert_eq!(
            totals,
            vec![("Dízimos", 70.0), ("Ofertas", 0.0), ("Ofertas Missionárias", 30.0)]
        );
    }
}

// 🗂️ Pages - view models for every dashboard page
//
// Each loader reads the tenant's rows through the backend and returns a
// serializable model. The web layer renders it as JSON.

use crate::backend::{Backend, TenantScope};
use crate::dashboard::{self, DashboardData, Totals};
use crate::entities::{Category, Church, Family, Member, Role, TransactionView, UserProfile};
use crate::error::Result;
use crate::filters::{
    filter_members, sort_by_date_desc, sort_users, totals_of, MemberFilter, TransactionFilter,
    TypeFilter,
};
use crate::messages::{flash_from_query, Flash};
use crate::session::{CurrentUser, NavItem, Page};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

pub type Query = HashMap<String, String>;

// ============================================================================
// SHARED CONTEXT
// ============================================================================

/// Church branding shown in the page header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branding {
    pub name: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
}

impl From<&Church> for Branding {
    fn from(church: &Church) -> Self {
        Branding {
            name: church.name.clone(),
            logo_url: church.logo_url.clone(),
            primary_color: church.primary_color().to_string(),
            secondary_color: church.secondary_color().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub role_label: &'static str,
    pub photo_url: Option<String>,
}

/// Header, menu and flash banner common to all authenticated pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContext {
    pub title: &'static str,
    pub path: &'static str,
    pub church: Branding,
    pub user: Viewer,
    pub navigation: Vec<NavItem>,
    pub flash: Option<Flash>,
}

impl PageContext {
    pub fn new(page: Page, user: &CurrentUser, query: &Query) -> Self {
        let profile = &user.profile;
        PageContext {
            title: page.title(),
            path: page.path(),
            church: Branding::from(&user.church),
            user: Viewer {
                id: profile.id.clone(),
                name: profile.name.clone(),
                email: profile.email.clone(),
                role: profile.role,
                role_label: profile.role.label(),
                photo_url: profile.photo_url.clone(),
            },
            navigation: user.navigation(),
            flash: flash_from_query(page, query),
        }
    }
}

/// Login and register pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPage {
    pub title: &'static str,
    pub path: &'static str,
    pub flash: Option<Flash>,
}

impl PublicPage {
    pub fn new(page: Page, query: &Query) -> Self {
        PublicPage {
            title: page.title(),
            path: page.path(),
            flash: flash_from_query(page, query),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOption {
    pub value: &'static str,
}

fn category_options() -> Vec<CategoryOption> {
    Category::ALL
        .iter()
        .map(|c| CategoryOption { value: c.as_str() })
        .collect()
}

/// Id and name for member pickers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberOption {
    pub id: String,
    pub name: String,
}

fn member_options(members: &[Member]) -> Vec<MemberOption> {
    let mut options: Vec<MemberOption> = members
        .iter()
        .filter(|m| m.is_active())
        .map(|m| MemberOption {
            id: m.id.clone(),
            name: m.details.name.clone(),
        })
        .collect();
    options.sort_by(|a, b| a.name.cmp(&b.name));
    options
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPage {
    pub context: PageContext,
    pub recent_filter: TypeFilter,
    #[serde(flatten)]
    pub data: DashboardData,
}

/// `?recent=income|expense` narrows the recent list
pub async fn dashboard_page(
    backend: &Backend,
    user: &CurrentUser,
    query: &Query,
    today: NaiveDate,
) -> Result<DashboardPage> {
    let recent_filter = TypeFilter::parse(query.get("recent").map(String::as_str));
    let mut data = dashboard::load_dashboard(backend, user, today).await?;
    data.recent_transactions
        .retain(|v| recent_filter.matches(v.transaction.kind));

    Ok(DashboardPage {
        context: PageContext::new(Page::Dashboard, user, query),
        recent_filter,
        data,
    })
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionsPage {
    pub context: PageContext,
    pub filter: TransactionFilter,
    pub transactions: Vec<TransactionView>,
    pub totals: Totals,
    pub categories: Vec<CategoryOption>,
    pub members: Vec<MemberOption>,
}

/// All tenant transactions with member names, then filtered in memory
pub async fn filtered_transactions(
    backend: &Backend,
    scope: &TenantScope,
    filter: &TransactionFilter,
) -> Result<Vec<TransactionView>> {
    let transactions = backend.store.list_transactions(scope, None).await?;
    let mut views = dashboard::with_member_names(backend, scope, transactions).await?;
    sort_by_date_desc(&mut views);
    Ok(filter.apply(views))
}

pub async fn transactions_page(
    backend: &Backend,
    user: &CurrentUser,
    query: &Query,
) -> Result<TransactionsPage> {
    let scope = user.scope();
    let filter = TransactionFilter::from_query(query);
    let transactions = filtered_transactions(backend, &scope, &filter).await?;
    let members = backend.store.list_members(&scope).await?;
    tracing::debug!(count = transactions.len(), "transactions page loaded");

    Ok(TransactionsPage {
        context: PageContext::new(Page::Transactions, user, query),
        totals: totals_of(&transactions),
        filter,
        transactions,
        categories: category_options(),
        members: member_options(&members),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickEntryPage {
    pub context: PageContext,
    pub today: NaiveDate,
    pub categories: Vec<CategoryOption>,
    pub members: Vec<MemberOption>,
}

pub async fn quick_entry_page(
    backend: &Backend,
    user: &CurrentUser,
    query: &Query,
    today: NaiveDate,
) -> Result<QuickEntryPage> {
    let members = backend.store.list_members(&user.scope()).await?;
    Ok(QuickEntryPage {
        context: PageContext::new(Page::QuickEntry, user, query),
        today,
        categories: category_options(),
        members: member_options(&members),
    })
}

// ============================================================================
// MEMBERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembersPage {
    pub context: PageContext,
    pub filter: MemberFilter,
    pub members: Vec<Member>,
    pub families: Vec<Family>,
}

pub async fn members_page(
    backend: &Backend,
    user: &CurrentUser,
    query: &Query,
    today: NaiveDate,
) -> Result<MembersPage> {
    let scope = user.scope();
    let filter = MemberFilter::parse(query.get("filter").map(String::as_str));
    let members = backend.store.list_members(&scope).await?;
    let families = backend.store.list_families(&scope).await?;

    Ok(MembersPage {
        context: PageContext::new(Page::Members, user, query),
        filter,
        members: filter_members(members, filter, today),
        families,
    })
}

// ============================================================================
// USERS & SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleOption {
    pub value: Role,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsersPage {
    pub context: PageContext,
    pub users: Vec<UserProfile>,
    pub roles: Vec<RoleOption>,
}

pub async fn users_page(backend: &Backend, user: &CurrentUser, query: &Query) -> Result<UsersPage> {
    let users = backend.store.list_users(&user.scope()).await?;
    Ok(UsersPage {
        context: PageContext::new(Page::Users, user, query),
        users: sort_users(users),
        roles: [Role::Admin, Role::Treasurer, Role::Member]
            .into_iter()
            .map(|role| RoleOption {
                value: role,
                label: role.label(),
            })
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsPage {
    pub context: PageContext,
    pub church: Church,
}

/// Re-reads the church so a just-saved change shows up
pub async fn settings_page(backend: &Backend, user: &CurrentUser, query: &Query) -> Result<SettingsPage> {
    let church = backend
        .store
        .get_church(&user.church.id)
        .await?
        .unwrap_or_else(|| user.church.clone());
    Ok(SettingsPage {
        context: PageContext::new(Page::Settings, user, query),
        church,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{sqlite_backend, tenant};
    use crate::actions::transactions::create_transaction;
    use crate::form::FormData;

    fn query(pairs: &[(&str, &str)]) -> Query {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_navigation_follows_role() {
        let (_, backend) = sqlite_backend();
        let treasurer = tenant(&backend, "Igreja", Role::Treasurer).await;

        let context = PageContext::new(Page::Dashboard, &treasurer, &Query::new());
        let links: Vec<&str> = context.navigation.iter().map(|n| n.href).collect();
        assert!(links.contains(&"/dashboard/transactions"));
        assert!(!links.contains(&"/dashboard/users"));
        assert!(!links.contains(&"/dashboard/settings"));
        assert_eq!(context.church.primary_color, crate::entities::church::DEFAULT_PRIMARY_COLOR);
    }

    #[tokio::test]
    async fn test_transactions_page_filters_and_totals() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        for (kind, category, amount) in [("income", "Dizimo", "300"), ("expense", "Luz", "120,50")] {
            let form = FormData::from_pairs([
                ("type", kind),
                ("category", category),
                ("amount", amount),
                ("date", "2024-02-10"),
            ]);
            create_transaction(&backend, &admin, &form).await;
        }

        let page = transactions_page(&backend, &admin, &query(&[("saved", "1")])).await.unwrap();
        assert_eq!(page.transactions.len(), 2);
        assert_eq!(page.totals.balance, 179.5);
        assert!(page.context.flash.is_some());
        assert_eq!(page.categories.len(), Category::ALL.len());

        let page = transactions_page(&backend, &admin, &query(&[("type", "expense")])).await.unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert_eq!(page.totals.expense, 120.5);
    }

    #[tokio::test]
    async fn test_users_page_is_tenant_scoped() {
        let (_, backend) = sqlite_backend();
        let admin_a = tenant(&backend, "Igreja A", Role::Admin).await;
        tenant(&backend, "Igreja B", Role::Admin).await;

        let page = users_page(&backend, &admin_a, &Query::new()).await.unwrap();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].id, admin_a.id());
        assert_eq!(page.roles.len(), 3);
    }
}

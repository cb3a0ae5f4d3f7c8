// 💰 Transaction actions - create, edit, delete, quick entry and batch entry

use super::{forbid, record_event, today};
use crate::backend::{Backend, TenantScope};
use crate::entities::{Category, TransactionDraft, TransactionType};
use crate::error::ErrorCode;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::session::{CurrentUser, Page};
use crate::validation::{optional_id, validate_transaction, TransactionInput};
use serde_json::json;

fn transactions_page() -> Redirect {
    Redirect::to(Page::Transactions.path())
}

fn dashboard() -> Redirect {
    Redirect::to(Page::Dashboard.path())
}

/// A linked member must belong to the caller's church
async fn check_member(
    backend: &Backend,
    scope: &TenantScope,
    member_id: Option<&str>,
) -> Result<(), ErrorCode> {
    let Some(member_id) = member_id else {
        return Ok(());
    };

    match backend.store.get_member(scope, member_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ErrorCode::InvalidMember),
        Err(e) => {
            tracing::error!("error looking up member {}: {}", member_id, e);
            Err(ErrorCode::Db)
        }
    }
}

async fn validated(
    backend: &Backend,
    scope: &TenantScope,
    input: &TransactionInput,
) -> Result<TransactionDraft, ErrorCode> {
    let draft = validate_transaction(input)?;
    check_member(backend, scope, draft.member_id.as_deref()).await?;
    Ok(draft)
}

// ============================================================================
// SINGLE TRANSACTION
// ============================================================================

pub async fn create_transaction(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if let Some(denied) = forbid(user, Page::Transactions) {
        return denied;
    }
    let scope = user.scope();

    let draft = match validated(backend, &scope, &TransactionInput::from_form(form)).await {
        Ok(draft) => draft,
        Err(code) => return transactions_page().error(code),
    };

    match backend.store.insert_transaction(&scope, &draft).await {
        Ok(tx) => {
            tracing::info!(tx_id = %tx.id, church_id = %tx.church_id, "transaction created");
            record_event(backend, user, "transaction_created", "transaction", &tx.id, json!(draft)).await;
            transactions_page().saved()
        }
        Err(e) => {
            tracing::error!("error creating transaction: {}", e);
            transactions_page().error(ErrorCode::Db)
        }
    }
}

pub async fn update_transaction(
    backend: &Backend,
    user: &CurrentUser,
    tx_id: &str,
    form: &FormData,
) -> Redirect {
    if let Some(denied) = forbid(user, Page::Transactions) {
        return denied;
    }
    let scope = user.scope();

    let draft = match validated(backend, &scope, &TransactionInput::from_form(form)).await {
        Ok(draft) => draft,
        Err(code) => return transactions_page().error(code),
    };

    match backend.store.update_transaction(&scope, tx_id, &draft).await {
        Ok(true) => {
            tracing::info!(tx_id, "transaction updated");
            record_event(backend, user, "transaction_updated", "transaction", tx_id, json!(draft)).await;
            transactions_page().updated()
        }
        Ok(false) => transactions_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error updating transaction {}: {}", tx_id, e);
            transactions_page().error(ErrorCode::Db)
        }
    }
}

pub async fn delete_transaction(backend: &Backend, user: &CurrentUser, tx_id: &str) -> Redirect {
    if let Some(denied) = forbid(user, Page::Transactions) {
        return denied;
    }

    match backend.store.delete_transaction(&user.scope(), tx_id).await {
        Ok(true) => {
            tracing::info!(tx_id, "transaction deleted");
            record_event(backend, user, "transaction_deleted", "transaction", tx_id, json!({})).await;
            transactions_page().deleted()
        }
        Ok(false) => transactions_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error deleting transaction {}: {}", tx_id, e);
            transactions_page().error(ErrorCode::Db)
        }
    }
}

// ============================================================================
// QUICK ENTRY
// ============================================================================

/// One-field entry from the quick-entry page. Missing fields take defaults:
/// income, today, "Diversas", no member.
pub async fn quick_entry(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if forbid(user, Page::QuickEntry).is_some() {
        return dashboard().error(ErrorCode::Forbidden);
    }

    let input = TransactionInput {
        kind: form
            .text("type")
            .or_else(|| Some(TransactionType::Income.as_str().to_string())),
        category: form
            .text("category")
            .or_else(|| Some(Category::Diversas.as_str().to_string())),
        amount: form.text("amount"),
        date: form.text("date").or_else(|| Some(today().to_string())),
        description: form.text("description"),
        member_id: None,
    };

    let draft = match validate_transaction(&input) {
        Ok(draft) => draft,
        Err(code) => {
            tracing::warn!("quick entry rejected: {}", code);
            return dashboard().error(ErrorCode::Transaction);
        }
    };

    match backend.store.insert_transaction(&user.scope(), &draft).await {
        Ok(tx) => {
            tracing::info!(tx_id = %tx.id, "quick entry saved");
            record_event(backend, user, "transaction_created", "transaction", &tx.id, json!(draft)).await;
            dashboard().saved()
        }
        Err(e) => {
            tracing::error!("error saving quick entry: {}", e);
            dashboard().error(ErrorCode::Transaction)
        }
    }
}

// ============================================================================
// BATCH ENTRY
// ============================================================================

/// Several category/amount rows sharing type, date, description and member.
///
/// Rows arrive as repeated `category` and `amount` fields, paired by
/// position. Fully blank rows are skipped.
pub fn batch_inputs(form: &FormData) -> Vec<TransactionInput> {
    let categories = form.all("category");
    let amounts = form.all("amount");
    let rows = categories.len().max(amounts.len());

    let kind = form.text("type");
    let date = form.text("date");
    let description = form.text("description");
    let member_id = optional_id(form.get("member_id"));

    (0..rows)
        .filter_map(|i| {
            let category = categories.get(i).map(|c| c.trim()).filter(|c| !c.is_empty());
            let amount = amounts.get(i).map(|a| a.trim()).filter(|a| !a.is_empty());
            if category.is_none() && amount.is_none() {
                return None;
            }
            Some(TransactionInput {
                kind: kind.clone(),
                category: category.map(str::to_string),
                amount: amount.map(str::to_string),
                date: date.clone(),
                description: description.clone(),
                member_id: member_id.clone(),
            })
        })
        .collect()
}

/// Outcome counts of a batch insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchResult {
    pub saved: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn redirect(&self) -> Redirect {
        match (self.saved, self.failed) {
            (0, _) => dashboard().error(ErrorCode::Transaction),
            (saved, 0) => dashboard().with("saved", saved),
            (saved, _) => dashboard().error(ErrorCode::Partial).with("saved", saved),
        }
    }
}

/// Validate every row first; only then insert them one after another.
pub async fn create_many(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if forbid(user, Page::QuickEntry).is_some() {
        return dashboard().error(ErrorCode::Forbidden);
    }
    let scope = user.scope();

    let inputs = batch_inputs(form);
    if inputs.is_empty() {
        return dashboard().error(ErrorCode::Transaction);
    }

    let mut drafts = Vec::with_capacity(inputs.len());
    for (row, input) in inputs.iter().enumerate() {
        match validate_transaction(input) {
            Ok(draft) => drafts.push(draft),
            Err(code) => {
                tracing::warn!(row, "batch entry rejected: {}", code);
                return dashboard().error(ErrorCode::Transaction);
            }
        }
    }

    let member_id = drafts.first().and_then(|d| d.member_id.clone());
    if let Err(code) = check_member(backend, &scope, member_id.as_deref()).await {
        tracing::warn!("batch entry rejected: {}", code);
        return dashboard().error(ErrorCode::Transaction);
    }

    let mut result = BatchResult { saved: 0, failed: 0 };
    for draft in &drafts {
        match backend.store.insert_transaction(&scope, draft).await {
            Ok(tx) => {
                result.saved += 1;
                record_event(backend, user, "transaction_created", "transaction", &tx.id, json!(draft)).await;
            }
            Err(e) => {
                result.failed += 1;
                tracing::error!("error saving batch row: {}", e);
            }
        }
    }

    tracing::info!(saved = result.saved, failed = result.failed, "batch entry finished");
    result.redirect()
}

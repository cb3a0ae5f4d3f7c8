// 🙋 Member actions - create, update and delete congregation members
//
// Steps run in order with no rollback: photo upload, new family or a check
// that the linked one is the church's own, duplicate-email check, then the
// write itself. A family created before a
// failed member write stays in place.

use super::{forbid, record_event, today, upload_photo, MEMBER_PHOTOS_BUCKET};
use crate::backend::{Backend, TenantScope};
use crate::entities::member::DEFAULT_POSITION;
use crate::entities::{MemberDetails, MemberStatus};
use crate::error::ErrorCode;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::session::{CurrentUser, Page};
use crate::validation::{optional_id, parse_children_names, parse_date, parse_optional_date};
use serde_json::json;

fn members_page() -> Redirect {
    Redirect::to(Page::Members.path())
}

/// Read every member field from the form, applying defaults
pub fn member_details_from_form(form: &FormData, today: chrono::NaiveDate) -> MemberDetails {
    MemberDetails {
        name: form.text_or_empty("name"),
        email: form.text("email"),
        phone: form.text("phone"),
        birth_date: parse_optional_date(form.get("birth_date")),
        profession: form.text("profession"),
        cpf: form.text("cpf"),
        photo_url: form.text("existing_photo_url"),

        address: form.text("address"),
        neighborhood: form.text("neighborhood"),
        city: form.text("city"),
        state: form.text("state"),
        zip_code: form.text("zip_code"),

        position: form
            .text("position")
            .unwrap_or_else(|| DEFAULT_POSITION.to_string()),
        entry_date: form
            .get("entry_date")
            .and_then(parse_date)
            .unwrap_or(today),
        baptism_date: parse_optional_date(form.get("baptism_date")),
        status: MemberStatus::parse_or_default(form.get("status").unwrap_or_default()),

        spouse_name: form.text("spouse_name"),
        children_names: parse_children_names(form.get("children_names")),
        family_id: optional_id(form.get("family_id")),
    }
}

/// Photo upload and family creation shared by create and update
async fn prepare_details(
    backend: &Backend,
    user: &CurrentUser,
    scope: &TenantScope,
    form: &FormData,
) -> Result<MemberDetails, ErrorCode> {
    let mut details = member_details_from_form(form, today());

    if let Some(photo) = form.file("photo") {
        if let Some(url) =
            upload_photo(backend, MEMBER_PHOTOS_BUCKET, &user.church.id, photo, false).await
        {
            details.photo_url = Some(url);
        }
    }

    if let Some(family_name) = form.text("new_family_name") {
        match backend.store.insert_family(scope, &family_name).await {
            Ok(family) => {
                tracing::info!(family_id = %family.id, "family created");
                record_event(backend, user, "family_created", "family", &family.id, json!({ "name": family.name })).await;
                details.family_id = Some(family.id);
            }
            Err(e) => {
                tracing::error!("error creating family: {}", e);
                return Err(ErrorCode::Family);
            }
        }
    } else if let Some(family_id) = details.family_id.as_deref() {
        // a linked family must belong to the same church
        match backend.store.get_family(scope, family_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(family_id, "family not found in caller's church");
                return Err(ErrorCode::Family);
            }
            Err(e) => {
                tracing::error!("error checking family {}: {}", family_id, e);
                return Err(ErrorCode::DbCheck);
            }
        }
    }

    Ok(details)
}

async fn check_duplicate_email(
    backend: &Backend,
    scope: &TenantScope,
    details: &MemberDetails,
    exclude_id: Option<&str>,
) -> Result<(), ErrorCode> {
    let Some(email) = details.email.as_deref() else {
        return Ok(());
    };

    match backend.store.member_email_taken(scope, email, exclude_id).await {
        Ok(false) => Ok(()),
        Ok(true) => Err(ErrorCode::Duplicate),
        Err(e) => {
            tracing::error!("error checking duplicate member email: {}", e);
            Err(ErrorCode::DbCheck)
        }
    }
}

pub async fn create_member(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if let Some(denied) = forbid(user, Page::Members) {
        return denied;
    }
    let scope = user.scope();

    let details = match prepare_details(backend, user, &scope, form).await {
        Ok(details) => details,
        Err(code) => return members_page().error(code),
    };
    if let Err(code) = check_duplicate_email(backend, &scope, &details, None).await {
        return members_page().error(code);
    }

    match backend.store.insert_member(&scope, &details).await {
        Ok(member) => {
            tracing::info!(member_id = %member.id, "member created");
            record_event(backend, user, "member_created", "member", &member.id, json!(details)).await;
            members_page().saved()
        }
        Err(e) => {
            tracing::error!("error adding member: {}", e);
            members_page().error(ErrorCode::Db)
        }
    }
}

pub async fn update_member(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if let Some(denied) = forbid(user, Page::Members) {
        return denied;
    }
    let scope = user.scope();

    let Some(member_id) = form.text("id") else {
        return members_page().error(ErrorCode::MissingId);
    };

    let details = match prepare_details(backend, user, &scope, form).await {
        Ok(details) => details,
        Err(code) => return members_page().error(code),
    };
    if let Err(code) = check_duplicate_email(backend, &scope, &details, Some(&member_id)).await {
        return members_page().error(code);
    }

    match backend.store.update_member(&scope, &member_id, &details).await {
        Ok(true) => {
            tracing::info!(member_id = %member_id, "member updated");
            record_event(backend, user, "member_updated", "member", &member_id, json!(details)).await;
            members_page().updated()
        }
        Ok(false) => members_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error updating member {}: {}", member_id, e);
            members_page().error(ErrorCode::Db)
        }
    }
}

pub async fn delete_member(backend: &Backend, user: &CurrentUser, member_id: &str) -> Redirect {
    if let Some(denied) = forbid(user, Page::Members) {
        return denied;
    }

    match backend.store.delete_member(&user.scope(), member_id).await {
        Ok(true) => {
            tracing::info!(member_id, "member deleted");
            record_event(backend, user, "member_deleted", "member", member_id, json!({})).await;
            members_page().deleted()
        }
        Ok(false) => members_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error deleting member {}: {}", member_id, e);
            members_page().error(ErrorCode::Db)
        }
    }
}

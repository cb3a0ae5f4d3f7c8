// 👥 User actions - admin-only management of the church's logins
//
// The login itself lives in the auth service (created and deleted with the
// service role); the profile row lives in the users table.

use super::{forbid, record_event, upload_photo, USER_PHOTOS_BUCKET};
use crate::backend::{AuthUserUpdate, Backend, NewAuthUser};
use crate::entities::{Role, UserProfile, UserUpdate};
use crate::error::ErrorCode;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::session::{CurrentUser, Page};
use crate::validation::validate_password;
use serde_json::json;

fn users_page() -> Redirect {
    Redirect::to(Page::Users.path())
}

pub async fn create_user(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if let Some(denied) = forbid(user, Page::Users) {
        return denied;
    }
    let scope = user.scope();

    let name = form.text_or_empty("name");
    let role = form
        .get("role")
        .and_then(Role::parse)
        .unwrap_or(Role::Member);
    let password = form.get("password").unwrap_or_default();
    let confirm = form.get("confirm_password").unwrap_or_default();

    if let Err(code) = validate_password(password, confirm) {
        return users_page().error(code);
    }
    let Some(email) = form.text("email") else {
        return users_page().error(ErrorCode::EmailRequired);
    };

    let mut photo_url = None;
    if let Some(photo) = form.file("photo") {
        photo_url = upload_photo(backend, USER_PHOTOS_BUCKET, &user.church.id, photo, true).await;
    }

    match backend.store.user_email_taken(&scope, &email).await {
        Ok(false) => {}
        Ok(true) => return users_page().error(ErrorCode::Duplicate),
        Err(e) => {
            tracing::error!("error checking duplicate in users table: {}", e);
            return users_page().error(ErrorCode::DbCheck);
        }
    }

    let created = backend
        .auth
        .admin_create_user(&NewAuthUser {
            email: email.clone(),
            password: password.to_string(),
            email_confirm: true,
            user_metadata: json!({
                "name": name,
                "role": role,
                "photo_url": photo_url.clone().unwrap_or_default(),
            }),
        })
        .await;
    let auth_user = match created {
        Ok(auth_user) => auth_user,
        Err(e) => {
            tracing::error!("error creating auth user: {}", e);
            return users_page().error(ErrorCode::AuthCreate);
        }
    };
    if auth_user.id.trim().is_empty() {
        tracing::error!("auth user id missing after creation");
        return users_page().error(ErrorCode::AuthId);
    }

    let profile = UserProfile {
        id: auth_user.id,
        church_id: scope.church_id().to_string(),
        email,
        name,
        role,
        photo_url,
        created_at: None,
    };
    if let Err(e) = backend.store.insert_user(&profile).await {
        tracing::error!("error inserting into users table: {}", e);
        return users_page().error(ErrorCode::Db);
    }

    tracing::info!(user_id = %profile.id, role = role.as_str(), "user created");
    record_event(
        backend,
        user,
        "user_created",
        "user",
        &profile.id,
        json!({ "email": profile.email, "role": role }),
    )
    .await;
    users_page().saved()
}

pub async fn update_user(
    backend: &Backend,
    user: &CurrentUser,
    user_id: &str,
    form: &FormData,
) -> Redirect {
    if let Some(denied) = forbid(user, Page::Users) {
        return denied;
    }
    let scope = user.scope();

    let existing = match backend.store.get_user(&scope, user_id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return users_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error loading user {}: {}", user_id, e);
            return users_page().error(ErrorCode::Db);
        }
    };

    // A blank password field keeps the current password
    let new_password = form.text("password");
    if let Some(password) = &new_password {
        let confirm = form.get("confirm_password").unwrap_or_default();
        if let Err(code) = validate_password(password, confirm) {
            return users_page().error(code);
        }
    }

    let mut photo_url = form.text("existing_photo_url").or(existing.photo_url);
    if let Some(photo) = form.file("photo") {
        if let Some(url) =
            upload_photo(backend, USER_PHOTOS_BUCKET, &user.church.id, photo, true).await
        {
            photo_url = Some(url);
        }
    }

    let update = UserUpdate {
        name: form.text("name").unwrap_or(existing.name),
        role: form.get("role").and_then(Role::parse).unwrap_or(existing.role),
        photo_url,
    };

    match backend.store.update_user(&scope, user_id, &update).await {
        Ok(true) => {}
        Ok(false) => return users_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error updating user {}: {}", user_id, e);
            return users_page().error(ErrorCode::Db);
        }
    }

    let auth_update = AuthUserUpdate {
        password: new_password,
        user_metadata: Some(json!({
            "name": update.name,
            "role": update.role,
            "photo_url": update.photo_url.clone().unwrap_or_default(),
        })),
    };
    if let Err(e) = backend.auth.admin_update_user(user_id, &auth_update).await {
        tracing::error!("error updating auth user {}: {}", user_id, e);
        return users_page().error(ErrorCode::Server);
    }

    tracing::info!(user_id, "user updated");
    record_event(
        backend,
        user,
        "user_updated",
        "user",
        user_id,
        json!({ "name": update.name, "role": update.role }),
    )
    .await;
    users_page().updated()
}

pub async fn delete_user(backend: &Backend, user: &CurrentUser, user_id: &str) -> Redirect {
    if let Some(denied) = forbid(user, Page::Users) {
        return denied;
    }
    if user_id == user.id() {
        return users_page().error(ErrorCode::SelfDelete);
    }
    let scope = user.scope();

    match backend.store.get_user(&scope, user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return users_page().error(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!("error loading user {}: {}", user_id, e);
            return users_page().error(ErrorCode::Db);
        }
    }

    if let Err(e) = backend.auth.admin_delete_user(user_id).await {
        tracing::error!("error deleting auth user {}: {}", user_id, e);
        return users_page().error(ErrorCode::Server);
    }

    match backend.store.delete_user(&scope, user_id).await {
        Ok(_) => {
            tracing::info!(user_id, "user deleted");
            record_event(backend, user, "user_deleted", "user", user_id, json!({})).await;
            users_page().deleted()
        }
        Err(e) => {
            tracing::error!("error deleting user row {}: {}", user_id, e);
            users_page().error(ErrorCode::Db)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{add_user, sqlite_backend, tenant};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData::from_pairs(pairs.iter().copied())
    }

    fn new_user_form(email: &str) -> FormData {
        form(&[
            ("name", "Maria"),
            ("email", email),
            ("role", "treasurer"),
            ("password", "segredo"),
            ("confirm_password", "segredo"),
        ])
    }

    #[tokio::test]
    async fn test_password_rules_checked_first() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        let short = form(&[("email", "a@b.com"), ("password", "123"), ("confirm_password", "123")]);
        assert_eq!(
            create_user(&backend, &admin, &short).await.location(),
            "/dashboard/users?error=password_length"
        );

        let mismatch = form(&[("email", "a@b.com"), ("password", "123456"), ("confirm_password", "654321")]);
        assert_eq!(
            create_user(&backend, &admin, &mismatch).await.location(),
            "/dashboard/users?error=password_mismatch"
        );

        let no_email = form(&[("password", "123456"), ("confirm_password", "123456")]);
        assert_eq!(
            create_user(&backend, &admin, &no_email).await.error_code(),
            Some(ErrorCode::EmailRequired)
        );
    }

    #[tokio::test]
    async fn test_create_user_and_sign_in() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        let redirect = create_user(&backend, &admin, &new_user_form("maria@igreja.org")).await;
        assert_eq!(redirect.location(), "/dashboard/users?saved=1");

        let users = backend.store.list_users(&admin.scope()).await.unwrap();
        let maria = users.iter().find(|u| u.email == "maria@igreja.org").unwrap();
        assert_eq!(maria.role, Role::Treasurer);

        let session = backend
            .auth
            .sign_in_with_password("maria@igreja.org", "segredo")
            .await
            .unwrap();
        assert_eq!(session.user.id, maria.id);

        assert_eq!(
            create_user(&backend, &admin, &new_user_form("maria@igreja.org")).await.location(),
            "/dashboard/users?error=duplicate"
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_ignores_case() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        create_user(&backend, &admin, &new_user_form("maria@x.org")).await;
        assert_eq!(
            create_user(&backend, &admin, &new_user_form("Maria@X.org")).await.location(),
            "/dashboard/users?error=duplicate"
        );
    }

    #[tokio::test]
    async fn test_update_user_requires_admin_of_same_church() {
        let (_, backend) = sqlite_backend();
        let admin_a = tenant(&backend, "Igreja A", Role::Admin).await;
        let treasurer_a = add_user(&backend, &admin_a.church.id, Role::Treasurer).await;
        let admin_b = tenant(&backend, "Igreja B", Role::Admin).await;
        let rename = form(&[("name", "Tomado"), ("role", "member")]);

        assert_eq!(
            update_user(&backend, &treasurer_a, admin_a.id(), &rename).await.location(),
            "/dashboard/users?error=forbidden"
        );
        assert_eq!(
            update_user(&backend, &admin_b, treasurer_a.id(), &rename).await.error_code(),
            Some(ErrorCode::NotFound)
        );

        let untouched = backend
            .store
            .get_user(&admin_a.scope(), treasurer_a.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.role, Role::Treasurer);
        assert_ne!(untouched.name, "Tomado");
        let admin = backend.store.get_user(&admin_a.scope(), admin_a.id()).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_manage_users() {
        let (_, backend) = sqlite_backend();
        let treasurer = tenant(&backend, "Igreja", Role::Treasurer).await;
        assert_eq!(
            create_user(&backend, &treasurer, &new_user_form("x@y.org")).await.location(),
            "/dashboard/users?error=forbidden"
        );
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        let redirect = delete_user(&backend, &admin, admin.id()).await;
        assert_eq!(redirect.location(), "/dashboard/users?error=self_delete");
        assert!(backend.store.get_user(&admin.scope(), admin.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_user_in_other_church_not_found() {
        let (_, backend) = sqlite_backend();
        let admin_a = tenant(&backend, "Igreja A", Role::Admin).await;
        let admin_b = tenant(&backend, "Igreja B", Role::Admin).await;

        let redirect = delete_user(&backend, &admin_a, admin_b.id()).await;
        assert_eq!(redirect.error_code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;
        let member = add_user(&backend, &admin.church.id, Role::Member).await;

        let redirect = update_user(
            &backend,
            &admin,
            member.id(),
            &form(&[("name", "Novo Nome"), ("role", "treasurer"), ("password", "nova-senha"), ("confirm_password", "nova-senha")]),
        )
        .await;
        assert_eq!(redirect.location(), "/dashboard/users?updated=1");

        let updated = backend.store.get_user(&admin.scope(), member.id()).await.unwrap().unwrap();
        assert_eq!(updated.name, "Novo Nome");
        assert_eq!(updated.role, Role::Treasurer);
        assert!(backend
            .auth
            .sign_in_with_password(&member.profile.email, "nova-senha")
            .await
            .is_ok());

        let redirect = delete_user(&backend, &admin, member.id()).await;
        assert_eq!(redirect.location(), "/dashboard/users?deleted=1");
        assert!(backend.store.get_user(&admin.scope(), member.id()).await.unwrap().is_none());
    }
}

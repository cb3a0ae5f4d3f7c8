// 🔑 Auth actions - login, self-service registration and logout

use crate::backend::Backend;
use crate::entities::{Role, UserProfile};
use crate::error::ErrorCode;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::session::Page;
use crate::validation::validate_registration_password;

/// Where to go next and what to do with the session cookie
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub redirect: Redirect,
    pub session: SessionChange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    Keep,
    Set(String),
    Clear,
}

impl AuthOutcome {
    fn fail(page: Page, code: ErrorCode) -> Self {
        AuthOutcome {
            redirect: Redirect::to(page.path()).error(code),
            session: SessionChange::Keep,
        }
    }

    fn signed_in(access_token: String) -> Self {
        AuthOutcome {
            redirect: Redirect::to(Page::Dashboard.path()),
            session: SessionChange::Set(access_token),
        }
    }
}

pub async fn login(backend: &Backend, form: &FormData) -> AuthOutcome {
    let email = form.text_or_empty("email");
    let password = form.get("password").unwrap_or_default();

    match backend.auth.sign_in_with_password(&email, password).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user.id, "user signed in");
            AuthOutcome::signed_in(session.access_token)
        }
        Err(e) => {
            tracing::warn!("authentication error: {}", e);
            AuthOutcome::fail(Page::Login, ErrorCode::Auth)
        }
    }
}

/// New account: auth user, church, then an admin profile linking the two
pub async fn register(backend: &Backend, form: &FormData) -> AuthOutcome {
    let password = form.get("password").unwrap_or_default();
    let confirm = form.get("confirm_password").unwrap_or_default();
    if let Err(code) = validate_registration_password(password, confirm) {
        return AuthOutcome::fail(Page::Register, code);
    }
    let Some(email) = form.text("email") else {
        return AuthOutcome::fail(Page::Register, ErrorCode::EmailRequired);
    };
    let church_name = form.text_or_empty("church_name");
    let user_name = form.text_or_empty("user_name");

    let auth_user = match backend.auth.sign_up(&email, password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("sign-up failed: {}", e);
            return AuthOutcome::fail(Page::Register, ErrorCode::Auth);
        }
    };

    let church = match backend.store.insert_church(&church_name).await {
        Ok(church) => church,
        Err(e) => {
            tracing::error!("error creating church: {}", e);
            return AuthOutcome::fail(Page::Register, ErrorCode::Church);
        }
    };

    let profile = UserProfile {
        id: auth_user.id.clone(),
        church_id: church.id.clone(),
        email: email.clone(),
        name: user_name,
        role: Role::Admin,
        photo_url: None,
        created_at: None,
    };
    if let Err(e) = backend.store.insert_user(&profile).await {
        tracing::error!("error creating profile: {}", e);
        return AuthOutcome::fail(Page::Register, ErrorCode::Profile);
    }

    tracing::info!(user_id = %profile.id, church_id = %church.id, "church registered");

    // Projects requiring email confirmation issue no session yet
    match backend.auth.sign_in_with_password(&email, password).await {
        Ok(session) => AuthOutcome::signed_in(session.access_token),
        Err(e) => {
            tracing::warn!("registered user could not sign in yet: {}", e);
            AuthOutcome {
                redirect: Redirect::to(Page::Login.path()),
                session: SessionChange::Keep,
            }
        }
    }
}

/// Best-effort sign-out; the cookie is cleared either way
pub async fn logout(backend: &Backend, access_token: Option<&str>) -> AuthOutcome {
    if let Some(token) = access_token.filter(|t| !t.is_empty()) {
        if let Err(e) = backend.auth.sign_out(token).await {
            tracing::warn!("sign-out failed: {}", e);
        }
    }

    AuthOutcome {
        redirect: Redirect::to(Page::Login.path()),
        session: SessionChange::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::sqlite_backend;
    use crate::session::resolve;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData::from_pairs(pairs.iter().copied())
    }

    fn registration() -> FormData {
        form(&[
            ("church_name", "Igreja Esperança"),
            ("user_name", "Pr. Paulo"),
            ("email", "paulo@esperanca.org"),
            ("password", "123456"),
            ("confirm_password", "123456"),
        ])
    }

    #[tokio::test]
    async fn test_register_then_resolve_session() {
        let (_, backend) = sqlite_backend();

        let outcome = register(&backend, &registration()).await;
        assert_eq!(outcome.redirect.location(), "/dashboard");
        let SessionChange::Set(token) = outcome.session else {
            panic!("expected a session cookie");
        };

        let current = resolve(&backend, &token).await.unwrap().unwrap();
        assert_eq!(current.church.name, "Igreja Esperança");
        assert_eq!(current.role(), Role::Admin);
    }

    #[tokio::test]
    async fn test_register_password_rules() {
        let (_, backend) = sqlite_backend();
        let outcome = register(
            &backend,
            &form(&[("email", "a@b.org"), ("password", "123456"), ("confirm_password", "1234567")]),
        )
        .await;
        assert_eq!(outcome.redirect.location(), "/register?error=password_mismatch");
        assert_eq!(outcome.session, SessionChange::Keep);

        // short and mismatched: the mismatch is reported
        let outcome = register(
            &backend,
            &form(&[("email", "a@b.org"), ("password", "123"), ("confirm_password", "321")]),
        )
        .await;
        assert_eq!(outcome.redirect.location(), "/register?error=password_mismatch");

        let outcome = register(
            &backend,
            &form(&[("email", "a@b.org"), ("password", "123"), ("confirm_password", "123")]),
        )
        .await;
        assert_eq!(outcome.redirect.location(), "/register?error=password_length");
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (_, backend) = sqlite_backend();
        register(&backend, &registration()).await;

        let failed = login(&backend, &form(&[("email", "paulo@esperanca.org"), ("password", "errada")])).await;
        assert_eq!(failed.redirect.location(), "/login?error=auth");

        let outcome = login(&backend, &form(&[("email", "paulo@esperanca.org"), ("password", "123456")])).await;
        let SessionChange::Set(token) = outcome.session else {
            panic!("expected a session cookie");
        };

        let outcome = logout(&backend, Some(&token)).await;
        assert_eq!(outcome.session, SessionChange::Clear);
        assert_eq!(outcome.redirect.location(), "/login");
        assert!(resolve(&backend, &token).await.unwrap().is_none());
    }
}

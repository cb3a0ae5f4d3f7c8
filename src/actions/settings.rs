// 🎨 Settings actions - church profile, colors and logo

use super::{forbid, record_event, LOGOS_BUCKET};
use crate::backend::Backend;
use crate::entities::church::{DEFAULT_PRIMARY_COLOR, DEFAULT_SECONDARY_COLOR};
use crate::entities::ChurchSettings;
use crate::error::ErrorCode;
use crate::form::FormData;
use crate::outcome::Redirect;
use crate::session::{CurrentUser, Page};
use crate::validation::is_hex_color;
use chrono::Utc;
use serde_json::json;

pub const MAX_LOGO_BYTES: usize = 5 * 1024 * 1024;
pub const LOGO_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

fn settings_page() -> Redirect {
    Redirect::to(Page::Settings.path())
}

fn color(form: &FormData, field: &str, default: &str) -> Result<String, ErrorCode> {
    match form.text(field) {
        None => Ok(default.to_string()),
        Some(value) if is_hex_color(&value) => Ok(value.to_uppercase()),
        Some(_) => Err(ErrorCode::InvalidColor),
    }
}

pub fn settings_from_form(form: &FormData) -> Result<ChurchSettings, ErrorCode> {
    let name = form.text("name").ok_or(ErrorCode::NameRequired)?;
    Ok(ChurchSettings {
        name,
        address: form.text_or_empty("address"),
        phone: form.text_or_empty("phone"),
        email: form.text_or_empty("email"),
        primary_color: color(form, "primary_color", DEFAULT_PRIMARY_COLOR)?,
        secondary_color: color(form, "secondary_color", DEFAULT_SECONDARY_COLOR)?,
    })
}

/// Update the caller's own church row
pub async fn update_church_settings(
    backend: &Backend,
    user: &CurrentUser,
    form: &FormData,
) -> Redirect {
    if let Some(denied) = forbid(user, Page::Settings) {
        return denied;
    }

    let settings = match settings_from_form(form) {
        Ok(settings) => settings,
        Err(code) => return settings_page().error(code),
    };

    match backend.store.update_church(&user.scope(), &settings).await {
        Ok(true) => {
            tracing::info!(church_id = %user.church.id, "church settings updated");
            record_event(backend, user, "church_updated", "church", &user.church.id, json!(settings)).await;
            settings_page().success()
        }
        Ok(false) => {
            tracing::error!(church_id = %user.church.id, "church row missing on update");
            settings_page().error(ErrorCode::Db)
        }
        Err(e) => {
            tracing::error!("error updating church: {}", e);
            settings_page().error(ErrorCode::Db)
        }
    }
}

/// Store a new logo in the public logos bucket and point the church at it
pub async fn upload_logo(backend: &Backend, user: &CurrentUser, form: &FormData) -> Redirect {
    if let Some(denied) = forbid(user, Page::Settings) {
        return denied;
    }

    let Some(file) = form.file("file") else {
        return settings_page().error(ErrorCode::LogoMissing);
    };
    if file.size() > MAX_LOGO_BYTES {
        return settings_page().error(ErrorCode::LogoTooLarge);
    }
    if !LOGO_MIME_TYPES.contains(&file.content_type.as_str()) {
        return settings_page().error(ErrorCode::LogoType);
    }

    let path = format!("{}.{}", Utc::now().timestamp_millis(), file.extension());
    if let Err(e) = backend
        .storage
        .upload(LOGOS_BUCKET, &path, &file.bytes, &file.content_type, false)
        .await
    {
        tracing::error!("upload error: {}", e);
        return settings_page().error(ErrorCode::Storage);
    }

    let url = backend.storage.public_url(LOGOS_BUCKET, &path);
    match backend.store.set_church_logo(&user.scope(), &url).await {
        Ok(_) => {
            tracing::info!(church_id = %user.church.id, path = %path, "logo uploaded");
            record_event(backend, user, "logo_uploaded", "church", &user.church.id, json!({ "logo_url": url })).await;
            settings_page().success()
        }
        Err(e) => {
            tracing::error!("error saving logo url: {}", e);
            settings_page().error(ErrorCode::Db)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{png, sqlite_backend, tenant};
    use crate::entities::Role;
    use crate::form::UploadedFile;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_settings_validation() {
        assert_eq!(settings_from_form(&form(&[("name", " ")])), Err(ErrorCode::NameRequired));
        assert_eq!(
            settings_from_form(&form(&[("name", "Igreja"), ("primary_color", "blue")])),
            Err(ErrorCode::InvalidColor)
        );

        let settings = settings_from_form(&form(&[("name", "Igreja"), ("secondary_color", "#aabbcc")])).unwrap();
        assert_eq!(settings.primary_color, DEFAULT_PRIMARY_COLOR);
        assert_eq!(settings.secondary_color, "#AABBCC");
    }

    #[tokio::test]
    async fn test_update_settings_only_admin() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;
        let submitted = form(&[("name", "Igreja Renovada"), ("phone", "1199999")]);

        assert_eq!(
            update_church_settings(&backend, &admin, &submitted).await.location(),
            "/dashboard/settings?success=1"
        );
        let church = backend.store.get_church(&admin.church.id).await.unwrap().unwrap();
        assert_eq!(church.name, "Igreja Renovada");
        assert_eq!(church.phone.as_deref(), Some("1199999"));

        let treasurer = tenant(&backend, "Outra", Role::Treasurer).await;
        assert_eq!(
            update_church_settings(&backend, &treasurer, &submitted).await.location(),
            "/dashboard/settings?error=forbidden"
        );
    }

    #[tokio::test]
    async fn test_upload_logo() {
        let (_, backend) = sqlite_backend();
        let admin = tenant(&backend, "Igreja", Role::Admin).await;

        assert_eq!(
            upload_logo(&backend, &admin, &FormData::new()).await.error_code(),
            Some(ErrorCode::LogoMissing)
        );

        let pdf = UploadedFile {
            file_name: "logo.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(
            upload_logo(&backend, &admin, &FormData::new().with_file("file", pdf)).await.error_code(),
            Some(ErrorCode::LogoType)
        );

        let huge = UploadedFile {
            bytes: vec![0; MAX_LOGO_BYTES + 1],
            ..png("big.png")
        };
        assert_eq!(
            upload_logo(&backend, &admin, &FormData::new().with_file("file", huge)).await.error_code(),
            Some(ErrorCode::LogoTooLarge)
        );

        let redirect = upload_logo(&backend, &admin, &FormData::new().with_file("file", png("logo.png"))).await;
        assert_eq!(redirect.location(), "/dashboard/settings?success=1");

        let church = backend.store.get_church(&admin.church.id).await.unwrap().unwrap();
        let logo_url = church.logo_url.unwrap();
        assert!(logo_url.contains("/storage/v1/object/public/logos/"));
        assert!(logo_url.ends_with(".png"));
    }
}

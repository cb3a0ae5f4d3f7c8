//! Form actions.
//!
//! Each action takes the resolved [`CurrentUser`], the submitted
//! [`FormData`](crate::form::FormData) and the [`Backend`], runs validation and backend calls in
//! order, and always ends in a [`Redirect`]. Failures are logged and mapped to
//! an [`ErrorCode`](crate::error::ErrorCode); nothing is retried and earlier
//! steps are not rolled back.

pub mod auth;
pub mod bootstrap;
pub mod members;
pub mod settings;
pub mod transactions;
pub mod users;

use crate::backend::Backend;
use crate::entities::Event;
use crate::error::ErrorCode;
use crate::form::UploadedFile;
use crate::outcome::Redirect;
use crate::session::{CurrentUser, Page};
use chrono::{NaiveDate, Utc};

pub const MEMBER_PHOTOS_BUCKET: &str = "member-photos";
pub const USER_PHOTOS_BUCKET: &str = "user-photos";
pub const LOGOS_BUCKET: &str = "logos";

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `Some(redirect)` when the user's role may not act on `page`
pub(crate) fn forbid(user: &CurrentUser, page: Page) -> Option<Redirect> {
    if user.can_access(page) {
        return None;
    }
    tracing::warn!(
        user_id = %user.id(),
        role = user.role().as_str(),
        page = page.path(),
        "action denied for role"
    );
    Some(Redirect::to(page.path()).error(ErrorCode::Forbidden))
}

/// `<church_id>/<millis>_<random>.<ext>`
pub(crate) fn photo_object_key(church_id: &str, file: &UploadedFile) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}_{}.{}",
        church_id,
        Utc::now().timestamp_millis(),
        &random[..6],
        file.extension()
    )
}

/// Upload a photo and return its public URL. Failures are logged and yield
/// `None` so the caller keeps whatever URL it already had.
pub(crate) async fn upload_photo(
    backend: &Backend,
    bucket: &str,
    church_id: &str,
    file: &UploadedFile,
    upsert: bool,
) -> Option<String> {
    let key = photo_object_key(church_id, file);
    match backend
        .storage
        .upload(bucket, &key, &file.bytes, &file.content_type, upsert)
        .await
    {
        Ok(()) => Some(backend.storage.public_url(bucket, &key)),
        Err(e) => {
            tracing::error!(bucket, key = %key, "error uploading photo: {}", e);
            None
        }
    }
}

/// Append an audit event. The mutation already happened, so a failure here
/// is only logged.
pub(crate) async fn record_event(
    backend: &Backend,
    user: &CurrentUser,
    event_type: &str,
    entity_type: &str,
    entity_id: &str,
    data: serde_json::Value,
) {
    let event = Event::new(
        event_type,
        entity_type,
        entity_id,
        &user.church.id,
        data,
        user.id(),
    );
    if let Err(e) = backend.store.append_event(&event).await {
        tracing::error!(event_type, entity_id, "error recording event: {}", e);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_object_key_layout() {
        let file = testing::png("Foto.PNG");
        let key = photo_object_key("church-1", &file);
        let (church, rest) = key.split_once('/').unwrap();
        assert_eq!(church, "church-1");
        assert!(rest.ends_with(".png"));
        let (millis, random) = rest.trim_end_matches(".png").split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 6);
    }
}

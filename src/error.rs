// Error types
// AppError is for failures talking to the backend or the environment.
// ErrorCode is the user-visible outcome carried in redirect URLs (?error=<code>).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("state lock poisoned")]
    LockPoisoned,
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        AppError::Auth {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// REDIRECT ERROR CODES
// ============================================================================

/// Outcome code appended to a redirect as `?error=<code>`.
///
/// The destination page resolves the code to a Portuguese message through
/// [`crate::messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // transactions
    InvalidAmount,
    InvalidDate,
    InvalidCategory,
    InvalidType,
    InvalidMember,
    Transaction,
    Partial,

    // shared
    NotFound,
    Db,
    DbCheck,
    Duplicate,
    Server,
    Forbidden,
    MissingId,

    // members
    Family,

    // users and registration
    PasswordLength,
    PasswordMismatch,
    EmailRequired,
    AuthCreate,
    AuthId,
    SelfDelete,
    Auth,
    Church,
    Profile,

    // settings
    NameRequired,
    InvalidColor,
    LogoMissing,
    LogoTooLarge,
    LogoType,
    Storage,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 30] = [
        ErrorCode::InvalidAmount,
        ErrorCode::InvalidDate,
        ErrorCode::InvalidCategory,
        ErrorCode::InvalidType,
        ErrorCode::InvalidMember,
        ErrorCode::Transaction,
        ErrorCode::Partial,
        ErrorCode::NotFound,
        ErrorCode::Db,
        ErrorCode::DbCheck,
        ErrorCode::Duplicate,
        ErrorCode::Server,
        ErrorCode::Forbidden,
        ErrorCode::MissingId,
        ErrorCode::Family,
        ErrorCode::PasswordLength,
        ErrorCode::PasswordMismatch,
        ErrorCode::EmailRequired,
        ErrorCode::AuthCreate,
        ErrorCode::AuthId,
        ErrorCode::SelfDelete,
        ErrorCode::Auth,
        ErrorCode::Church,
        ErrorCode::Profile,
        ErrorCode::NameRequired,
        ErrorCode::InvalidColor,
        ErrorCode::LogoMissing,
        ErrorCode::LogoTooLarge,
        ErrorCode::LogoType,
        ErrorCode::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAmount => "invalid_amount",
            ErrorCode::InvalidDate => "invalid_date",
            ErrorCode::InvalidCategory => "invalid_category",
            ErrorCode::InvalidType => "invalid_type",
            ErrorCode::InvalidMember => "invalid_member",
            ErrorCode::Transaction => "transaction",
            ErrorCode::Partial => "partial",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Db => "db",
            ErrorCode::DbCheck => "db_check",
            ErrorCode::Duplicate => "duplicate",
            ErrorCode::Server => "server",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::MissingId => "missing_id",
            ErrorCode::Family => "family",
            ErrorCode::PasswordLength => "password_length",
            ErrorCode::PasswordMismatch => "password_mismatch",
            ErrorCode::EmailRequired => "email_required",
            ErrorCode::AuthCreate => "auth_create",
            ErrorCode::AuthId => "auth_id",
            ErrorCode::SelfDelete => "self_delete",
            ErrorCode::Auth => "auth",
            ErrorCode::Church => "church",
            ErrorCode::Profile => "profile",
            ErrorCode::NameRequired => "name_required",
            ErrorCode::InvalidColor => "invalid_color",
            ErrorCode::LogoMissing => "logo_missing",
            ErrorCode::LogoTooLarge => "logo_too_large",
            ErrorCode::LogoType => "logo_type",
            ErrorCode::Storage => "storage",
        }
    }

    pub fn parse(code: &str) -> Option<ErrorCode> {
        ErrorCode::ALL.iter().copied().find(|c| c.as_str() == code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_parse_back() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("nope"), None);
    }

    #[test]
    fn test_backend_error_display() {
        let err = AppError::Backend {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned 409: duplicate key");
    }
}

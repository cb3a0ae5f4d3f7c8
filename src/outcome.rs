// ↪️ Outcome - where an action sends the browser next
//
// Every form action ends in a redirect whose query string carries the
// result: saved/updated/deleted/success flags or error=<code>.

use crate::error::ErrorCode;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    path: String,
    query: Vec<(String, String)>,
}

impl Redirect {
    pub fn to(path: &str) -> Self {
        Redirect {
            path: path.to_string(),
            query: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn saved(self) -> Self {
        self.with("saved", 1)
    }

    pub fn updated(self) -> Self {
        self.with("updated", 1)
    }

    pub fn deleted(self) -> Self {
        self.with("deleted", 1)
    }

    pub fn success(self) -> Self {
        self.with("success", 1)
    }

    pub fn error(self, code: ErrorCode) -> Self {
        self.with("error", code.as_str())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.param("error").and_then(ErrorCode::parse)
    }

    /// Value for the `Location` header
    pub fn location(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location() {
        assert_eq!(Redirect::to("/dashboard").location(), "/dashboard");
        assert_eq!(
            Redirect::to("/dashboard/members").saved().location(),
            "/dashboard/members?saved=1"
        );
        assert_eq!(
            Redirect::to("/dashboard/users")
                .error(ErrorCode::PasswordLength)
                .location(),
            "/dashboard/users?error=password_length"
        );
    }

    #[test]
    fn test_values_are_encoded() {
        let redirect = Redirect::to("/dashboard").with("q", "a b&c");
        assert_eq!(redirect.location(), "/dashboard?q=a%20b%26c");
        assert_eq!(redirect.param("q"), Some("a b&c"));
    }

    #[test]
    fn test_error_code_read_back() {
        let redirect = Redirect::to("/login").error(ErrorCode::Auth);
        assert_eq!(redirect.error_code(), Some(ErrorCode::Auth));
        assert_eq!(Redirect::to("/login").error_code(), None);
    }
}

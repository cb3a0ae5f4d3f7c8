// ⚙️ Configuration - TOML file with environment overrides

use crate::backend::sqlite::SqliteBackend;
use crate::backend::supabase::SupabaseBackend;
use crate::backend::Backend;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Supabase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL under which stored objects are publicly served
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub bootstrap_token: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("church_admin.db")
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend: BackendKind::default(),
            bind: default_bind(),
            public_url: default_public_url(),
            database_path: default_database_path(),
            supabase: SupabaseConfig::default(),
            bootstrap_token: None,
            environment: default_environment(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AppError::config(format!("invalid TOML: {}", e)))
    }

    /// Optional file, then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.supabase.url = Some(url);
        }
        if let Some(key) = first(&["NEXT_PUBLIC_SUPABASE_ANON_KEY", "SUPABASE_ANON_KEY"]) {
            self.supabase.anon_key = Some(key);
        }
        if let Some(key) = first(&["SUPABASE_SERVICE_ROLE_KEY"]) {
            self.supabase.service_role_key = Some(key);
        }
        if let Some(token) = first(&["BOOTSTRAP_TOKEN"]) {
            self.bootstrap_token = Some(token);
        }
        if let Some(env) = first(&["APP_ENV"]) {
            self.environment = env;
        }
        if let Some(kind) = first(&["CHURCH_ADMIN_BACKEND"]) {
            match kind.trim().to_lowercase().as_str() {
                "supabase" => self.backend = BackendKind::Supabase,
                "sqlite" => self.backend = BackendKind::Sqlite,
                other => tracing::warn!("ignoring unknown CHURCH_ADMIN_BACKEND value: {}", other),
            }
        }
        if let Some(path) = first(&["CHURCH_ADMIN_DB"]) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(bind) = first(&["CHURCH_ADMIN_BIND"]) {
            self.bind = bind;
        }
        if let Some(url) = first(&["CHURCH_ADMIN_PUBLIC_URL"]) {
            self.public_url = url;
        }
        if let Some(format) = first(&["CHURCH_ADMIN_LOG_FORMAT"]) {
            self.log_format = match format.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.backend {
            BackendKind::Supabase => {
                self.supabase_url()?;
                self.supabase_anon_key()?;
                self.supabase_service_role_key()?;
            }
            BackendKind::Sqlite => {
                if self.database_path.as_os_str().is_empty() {
                    return Err(AppError::config("CHURCH_ADMIN_DB must not be empty"));
                }
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    fn supabase_url(&self) -> Result<&str> {
        self.supabase
            .url
            .as_deref()
            .ok_or_else(|| AppError::config("SUPABASE_URL não configurada"))
    }

    fn supabase_anon_key(&self) -> Result<&str> {
        self.supabase
            .anon_key
            .as_deref()
            .ok_or_else(|| AppError::config("NEXT_PUBLIC_SUPABASE_ANON_KEY não configurada"))
    }

    fn supabase_service_role_key(&self) -> Result<&str> {
        self.supabase
            .service_role_key
            .as_deref()
            .ok_or_else(|| AppError::config("SUPABASE_SERVICE_ROLE_KEY não configurada"))
    }

    /// Build the configured backend handle
    pub fn build_backend(&self) -> Result<Backend> {
        match self.backend {
            BackendKind::Supabase => {
                let backend = SupabaseBackend::new(
                    self.supabase_url()?,
                    self.supabase_anon_key()?,
                    self.supabase_service_role_key()?,
                )?;
                tracing::info!("using hosted backend at {}", self.supabase_url()?);
                Ok(Backend::from_single(Arc::new(backend)))
            }
            BackendKind::Sqlite => {
                let backend =
                    SqliteBackend::open(&self.database_path)?.with_public_url(&self.public_url);
                tracing::info!("using SQLite backend at {}", self.database_path.display());
                Ok(Backend::from_single(Arc::new(backend)))
            }
        }
    }
}

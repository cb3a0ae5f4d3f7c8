// Church Admin - Web Server
// Pages, form actions and JSON API with Axum

use anyhow::{Context, Result};
use church_admin::config::AppConfig;
use church_admin::logging::init_logging;
use church_admin::web::{serve, AppState};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config file as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    init_logging(config.log_format, false);

    tracing::info!(
        version = church_admin::VERSION,
        environment = %config.environment,
        backend = ?config.backend,
        "starting church admin server"
    );

    let backend = config.build_backend()?;
    let state = AppState::from_config(&config, backend);

    serve(&config.bind, state)
        .await
        .with_context(|| format!("serving on {}", config.bind))
}

use anyhow::{Context, Result};
use church_admin::actions::bootstrap::{bootstrap, BootstrapParams};
use church_admin::backend::TenantScope;
use church_admin::config::{AppConfig, BackendKind};
use church_admin::logging::init_logging;
use church_admin::pages::filtered_transactions;
use church_admin::report::write_report;
use church_admin::{setup_database, TransactionFilter, TypeFilter};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "church-admin", version, about = "Church administration toolkit")]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the SQLite schema
    InitDb,

    /// Seed the admin account and its church
    Bootstrap {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        church: Option<String>,
    },

    /// Export a church's transactions as CSV
    Export {
        #[arg(long)]
        church: String,
        /// First day, YYYY-MM-DD (inclusive)
        #[arg(long)]
        from: Option<chrono::NaiveDate>,
        /// Last day, YYYY-MM-DD (inclusive)
        #[arg(long)]
        to: Option<chrono::NaiveDate>,
        /// income, expense or all
        #[arg(long = "type", default_value = "all")]
        kind: String,
        #[arg(long)]
        search: Option<String>,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(config.log_format, cli.verbose);

    match cli.command {
        Command::InitDb => run_init_db(&config),
        Command::Bootstrap {
            email,
            password,
            church,
        } => {
            let params = BootstrapParams {
                token: None,
                email,
                password,
                church,
            };
            run_bootstrap(&config, &params).await
        }
        Command::Export {
            church,
            from,
            to,
            kind,
            search,
            out,
        } => {
            let filter = TransactionFilter {
                kind: TypeFilter::parse(Some(kind.as_str())),
                start: from,
                end: to,
                search: search
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty()),
            };
            run_export(&config, &church, &filter, out).await
        }
    }
}

fn run_init_db(config: &AppConfig) -> Result<()> {
    if config.backend != BackendKind::Sqlite {
        anyhow::bail!("init-db only applies to the sqlite backend");
    }

    println!("🔧 Setting up database...");
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode at {}", config.database_path.display());
    Ok(())
}

async fn run_bootstrap(config: &AppConfig, params: &BootstrapParams) -> Result<()> {
    let backend = config.build_backend()?;

    println!("🌱 Seeding admin account...");
    let report = bootstrap(&backend, params).await?;
    println!("✓ Admin:  {} ({})", report.email, report.user_id);
    println!("✓ Church: {}", report.church_id);
    println!("  {}", report.note);
    Ok(())
}

async fn run_export(
    config: &AppConfig,
    church_id: &str,
    filter: &TransactionFilter,
    out: Option<PathBuf>,
) -> Result<()> {
    let backend = config.build_backend()?;
    let church = backend
        .store
        .get_church(church_id)
        .await?
        .with_context(|| format!("church {} not found", church_id))?;

    let views = filtered_transactions(&backend, &TenantScope::new(church.id.as_str()), filter).await?;

    match out {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            write_report(file, &views)?;
            println!("✓ Exported {} transactions of {} to {}", views.len(), church.name, path.display());
        }
        None => write_report(std::io::stdout().lock(), &views)?,
    }
    Ok(())
}

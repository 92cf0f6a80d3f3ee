mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use nile_pipeline::{Crm, PipelineError};
use nile_storage::{DocumentStore, RecordStore, SqliteStore};
use rust_decimal::Decimal;

use crate::commands::Ctx;
use crate::config::{Backend, StorageConfig};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Nile CRM: clients, offers, services, deliveries, invoices and renewals.
#[derive(Parser)]
#[command(name = "nile", version, about = "Nile CRM pipeline tracker")]
struct Cli {
    /// Path to nile.toml (default: ./nile.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend, overrides the config file
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Database file or document directory, overrides the config file
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and seed the default user and settings
    Init,

    /// Check a username and password
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Headline counts: clients, pending offers, overdue accounts, renewals due
    Dashboard {
        /// Reference date (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<String>,
    },

    /// Manage clients
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Manage offers
    Offer {
        #[command(subcommand)]
        command: OfferCommands,
    },

    /// Rejected offers
    Rejected {
        #[command(subcommand)]
        command: RejectedCommands,
    },

    /// Approved services
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },

    /// Services in execution
    Execution {
        #[command(subcommand)]
        command: ExecutionCommands,
    },

    /// Delivered work awaiting billing
    Delivery {
        #[command(subcommand)]
        command: DeliveryCommands,
    },

    /// Invoices and payments
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Service renewals
    Renewal {
        #[command(subcommand)]
        command: RenewalCommands,
    },

    /// Application settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Backup, restore and tabular export
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum ClientCommands {
    /// List all clients
    List,
    /// Show one client
    Show { id: i64 },
    /// Add a client
    Add {
        name: String,
        /// Company code (default: next NC### code)
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        intermediary: Option<String>,
        #[arg(long)]
        intermediary_phone: Option<String>,
    },
    /// Change client fields; an empty value clears an optional field
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        intermediary: Option<String>,
        #[arg(long)]
        intermediary_phone: Option<String>,
    },
    /// Delete a client (related records are kept)
    Delete { id: i64 },
    /// Search by name, code, manager or phone
    Search { term: String },
}

#[derive(Subcommand)]
pub(crate) enum OfferCommands {
    /// List pending offers
    List,
    /// Create an offer for a client
    Add {
        client_id: i64,
        title: String,
        amount: Decimal,
        #[arg(long)]
        description: Option<String>,
        /// Offer date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Validity in days (default: 30)
        #[arg(long)]
        validity: Option<i64>,
    },
    /// Approve an offer, turning it into a service
    Approve { id: i64 },
    /// Reject an offer
    Reject {
        id: i64,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum RejectedCommands {
    /// List rejected offers
    List,
}

#[derive(Subcommand)]
pub(crate) enum ServiceCommands {
    /// List approved services
    List,
    /// Send a service to execution
    Execute { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum ExecutionCommands {
    /// List executions in progress
    List,
    /// Mark an execution delivered
    Deliver { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum DeliveryCommands {
    /// List deliveries awaiting billing
    List,
    /// Move a delivery to accounts and issue an invoice
    Bill { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum AccountCommands {
    /// List accounts
    List,
    /// Record full payment of an account
    Pay { id: i64 },
    /// Mark accounts past their due date as overdue
    Refresh {
        #[arg(long)]
        today: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum RenewalCommands {
    /// List renewals
    List,
    /// Schedule a renewal
    Add {
        client_id: i64,
        service_title: String,
        amount: Decimal,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: String,
        /// Renewal date (YYYY-MM-DD, default: today)
        #[arg(long)]
        renewal_date: Option<String>,
        /// Id of the service being renewed
        #[arg(long)]
        service_id: Option<i64>,
    },
    /// Mark a renewal completed
    Complete { id: i64 },
    /// Mark renewals expiring within the notification window as urgent
    Refresh {
        #[arg(long)]
        today: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum SettingsCommands {
    /// Show all settings
    Show,
    /// Change one setting
    Set { key: String, value: String },
}

#[derive(Subcommand)]
pub(crate) enum BackupCommands {
    /// Write a JSON backup of every collection
    Export { path: PathBuf },
    /// Replace collections with those from a JSON backup
    Restore { path: PathBuf },
    /// Write every collection as CSV sections
    Csv { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    logging::init(&config.logging.level, cli.quiet);

    let backend = cli.backend.unwrap_or(config.storage.backend);
    let data = cli.data.clone().unwrap_or_else(|| {
        StorageConfig {
            backend,
            path: config.storage.path.clone(),
        }
        .resolved_path()
    });
    tracing::debug!(?backend, data = %data.display(), "opening store");

    let ctx = Ctx {
        output: cli.output,
        quiet: cli.quiet,
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {e}"), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run(cli.command, backend, &data, &ctx)) {
        report_error(&format!("error: {e}"), cli.output, cli.quiet);
        process::exit(1);
    }
}

fn open_store(backend: Backend, data: &Path) -> Result<Arc<dyn RecordStore>, PipelineError> {
    let store: Arc<dyn RecordStore> = match backend {
        Backend::Sqlite => Arc::new(SqliteStore::open(data)?),
        Backend::Document => Arc::new(DocumentStore::open(data)),
    };
    Ok(store)
}

async fn run(
    command: Commands,
    backend: Backend,
    data: &Path,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    let crm = Crm::new(open_store(backend, data)?);
    let seeded = crm.initialize().await?;

    match command {
        Commands::Init => commands::admin::cmd_init(data, &seeded, ctx),
        Commands::Login { username, password } => {
            commands::admin::cmd_login(&crm, &username, &password, ctx).await
        }
        Commands::Dashboard { today } => {
            commands::admin::cmd_dashboard(&crm, today.as_deref(), ctx).await
        }
        Commands::Client { command } => commands::clients::run(&crm, command, ctx).await,
        Commands::Offer { command } => commands::stages::offers(&crm, command, ctx).await,
        Commands::Rejected { command } => commands::stages::rejected(&crm, command, ctx).await,
        Commands::Service { command } => commands::stages::services(&crm, command, ctx).await,
        Commands::Execution { command } => commands::stages::executions(&crm, command, ctx).await,
        Commands::Delivery { command } => commands::stages::deliveries(&crm, command, ctx).await,
        Commands::Account { command } => commands::stages::accounts(&crm, command, ctx).await,
        Commands::Renewal { command } => commands::stages::renewals(&crm, command, ctx).await,
        Commands::Settings { command } => commands::admin::cmd_settings(&crm, command, ctx).await,
        Commands::Backup { command } => commands::backup::run(&crm, command, ctx).await,
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

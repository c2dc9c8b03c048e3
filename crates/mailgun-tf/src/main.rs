// # mailgun-tf
//
// Local host for the Mailgun provider: reads desired configuration from JSON
// files, drives the resource handlers and keeps state in a JSON state file.
//
// The binary is a thin integration layer. It parses arguments, builds the
// provider configuration and client, and hands every operation to
// `ProviderEngine`.
//
// ## Configuration
//
// - `--domain` / `MAILGUN_DOMAIN`: default sending domain
// - `--apikey` / `MAILGUN_APIKEY`: API key
// - `--api-base` / `MAILGUN_API_BASE`: API base URL
// - `--state` / `MAILGUN_TF_STATE`: state file path
// - `--log-level` / `MAILGUN_TF_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export MAILGUN_DOMAIN=mg.example.com
// export MAILGUN_APIKEY=key-xxxxxxxx
//
// mailgun-tf apply mailgun_domain.main domain.json
// mailgun-tf import mailgun_route.inbound 4f3bad2335335426750048c6
// mailgun-tf destroy mailgun_domain.main --confirm-destroy
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailgun_tf_core::config::{API_BASE_ENV, API_KEY_ENV, DOMAIN_ENV};
use mailgun_tf_core::{
    ApplyOutcome, FileStateStore, ProviderConfig, ProviderEngine, ResourceAddress,
    ResourceRegistry, StateRecord, StateStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum CliExitCode {
    /// Operation completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Remote or state failure while running the operation
    RuntimeError = 2,
}

impl From<CliExitCode> for ExitCode {
    fn from(code: CliExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "mailgun-tf")]
#[command(about = "Manage Mailgun domains and routes as declarative resources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Default Mailgun domain
    #[arg(long, global = true, env = DOMAIN_ENV)]
    domain: Option<String>,

    /// Mailgun API key
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    apikey: Option<String>,

    /// Mailgun API base URL
    #[arg(long, global = true, env = API_BASE_ENV)]
    api_base: Option<String>,

    /// State file
    #[arg(long, global = true, env = "MAILGUN_TF_STATE", default_value = "mailgun.tfstate.json")]
    state: PathBuf,

    /// Log level
    #[arg(long, global = true, env = "MAILGUN_TF_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create, update or replace a resource from a JSON configuration file
    Apply {
        /// Resource address, e.g. mailgun_domain.main
        address: String,
        /// JSON file with the desired attributes
        config: PathBuf,
    },
    /// Re-read a resource from Mailgun into state
    Refresh {
        /// Resource address
        address: String,
    },
    /// Delete a resource and forget its state
    Destroy {
        /// Resource address
        address: String,
        /// Wait until Mailgun no longer returns the object
        #[arg(long)]
        confirm_destroy: bool,
    },
    /// Adopt an existing Mailgun object
    Import {
        /// Resource address
        address: String,
        /// Domain name or route id
        id: String,
    },
    /// Print stored state without contacting Mailgun
    Show {
        /// Resource address
        address: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CliExitCode::ConfigError.into();
    }

    // `show` never contacts Mailgun, so it runs without credentials
    let needs_client = !matches!(cli.command, Command::Show { .. });
    let config = match provider_config(&cli) {
        Ok(config) => Some(config),
        Err(e) if needs_client => {
            eprintln!("Configuration error: {:#}", e);
            return CliExitCode::ConfigError.into();
        }
        Err(_) => None,
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CliExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(cli, config).await {
            Ok(()) => CliExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
                CliExitCode::RuntimeError
            }
        }
    })
    .into()
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    let mut config = ProviderConfig::with_env_fallback(cli.domain.clone(), cli.apikey.clone())?;
    if let Some(api_base) = &cli.api_base {
        config = config.with_api_base(api_base.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: Option<ProviderConfig>) -> Result<()> {
    let store = FileStateStore::new(&cli.state)
        .await
        .with_context(|| format!("opening state file {}", cli.state.display()))?;

    if let Command::Show { address } = &cli.command {
        let address: ResourceAddress = address.parse()?;
        let registry = ResourceRegistry::with_builtin_resources();
        registry.handler(&address.resource_type)?;
        match store.get(&address.to_string()).await? {
            Some(record) => print_record(&record)?,
            None => println!("No state for {}", address),
        }
        return Ok(());
    }

    let config = config.context("provider configuration is required")?;
    let client = mailgun_tf_http::configure(&config)?;

    let confirm_destroy = matches!(
        cli.command,
        Command::Destroy {
            confirm_destroy: true,
            ..
        }
    );
    let engine = ProviderEngine::new(
        ResourceRegistry::with_builtin_resources(),
        client,
        Box::new(store),
    )
    .with_confirm_destroy(confirm_destroy);

    match cli.command {
        Command::Apply { address, config } => {
            let address: ResourceAddress = address.parse()?;
            let raw = tokio::fs::read_to_string(&config)
                .await
                .with_context(|| format!("reading {}", config.display()))?;
            let desired: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", config.display()))?;

            let outcome = engine.apply(&address, &desired).await?;
            report(&address, &outcome);
        }
        Command::Refresh { address } => {
            let address: ResourceAddress = address.parse()?;
            let record = engine.refresh(&address).await?;
            info!("Refreshed {} ({})", address, record.id);
            print_record(&record)?;
        }
        Command::Destroy { address, .. } => {
            let address: ResourceAddress = address.parse()?;
            let outcome = engine.destroy(&address).await?;
            report(&address, &outcome);
        }
        Command::Import { address, id } => {
            let address: ResourceAddress = address.parse()?;
            let record = engine.import(&address, &id).await?;
            info!("Imported {} as {}", record.id, address);
            print_record(&record)?;
        }
        Command::Show { .. } => {}
    }

    Ok(())
}

fn print_record(record: &StateRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

fn report(address: &ResourceAddress, outcome: &ApplyOutcome) {
    match outcome {
        ApplyOutcome::Created { id } => println!("{}: created {}", address, id),
        ApplyOutcome::Updated { id } => println!("{}: updated {}", address, id),
        ApplyOutcome::Replaced {
            previous_id,
            id,
            fields,
        } => println!(
            "{}: replaced {} with {} (changed: {})",
            address,
            previous_id,
            id,
            fields.join(", ")
        ),
        ApplyOutcome::Deleted { id } => println!("{}: destroyed {}", address, id),
        ApplyOutcome::Absent => println!("{}: nothing to destroy", address),
    }
}

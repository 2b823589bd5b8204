//! `sendwell`: operator CLI for the sender settings.
//!
//! Results go to stdout as pretty JSON, logs go to stderr. Exit status is 0
//! on success, 2 when the input fails validation, 1 on any other error.

#![allow(clippy::print_stdout)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sw_core::config::settings::{SettingsStore, SETTINGS_PATH};
use sw_core::security::audit::{AuditLogger, FileAuditLogger, NullAuditLogger, AUDIT_LOG_PATH};
use sw_core::security::sanitize::sanitize;
use sw_core::validation::{FieldErrors, RawEmailConfig, RawSmsConfig};
use sw_services::settings::{SettingsService, SettingsServiceError};

/// Validate, sanitize and store Sendwell sender settings.
#[derive(Parser)]
#[command(name = "sendwell", version)]
struct Cli {
    /// Settings file.
    #[arg(long, global = true, env = "SENDWELL_SETTINGS", default_value = SETTINGS_PATH)]
    settings: PathBuf,

    /// Audit log (JSON lines).
    #[arg(long, global = true, env = "SENDWELL_AUDIT_LOG", default_value = AUDIT_LOG_PATH)]
    audit_log: PathBuf,

    /// Do not write audit events.
    #[arg(long, global = true)]
    no_audit: bool,

    /// Name recorded as the actor in audit events.
    #[arg(long, global = true, env = "SENDWELL_ACTOR", default_value = "cli")]
    actor: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run a form: sanitize and validate without saving.
    Check {
        #[command(subcommand)]
        form: Form,
    },
    /// Print the sanitized form of TEXT (`-` reads stdin).
    Sanitize { text: String },
    /// Read or change the stored settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum Form {
    Email(EmailArgs),
    Sms(SmsArgs),
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    SetEmail(EmailArgs),
    SetSms(SmsArgs),
}

#[derive(Args)]
struct EmailArgs {
    #[arg(long)]
    sender_name: String,
    #[arg(long)]
    business_address: String,
}

impl From<EmailArgs> for RawEmailConfig {
    fn from(args: EmailArgs) -> Self {
        RawEmailConfig::new(args.sender_name, args.business_address)
    }
}

#[derive(Args)]
struct SmsArgs {
    #[arg(long)]
    from_brand: String,
}

impl From<SmsArgs> for RawSmsConfig {
    fn from(args: SmsArgs) -> Self {
        RawSmsConfig::new(args.from_brand)
    }
}

/// How a command that ran to completion turned out.
enum Outcome {
    Accepted,
    Rejected,
}

#[derive(Serialize)]
struct Rejection<'a> {
    errors: &'a FieldErrors,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(Outcome::Accepted) => ExitCode::SUCCESS,
        Ok(Outcome::Rejected) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    // RUST_LOG controls the filter, defaulting to info.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    match cli.command {
        Command::Sanitize { text } => {
            let input = if text == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            } else {
                text
            };
            print_json(&sanitize(&input))?;
            Ok(Outcome::Accepted)
        }
        Command::Check { form } => {
            let service = build_service(&cli.settings, None, &cli.actor)?;
            let checked = match form {
                Form::Email(args) => service
                    .check_email_config(&args.into())
                    .map(serde_json::to_value),
                Form::Sms(args) => service
                    .check_sms_config(&args.into())
                    .map(serde_json::to_value),
            };
            match checked {
                Ok(value) => {
                    print_json(&value?)?;
                    Ok(Outcome::Accepted)
                }
                Err(errors) => reject(&errors),
            }
        }
        Command::Settings { action } => {
            // Only writes are audited; `show` must not need the audit log.
            let writes = !matches!(action, SettingsAction::Show);
            let audit_log = (writes && !cli.no_audit).then_some(cli.audit_log.as_path());
            let service = build_service(&cli.settings, audit_log, &cli.actor)?;
            let updated = match action {
                SettingsAction::Show => {
                    print_json(&service.current()?)?;
                    return Ok(Outcome::Accepted);
                }
                SettingsAction::SetEmail(args) => service
                    .update_email_config(&args.into())
                    .map(serde_json::to_value),
                SettingsAction::SetSms(args) => service
                    .update_sms_config(&args.into())
                    .map(serde_json::to_value),
            };
            match updated {
                Ok(value) => {
                    print_json(&value?)?;
                    Ok(Outcome::Accepted)
                }
                Err(SettingsServiceError::Validation(errors)) => reject(&errors),
                Err(e) => Err(e).context("Failed to update settings"),
            }
        }
    }
}

fn build_service(
    settings: &Path,
    audit_log: Option<&Path>,
    actor: &str,
) -> Result<SettingsService> {
    let audit: Arc<dyn AuditLogger> = match audit_log {
        Some(path) => Arc::new(
            FileAuditLogger::new(path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?,
        ),
        None => Arc::new(NullAuditLogger),
    };
    debug!(settings = %settings.display(), "Using settings file");
    Ok(SettingsService::new(SettingsStore::new(settings), audit, actor))
}

fn reject(errors: &FieldErrors) -> Result<Outcome> {
    print_json(&Rejection { errors })?;
    Ok(Outcome::Rejected)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{text}");
    Ok(())
}

// crunch - command-line driver for the Crunch accounting API client

mod commands;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use crunch_client::CrunchError;
use crunch_config::{ClientConfig, ConfigError};

use exit_codes::{crunch_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "crunch")]
#[command(about = "Crunch accounting API client: authorize, look up reference data, check VAT splits")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/crunch/config.toml)
    #[arg(long, global = true, env = "CRUNCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log every signed request and response
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorization handshake and print (or save) the access token
    #[command(after_help = "\
Examples:
  crunch auth            # prints oauth_token / oauth_token_secret
  crunch auth --save     # writes them into the config file")]
    Auth {
        /// Write the access token into the config file
        #[arg(long)]
        save: bool,
    },

    /// List expense type codes
    ExpenseTypes,

    /// List suppliers
    Suppliers,

    /// List bank accounts, optionally of one type
    Accounts {
        /// Account type, e.g. BUSINESS_CURRENT_ACCOUNT
        #[arg(long = "type")]
        account_type: Option<String>,
    },

    /// List clients
    Clients,

    /// Show the next free invoice reference for a client
    NextRef {
        #[arg(long)]
        client_id: i64,
    },

    /// Show the net / VAT / gross split for an amount (offline)
    #[command(after_help = "\
Examples:
  crunch vat-split 120.00 --expense-type ACCOUNTANCY
  crunch vat-split 50 --quantity 3           # invoice line, VAT added
  crunch vat-split 50 --quantity 3 --no-vat  # invoice line, outside scope")]
    VatSplit {
        /// Gross expense amount, or the unit rate of an invoice line
        amount: String,

        /// Expense type code (expense split)
        #[arg(long, conflicts_with = "quantity")]
        expense_type: Option<String>,

        /// Quantity (invoice line split)
        #[arg(long)]
        quantity: Option<f64>,

        /// Invoice line is outside the scope of VAT
        #[arg(long, requires = "quantity")]
        no_vat: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config errors surface from the command itself.
    let config_debug = ClientConfig::load(cli.config.as_deref())
        .map(|c| c.debug)
        .unwrap_or(false);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(cli.debug, config_debug)),
    )
    .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Auth { save } => commands::cmd_auth(config, cli.debug, save),
        Commands::ExpenseTypes => commands::cmd_expense_types(config, cli.debug),
        Commands::Suppliers => commands::cmd_suppliers(config, cli.debug),
        Commands::Accounts { account_type } => commands::cmd_accounts(config, cli.debug, account_type),
        Commands::Clients => commands::cmd_clients(config, cli.debug),
        Commands::NextRef { client_id } => commands::cmd_next_ref(config, cli.debug, client_id),
        Commands::VatSplit { amount, expense_type, quantity, no_vat } => {
            commands::cmd_vat_split(config, amount, expense_type, quantity, no_vat)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Debug logs are on when either the flag or the loaded config asks for them.
fn log_level(flag: bool, config_debug: bool) -> &'static str {
    if flag || config_debug {
        "debug"
    } else {
        "warn"
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Missing(option) => Some(format!(
                "set {} in the config file or CRUNCH_{} in the environment",
                option,
                option.to_uppercase()
            )),
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    /// Create error from a client error with the matching exit code.
    pub fn crunch(err: CrunchError) -> Self {
        if let CrunchError::Config(e) = err {
            return Self::config(e);
        }
        let code = crunch_exit_code(&err);
        let hint = match &err {
            CrunchError::NotAuthenticated => Some("run `crunch auth --save` first".to_string()),
            CrunchError::Verification(_) => Some("verifiers are single-use; run `crunch auth` again".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<CrunchError> for CliError {
    fn from(err: CrunchError) -> Self {
        Self::crunch(err)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::config(err)
    }
}

use std::io::{self, Write};
use std::path::Path;

use crunch_client::{AmountCalculator, CrunchClient, Money, SnapshotKind, VatRate, VatType};
use crunch_config::{config_path, ClientConfig};

use crate::CliError;

fn load_config(path: Option<&Path>, debug: bool) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load(path)?;
    config.debug |= debug;
    log::debug!("api endpoint {}, auth endpoint {}", config.api_endpoint, config.auth_endpoint);
    Ok(config)
}

/// Authenticated client, or a NotAuthenticated error before any request.
fn connect(path: Option<&Path>, debug: bool) -> Result<CrunchClient, CliError> {
    let config = load_config(path, debug)?;
    let client = CrunchClient::from_config(&config)?;
    if !client.is_authenticated() {
        return Err(CliError::crunch(crunch_client::CrunchError::NotAuthenticated));
    }
    Ok(client)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// auth
// ============================================================================

pub fn cmd_auth(path: Option<&Path>, debug: bool, save: bool) -> Result<(), CliError> {
    let config = load_config(path, debug)?;
    config.validate_for_authorization()?;

    let mut client = CrunchClient::from_config(&config)?;
    let url = client.begin_authorization()?;

    eprintln!("Open this URL, approve access, and copy the verifier:");
    eprintln!("  {}", url);
    if atty::is(atty::Stream::Stdin) {
        eprint!("Verifier: ");
        io::stderr().flush().ok();
    }
    let mut buf = String::new();
    io::stdin()
        .read_line(&mut buf)
        .map_err(|e| CliError::io(format!("failed to read verifier: {}", e)))?;
    let verifier = buf.trim();
    if verifier.is_empty() {
        return Err(CliError::usage("No verifier provided").with_hint("paste the code shown after approving access"));
    }

    let credentials = client.complete_authorization(verifier)?;

    if save {
        let target = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        ClientConfig::save_tokens(&target, &credentials.oauth_token, &credentials.oauth_token_secret)?;
        eprintln!("Access token saved to {}", target.display());
    } else {
        println!("oauth_token = \"{}\"", credentials.oauth_token);
        println!("oauth_token_secret = \"{}\"", credentials.oauth_token_secret);
    }
    Ok(())
}

// ============================================================================
// Lookups
// ============================================================================

pub fn cmd_expense_types(path: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let client = connect(path, debug)?;
    print_json(&client.expense_types()?)
}

pub fn cmd_suppliers(path: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let mut client = connect(path, debug)?;
    let recon = client.ensure_loaded(SnapshotKind::Suppliers)?;
    print_json(recon.suppliers()?)
}

pub fn cmd_accounts(path: Option<&Path>, debug: bool, account_type: Option<String>) -> Result<(), CliError> {
    let mut client = connect(path, debug)?;
    match account_type {
        Some(t) => print_json(&client.accounts_of_type(&t)?),
        None => {
            let recon = client.ensure_loaded(SnapshotKind::Accounts)?;
            print_json(recon.accounts()?)
        }
    }
}

pub fn cmd_clients(path: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let mut client = connect(path, debug)?;
    let recon = client.ensure_loaded(SnapshotKind::Clients)?;
    print_json(recon.clients()?)
}

pub fn cmd_next_ref(path: Option<&Path>, debug: bool, client_id: i64) -> Result<(), CliError> {
    let mut client = connect(path, debug)?;
    let remote_client = client.client(client_id)?;
    let reference = client.next_client_reference(&remote_client)?;
    println!("{}", reference);
    Ok(())
}

// ============================================================================
// vat-split
// ============================================================================

pub fn cmd_vat_split(
    path: Option<&Path>,
    amount: String,
    expense_type: Option<String>,
    quantity: Option<f64>,
    no_vat: bool,
) -> Result<(), CliError> {
    let config = load_config(path, false)?;
    let calculator = AmountCalculator::new(VatRate::from_percent(config.vat_rate));
    let amount: Money = amount
        .parse()
        .map_err(|e| CliError::usage(format!("invalid amount '{}': {}", amount, e)))?;

    let split = match (expense_type, quantity) {
        (Some(t), _) => calculator.expense_split(amount, &t)?,
        (None, Some(q)) => {
            let vat_type = if no_vat { VatType::OutsideScope } else { VatType::Standard };
            calculator.invoice_split(calculator.line_amount(amount, q)?, vat_type)
        }
        (None, None) => {
            return Err(CliError::usage("nothing to split").with_hint("pass --expense-type or --quantity"));
        }
    };

    println!("net   {}", split.net);
    println!("vat   {}", split.vat);
    println!("gross {}", split.gross);
    println!("rate  {}", calculator.rate());
    Ok(())
}

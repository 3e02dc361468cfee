use std::io::{IsTerminal, Read};

use anyhow::Result;
use clap::Parser;
use dialoguer::{Password, theme::ColorfulTheme};

use plexi_client::auth::{self, CredentialStore};
use plexi_client::{Error, PerplexityClient};

mod config;
mod repl;

/// Crisp preamble prepended to one-shot command-line queries.
const QUERY_CRISP: &str = "Concise, code only reply to this prompt: ";

/// Detailed preamble prepended to piped input and code-style REPL queries.
pub(crate) const QUERY_DETAILED: &str =
    "Give me a concise coding example and include URL references in reply to this prompt: ";

#[derive(Parser)]
#[command(name = "plexi", about = "Perplexity coding, scripting, and sysops assistant")]
#[command(version)]
struct Cli {
    /// Query words; the single word "repl" starts an interactive session,
    /// "auth" manages the stored API key
    tokens: Vec<String>,

    /// With "auth": delete the stored API key
    #[arg(long)]
    delete: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.tokens.first().map(String::as_str) {
        Some("repl") if cli.tokens.len() == 1 => run_repl().await,
        Some("auth") if cli.tokens.len() == 1 => run_auth(cli.delete),
        _ => run_query(cli.tokens).await,
    }
}

fn usage() -> &'static str {
    "Syntax: plexi repl | 'your coding question here in single quotes'\n"
}

fn die(msg: &str, code: i32) -> ! {
    eprintln!("{msg}");
    std::process::exit(code);
}

/// Resolve a client from the keyring/environment, with the original tool's
/// exit behavior when no credential can be found.
fn client_from_store() -> Result<PerplexityClient> {
    match PerplexityClient::from_env() {
        Ok(client) => Ok(client),
        Err(Error::CredentialsNotFound(_)) => die(
            "PERPLEXITY_API_KEY undefined in the environment and no key stored; run `plexi auth`",
            2,
        ),
        Err(e) => Err(e.into()),
    }
}

async fn run_repl() -> Result<()> {
    let client = client_from_store()?;
    let mut repl = repl::Repl::new(client)?;
    repl.run().await
}

/// One-shot query from command-line tokens or piped stdin.
async fn run_query(tokens: Vec<String>) -> Result<()> {
    let query = if !tokens.is_empty() {
        format!("{QUERY_CRISP}{}", tokens.join(" "))
    } else if !std::io::stdin().is_terminal() {
        let mut piped = String::new();
        std::io::stdin().read_to_string(&mut piped)?;
        if piped.trim().is_empty() {
            die(usage(), 1);
        }
        format!("{QUERY_DETAILED}{piped}")
    } else {
        die(usage(), 1);
    };

    let client = client_from_store()?;
    let answer = client.query(&query).await?;
    println!("{answer}");
    Ok(())
}

/// Store or delete the API key in the system keyring.
fn run_auth(delete: bool) -> Result<()> {
    let store = CredentialStore::new(auth::SERVICE_NAME).with_env_fallback();

    if delete {
        match store.delete() {
            Ok(()) => println!("Stored API key deleted."),
            Err(Error::CredentialsNotFound(_)) => println!("No API key stored."),
            Err(e) => anyhow::bail!("failed to delete API key: {e}"),
        }
        return Ok(());
    }

    println!("Enter the Perplexity API key (or set {})", auth::ENV_VAR);
    let key = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("API key")
        .interact()?;
    auth::validate_key(&key)?;
    store.set(&key)?;
    println!("API key saved to the system keyring.");
    Ok(())
}

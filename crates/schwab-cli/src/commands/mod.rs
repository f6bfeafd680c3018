mod accounts;
mod auth;
mod chain;
mod history;
mod market;
mod orders;
mod quote;
mod sanitize;
mod transactions;

use std::path::PathBuf;
use std::sync::Arc;

use schwab_api_wrapper::fixtures::{demo_tokens, FixtureHttpClient};
use schwab_api_wrapper::{
    auth as token_auth, ClientConfig, MemoryTokenStore, SchwabClient, TokenStoreKind, UtcDateTime,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Envelope;

const APP_DIR: &str = "schwab-api-wrapper";

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    if let Command::Sanitize(args) = &cli.command {
        return Ok(Envelope::new("sanitize", cli.mock, sanitize::run(args)?));
    }

    let client = build_client(cli).await?;
    let (name, data) = dispatch(&cli.command, &client).await?;
    Ok(Envelope::new(name, cli.mock, data))
}

async fn dispatch(
    command: &Command,
    client: &SchwabClient,
) -> Result<(&'static str, Value), CliError> {
    Ok(match command {
        Command::Auth(args) => ("auth", auth::run(args, client).await?),
        Command::Quote(args) => ("quote", quote::run(args, client).await?),
        Command::History(args) => ("history", history::run(args, client).await?),
        Command::Chain(args) => ("chain", chain::run(args, client).await?),
        Command::Expirations(args) => ("expirations", chain::expirations(args, client).await?),
        Command::Movers(args) => ("movers", market::movers(args, client).await?),
        Command::Hours(args) => ("hours", market::hours(args, client).await?),
        Command::Instruments(args) => ("instruments", market::instruments(args, client).await?),
        Command::Accounts(args) => ("accounts", accounts::run(args, client).await?),
        Command::Orders(args) => ("orders", orders::list(args, client).await?),
        Command::Order(args) => ("order", orders::run(args, client).await?),
        Command::Transactions(args) => ("transactions", transactions::run(args, client).await?),
        Command::Preferences => ("preferences", accounts::preferences(client).await?),
        Command::Sanitize(args) => ("sanitize", sanitize::run(args)?),
    })
}

async fn build_client(cli: &Cli) -> Result<SchwabClient, CliError> {
    if cli.mock {
        let store = MemoryTokenStore::with_tokens(demo_tokens(UtcDateTime::now()));
        return Ok(SchwabClient::builder(ClientConfig::new("mock", "mock"))
            .http_client(Arc::new(FixtureHttpClient::new()))
            .token_store(Arc::new(store))
            .build());
    }

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    debug!(path = %path.display(), "loading config");
    let mut config = ClientConfig::load(&path)?;

    // An in-memory store would lose the session when the process exits.
    if config.token_store.kind == TokenStoreKind::Memory {
        config.token_store.kind = TokenStoreKind::File;
        config.token_store.path = Some(default_token_path()?);
    }
    let store = token_auth::open_store(&config.token_store, &config.client_id).await?;

    Ok(SchwabClient::builder(config).token_store(store).build())
}

fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.yaml"))
        .ok_or_else(|| {
            CliError::Usage(String::from(
                "cannot determine the config directory, pass --config",
            ))
        })
}

fn default_token_path() -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR).join("tokens.json"))
        .ok_or_else(|| {
            CliError::Usage(String::from(
                "cannot determine the data directory, configure token_store.path",
            ))
        })
}

fn parse_date(input: &str) -> Result<time::Date, CliError> {
    schwab_api_wrapper::domain::parse_date(input)
        .ok_or_else(|| CliError::Usage(format!("invalid date '{input}', expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    async fn run_mock(args: &[&str]) -> Result<Envelope, CliError> {
        let argv = ["schwab", "--mock"].iter().chain(args).copied();
        let cli = Cli::try_parse_from(argv).expect("valid arguments");
        run(&cli).await
    }

    #[tokio::test]
    async fn mock_quote_and_accounts_come_from_fixtures() {
        let quote = run_mock(&["quote", "AAPL"]).await.expect("quote");
        assert_eq!(quote.meta.command, "quote");
        assert!(quote.meta.mock);
        assert!(quote.data["quotes"].get("AAPL").is_some());

        let accounts = run_mock(&["accounts", "--positions"]).await.expect("accounts");
        assert!(accounts.data.is_array());
    }

    #[tokio::test]
    async fn mock_order_lifecycle() {
        let placed = run_mock(&[
            "order", "place", "--account", "DEMO123456", "--symbol", "AAPL",
            "--instruction", "buy", "--quantity", "1", "--limit", "100",
        ])
        .await
        .expect("placed");
        assert_eq!(placed.data["order_id"], 1_000_001);

        let canceled = run_mock(&["order", "cancel", "--account", "DEMO123456", "1000001"])
            .await
            .expect("canceled");
        assert_eq!(canceled.data["canceled"], true);

        let listed = run_mock(&["orders", "--account", "DEMO123456", "--status", "working"])
            .await
            .expect("orders");
        assert!(listed.data.is_array());
    }

    #[tokio::test]
    async fn unknown_account_is_an_api_error() {
        let error = run_mock(&["transactions", "--account", "99999999"])
            .await
            .expect_err("account is not linked");
        assert!(matches!(&error, CliError::Api(_)));
        assert_eq!(error.exit_code(), 3);
    }

    #[tokio::test]
    async fn invalid_symbol_is_a_validation_error() {
        let error = run_mock(&["quote", "AA#PL"]).await.expect_err("bad symbol");
        assert_eq!(error.exit_code(), 2);
    }
}

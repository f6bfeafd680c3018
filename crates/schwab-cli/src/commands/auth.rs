use schwab_api_wrapper::SchwabClient;
use serde_json::{json, Value};
use tracing::info;

use crate::cli::{AuthArgs, AuthCommand};
use crate::error::CliError;

/// Token values are never printed, only their state and expiry times.
pub async fn run(args: &AuthArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let tokens = client.tokens();
    match &args.command {
        AuthCommand::Url => Ok(json!({
            "authorization_url": client.oauth().authorization_url(),
            "redirect_uri": client.config().redirect_uri,
        })),
        AuthCommand::Login { redirect_url } => {
            tokens.complete_login(redirect_url).await?;
            info!("login complete");
            Ok(serde_json::to_value(tokens.status().await)?)
        }
        AuthCommand::Refresh => {
            tokens.force_refresh().await?;
            Ok(serde_json::to_value(tokens.status().await)?)
        }
        AuthCommand::Status => Ok(serde_json::to_value(tokens.status().await)?),
        AuthCommand::Logout => {
            tokens.logout().await?;
            Ok(json!({ "logged_out": true }))
        }
    }
}

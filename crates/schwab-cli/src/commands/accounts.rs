use schwab_api_wrapper::SchwabClient;
use serde_json::Value;

use crate::cli::AccountsArgs;
use crate::error::CliError;

pub async fn run(args: &AccountsArgs, client: &SchwabClient) -> Result<Value, CliError> {
    if args.numbers {
        return Ok(serde_json::to_value(client.account_numbers().await?)?);
    }

    match &args.account {
        Some(number) => Ok(serde_json::to_value(
            client.account(number, args.positions).await?,
        )?),
        None => Ok(serde_json::to_value(
            client.accounts(args.positions).await?,
        )?),
    }
}

pub async fn preferences(client: &SchwabClient) -> Result<Value, CliError> {
    Ok(serde_json::to_value(client.user_preference().await?)?)
}

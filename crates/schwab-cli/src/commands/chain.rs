use schwab_api_wrapper::{ContractType, OptionChainParams, SchwabClient, Symbol};
use serde_json::Value;

use super::parse_date;
use crate::cli::{ChainArgs, SymbolArgs};
use crate::error::CliError;

pub async fn run(args: &ChainArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let mut params = OptionChainParams::new(Symbol::parse(&args.symbol)?);
    params.contract_type = args
        .contract_type
        .as_deref()
        .map(ContractType::parse)
        .transpose()?;
    params.strike_count = args.strike_count;
    params.strike = args.strike;
    params.from_date = args.from.as_deref().map(parse_date).transpose()?;
    params.to_date = args.to.as_deref().map(parse_date).transpose()?;
    params.include_underlying_quote = args.include_underlying.then_some(true);

    let chain = client.option_chain(&params).await?;
    Ok(serde_json::to_value(chain)?)
}

pub async fn expirations(args: &SymbolArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let chain = client.expiration_chain(&symbol).await?;
    Ok(serde_json::to_value(chain)?)
}

use schwab_api_wrapper::{CacheMode, QuoteField, SchwabClient, Symbol};
use serde_json::Value;

use crate::cli::QuoteArgs;
use crate::error::CliError;

pub async fn run(args: &QuoteArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let symbols = Symbol::parse_many(&args.symbols)?;
    let fields = args
        .fields
        .iter()
        .map(|field| QuoteField::parse(field))
        .collect::<Result<Vec<_>, _>>()?;

    let client = if args.refresh {
        client.with_cache_mode(CacheMode::Refresh)
    } else {
        client.clone()
    };

    let response = match symbols.as_slice() {
        [single] if !args.indicative => client.quote(single, &fields).await?,
        _ => client.quotes(&symbols, &fields, args.indicative).await?,
    };
    Ok(serde_json::to_value(response)?)
}

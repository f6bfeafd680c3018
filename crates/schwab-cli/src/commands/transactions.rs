use schwab_api_wrapper::domain::TransactionType;
use schwab_api_wrapper::{SchwabClient, Symbol, TransactionFilter};
use serde_json::Value;

use crate::cli::TransactionsArgs;
use crate::error::CliError;

pub async fn run(args: &TransactionsArgs, client: &SchwabClient) -> Result<Value, CliError> {
    if let Some(id) = args.id {
        let transaction = client.transaction(&args.account, id).await?;
        return Ok(serde_json::to_value(transaction)?);
    }

    let filter = filter(args)?;
    let transactions = client.transactions(&args.account, &filter).await?;
    Ok(serde_json::to_value(transactions)?)
}

fn filter(args: &TransactionsArgs) -> Result<TransactionFilter, CliError> {
    let mut filter = TransactionFilter::last_days(args.days);
    if !args.types.is_empty() {
        filter.types = args
            .types
            .iter()
            .map(|raw| {
                TransactionType::parse(raw)
                    .ok_or_else(|| CliError::Usage(format!("unknown transaction type '{raw}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(symbol) = &args.symbol {
        filter = filter.with_symbol(Symbol::parse(symbol)?);
    }
    Ok(filter)
}

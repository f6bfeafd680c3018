use schwab_api_wrapper::{
    FrequencyType, PeriodType, PriceHistoryParams, SchwabClient, Symbol, UtcDateTime,
};
use serde_json::Value;

use crate::cli::HistoryArgs;
use crate::error::CliError;

pub async fn run(args: &HistoryArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let params = params(args)?;
    let history = client.price_history(&params).await?;
    Ok(serde_json::to_value(history)?)
}

fn params(args: &HistoryArgs) -> Result<PriceHistoryParams, CliError> {
    let mut params = PriceHistoryParams::new(Symbol::parse(&args.symbol)?);

    if let Some(period_type) = &args.period_type {
        params = params.with_period(PeriodType::parse(period_type)?, args.period);
    } else if args.period.is_some() {
        return Err(CliError::Usage(String::from("--period needs --period-type")));
    }

    if let Some(frequency_type) = &args.frequency_type {
        params = params.with_frequency(FrequencyType::parse(frequency_type)?, args.frequency);
    } else {
        params.frequency = args.frequency;
    }

    match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            params = params.with_range(UtcDateTime::parse(start)?, UtcDateTime::parse(end)?);
        }
        (Some(start), None) => params.start_date = Some(UtcDateTime::parse(start)?),
        (None, Some(end)) => params.end_date = Some(UtcDateTime::parse(end)?),
        (None, None) => {}
    }

    if args.extended_hours {
        params.need_extended_hours_data = Some(true);
    }
    Ok(params)
}

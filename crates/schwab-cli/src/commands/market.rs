use schwab_api_wrapper::{MarketId, MoverIndex, MoverSort, Projection, SchwabClient};
use serde_json::Value;

use super::parse_date;
use crate::cli::{HoursArgs, InstrumentsArgs, MoversArgs};
use crate::error::CliError;

pub async fn movers(args: &MoversArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let index = MoverIndex::parse(&args.index)?;
    let sort = args.sort.as_deref().map(MoverSort::parse).transpose()?;
    let movers = client.movers(index, sort, args.frequency).await?;
    Ok(serde_json::to_value(movers)?)
}

pub async fn hours(args: &HoursArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let markets = args
        .markets
        .iter()
        .map(|market| MarketId::parse(market))
        .collect::<Result<Vec<_>, _>>()?;
    let date = args.date.as_deref().map(parse_date).transpose()?;

    let hours = match markets.as_slice() {
        [single] => client.market_hours_for(*single, date).await?,
        _ => client.market_hours(&markets, date).await?,
    };
    Ok(serde_json::to_value(hours)?)
}

pub async fn instruments(args: &InstrumentsArgs, client: &SchwabClient) -> Result<Value, CliError> {
    if args.cusip {
        let instrument = client.instrument_by_cusip(&args.query).await?;
        return Ok(serde_json::to_value(instrument)?);
    }

    let projection = Projection::parse(&args.projection)?;
    let instruments = client.instruments(&args.query, projection).await?;
    Ok(serde_json::to_value(instruments)?)
}

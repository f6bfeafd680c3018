use time::Date;
use tracing::instrument;

use super::params::join;
use super::{
    MarketId, MoverIndex, MoverSort, OptionChainParams, PriceHistoryParams, Projection,
    QuoteField, SchwabClient, Surface, MOVER_FREQUENCIES,
};
use crate::domain::{
    format_date, ExpirationChain, InstrumentInfo, InstrumentsResponse, MarketHours, Mover,
    MoversResponse, OptionChain, PriceHistory, QuoteResponse,
};
use crate::http_client::HttpMethod;
use crate::{ApiError, Symbol, ValidationError};

impl SchwabClient {
    /// `GET /quotes` for one or more symbols.
    #[instrument(skip(self), fields(count = symbols.len()))]
    pub async fn quotes(
        &self,
        symbols: &[Symbol],
        fields: &[QuoteField],
        indicative: bool,
    ) -> Result<QuoteResponse, ApiError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptySymbolList.into());
        }

        let request = self
            .request(Surface::MarketData, HttpMethod::Get, "/quotes")
            .with_query("symbols", join(symbols, Symbol::as_str))
            .with_optional_query(
                "fields",
                (!fields.is_empty()).then(|| join(fields, |field| field.as_str())),
            )
            .with_query("indicative", indicative.to_string());

        let ttl = Some(self.config().quote_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    /// `GET /{symbol}/quotes`.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn quote(
        &self,
        symbol: &Symbol,
        fields: &[QuoteField],
    ) -> Result<QuoteResponse, ApiError> {
        let path = format!("/{}/quotes", urlencoding::encode(symbol.as_str()));
        let request = self
            .request(Surface::MarketData, HttpMethod::Get, &path)
            .with_optional_query(
                "fields",
                (!fields.is_empty()).then(|| join(fields, |field| field.as_str())),
            );

        let ttl = Some(self.config().quote_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    #[instrument(skip(self, params), fields(symbol = %params.symbol))]
    pub async fn option_chain(&self, params: &OptionChainParams) -> Result<OptionChain, ApiError> {
        params.validate()?;
        let request = params.query().into_iter().fold(
            self.request(Surface::MarketData, HttpMethod::Get, "/chains"),
            |request, (name, value)| request.with_query(name, value),
        );

        let ttl = Some(self.config().quote_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn expiration_chain(&self, symbol: &Symbol) -> Result<ExpirationChain, ApiError> {
        let request = self
            .request(Surface::MarketData, HttpMethod::Get, "/expirationchain")
            .with_query("symbol", symbol.as_str());

        let ttl = Some(self.config().reference_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    /// `GET /pricehistory`. Candles violating the OHLC invariant are
    /// reported as a decode error.
    #[instrument(skip(self, params), fields(symbol = %params.symbol))]
    pub async fn price_history(
        &self,
        params: &PriceHistoryParams,
    ) -> Result<PriceHistory, ApiError> {
        params.validate()?;
        let request = params.query().into_iter().fold(
            self.request(Surface::MarketData, HttpMethod::Get, "/pricehistory"),
            |request, (name, value)| request.with_query(name, value),
        );

        let ttl = Some(self.config().quote_ttl());
        let history: PriceHistory = self.get_json(Surface::MarketData, request, ttl).await?;
        history
            .validate()
            .map_err(|error| ApiError::decode(format!("invalid candle in price history: {error}")))?;
        Ok(history)
    }

    /// `GET /movers/{index}`. `frequency` is the minimum percent change
    /// and must be one of 0, 1, 5, 10, 30 or 60.
    #[instrument(skip(self))]
    pub async fn movers(
        &self,
        index: MoverIndex,
        sort: Option<MoverSort>,
        frequency: Option<u32>,
    ) -> Result<Vec<Mover>, ApiError> {
        if let Some(value) = frequency.filter(|value| !MOVER_FREQUENCIES.contains(value)) {
            return Err(ValidationError::InvalidChoice {
                field: "frequency",
                value: value.to_string(),
                expected: "0 1 5 10 30 60",
            }
            .into());
        }

        let path = format!("/movers/{}", urlencoding::encode(index.as_str()));
        let request = self
            .request(Surface::MarketData, HttpMethod::Get, &path)
            .with_optional_query("sort", sort.map(MoverSort::as_str))
            .with_optional_query("frequency", frequency.map(|value| value.to_string()));

        let ttl = Some(self.config().quote_ttl());
        let response: MoversResponse = self.get_json(Surface::MarketData, request, ttl).await?;
        Ok(response.screeners)
    }

    /// `GET /markets` for several markets on `date` (today when `None`).
    #[instrument(skip(self))]
    pub async fn market_hours(
        &self,
        markets: &[MarketId],
        date: Option<Date>,
    ) -> Result<MarketHours, ApiError> {
        if markets.is_empty() {
            return Err(ValidationError::InvalidChoice {
                field: "market",
                value: String::new(),
                expected: "equity option bond future forex",
            }
            .into());
        }

        let request = self
            .request(Surface::MarketData, HttpMethod::Get, "/markets")
            .with_query("markets", join(markets, |market| market.as_str()))
            .with_optional_query("date", date.map(format_date));

        let ttl = Some(self.config().reference_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    /// `GET /markets/{market_id}`.
    #[instrument(skip(self))]
    pub async fn market_hours_for(
        &self,
        market: MarketId,
        date: Option<Date>,
    ) -> Result<MarketHours, ApiError> {
        let path = format!("/markets/{}", market.as_str());
        let request = self
            .request(Surface::MarketData, HttpMethod::Get, &path)
            .with_optional_query("date", date.map(format_date));

        let ttl = Some(self.config().reference_ttl());
        self.get_json(Surface::MarketData, request, ttl).await
    }

    /// `GET /instruments` searching by symbol or description.
    #[instrument(skip(self))]
    pub async fn instruments(
        &self,
        query: &str,
        projection: Projection,
    ) -> Result<Vec<InstrumentInfo>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptySymbol.into());
        }

        let request = self
            .request(Surface::MarketData, HttpMethod::Get, "/instruments")
            .with_query("symbol", query)
            .with_query("projection", projection.as_str());

        let ttl = Some(self.config().reference_ttl());
        let response: InstrumentsResponse =
            self.get_json(Surface::MarketData, request, ttl).await?;
        Ok(response.instruments)
    }

    /// `GET /instruments/{cusip}`.
    #[instrument(skip(self))]
    pub async fn instrument_by_cusip(&self, cusip: &str) -> Result<InstrumentInfo, ApiError> {
        let cusip = cusip.trim();
        if cusip.len() != 9 || !cusip.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(ApiError::invalid_request(format!(
                "'{cusip}' is not a 9 character CUSIP"
            )));
        }

        let path = format!("/instruments/{cusip}");
        let request = self.request(Surface::MarketData, HttpMethod::Get, &path);

        let ttl = Some(self.config().reference_ttl());
        let response: InstrumentsResponse =
            self.get_json(Surface::MarketData, request, ttl).await?;
        response
            .instruments
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(format!("no instrument with CUSIP {cusip}")))
    }
}

//! CLI argument definitions for `schwab`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `auth` | OAuth login, refresh, status and logout |
//! | `quote` | Quotes for one or more symbols |
//! | `history` | Price history candles |
//! | `chain` | Option chain for an underlying |
//! | `expirations` | Option expiration dates |
//! | `movers` | Top movers of an index |
//! | `hours` | Market hours |
//! | `instruments` | Instrument search |
//! | `accounts` | Linked accounts, balances and positions |
//! | `orders` | Orders for one or all accounts |
//! | `order` | Get, cancel, place or preview a single order |
//! | `transactions` | Account transactions |
//! | `preferences` | User preferences |
//! | `sanitize` | Redact recorded responses into fixtures |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `<config dir>/schwab-api-wrapper/config.yaml` | YAML config file |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Answer from bundled fixtures, no network |
//! | `-v` | warn | Repeat for info, debug, trace |
//! | `--log-format` | `pretty` | Log output on stderr (pretty, json) |
//!
//! # Examples
//!
//! ```bash
//! schwab auth url
//! schwab auth login --redirect-url 'https://127.0.0.1/?code=...'
//! schwab quote AAPL MSFT --fields quote,fundamental --pretty
//! schwab history AAPL --period-type month --frequency-type daily
//! schwab orders --account 12345678 --days 7 --format table
//! schwab --mock accounts --positions
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Schwab Trader and Market Data API from the command line
#[derive(Debug, Parser)]
#[command(
    name = "schwab",
    author,
    version,
    about = "Schwab Trader and Market Data API client",
    long_about = "Query quotes, price history, option chains and market hours, and manage \
accounts and orders through the Schwab HTTP API.\n\
\n\
Run 'schwab auth url' then 'schwab auth login --redirect-url <url>' once; tokens are \
refreshed automatically afterwards until the seven day refresh token expires.\n\
\n\
Use 'schwab <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Path of the YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve responses from the bundled sanitized fixtures instead of the API.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON document.
    Json,
    /// Aligned columns for terminal display.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the OAuth session.
    Auth(AuthArgs),

    /// Fetch quotes for one or more symbols.
    ///
    ///   schwab quote AAPL MSFT
    ///   schwab quote AAPL --fields quote,fundamental
    Quote(QuoteArgs),

    /// Fetch price history candles.
    ///
    ///   schwab history AAPL --period-type day --frequency 5
    History(HistoryArgs),

    /// Fetch the option chain of an underlying.
    Chain(ChainArgs),

    /// List option expiration dates of an underlying.
    Expirations(SymbolArgs),

    /// Top movers of an index.
    ///
    ///   schwab movers '$SPX' --sort percent_change_up
    Movers(MoversArgs),

    /// Market hours for one or more markets.
    Hours(HoursArgs),

    /// Search instruments by symbol or description.
    Instruments(InstrumentsArgs),

    /// Linked accounts with balances and, optionally, positions.
    Accounts(AccountsArgs),

    /// Orders for one account, or every linked account.
    Orders(OrdersArgs),

    /// Work with a single order.
    Order(OrderArgs),

    /// Account transactions.
    Transactions(TransactionsArgs),

    /// User preferences and streamer details.
    Preferences,

    /// Redact recorded responses so they can be committed as fixtures.
    Sanitize(SanitizeArgs),
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Print the URL to open in a browser to authorize this app.
    Url,
    /// Exchange the code in the URL the browser was redirected to.
    Login {
        #[arg(long)]
        redirect_url: String,
    },
    /// Refresh the access token now.
    Refresh,
    /// Show token state and expiry times.
    Status,
    /// Remove stored tokens.
    Logout,
}

#[derive(Debug, Args)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Blocks to include: quote, fundamental, extended, reference, regular.
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Include indicative quotes for ETFs.
    #[arg(long, default_value_t = false)]
    pub indicative: bool,

    /// Skip the response cache.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// day, month, year or ytd.
    #[arg(long)]
    pub period_type: Option<String>,

    #[arg(long)]
    pub period: Option<u32>,

    /// minute, daily, weekly or monthly.
    #[arg(long)]
    pub frequency_type: Option<String>,

    #[arg(long)]
    pub frequency: Option<u32>,

    /// Range start (RFC 3339, UTC).
    #[arg(long)]
    pub start: Option<String>,

    /// Range end (RFC 3339, UTC).
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long, default_value_t = false)]
    pub extended_hours: bool,
}

#[derive(Debug, Args)]
pub struct ChainArgs {
    pub symbol: String,

    /// CALL, PUT or ALL.
    #[arg(long)]
    pub contract_type: Option<String>,

    #[arg(long)]
    pub strike_count: Option<u32>,

    #[arg(long)]
    pub strike: Option<f64>,

    /// First expiration date (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,

    /// Last expiration date (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long, default_value_t = false)]
    pub include_underlying: bool,
}

#[derive(Debug, Args)]
pub struct MoversArgs {
    /// $DJI, $COMPX, $SPX, NYSE, NASDAQ, OTCBB, INDEX_ALL, EQUITY_ALL,
    /// OPTION_ALL, OPTION_PUT or OPTION_CALL.
    pub index: String,

    /// VOLUME, TRADES, PERCENT_CHANGE_UP or PERCENT_CHANGE_DOWN.
    #[arg(long)]
    pub sort: Option<String>,

    /// Minimum percent change: 0, 1, 5, 10, 30 or 60.
    #[arg(long)]
    pub frequency: Option<u32>,
}

#[derive(Debug, Args)]
pub struct HoursArgs {
    /// equity, option, bond, future or forex.
    #[arg(required = true)]
    pub markets: Vec<String>,

    /// Trading date (YYYY-MM-DD), today when omitted.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct InstrumentsArgs {
    /// Symbol, description or, with --cusip, a CUSIP.
    pub query: String,

    /// symbol-search, symbol-regex, desc-search, desc-regex, search or
    /// fundamental.
    #[arg(long, default_value = "symbol-search")]
    pub projection: String,

    /// Look the query up as a CUSIP.
    #[arg(long, default_value_t = false, conflicts_with = "projection")]
    pub cusip: bool,
}

#[derive(Debug, Args)]
pub struct AccountsArgs {
    /// Single account number; all linked accounts when omitted.
    #[arg(long)]
    pub account: Option<String>,

    #[arg(long, default_value_t = false)]
    pub positions: bool,

    /// Only list account numbers with their hashes.
    #[arg(long, default_value_t = false, conflicts_with_all = ["account", "positions"])]
    pub numbers: bool,
}

#[derive(Debug, Args)]
pub struct OrdersArgs {
    /// Account number; every linked account when omitted.
    #[arg(long)]
    pub account: Option<String>,

    /// Look back this many days.
    #[arg(long, default_value_t = 30)]
    pub days: i64,

    #[arg(long)]
    pub max_results: Option<u32>,

    /// Order status such as WORKING or FILLED.
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommand,
}

#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Show one order.
    Get(OrderRef),
    /// Cancel an open order.
    Cancel(OrderRef),
    /// Place an order and print its id.
    Place(OrderSpec),
    /// Run the order checks without placing it.
    Preview(OrderSpec),
}

#[derive(Debug, Args)]
pub struct OrderRef {
    #[arg(long)]
    pub account: String,

    pub order_id: i64,
}

#[derive(Debug, Args)]
pub struct OrderSpec {
    #[arg(long)]
    pub account: String,

    /// Full order as JSON; the leg options are ignored when set.
    #[arg(long, conflicts_with_all = ["symbol", "instruction", "quantity"])]
    pub file: Option<PathBuf>,

    #[arg(long, required_unless_present = "file")]
    pub symbol: Option<String>,

    #[arg(long, value_enum, required_unless_present = "file")]
    pub instruction: Option<InstructionArg>,

    #[arg(long, required_unless_present = "file")]
    pub quantity: Option<f64>,

    /// Limit price; a market order when omitted.
    #[arg(long)]
    pub limit: Option<f64>,

    /// Stop price; makes the order a stop or stop limit order.
    #[arg(long)]
    pub stop: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstructionArg {
    Buy,
    Sell,
    SellShort,
    BuyToCover,
}

#[derive(Debug, Args)]
pub struct TransactionsArgs {
    #[arg(long)]
    pub account: String,

    /// Fetch a single transaction by id.
    #[arg(long, conflicts_with_all = ["days", "types", "symbol"])]
    pub id: Option<i64>,

    /// Look back this many days.
    #[arg(long, default_value_t = 30)]
    pub days: i64,

    /// Transaction types such as TRADE or DIVIDEND_OR_INTEREST; all when omitted.
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,

    #[arg(long)]
    pub symbol: Option<String>,
}

#[derive(Debug, Args)]
pub struct SanitizeArgs {
    /// Directory of recorded JSON responses.
    #[arg(long)]
    pub input: PathBuf,

    /// Directory the sanitized files are written to.
    #[arg(long)]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["schwab", "quote", "AAPL", "MSFT", "--mock", "-vv"])
            .expect("valid arguments");
        assert!(cli.mock);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Quote(args) => assert_eq!(args.symbols, ["AAPL", "MSFT"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn order_place_requires_legs_or_file() {
        let missing = Cli::try_parse_from(["schwab", "order", "place", "--account", "1"]);
        assert!(missing.is_err());

        let from_file = Cli::try_parse_from([
            "schwab", "order", "place", "--account", "1", "--file", "order.json",
        ]);
        assert!(from_file.is_ok());
    }
}

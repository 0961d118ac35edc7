use std::env;

use clap::{Arg, ArgMatches};

use credit_market::prices::{FeedError, SheetsFeed};

pub const DEFAULT_LEDGER: &str = "credit_data.json";
pub const DEFAULT_SHEET: &str = "1y3rMtxTl8h-KtJJdI1x2Yy3TY02lGvdB4bBGteIh5Ao";
pub const DEFAULT_RANGE: &str = "Prices";

pub fn ledger_arg() -> Arg<'static, 'static> {
    Arg::with_name("ledger")
        .long("ledger")
        .takes_value(true)
        .default_value(DEFAULT_LEDGER)
        .help("path to the ledger json")
}

pub fn sheet_arg() -> Arg<'static, 'static> {
    Arg::with_name("sheet")
        .long("sheet")
        .takes_value(true)
        .default_value(DEFAULT_SHEET)
        .help("id of the stock market spreadsheet")
}

pub fn range_arg() -> Arg<'static, 'static> {
    Arg::with_name("range")
        .long("range")
        .takes_value(true)
        .default_value(DEFAULT_RANGE)
        .help("sheet range holding the prices")
}

pub fn user_arg() -> Arg<'static, 'static> {
    Arg::with_name("user")
        .required(true)
        .help("user id of the account")
}

pub fn amount_arg() -> Arg<'static, 'static> {
    Arg::with_name("amount")
        .required(true)
        .allow_hyphen_values(true)
        .help("number of credits")
}

pub fn ledger_path<'a>(args: &'a ArgMatches<'_>) -> &'a str {
    args.value_of("ledger").unwrap_or(DEFAULT_LEDGER)
}

// the api key comes from SHEETS_API_KEY, which may be set in a .env file
pub fn sheets_feed(args: &ArgMatches<'_>) -> Result<SheetsFeed, FeedError> {
    SheetsFeed::new(
        args.value_of("sheet").unwrap_or(DEFAULT_SHEET),
        args.value_of("range").unwrap_or(DEFAULT_RANGE),
        env::var("SHEETS_API_KEY").ok(),
    )
}

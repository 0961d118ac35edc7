// one-off commands for looking after the game outside of chat
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use log::{info, warn};

use credit_market::commands;
use credit_market::{JsonFileStore, Ledger, PriceFeed};

use crate::args;

const RETRY_DELAY: Duration = Duration::from_secs(60);

pub fn prices_command() -> App<'static, 'static> {
    App::new("prices")
        .about("prints the current price table")
        .after_help("fetches the stock market sheet and prints every team's price history")
        .arg(Arg::with_name("retry")
            .long("retry")
            .help("keep retrying every minute while the sheet is unreachable"))
        .arg(args::sheet_arg())
        .arg(args::range_arg())
}

pub fn grant_command() -> App<'static, 'static> {
    App::new("grant")
        .about("adds credits to an account")
        .after_help("adds (or with a negative amount, removes) credits; balances may go below zero")
        .arg(args::user_arg())
        .arg(args::amount_arg())
        .arg(args::ledger_arg())
}

pub fn set_command() -> App<'static, 'static> {
    App::new("set")
        .about("sets an account's credits")
        .arg(args::user_arg())
        .arg(args::amount_arg())
        .arg(args::ledger_arg())
}

fn amount(args: &ArgMatches<'_>) -> Result<i64, Box<dyn std::error::Error>> {
    let amount = args.value_of("amount").unwrap_or_default();
    amount
        .parse::<i64>()
        .map_err(|error| format!("invalid amount {:?}: {}", amount, error).into())
}

pub async fn prices(args: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let feed = args::sheets_feed(args)?;
    let retry = args.is_present("retry");
    loop {
        match feed.get_prices().await {
            Ok(prices) => {
                let (table, _) = commands::price_table(&prices, &[]);
                print!("{}", table);
                return Ok(());
            }
            Err(error) if retry => {
                warn!("{}; trying again in {} seconds", error, RETRY_DELAY.as_secs());
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(error) => return Err(error.into()),
        }
    }
}

pub fn grant(args: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let user = args.value_of("user").unwrap_or_default();
    let mut ledger = Ledger::open(JsonFileStore::new(args::ledger_path(args)))?;
    let balance = ledger.adjust_balance(user, amount(args)?)?;
    println!("{} now has {} credits", user, balance);
    Ok(())
}

pub fn set(args: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let user = args.value_of("user").unwrap_or_default();
    let amount = amount(args)?;
    let mut ledger = Ledger::open(JsonFileStore::new(args::ledger_path(args)))?;
    ledger.set_balance(user, amount)?;
    info!("wrote ledger to {}", ledger.store().path().display());
    println!("{} now has {} credits", user, amount);
    Ok(())
}

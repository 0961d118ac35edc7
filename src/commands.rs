// turns `!stocks ...` chat messages into ledger and trading operations
//
// the router has the following properties:
//  - messages that aren't stock market commands are ignored
//  - every command that needs prices fetches a fresh snapshot from the feed
//  - trading mistakes are answered with a message; feed and ledger failures are returned to the caller
//  - an account is only changed once the ledger has stored the change
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use crate::error::Error;
use crate::ledger::{AccountStore, Ledger};
use crate::market::{Fill, Trade};
use crate::prices::{PriceFeed, PriceTable};
use crate::trading::{self, Line, Standing, TradingEngine, Valuation};

pub const PREFIXES: [&str; 4] = ["stocks", "stock", "stonks", "stonk"];

pub const HELP: &str = "Stocks commands:```\
Whenever I have multiple commands like stocks/stock that means any of the listed ones work. All commands start with !\
\n\n!stocks/stock/stonks/stonk\
\n\t-\tBasic commands to use the bot. The base command is the same as using the league/lcs option.\
\n\n!stocks team/teams [team 1 abbreviation] [team 2 abbreviation]\
\n\t-\tShow the prices of the listed team or teams.\
\n\t-\te.g. !stocks team tl c9 tsm\
\n\n!stocks league/lcs\
\n\t-\tShow the prices of every team over the season.\
\n\n!stocks buy/purchase [team abbreviation] [amount]\
\n\t-\tPurchase the specified amount of stocks for the requested team.\
\n\t-\te.g. !stocks buy tl 5\
\n\n!stocks sell [team abbreviation] [amount]\
\n\t-\tSell the specified amount of stocks for the requested team.\
\n\t-\te.g. !stocks sell tl 5\
\n\n!stocks status\
\n\t-\tShow your account value including all of your stocks\
\n\n!stocks leaderboard\
\n\t-\tShow what every player is worth```";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}. Use the following command for help.\n!stocks help")]
    UnknownCommand(String),
    #[error("Not enough commands, see !stocks help for guidance.")]
    MissingArguments,
    #[error("Invalid number of stocks, see !stocks help for guidance.")]
    InvalidNumber(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    League,
    Teams(Vec<String>),
    Trade(Trade),
    Status,
    Leaderboard,
    Help,
}

impl Command {
    // Ok(None) when the message isn't meant for the stock market
    pub fn parse(message: &str) -> Result<Option<Command>, CommandError> {
        let mut words = message.split_whitespace();
        match words.next().and_then(|word| word.strip_prefix('!')) {
            Some(prefix) if PREFIXES.contains(&prefix) => (),
            _ => return Ok(None),
        }
        let command = match words.next() {
            Some(command) => command,
            None => return Ok(Some(Command::League)),
        };
        let args: Vec<&str> = words.collect();
        let command = match command {
            "league" | "lcs" => Command::League,
            "team" | "teams" => {
                let teams: Vec<String> = args.iter().map(|team| team_symbol(team)).filter(|team| !team.is_empty()).collect();
                if teams.is_empty() {
                    Command::League
                } else {
                    Command::Teams(teams)
                }
            }
            "buy" | "purchase" => {
                let (team, quantity) = trade_args(&args)?;
                Command::Trade(Trade::buy(&team, quantity))
            }
            "sell" => {
                let (team, quantity) = trade_args(&args)?;
                Command::Trade(Trade::sell(&team, quantity))
            }
            "status" => Command::Status,
            "leaderboard" => Command::Leaderboard,
            "help" => Command::Help,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn team_symbol(raw: &str) -> String {
    raw.replace(',', "").trim().to_uppercase()
}

fn trade_args(args: &[&str]) -> Result<(String, i64), CommandError> {
    match args {
        [team, quantity, ..] => {
            let quantity = quantity
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidNumber(quantity.to_string()))?;
            Ok((team_symbol(team), quantity))
        }
        _ => Err(CommandError::MissingArguments),
    }
}

// tabular reply; the chat side decides how to draw it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub caption: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(caption: &str, headers: &[&str]) -> Table {
        Table {
            caption: caption.to_string(),
            headers: headers.iter().map(|header| header.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let cells: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    writeln!(f, "{}", cells.join(" | ").trim_end())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|header| header.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }

        if !self.caption.is_empty() {
            writeln!(f, "{}", self.caption)?;
        }
        write_row(f, &self.headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &self.rows {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub text: Option<String>,
    pub table: Option<Table>,
}

impl Response {
    pub fn text<S: Into<String>>(text: S) -> Response {
        Response { text: Some(text.into()), table: None }
    }

    pub fn table(table: Table) -> Response {
        Response { text: None, table: Some(table) }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{}", table)?;
        }
        if let Some(text) = &self.text {
            writeln!(f, "{}", text)?;
        }
        Ok(())
    }
}

// price table for `teams`, or every team when empty; also returns the teams that weren't found
pub fn price_table(prices: &PriceTable, teams: &[String]) -> (Table, Vec<String>) {
    let missing: Vec<String> = teams.iter().filter(|team| !prices.contains(team)).cloned().collect();
    let mut table = Table::new("LCS stock market values:", &["Team", "Value", "Last Week", "Min", "Max", "Avg"]);
    for summary in prices.summaries() {
        if !teams.is_empty() && !teams.contains(&summary.team) {
            continue;
        }
        let last_week = match summary.last_week {
            Some(change) if change > 0 => format!("+{}", change),
            Some(change) => change.to_string(),
            None => "N/A".to_string(),
        };
        table.push(vec![
            summary.team,
            summary.value.to_string(),
            last_week,
            summary.min.to_string(),
            summary.max.to_string(),
            format!("{:.1}", summary.average),
        ]);
    }
    (table, missing)
}

pub fn status_table(name: &str, valuation: &Valuation) -> Table {
    let mut table = Table::new(&format!("{}'s total worth table:", name), &["Team", "Price", "Amount", "Total Value"]);
    for line in valuation.breakdown() {
        table.push(match line {
            Line::Team(position) => vec![
                position.team,
                position.price.to_string(),
                position.amount.to_string(),
                position.value.to_string(),
            ],
            Line::Bank(bank) => vec!["Bank".to_string(), "---".to_string(), "-".to_string(), bank.to_string()],
            Line::Total(total) => vec!["Total:".to_string(), "---".to_string(), "-".to_string(), total.to_string()],
        });
    }
    table
}

pub fn leaderboard_table(standings: &[Standing]) -> Table {
    let mut table = Table::new("Stock market leaderboard:", &["Player", "Worth"]);
    for standing in standings {
        table.push(vec![standing.name.clone(), standing.total.to_string()]);
    }
    table
}

pub struct Router<S, F> {
    ledger: Ledger<S>,
    feed: F,
}

impl<S: AccountStore, F: PriceFeed> Router<S, F> {
    pub fn new(ledger: Ledger<S>, feed: F) -> Router<S, F> {
        Router { ledger, feed }
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger<S> {
        &mut self.ledger
    }

    pub async fn handle(
        &mut self,
        user: &str,
        display_name: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Response>, Error> {
        let command = match Command::parse(message) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(None),
            Err(error) => {
                debug!("{} sent a bad command: {:?}", user, error);
                return Ok(Some(Response::text(error.to_string())));
            }
        };
        info!("{} requested {:?}", user, command);

        let response = match self.dispatch(user, display_name, command, now).await {
            Ok(response) => response,
            Err(Error::Trade(error)) => {
                info!("rejected trade for {}: {:?}", user, error);
                Response::text(error.to_string())
            }
            Err(error) => return Err(error),
        };
        // the command already went through; a stale name isn't worth failing it over
        if let Err(error) = self.ledger.rename(user, display_name) {
            warn!("unable to update the name of {}: {}", user, error);
        }
        Ok(Some(response))
    }

    async fn dispatch(
        &mut self,
        user: &str,
        display_name: &str,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Response, Error> {
        match command {
            Command::Help => Ok(Response::text(HELP)),
            Command::League => self.prices(&[]).await,
            Command::Teams(teams) => self.prices(&teams).await,
            Command::Trade(trade) => {
                let fill = self.trade(user, &trade, now).await?;
                Ok(Response::text(fill.to_string()))
            }
            Command::Status => {
                let valuation = self.status(user).await?;
                Ok(Response::table(status_table(display_name, &valuation)))
            }
            Command::Leaderboard => {
                let standings = self.leaderboard().await?;
                Ok(Response::table(leaderboard_table(&standings)))
            }
        }
    }

    async fn snapshot(&self) -> Result<PriceTable, Error> {
        let prices = self.feed.get_prices().await?;
        debug!("using prices for {} teams", prices.len());
        Ok(prices)
    }

    async fn prices(&self, teams: &[String]) -> Result<Response, Error> {
        let prices = self.snapshot().await?;
        let (table, missing) = price_table(&prices, teams);
        let mut response = Response::table(table);
        if !missing.is_empty() {
            response.text = Some(format!("Could not find the teams: {}", missing.join(", ")));
        }
        Ok(response)
    }

    pub async fn trade(&mut self, user: &str, trade: &Trade, now: DateTime<Utc>) -> Result<Fill, Error> {
        let prices = self.snapshot().await?;
        let account = self.ledger.get_or_create(user, prices.teams())?;
        let (account, fill) = TradingEngine::new(&prices, now).execute(account, trade)?;
        self.ledger.commit(user, account)?;
        info!("{} traded {:?} {} {} for {}", user, fill.side, fill.quantity, fill.team, fill.amount);
        Ok(fill)
    }

    pub async fn buy(&mut self, user: &str, team: &str, quantity: i64, now: DateTime<Utc>) -> Result<Fill, Error> {
        self.trade(user, &Trade::buy(team, quantity), now).await
    }

    pub async fn sell(&mut self, user: &str, team: &str, quantity: i64, now: DateTime<Utc>) -> Result<Fill, Error> {
        self.trade(user, &Trade::sell(team, quantity), now).await
    }

    pub async fn status(&mut self, user: &str) -> Result<Valuation, Error> {
        let prices = self.snapshot().await?;
        let account = self.ledger.get_or_create(user, prices.teams())?;
        Ok(trading::valuation(account, &prices))
    }

    pub async fn leaderboard(&self) -> Result<Vec<Standing>, Error> {
        let prices = self.snapshot().await?;
        Ok(trading::leaderboard(self.ledger.accounts(), &prices))
    }
}

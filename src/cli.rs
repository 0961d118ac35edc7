// a console stand-in for the chat server: each line on stdin is a message, printed replies go to stdout
use chrono::Utc;
use clap::{App, Arg, ArgMatches};
use log::{debug, error, info};
use tokio::io::{self, AsyncBufReadExt, BufReader};

use credit_market::{Error, JsonFileStore, Ledger, Router};

use crate::args;

pub fn cli_command() -> App<'static, 'static> {
    App::new("run")
        .about("runs the stock market bot on messages read from stdin")
        .after_help("each line is read as `user: message`; lines without a user are sent by --user")
        .arg(Arg::with_name("user")
            .long("user")
            .takes_value(true)
            .default_value("console")
            .help("user that sends lines without a name"))
        .arg(args::ledger_arg())
        .arg(args::sheet_arg())
        .arg(args::range_arg())
}

// splits `user: message`, falling back to the default user
fn sender<'a>(line: &'a str, default_user: &'a str) -> (&'a str, &'a str) {
    match line.split_once(": ") {
        Some((user, message)) if !user.trim().is_empty() && !user.contains(char::is_whitespace) && !user.starts_with('!') => {
            (user.trim(), message.trim())
        }
        _ => (default_user, line.trim()),
    }
}

pub async fn main(args: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::open(JsonFileStore::new(args::ledger_path(args)))?;
    let feed = args::sheets_feed(args)?;
    let mut router = Router::new(ledger, feed);
    let default_user = args.value_of("user").unwrap_or("console");

    info!("listening for messages on stdin");
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let (user, message) = sender(&line, default_user);
        if message.is_empty() {
            continue;
        }
        match router.handle(user, user, message, Utc::now()).await {
            Ok(Some(response)) => print!("{}", response),
            Ok(None) => debug!("ignoring message from {}", user),
            Err(Error::Feed(error)) => {
                error!("unable to get prices for {}: {}", user, error);
                println!("The stock market sheet can't be reached right now, try again later.");
            }
            Err(error) => {
                error!("unable to handle message from {}: {}", user, error);
                println!("Something went wrong saving your account, nothing was changed.");
            }
        }
    }
    info!("stdin closed; {} accounts in the ledger", router.ledger().len());
    Ok(())
}

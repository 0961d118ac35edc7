use clap::{App, AppSettings, Arg};

mod admin;
mod args;
mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let args = App::new("credit-market")
        .version("0.1.0")
        .about("a chat bot that runs a stock market game on top of scraped team prices")
        .after_help("runs the bot against messages on stdin, or manages the ledger and price sheet directly")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .global(true)
            .help("log debug messages"))
        .subcommand(cli::cli_command())
        .subcommand(admin::prices_command())
        .subcommand(admin::grant_command())
        .subcommand(admin::set_command())
        .get_matches();

    let level = if args.is_present("verbose") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder().filter(None, level).init();

    match args.subcommand() {
        ("run", Some(args)) => cli::main(args).await,
        ("prices", Some(args)) => admin::prices(args).await,
        ("grant", Some(args)) => admin::grant(args),
        ("set", Some(args)) => admin::set(args),
        // clap already printed help
        _ => Ok(()),
    }
}

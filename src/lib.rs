pub mod account;
pub mod commands;
pub mod error;
pub mod ledger;
pub mod market;
pub mod prices;
pub mod trading;

pub use crate::account::Account;
pub use crate::commands::{Command, Response, Router};
pub use crate::error::Error;
pub use crate::ledger::{AccountStore, JsonFileStore, Ledger, MemoryStore};
pub use crate::market::{Fill, Side, Trade, TradeError};
pub use crate::prices::{PriceFeed, PriceTable, SheetsFeed, StaticFeed};

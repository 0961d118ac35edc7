use std::fmt;

use thiserror::Error;

pub const MARKET_CLOSED: &str = "You cannot manipulate your stocks after the games have already started.\n\
    They update the sheet late Tuesday so the stock market will open on Tuesday at 8 pm.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

// a request to move `quantity` shares of `team` in or out of an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    pub side: Side,
    pub team: String,
    pub quantity: i64,
}

impl Trade {
    pub fn buy(team: &str, quantity: i64) -> Trade {
        Trade { side: Side::Buy, team: team.to_string(), quantity }
    }

    pub fn sell(team: &str, quantity: i64) -> Trade {
        Trade { side: Side::Sell, team: team.to_string(), quantity }
    }
}

// the result of an accepted trade; `amount` is what was spent or received
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub side: Side,
    pub team: String,
    pub quantity: u64,
    pub price: i64,
    pub amount: i64,
    pub balance: i64,
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Side::Buy => write!(
                f,
                "Successfully purchased {} stocks of {} for {}.\nYou have {} remaining.",
                self.quantity, self.team, self.amount, self.balance
            ),
            Side::Sell => write!(
                f,
                "Successfully sold {} stocks of {} for {}.\nYou now have {} remaining.",
                self.quantity, self.team, self.amount, self.balance
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("{}", MARKET_CLOSED)]
    MarketClosed,
    #[error("Could not find the teams: {0}")]
    UnknownTeam(String),
    #[error("Invalid number of stocks: {0}. You can only trade a positive number of stocks.")]
    InvalidQuantity(i64),
    #[error(
        "Not enough money to buy the requested stocks. \n\
        {quantity} {team} stocks are worth {cost} but you only have {balance}.\n\
        You can buy a maximum of {max_quantity} {team} stock(s) for {max_cost} which would leave you with {leftover}."
    )]
    NotEnoughFunds {
        team: String,
        quantity: i64,
        cost: i64,
        balance: i64,
        max_quantity: i64,
        max_cost: i64,
        leftover: i64,
    },
    #[error("You do not have {requested} stocks to sell. You only have {held}.")]
    NotEnoughShares {
        team: String,
        requested: u64,
        held: u64,
        shortfall: u64,
    },
}

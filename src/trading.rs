// buying and selling shares against the latest prices, and what accounts are worth
use std::convert::TryFrom;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use log::{debug, warn};

use crate::account::Account;
use crate::market::{Fill, Side, Trade, TradeError};
use crate::prices::PriceTable;

// saturday games start at 5pm eastern
pub const GAMES_START_HOUR: u32 = 21;

// the sheet is updated late tuesday and games run through the weekend
pub fn trading_window_open(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Sun | Weekday::Mon | Weekday::Tue => false,
        Weekday::Sat => now.hour() < GAMES_START_HOUR,
        _ => true,
    }
}

pub struct TradingEngine<'a> {
    prices: &'a PriceTable,
    now: DateTime<Utc>,
}

impl<'a> TradingEngine<'a> {
    pub fn new(prices: &'a PriceTable, now: DateTime<Utc>) -> TradingEngine<'a> {
        TradingEngine { prices, now }
    }

    pub fn is_open(&self) -> bool {
        trading_window_open(self.now)
    }

    // returns the updated account; the caller decides whether to commit it
    pub fn execute(&self, account: &Account, trade: &Trade) -> Result<(Account, Fill), TradeError> {
        match trade.side {
            Side::Buy => self.buy(account, &trade.team, trade.quantity),
            Side::Sell => self.sell(account, &trade.team, trade.quantity),
        }
    }

    pub fn buy(&self, account: &Account, team: &str, quantity: i64) -> Result<(Account, Fill), TradeError> {
        let (price, shares) = self.validate(team, quantity)?;
        let cost = price.saturating_mul(quantity);
        if cost < account.balance {
            let held = account
                .held(team)
                .checked_add(shares)
                .ok_or(TradeError::InvalidQuantity(quantity))?;
            let mut next = account.clone();
            next.balance -= cost;
            next.holdings.insert(team.to_string(), held);
            debug!("bought {} {} at {} for {}", shares, team, price, cost);
            let fill = Fill {
                side: Side::Buy,
                team: team.to_string(),
                quantity: shares,
                price,
                amount: cost,
                balance: next.balance,
            };
            Ok((next, fill))
        } else {
            let max_quantity = if price > 0 && account.balance > 0 { account.balance / price } else { 0 };
            let max_cost = max_quantity * price;
            Err(TradeError::NotEnoughFunds {
                team: team.to_string(),
                quantity,
                cost,
                balance: account.balance,
                max_quantity,
                max_cost,
                leftover: account.balance - max_cost,
            })
        }
    }

    pub fn sell(&self, account: &Account, team: &str, quantity: i64) -> Result<(Account, Fill), TradeError> {
        let (price, shares) = self.validate(team, quantity)?;
        let held = account.held(team);
        if held < shares {
            return Err(TradeError::NotEnoughShares {
                team: team.to_string(),
                requested: shares,
                held,
                shortfall: shares - held,
            });
        }
        let proceeds = price.saturating_mul(quantity);
        let mut next = account.clone();
        next.balance = next.balance.saturating_add(proceeds);
        next.holdings.insert(team.to_string(), held - shares);
        debug!("sold {} {} at {} for {}", shares, team, price, proceeds);
        let fill = Fill {
            side: Side::Sell,
            team: team.to_string(),
            quantity: shares,
            price,
            amount: proceeds,
            balance: next.balance,
        };
        Ok((next, fill))
    }

    // closed market wins over every other complaint
    fn validate(&self, team: &str, quantity: i64) -> Result<(i64, u64), TradeError> {
        if !self.is_open() {
            return Err(TradeError::MarketClosed);
        }
        let shares = match u64::try_from(quantity) {
            Ok(shares) if shares > 0 => shares,
            _ => return Err(TradeError::InvalidQuantity(quantity)),
        };
        // a team without a positive price can't be traded
        let price = self
            .prices
            .latest(team)
            .filter(|price| *price > 0)
            .ok_or_else(|| TradeError::UnknownTeam(team.to_string()))?;
        Ok((price, shares))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub team: String,
    pub price: i64,
    pub amount: u64,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Team(Position),
    Bank(i64),
    Total(i64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Valuation {
    pub bank: i64,
    pub positions: Vec<Position>,
    pub total: i64,
}

impl Valuation {
    // one line per held team, then the bank and the total
    pub fn breakdown(&self) -> Vec<Line> {
        self.positions
            .iter()
            .cloned()
            .map(Line::Team)
            .chain(vec![Line::Bank(self.bank), Line::Total(self.total)])
            .collect()
    }
}

pub fn valuation(account: &Account, prices: &PriceTable) -> Valuation {
    let mut positions = Vec::new();
    for (team, amount) in account.positions() {
        match prices.latest(team) {
            Some(price) => positions.push(Position {
                team: team.to_string(),
                price,
                amount,
                value: price.saturating_mul(i64::try_from(amount).unwrap_or(i64::MAX)),
            }),
            None => warn!("no price for held team {}; leaving it out of the valuation", team),
        }
    }
    let total = positions
        .iter()
        .fold(account.balance, |total, position| total.saturating_add(position.value));
    Valuation {
        bank: account.balance,
        positions,
        total,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub user: String,
    pub name: String,
    pub total: i64,
}

// richest first; ties keep the order the accounts were given in. accounts that never joined the
// market (no tracked teams) aren't ranked
pub fn leaderboard<'b, I>(accounts: I, prices: &PriceTable) -> Vec<Standing>
where
    I: IntoIterator<Item = (&'b str, &'b Account)>,
{
    let mut standings: Vec<Standing> = accounts
        .into_iter()
        .filter(|(_, account)| account.is_trading())
        .map(|(user, account)| Standing {
            user: user.to_string(),
            name: account.name(user).to_string(),
            total: valuation(account, prices).total,
        })
        .collect();
    standings.sort_by(|a, b| b.total.cmp(&a.total));
    standings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    // 2024-01-03 is a wednesday
    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn open() -> DateTime<Utc> {
        at(4, 12)
    }

    fn prices(entries: &[(&str, i64)]) -> PriceTable {
        let series: BTreeMap<String, Vec<i64>> = entries
            .iter()
            .map(|(team, price)| (team.to_string(), vec![price / 2, *price]))
            .collect();
        PriceTable::from_series(series)
    }

    fn account(balance: i64, holdings: &[(&str, u64)]) -> Account {
        let mut account = Account::new(vec!["A", "B"]);
        account.balance = balance;
        for (team, shares) in holdings {
            account.holdings.insert(team.to_string(), *shares);
        }
        account
    }

    #[test]
    fn window_is_closed_sunday_through_tuesday() {
        for day in 7..=9 {
            for hour in 0..24 {
                assert!(!trading_window_open(at(day, hour)), "day {} hour {}", day, hour);
            }
        }
    }

    #[test]
    fn window_is_open_midweek() {
        for day in 3..=5 {
            for hour in 0..24 {
                assert!(trading_window_open(at(day, hour)), "day {} hour {}", day, hour);
            }
        }
    }

    #[test]
    fn window_closes_saturday_at_nine() {
        assert!(trading_window_open(at(6, 0)));
        assert!(trading_window_open(Utc.with_ymd_and_hms(2024, 1, 6, 20, 59, 59).unwrap()));
        assert!(!trading_window_open(at(6, 21)));
        assert!(!trading_window_open(at(6, 23)));
    }

    #[test]
    fn buy_spends_balance() {
        let prices = prices(&[("A", 100)]);
        let engine = TradingEngine::new(&prices, open());
        let (next, fill) = engine.buy(&account(1000, &[]), "A", 3).unwrap();
        assert_eq!(next.balance, 700);
        assert_eq!(next.held("A"), 3);
        assert_eq!((fill.amount, fill.balance), (300, 700));
    }

    #[test]
    fn buy_of_exact_balance_is_rejected() {
        let prices = prices(&[("A", 100)]);
        let engine = TradingEngine::new(&prices, open());
        match engine.buy(&account(500, &[]), "A", 5) {
            Err(TradeError::NotEnoughFunds { cost, max_quantity, max_cost, leftover, .. }) => {
                assert_eq!((cost, max_quantity, max_cost, leftover), (500, 5, 500, 0));
            }
            other => panic!("expected not enough funds, got {:?}", other),
        }
    }

    #[test]
    fn buy_one_under_balance_leaves_one() {
        let prices = prices(&[("A", 99)]);
        let engine = TradingEngine::new(&prices, open());
        let (next, fill) = engine.buy(&account(100, &[]), "A", 1).unwrap();
        assert_eq!(next.balance, 1);
        assert_eq!(fill.balance, 1);
    }

    #[test]
    fn rejected_buy_suggests_what_is_affordable() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, open());
        let error = engine.buy(&account(100, &[]), "A", 5).unwrap_err();
        assert_eq!(
            error,
            TradeError::NotEnoughFunds {
                team: "A".to_string(),
                quantity: 5,
                cost: 150,
                balance: 100,
                max_quantity: 3,
                max_cost: 90,
                leftover: 10,
            }
        );
        assert!(error.to_string().contains("You can buy a maximum of 3 A stock(s) for 90 which would leave you with 10."));
    }

    #[test]
    fn overdrawn_account_can_afford_nothing() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, open());
        match engine.buy(&account(-40, &[]), "A", 1) {
            Err(TradeError::NotEnoughFunds { max_quantity, max_cost, leftover, .. }) => {
                assert_eq!((max_quantity, max_cost, leftover), (0, 0, -40));
            }
            other => panic!("expected not enough funds, got {:?}", other),
        }
    }

    #[test]
    fn sell_reports_shortfall() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, open());
        let error = engine.sell(&account(0, &[("A", 2)]), "A", 5).unwrap_err();
        assert_eq!(
            error,
            TradeError::NotEnoughShares {
                team: "A".to_string(),
                requested: 5,
                held: 2,
                shortfall: 3,
            }
        );
        assert_eq!(error.to_string(), "You do not have 5 stocks to sell. You only have 2.");
    }

    #[test]
    fn sell_everything_leaves_zero() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, open());
        let (next, fill) = engine.sell(&account(10, &[("A", 2)]), "A", 2).unwrap();
        assert_eq!(next.held("A"), 0);
        assert_eq!(next.balance, 70);
        assert_eq!(fill.amount, 60);
    }

    #[test]
    fn buy_then_sell_round_trips() {
        let prices = prices(&[("A", 37), ("B", 5)]);
        let engine = TradingEngine::new(&prices, open());
        let start = account(5000, &[("B", 4)]);

        let (bought, _) = engine.execute(&start, &Trade::buy("A", 17)).unwrap();
        let (sold, _) = engine.execute(&bought, &Trade::sell("A", 17)).unwrap();
        assert_eq!(sold, start);
    }

    #[test]
    fn closed_market_rejects_before_anything_else() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, at(7, 12));
        let account = account(100, &[]);
        assert_eq!(engine.buy(&account, "ZZZ", -1).unwrap_err(), TradeError::MarketClosed);
        assert_eq!(engine.sell(&account, "A", 50).unwrap_err(), TradeError::MarketClosed);
    }

    #[test]
    fn bad_requests_are_rejected() {
        let prices = prices(&[("A", 30)]);
        let engine = TradingEngine::new(&prices, open());
        let account = account(100, &[("A", 1)]);
        assert_eq!(engine.buy(&account, "A", 0).unwrap_err(), TradeError::InvalidQuantity(0));
        assert_eq!(engine.sell(&account, "A", -2).unwrap_err(), TradeError::InvalidQuantity(-2));
        assert_eq!(engine.buy(&account, "ZZZ", 1).unwrap_err(), TradeError::UnknownTeam("ZZZ".to_string()));
    }

    #[test]
    fn holdings_cannot_overflow() {
        let prices = prices(&[("A", 1)]);
        let engine = TradingEngine::new(&prices, open());
        let full = account(i64::MAX, &[("A", u64::MAX - 1)]);
        assert_eq!(engine.buy(&full, "A", 5).unwrap_err(), TradeError::InvalidQuantity(5));

        let (next, _) = engine.buy(&full, "A", 1).unwrap();
        assert_eq!(next.held("A"), u64::MAX);
        let valuation = valuation(&next, &prices);
        assert_eq!(valuation.positions[0].value, i64::MAX);
        assert_eq!(valuation.total, i64::MAX);
    }

    #[test]
    fn unpriced_or_free_teams_are_not_tradable() {
        let mut series = BTreeMap::new();
        series.insert("A".to_string(), vec![30]);
        series.insert("C".to_string(), vec![0]);
        let prices = PriceTable::from_series(series);
        let engine = TradingEngine::new(&prices, open());
        assert_eq!(engine.buy(&account(100, &[]), "B", 1).unwrap_err(), TradeError::UnknownTeam("B".to_string()));
        assert_eq!(engine.buy(&account(100, &[]), "C", 1).unwrap_err(), TradeError::UnknownTeam("C".to_string()));
        assert_eq!(
            engine.buy(&account(100, &[]), "A", i64::MIN).unwrap_err(),
            TradeError::InvalidQuantity(i64::MIN)
        );
    }

    #[test]
    fn valuation_counts_only_held_teams() {
        let prices = prices(&[("A", 100), ("B", 40)]);
        let valuation = valuation(&account(500, &[("A", 2), ("B", 0)]), &prices);
        assert_eq!(valuation.total, 700);
        assert_eq!(
            valuation.breakdown(),
            vec![
                Line::Team(Position {
                    team: "A".to_string(),
                    price: 100,
                    amount: 2,
                    value: 200,
                }),
                Line::Bank(500),
                Line::Total(700),
            ]
        );
    }

    #[test]
    fn valuation_skips_teams_without_a_price() {
        let prices = prices(&[("A", 100)]);
        let valuation = valuation(&account(10, &[("A", 1), ("GONE", 3)]), &prices);
        assert_eq!(valuation.total, 110);
        assert_eq!(valuation.positions.len(), 1);
    }

    #[test]
    fn leaderboard_sorts_by_total() {
        let prices = prices(&[("A", 100)]);
        let poor = account(10, &[]);
        let rich = account(10, &[("A", 5)]);
        let mut named = account(510, &[]);
        named.display_name = Some("Named".to_string());

        let mut granted = Account::new(std::iter::empty());
        granted.balance = 1_000_000;

        let standings = leaderboard(
            vec![("poor", &poor), ("named", &named), ("granted", &granted), ("rich", &rich)],
            &prices,
        );
        let order: Vec<(&str, i64)> = standings.iter().map(|s| (s.name.as_str(), s.total)).collect();
        assert_eq!(order, vec![("Named", 510), ("rich", 510), ("poor", 10)]);
    }
}

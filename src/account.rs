use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// every new account starts with this much money to spend
pub const STARTING_BALANCE: i64 = 5000;

// a user's bank balance and the shares they own of each team
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: i64,
    #[serde(default)]
    pub holdings: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Account {
    pub fn new<'a, I>(known_teams: I) -> Account
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut account = Account {
            balance: STARTING_BALANCE,
            holdings: BTreeMap::new(),
            display_name: None,
        };
        account.track(known_teams);
        account
    }

    // adds an empty holding for each team the account hasn't seen yet; true if anything was added
    pub fn track<'a, I>(&mut self, teams: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = false;
        for team in teams {
            if !self.holdings.contains_key(team) {
                self.holdings.insert(team.to_string(), 0);
                added = true;
            }
        }
        added
    }

    pub fn held(&self, team: &str) -> u64 {
        self.holdings.get(team).copied().unwrap_or(0)
    }

    // teams with at least one share
    pub fn positions(&self) -> impl Iterator<Item = (&str, u64)> {
        self.holdings
            .iter()
            .filter(|(_, shares)| **shares > 0)
            .map(|(team, shares)| (team.as_str(), *shares))
    }

    // accounts opened outside the market (admin grants) track no teams until they first play
    pub fn is_trading(&self) -> bool {
        !self.holdings.is_empty()
    }

    pub fn name<'a>(&'a self, user: &'a str) -> &'a str {
        self.display_name.as_deref().map(str::trim).unwrap_or(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_with_money_and_no_shares() {
        let account = Account::new(vec!["TL", "C9", "TSM"]);
        assert_eq!(account.balance, STARTING_BALANCE);
        assert_eq!(account.holdings.len(), 3);
        assert!(account.holdings.values().all(|shares| *shares == 0));
        assert_eq!(account.positions().count(), 0);
        assert!(account.is_trading());
        assert!(!Account::new(vec![]).is_trading());
    }

    #[test]
    fn track_only_adds_unseen_teams() {
        let mut account = Account::new(vec!["TL"]);
        account.holdings.insert("TL".to_string(), 4);

        assert!(!account.track(vec!["TL"]));
        assert!(account.track(vec!["TL", "EG"]));
        assert_eq!(account.held("TL"), 4);
        assert_eq!(account.held("EG"), 0);
        assert_eq!(account.held("FLY"), 0);
    }

    #[test]
    fn name_falls_back_to_user_id() {
        let mut account = Account::new(vec![]);
        assert_eq!(account.name("someone"), "someone");
        account.display_name = Some(" Someone Else ".to_string());
        assert_eq!(account.name("someone"), "Someone Else");
    }

    #[test]
    fn serialized_layout_is_balance_and_holdings() {
        let mut account = Account::new(vec!["TL"]);
        account.holdings.insert("TL".to_string(), 2);
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json, serde_json::json!({"balance": 5000, "holdings": {"TL": 2}}));
    }
}

// every account in the game, written through to a store after each change
//
// the ledger has the following properties:
//  - accounts are keyed by user id and never removed
//  - new accounts start with the starting balance and an empty holding for each known team
//  - balances can be adjusted or overwritten directly, including below zero
//  - a change is only applied in memory once the store has accepted it
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::account::Account;

pub type Accounts = BTreeMap<String, Account>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to access ledger at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger at {} is not valid: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ledger write was rejected: {0}")]
    Rejected(String),
}

// durable copy of the ledger
pub trait AccountStore {
    fn load(&mut self) -> Result<Accounts, StoreError>;
    fn save(&mut self, accounts: &Accounts) -> Result<(), StoreError>;
}

// keeps the ledger as a json object of user id -> account
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> JsonFileStore {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_else(|| OsStr::new("ledger")).to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl AccountStore for JsonFileStore {
    fn load(&mut self) -> Result<Accounts, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!("no ledger at {}; starting with no accounts", self.path.display());
                return Ok(Accounts::new());
            }
            Err(error) => return Err(self.io_error(error)),
        };
        if contents.trim().is_empty() {
            return Ok(Accounts::new());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, accounts: &Accounts) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(accounts).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        // the old ledger stays in place until the new one is fully written
        let staging = self.staging_path();
        fs::write(&staging, json).map_err(|error| self.io_error(error))?;
        fs::rename(&staging, &self.path).map_err(|error| self.io_error(error))
    }
}

// in-memory store, mostly for tests and dry runs
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub accounts: Accounts,
    pub fail_writes: bool,
    // rejects only the nth save attempt, counting from 1
    pub fail_at: Option<usize>,
    pub attempts: usize,
    pub writes: usize,
}

impl MemoryStore {
    pub fn with_accounts(accounts: Accounts) -> MemoryStore {
        MemoryStore { accounts, ..MemoryStore::default() }
    }
}

impl AccountStore for MemoryStore {
    fn load(&mut self) -> Result<Accounts, StoreError> {
        Ok(self.accounts.clone())
    }

    fn save(&mut self, accounts: &Accounts) -> Result<(), StoreError> {
        self.attempts += 1;
        if self.fail_writes || self.fail_at == Some(self.attempts) {
            return Err(StoreError::Rejected("memory store is read only".to_string()));
        }
        self.accounts = accounts.clone();
        self.writes += 1;
        Ok(())
    }
}

pub struct Ledger<S> {
    accounts: Accounts,
    store: S,
}

impl<S: AccountStore> Ledger<S> {
    pub fn open(mut store: S) -> Result<Ledger<S>, StoreError> {
        let accounts = store.load()?;
        info!("loaded ledger with {} accounts", accounts.len());
        Ok(Ledger { accounts, store })
    }

    pub fn load(&mut self) -> Result<(), StoreError> {
        self.accounts = self.store.load()?;
        debug!("reloaded ledger with {} accounts", self.accounts.len());
        Ok(())
    }

    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.accounts)
    }

    pub fn get(&self, user: &str) -> Option<&Account> {
        self.accounts.get(user)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&str, &Account)> {
        self.accounts.iter().map(|(user, account)| (user.as_str(), account))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn get_or_create<'a, I>(&mut self, user: &str, known_teams: I) -> Result<&Account, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (account, dirty) = match self.accounts.get(user) {
            Some(existing) => {
                let mut account = existing.clone();
                let added = account.track(known_teams);
                (account, added)
            }
            None => {
                info!("opening an account for {}", user);
                (Account::new(known_teams), true)
            }
        };
        if dirty {
            self.commit(user, account)?;
        }
        Ok(&self.accounts[user])
    }

    // no floor here; only trades are kept from overdrawing
    pub fn adjust_balance(&mut self, user: &str, delta: i64) -> Result<i64, StoreError> {
        let mut account = self.account_or_new(user);
        account.balance = account.balance.saturating_add(delta);
        let balance = account.balance;
        self.commit(user, account)?;
        info!("adjusted {} by {} to {}", user, delta, balance);
        Ok(balance)
    }

    pub fn set_balance(&mut self, user: &str, value: i64) -> Result<(), StoreError> {
        let mut account = self.account_or_new(user);
        account.balance = value;
        self.commit(user, account)?;
        info!("set {} to {}", user, value);
        Ok(())
    }

    // updates the name shown for an existing account
    pub fn rename(&mut self, user: &str, display_name: &str) -> Result<(), StoreError> {
        let account = match self.accounts.get(user) {
            Some(account) if account.display_name.as_deref() != Some(display_name) => account,
            _ => return Ok(()),
        };
        let mut account = account.clone();
        account.display_name = Some(display_name.to_string());
        self.commit(user, account)
    }

    // writes the ledger with `account` replaced and only then swaps it in
    pub fn commit(&mut self, user: &str, account: Account) -> Result<(), StoreError> {
        let mut next = self.accounts.clone();
        next.insert(user.to_string(), account);
        self.store.save(&next)?;
        self.accounts = next;
        debug!("committed account {}", user);
        Ok(())
    }

    fn account_or_new(&self, user: &str) -> Account {
        self.accounts
            .get(user)
            .cloned()
            .unwrap_or_else(|| Account::new(std::iter::empty()))
    }
}

// team prices pulled from the stock market spreadsheet
//
// the sheet lists one row per team per update, 10 teams to a block, with the team symbol in the
// first column and the settlement price in the third. each team's history only grows when its
// price actually changes, so a run of identical readings becomes a single entry.
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

pub const SHEETS_API: &str = "https://sheets.googleapis.com";
pub const TEAMS_PER_BLOCK: usize = 10;
// two games a week, so last week's price sits two entries back
pub const GAMES_PER_WEEK: usize = 2;

const TEAM_COLUMN: usize = 0;
const PRICE_COLUMN: usize = 2;
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unable to reach the price sheet: {0}")]
    Unavailable(String),
    #[error("price sheet returned malformed data: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> FeedError {
        if error.is_decode() {
            FeedError::Malformed(error.to_string())
        } else {
            FeedError::Unavailable(error.to_string())
        }
    }
}

#[async_trait]
pub trait PriceFeed {
    async fn get_prices(&self) -> Result<PriceTable, FeedError>;
}

// price history of every team, oldest first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceTable {
    series: BTreeMap<String, Vec<i64>>,
}

impl PriceTable {
    // prices of zero or less are dropped, as are teams left with no prices
    pub fn from_series(series: BTreeMap<String, Vec<i64>>) -> PriceTable {
        PriceTable {
            series: series
                .into_iter()
                .map(|(team, prices)| (team, prices.into_iter().filter(|price| *price > 0).collect::<Vec<i64>>()))
                .filter(|(_, prices)| !prices.is_empty())
                .collect(),
        }
    }

    pub fn latest(&self, team: &str) -> Option<i64> {
        self.series.get(team).and_then(|prices| prices.last().copied())
    }

    pub fn history(&self, team: &str) -> Option<&[i64]> {
        self.series.get(team).map(Vec::as_slice)
    }

    pub fn contains(&self, team: &str) -> bool {
        self.series.contains_key(team)
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn summary(&self, team: &str) -> Option<TeamSummary> {
        let (team, prices) = self.series.get_key_value(team)?;
        let value = *prices.last()?;
        let last_week = if prices.len() > GAMES_PER_WEEK {
            Some(value - prices[prices.len() - 1 - GAMES_PER_WEEK])
        } else {
            None
        };
        Some(TeamSummary {
            team: team.clone(),
            value,
            last_week,
            min: prices.iter().copied().min().unwrap_or(value),
            max: prices.iter().copied().max().unwrap_or(value),
            average: prices.iter().sum::<i64>() as f64 / prices.len() as f64,
        })
    }

    // every team, most valuable first
    pub fn summaries(&self) -> Vec<TeamSummary> {
        let mut summaries: Vec<TeamSummary> = self.teams().filter_map(|team| self.summary(team)).collect();
        summaries.sort_by(|a, b| b.value.cmp(&a.value));
        summaries
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TeamSummary {
    pub team: String,
    pub value: i64,
    // change since a week ago, if there is a week of history
    pub last_week: Option<i64>,
    pub min: i64,
    pub max: i64,
    pub average: f64,
}

fn parse_row(index: usize, row: &[String]) -> Result<Option<(&str, i64)>, FeedError> {
    if row.iter().all(|cell| cell.trim().is_empty()) {
        return Ok(None);
    }
    let team = row
        .get(TEAM_COLUMN)
        .map(|cell| cell.trim())
        .filter(|team| !team.is_empty())
        .ok_or_else(|| FeedError::Malformed(format!("row {} has no team", index)))?;
    let price = row
        .get(PRICE_COLUMN)
        .ok_or_else(|| FeedError::Malformed(format!("row {} for {} has no price", index, team)))?;
    let price = price
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|price| *price > 0)
        .ok_or_else(|| FeedError::Malformed(format!("row {} for {} has price {:?}", index, team, price)))?;
    Ok(Some((team, price)))
}

// builds each team's history from the sheet's data rows (header already removed)
pub fn normalize(rows: &[Vec<String>]) -> Result<PriceTable, FeedError> {
    let mut series: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for (block, readings) in rows.chunks(TEAMS_PER_BLOCK).enumerate() {
        for (offset, row) in readings.iter().enumerate() {
            let (team, price) = match parse_row(block * TEAMS_PER_BLOCK + offset, row)? {
                Some(reading) => reading,
                None => continue,
            };
            let history = series.entry(team.to_string()).or_insert_with(Vec::new);
            if history.last() != Some(&price) {
                history.push(price);
            }
        }
    }
    if series.is_empty() {
        return Err(FeedError::Malformed("sheet has no price rows".to_string()));
    }
    debug!("normalized {} rows into {} teams", rows.len(), series.len());
    Ok(PriceTable { series })
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

fn from_value_range(range: ValueRange) -> Result<PriceTable, FeedError> {
    // first row is the header
    normalize(range.values.get(1..).unwrap_or_default())
}

// reads the prices range of a google sheet
pub struct SheetsFeed {
    client: reqwest::Client,
    base_url: String,
    sheet_id: String,
    range: String,
    api_key: Option<String>,
}

impl SheetsFeed {
    pub fn new(sheet_id: &str, range: &str, api_key: Option<String>) -> Result<SheetsFeed, FeedError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(SheetsFeed {
            client,
            base_url: SHEETS_API.to_string(),
            sheet_id: sheet_id.to_string(),
            range: range.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> SheetsFeed {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn url(&self) -> String {
        format!("{}/v4/spreadsheets/{}/values/{}", self.base_url, self.sheet_id, self.range)
    }
}

#[async_trait]
impl PriceFeed for SheetsFeed {
    async fn get_prices(&self) -> Result<PriceTable, FeedError> {
        let mut request = self.client.get(self.url());
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let response = request.send().await?.error_for_status()?;
        let range: ValueRange = response.json().await?;
        let table = from_value_range(range)?;
        info!("fetched prices for {} teams", table.len());
        Ok(table)
    }
}

// a fixed snapshot, or a feed that is always down
#[derive(Clone, Debug, Default)]
pub struct StaticFeed {
    table: Option<PriceTable>,
}

impl StaticFeed {
    pub fn new(table: PriceTable) -> StaticFeed {
        StaticFeed { table: Some(table) }
    }

    pub fn offline() -> StaticFeed {
        StaticFeed { table: None }
    }
}

#[async_trait]
impl PriceFeed for StaticFeed {
    async fn get_prices(&self) -> Result<PriceTable, FeedError> {
        self.table
            .clone()
            .ok_or_else(|| FeedError::Unavailable("price feed is offline".to_string()))
    }
}

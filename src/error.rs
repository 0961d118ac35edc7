use thiserror::Error;

use crate::ledger::StoreError;
use crate::market::TradeError;
use crate::prices::FeedError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Trade(#[from] TradeError),
}

//! Reward Collaborator
//!
//! Star payouts can be converted into token rewards. The transfer itself
//! belongs to an external wallet service; the session only hands it a claim
//! and reports the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A request to pay an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaim {
    /// Receiving account.
    pub account_id: String,
    /// Amount to pay.
    pub amount: u64,
}

/// Proof that a claim settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardReceipt {
    /// Settlement id.
    pub claim_id: Uuid,
    /// Receiving account.
    pub account_id: String,
    /// Amount paid.
    pub amount: u64,
    /// Settlement time.
    pub settled_at: DateTime<Utc>,
}

/// Reward errors.
#[derive(Debug, Clone, Error)]
pub enum RewardError {
    /// Account id rejected.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Nothing to pay.
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    /// Wallet service could not be reached.
    #[error("Reward service unavailable: {0}")]
    Unavailable(String),
}

/// Token reward service.
pub trait RewardClient: Send + Sync {
    /// Settle a claim.
    fn claim(&self, claim: RewardClaim) -> BoxFuture<'_, Result<RewardReceipt, RewardError>>;
}

/// Reward client that settles into an in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerRewardClient {
    balances: Arc<RwLock<BTreeMap<String, u64>>>,
}

impl LedgerRewardClient {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an account (0 if never paid).
    pub async fn balance(&self, account_id: &str) -> u64 {
        self.balances.read().await.get(account_id).copied().unwrap_or(0)
    }
}

impl RewardClient for LedgerRewardClient {
    fn claim(&self, claim: RewardClaim) -> BoxFuture<'_, Result<RewardReceipt, RewardError>> {
        Box::pin(async move {
            if claim.account_id.trim().is_empty() {
                return Err(RewardError::InvalidAccount("empty".into()));
            }
            if claim.amount == 0 {
                return Err(RewardError::InvalidAmount(claim.amount));
            }

            let mut balances = self.balances.write().await;
            let balance = balances.entry(claim.account_id.clone()).or_insert(0);
            *balance = balance.saturating_add(claim.amount);

            info!(account = %claim.account_id, amount = claim.amount, balance = *balance, "Reward settled");

            Ok(RewardReceipt {
                claim_id: Uuid::new_v4(),
                account_id: claim.account_id,
                amount: claim.amount,
                settled_at: Utc::now(),
            })
        })
    }
}

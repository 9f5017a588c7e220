//! Remote ledger contract.
//!
//! The ledger is a wallet plus a todo smart contract. Entries are addressed by
//! their position in the contract's array, priorities and timeframes travel as
//! small indices and stakes travel in wei.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;

use crate::app::error::LedgerError;

const WEI_PER_ETHER: f64 = 1e18;

/// Convert an ether amount to wei. Negative and non-finite amounts become zero.
pub fn parse_ether(amount: f64) -> u128 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * WEI_PER_ETHER).round() as u128
}

pub fn format_ether(wei: u128) -> f64 {
    wei as f64 / WEI_PER_ETHER
}

/// One row as reported by the contract's `getTodos` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub title: String,
    pub description: String,
    pub priority: u8,
    pub timeframe: u8,
    pub stake_wei: u128,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
}

/// A submitted transaction. The call only counts as done once [`PendingTx::wait`]
/// resolves.
pub struct PendingTx {
    hash: String,
    confirmation: BoxFuture<'static, Result<Receipt, LedgerError>>,
}

impl PendingTx {
    pub fn new<F>(hash: String, confirmation: F) -> PendingTx
    where
        F: Future<Output = Result<Receipt, LedgerError>> + Send + 'static,
    {
        PendingTx {
            hash,
            confirmation: Box::pin(confirmation),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub async fn wait(self) -> Result<Receipt, LedgerError> {
        self.confirmation.await
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Ask the wallet for an account. Returns the account address.
    async fn connect(&self) -> Result<String, LedgerError>;

    async fn list(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// `stake_wei` is both the recorded stake and the value attached to the call.
    async fn create(
        &self,
        title: &str,
        description: &str,
        priority: u8,
        timeframe: u8,
        stake_wei: u128,
    ) -> Result<PendingTx, LedgerError>;

    async fn toggle(&self, index: usize) -> Result<PendingTx, LedgerError>;

    async fn remove(&self, index: usize) -> Result<PendingTx, LedgerError>;

    async fn update(
        &self,
        index: usize,
        title: &str,
        description: &str,
        priority: u8,
    ) -> Result<PendingTx, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ether_conversion() {
        assert_eq!(parse_ether(1.0), 1_000_000_000_000_000_000);
        assert_eq!(parse_ether(0.01), 10_000_000_000_000_000);
        assert_eq!(parse_ether(-3.0), 0);
        assert_eq!(parse_ether(f64::NAN), 0);
        assert!((format_ether(parse_ether(0.5)) - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_pending_tx_resolves_confirmation() {
        let tx = PendingTx::new("0xabc".into(), async {
            Ok(Receipt {
                tx_hash: "0xabc".into(),
            })
        });
        assert_eq!(tx.hash(), "0xabc");
        assert_eq!(tx.wait().await.unwrap().tx_hash, "0xabc");
    }
}

//! In-process ledger used when a wallet is configured, and as the fake in tests.

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::app::error::LedgerError;
use crate::app::ledger::{Ledger, LedgerEntry, PendingTx, Receipt};

/// How the injected wallet answers a connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wallet {
    Missing,
    Declining,
    Approving(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    Connect,
    List,
    Create,
    Toggle,
    Remove,
    Update,
}

impl LedgerCall {
    fn name(self) -> &'static str {
        match self {
            LedgerCall::Connect => "connect",
            LedgerCall::List => "getTodos",
            LedgerCall::Create => "addTodo",
            LedgerCall::Toggle => "toggleTodo",
            LedgerCall::Remove => "deleteTodo",
            LedgerCall::Update => "updateTodo",
        }
    }
}

#[derive(Default)]
struct Chain {
    entries: Vec<LedgerEntry>,
    failing: HashSet<LedgerCall>,
    account: Option<String>,
    nonce: u64,
}

#[derive(Clone)]
pub struct SimulatedLedger {
    wallet: Wallet,
    block_time: Duration,
    chain: Arc<Mutex<Chain>>,
}

impl SimulatedLedger {
    pub fn new(wallet: Wallet) -> SimulatedLedger {
        SimulatedLedger {
            wallet,
            block_time: Duration::ZERO,
            chain: Arc::new(Mutex::new(Chain::default())),
        }
    }

    pub fn with_block_time(mut self, block_time: Duration) -> SimulatedLedger {
        self.block_time = block_time;
        self
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Shared checks for every contract call; hands back the locked chain
    fn begin(&self, call: LedgerCall) -> Result<MutexGuard<'_, Chain>, LedgerError> {
        let chain = self.chain();
        if chain.failing.contains(&call) {
            return Err(failed(call, "call reverted"));
        }
        if chain.account.is_none() {
            return Err(failed(call, "wallet not connected"));
        }
        Ok(chain)
    }

    // Effects apply at submission; the receipt arrives one block later
    fn submit(&self, mut chain: MutexGuard<'_, Chain>, call: LedgerCall) -> PendingTx {
        chain.nonce += 1;
        let hash = format!("0x{:064x}", chain.nonce);
        drop(chain);

        debug!("Submitted {} as {hash}", call.name());
        let block_time = self.block_time;
        let tx_hash = hash.clone();
        PendingTx::new(hash, async move {
            if !block_time.is_zero() {
                tokio::time::sleep(block_time).await;
            }
            Ok(Receipt { tx_hash })
        })
    }
}

#[cfg(test)]
impl SimulatedLedger {
    // Make every subsequent `call` fail until `recover` is called
    pub fn fail(&self, call: LedgerCall) {
        self.chain().failing.insert(call);
    }

    pub fn recover(&self, call: LedgerCall) {
        self.chain().failing.remove(&call);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.chain().entries.clone()
    }
}

fn failed(call: LedgerCall, reason: &str) -> LedgerError {
    LedgerError::CallFailed {
        call: call.name(),
        reason: reason.to_string(),
    }
}

fn entry_at(
    chain: &mut Chain,
    call: LedgerCall,
    index: usize,
) -> Result<&mut LedgerEntry, LedgerError> {
    chain
        .entries
        .get_mut(index)
        .ok_or_else(|| failed(call, "index out of bounds"))
}

#[async_trait]
impl Ledger for SimulatedLedger {
    async fn connect(&self) -> Result<String, LedgerError> {
        let mut chain = self.chain();
        if chain.failing.contains(&LedgerCall::Connect) {
            return Err(failed(LedgerCall::Connect, "provider error"));
        }
        match &self.wallet {
            Wallet::Missing => Err(LedgerError::WalletUnavailable),
            Wallet::Declining => Err(LedgerError::UserRejected),
            Wallet::Approving(address) => {
                chain.account = Some(address.clone());
                Ok(address.clone())
            }
        }
    }

    async fn list(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let chain = self.begin(LedgerCall::List)?;
        Ok(chain.entries.clone())
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        priority: u8,
        timeframe: u8,
        stake_wei: u128,
    ) -> Result<PendingTx, LedgerError> {
        let mut chain = self.begin(LedgerCall::Create)?;
        chain.entries.push(LedgerEntry {
            title: title.to_string(),
            description: description.to_string(),
            priority,
            timeframe,
            stake_wei,
            completed: false,
        });
        Ok(self.submit(chain, LedgerCall::Create))
    }

    async fn toggle(&self, index: usize) -> Result<PendingTx, LedgerError> {
        let mut chain = self.begin(LedgerCall::Toggle)?;
        let entry = entry_at(&mut chain, LedgerCall::Toggle, index)?;
        entry.completed = !entry.completed;
        Ok(self.submit(chain, LedgerCall::Toggle))
    }

    async fn remove(&self, index: usize) -> Result<PendingTx, LedgerError> {
        let mut chain = self.begin(LedgerCall::Remove)?;
        entry_at(&mut chain, LedgerCall::Remove, index)?;
        chain.entries.remove(index);
        Ok(self.submit(chain, LedgerCall::Remove))
    }

    async fn update(
        &self,
        index: usize,
        title: &str,
        description: &str,
        priority: u8,
    ) -> Result<PendingTx, LedgerError> {
        let mut chain = self.begin(LedgerCall::Update)?;
        let entry = entry_at(&mut chain, LedgerCall::Update, index)?;
        entry.title = title.to_string();
        entry.description = description.to_string();
        entry.priority = priority;
        Ok(self.submit(chain, LedgerCall::Update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected() -> SimulatedLedger {
        let ledger = SimulatedLedger::new(Wallet::Approving("0xfeed".into()));
        ledger.connect().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_connect_outcomes() {
        let missing = SimulatedLedger::new(Wallet::Missing);
        assert!(matches!(
            missing.connect().await,
            Err(LedgerError::WalletUnavailable)
        ));

        let declining = SimulatedLedger::new(Wallet::Declining);
        assert!(matches!(
            declining.connect().await,
            Err(LedgerError::UserRejected)
        ));

        let approving = SimulatedLedger::new(Wallet::Approving("0xfeed".into()));
        assert_eq!(approving.connect().await.unwrap(), "0xfeed");
    }

    #[tokio::test]
    async fn test_calls_require_connection() {
        let ledger = SimulatedLedger::new(Wallet::Approving("0xfeed".into()));
        assert!(matches!(
            ledger.list().await,
            Err(LedgerError::CallFailed { call: "getTodos", .. })
        ));
    }

    #[tokio::test]
    async fn test_create_toggle_update_remove() {
        let ledger = connected().await;

        ledger.create("a", "first", 0, 1, 5).await.unwrap().wait().await.unwrap();
        ledger.create("b", "second", 2, 3, 7).await.unwrap().wait().await.unwrap();
        ledger.toggle(0).await.unwrap().wait().await.unwrap();
        ledger.update(1, "b2", "changed", 1).await.unwrap().wait().await.unwrap();

        let entries = ledger.list().await.unwrap();
        assert!(entries[0].completed);
        assert_eq!(entries[1].title, "b2");
        assert_eq!(entries[1].priority, 1);
        assert_eq!(entries[1].stake_wei, 7);

        ledger.remove(0).await.unwrap().wait().await.unwrap();
        let entries = ledger.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "b2");
    }

    #[tokio::test]
    async fn test_out_of_range_index_reverts() {
        let ledger = connected().await;
        assert!(ledger.toggle(3).await.is_err());
        assert!(ledger.remove(0).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let ledger = connected().await;
        ledger.fail(LedgerCall::Create);
        assert!(ledger.create("a", "", 0, 0, 1).await.is_err());
        assert!(ledger.entries().is_empty());

        ledger.recover(LedgerCall::Create);
        assert!(ledger.create("a", "", 0, 0, 1).await.is_ok());
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_waits_for_block_time() {
        let ledger = SimulatedLedger::new(Wallet::Approving("0xfeed".into()))
            .with_block_time(Duration::from_secs(2));
        ledger.connect().await.unwrap();

        let start = tokio::time::Instant::now();
        let tx = ledger.create("a", "", 0, 0, 1).await.unwrap();
        let receipt = tx.wait().await.unwrap();

        assert!(receipt.tx_hash.starts_with("0x"));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}

// Where the collection lives: the local slot in demo mode, or the ledger once
// a wallet is connected. Each operation returns the complete next collection;
// the list only adopts it when the whole operation succeeded.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

use crate::app::error::TodoError;
use crate::app::ledger::{format_ether, parse_ether, Ledger, LedgerEntry, PendingTx};
use crate::app::models::{Priority, Timeframe, Todo, TodoDraft};
use crate::app::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Demo,
    Ledger,
}

#[async_trait]
pub trait TodoBackend: Send {
    fn mode(&self) -> BackendMode;

    // Initial contents for a new session
    async fn load(&mut self) -> Result<Vec<Todo>, TodoError>;

    async fn add(&mut self, current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError>;

    async fn toggle(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError>;

    async fn update(&mut self, current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError>;

    async fn remove(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError>;

    async fn refresh(&mut self) -> Result<Vec<Todo>, TodoError>;

    // Called after a local reorder
    async fn store_order(&mut self, todos: &[Todo]) -> Result<(), TodoError>;
}

fn position(current: &[Todo], id: &str) -> Result<usize, TodoError> {
    current
        .iter()
        .position(|todo| todo.id == id)
        .ok_or_else(|| TodoError::NotFound(id.to_string()))
}

// Ledger ids are the entries' indices in the contract array, independent of
// where the entry sits in a locally reordered list
fn ledger_index(current: &[Todo], id: &str) -> Result<usize, TodoError> {
    position(current, id)?;
    id.parse().map_err(|_| TodoError::NotFound(id.to_string()))
}

pub struct LocalBackend {
    storage: Storage,
    key: String,
    seed: Vec<TodoDraft>,
}

impl LocalBackend {
    pub fn new(storage: Storage, key: &str, seed: Vec<TodoDraft>) -> LocalBackend {
        LocalBackend {
            storage,
            key: key.to_string(),
            seed,
        }
    }

    fn persist(&self, todos: Vec<Todo>) -> Result<Vec<Todo>, TodoError> {
        self.storage.save(&self.key, &todos)?;
        Ok(todos)
    }
}

// Seed entries get short sequential ids, like the sample data always had
pub fn seed_todos(seed: &[TodoDraft], now: DateTime<Utc>) -> Vec<Todo> {
    seed.iter()
        .enumerate()
        .map(|(i, draft)| Todo::with_id((i + 1).to_string(), draft.clone(), now))
        .collect()
}

#[async_trait]
impl TodoBackend for LocalBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn load(&mut self) -> Result<Vec<Todo>, TodoError> {
        Ok(self.storage.load(&self.key))
    }

    async fn add(&mut self, current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError> {
        let mut next = current.to_vec();
        next.push(todo);
        self.persist(next)
    }

    async fn toggle(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError> {
        let index = position(current, id)?;
        let mut next = current.to_vec();
        next[index].completed = !next[index].completed;
        self.persist(next)
    }

    async fn update(&mut self, current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError> {
        let index = position(current, &todo.id)?;
        let mut next = current.to_vec();
        next[index] = todo;
        self.persist(next)
    }

    async fn remove(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError> {
        position(current, id)?;
        let next = current.iter().filter(|todo| todo.id != id).cloned().collect();
        self.persist(next)
    }

    async fn refresh(&mut self) -> Result<Vec<Todo>, TodoError> {
        debug!("Demo refresh, substituting {} seed entries", self.seed.len());
        self.persist(seed_todos(&self.seed, Utc::now()))
    }

    async fn store_order(&mut self, todos: &[Todo]) -> Result<(), TodoError> {
        self.storage.save(&self.key, todos)
    }
}

/// Ledger-backed session. Ids are the entries' positions in the contract
/// array, so they shift whenever an earlier entry is deleted.
pub struct RemoteBackend {
    ledger: Arc<dyn Ledger>,
    account: String,
}

impl RemoteBackend {
    pub fn new(ledger: Arc<dyn Ledger>, account: String) -> RemoteBackend {
        RemoteBackend { ledger, account }
    }

    async fn confirm(&self, tx: PendingTx) -> Result<(), TodoError> {
        debug!("Waiting for {} ({})", tx.hash(), self.account);
        let receipt = tx.wait().await?;
        debug!("Confirmed {}", receipt.tx_hash);
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<Todo>, TodoError> {
        let entries = self.ledger.list().await?;
        let now = Utc::now();
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry_to_todo(index, entry, now))
            .collect())
    }
}

// The contract keeps no creation time, so the deadline restarts at every fetch
fn entry_to_todo(index: usize, entry: LedgerEntry, now: DateTime<Utc>) -> Todo {
    let priority = Priority::from_index(entry.priority).unwrap_or_else(|| {
        warn!("Entry {index} has unknown priority {}", entry.priority);
        Priority::default()
    });
    let timeframe = Timeframe::from_index(entry.timeframe).unwrap_or_else(|| {
        warn!("Entry {index} has unknown timeframe {}", entry.timeframe);
        Timeframe::default()
    });

    let mut todo = Todo::with_id(
        index.to_string(),
        TodoDraft {
            title: entry.title,
            description: entry.description,
            priority,
            timeframe,
            stake_amount: format_ether(entry.stake_wei),
        },
        now,
    );
    todo.completed = entry.completed;
    todo
}

#[async_trait]
impl TodoBackend for RemoteBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Ledger
    }

    async fn load(&mut self) -> Result<Vec<Todo>, TodoError> {
        self.fetch().await
    }

    async fn add(&mut self, _current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError> {
        let tx = self
            .ledger
            .create(
                &todo.title,
                &todo.description,
                todo.priority.index(),
                todo.timeframe.index(),
                parse_ether(todo.stake_amount),
            )
            .await?;
        self.confirm(tx).await?;
        self.fetch().await
    }

    async fn toggle(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError> {
        let index = ledger_index(current, id)?;
        let tx = self.ledger.toggle(index).await?;
        self.confirm(tx).await?;
        self.fetch().await
    }

    async fn update(&mut self, current: &[Todo], todo: Todo) -> Result<Vec<Todo>, TodoError> {
        let index = ledger_index(current, &todo.id)?;
        let tx = self
            .ledger
            .update(index, &todo.title, &todo.description, todo.priority.index())
            .await?;
        self.confirm(tx).await?;
        self.fetch().await
    }

    async fn remove(&mut self, current: &[Todo], id: &str) -> Result<Vec<Todo>, TodoError> {
        let index = ledger_index(current, id)?;
        let tx = self.ledger.remove(index).await?;
        self.confirm(tx).await?;
        self.fetch().await
    }

    async fn refresh(&mut self) -> Result<Vec<Todo>, TodoError> {
        self.fetch().await
    }

    async fn store_order(&mut self, _todos: &[Todo]) -> Result<(), TodoError> {
        // The contract has no ordering call; the order lasts until the next fetch
        Ok(())
    }
}

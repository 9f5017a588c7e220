use clap::Parser;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::app::models::{default_seed, TodoDraft};
use crate::app::simulated_ledger::Wallet;

/// Staked todo list for the terminal
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// SQLite file holding the demo-mode todos
    #[arg(long, env = "STAKE_TODO_DB", default_value = "todos.db")]
    pub db: PathBuf,

    /// Where log output goes (the terminal belongs to the UI)
    #[arg(long, env = "STAKE_TODO_LOG", default_value = "stake-todo.log")]
    pub log_file: PathBuf,

    /// JSON array of todo drafts substituted by a demo-mode refresh
    #[arg(long, env = "STAKE_TODO_SEED")]
    pub seed: Option<PathBuf>,

    /// Account address of the wallet; without it no wallet is available
    #[arg(long, env = "STAKE_TODO_WALLET")]
    pub wallet: Option<String>,

    /// Make the wallet reject connection requests
    #[arg(long)]
    pub wallet_declines: bool,

    /// Time until a ledger transaction is confirmed
    #[arg(long, default_value_t = 1500)]
    pub block_time_ms: u64,

    #[arg(long, default_value_t = 60)]
    pub deadline_interval_secs: u64,

    /// Report each missed deadline once instead of on every check
    #[arg(long)]
    pub notify_once: bool,
}

impl Config {
    pub fn wallet(&self) -> Wallet {
        match (&self.wallet, self.wallet_declines) {
            (None, _) => Wallet::Missing,
            (Some(_), true) => Wallet::Declining,
            (Some(address), false) => Wallet::Approving(address.clone()),
        }
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn deadline_interval(&self) -> Duration {
        Duration::from_secs(self.deadline_interval_secs.max(1))
    }

    pub fn load_seed(&self) -> Result<Vec<TodoDraft>, Box<dyn Error>> {
        match &self.seed {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(default_seed()),
        }
    }
}

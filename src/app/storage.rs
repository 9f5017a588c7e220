// Durable single-slot store for the demo-mode collection.
// Each key holds one JSON snapshot of the whole list inside SQLite.
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::app::error::TodoError;
use crate::app::models::Todo;

pub const TODOS_KEY: &str = "todos";

pub struct Storage {
    pub db_con: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> Result<Storage> {
        let storage = Storage {
            db_con: Connection::open(path)?,
        };
        storage.create_table_if_not_exists()?;
        Ok(storage)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Storage> {
        let storage = Storage {
            db_con: Connection::open_in_memory()?,
        };
        storage.create_table_if_not_exists()?;
        Ok(storage)
    }

    pub fn create_table_if_not_exists(&self) -> Result<()> {
        self.db_con.execute(
            "CREATE TABLE IF NOT EXISTS kv_slot (
                Key TEXT PRIMARY KEY,
                Value TEXT NOT NULL
            );",
            (),
        )?;
        Ok(())
    }

    // READ
    // A missing or unreadable slot yields an empty collection
    pub fn load(&self, key: &str) -> Vec<Todo> {
        let raw: Option<String> = match self
            .db_con
            .query_row("SELECT Value FROM kv_slot WHERE Key = ?1;", [key], |row| {
                row.get(0)
            })
            .optional()
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Failed to read slot {key}: {err}");
                return Vec::new();
            }
        };

        let mut todos: Vec<Todo> = match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(todos) => todos,
                Err(err) => {
                    warn!("Slot {key} holds unparsable data, starting empty: {err}");
                    return Vec::new();
                }
            },
            None => return Vec::new(),
        };

        // Ids must stay unique; the first occurrence wins
        let mut seen = HashSet::new();
        todos.retain(|todo| {
            let first = seen.insert(todo.id.clone());
            if !first {
                warn!("Slot {key} repeats todo {}, dropping the copy", todo.id);
            }
            first
        });
        todos
    }

    // WRITE
    // Overwrites whatever the slot held before
    pub fn save(&self, key: &str, todos: &[Todo]) -> Result<(), TodoError> {
        // JSON has no infinity, it would come back as null and spoil the slot
        if let Some(todo) = todos.iter().find(|todo| !todo.stake_amount.is_finite()) {
            return Err(TodoError::InvalidStake(todo.id.clone()));
        }
        let raw = serde_json::to_string(todos)?;
        self.db_con.execute(
            "INSERT INTO kv_slot (Key, Value) VALUES (?1, ?2)
             ON CONFLICT(Key) DO UPDATE SET Value = excluded.Value;",
            (key, &raw),
        )?;
        debug!("Saved {} todos under {key}", todos.len());
        Ok(())
    }
}

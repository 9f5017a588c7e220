use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    // Position in the fixed enumeration, as sent to the ledger
    pub fn index(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Priority> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1 hour")]
    Hour,
    #[default]
    #[serde(rename = "1 day")]
    Day,
    #[serde(rename = "1 week")]
    Week,
    #[serde(rename = "1 month")]
    Month,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Hour,
        Timeframe::Day,
        Timeframe::Week,
        Timeframe::Month,
    ];

    pub fn index(self) -> u8 {
        match self {
            Timeframe::Hour => 0,
            Timeframe::Day => 1,
            Timeframe::Week => 2,
            Timeframe::Month => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Timeframe> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn hours(self) -> i64 {
        match self {
            Timeframe::Hour => 1,
            Timeframe::Day => 24,
            Timeframe::Week => 168,
            Timeframe::Month => 720,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::hours(self.hours())
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Hour => "1 hour",
            Timeframe::Day => "1 day",
            Timeframe::Week => "1 week",
            Timeframe::Month => "1 month",
        }
    }
}

/// A single staked todo entry.
///
/// Serializes to the same JSON shape the local slot has always held:
/// camelCase keys, enum labels as strings and epoch milliseconds for times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub completed: bool,
    pub priority: Priority,
    pub timeframe: Timeframe,
    pub stake_amount: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub deadline: DateTime<Utc>,
}

/// User input for a new todo. Also the shape of configured seed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub timeframe: Timeframe,
    pub stake_amount: f64,
}

impl Todo {
    // Build a fresh todo with a random id
    pub fn create(draft: TodoDraft, now: DateTime<Utc>) -> Todo {
        Todo::with_id(Uuid::new_v4().to_string(), draft, now)
    }

    // The deadline is fixed here and never recomputed afterwards.
    // Times are kept at millisecond precision, the resolution they are stored with.
    pub fn with_id(id: String, draft: TodoDraft, now: DateTime<Utc>) -> Todo {
        let now = now.trunc_subsecs(3);
        Todo {
            id,
            title: draft.title,
            description: draft.description,
            timestamp: now,
            completed: false,
            priority: draft.priority,
            timeframe: draft.timeframe,
            stake_amount: draft.stake_amount,
            deadline: now + draft.timeframe.duration(),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.deadline < now
    }

    // `needle` must already be lowercase
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

// Sample entries substituted by a demo-mode refresh when no seed is configured
pub fn default_seed() -> Vec<TodoDraft> {
    vec![
        TodoDraft {
            title: "Implement smart contract".into(),
            description: "Create a Solidity smart contract for the Todo app".into(),
            priority: Priority::High,
            timeframe: Timeframe::Day,
            stake_amount: 0.1,
        },
        TodoDraft {
            title: "Design NFT collection".into(),
            description: "Create unique NFT designs for the project".into(),
            priority: Priority::Medium,
            timeframe: Timeframe::Week,
            stake_amount: 0.5,
        },
    ]
}

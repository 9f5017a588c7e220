use chrono::{DateTime, Local, Utc};
use log::{debug, error, info};
use now::DateTimeNow;
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::*;
use std::sync::Arc;
use tokio::sync::watch;

use crate::app::backend::{BackendMode, RemoteBackend, TodoBackend};
use crate::app::error::TodoError;
use crate::app::ledger::Ledger;
use crate::app::models::{Priority, Todo, TodoDraft};

use super::ui::App;

// The in-memory source of truth. Every change goes through the active backend
// and is only adopted once the backend reports success.
pub struct TodoList {
    items: Vec<Todo>,
    backend: Box<dyn TodoBackend>,
    snapshot: watch::Sender<Vec<Todo>>,
}

impl TodoList {
    // Start a session with whatever the backend currently holds
    pub async fn open(mut backend: Box<dyn TodoBackend>) -> Result<TodoList, TodoError> {
        let items = backend.load().await?;
        info!("Loaded {} todos ({:?} mode)", items.len(), backend.mode());
        let (snapshot, _) = watch::channel(items.clone());
        Ok(TodoList {
            items,
            backend,
            snapshot,
        })
    }

    pub fn items(&self) -> &[Todo] {
        &self.items
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.items.iter().find(|todo| todo.id == id)
    }

    // Receives a copy of the collection after every applied change
    pub fn subscribe(&self) -> watch::Receiver<Vec<Todo>> {
        self.snapshot.subscribe()
    }

    fn replace(&mut self, items: Vec<Todo>) {
        self.items = items;
        self.snapshot.send_replace(self.items.clone());
    }

    fn log_failure(operation: &str, err: &TodoError) {
        error!("{operation} failed: {err}");
    }

    // Input is expected to be validated by the form already
    pub async fn add(&mut self, draft: TodoDraft) -> Result<Todo, TodoError> {
        let todo = Todo::create(draft, Utc::now());
        debug!("Adding todo {}", todo.id);
        let next = self
            .backend
            .add(&self.items, todo)
            .await
            .inspect_err(|err| Self::log_failure("add", err))?;
        self.replace(next);
        self.items
            .last()
            .cloned()
            .ok_or_else(|| TodoError::InvalidIndex(0))
    }

    pub async fn toggle(&mut self, id: &str) -> Result<(), TodoError> {
        let next = self
            .backend
            .toggle(&self.items, id)
            .await
            .inspect_err(|err| Self::log_failure("toggle", err))?;
        self.replace(next);
        Ok(())
    }

    pub async fn update(&mut self, todo: Todo) -> Result<(), TodoError> {
        let next = self
            .backend
            .update(&self.items, todo)
            .await
            .inspect_err(|err| Self::log_failure("update", err))?;
        self.replace(next);
        Ok(())
    }

    pub async fn set_priority(&mut self, id: &str, priority: Priority) -> Result<(), TodoError> {
        let mut todo = self
            .get(id)
            .cloned()
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        todo.priority = priority;
        self.update(todo).await
    }

    pub async fn remove(&mut self, id: &str) -> Result<(), TodoError> {
        let next = self
            .backend
            .remove(&self.items, id)
            .await
            .inspect_err(|err| Self::log_failure("remove", err))?;
        self.replace(next);
        Ok(())
    }

    // Move the entry at `source` to `dest`, shifting the ones in between.
    // No destination means the move was cancelled. Returns whether anything moved.
    pub async fn reorder(&mut self, source: usize, dest: Option<usize>) -> Result<bool, TodoError> {
        let dest = match dest {
            Some(dest) => dest,
            None => return Ok(false),
        };
        if source >= self.items.len() {
            return Err(TodoError::InvalidIndex(source));
        }

        let mut next = self.items.clone();
        let moved = next.remove(source);
        let dest = dest.min(next.len());
        next.insert(dest, moved);

        self.backend
            .store_order(&next)
            .await
            .inspect_err(|err| Self::log_failure("reorder", err))?;
        self.replace(next);
        Ok(source != dest)
    }

    // Replace everything with the backend's authoritative list
    pub async fn refresh(&mut self) -> Result<(), TodoError> {
        let next = self
            .backend
            .refresh()
            .await
            .inspect_err(|err| Self::log_failure("refresh", err))?;
        self.replace(next);
        Ok(())
    }

    // Switch the session over to the ledger. The current backend stays active
    // if the wallet or the first fetch fails.
    pub async fn connect(&mut self, ledger: Arc<dyn Ledger>) -> Result<String, TodoError> {
        let account = ledger
            .connect()
            .await
            .inspect_err(|err| error!("Wallet connection failed: {err}"))?;
        let mut backend = RemoteBackend::new(ledger, account.clone());
        let items = backend
            .load()
            .await
            .inspect_err(|err| Self::log_failure("ledger fetch", err))?;

        info!("Connected wallet {account}, {} todos on the ledger", items.len());
        self.backend = Box::new(backend);
        self.replace(items);
        Ok(account)
    }

    // Case-insensitive match on title or description
    pub fn filter(&self, term: &str) -> Vec<&Todo> {
        let needle = term.to_lowercase();
        self.items
            .iter()
            .filter(|todo| todo.matches(&needle))
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|todo| todo.completed)
    }

    pub fn get_uncompleted(&self) -> Vec<&Todo> {
        return self
            .items
            .iter()
            .filter(|todo| !todo.completed)
            .collect::<Vec<&Todo>>();
    }

    // Open todos whose deadline falls before the end of the local day
    pub fn get_due_today(&self) -> Vec<&Todo> {
        self.get_due_by(Local::now().end_of_day().with_timezone(&Utc))
    }

    fn get_due_by(&self, end_of_day: DateTime<Utc>) -> Vec<&Todo> {
        return self
            .items
            .iter()
            .filter(|todo| !todo.completed && todo.deadline <= end_of_day)
            .collect::<Vec<&Todo>>();
    }

    pub fn get_overdue(&self) -> Vec<&Todo> {
        let now = Utc::now();
        return self
            .items
            .iter()
            .filter(|todo| todo.is_overdue(now))
            .collect::<Vec<&Todo>>();
    }

    pub fn stake_at_risk(&self) -> f64 {
        self.get_uncompleted()
            .iter()
            .map(|todo| todo.stake_amount)
            .sum()
    }
}

// Build the UI (list) for the visible todos
pub fn get_list_items_ui<'a>(todos: &[&'a Todo]) -> Vec<ListItem<'a>> {
    let now = Utc::now();
    return todos
        .iter()
        .map(|&todo| {
            let mut lines = Vec::new();

            let title_color = match todo.priority {
                Priority::Medium => Color::Yellow,
                Priority::High => Color::Red,
                Priority::Low => Color::White,
            };

            lines.push(Line::from(vec![
                Span::from(if todo.completed { "[✓] " } else { "[ ] " }),
                Span::from(todo.title.as_str()).fg(title_color),
                Span::from(format!("  {} ETH", todo.stake_amount)).fg(Color::Cyan),
            ]));

            let deadline = Span::from(format!(
                "    Due: {}",
                todo.deadline.format("%d.%m.%Y %H:%M")
            ));
            lines.push(Line::from(vec![
                if todo.is_overdue(now) {
                    deadline.fg(Color::Red)
                } else {
                    deadline
                },
                Span::from(format!(" {}", todo.description)),
            ]));
            ListItem::new(lines).style(Style::default().fg(Color::White))
        })
        .collect();
}

// Build the UI (lines) for statistics infobox
pub fn get_statistics_ui<'a>(app: &App) -> Vec<Line<'a>> {
    return vec![
        Line::from(format!("Total todos: {}", app.todos.items().len())),
        Line::from(format!(
            "Uncompleted todos: {}",
            app.todos.get_uncompleted().len()
        )),
        Line::from(format!("Due today: {}", app.todos.get_due_today().len())),
        Line::from(format!("Overdue: {}", app.todos.get_overdue().len())),
        Line::from(format!("Stake at risk: {:.4} ETH", app.todos.stake_at_risk())),
        Line::from(match (&app.todos.mode(), &app.account) {
            (BackendMode::Ledger, Some(account)) => format!("Wallet: {}", short_address(account)),
            _ => "Mode: demo (local storage)".to_string(),
        }),
    ];
}

// 0x1234...abcd
fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// Build the UI (lines) for instructions infobox
pub fn get_instructions_ui<'a>() -> Vec<Line<'a>> {
    return vec![
        "Enter - toggle do/done".into(),
        "a - add a todo".into(),
        "e - edit a todo".into(),
        "x - delete a todo".into(),
        "l/m/h - set priority".into(),
        "J/K - move down/up".into(),
        "/ - search".into(),
        "r - refresh".into(),
        "w - connect wallet".into(),
        "q - quit".into(),
    ];
}

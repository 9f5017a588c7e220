use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::StreamExt;
use log::debug;
use ratatui::{prelude::*, widgets::*};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::mpsc;

use crate::app::backend::BackendMode;
use crate::app::deadline::DeadlineMissed;
use crate::app::error::{LedgerError, TodoError};
use crate::app::ledger::Ledger;
use crate::app::models::Priority;
use crate::app::notice::{Notice, NoticeFeed, NoticeLevel};
use crate::app::todo_edit::*;
use crate::app::todo_list::*;

const NOTICE_CAPACITY: usize = 50;

pub struct App {
    pub todos: TodoList,
    pub todo_edit_dialog_state: TodoEditDialogState,
    pub state: ListState,
    pub search: String,
    pub searching: bool,
    pub notices: NoticeFeed,
    pub busy: bool,
    pub account: Option<String>,
    ledger: Option<Arc<dyn Ledger>>,
}

// Everything that has to go through the todo list (and may wait on I/O)
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Toggle(String),
    Remove(String),
    SetPriority(String, Priority),
    Move {
        source: usize,
        dest: Option<usize>,
        select: usize,
    },
    Refresh,
    Connect,
    Submit(DialogOutcome),
}

impl App {
    pub fn new(todos: TodoList, ledger: Option<Arc<dyn Ledger>>) -> App {
        let mut state = ListState::default();
        if !todos.items().is_empty() {
            state.select(Some(0));
        }
        App {
            todos,
            todo_edit_dialog_state: TodoEditDialogState::default(),
            state,
            search: String::new(),
            searching: false,
            notices: NoticeFeed::with_capacity(NOTICE_CAPACITY),
            busy: false,
            account: None,
            ledger,
        }
    }

    // Ids of the todos matching the search box, in list order
    pub fn visible_ids(&self) -> Vec<String> {
        self.todos
            .filter(&self.search)
            .into_iter()
            .map(|todo| todo.id.clone())
            .collect()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.state
            .selected()
            .and_then(|i| self.visible_ids().get(i).cloned())
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.todos.items().iter().position(|todo| todo.id == id)
    }

    // Move the selection to the next item
    pub fn next(&mut self) {
        let len = self.visible_ids().len();
        let i = match self.state.selected() {
            Some(i) => {
                if len == 0 || i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    // Move the selection to the previous item
    pub fn previous(&mut self) {
        let len = self.visible_ids().len();
        let i = match self.state.selected() {
            Some(i) => {
                if len == 0 {
                    0
                } else if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn unselect(&mut self) {
        self.state.select(None);
    }

    // Keep the selection inside the visible list after it changed
    fn clamp_selection(&mut self) {
        let len = self.visible_ids().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    // Neighbour swap within the visible list, expressed on the full list
    fn move_selected(&self, down: bool) -> Option<Action> {
        let visible = self.visible_ids();
        let i = self.state.selected()?;
        let source = self.position_of(visible.get(i)?)?;
        let target = if down { i.checked_add(1) } else { i.checked_sub(1) };
        let dest = target
            .and_then(|t| visible.get(t))
            .and_then(|id| self.position_of(id));
        Some(Action::Move {
            source,
            dest,
            select: target.filter(|t| *t < visible.len()).unwrap_or(i),
        })
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    // Key handling that needs no I/O happens here; the rest becomes an Action
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.todo_edit_dialog_state.dialog_active {
            let dialog = &mut self.todo_edit_dialog_state;
            match key.code {
                KeyCode::Down | KeyCode::Tab => dialog.move_cursor_down(),
                KeyCode::Up | KeyCode::BackTab => dialog.move_cursor_up(),
                KeyCode::Esc => dialog.close(),
                KeyCode::Enter => return dialog.submit().map(Action::Submit),
                KeyCode::Left => dialog.move_cursor_left(),
                KeyCode::Right => dialog.move_cursor_right(),
                KeyCode::Backspace => dialog.delete_char(),
                KeyCode::Char(to_insert) => dialog.input(to_insert),
                _ => {}
            }
            return None;
        }

        if self.searching {
            match key.code {
                KeyCode::Enter => self.searching = false,
                KeyCode::Esc => {
                    self.searching = false;
                    self.search.clear();
                }
                KeyCode::Backspace => {
                    self.search.pop();
                }
                KeyCode::Char(c) => self.search.push(c),
                _ => {}
            }
            self.state.select(None);
            self.clamp_selection();
            return None;
        }

        let selected = self.selected_id();
        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('x') => return selected.map(Action::Remove),
            KeyCode::Enter => return selected.map(Action::Toggle),
            KeyCode::Char('l') => return selected.map(|id| Action::SetPriority(id, Priority::Low)),
            KeyCode::Char('m') => {
                return selected.map(|id| Action::SetPriority(id, Priority::Medium))
            }
            KeyCode::Char('h') => return selected.map(|id| Action::SetPriority(id, Priority::High)),
            KeyCode::Char('J') => return self.move_selected(true),
            KeyCode::Char('K') => return self.move_selected(false),
            KeyCode::Char('r') => return Some(Action::Refresh),
            KeyCode::Char('w') => return Some(Action::Connect),
            KeyCode::Char('a') => self.todo_edit_dialog_state.create_a_new_todo(),
            KeyCode::Char('e') => {
                if let Some(todo) = selected.as_deref().and_then(|id| self.todos.get(id)) {
                    self.todo_edit_dialog_state.edit_todo(todo);
                }
            }
            KeyCode::Char('/') => self.searching = true,
            KeyCode::Left => self.unselect(),
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            _ => {}
        }
        None
    }

    fn done_suffix(&self) -> &'static str {
        match self.todos.mode() {
            BackendMode::Demo => "(Demo mode)",
            BackendMode::Ledger => "on the ledger",
        }
    }

    fn report(&mut self, result: Result<(), TodoError>, success: String, failure: &str) {
        match result {
            Ok(()) => self.push_notice(Notice::success(success)),
            Err(err) => self.push_notice(Notice::error(format!("{failure}: {err}"))),
        }
    }

    // Run an action against the todo list. Returns false when the app should quit.
    pub async fn perform(&mut self, action: Action) -> bool {
        debug!("Performing {action:?}");
        let suffix = self.done_suffix();
        match action {
            Action::Quit => return false,
            Action::Toggle(id) => {
                let result = self.todos.toggle(&id).await;
                self.report(result, format!("Todo status updated {suffix}"), "Failed to update todo status");
                if self.todos.all_completed() {
                    self.push_notice(Notice::success("All todos completed!"));
                }
            }
            Action::Remove(id) => {
                let result = self.todos.remove(&id).await;
                self.report(result, format!("Todo deleted {suffix}"), "Failed to delete todo");
            }
            Action::SetPriority(id, priority) => {
                let result = self.todos.set_priority(&id, priority).await;
                self.report(
                    result,
                    format!("Priority set to {} {suffix}", priority.label()),
                    "Failed to update todo",
                );
            }
            Action::Move {
                source,
                dest,
                select,
            } => match self.todos.reorder(source, dest).await {
                Ok(true) => {
                    self.state.select(Some(select));
                    self.push_notice(Notice::info("Todo reordered successfully"));
                }
                Ok(false) => {}
                Err(err) => self.push_notice(Notice::error(format!("Failed to reorder: {err}"))),
            },
            Action::Refresh => {
                let result = self.todos.refresh().await;
                self.report(result, format!("Todos refreshed {suffix}"), "Failed to fetch todos");
            }
            Action::Connect => self.connect().await,
            Action::Submit(DialogOutcome::Create(draft)) => {
                let result = self.todos.add(draft).await.map(|_| ());
                self.report(result, format!("Todo added {suffix}"), "Failed to add todo");
            }
            Action::Submit(DialogOutcome::Update(todo)) => {
                let result = self.todos.update(todo).await;
                self.report(result, format!("Todo updated {suffix}"), "Failed to update todo");
            }
        }
        self.clamp_selection();
        true
    }

    async fn connect(&mut self) {
        if self.todos.mode() == BackendMode::Ledger {
            self.push_notice(Notice::info("Wallet already connected"));
            return;
        }
        let ledger = match &self.ledger {
            Some(ledger) => ledger.clone(),
            None => {
                let err = TodoError::from(LedgerError::WalletUnavailable);
                self.push_notice(Notice::error(format!("Please install a wallet: {err}")));
                return;
            }
        };
        match self.todos.connect(ledger).await {
            Ok(account) => {
                self.account = Some(account);
                self.push_notice(Notice::success("Wallet connected successfully"));
            }
            Err(err) => self.push_notice(Notice::error(format!("Failed to connect wallet: {err}"))),
        }
    }
}

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut missed: mpsc::UnboundedReceiver<DeadlineMissed>,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(tick_rate);
    loop {
        terminal.draw(|f| draw_ui(f, &mut app))?;

        tokio::select! {
            _ = ticker.tick() => {}
            Some(event) = missed.recv() => app.push_notice(Notice::deadline_missed(&event)),
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = app.handle_key(key) {
                        // Show the busy marker while waiting on storage or the ledger
                        app.busy = true;
                        terminal.draw(|f| draw_ui(f, &mut app))?;
                        let keep_running = app.perform(action).await;
                        app.busy = false;
                        if !keep_running {
                            return Ok(());
                        }
                    }
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(()),
                _ => {}
            },
        }
    }
}

// Build the UI (lines) for the notifications box
fn get_notices_ui<'a>(notices: &NoticeFeed) -> Vec<Line<'a>> {
    notices
        .iter()
        .map(|notice| {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(vec![
                Span::from(notice.at.format("%H:%M:%S ").to_string()).fg(Color::DarkGray),
                Span::from(notice.message.clone()).fg(color),
            ])
        })
        .collect()
}

// Draws the whole user interface
fn draw_ui(f: &mut Frame, app: &mut App) {
    // Create two chunks of screen in 60-40 ratio
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(f.size());

    // DRAW LEFT PART
    // Search line on top, todos in the middle, notifications at the bottom
    let left_side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(8),
        ])
        .split(chunks[0]);

    let search_style = if app.searching {
        Style::new().fg(Color::Yellow)
    } else {
        Style::new().white()
    };
    let search = Paragraph::new(if app.search.is_empty() && !app.searching {
        "Press / to search todos".to_string()
    } else {
        app.search.clone()
    })
    .block(Block::default().borders(Borders::ALL).title("Search"))
    .style(search_style);
    f.render_widget(search, left_side[0]);

    let list_title = if app.busy { "Todos (working...)" } else { "Todos" };
    let visible = app.todos.filter(&app.search);
    let todo_list = List::new(get_list_items_ui(&visible))
        .block(Block::default().borders(Borders::ALL).title(list_title))
        .highlight_style(
            Style::default()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(todo_list, left_side[1], &mut app.state);

    let notices = Paragraph::new(get_notices_ui(&app.notices))
        .block(Block::new().title("Notifications").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(notices, left_side[2]);

    // DRAW RIGHT PART
    if app.todo_edit_dialog_state.dialog_active {
        let title = if app.todo_edit_dialog_state.is_editing() {
            "Edit Todo"
        } else {
            "Add Todo"
        };
        let create_or_edit_todo = Paragraph::new(get_todo_edit_ui(&app.todo_edit_dialog_state))
            .block(Block::new().title(title).borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(create_or_edit_todo, chunks[1]);
    } else {
        // If not editing, display instructions and statistics in vertically split layout
        let right_side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let instructions = Paragraph::new(get_instructions_ui())
            .block(Block::new().title("Commands").borders(Borders::ALL))
            .style(Style::new().white());

        let statistics = Paragraph::new(get_statistics_ui(app))
            .block(Block::new().title("Statistics").borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(instructions, right_side[0]);
        f.render_widget(statistics, right_side[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::backend::LocalBackend;
    use crate::app::models::{Timeframe, TodoDraft};
    use crate::app::simulated_ledger::{SimulatedLedger, Wallet};
    use crate::app::storage::{Storage, TODOS_KEY};
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn draft(title: &str) -> TodoDraft {
        TodoDraft {
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            timeframe: Timeframe::Day,
            stake_amount: 0.1,
        }
    }

    async fn app_with(titles: &[&str], ledger: Option<Arc<dyn Ledger>>) -> App {
        let backend = LocalBackend::new(Storage::in_memory().unwrap(), TODOS_KEY, Vec::new());
        let mut todos = TodoList::open(Box::new(backend)).await.unwrap();
        for title in titles {
            todos.add(draft(title)).await.unwrap();
        }
        App::new(todos, ledger)
    }

    fn titles(app: &App) -> Vec<String> {
        app.todos.items().iter().map(|t| t.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_add_through_dialog() {
        let mut app = app_with(&[], None).await;
        assert_eq!(app.handle_key(key(KeyCode::Char('a'))), None);
        for c in "Buy milk".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        for _ in 0..4 {
            app.handle_key(key(KeyCode::Down));
        }
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Backspace));
        for c in "0.01".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }

        let action = app.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(app.perform(action).await);
        assert_eq!(titles(&app), vec!["Buy milk"]);
        assert_eq!(app.notices.iter().next().unwrap().level, NoticeLevel::Success);
        assert_eq!(app.state.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_toggle_selected_and_celebrate() {
        let mut app = app_with(&["only"], None).await;
        let action = app.handle_key(key(KeyCode::Enter)).unwrap();
        app.perform(action).await;

        assert!(app.todos.items()[0].completed);
        assert_eq!(app.notices.iter().next().unwrap().message, "All todos completed!");
    }

    #[tokio::test]
    async fn test_search_limits_actions_to_visible() {
        let mut app = app_with(&["apple", "banana", "apricot"], None).await;
        for c in "/ap".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.visible_ids().len(), 2);

        app.handle_key(key(KeyCode::Down));
        let action = app.handle_key(key(KeyCode::Char('x'))).unwrap();
        app.perform(action).await;
        assert_eq!(titles(&app), vec!["apple", "banana"]);
    }

    #[tokio::test]
    async fn test_move_within_filtered_view() {
        let mut app = app_with(&["apple", "banana", "apricot"], None).await;
        for c in "/ap".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Down));

        // "apricot" moves onto the slot of "apple"
        let action = app.handle_key(key(KeyCode::Char('K'))).unwrap();
        assert_eq!(
            action,
            Action::Move {
                source: 2,
                dest: Some(0),
                select: 0
            }
        );
        app.perform(action).await;
        assert_eq!(titles(&app), vec!["apricot", "apple", "banana"]);

        // Nothing above the first visible entry
        let action = app.handle_key(key(KeyCode::Char('K'))).unwrap();
        assert!(matches!(action, Action::Move { dest: None, .. }));
        app.perform(action).await;
        assert_eq!(titles(&app), vec!["apricot", "apple", "banana"]);
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let mut app = app_with(&["local"], None).await;
        let action = app.handle_key(key(KeyCode::Char('w'))).unwrap();
        app.perform(action).await;

        assert_eq!(app.todos.mode(), BackendMode::Demo);
        assert_eq!(app.notices.iter().next().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_connect_with_wallet() {
        let ledger: Arc<dyn Ledger> =
            Arc::new(SimulatedLedger::new(Wallet::Approving("0xfeedbeef00112233".into())));
        let mut app = app_with(&["local"], Some(ledger)).await;
        app.perform(Action::Connect).await;

        assert_eq!(app.todos.mode(), BackendMode::Ledger);
        assert_eq!(app.account.as_deref(), Some("0xfeedbeef00112233"));
        assert!(app.todos.items().is_empty());
        assert_eq!(app.state.selected(), None);
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = app_with(&[], None).await;
        let action = app.handle_key(key(KeyCode::Char('q'))).unwrap();
        assert!(!app.perform(action).await);
    }
}

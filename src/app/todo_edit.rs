use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::app::models::{Priority, Timeframe, Todo, TodoDraft};
use derivative::Derivative;

const TITLE: usize = 0;
const DESCRIPTION: usize = 1;
const PRIORITY: usize = 2;
const TIMEFRAME: usize = 3;
const STAKE: usize = 4;

// State object for the todo add/edit dialog
// Keeps track of the state of the dialog and the content of the todo being edited
#[derive(Derivative)]
#[derivative(Default)]
pub struct TodoEditDialogState {
    pub dialog_active: bool,
    editing: Option<Todo>,
    content: TodoEditDialogContent,
    error_message: Option<String>,
    // (char offset in the line, line)
    cursor_position: (usize, usize),
}

// Current content of the todo being edited/created
#[derive(Derivative, Clone)]
#[derivative(Default)]
struct TodoEditDialogContent {
    title: String,
    description: String,
    priority: Priority,
    timeframe: Timeframe,
    #[derivative(Default(value = "\"0\".to_string()"))]
    stake: String,
}

/// What a valid submission asks the todo list to do.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogOutcome {
    Create(TodoDraft),
    Update(Todo),
}

fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let position = all.iter().position(|item| *item == current).unwrap_or(0);
    let next = if forward {
        (position + 1) % all.len()
    } else {
        (position + all.len() - 1) % all.len()
    };
    all[next]
}

impl TodoEditDialogState {
    // Opens the dialog with the form defaults for a new todo
    pub fn create_a_new_todo(&mut self) {
        self.dialog_active = true;
        self.editing = None;
        self.content = TodoEditDialogContent::default();
        self.error_message = None;
        self.cursor_position = (0, TITLE);
    }

    // Opens the dialog prefilled with an existing todo
    pub fn edit_todo(&mut self, todo: &Todo) {
        self.dialog_active = true;
        self.editing = Some(todo.clone());
        self.content = TodoEditDialogContent {
            title: todo.title.clone(),
            description: todo.description.clone(),
            priority: todo.priority,
            timeframe: todo.timeframe,
            stake: todo.stake_amount.to_string(),
        };
        self.error_message = None;
        self.cursor_position = (todo.title.chars().count(), TITLE);
    }

    pub fn close(&mut self) {
        self.dialog_active = false;
        self.error_message = None;
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    // Timeframe and stake are fixed once a todo exists
    fn last_line(&self) -> usize {
        if self.is_editing() {
            PRIORITY
        } else {
            STAKE
        }
    }

    fn is_choice_line(line: usize) -> bool {
        line == PRIORITY || line == TIMEFRAME
    }

    // Move the cursor one line BELOW the current one, keeping the column if possible
    pub fn move_cursor_down(&mut self) {
        let (x, y) = self.cursor_position;
        let next_y = (y + 1).min(self.last_line());
        self.cursor_position = (x.min(self.line_length(next_y)), next_y);
    }

    // Move the cursor one line ABOVE the current one
    pub fn move_cursor_up(&mut self) {
        let (x, y) = self.cursor_position;
        let next_y = y.saturating_sub(1);
        self.cursor_position = (x.min(self.line_length(next_y)), next_y);
    }

    // Move the cursor one char LEFT, or pick the previous option on a choice line
    pub fn move_cursor_left(&mut self) {
        let (x, y) = self.cursor_position;
        match y {
            PRIORITY => {
                self.content.priority = cycle(&Priority::ALL, self.content.priority, false)
            }
            TIMEFRAME => {
                self.content.timeframe = cycle(&Timeframe::ALL, self.content.timeframe, false)
            }
            _ => self.cursor_position = (x.saturating_sub(1), y),
        }
    }

    // Move the cursor one char RIGHT, or pick the next option on a choice line
    pub fn move_cursor_right(&mut self) {
        let (x, y) = self.cursor_position;
        match y {
            PRIORITY => {
                self.content.priority = cycle(&Priority::ALL, self.content.priority, true)
            }
            TIMEFRAME => {
                self.content.timeframe = cycle(&Timeframe::ALL, self.content.timeframe, true)
            }
            _ => self.cursor_position = ((x + 1).min(self.line_length(y)), y),
        }
    }

    // Delete the char before the cursor
    pub fn delete_char(&mut self) {
        let (x, y) = self.cursor_position;
        if x == 0 || Self::is_choice_line(y) {
            return;
        }

        if let Some(text) = self.text_at_y_pos(y) {
            let at = byte_index(text, x - 1);
            text.remove(at);
            self.cursor_position = (x - 1, y);
        }
    }

    // Handles the input of a char on the currently active line
    pub fn input(&mut self, to_insert: char) {
        let (x, y) = self.cursor_position;
        match y {
            PRIORITY => {
                let priority = match to_insert {
                    'l' | '0' => Priority::Low,
                    'm' | '1' => Priority::Medium,
                    'h' | '2' => Priority::High,
                    _ => return,
                };
                self.content.priority = priority;
            }
            TIMEFRAME => {
                let timeframe = match to_insert {
                    'h' | '1' => Timeframe::Hour,
                    'd' | '2' => Timeframe::Day,
                    'w' | '3' => Timeframe::Week,
                    'm' | '4' => Timeframe::Month,
                    _ => return,
                };
                self.content.timeframe = timeframe;
            }
            STAKE => {
                let valid = to_insert.is_ascii_digit()
                    || (to_insert == '.' && !self.content.stake.contains('.'));
                if !valid {
                    return;
                }
                let at = byte_index(&self.content.stake, x);
                self.content.stake.insert(at, to_insert);
                self.cursor_position = (x + 1, y);
            }
            _ => {
                if let Some(text) = self.text_at_y_pos(y) {
                    let at = byte_index(text, x);
                    text.insert(at, to_insert);
                    self.cursor_position = (x + 1, y);
                }
            }
        }
    }

    fn text_at_y_pos(&mut self, y_position: usize) -> Option<&mut String> {
        match y_position {
            TITLE => Some(&mut self.content.title),
            DESCRIPTION => Some(&mut self.content.description),
            STAKE => Some(&mut self.content.stake),
            _ => None,
        }
    }

    fn line_length(&self, y_position: usize) -> usize {
        self.content_of_string_at_y_pos(y_position).chars().count()
    }

    // Maps the vertical cursor position to the displayed content
    fn content_of_string_at_y_pos(&self, y_position: usize) -> String {
        return match y_position {
            TITLE => self.content.title.clone(),
            DESCRIPTION => self.content.description.clone(),
            PRIORITY => self.content.priority.label().to_string(),
            TIMEFRAME => self.content.timeframe.label().to_string(),
            STAKE => self.content.stake.clone(),
            _ => "".to_string(),
        };
    }

    // Validates the form. Returns what to do with it, or keeps the dialog open
    // with an error message.
    pub fn submit(&mut self) -> Option<DialogOutcome> {
        let content = self.content.clone();
        if content.title.trim().is_empty() {
            self.error_message = Some("Title cannot be empty".to_string());
            return None;
        }

        let outcome = match &self.editing {
            Some(todo) => DialogOutcome::Update(Todo {
                title: content.title,
                description: content.description,
                priority: content.priority,
                ..todo.clone()
            }),
            None => {
                let stake_amount = match content.stake.parse::<f64>() {
                    Ok(stake) => stake,
                    Err(_e) => {
                        self.error_message = Some("Stake should be a number".to_string());
                        return None;
                    }
                };
                if !stake_amount.is_finite() {
                    self.error_message = Some("Stake is too large".to_string());
                    return None;
                }
                if stake_amount <= 0.0 {
                    self.error_message = Some("Stake must be greater than 0".to_string());
                    return None;
                }
                DialogOutcome::Create(TodoDraft {
                    title: content.title,
                    description: content.description,
                    priority: content.priority,
                    timeframe: content.timeframe,
                    stake_amount,
                })
            }
        };

        self.close();
        Some(outcome)
    }
}

// Returns the UI content for the todo edit dialog
pub fn get_todo_edit_ui<'a>(dialog: &TodoEditDialogState) -> Vec<Line<'a>> {
    const GRAY_TEXT: Style = Style::new().fg(Color::Rgb(62, 62, 62));
    const WHITE_TEXT: Style = Style::new().fg(Color::White);
    const BLACK_ON_WHITE: Style = Style::new().fg(Color::Black).bg(Color::White);
    let mut text = Vec::new();

    struct TextDialogInputLine {
        prefix: &'static str,
        placeholder: &'static str,
        value: String,
    }

    let placeholders = [
        ("Title:       ", "Todo title"),
        ("Description: ", "Todo description"),
        ("Priority:  < ", ""),
        ("Timeframe: < ", ""),
        ("Stake (ETH): ", "0.01"),
    ];
    let lines: Vec<TextDialogInputLine> = placeholders
        .iter()
        .enumerate()
        .take(dialog.last_line() + 1)
        .map(|(i, &(prefix, placeholder))| TextDialogInputLine {
            prefix,
            placeholder,
            value: dialog.content_of_string_at_y_pos(i),
        })
        .collect();

    let (cursor_x, cursor_y) = dialog.cursor_position;

    for (i, line) in lines.iter().enumerate() {
        let mut spans = vec![Span::styled(line.prefix, WHITE_TEXT)];

        if TodoEditDialogState::is_choice_line(i) {
            // Choice lines show the current option, highlighted when selected
            let style = if cursor_y == i { BLACK_ON_WHITE } else { WHITE_TEXT };
            spans.push(Span::styled(line.value.clone(), style));
            spans.push(Span::styled(" >", WHITE_TEXT));
        } else if line.value.is_empty() {
            if cursor_y == i {
                // Line is selected. First char is highlighted, the rest is gray
                spans.push(Span::styled(
                    line.placeholder.chars().take(1).collect::<String>(),
                    BLACK_ON_WHITE,
                ));
                spans.push(Span::styled(
                    line.placeholder.chars().skip(1).collect::<String>(),
                    GRAY_TEXT,
                ));
            } else {
                spans.push(Span::styled(line.placeholder, GRAY_TEXT));
            }
        } else if cursor_y == i {
            // The char under the cursor is highlighted
            spans.push(Span::styled(
                line.value.chars().take(cursor_x).collect::<String>(),
                WHITE_TEXT,
            ));
            spans.push(Span::styled(
                line.value.chars().skip(cursor_x).take(1).collect::<String>(),
                BLACK_ON_WHITE,
            ));
            spans.push(Span::styled(
                line.value.chars().skip(cursor_x + 1).collect::<String>(),
                WHITE_TEXT,
            ));

            if cursor_x == line.value.chars().count() {
                spans.push(Span::styled(" ", BLACK_ON_WHITE));
            }
        } else {
            spans.push(Span::styled(line.value.clone(), WHITE_TEXT));
        }

        text.push(Line::from(spans));
    }

    text.push(Line::raw(""));

    if let Some(ref error_message) = dialog.error_message {
        text.push(Line::from(vec![Span::styled(
            error_message.clone(),
            Style::new().fg(Color::Red),
        )]));
        text.push(Line::raw(""));
    }

    text.push(Line::from(vec![Span::styled(
        "Enter - save, Esc - cancel, </> - change option",
        WHITE_TEXT,
    )]));

    return text;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn type_text(dialog: &mut TodoEditDialogState, text: &str) {
        for c in text.chars() {
            dialog.input(c);
        }
    }

    #[test]
    fn test_new_todo_defaults() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();

        assert!(dialog.dialog_active);
        assert_eq!(dialog.content.priority, Priority::Medium);
        assert_eq!(dialog.content.timeframe, Timeframe::Day);
        assert_eq!(dialog.content.stake, "0");
    }

    #[test]
    fn test_create_submission() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        type_text(&mut dialog, "Buy milk");
        dialog.move_cursor_down();
        dialog.move_cursor_down();
        dialog.input('l');
        dialog.move_cursor_down();
        dialog.input('h');
        dialog.move_cursor_down();
        dialog.move_cursor_right();
        dialog.delete_char();
        type_text(&mut dialog, "0.01");

        assert_eq!(
            dialog.submit(),
            Some(DialogOutcome::Create(TodoDraft {
                title: "Buy milk".into(),
                description: String::new(),
                priority: Priority::Low,
                timeframe: Timeframe::Hour,
                stake_amount: 0.01,
            }))
        );
        assert!(!dialog.dialog_active);
    }

    #[test]
    fn test_submission_blocked_without_title_or_stake() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        type_text(&mut dialog, "   ");
        assert_eq!(dialog.submit(), None);
        assert_eq!(dialog.error_message.as_deref(), Some("Title cannot be empty"));

        type_text(&mut dialog, "x");
        assert_eq!(dialog.submit(), None);
        assert_eq!(
            dialog.error_message.as_deref(),
            Some("Stake must be greater than 0")
        );
        assert!(dialog.dialog_active);
    }

    #[test]
    fn test_stake_accepts_only_numbers() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        for _ in 0..4 {
            dialog.move_cursor_down();
        }
        dialog.move_cursor_right();
        type_text(&mut dialog, "a.5.x");
        assert_eq!(dialog.content.stake, "0.5");
    }

    #[test]
    fn test_overflowing_stake_is_rejected() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        type_text(&mut dialog, "Whale");
        for _ in 0..4 {
            dialog.move_cursor_down();
        }
        dialog.move_cursor_right();
        type_text(&mut dialog, &"9".repeat(400));

        assert_eq!(dialog.submit(), None);
        assert_eq!(dialog.error_message.as_deref(), Some("Stake is too large"));
        assert!(dialog.dialog_active);
    }

    #[test]
    fn test_edit_keeps_other_fields() {
        let todo = Todo::create(
            TodoDraft {
                title: "Old".into(),
                description: "desc".into(),
                priority: Priority::Low,
                timeframe: Timeframe::Week,
                stake_amount: 2.0,
            },
            Utc::now(),
        );
        let mut dialog = TodoEditDialogState::default();
        dialog.edit_todo(&todo);
        type_text(&mut dialog, "er");
        for _ in 0..5 {
            dialog.move_cursor_down();
        }
        assert_eq!(dialog.cursor_position.1, PRIORITY);
        dialog.move_cursor_right();

        let expected = Todo {
            title: "Older".into(),
            priority: Priority::Medium,
            ..todo.clone()
        };
        assert_eq!(dialog.submit(), Some(DialogOutcome::Update(expected)));
    }

    #[test]
    fn test_multibyte_input_and_delete() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        type_text(&mut dialog, "café");
        dialog.move_cursor_left();
        dialog.input('!');
        assert_eq!(dialog.content.title, "caf!é");

        dialog.move_cursor_right();
        dialog.delete_char();
        assert_eq!(dialog.content.title, "caf!");
    }

    #[test]
    fn test_choice_lines_cycle() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        dialog.move_cursor_down();
        dialog.move_cursor_down();
        dialog.move_cursor_down();
        dialog.move_cursor_left();
        dialog.move_cursor_left();
        assert_eq!(dialog.content.timeframe, Timeframe::Month);
    }

    #[test]
    fn test_edit_ui_shows_error() {
        let mut dialog = TodoEditDialogState::default();
        dialog.create_a_new_todo();
        dialog.submit();
        let lines = get_todo_edit_ui(&dialog);
        assert!(lines
            .iter()
            .any(|line| line.spans.iter().any(|span| span.content == "Title cannot be empty")));
    }
}

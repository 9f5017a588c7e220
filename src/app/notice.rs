// Fire-and-forget messages shown in the notifications box
use chrono::{DateTime, Local};
use std::collections::VecDeque;

use crate::app::deadline::DeadlineMissed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Local>,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Notice {
        Notice {
            level,
            message: message.into(),
            at: Local::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Notice {
        Notice::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Notice {
        Notice::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Notice {
        Notice::new(NoticeLevel::Error, message)
    }

    pub fn deadline_missed(missed: &DeadlineMissed) -> Notice {
        Notice::error(format!(
            "You missed the deadline for \"{}\" and lost {} ETH!",
            missed.title, missed.stake_amount
        ))
    }
}

// Keeps the most recent notices, newest first
pub struct NoticeFeed {
    entries: VecDeque<Notice>,
    capacity: usize,
}

impl NoticeFeed {
    pub fn with_capacity(capacity: usize) -> NoticeFeed {
        NoticeFeed {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, notice: Notice) {
        self.entries.push_front(notice);
        self.entries.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_keeps_newest() {
        let mut feed = NoticeFeed::with_capacity(2);
        feed.push(Notice::info("one"));
        feed.push(Notice::success("two"));
        feed.push(Notice::error("three"));

        let messages: Vec<&str> = feed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["three", "two"]);
        assert_eq!(feed.iter().next().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_deadline_message() {
        let notice = Notice::deadline_missed(&DeadlineMissed {
            id: "1".into(),
            title: "Ship it".into(),
            stake_amount: 0.5,
        });
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(
            notice.message,
            "You missed the deadline for \"Ship it\" and lost 0.5 ETH!"
        );
    }
}

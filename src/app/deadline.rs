//! Periodic scan for missed deadlines.
//!
//! The monitor only observes: it reads the latest snapshot published by the
//! todo list and reports overdue entries, it never touches a todo itself.

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::models::Todo;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// One open todo whose deadline has passed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineMissed {
    pub id: String,
    pub title: String,
    pub stake_amount: f64,
}

/// Every open todo with a deadline before `now`, in list order.
pub fn scan(todos: &[Todo], now: DateTime<Utc>) -> Vec<DeadlineMissed> {
    todos
        .iter()
        .filter(|todo| todo.is_overdue(now))
        .map(|todo| DeadlineMissed {
            id: todo.id.clone(),
            title: todo.title.clone(),
            stake_amount: todo.stake_amount,
        })
        .collect()
}

pub struct DeadlineMonitor {
    period: Duration,
    notify_once: bool,
}

impl Default for DeadlineMonitor {
    fn default() -> Self {
        DeadlineMonitor::new(DEFAULT_PERIOD)
    }
}

impl DeadlineMonitor {
    pub fn new(period: Duration) -> DeadlineMonitor {
        DeadlineMonitor {
            period,
            notify_once: false,
        }
    }

    /// Report each todo at most once per session instead of on every tick.
    pub fn notify_once(mut self, notify_once: bool) -> DeadlineMonitor {
        self.notify_once = notify_once;
        self
    }

    /// Start ticking. The first scan happens one full period after spawning.
    pub fn spawn(
        self,
        snapshot: watch::Receiver<Vec<Todo>>,
        missed: mpsc::UnboundedSender<DeadlineMissed>,
    ) -> MonitorHandle {
        info!(
            "Deadline monitor started, every {}s",
            self.period.as_secs_f32()
        );
        let task = tokio::spawn(self.run(snapshot, missed));
        MonitorHandle { task }
    }

    async fn run(
        self,
        snapshot: watch::Receiver<Vec<Todo>>,
        missed: mpsc::UnboundedSender<DeadlineMissed>,
    ) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut reported: HashSet<String> = HashSet::new();
        loop {
            ticker.tick().await;
            let overdue = scan(&snapshot.borrow(), Utc::now());
            debug!("Deadline scan found {} overdue todos", overdue.len());

            for event in overdue {
                if self.notify_once && !reported.insert(event.id.clone()) {
                    continue;
                }
                if missed.send(event).is_err() {
                    // Nobody is listening anymore
                    return;
                }
            }
        }
    }
}

/// Owns the running monitor task. Dropping the handle stops the monitor.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(self) {
        info!("Deadline monitor stopped");
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{Priority, Timeframe, TodoDraft};
    use chrono::Duration as ChronoDuration;

    fn todo(title: &str, deadline_offset: ChronoDuration, completed: bool) -> Todo {
        let created = Utc::now() - ChronoDuration::hours(1000);
        let mut todo = Todo::create(
            TodoDraft {
                title: title.into(),
                description: String::new(),
                priority: Priority::Medium,
                timeframe: Timeframe::Hour,
                stake_amount: 0.2,
            },
            created,
        );
        todo.deadline = Utc::now() + deadline_offset;
        todo.completed = completed;
        todo
    }

    #[test]
    fn test_scan_reports_only_open_overdue() {
        let todos = vec![
            todo("late", ChronoDuration::minutes(-5), false),
            todo("late but done", ChronoDuration::minutes(-5), true),
            todo("future", ChronoDuration::hours(1), false),
        ];
        let missed = scan(&todos, Utc::now());

        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].id, todos[0].id);
        assert_eq!(missed[0].title, "late");
        assert_eq!(missed[0].stake_amount, 0.2);
    }

    #[test]
    fn test_scan_does_not_mutate() {
        let todos = vec![todo("late", ChronoDuration::minutes(-5), false)];
        let before = todos.clone();
        scan(&todos, Utc::now());
        assert_eq!(todos, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_repeats_every_tick() {
        let overdue = todo("late", ChronoDuration::minutes(-5), false);
        let (_snapshot_tx, snapshot_rx) = watch::channel(vec![overdue.clone()]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = DeadlineMonitor::new(DEFAULT_PERIOD).spawn(snapshot_rx, tx);
        assert_eq!(rx.recv().await.unwrap().id, overdue.id);
        assert_eq!(rx.recv().await.unwrap().id, overdue.id);
        handle.stop();

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_notify_once() {
        let first = todo("first", ChronoDuration::minutes(-5), false);
        let (snapshot_tx, snapshot_rx) = watch::channel(vec![first.clone()]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _handle = DeadlineMonitor::new(DEFAULT_PERIOD)
            .notify_once(true)
            .spawn(snapshot_rx, tx);
        assert_eq!(rx.recv().await.unwrap().id, first.id);

        // Only the newly overdue todo is reported on later ticks
        let second = todo("second", ChronoDuration::minutes(-1), false);
        snapshot_tx.send_replace(vec![first, second.clone()]);
        assert_eq!(rx.recv().await.unwrap().id, second.id);

        tokio::time::sleep(DEFAULT_PERIOD * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_picks_up_completion() {
        let late = todo("late", ChronoDuration::minutes(-5), false);
        let (snapshot_tx, snapshot_rx) = watch::channel(vec![late.clone()]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _handle = DeadlineMonitor::default().spawn(snapshot_rx, tx);
        assert_eq!(rx.recv().await.unwrap().id, late.id);

        let mut done = late;
        done.completed = true;
        snapshot_tx.send_replace(vec![done]);

        tokio::time::sleep(DEFAULT_PERIOD * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_monitor() {
        let (_snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = DeadlineMonitor::default().spawn(snapshot_rx, tx);
        drop(handle);

        assert!(rx.recv().await.is_none());
    }
}

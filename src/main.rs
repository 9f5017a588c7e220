use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::prelude::*;
use std::{error::Error, fs::File, io, sync::Arc, time::Duration};
use tokio::sync::mpsc;

mod app;

use app::backend::LocalBackend;
use app::config::Config;
use app::deadline::DeadlineMonitor;
use app::ledger::Ledger;
use app::simulated_ledger::{SimulatedLedger, Wallet};
use app::storage::{Storage, TODOS_KEY};
use app::todo_list::TodoList;

// Logs go to a file, the terminal is taken by the UI
fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let file = File::create(&config.log_file)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

// Start the app on a single thread; every todo operation runs on it
#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    init_logging(&config)?;

    // Demo mode until a wallet gets connected
    let storage = Storage::open(&config.db)?;
    let backend = LocalBackend::new(storage, TODOS_KEY, config.load_seed()?);
    let todos = TodoList::open(Box::new(backend)).await?;

    let ledger: Option<Arc<dyn Ledger>> = match config.wallet() {
        Wallet::Missing => None,
        wallet => Some(Arc::new(
            SimulatedLedger::new(wallet).with_block_time(config.block_time()),
        )),
    };

    let (missed_tx, missed_rx) = mpsc::unbounded_channel();
    let monitor = DeadlineMonitor::new(config.deadline_interval())
        .notify_once(config.notify_once)
        .spawn(todos.subscribe(), missed_tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Redraw at least every 250 ms so deadline colours stay current
    let tick_rate = Duration::from_millis(250);
    let app = app::ui::App::new(todos, ledger);
    let res = app::ui::run_app(&mut terminal, app, missed_rx, tick_rate).await;

    monitor.stop();

    // Restore previous terminal state after exit
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("UI loop failed: {err}");
        println!("{err:?}");
    }
    info!("Session ended");

    Ok(())
}

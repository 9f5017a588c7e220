pub mod backend;
pub mod config;
pub mod deadline;
pub mod error;
pub mod ledger;
pub mod models;
pub mod notice;
pub mod simulated_ledger;
pub mod storage;
pub mod todo_edit;
pub mod todo_list;
pub mod ui;

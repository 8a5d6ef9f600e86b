//! Unified error type for the ledger.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Budget not found: {name}")]
    BudgetNotFound { name: String },

    #[error("Fund not found: {name}")]
    FundNotFound { name: String },

    #[error("Expense not found: {id}")]
    ExpenseNotFound { id: i64 },

    #[error("Name cannot be empty")]
    InvalidName,

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid slot size: {minutes} minutes")]
    InvalidSlotSize { minutes: i64 },

    #[error("Slot index {index} is outside the day")]
    InvalidSlotIndex { index: i32 },

    #[error("Invalid sub-budget link: {message}")]
    InvalidLink { message: String },

    #[error("Index {index} out of range for {len} items")]
    InvalidPosition { index: usize, len: usize },

    #[error("Navigation stack is empty")]
    EmptyNavigation,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

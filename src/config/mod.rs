/// Database connection management and table creation
pub mod database;

/// Ledger settings and seed budgets loaded from config.toml
pub mod ledger;

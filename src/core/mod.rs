//! Core ledger logic, independent of any user interface.

/// Balance engine: spend, earn, reset, interest and recharge rules
pub mod balance;
/// Budget store
pub mod budget;
/// Ledger events and the publish/subscribe bus
pub mod events;
/// Expense recorder
pub mod expense;
/// Fund store
pub mod fund;
/// Navigation stack and cumulative ratios
pub mod navigation;
/// Contiguous ordering helpers
pub mod ordering;
/// Seeding from config.toml
pub mod seed;
/// Persistent settings
pub mod settings;
/// Time slot indexer
pub mod time_slot;

//! Database configuration module for the time ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! Creation is idempotent, which lets the binary call it on every start.

use crate::entities::{Budget, Expense, Fund, SystemState};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::{env::VarError, path::Path};
use tracing::debug;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/time_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if it is not set.
///
/// # Errors
/// Returns `Error::EnvVar` if `DATABASE_URL` is set but not valid unicode.
pub fn get_database_url() -> Result<String> {
    database_url_from(std::env::var("DATABASE_URL"))
}

fn database_url_from(var: std::result::Result<String, VarError>) -> Result<String> {
    match var {
        Ok(url) => Ok(url),
        Err(VarError::NotPresent) => Ok(DEFAULT_DATABASE_URL.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Directory holding the database file of a `sqlite://` URL, if it names one.
fn sqlite_file_dir(database_url: &str) -> Option<&Path> {
    let file = database_url.strip_prefix("sqlite://")?;
    let file = file.split('?').next().unwrap_or(file);
    Path::new(file)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Establishes a connection to the database named by `get_database_url`.
///
/// For a file-backed `SQLite` URL the parent directory is created first.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url()?;
    if let Some(parent) = sqlite_file_dir(&database_url) {
        std::fs::create_dir_all(parent)?;
    }
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all ledger tables if they do not exist yet.
///
/// Budgets are created before funds, and funds before expenses, so the
/// foreign keys generated from the entity relations always have a target.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut budget_table = schema.create_table_from_entity(Budget);
    let mut fund_table = schema.create_table_from_entity(Fund);
    let mut expense_table = schema.create_table_from_entity(Expense);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    budget_table.if_not_exists();
    fund_table.if_not_exists();
    expense_table.if_not_exists();
    system_state_table.if_not_exists();

    db.execute(builder.build(&budget_table)).await?;
    db.execute(builder.build(&fund_table)).await?;
    db.execute(builder.build(&expense_table)).await?;
    db.execute(builder.build(&system_state_table)).await?;

    Ok(())
}

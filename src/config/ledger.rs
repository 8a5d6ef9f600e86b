//! Ledger configuration loading from config.toml
//!
//! This module loads the slot size and the initial budget tree from a TOML
//! file. The budgets defined there are used to seed an empty store on first
//! run; an existing store is never touched.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Default length of one time slot, in minutes
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

fn default_slot_minutes() -> i64 {
    DEFAULT_SLOT_MINUTES
}

const fn default_recharge() -> f64 {
    1.0
}

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Length of one time slot in minutes
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
    /// Budgets to seed into an empty store, in display order
    #[serde(default)]
    pub budgets: Vec<BudgetConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            budgets: Vec::new(),
        }
    }
}

/// Configuration for a single budget
#[derive(Debug, Deserialize, Clone)]
pub struct BudgetConfig {
    /// Name of the budget
    pub name: String,
    /// Funds owned by this budget, in display order
    #[serde(default)]
    pub funds: Vec<FundConfig>,
}

/// Configuration for a single fund
#[derive(Debug, Deserialize, Clone)]
pub struct FundConfig {
    /// Name of the fund
    pub name: String,
    /// Amount added per recharge round
    #[serde(default = "default_recharge")]
    pub recharge: f64,
    /// Whether the fund starts frozen
    #[serde(default)]
    pub frozen: bool,
    /// Name of the budget this fund drills into, if any
    #[serde(default)]
    pub sub_budget: Option<String>,
}

/// Loads ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `./config.toml`, falling back to defaults when
/// the file does not exist.
pub fn load_default_config() -> Result<LedgerConfig> {
    let path = Path::new("config.toml");
    if !path.exists() {
        info!("No config.toml found, using default ledger settings");
        return Ok(LedgerConfig::default());
    }
    load_config(path)
}

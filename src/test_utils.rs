//! Shared test utilities for the time ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{budget, fund, navigation::NavigationStack},
    entities,
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a top-level test budget.
pub async fn create_test_budget(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::budget::Model> {
    budget::create_budget(db, name).await
}

/// Creates a test fund at the end of its budget.
///
/// # Defaults
/// * `balance`: 1.0
/// * `recharge`: 1.0
/// * `frozen`: false
pub async fn create_test_fund(
    db: &DatabaseConnection,
    budget_id: i64,
    name: &str,
) -> Result<entities::fund::Model> {
    fund::create_fund(db, budget_id, name, None).await
}

/// Creates a test fund with custom balance parameters.
pub async fn create_custom_fund(
    db: &DatabaseConnection,
    budget_id: i64,
    name: &str,
    balance: f64,
    recharge: f64,
    frozen: bool,
) -> Result<entities::fund::Model> {
    let created = fund::create_fund(db, budget_id, name, None).await?;
    let mut active_model: entities::fund::ActiveModel = created.into();
    active_model.balance = Set(balance);
    active_model.recharge = Set(recharge);
    active_model.frozen = Set(frozen);
    active_model.update(db).await.map_err(Into::into)
}

/// Inserts an expense row directly, without touching any balance.
///
/// The row has no ancestor ids, like rows written before ids were tracked.
pub async fn create_test_expense(
    db: &DatabaseConnection,
    fund_id: i64,
    path: &str,
) -> Result<entities::expense::Model> {
    entities::expense::ActiveModel {
        fund_id: Set(Some(fund_id)),
        path: Set(path.to_string()),
        ancestor_ids: Set(None),
        when: Set(test_day().and_hms_opt(0, 0, 0).unwrap_or_default()),
        time_slot: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// A fixed day used by expense tests.
#[must_use]
pub fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 11).unwrap_or_default()
}

/// A two-level hierarchy with every balance at 1.0:
///
/// ```text
/// Day:  Work -> Work, Rest
/// Work: Email, Code
/// ```
pub struct TestTree {
    /// Top-level budget "Day"
    pub root: entities::budget::Model,
    /// "Work" fund in "Day", linked to the sub-budget
    pub root_fund: entities::fund::Model,
    /// "Rest" fund in "Day"
    pub root_sibling: entities::fund::Model,
    /// Sub-budget "Work"
    pub sub: entities::budget::Model,
    /// "Email" fund in "Work"
    pub leaf: entities::fund::Model,
    /// "Code" fund in "Work"
    pub leaf_sibling: entities::fund::Model,
}

impl TestTree {
    /// Navigation positioned inside the sub-budget.
    #[must_use]
    pub fn navigation(&self) -> NavigationStack {
        let mut navigation = NavigationStack::new();
        navigation.push_budget(self.root.clone());
        navigation.push_fund(
            self.root_fund.clone(),
            &[self.root_fund.clone(), self.root_sibling.clone()],
        );
        navigation.push_budget(self.sub.clone());
        navigation
    }
}

/// Builds the `TestTree` hierarchy.
pub async fn create_test_tree(db: &DatabaseConnection) -> Result<TestTree> {
    let root = create_test_budget(db, "Day").await?;
    let root_fund = create_test_fund(db, root.id, "Work").await?;
    let root_sibling = create_test_fund(db, root.id, "Rest").await?;
    let (root_fund, sub) = fund::promote_to_sub_budget(db, root_fund.id).await?;
    let leaf = create_test_fund(db, sub.id, "Email").await?;
    let leaf_sibling = create_test_fund(db, sub.id, "Code").await?;

    Ok(TestTree {
        root,
        root_fund,
        root_sibling,
        sub,
        leaf,
        leaf_sibling,
    })
}

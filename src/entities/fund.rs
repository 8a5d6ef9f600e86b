//! Fund entity - A time-balance account inside a budget.
//!
//! A fund may point one level down the hierarchy through `sub_budget_id`.
//! The reverse direction (a budget's super funds) is answered by querying
//! this column, so both sides stay consistent by construction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fund database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "funds")]
pub struct Model {
    /// Unique identifier for the fund
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning budget
    pub budget_id: i64,
    /// Display name (e.g., "Reading", "Exercise")
    pub name: String,
    /// Sort key within the owning budget
    pub sort_order: i32,
    /// Remaining time units; negative means debt
    pub balance: f64,
    /// Frozen funds never change balance and count as unlimited
    pub frozen: bool,
    /// Amount added on every recharge round
    pub recharge: f64,
    /// Budget one level down the hierarchy, if any
    pub sub_budget_id: Option<i64>,
}

/// Defines relationships between Fund and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each fund belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        fk_name = "fk-funds-budget_id"
    )]
    Budget,
    /// Optional link down to a sub-budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::SubBudgetId",
        to = "super::budget::Column::Id",
        fk_name = "fk-funds-sub_budget_id"
    )]
    SubBudget,
    /// One fund has many expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Expense entity - One spent time slot.
//!
//! `path` keeps the human-readable chain of budget and fund names from the
//! root down to the spent fund, newline-delimited. `ancestor_ids` keeps the
//! same chain as stable fund ids; rows written before ids were tracked have
//! it unset and are resolved by name instead.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The fund that was spent; cleared if that fund is deleted
    pub fund_id: Option<i64>,
    /// Newline-delimited `budget, fund, ..., leaf` names, root first
    pub path: String,
    /// Comma-separated ancestor fund ids, root first
    pub ancestor_ids: Option<String>,
    /// Start of the local day the expense belongs to
    pub when: DateTime,
    /// Index of the slot within that day
    pub time_slot: i32,
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense was spent against one fund
    #[sea_orm(
        belongs_to = "super::fund::Entity",
        from = "Column::FundId",
        to = "super::fund::Column::Id"
    )]
    Fund,
}

impl Related<super::fund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fund.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Budget entity - A named container of funds.
//!
//! A budget is top-level when no fund links to it as a sub-budget, and a
//! sub-budget otherwise. That classification is derived from the `funds`
//! table and never stored here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, also used for lookups by name
    pub name: String,
    /// Display and iteration order (not necessarily unique)
    pub sort_order: i32,
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One budget owns many funds
    #[sea_orm(has_many = "super::fund::Entity")]
    Funds,
}

impl Related<super::fund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Budget store - Creating, finding, ordering and deleting budgets.
//!
//! Whether a budget is top-level or a sub-budget is decided by looking at the
//! funds that link to it; nothing about that is stored on the budget row.

use crate::{
    core::{fund as fund_store, ordering},
    entities::{Budget, Fund, budget, fund},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info};

/// Finds a budget by its unique ID.
pub async fn get_budget_by_id<C>(db: &C, budget_id: i64) -> Result<Option<budget::Model>>
where
    C: ConnectionTrait,
{
    Budget::find_by_id(budget_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a budget by exact name. When several budgets share the name, the
/// oldest one wins.
pub async fn find_budget_by_name<C>(db: &C, name: &str) -> Result<Option<budget::Model>>
where
    C: ConnectionTrait,
{
    Budget::find()
        .filter(budget::Column::Name.eq(name))
        .order_by_asc(budget::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Ids of every budget that at least one fund links to.
async fn linked_budget_ids<C>(db: &C) -> Result<HashSet<i64>>
where
    C: ConnectionTrait,
{
    let linking = Fund::find()
        .filter(fund::Column::SubBudgetId.is_not_null())
        .all(db)
        .await?;
    Ok(linking.into_iter().filter_map(|f| f.sub_budget_id).collect())
}

/// Budgets no fund links to, in display order.
pub async fn list_top_level_budgets<C>(db: &C) -> Result<Vec<budget::Model>>
where
    C: ConnectionTrait,
{
    let linked = linked_budget_ids(db).await?;
    let budgets = Budget::find()
        .order_by_asc(budget::Column::SortOrder)
        .order_by_asc(budget::Column::Id)
        .all(db)
        .await?;
    Ok(budgets
        .into_iter()
        .filter(|b| !linked.contains(&b.id))
        .collect())
}

/// Budgets at least one fund links to, ordered by name.
pub async fn list_sub_budgets<C>(db: &C) -> Result<Vec<budget::Model>>
where
    C: ConnectionTrait,
{
    let linked = linked_budget_ids(db).await?;
    let budgets = Budget::find()
        .order_by_asc(budget::Column::Name)
        .order_by_asc(budget::Column::Id)
        .all(db)
        .await?;
    Ok(budgets
        .into_iter()
        .filter(|b| linked.contains(&b.id))
        .collect())
}

/// Funds in other budgets that link down into `budget_id`.
pub async fn super_funds<C>(db: &C, budget_id: i64) -> Result<Vec<fund::Model>>
where
    C: ConnectionTrait,
{
    Fund::find()
        .filter(fund::Column::SubBudgetId.eq(budget_id))
        .order_by_asc(fund::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a budget at the end of the top-level order.
///
/// The name is trimmed and must not be blank.
pub async fn create_budget<C>(db: &C, name: &str) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName);
    }

    let position = list_top_level_budgets(db).await?.len();
    let budget = budget::ActiveModel {
        name: Set(name.to_string()),
        sort_order: Set(i32::try_from(position).unwrap_or(i32::MAX)),
        ..Default::default()
    };

    let result = budget.insert(db).await?;
    debug!("Created budget {} ({})", result.name, result.id);
    Ok(result)
}

/// Renames a budget, leaving the old name in place if the new one is blank.
pub async fn rename_budget<C>(db: &C, budget_id: i64, name: &str) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName);
    }
    let budget = get_budget_by_id(db, budget_id)
        .await?
        .ok_or_else(|| Error::BudgetNotFound {
            name: budget_id.to_string(),
        })?;

    let mut active_model: budget::ActiveModel = budget.into();
    active_model.name = Set(name.to_string());
    active_model.update(db).await.map_err(Into::into)
}

/// Rewrites `sort_order` so the given budgets are numbered `0..N-1`.
async fn apply_order<C>(db: &C, budgets: &[budget::Model]) -> Result<()>
where
    C: ConnectionTrait,
{
    for (index, order) in ordering::renumber(budgets, |b| b.sort_order) {
        let mut active_model: budget::ActiveModel = budgets[index].clone().into();
        active_model.sort_order = Set(order);
        active_model.update(db).await?;
    }
    Ok(())
}

/// Deletes a budget together with the funds it owns.
///
/// Funds elsewhere that linked to it lose their sub-budget link, expenses
/// spent against the deleted funds are detached, and the remaining top-level
/// budgets are renumbered.
pub async fn delete_budget(db: &DatabaseConnection, budget_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let budget = get_budget_by_id(&txn, budget_id)
        .await?
        .ok_or_else(|| Error::BudgetNotFound {
            name: budget_id.to_string(),
        })?;

    let owned = Fund::find()
        .filter(fund::Column::BudgetId.eq(budget_id))
        .all(&txn)
        .await?;
    let owned_count = owned.len();
    for fund in owned {
        fund_store::delete_fund_row(&txn, fund).await?;
    }

    for super_fund in super_funds(&txn, budget_id).await? {
        let mut active_model: fund::ActiveModel = super_fund.into();
        active_model.sub_budget_id = Set(None);
        active_model.update(&txn).await?;
    }

    let name = budget.name.clone();
    budget.delete(&txn).await?;

    let remaining = list_top_level_budgets(&txn).await?;
    apply_order(&txn, &remaining).await?;

    txn.commit().await?;
    info!("Deleted budget {} and {} fund(s)", name, owned_count);
    Ok(())
}

/// Moves a top-level budget from index `from` to index `to` and renumbers
/// the top-level list. Returns the list in its new order.
pub async fn move_budget(
    db: &DatabaseConnection,
    from: usize,
    to: usize,
) -> Result<Vec<budget::Model>> {
    let txn = db.begin().await?;

    let mut budgets = list_top_level_budgets(&txn).await?;
    ordering::move_item(&mut budgets, from, to)?;
    apply_order(&txn, &budgets).await?;
    let budgets = list_top_level_budgets(&txn).await?;

    txn.commit().await?;
    Ok(budgets)
}

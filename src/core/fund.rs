//! Fund store - Creating, listing, ordering and linking funds.
//!
//! Funds are always kept numbered `0..N-1` within their budget. Linking a fund
//! to a sub-budget is the only way the hierarchy grows, so every link is
//! checked against cycles before it is written.

use crate::{
    core::{balance::DEFAULT_BALANCE, balance::DEFAULT_RECHARGE, budget as budget_store, ordering},
    entities::{Budget, Expense, Fund, budget, expense, fund},
    errors::{Error, Result},
};
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait, prelude::*};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// Which funds of a budget to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundFilter {
    /// Every fund
    All,
    /// Funds with a positive balance
    Available,
    /// Funds at or below zero
    Spent,
}

/// Funds of `budget_id` in display order, narrowed by `filter`.
pub async fn list_funds<C>(db: &C, budget_id: i64, filter: FundFilter) -> Result<Vec<fund::Model>>
where
    C: ConnectionTrait,
{
    let query = Fund::find().filter(fund::Column::BudgetId.eq(budget_id));
    let query = match filter {
        FundFilter::All => query,
        FundFilter::Available => query.filter(fund::Column::Balance.gt(0.0)),
        FundFilter::Spent => query.filter(fund::Column::Balance.lte(0.0)),
    };
    query
        .order_by_asc(fund::Column::SortOrder)
        .order_by_asc(fund::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a fund by its unique ID.
pub async fn get_fund_by_id<C>(db: &C, fund_id: i64) -> Result<Option<fund::Model>>
where
    C: ConnectionTrait,
{
    Fund::find_by_id(fund_id).one(db).await.map_err(Into::into)
}

/// Finds the fund named `fund_name` in a budget named `budget_name`.
///
/// Both names must match exactly. The oldest match wins.
pub async fn find_fund<C>(db: &C, budget_name: &str, fund_name: &str) -> Result<Option<fund::Model>>
where
    C: ConnectionTrait,
{
    Fund::find()
        .join(JoinType::InnerJoin, fund::Relation::Budget.def())
        .filter(budget::Column::Name.eq(budget_name))
        .filter(fund::Column::Name.eq(fund_name))
        .order_by_asc(fund::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Rewrites `sort_order` so the given funds are numbered `0..N-1`.
async fn apply_order<C>(db: &C, funds: &[fund::Model]) -> Result<()>
where
    C: ConnectionTrait,
{
    for (index, order) in ordering::renumber(funds, |f| f.sort_order) {
        let mut active_model: fund::ActiveModel = funds[index].clone().into();
        active_model.sort_order = Set(order);
        active_model.update(db).await?;
    }
    Ok(())
}

/// Creates a fund in `budget_id` at `position` (the end when `None` or past
/// the end), fully funded with the default recharge.
pub async fn create_fund(
    db: &DatabaseConnection,
    budget_id: i64,
    name: &str,
    position: Option<usize>,
) -> Result<fund::Model> {
    let txn = db.begin().await?;
    let fund = insert_fund(&txn, budget_id, name, position).await?;
    txn.commit().await?;
    Ok(fund)
}

/// Inserts a fund and renumbers its siblings on the caller's connection.
pub(crate) async fn insert_fund<C>(
    db: &C,
    budget_id: i64,
    name: &str,
    position: Option<usize>,
) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName);
    }
    budget_store::get_budget_by_id(db, budget_id)
        .await?
        .ok_or_else(|| Error::BudgetNotFound {
            name: budget_id.to_string(),
        })?;

    let mut siblings = list_funds(db, budget_id, FundFilter::All).await?;
    let index = ordering::insertion_index(position, siblings.len());

    let fund = fund::ActiveModel {
        budget_id: Set(budget_id),
        name: Set(name.to_string()),
        sort_order: Set(i32::try_from(index).unwrap_or(i32::MAX)),
        balance: Set(DEFAULT_BALANCE),
        frozen: Set(false),
        recharge: Set(DEFAULT_RECHARGE),
        sub_budget_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    siblings.insert(index, fund.clone());
    apply_order(db, &siblings).await?;
    debug!("Created fund {} in budget {} at {}", fund.name, budget_id, index);
    Ok(fund)
}

/// Renames a fund, leaving the old name in place if the new one is blank.
pub async fn rename_fund<C>(db: &C, fund_id: i64, name: &str) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName);
    }
    let fund = get_fund_by_id(db, fund_id)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })?;

    let mut active_model: fund::ActiveModel = fund.into();
    active_model.name = Set(name.to_string());
    active_model.update(db).await.map_err(Into::into)
}

/// Detaches the fund's expenses and deletes the fund row.
///
/// Siblings are not renumbered; callers do that once they are done.
pub(crate) async fn delete_fund_row<C>(db: &C, fund: fund::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let expenses = Expense::find()
        .filter(expense::Column::FundId.eq(fund.id))
        .all(db)
        .await?;
    for spent in expenses {
        let mut active_model: expense::ActiveModel = spent.into();
        active_model.fund_id = Set(None);
        active_model.update(db).await?;
    }
    fund.delete(db).await?;
    Ok(())
}

/// Deletes a fund and renumbers the rest of its budget.
///
/// Expenses spent against it are kept but no longer point at any fund.
pub async fn delete_fund(db: &DatabaseConnection, fund_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let fund = get_fund_by_id(&txn, fund_id)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })?;
    let budget_id = fund.budget_id;
    let name = fund.name.clone();
    delete_fund_row(&txn, fund).await?;

    let remaining = list_funds(&txn, budget_id, FundFilter::All).await?;
    apply_order(&txn, &remaining).await?;

    txn.commit().await?;
    info!("Deleted fund {} from budget {}", name, budget_id);
    Ok(())
}

/// Moves the fund at index `from` of a budget to index `to` and renumbers.
/// Returns the budget's funds in their new order.
pub async fn move_fund(
    db: &DatabaseConnection,
    budget_id: i64,
    from: usize,
    to: usize,
) -> Result<Vec<fund::Model>> {
    let txn = db.begin().await?;

    let mut funds = list_funds(&txn, budget_id, FundFilter::All).await?;
    ordering::move_item(&mut funds, from, to)?;
    apply_order(&txn, &funds).await?;
    let funds = list_funds(&txn, budget_id, FundFilter::All).await?;

    txn.commit().await?;
    Ok(funds)
}

/// Whether `start` reaches `target` by following sub-budget links downward.
async fn reaches_budget<C>(db: &C, start: i64, target: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut queue = VecDeque::from([start]);
    let mut seen = HashSet::from([start]);
    while let Some(current) = queue.pop_front() {
        if current == target {
            return Ok(true);
        }
        let children = Fund::find()
            .filter(fund::Column::BudgetId.eq(current))
            .filter(fund::Column::SubBudgetId.is_not_null())
            .all(db)
            .await?;
        for child in children.into_iter().filter_map(|f| f.sub_budget_id) {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    Ok(false)
}

/// Points a fund at `budget_id` as its sub-budget.
///
/// # Errors
/// Returns `Error::InvalidLink` when the link would make the hierarchy loop,
/// including linking a fund to its own budget.
pub async fn link_sub_budget<C>(db: &C, fund_id: i64, budget_id: i64) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    let fund = get_fund_by_id(db, fund_id)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })?;
    let target = budget_store::get_budget_by_id(db, budget_id)
        .await?
        .ok_or_else(|| Error::BudgetNotFound {
            name: budget_id.to_string(),
        })?;

    if reaches_budget(db, target.id, fund.budget_id).await? {
        return Err(Error::InvalidLink {
            message: format!(
                "budget {} already contains fund {} above it",
                target.name, fund.name
            ),
        });
    }

    let mut active_model: fund::ActiveModel = fund.into();
    active_model.sub_budget_id = Set(Some(target.id));
    let fund = active_model.update(db).await?;
    debug!("Linked fund {} to sub-budget {}", fund.name, target.name);
    Ok(fund)
}

/// Removes a fund's sub-budget link. The budget itself is kept.
pub async fn unlink_sub_budget<C>(db: &C, fund_id: i64) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    let fund = get_fund_by_id(db, fund_id)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })?;
    let mut active_model: fund::ActiveModel = fund.into();
    active_model.sub_budget_id = Set(None);
    active_model.update(db).await.map_err(Into::into)
}

/// Gives a fund a sub-budget named like the fund.
///
/// An existing budget with that name is reused; otherwise a new one is
/// created. Returns the updated fund and its sub-budget.
pub async fn promote_to_sub_budget<C>(db: &C, fund_id: i64) -> Result<(fund::Model, budget::Model)>
where
    C: ConnectionTrait,
{
    let fund = get_fund_by_id(db, fund_id)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })?;

    let sub_budget = match budget_store::find_budget_by_name(db, &fund.name).await? {
        Some(existing) => existing,
        None => budget_store::create_budget(db, &fund.name).await?,
    };
    let fund = link_sub_budget(db, fund.id, sub_budget.id).await?;
    Ok((fund, sub_budget))
}

/// The budget a fund drills into, if it has one.
pub async fn sub_budget_of<C>(db: &C, fund: &fund::Model) -> Result<Option<budget::Model>>
where
    C: ConnectionTrait,
{
    match fund.sub_budget_id {
        Some(budget_id) => Budget::find_by_id(budget_id)
            .one(db)
            .await
            .map_err(Into::into),
        None => Ok(None),
    }
}

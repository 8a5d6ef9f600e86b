//! Balance engine - How fund balances move.
//!
//! The pure functions at the top of this module operate on loaded
//! `fund::Model` values and never touch the database. The async functions
//! below them load funds, apply the pure rules, and write the new balances
//! back through whatever connection or transaction the caller passes in.

use crate::{
    core::navigation::NavigationStack,
    entities::{Fund, fund},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, warn};

/// Balance of a freshly created or reset fund ("fully funded")
pub const DEFAULT_BALANCE: f64 = 1.0;
/// Recharge amount given to new funds
pub const DEFAULT_RECHARGE: f64 = 1.0;
/// Amount debited from every fund on the path by one spent slot
pub const SPEND_UNIT: f64 = 1.0;
/// Debits that leave the balance below this value accrue interest
pub const DEBT_INTEREST_THRESHOLD: f64 = -0.5;
/// Multiplier applied to the balance when debt interest accrues
pub const DEBT_INTEREST_RATE: f64 = 1.1;
/// Upper bound on recharge rounds, for funds whose recharge cannot lift them
pub const MAX_RECHARGE_ROUNDS: usize = 64;

/// Adds `amount` to the balance of a non-frozen fund.
///
/// A debit that leaves the balance below `DEBT_INTEREST_THRESHOLD` multiplies
/// the balance by `DEBT_INTEREST_RATE`, so every further debit made while in
/// debt compounds. Credits never accrue interest.
pub fn adjust_balance(fund: &mut fund::Model, amount: f64) {
    if fund.frozen {
        return;
    }
    fund.balance += amount;
    if fund.balance < DEBT_INTEREST_THRESHOLD && amount < 0.0 {
        fund.balance *= DEBT_INTEREST_RATE;
    }
}

/// Sets a non-frozen fund back to exactly `DEFAULT_BALANCE`.
pub fn reset_balance(fund: &mut fund::Model) {
    if fund.frozen {
        return;
    }
    fund.balance = DEFAULT_BALANCE;
}

/// Whole units shown for a balance, rounded toward positive infinity.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rounded_balance(fund: &fund::Model) -> i64 {
    fund.balance.ceil() as i64
}

/// Share of the owning budget represented by funds named like `fund`.
///
/// `siblings` is every fund of the owning budget, `fund` included. Returns 0
/// when the budget has no funds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn get_ratio(fund: &fund::Model, siblings: &[fund::Model]) -> f64 {
    if siblings.is_empty() {
        return 0.0;
    }
    let same_name = siblings.iter().filter(|s| s.name == fund.name).count();
    same_name as f64 / siblings.len() as f64
}

/// True when every non-frozen fund has less than one unit left.
///
/// A budget with no funds, or only frozen ones, is never spent.
#[must_use]
pub fn all_funds_spent(funds: &[fund::Model]) -> bool {
    let mut live = funds.iter().filter(|f| !f.frozen).peekable();
    live.peek().is_some() && live.all(|f| f.balance < 1.0)
}

/// Adds each fund's own recharge amount to its balance.
pub fn recharge_funds(funds: &mut [fund::Model]) {
    for fund in funds.iter_mut() {
        let amount = fund.recharge;
        adjust_balance(fund, amount);
    }
}

/// Recharges the funds for as long as they are all spent.
///
/// Returns the number of rounds performed. Stops after
/// `MAX_RECHARGE_ROUNDS` even if the funds are still spent, which only
/// happens when recharge amounts are zero or negative.
pub fn recharge_if_spent(funds: &mut [fund::Model]) -> usize {
    let mut rounds = 0;
    while all_funds_spent(funds) {
        if rounds == MAX_RECHARGE_ROUNDS {
            warn!(
                "Funds still spent after {} recharge rounds, giving up",
                MAX_RECHARGE_ROUNDS
            );
            break;
        }
        recharge_funds(funds);
        rounds += 1;
    }
    rounds
}

/// Loads a fund by id, failing with `FundNotFound` if it does not exist.
pub async fn load_fund<C>(db: &C, fund_id: i64) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    Fund::find_by_id(fund_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::FundNotFound {
            name: fund_id.to_string(),
        })
}

/// Writes the in-memory balance of `fund` back to the store.
pub async fn save_balance<C>(db: &C, fund: &fund::Model) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    let mut active_model: fund::ActiveModel = fund.clone().into();
    active_model.balance = Set(fund.balance);
    active_model.update(db).await.map_err(Into::into)
}

/// Loads a fund, applies `adjust_balance`, and persists the result.
pub async fn apply_adjustment<C>(db: &C, fund_id: i64, amount: f64) -> Result<fund::Model>
where
    C: ConnectionTrait,
{
    if !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    let mut fund = load_fund(db, fund_id).await?;
    if fund.frozen {
        debug!("Fund {} is frozen, ignoring adjustment {}", fund.name, amount);
        return Ok(fund);
    }
    adjust_balance(&mut fund, amount);
    save_balance(db, &fund).await
}

/// Runs `recharge_if_spent` over a budget's funds and persists the changes.
///
/// Returns the number of recharge rounds performed.
pub async fn recharge_budget_if_spent<C>(db: &C, budget_id: i64) -> Result<usize>
where
    C: ConnectionTrait,
{
    let before = Fund::find()
        .filter(fund::Column::BudgetId.eq(budget_id))
        .order_by_asc(fund::Column::SortOrder)
        .all(db)
        .await?;

    let mut funds = before.clone();
    let rounds = recharge_if_spent(&mut funds);
    if rounds == 0 {
        return Ok(0);
    }

    debug!("Recharged budget {} {} time(s)", budget_id, rounds);
    for (old, new) in before.iter().zip(&funds) {
        if old.balance.to_bits() != new.balance.to_bits() {
            save_balance(db, new).await?;
        }
    }
    Ok(rounds)
}

/// Debits a fund and every ancestor fund on the path above it.
///
/// `ancestor_ids` lists the funds that were entered to reach the leaf's
/// budget, root first. They are debited innermost first; frozen ancestors are
/// skipped entirely, and every other debited fund gets its owning budget
/// recharged if that debit left the budget fully spent.
pub async fn deep_spend_path<C>(db: &C, fund_id: i64, ancestor_ids: &[i64]) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut leaf = load_fund(db, fund_id).await?;
    adjust_balance(&mut leaf, -SPEND_UNIT);
    save_balance(db, &leaf).await?;
    recharge_budget_if_spent(db, leaf.budget_id).await?;

    for ancestor_id in ancestor_ids.iter().rev() {
        let mut ancestor = load_fund(db, *ancestor_id).await?;
        if ancestor.frozen {
            continue;
        }
        adjust_balance(&mut ancestor, -SPEND_UNIT);
        save_balance(db, &ancestor).await?;
        recharge_budget_if_spent(db, ancestor.budget_id).await?;
    }
    Ok(())
}

/// Debits `fund_id` and every fund on the navigation stack above it.
pub async fn deep_spend<C>(db: &C, fund_id: i64, navigation: &NavigationStack) -> Result<()>
where
    C: ConnectionTrait,
{
    deep_spend_path(db, fund_id, &navigation.fund_ids()).await
}

/// Spends one unit from a single fund, recharging its budget if needed.
///
/// This is the plain "spend" gesture; it does not touch ancestor funds.
pub async fn spend_fund(db: &DatabaseConnection, fund_id: i64) -> Result<fund::Model> {
    let txn = db.begin().await?;
    let fund = apply_adjustment(&txn, fund_id, -SPEND_UNIT).await?;
    recharge_budget_if_spent(&txn, fund.budget_id).await?;
    let fund = load_fund(&txn, fund_id).await?;
    txn.commit().await?;
    Ok(fund)
}

/// Credits one unit to a fund.
pub async fn earn_fund(db: &DatabaseConnection, fund_id: i64) -> Result<fund::Model> {
    apply_adjustment(db, fund_id, SPEND_UNIT).await
}

/// Resets a fund's balance to `DEFAULT_BALANCE` unless it is frozen.
pub async fn reset_fund(db: &DatabaseConnection, fund_id: i64) -> Result<fund::Model> {
    let mut fund = load_fund(db, fund_id).await?;
    if fund.frozen {
        return Ok(fund);
    }
    reset_balance(&mut fund);
    save_balance(db, &fund).await
}

/// Freezes or unfreezes a fund. The balance itself is left untouched.
pub async fn set_frozen(
    db: &DatabaseConnection,
    fund_id: i64,
    frozen: bool,
) -> Result<fund::Model> {
    let fund = load_fund(db, fund_id).await?;
    let mut active_model: fund::ActiveModel = fund.into();
    active_model.frozen = Set(frozen);
    active_model.update(db).await.map_err(Into::into)
}

/// Changes how much a fund gains per recharge round.
pub async fn set_recharge(
    db: &DatabaseConnection,
    fund_id: i64,
    amount: f64,
) -> Result<fund::Model> {
    if !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    let fund = load_fund(db, fund_id).await?;
    let mut active_model: fund::ActiveModel = fund.into();
    active_model.recharge = Set(amount);
    active_model.update(db).await.map_err(Into::into)
}

//! Expense recording - Spending and refunding time slots.
//!
//! Each `(day, slot)` cell is either empty or occupied by exactly one expense.
//! Recording debits the spent fund and every fund entered to reach it;
//! removing credits them back. The chain of funds is stored twice: as stable
//! fund ids, and as the newline-delimited name path
//!
//! ```text
//! Day
//! Work
//! Email
//! ```
//!
//! where every ancestor contributes its budget's name then its own name, and
//! the spent fund's name comes last. Rows without ids are resolved through
//! the name path, which breaks when a budget or fund is renamed or deleted.
//! Such misses are logged and reported, and the rest of the removal goes on.

use crate::{
    core::{
        balance::{SPEND_UNIT, apply_adjustment, deep_spend_path, load_fund},
        budget as budget_store,
        fund as fund_store,
        navigation::NavigationStack,
        time_slot::TimeSlot,
    },
    entities::{Expense, expense, fund},
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveTime};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, warn};

/// Separator between names in an expense path
pub const PATH_DELIMITER: char = '\n';

/// One ancestor step of an expense path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Name of the budget the fund belongs to. Empty for the spent fund
    /// itself, whose budget is not part of the path.
    pub budget_name: String,
    /// Name of the fund
    pub fund_name: String,
}

impl PathSegment {
    fn new(budget_name: &str, fund_name: &str) -> Self {
        Self {
            budget_name: budget_name.to_string(),
            fund_name: fund_name.to_string(),
        }
    }
}

/// Builds the name path for a spent fund reached through `ancestors`.
#[must_use]
pub fn encode_path(ancestors: &[PathSegment], leaf_name: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(ancestors.len() * 2 + 1);
    for segment in ancestors {
        parts.push(&segment.budget_name);
        parts.push(&segment.fund_name);
    }
    parts.push(leaf_name);
    parts.join(&PATH_DELIMITER.to_string())
}

/// Splits a newline-delimited name path into its ancestors (root first) and
/// the spent fund's name.
///
/// A dangling name that does not form a full budget/fund pair is dropped.
#[must_use]
pub fn decode_path(path: &str) -> (Vec<PathSegment>, Option<String>) {
    split_path(path, path.split(PATH_DELIMITER).collect())
}

/// Like `decode_path`, but a path without any newline is split on
/// whitespace, the way rows written before ids were tracked stored it.
#[must_use]
pub fn decode_legacy_path(path: &str) -> (Vec<PathSegment>, Option<String>) {
    if path.contains(PATH_DELIMITER) {
        decode_path(path)
    } else {
        split_path(path, path.split_whitespace().collect())
    }
}

fn split_path(path: &str, mut parts: Vec<&str>) -> (Vec<PathSegment>, Option<String>) {
    if parts == [""] {
        return (Vec::new(), None);
    }
    let leaf = parts.pop().map(str::to_string);

    let pairs = parts.chunks_exact(2);
    if !pairs.remainder().is_empty() {
        warn!("Expense path {:?} has an incomplete budget/fund pair", path);
    }
    let ancestors = pairs
        .map(|pair| PathSegment::new(pair[0], pair[1]))
        .collect();
    (ancestors, leaf)
}

fn encode_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_ids(encoded: &str) -> Option<Vec<i64>> {
    if encoded.is_empty() {
        return Some(Vec::new());
    }
    encoded.split(',').map(|id| id.trim().parse().ok()).collect()
}

fn day_start(day: NaiveDate) -> DateTime {
    day.and_time(NaiveTime::MIN)
}

/// Finds the expense occupying slot `slot_index` of `day`, if any.
pub async fn find_expense_in_slot<C>(
    db: &C,
    day: NaiveDate,
    slot_index: i32,
) -> Result<Option<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::When.eq(day_start(day)))
        .filter(expense::Column::TimeSlot.eq(slot_index))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All expenses of `day`, ordered by slot.
pub async fn expenses_for_day<C>(db: &C, day: NaiveDate) -> Result<Vec<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::When.eq(day_start(day)))
        .order_by_asc(expense::Column::TimeSlot)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an expense by its unique ID.
pub async fn get_expense_by_id<C>(db: &C, expense_id: i64) -> Result<Option<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find_by_id(expense_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Result of asking to record an expense
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The cell was empty and now holds this expense
    Recorded(expense::Model),
    /// The cell already held this expense; nothing changed
    Occupied(expense::Model),
}

/// Loads the entered funds of `navigation` fresh from the store, along with
/// the path segment each contributes.
async fn resolve_ancestors<C>(
    db: &C,
    navigation: &NavigationStack,
) -> Result<Vec<(fund::Model, PathSegment)>>
where
    C: ConnectionTrait,
{
    let mut ancestors = Vec::with_capacity(navigation.funds().len());
    for fund_id in navigation.fund_ids() {
        let ancestor = load_fund(db, fund_id).await?;
        let owner = budget_store::get_budget_by_id(db, ancestor.budget_id)
            .await?
            .ok_or_else(|| Error::BudgetNotFound {
                name: ancestor.budget_id.to_string(),
            })?;
        let segment = PathSegment::new(&owner.name, &ancestor.name);
        ancestors.push((ancestor, segment));
    }
    Ok(ancestors)
}

/// Records a spent slot against `fund_id`, reached through `navigation`.
///
/// The fund must belong to the budget on top of the navigation stack. When
/// the cell is already occupied nothing happens and the existing expense is
/// returned as `RecordOutcome::Occupied`.
pub async fn record_expense(
    db: &DatabaseConnection,
    slot: &TimeSlot,
    navigation: &NavigationStack,
    fund_id: i64,
) -> Result<RecordOutcome> {
    let txn = db.begin().await?;

    if let Some(existing) = find_expense_in_slot(&txn, slot.day(), slot.slot_index()).await? {
        debug!(
            "Slot {} of {} already spent by expense {}",
            slot.slot_index(),
            slot.day(),
            existing.id
        );
        txn.rollback().await?;
        return Ok(RecordOutcome::Occupied(existing));
    }

    let leaf = load_fund(&txn, fund_id).await?;
    if let Ok(top) = navigation.top_budget() {
        if top.id != leaf.budget_id {
            return Err(Error::InvalidLink {
                message: format!("fund {} is not in budget {}", leaf.name, top.name),
            });
        }
    }

    let ancestors = resolve_ancestors(&txn, navigation).await?;
    let segments: Vec<PathSegment> = ancestors.iter().map(|(_, s)| s.clone()).collect();
    let ancestor_ids: Vec<i64> = ancestors.iter().map(|(f, _)| f.id).collect();

    let recorded = expense::ActiveModel {
        fund_id: Set(Some(leaf.id)),
        path: Set(encode_path(&segments, &leaf.name)),
        ancestor_ids: Set(Some(encode_ids(&ancestor_ids))),
        when: Set(slot.base_date()),
        time_slot: Set(slot.slot_index()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    deep_spend_path(&txn, leaf.id, &ancestor_ids).await?;

    txn.commit().await?;
    info!(
        "Recorded expense {} on {} slot {} for {}",
        recorded.id,
        slot.day(),
        slot.slot_index(),
        leaf.name
    );
    Ok(RecordOutcome::Recorded(recorded))
}

/// What removing an expense credited back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// The removed expense
    pub expense_id: i64,
    /// Funds that were credited, spent fund first then ancestors innermost
    /// first
    pub credited: Vec<i64>,
    /// Funds that still exist but are frozen, so their balance did not move
    pub frozen: Vec<i64>,
    /// Path segments that named no existing fund and were skipped
    pub unresolved: Vec<PathSegment>,
}

enum Credit {
    Applied,
    Frozen,
    Missing,
}

/// Credits one unit back to a fund if it still exists and is not frozen.
async fn credit<C>(db: &C, fund_id: i64) -> Result<Credit>
where
    C: ConnectionTrait,
{
    let Some(fund) = fund_store::get_fund_by_id(db, fund_id).await? else {
        return Ok(Credit::Missing);
    };
    if fund.frozen {
        return Ok(Credit::Frozen);
    }
    apply_adjustment(db, fund_id, SPEND_UNIT).await?;
    Ok(Credit::Applied)
}

impl RemovalReport {
    fn note(&mut self, fund_id: i64, outcome: Credit, segment: impl FnOnce() -> PathSegment) {
        match outcome {
            Credit::Applied => self.credited.push(fund_id),
            Credit::Frozen => self.frozen.push(fund_id),
            Credit::Missing => self.unresolved.push(segment()),
        }
    }
}

/// Removes an expense and credits the spent fund and its ancestors.
///
/// Ancestors are credited innermost first. Frozen funds are left as they are.
/// Any fund that can no longer be found is logged, listed in the report, and
/// skipped; the removal still completes.
pub async fn remove_expense(db: &DatabaseConnection, expense_id: i64) -> Result<RemovalReport> {
    let txn = db.begin().await?;

    let spent = get_expense_by_id(&txn, expense_id)
        .await?
        .ok_or(Error::ExpenseNotFound { id: expense_id })?;
    let ids = spent.ancestor_ids.as_deref().and_then(decode_ids);
    let (segments, leaf_name) = if spent.ancestor_ids.is_some() {
        decode_path(&spent.path)
    } else {
        decode_legacy_path(&spent.path)
    };
    let mut report = RemovalReport {
        expense_id,
        ..RemovalReport::default()
    };

    let leaf_segment = || PathSegment::new("", leaf_name.as_deref().unwrap_or_default());
    match spent.fund_id {
        Some(fund_id) => {
            let outcome = credit(&txn, fund_id).await?;
            report.note(fund_id, outcome, leaf_segment);
        }
        None => report.unresolved.push(leaf_segment()),
    }

    match ids {
        Some(ids) => {
            for (index, fund_id) in ids.iter().enumerate().rev() {
                let outcome = credit(&txn, *fund_id).await?;
                report.note(*fund_id, outcome, || {
                    segments
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| PathSegment::new("", &fund_id.to_string()))
                });
            }
        }
        None => {
            for segment in segments.into_iter().rev() {
                let found =
                    fund_store::find_fund(&txn, &segment.budget_name, &segment.fund_name).await?;
                match found {
                    Some(ancestor) => {
                        let outcome = credit(&txn, ancestor.id).await?;
                        report.note(ancestor.id, outcome, || segment);
                    }
                    None => report.unresolved.push(segment),
                }
            }
        }
    }

    spent.delete(&txn).await?;
    txn.commit().await?;

    for segment in &report.unresolved {
        warn!(
            "Expense {}: no fund {:?} in budget {:?}, credit skipped",
            expense_id, segment.fund_name, segment.budget_name
        );
    }
    info!(
        "Removed expense {} ({} credited, {} frozen, {} unresolved)",
        expense_id,
        report.credited.len(),
        report.frozen.len(),
        report.unresolved.len()
    );
    Ok(report)
}

/// Result of tapping a calendar cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotToggle {
    /// The empty cell was spent
    Recorded(expense::Model),
    /// The occupied cell was cleared
    Removed(RemovalReport),
}

/// Flips a cell: records an expense in an empty slot, or removes the one
/// occupying it.
pub async fn toggle_slot(
    db: &DatabaseConnection,
    slot: &TimeSlot,
    navigation: &NavigationStack,
    fund_id: i64,
) -> Result<SlotToggle> {
    match record_expense(db, slot, navigation, fund_id).await? {
        RecordOutcome::Recorded(recorded) => Ok(SlotToggle::Recorded(recorded)),
        RecordOutcome::Occupied(existing) => remove_expense(db, existing.id)
            .await
            .map(SlotToggle::Removed),
    }
}

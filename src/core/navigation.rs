//! Navigation stack - The user's drill-down path through the budget tree.
//!
//! The stack keeps the visited budgets and, one level shorter, the funds that
//! were entered to reach each deeper budget. Every fund carries the ratio it
//! had when it was pushed. Ratios are snapshots as of entry time: adding,
//! removing or renaming siblings later does not change a ratio already on the
//! stack.

use crate::{
    core::balance::{get_ratio, load_fund},
    core::{budget, fund as fund_store},
    entities::{budget as budget_entity, fund},
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use tracing::debug;

/// Visited budgets and entered funds, bottom (root) first
#[derive(Debug, Clone, Default)]
pub struct NavigationStack {
    budgets: Vec<budget_entity::Model>,
    funds: Vec<fund::Model>,
    ratios: Vec<f64>,
}

impl NavigationStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            budgets: Vec::new(),
            funds: Vec::new(),
            ratios: Vec::new(),
        }
    }

    /// Appends a budget to the budget stack.
    pub fn push_budget(&mut self, budget: budget_entity::Model) {
        self.budgets.push(budget);
    }

    /// Appends a fund, snapshotting its ratio against `siblings`.
    ///
    /// Returns the ratio that was recorded.
    pub fn push_fund(&mut self, fund: fund::Model, siblings: &[fund::Model]) -> f64 {
        let ratio = get_ratio(&fund, siblings);
        self.funds.push(fund);
        self.ratios.push(ratio);
        ratio
    }

    /// Removes the top budget. Does nothing on an empty stack.
    pub fn pop_budget(&mut self) -> Option<budget_entity::Model> {
        self.budgets.pop()
    }

    /// Removes the top fund and its ratio. Does nothing on an empty stack.
    pub fn pop_fund(&mut self) -> Option<fund::Model> {
        self.ratios.pop();
        self.funds.pop()
    }

    /// Leaves the current budget: pops it along with the fund that entered it.
    ///
    /// The bottom budget is never popped this way; returns false at the root.
    pub fn back(&mut self) -> bool {
        if self.budgets.len() <= 1 {
            return false;
        }
        self.pop_budget();
        self.pop_fund();
        true
    }

    /// Keeps only the bottom budget and drops every fund.
    pub fn reset_to_root(&mut self) {
        self.funds.clear();
        self.ratios.clear();
        self.budgets.truncate(1);
    }

    /// Replaces the whole stack with a single root budget.
    pub fn select_root(&mut self, budget: budget_entity::Model) {
        self.funds.clear();
        self.ratios.clear();
        self.budgets.clear();
        self.budgets.push(budget);
    }

    /// Replaces every stack entry for `budget.id` with the fresh model.
    pub fn refresh_budget(&mut self, budget: &budget_entity::Model) {
        for entry in self.budgets.iter_mut().filter(|b| b.id == budget.id) {
            entry.clone_from(budget);
        }
    }

    /// Replaces every stack entry for `fund.id` with the fresh model. The
    /// ratio recorded at entry is kept.
    pub fn refresh_fund(&mut self, fund: &fund::Model) {
        for entry in self.funds.iter_mut().filter(|f| f.id == fund.id) {
            entry.clone_from(fund);
        }
    }

    /// Whether `fund_id` was entered to reach the current budget.
    #[must_use]
    pub fn contains_fund(&self, fund_id: i64) -> bool {
        self.funds.iter().any(|f| f.id == fund_id)
    }

    /// Product of every snapshotted ratio; 1.0 for an empty stack.
    #[must_use]
    pub fn cumulative_ratio(&self) -> f64 {
        self.ratios.iter().product()
    }

    /// The budget currently shown.
    ///
    /// # Errors
    /// Returns `Error::EmptyNavigation` when no budget has been pushed.
    pub fn top_budget(&self) -> Result<&budget_entity::Model> {
        self.budgets.last().ok_or(Error::EmptyNavigation)
    }

    /// True when no budget has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    /// Visited budgets, root first.
    #[must_use]
    pub fn budgets(&self) -> &[budget_entity::Model] {
        &self.budgets
    }

    /// Entered funds, root first.
    #[must_use]
    pub fn funds(&self) -> &[fund::Model] {
        &self.funds
    }

    /// Ratios recorded when each fund was pushed.
    #[must_use]
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Ids of the entered funds, root first.
    #[must_use]
    pub fn fund_ids(&self) -> Vec<i64> {
        self.funds.iter().map(|f| f.id).collect()
    }

    /// Whether the fund stack is exactly one shorter than the budget stack.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.funds.len() == self.budgets.len().saturating_sub(1)
            && self.ratios.len() == self.funds.len()
    }

    /// Title text such as `Day / Work / Work`, alternating budgets and funds.
    #[must_use]
    pub fn breadcrumb(&self) -> String {
        let mut parts = Vec::with_capacity(self.budgets.len() + self.funds.len());
        for (index, budget) in self.budgets.iter().enumerate() {
            parts.push(budget.name.as_str());
            if let Some(fund) = self.funds.get(index) {
                parts.push(fund.name.as_str());
            }
        }
        parts.join(" / ")
    }
}

/// Enters `fund_id`: pushes the fund with its ratio among its current
/// siblings, then pushes its sub-budget.
///
/// Returns false without touching the stack if the fund has no sub-budget.
///
/// # Errors
/// Returns `Error::EmptyNavigation` on an empty stack, and
/// `Error::InvalidLink` when the fund does not belong to the budget on top of
/// the stack.
pub async fn enter_fund<C>(
    db: &C,
    navigation: &mut NavigationStack,
    fund_id: i64,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let top = navigation.top_budget()?;
    let entered = load_fund(db, fund_id).await?;
    if entered.budget_id != top.id {
        return Err(Error::InvalidLink {
            message: format!("fund {} is not in budget {}", entered.name, top.name),
        });
    }
    let Some(sub_budget_id) = entered.sub_budget_id else {
        debug!("Fund {} has no sub-budget to enter", entered.name);
        return Ok(false);
    };
    let sub_budget = budget::get_budget_by_id(db, sub_budget_id)
        .await?
        .ok_or_else(|| Error::BudgetNotFound {
            name: sub_budget_id.to_string(),
        })?;
    let siblings =
        fund_store::list_funds(db, entered.budget_id, fund_store::FundFilter::All).await?;

    let ratio = navigation.push_fund(entered, &siblings);
    debug!(
        "Entered budget {} with ratio {} (cumulative {})",
        sub_budget.name,
        ratio,
        navigation.cumulative_ratio()
    );
    navigation.push_budget(sub_budget);
    Ok(true)
}

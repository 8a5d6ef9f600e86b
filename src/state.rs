//! The ledger state container.
//!
//! `Ledger` bundles the database connection, the navigation stack, the slot
//! length and the event bus. Presentation code holds one `Ledger` and calls
//! into it; every mutating method takes `&mut self`, so a shared ledger must
//! sit behind a lock. Each change is announced on the event bus once it has
//! been written.

use crate::{
    config::{database::create_tables, ledger::LedgerConfig},
    core::{
        balance,
        budget,
        events::{EventBus, LedgerEvent},
        expense::{self, RecordOutcome, RemovalReport, SlotToggle},
        fund,
        navigation::{self, NavigationStack},
        seed, settings,
        time_slot::{self, TimeSlot},
    },
    entities::{budget as budget_entity, fund as fund_entity},
    errors::{Error, Result},
};
use chrono::{NaiveDate, TimeDelta};
use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Explicit application state handed to every consumer
pub struct Ledger {
    db: DatabaseConnection,
    navigation: NavigationStack,
    slot_size: TimeDelta,
    events: EventBus,
}

impl Ledger {
    /// Prepares the store behind `db` and positions navigation on the first
    /// top-level budget.
    ///
    /// Tables are created if missing, the schema marker is written, an empty
    /// store is seeded from `config`, and the slot length is read from the
    /// store (falling back to `config.slot_minutes`).
    pub async fn open(db: DatabaseConnection, config: &LedgerConfig) -> Result<Self> {
        create_tables(&db).await?;
        let version = settings::ensure_schema_version(&db).await?;
        debug!("Ledger schema version {}", version);

        seed::seed_from_config(&db, config).await?;

        let minutes = settings::get_slot_minutes(&db, config.slot_minutes).await?;
        let slot_size = time_slot::slot_size_from_minutes(minutes)?;

        let mut navigation = NavigationStack::new();
        if let Some(first) = budget::list_top_level_budgets(&db).await?.into_iter().next() {
            navigation.push_budget(first);
        }

        info!("Ledger opened with {}-minute slots", minutes);
        Ok(Self {
            db,
            navigation,
            slot_size,
            events: EventBus::new(),
        })
    }

    /// The underlying connection, for read-only queries.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The current drill-down path.
    #[must_use]
    pub const fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    /// The event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Starts receiving ledger events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Current slot length.
    #[must_use]
    pub const fn slot_size(&self) -> TimeDelta {
        self.slot_size
    }

    /// Changes and stores the slot length.
    pub async fn set_slot_minutes(&mut self, minutes: i64) -> Result<()> {
        self.slot_size = settings::set_slot_minutes(&self.db, minutes).await?;
        self.events.emit(LedgerEvent::SlotSizeChanged { minutes });
        Ok(())
    }

    /// The slot `slot_index` of `day` at the current slot length.
    pub fn slot(&self, day: NaiveDate, slot_index: i32) -> Result<TimeSlot> {
        TimeSlot::new(day, slot_index, self.slot_size)
    }

    /// The slot the local clock is in.
    pub fn current_slot(&self) -> Result<TimeSlot> {
        time_slot::slot_of_current_time(self.slot_size)
    }

    fn navigation_changed(&self) {
        self.events.emit(LedgerEvent::NavigationChanged {
            breadcrumb: self.navigation.breadcrumb(),
            cumulative_ratio: self.navigation.cumulative_ratio(),
        });
    }

    fn balance_changed(&mut self, changed: &fund_entity::Model) {
        self.navigation.refresh_fund(changed);
        self.events.emit(LedgerEvent::BalanceChanged {
            fund_id: changed.id,
            fund_name: changed.name.clone(),
            balance: changed.balance,
        });
    }

    fn structure_changed(&self) {
        self.events.emit(LedgerEvent::StructureChanged);
    }

    /// Reloads the funds on the navigation stack after their balances moved.
    async fn refresh_entered_funds(&mut self) -> Result<()> {
        for fund_id in self.navigation.fund_ids() {
            if let Some(fresh) = fund::get_fund_by_id(&self.db, fund_id).await? {
                self.navigation.refresh_fund(&fresh);
            }
        }
        Ok(())
    }

    /// Starts navigation over at a top-level budget.
    pub async fn select_budget(&mut self, budget_id: i64) -> Result<()> {
        let selected = budget::get_budget_by_id(&self.db, budget_id)
            .await?
            .ok_or_else(|| Error::BudgetNotFound {
                name: budget_id.to_string(),
            })?;
        self.navigation.select_root(selected);
        self.navigation_changed();
        Ok(())
    }

    /// Drills into a fund's sub-budget. Returns false if it has none.
    pub async fn enter_fund(&mut self, fund_id: i64) -> Result<bool> {
        let entered = navigation::enter_fund(&self.db, &mut self.navigation, fund_id).await?;
        if entered {
            self.navigation_changed();
        }
        Ok(entered)
    }

    /// Goes up one level. Returns false at the root.
    pub fn back(&mut self) -> bool {
        let moved = self.navigation.back();
        if moved {
            self.navigation_changed();
        }
        moved
    }

    /// Returns to the bottom budget of the stack.
    pub fn reset_navigation(&mut self) {
        self.navigation.reset_to_root();
        self.navigation_changed();
    }

    /// Spends one unit from a single fund.
    pub async fn spend(&mut self, fund_id: i64) -> Result<fund_entity::Model> {
        let changed = balance::spend_fund(&self.db, fund_id).await?;
        self.balance_changed(&changed);
        Ok(changed)
    }

    /// Credits one unit to a fund.
    pub async fn earn(&mut self, fund_id: i64) -> Result<fund_entity::Model> {
        let changed = balance::earn_fund(&self.db, fund_id).await?;
        self.balance_changed(&changed);
        Ok(changed)
    }

    /// Resets a fund to its default balance.
    pub async fn reset(&mut self, fund_id: i64) -> Result<fund_entity::Model> {
        let changed = balance::reset_fund(&self.db, fund_id).await?;
        self.balance_changed(&changed);
        Ok(changed)
    }

    /// Freezes or unfreezes a fund.
    pub async fn freeze(&mut self, fund_id: i64, frozen: bool) -> Result<fund_entity::Model> {
        let changed = balance::set_frozen(&self.db, fund_id, frozen).await?;
        self.balance_changed(&changed);
        Ok(changed)
    }

    /// Changes how much a fund gains per recharge round.
    pub async fn set_recharge(
        &mut self,
        fund_id: i64,
        amount: f64,
    ) -> Result<fund_entity::Model> {
        let changed = balance::set_recharge(&self.db, fund_id, amount).await?;
        self.balance_changed(&changed);
        Ok(changed)
    }

    /// Spends `slot` against a fund of the current budget.
    pub async fn record(&mut self, slot: &TimeSlot, fund_id: i64) -> Result<RecordOutcome> {
        let outcome = expense::record_expense(&self.db, slot, &self.navigation, fund_id).await?;
        if let RecordOutcome::Recorded(recorded) = &outcome {
            self.refresh_entered_funds().await?;
            self.events.emit(LedgerEvent::ExpenseRecorded {
                expense_id: recorded.id,
                fund_id,
                time_slot: recorded.time_slot,
            });
        }
        Ok(outcome)
    }

    /// Removes an expense, announcing every path segment that could not be
    /// credited.
    pub async fn remove(&mut self, expense_id: i64) -> Result<RemovalReport> {
        let report = expense::remove_expense(&self.db, expense_id).await?;
        self.refresh_entered_funds().await?;
        self.removal_events(&report);
        Ok(report)
    }

    fn removal_events(&self, report: &RemovalReport) {
        for segment in &report.unresolved {
            self.events.emit(LedgerEvent::AncestorUnresolved {
                expense_id: report.expense_id,
                budget_name: segment.budget_name.clone(),
                fund_name: segment.fund_name.clone(),
            });
        }
        self.events.emit(LedgerEvent::ExpenseRemoved {
            expense_id: report.expense_id,
            credited: report.credited.len(),
            frozen: report.frozen.len(),
            unresolved: report.unresolved.len(),
        });
    }

    /// Cell tap: spends an empty slot or clears an occupied one.
    pub async fn tap_slot(&mut self, slot: &TimeSlot, fund_id: i64) -> Result<SlotToggle> {
        let toggle = expense::toggle_slot(&self.db, slot, &self.navigation, fund_id).await?;
        self.refresh_entered_funds().await?;
        match &toggle {
            SlotToggle::Recorded(recorded) => self.events.emit(LedgerEvent::ExpenseRecorded {
                expense_id: recorded.id,
                fund_id,
                time_slot: recorded.time_slot,
            }),
            SlotToggle::Removed(report) => self.removal_events(report),
        }
        Ok(toggle)
    }

    /// Creates a top-level budget at the end of the order.
    pub async fn create_budget(&mut self, name: &str) -> Result<budget_entity::Model> {
        let created = budget::create_budget(&self.db, name).await?;
        self.structure_changed();
        Ok(created)
    }

    /// Renames a budget, updating it wherever it sits on the navigation stack.
    pub async fn rename_budget(
        &mut self,
        budget_id: i64,
        name: &str,
    ) -> Result<budget_entity::Model> {
        let renamed = budget::rename_budget(&self.db, budget_id, name).await?;
        self.structure_changed();
        if self.navigation.budgets().iter().any(|b| b.id == budget_id) {
            self.navigation.refresh_budget(&renamed);
            self.navigation_changed();
        }
        Ok(renamed)
    }

    /// Moves a top-level budget within the top-level order.
    pub async fn move_budget(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<Vec<budget_entity::Model>> {
        let budgets = budget::move_budget(&self.db, from, to).await?;
        for moved in &budgets {
            self.navigation.refresh_budget(moved);
        }
        self.structure_changed();
        Ok(budgets)
    }

    /// Creates a fund in `budget_id` at `position`, or at the end.
    pub async fn create_fund(
        &mut self,
        budget_id: i64,
        name: &str,
        position: Option<usize>,
    ) -> Result<fund_entity::Model> {
        let created = fund::create_fund(&self.db, budget_id, name, position).await?;
        self.structure_changed();
        Ok(created)
    }

    /// Renames a fund, updating it wherever it sits on the navigation stack.
    /// Ratios already on the stack are kept.
    pub async fn rename_fund(&mut self, fund_id: i64, name: &str) -> Result<fund_entity::Model> {
        let renamed = fund::rename_fund(&self.db, fund_id, name).await?;
        self.structure_changed();
        if self.navigation.contains_fund(fund_id) {
            self.navigation.refresh_fund(&renamed);
            self.navigation_changed();
        }
        Ok(renamed)
    }

    /// Moves a fund within its budget.
    pub async fn move_fund(
        &mut self,
        budget_id: i64,
        from: usize,
        to: usize,
    ) -> Result<Vec<fund_entity::Model>> {
        let funds = fund::move_fund(&self.db, budget_id, from, to).await?;
        for moved in &funds {
            self.navigation.refresh_fund(moved);
        }
        self.structure_changed();
        Ok(funds)
    }

    /// Links a fund to a sub-budget. Navigation returns to the root if the
    /// fund was entered, since the budget above it changes.
    pub async fn link_sub_budget(
        &mut self,
        fund_id: i64,
        budget_id: i64,
    ) -> Result<fund_entity::Model> {
        let linked = fund::link_sub_budget(&self.db, fund_id, budget_id).await?;
        self.relinked(fund_id);
        Ok(linked)
    }

    /// Removes a fund's sub-budget link.
    pub async fn unlink_sub_budget(&mut self, fund_id: i64) -> Result<fund_entity::Model> {
        let unlinked = fund::unlink_sub_budget(&self.db, fund_id).await?;
        self.relinked(fund_id);
        Ok(unlinked)
    }

    /// Gives a fund a sub-budget named like the fund.
    pub async fn promote_to_sub_budget(
        &mut self,
        fund_id: i64,
    ) -> Result<(fund_entity::Model, budget_entity::Model)> {
        let promoted = fund::promote_to_sub_budget(&self.db, fund_id).await?;
        self.relinked(fund_id);
        Ok(promoted)
    }

    fn relinked(&mut self, fund_id: i64) {
        self.structure_changed();
        if self.navigation.contains_fund(fund_id) {
            self.reset_navigation();
        }
    }

    /// Deletes a budget. Navigation restarts at the first top-level budget
    /// if the deleted one was on the stack.
    pub async fn delete_budget(&mut self, budget_id: i64) -> Result<()> {
        budget::delete_budget(&self.db, budget_id).await?;
        self.structure_changed();

        if self.navigation.budgets().iter().any(|b| b.id == budget_id) {
            self.navigation = NavigationStack::new();
            if let Some(first) = budget::list_top_level_budgets(&self.db)
                .await?
                .into_iter()
                .next()
            {
                self.navigation.push_budget(first);
            }
            self.navigation_changed();
        }
        Ok(())
    }

    /// Deletes a fund. Navigation returns to the root if the fund was on the
    /// stack.
    pub async fn delete_fund(&mut self, fund_id: i64) -> Result<()> {
        fund::delete_fund(&self.db, fund_id).await?;
        self.structure_changed();

        if self.navigation.contains_fund(fund_id) {
            self.reset_navigation();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn seeded_config() -> LedgerConfig {
        toml::from_str(
            r#"
            slot_minutes = 60

            [[budgets]]
            name = "Day"

            [[budgets.funds]]
            name = "Work"
            sub_budget = "Work"

            [[budgets.funds]]
            name = "Rest"

            [[budgets]]
            name = "Work"

            [[budgets.funds]]
            name = "Email"

            [[budgets.funds]]
            name = "Code"
            "#,
        )
        .unwrap()
    }

    async fn open_seeded() -> Result<Ledger> {
        Ledger::open(setup_test_db().await?, &seeded_config()).await
    }

    async fn fund_named(ledger: &Ledger, budget_name: &str, name: &str) -> fund_entity::Model {
        fund::find_fund(ledger.db(), budget_name, name)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_and_positions_navigation() -> Result<()> {
        let ledger = open_seeded().await?;

        assert_eq!(ledger.slot_size(), TimeDelta::minutes(60));
        assert_eq!(ledger.navigation().top_budget()?.name, "Day");
        assert!(ledger.navigation().is_consistent());

        Ok(())
    }

    #[tokio::test]
    async fn test_open_empty_store() -> Result<()> {
        let ledger = Ledger::open(setup_test_db().await?, &LedgerConfig::default()).await?;
        assert!(ledger.navigation().is_empty());
        assert_eq!(ledger.slot_size(), TimeDelta::minutes(30));
        Ok(())
    }

    #[tokio::test]
    async fn test_drill_down_spend_and_back() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let mut events = ledger.subscribe();
        let work = fund_named(&ledger, "Day", "Work").await;
        let email = fund_named(&ledger, "Work", "Email").await;

        assert!(ledger.enter_fund(work.id).await?);
        assert_eq!(ledger.navigation().breadcrumb(), "Day / Work / Work");
        assert_eq!(ledger.navigation().cumulative_ratio(), 0.5);
        assert!(matches!(
            events.try_recv().unwrap(),
            LedgerEvent::NavigationChanged { .. }
        ));

        let slot = ledger.slot(test_day(), 5)?;
        let outcome = ledger.record(&slot, email.id).await?;
        assert!(matches!(outcome, RecordOutcome::Recorded(_)));
        assert!(matches!(
            events.try_recv().unwrap(),
            LedgerEvent::ExpenseRecorded { time_slot: 5, .. }
        ));

        assert_eq!(fund_named(&ledger, "Work", "Email").await.balance, 0.0);
        assert_eq!(fund_named(&ledger, "Day", "Work").await.balance, 0.0);

        assert!(ledger.back());
        assert_eq!(ledger.navigation().breadcrumb(), "Day");
        assert!(!ledger.back());

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_publishes_unresolved_ancestors() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let email = fund_named(&ledger, "Work", "Email").await;
        let legacy = create_test_expense(ledger.db(), email.id, "Day\nWork\nEmail").await?;
        let day = budget::find_budget_by_name(ledger.db(), "Day").await?.unwrap();
        budget::rename_budget(ledger.db(), day.id, "Today").await?;

        let mut events = ledger.subscribe();
        let report = ledger.remove(legacy.id).await?;
        assert_eq!(report.unresolved.len(), 1);

        assert_eq!(
            events.try_recv().unwrap(),
            LedgerEvent::AncestorUnresolved {
                expense_id: legacy.id,
                budget_name: "Day".to_string(),
                fund_name: "Work".to_string(),
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            LedgerEvent::ExpenseRemoved {
                expense_id: legacy.id,
                credited: 1,
                frozen: 0,
                unresolved: 1,
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_tap_slot_toggles() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let rest = fund_named(&ledger, "Day", "Rest").await;
        let slot = ledger.slot(test_day(), 3)?;

        assert!(matches!(
            ledger.tap_slot(&slot, rest.id).await?,
            SlotToggle::Recorded(_)
        ));
        assert_eq!(fund_named(&ledger, "Day", "Rest").await.balance, 0.0);

        assert!(matches!(
            ledger.tap_slot(&slot, rest.id).await?,
            SlotToggle::Removed(_)
        ));
        assert_eq!(fund_named(&ledger, "Day", "Rest").await.balance, 1.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_gestures_publish_balance_changes() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let rest = fund_named(&ledger, "Day", "Rest").await;
        let mut events = ledger.subscribe();

        ledger.earn(rest.id).await?;
        ledger.freeze(rest.id, true).await?;
        let after = ledger.spend(rest.id).await?;
        assert_eq!(after.balance, 2.0);

        for _ in 0..3 {
            assert!(matches!(
                events.try_recv().unwrap(),
                LedgerEvent::BalanceChanged { .. }
            ));
        }

        let reset = ledger.reset(rest.id).await?;
        assert_eq!(reset.balance, 2.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_slot_size_persists() -> Result<()> {
        let db = setup_test_db().await?;
        let mut ledger = Ledger::open(db, &seeded_config()).await?;
        ledger.set_slot_minutes(15).await?;
        assert_eq!(ledger.slot_size(), TimeDelta::minutes(15));
        assert!(ledger.slot(test_day(), 95).is_ok());
        assert!(ledger.slot(test_day(), 96).is_err());

        let reopened = Ledger::open(ledger.db().clone(), &seeded_config()).await?;
        assert_eq!(reopened.slot_size(), TimeDelta::minutes(15));

        assert!(matches!(
            ledger.set_slot_minutes(2000).await,
            Err(Error::InvalidSlotSize { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_refreshes_breadcrumb() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let work = fund_named(&ledger, "Day", "Work").await;
        ledger.enter_fund(work.id).await?;
        let sub = ledger.navigation().top_budget()?.id;
        let mut events = ledger.subscribe();

        ledger.rename_budget(sub, "Job").await?;
        assert_eq!(events.try_recv().unwrap(), LedgerEvent::StructureChanged);
        assert_eq!(
            events.try_recv().unwrap(),
            LedgerEvent::NavigationChanged {
                breadcrumb: "Day / Work / Job".to_string(),
                cumulative_ratio: 0.5,
            }
        );

        ledger.rename_fund(work.id, "Focus").await?;
        assert_eq!(ledger.navigation().breadcrumb(), "Day / Focus / Job");
        assert_eq!(ledger.navigation().ratios(), &[0.5]);

        // Renaming something off the stack changes structure only
        let rest = fund_named(&ledger, "Day", "Rest").await;
        let mut events = ledger.subscribe();
        ledger.rename_fund(rest.id, "Nap").await?;
        assert_eq!(events.try_recv().unwrap(), LedgerEvent::StructureChanged);
        assert!(events.try_recv().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_structure_mutations_publish_events() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let day = ledger.navigation().top_budget()?.clone();
        let mut events = ledger.subscribe();

        let errands = ledger.create_fund(day.id, "Errands", Some(0)).await?;
        let week = ledger.create_budget("Week").await?;
        ledger.move_fund(day.id, 0, 2).await?;
        ledger.link_sub_budget(errands.id, week.id).await?;
        ledger.unlink_sub_budget(errands.id).await?;
        ledger.promote_to_sub_budget(errands.id).await?;
        ledger.move_budget(0, 1).await?;

        for _ in 0..7 {
            assert_eq!(events.try_recv().unwrap(), LedgerEvent::StructureChanged);
        }

        let changed = ledger.set_recharge(errands.id, 2.0).await?;
        assert_eq!(changed.recharge, 2.0);
        assert!(matches!(
            events.try_recv().unwrap(),
            LedgerEvent::BalanceChanged { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_unlinking_entered_fund_resets_to_root() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let work = fund_named(&ledger, "Day", "Work").await;
        ledger.enter_fund(work.id).await?;

        ledger.unlink_sub_budget(work.id).await?;

        assert_eq!(ledger.navigation().breadcrumb(), "Day");
        assert!(ledger.navigation().is_consistent());
        Ok(())
    }

    #[tokio::test]
    async fn test_enter_fund_on_empty_ledger() -> Result<()> {
        let mut ledger = Ledger::open(setup_test_db().await?, &LedgerConfig::default()).await?;
        let day = create_test_budget(ledger.db(), "Day").await?;
        let work = create_test_fund(ledger.db(), day.id, "Work").await?;
        fund::promote_to_sub_budget(ledger.db(), work.id).await?;

        assert!(matches!(
            ledger.enter_fund(work.id).await,
            Err(Error::EmptyNavigation)
        ));
        assert!(ledger.navigation().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_budget_on_stack_resets_navigation() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let work = fund_named(&ledger, "Day", "Work").await;
        ledger.enter_fund(work.id).await?;
        let sub = ledger.navigation().top_budget()?.id;

        ledger.delete_budget(sub).await?;

        assert_eq!(ledger.navigation().budgets().len(), 1);
        assert_eq!(ledger.navigation().top_budget()?.name, "Day");
        assert!(ledger.navigation().funds().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_entered_fund_resets_to_root() -> Result<()> {
        let mut ledger = open_seeded().await?;
        let work = fund_named(&ledger, "Day", "Work").await;
        ledger.enter_fund(work.id).await?;

        ledger.delete_fund(work.id).await?;

        assert_eq!(ledger.navigation().breadcrumb(), "Day");
        Ok(())
    }
}

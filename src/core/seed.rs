//! Seeding an empty store from config.toml
//!
//! Budgets are created in the order they are listed, then their funds, then
//! the sub-budget links (a link may name a budget listed later, or one that
//! does not exist yet and is created on the spot).

use crate::{
    config::ledger::LedgerConfig,
    core::{budget, fund},
    entities::{Budget, fund as fund_entity},
    errors::Result,
};
use sea_orm::{PaginatorTrait, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Seeds budgets and funds from `config` if the store has no budgets yet.
///
/// Returns the number of budgets listed in the config that were created, or
/// 0 when the store was already populated.
pub async fn seed_from_config(db: &DatabaseConnection, config: &LedgerConfig) -> Result<usize> {
    if Budget::find().count(db).await? > 0 {
        info!("Ledger already has budgets, skipping seed");
        return Ok(0);
    }

    let txn = db.begin().await?;
    let mut links = Vec::new();

    for budget_config in &config.budgets {
        let created = match budget::find_budget_by_name(&txn, &budget_config.name).await? {
            Some(existing) => existing,
            None => budget::create_budget(&txn, &budget_config.name).await?,
        };
        for fund_config in &budget_config.funds {
            let seeded = fund::insert_fund(&txn, created.id, &fund_config.name, None).await?;
            let mut active_model: fund_entity::ActiveModel = seeded.clone().into();
            active_model.recharge = Set(fund_config.recharge);
            active_model.frozen = Set(fund_config.frozen);
            active_model.update(&txn).await?;
            if let Some(sub_budget) = &fund_config.sub_budget {
                links.push((seeded.id, sub_budget.clone()));
            }
        }
    }

    for (fund_id, sub_budget_name) in links {
        let target = match budget::find_budget_by_name(&txn, &sub_budget_name).await? {
            Some(existing) => existing,
            None => budget::create_budget(&txn, &sub_budget_name).await?,
        };
        fund::link_sub_budget(&txn, fund_id, target.id).await?;
    }

    txn.commit().await?;
    info!("Seeded {} budget(s) from config", config.budgets.len());
    Ok(config.budgets.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::fund::FundFilter;
    use crate::test_utils::*;

    fn config() -> LedgerConfig {
        toml::from_str(
            r#"
            [[budgets]]
            name = "Day"

            [[budgets.funds]]
            name = "Work"
            sub_budget = "Work"

            [[budgets.funds]]
            name = "Sleep"
            frozen = true
            recharge = 0.0

            [[budgets]]
            name = "Work"

            [[budgets.funds]]
            name = "Email"
            recharge = 2.0
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_seed_builds_hierarchy() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(seed_from_config(&db, &config()).await?, 2);

        let top = budget::list_top_level_budgets(&db).await?;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Day");
        let subs = budget::list_sub_budgets(&db).await?;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name, "Work");

        let day_funds = fund::list_funds(&db, top[0].id, FundFilter::All).await?;
        assert_eq!(day_funds[0].sub_budget_id, Some(subs[0].id));
        assert!(day_funds[1].frozen);
        assert_eq!(day_funds[1].recharge, 0.0);

        let work_funds = fund::list_funds(&db, subs[0].id, FundFilter::All).await?;
        assert_eq!(work_funds[0].name, "Email");
        assert_eq!(work_funds[0].recharge, 2.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_skips_populated_store() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_budget(&db, "Existing").await?;

        assert_eq!(seed_from_config(&db, &config()).await?, 0);
        assert_eq!(budget::list_top_level_budgets(&db).await?.len(), 1);

        Ok(())
    }
}

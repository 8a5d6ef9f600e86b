use dotenvy::dotenv;
use time_ledger::{
    Ledger, Result,
    config::{database, ledger::load_default_config},
    core::{
        balance::rounded_balance,
        budget,
        expense::expenses_for_day,
        fund::{FundFilter, list_funds},
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load ledger settings and seed budgets
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Open the store. Any failure here is fatal.
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connected."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    let ledger = Ledger::open(db, &config)
        .await
        .inspect_err(|e| error!("Failed to open ledger: {}", e))?;

    // 5. Print where the clock is and what is left
    let slot = ledger.current_slot()?;
    info!(
        "Current slot: {} #{} ({} - {})",
        slot.day(),
        slot.slot_index(),
        slot.instant().format("%H:%M"),
        slot.end().format("%H:%M")
    );

    for top in budget::list_top_level_budgets(ledger.db()).await? {
        println!("{}", top.name);
        for fund in list_funds(ledger.db(), top.id, FundFilter::All).await? {
            let shown = if fund.frozen {
                "∞".to_string()
            } else {
                rounded_balance(&fund).to_string()
            };
            println!("  {:<24} {:>6}", fund.name, shown);
        }
    }

    let spent_today = expenses_for_day(ledger.db(), slot.day()).await?;
    println!("{} slot(s) spent today", spent_today.len());

    Ok(())
}

//! Persistent ledger settings
//!
//! Settings live in the `system_state` key/value table. The slot length is the
//! only user-facing one; the schema version marker is written once when the
//! store is opened.

use crate::{
    config::ledger::DEFAULT_SLOT_MINUTES,
    core::time_slot::slot_size_from_minutes,
    entities::{SystemState, system_state},
    errors::{Error, Result},
};
use chrono::{TimeDelta, Utc};
use sea_orm::{Set, prelude::*};
use tracing::{debug, info};

const SLOT_MINUTES_KEY: &str = "slot_minutes";
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Version written to a newly created store
pub const SCHEMA_VERSION: i32 = 1;

/// Reads a setting value, `None` if it was never written.
pub async fn get_setting<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;
    debug!("Setting {}: {:?}", key, state.as_ref().map(|s| &s.value));
    Ok(state.map(|s| s.value))
}

/// Inserts or updates a setting value.
pub async fn set_setting<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(db).await?;
    }

    Ok(())
}

/// The stored slot length in minutes, or `fallback` if none is stored.
pub async fn get_slot_minutes<C>(db: &C, fallback: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    match get_setting(db, SLOT_MINUTES_KEY).await? {
        Some(value) => value.parse().map_err(|e| Error::Config {
            message: format!("Failed to parse stored slot size {value:?}: {e}"),
        }),
        None => Ok(fallback),
    }
}

/// The stored slot length, defaulting to 30 minutes.
pub async fn get_slot_size<C>(db: &C) -> Result<TimeDelta>
where
    C: ConnectionTrait,
{
    slot_size_from_minutes(get_slot_minutes(db, DEFAULT_SLOT_MINUTES).await?)
}

/// Stores a new slot length.
///
/// Existing expenses keep their slot index; from now on those indexes are
/// read against the new length.
pub async fn set_slot_minutes<C>(db: &C, minutes: i64) -> Result<TimeDelta>
where
    C: ConnectionTrait,
{
    let size = slot_size_from_minutes(minutes)?;
    set_setting(db, SLOT_MINUTES_KEY, &minutes.to_string()).await?;
    info!("Slot size set to {} minutes", minutes);
    Ok(size)
}

/// Writes the schema version marker if the store does not have one yet.
/// Returns the version found or written.
pub async fn ensure_schema_version<C>(db: &C) -> Result<i32>
where
    C: ConnectionTrait,
{
    if let Some(value) = get_setting(db, SCHEMA_VERSION_KEY).await? {
        return value.parse().map_err(|e| Error::Config {
            message: format!("Failed to parse schema version {value:?}: {e}"),
        });
    }
    set_setting(db, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_string()).await?;
    Ok(SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_get_setting_none() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_setting(&db, "missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_setting_updates_existing() -> Result<()> {
        let db = setup_test_db().await?;

        set_setting(&db, "colour", "red").await?;
        set_setting(&db, "colour", "blue").await?;

        assert_eq!(get_setting(&db, "colour").await?.as_deref(), Some("blue"));
        let rows = SystemState::find().all(&db).await?;
        assert_eq!(rows.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_slot_size_default_and_update() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(get_slot_size(&db).await?, TimeDelta::minutes(30));

        let size = set_slot_minutes(&db, 15).await?;
        assert_eq!(size, TimeDelta::minutes(15));
        assert_eq!(get_slot_size(&db).await?, TimeDelta::minutes(15));

        assert!(matches!(
            set_slot_minutes(&db, 0).await,
            Err(Error::InvalidSlotSize { minutes: 0 })
        ));
        assert_eq!(get_slot_minutes(&db, 30).await?, 15);

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_schema_version() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(ensure_schema_version(&db).await?, SCHEMA_VERSION);
        assert_eq!(ensure_schema_version(&db).await?, SCHEMA_VERSION);
        Ok(())
    }
}

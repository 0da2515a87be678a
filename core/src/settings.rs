use tracing::{debug, info};

use crate::db::Database;
use crate::error::Result;
use crate::models::{SETTINGS_ID, Settings};

/// Access to the single `user_settings` row (`id = "main"`).
pub struct SettingsRepository<'db> {
    db: &'db Database,
}

impl<'db> SettingsRepository<'db> {
    #[must_use]
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Stored settings, writing the defaults first if none exist yet.
    pub fn get(&self) -> Result<Settings> {
        if self.db.insert_settings_if_absent(&Settings::default())? {
            info!("initialized default settings");
        }
        self.db.require(SETTINGS_ID)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        self.db.put(settings)?;
        debug!(
            calorie_goal = settings.calorie_goal,
            theme = %settings.theme,
            units = %settings.units,
            "saved settings"
        );
        Ok(())
    }
}

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Days, NaiveDate};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::AggregateManager;
use crate::clock::{Clock, SystemClock, local_date_of_millis};
use crate::db::{Database, Index};
use crate::error::{LedgerError, Result};
use crate::models::{
    DailyAggregate, DayView, ExportData, FoodLogEntry, GoalsUpdate, ImportSummary, Macros,
    NewFoodLogEntry, SETTINGS_ID, Settings, Theme, Units, daily_id, date_key,
    normalize_date_key, validate_goals,
};
use crate::settings::SettingsRepository;

pub const EXPORT_VERSION: u32 = 1;

/// Tracking façade: the single entry point for logging food and reading totals.
///
/// Every write that touches an entry and its day's totals runs in one
/// transaction, entry first, so a failure leaves neither changed.
pub struct Tracker {
    db: Database,
    clock: Box<dyn Clock>,
}

impl Tracker {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::with_clock(Database::open(path)?, Box::new(SystemClock)))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_clock(
            Database::open_in_memory()?,
            Box::new(SystemClock),
        ))
    }

    #[must_use]
    pub fn with_clock(db: Database, clock: Box<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn aggregates(&self) -> AggregateManager<'_> {
        AggregateManager::new(&self.db)
    }

    fn settings_repo(&self) -> SettingsRepository<'_> {
        SettingsRepository::new(&self.db)
    }

    pub fn settings(&self) -> Result<Settings> {
        self.settings_repo().get()
    }

    // --- Log entries ---

    fn build_entry(&self, new: NewFoodLogEntry) -> Result<FoodLogEntry> {
        let timestamp = new.timestamp.unwrap_or_else(|| self.clock.now_millis());
        let date = match (new.date, new.timestamp) {
            (Some(date), _) => date,
            (None, Some(ts)) => local_date_of_millis(ts)?,
            (None, None) => self.clock.today(),
        };
        Ok(FoodLogEntry {
            id: Uuid::new_v4().to_string(),
            date: date_key(date),
            timestamp,
            food_id: new.food_id,
            food_name: new.food_name,
            brand_name: new.brand_name,
            serving_size: new.serving_size,
            calories: new.calories,
            protein: new.protein,
            carbs: new.carbs,
            fat: new.fat,
        })
    }

    /// Write the entry, then fold its values into its day. Caller owns the transaction.
    fn log_entry(db: &Database, entry: &FoodLogEntry, settings: &Settings) -> Result<()> {
        db.put(entry)?;
        let aggregates = AggregateManager::new(db);
        aggregates.ensure_day(&entry.date, settings)?;
        aggregates.apply_delta(&entry.date, entry.macros())?;
        Ok(())
    }

    pub fn add_food_to_log(&self, new: NewFoodLogEntry) -> Result<FoodLogEntry> {
        let entry = self.build_entry(new)?;
        self.db.atomically(|db| {
            let settings = SettingsRepository::new(db).get()?;
            Self::log_entry(db, &entry, &settings)
        })?;
        info!(
            id = %entry.id,
            date = %entry.date,
            food = %entry.food_name,
            calories = entry.calories,
            "logged food"
        );
        Ok(entry)
    }

    /// Log several entries at once (e.g. the ingredients of an analyzed meal).
    /// Either all of them are written or none.
    pub fn add_foods_to_log(&self, new: Vec<NewFoodLogEntry>) -> Result<Vec<FoodLogEntry>> {
        let entries = new
            .into_iter()
            .map(|n| self.build_entry(n))
            .collect::<Result<Vec<_>>>()?;
        self.db.atomically(|db| {
            let settings = SettingsRepository::new(db).get()?;
            for entry in &entries {
                Self::log_entry(db, entry, &settings)?;
            }
            Ok(())
        })?;
        info!(count = entries.len(), "logged foods");
        Ok(entries)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<FoodLogEntry>> {
        self.db.get(id)
    }

    /// Delete an entry and subtract its values from its own day.
    /// Returns `false` when no entry has this id.
    pub fn remove_food_from_log(&self, id: &str) -> Result<bool> {
        let Some(entry) = self.db.get::<FoodLogEntry>(id)? else {
            debug!(id, "remove: no such entry");
            return Ok(false);
        };

        self.db.atomically(|db| {
            db.delete::<FoodLogEntry>(&entry.id)?;
            let aggregates = AggregateManager::new(db);
            match aggregates.apply_delta(&entry.date, -entry.macros()) {
                Ok(_) => Ok(()),
                Err(LedgerError::AggregateNotFound { .. }) => {
                    // Day was never materialized; build it from what remains.
                    let settings = SettingsRepository::new(db).get()?;
                    let remaining: Vec<FoodLogEntry> =
                        db.get_all_by_index(Index::Date, &entry.date)?;
                    aggregates
                        .recompute(&entry.date, &remaining, &settings, false)
                        .map(|_| ())
                }
                Err(e) => Err(e),
            }
        })?;
        info!(id, date = %entry.date, "removed food");
        Ok(true)
    }

    pub fn entries_for(&self, date: NaiveDate) -> Result<Vec<FoodLogEntry>> {
        self.db.get_all_by_index(Index::Date, &date_key(date))
    }

    // --- Reads ---

    pub fn get_today_view(&self) -> Result<DayView> {
        self.get_day_view(self.today())
    }

    /// Aggregate and entries for `date`, creating the day if it is new.
    pub fn get_day_view(&self, date: NaiveDate) -> Result<DayView> {
        let key = date_key(date);
        let settings = self.settings()?;
        let aggregate = self.aggregates().ensure_day(&key, &settings)?;
        let entries = self.db.get_all_by_index(Index::Date, &key)?;
        Ok(DayView { aggregate, entries })
    }

    /// Existing aggregates for the last `days` days including today, newest first.
    pub fn history(&self, days: u32) -> Result<Vec<DailyAggregate>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let to = self.today();
        let from = to
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        self.db.aggregates_between(&date_key(from), &date_key(to))
    }

    // --- Goals & preferences ---

    /// Merge `update` into settings. Today's aggregate, if it already exists,
    /// takes the new targets; earlier days keep their snapshot.
    pub fn update_goals(&self, update: &GoalsUpdate) -> Result<Settings> {
        validate_goals(update)?;
        let today = date_key(self.today());
        let settings = self.db.atomically(|db| {
            let repo = SettingsRepository::new(db);
            let mut settings = repo.get()?;
            update.apply_to_settings(&mut settings);
            repo.save(&settings)?;

            if let Some(mut aggregate) = AggregateManager::new(db).get(&today)? {
                update.apply_to_targets(&mut aggregate);
                db.put(&aggregate)?;
            }
            Ok(settings)
        })?;
        info!(?update, "updated goals");
        Ok(settings)
    }

    pub fn set_preferences(&self, theme: Option<Theme>, units: Option<Units>) -> Result<Settings> {
        let repo = self.settings_repo();
        let mut settings = repo.get()?;
        if let Some(theme) = theme {
            settings.theme = theme;
        }
        if let Some(units) = units {
            settings.units = units;
        }
        repo.save(&settings)?;
        Ok(settings)
    }

    // --- Integrity ---

    /// Rebuild a day's totals from its stored entries.
    pub fn repair_day(&self, date: NaiveDate) -> Result<DailyAggregate> {
        let key = date_key(date);
        let aggregate = self.db.atomically(|db| {
            let settings = SettingsRepository::new(db).get()?;
            let entries: Vec<FoodLogEntry> = db.get_all_by_index(Index::Date, &key)?;
            AggregateManager::new(db).recompute(&key, &entries, &settings, false)
        })?;
        info!(date = %key, calories = aggregate.current_calories, "repaired day");
        Ok(aggregate)
    }

    // --- Export / Import ---

    pub fn export_all(&self) -> Result<ExportData> {
        Ok(ExportData {
            version: EXPORT_VERSION,
            exported_at: self.clock.now().to_rfc3339(),
            food_logs: self.db.get_all()?,
            daily_tracking: self.db.get_all()?,
            user_settings: self.db.get(SETTINGS_ID)?,
        })
    }

    /// Restore a snapshot. Legacy unpadded dates are normalized and every
    /// touched day is recomputed from its entries.
    pub fn import_all(&self, data: &ExportData) -> Result<ImportSummary> {
        let summary = self.db.atomically(|db| {
            let mut summary = ImportSummary::default();
            let mut touched: BTreeSet<String> = BTreeSet::new();

            if let Some(settings) = &data.user_settings {
                SettingsRepository::new(db).save(settings)?;
                summary.settings = true;
            }

            for entry in &data.food_logs {
                let mut entry = entry.clone();
                let date = normalize_date_key(&entry.date)?;
                if date != entry.date {
                    summary.normalized_dates += 1;
                    entry.date = date;
                }
                // An entry moved to another day leaves its old day to rebuild too.
                if let Some(previous) = db.get::<FoodLogEntry>(&entry.id)? {
                    touched.insert(previous.date);
                }
                db.put(&entry)?;
                touched.insert(entry.date);
                summary.entries += 1;
            }

            for aggregate in &data.daily_tracking {
                let date = normalize_date_key(&aggregate.date)?;
                if date != aggregate.date {
                    summary.normalized_dates += 1;
                }
                let mut restored = aggregate.clone();
                restored.id = daily_id(&date);
                restored.date.clone_from(&date);
                // Totals are rebuilt from entries below.
                restored.set_totals(Macros::ZERO);
                db.put(&restored)?;
                touched.insert(date);
                summary.days += 1;
            }

            let settings = SettingsRepository::new(db).get()?;
            let aggregates = AggregateManager::new(db);
            for date in &touched {
                let entries: Vec<FoodLogEntry> = db.get_all_by_index(Index::Date, date)?;
                aggregates.recompute(date, &entries, &settings, false)?;
            }
            Ok(summary)
        })?;
        info!(
            entries = summary.entries,
            days = summary.days,
            normalized = summary.normalized_dates,
            "imported ledger"
        );
        Ok(summary)
    }
}

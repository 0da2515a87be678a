use tracing::{debug, warn};

use crate::db::{Database, Index};
use crate::error::{LedgerError, Result};
use crate::models::{DailyAggregate, FoodLogEntry, Macros, Settings, daily_id};

/// Below this a running total is treated as drift rather than float noise.
const DRIFT_TOLERANCE: f64 = 0.05;

/// Keeps each day's running totals in step with its log entries.
///
/// Holds no state of its own; every value lives in the store.
pub struct AggregateManager<'db> {
    db: &'db Database,
}

impl<'db> AggregateManager<'db> {
    #[must_use]
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    pub fn get(&self, date: &str) -> Result<Option<DailyAggregate>> {
        self.db.get(&daily_id(date))
    }

    /// Existing aggregate for `date`, or a new zeroed one seeded from `settings`.
    pub fn ensure_day(&self, date: &str, settings: &Settings) -> Result<DailyAggregate> {
        let seeded = DailyAggregate::seeded(date, settings);
        if self.db.insert_aggregate_if_absent(&seeded)? {
            debug!(date, "created daily aggregate");
        }
        let found: Vec<DailyAggregate> = self.db.get_all_by_index(Index::Date, &date)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::AggregateNotFound {
                date: date.to_string(),
            })
    }

    /// Add `delta` (negative for removals) to the day's totals.
    pub fn apply_delta(&self, date: &str, delta: Macros) -> Result<DailyAggregate> {
        if !delta.is_finite() {
            return Err(LedgerError::validation("Delta values must be finite"));
        }
        let mut aggregate = self
            .get(date)?
            .ok_or_else(|| LedgerError::AggregateNotFound {
                date: date.to_string(),
            })?;

        let next = aggregate.totals() + delta;
        if [next.calories, next.protein, next.carbs, next.fat]
            .iter()
            .any(|v| *v < -DRIFT_TOLERANCE)
        {
            warn!(
                date,
                calories = next.calories,
                protein = next.protein,
                carbs = next.carbs,
                fat = next.fat,
                "daily totals went negative; the day needs a repair"
            );
        }
        aggregate.set_totals(Macros::new(
            next.calories.max(0.0),
            next.protein.max(0.0),
            next.carbs.max(0.0),
            next.fat.max(0.0),
        ));
        self.db.put(&aggregate)?;
        Ok(aggregate)
    }

    /// Rebuild the day's totals as the exact sum of `entries`.
    ///
    /// Targets are kept unless `reset_targets` is set, in which case they are
    /// re-copied from `settings`. A missing day is created from `settings`.
    pub fn recompute(
        &self,
        date: &str,
        entries: &[FoodLogEntry],
        settings: &Settings,
        reset_targets: bool,
    ) -> Result<DailyAggregate> {
        if let Some(stray) = entries.iter().find(|e| e.date != date) {
            return Err(LedgerError::validation(format!(
                "Entry '{}' belongs to {}, not {date}",
                stray.id, stray.date
            )));
        }

        let mut aggregate = self
            .get(date)?
            .unwrap_or_else(|| DailyAggregate::seeded(date, settings));
        if reset_targets {
            aggregate.copy_targets(settings);
        }
        let totals: Macros = entries.iter().map(FoodLogEntry::macros).sum();
        aggregate.set_totals(totals);
        self.db.put(&aggregate)?;
        debug!(date, entries = entries.len(), "recomputed daily aggregate");
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "2024-06-15";

    fn entry(id: &str, calories: f64, protein: f64, carbs: f64, fat: f64) -> FoodLogEntry {
        FoodLogEntry {
            id: id.to_string(),
            date: DATE.to_string(),
            timestamp: 0,
            food_id: 7,
            food_name: "Oatmeal".to_string(),
            brand_name: None,
            serving_size: "1 bowl".to_string(),
            calories,
            protein,
            carbs,
            fat,
        }
    }

    #[test]
    fn test_ensure_day_seeds_from_settings() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let settings = Settings {
            calorie_goal: 1800.0,
            ..Settings::default()
        };

        let agg = mgr.ensure_day(DATE, &settings).unwrap();
        assert_eq!(agg.date, DATE);
        assert!((agg.calorie_target - 1800.0).abs() < f64::EPSILON);
        assert_eq!(agg.totals(), Macros::ZERO);
    }

    #[test]
    fn test_ensure_day_no_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let settings = Settings::default();

        mgr.ensure_day(DATE, &settings).unwrap();
        mgr.apply_delta(DATE, Macros::new(100.0, 1.0, 2.0, 3.0))
            .unwrap();

        // A later call with different goals must return the existing row untouched
        let changed = Settings {
            calorie_goal: 3000.0,
            ..Settings::default()
        };
        let agg = mgr.ensure_day(DATE, &changed).unwrap();
        assert!((agg.calorie_target - 2000.0).abs() < f64::EPSILON);
        assert!((agg.current_calories - 100.0).abs() < f64::EPSILON);
        assert_eq!(db.count::<DailyAggregate>().unwrap(), 1);
    }

    #[test]
    fn test_apply_delta_requires_day() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let err = mgr.apply_delta(DATE, Macros::new(1.0, 0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, LedgerError::AggregateNotFound { date } if date == DATE));
    }

    #[test]
    fn test_apply_delta_add_and_remove() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        mgr.ensure_day(DATE, &Settings::default()).unwrap();

        let delta = Macros::new(200.0, 2.0, 22.0, 11.0);
        let agg = mgr.apply_delta(DATE, delta).unwrap();
        assert!((agg.current_calories - 200.0).abs() < f64::EPSILON);
        assert!((agg.current_fat - 11.0).abs() < f64::EPSILON);

        let agg = mgr.apply_delta(DATE, -delta).unwrap();
        assert!(agg.current_calories.abs() < 1e-9);
        assert!(agg.current_protein.abs() < 1e-9);
        assert!(agg.current_carbs.abs() < 1e-9);
        assert!(agg.current_fat.abs() < 1e-9);
    }

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        mgr.ensure_day(DATE, &Settings::default()).unwrap();
        mgr.apply_delta(DATE, Macros::new(0.1, 0.1, 0.1, 0.1))
            .unwrap();

        let agg = mgr
            .apply_delta(DATE, Macros::new(-0.3, -0.3, -0.3, -0.3))
            .unwrap();
        assert_eq!(agg.totals(), Macros::ZERO);
    }

    #[test]
    fn test_apply_delta_rejects_nan() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        mgr.ensure_day(DATE, &Settings::default()).unwrap();
        let err = mgr
            .apply_delta(DATE, Macros::new(f64::NAN, 0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_recompute_matches_sequential_deltas() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let settings = Settings::default();
        let entries = vec![
            entry("a", 120.0, 4.3, 18.7, 2.1),
            entry("b", 95.0, 0.3, 25.1, 0.2),
            entry("c", 410.0, 31.6, 0.0, 29.9),
            entry("d", 33.0, 1.1, 7.7, 0.1),
        ];

        mgr.ensure_day(DATE, &settings).unwrap();
        for e in &entries {
            mgr.apply_delta(DATE, e.macros()).unwrap();
        }
        let sequential = mgr.get(DATE).unwrap().unwrap();

        let rebuilt = mgr.recompute(DATE, &entries, &settings, false).unwrap();
        let (s, r) = (sequential.totals(), rebuilt.totals());
        assert!((s.calories - r.calories).abs() < 1e-6);
        assert!((s.protein - r.protein).abs() < 0.05);
        assert!((s.carbs - r.carbs).abs() < 0.05);
        assert!((s.fat - r.fat).abs() < 0.05);
    }

    #[test]
    fn test_recompute_keeps_targets_unless_asked() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        mgr.ensure_day(DATE, &Settings::default()).unwrap();

        let new_goals = Settings {
            calorie_goal: 2600.0,
            ..Settings::default()
        };
        let entries = vec![entry("a", 500.0, 10.0, 50.0, 20.0)];

        let kept = mgr.recompute(DATE, &entries, &new_goals, false).unwrap();
        assert!((kept.calorie_target - 2000.0).abs() < f64::EPSILON);
        assert!((kept.current_calories - 500.0).abs() < f64::EPSILON);

        let reset = mgr.recompute(DATE, &entries, &new_goals, true).unwrap();
        assert!((reset.calorie_target - 2600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recompute_creates_missing_day() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let agg = mgr
            .recompute(DATE, &[entry("a", 250.0, 5.0, 30.0, 9.0)], &Settings::default(), false)
            .unwrap();
        assert!((agg.current_calories - 250.0).abs() < f64::EPSILON);
        assert!(mgr.get(DATE).unwrap().is_some());
    }

    #[test]
    fn test_recompute_rejects_other_dates() {
        let db = Database::open_in_memory().unwrap();
        let mgr = AggregateManager::new(&db);
        let mut stray = entry("a", 250.0, 5.0, 30.0, 9.0);
        stray.date = "2024-06-16".to_string();
        let err = mgr
            .recompute(DATE, &[stray], &Settings::default(), false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}

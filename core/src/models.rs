use std::fmt;
use std::ops::{Add, Neg};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const SETTINGS_ID: &str = "main";

/// Canonical day key: zero-padded `YYYY-MM-DD` in local time.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a day key. Also accepts the legacy unpadded form (`2024-6-5`).
pub fn parse_date_key(s: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    let [y, m, d] = parts.as_slice() else {
        return Err(LedgerError::validation(format!(
            "Invalid date '{s}'. Must be YYYY-MM-DD"
        )));
    };
    let parsed = match (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>()) {
        (Ok(y), Ok(m), Ok(d)) if y > 0 => NaiveDate::from_ymd_opt(y, m, d),
        _ => None,
    };
    parsed.ok_or_else(|| LedgerError::validation(format!("Invalid date '{s}'. Must be YYYY-MM-DD")))
}

/// Rewrite any accepted day key into the canonical form.
pub fn normalize_date_key(s: &str) -> Result<String> {
    parse_date_key(s).map(date_key)
}

#[must_use]
pub fn daily_id(date: &str) -> String {
    format!("daily_{date}")
}

/// Round a gram value to one decimal place.
#[must_use]
pub fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Calories and macros in grams, used both as a running total and as a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub const ZERO: Macros = Macros {
        calories: 0.0,
        protein: 0.0,
        carbs: 0.0,
        fat: 0.0,
    };

    #[must_use]
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.calories.is_finite()
            && self.protein.is_finite()
            && self.carbs.is_finite()
            && self.fat.is_finite()
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Neg for Macros {
    type Output = Macros;

    fn neg(self) -> Macros {
        Macros {
            calories: -self.calories,
            protein: -self.protein,
            carbs: -self.carbs,
            fat: -self.fat,
        }
    }
}

impl std::iter::Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::ZERO, Add::add)
    }
}

/// One logged food occurrence. Values are already scaled to the chosen
/// serving and quantity. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodLogEntry {
    pub id: String,
    pub date: String,
    /// Creation instant, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub food_id: i64,
    pub food_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    pub serving_size: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl FoodLogEntry {
    #[must_use]
    pub fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fat)
    }
}

/// Entry as submitted by the caller; `id` is generated and `date`/`timestamp`
/// default to the current local time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewFoodLogEntry {
    pub date: Option<NaiveDate>,
    pub timestamp: Option<i64>,
    pub food_id: i64,
    pub food_name: String,
    pub brand_name: Option<String>,
    pub serving_size: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Per-day running totals plus the goals snapshotted when the day was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub id: String,
    pub date: String,
    pub calorie_target: f64,
    pub protein_target: f64,
    pub carbs_target: f64,
    pub fat_target: f64,
    pub current_calories: f64,
    pub current_protein: f64,
    pub current_carbs: f64,
    pub current_fat: f64,
}

impl DailyAggregate {
    /// Fresh day with zero totals and targets copied from `settings`.
    #[must_use]
    pub fn seeded(date: &str, settings: &Settings) -> Self {
        let mut aggregate = DailyAggregate {
            id: daily_id(date),
            date: date.to_string(),
            calorie_target: 0.0,
            protein_target: 0.0,
            carbs_target: 0.0,
            fat_target: 0.0,
            current_calories: 0.0,
            current_protein: 0.0,
            current_carbs: 0.0,
            current_fat: 0.0,
        };
        aggregate.copy_targets(settings);
        aggregate
    }

    pub fn copy_targets(&mut self, settings: &Settings) {
        self.calorie_target = settings.calorie_goal;
        self.protein_target = settings.protein_goal;
        self.carbs_target = settings.carbs_goal;
        self.fat_target = settings.fat_goal;
    }

    #[must_use]
    pub fn totals(&self) -> Macros {
        Macros::new(
            self.current_calories,
            self.current_protein,
            self.current_carbs,
            self.current_fat,
        )
    }

    pub fn set_totals(&mut self, totals: Macros) {
        self.current_calories = totals.calories;
        self.current_protein = totals.protein;
        self.current_carbs = totals.carbs;
        self.current_fat = totals.fat;
    }

    #[must_use]
    pub fn targets(&self) -> Macros {
        Macros::new(
            self.calorie_target,
            self.protein_target,
            self.carbs_target,
            self.fat_target,
        )
    }

    /// Target minus current; negative when a goal is exceeded.
    #[must_use]
    pub fn remaining(&self) -> Macros {
        self.targets() + -self.totals()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl FromStr for Theme {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => Err(LedgerError::validation(format!(
                "Invalid theme '{s}'. Must be one of: light, dark, system"
            ))),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

impl FromStr for Units {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(LedgerError::validation(format!(
                "Invalid units '{s}'. Must be one of: metric, imperial"
            ))),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub theme: Theme,
    pub units: Units,
    pub calorie_goal: f64,
    pub protein_goal: f64,
    pub carbs_goal: f64,
    pub fat_goal: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            id: SETTINGS_ID.to_string(),
            theme: Theme::System,
            units: Units::Metric,
            calorie_goal: 2000.0,
            protein_goal: 150.0,
            carbs_goal: 300.0,
            fat_goal: 70.0,
        }
    }
}

/// Partial goal change; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsUpdate {
    pub calorie_goal: Option<f64>,
    pub protein_goal: Option<f64>,
    pub carbs_goal: Option<f64>,
    pub fat_goal: Option<f64>,
}

impl GoalsUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calorie_goal.is_none()
            && self.protein_goal.is_none()
            && self.carbs_goal.is_none()
            && self.fat_goal.is_none()
    }

    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(v) = self.calorie_goal {
            settings.calorie_goal = v;
        }
        if let Some(v) = self.protein_goal {
            settings.protein_goal = v;
        }
        if let Some(v) = self.carbs_goal {
            settings.carbs_goal = v;
        }
        if let Some(v) = self.fat_goal {
            settings.fat_goal = v;
        }
    }

    pub fn apply_to_targets(&self, aggregate: &mut DailyAggregate) {
        if let Some(v) = self.calorie_goal {
            aggregate.calorie_target = v;
        }
        if let Some(v) = self.protein_goal {
            aggregate.protein_target = v;
        }
        if let Some(v) = self.carbs_goal {
            aggregate.carbs_target = v;
        }
        if let Some(v) = self.fat_goal {
            aggregate.fat_target = v;
        }
    }
}

/// A day's aggregate together with the entries behind it.
#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub aggregate: DailyAggregate,
    pub entries: Vec<FoodLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: u32,
    pub exported_at: String,
    #[serde(default)]
    pub food_logs: Vec<FoodLogEntry>,
    #[serde(default)]
    pub daily_tracking: Vec<DailyAggregate>,
    #[serde(default)]
    pub user_settings: Option<Settings>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub entries: i64,
    pub days: i64,
    pub settings: bool,
    pub normalized_dates: i64,
}

// --- Validation ---

fn validate_amount(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() {
        return Err(LedgerError::validation(format!("{name} must be a finite number")));
    }
    if v < 0.0 {
        return Err(LedgerError::validation(format!("{name} must not be negative")));
    }
    Ok(())
}

fn validate_canonical_date(date: &str) -> Result<()> {
    if normalize_date_key(date)? != date {
        return Err(LedgerError::validation(format!(
            "Date '{date}' is not canonical. Must be zero-padded YYYY-MM-DD"
        )));
    }
    Ok(())
}

pub fn validate_entry(entry: &FoodLogEntry) -> Result<()> {
    if entry.id.trim().is_empty() {
        return Err(LedgerError::validation("Entry id must not be empty"));
    }
    validate_canonical_date(&entry.date)?;
    if entry.food_name.trim().is_empty() {
        return Err(LedgerError::validation("Food name must not be empty"));
    }
    validate_amount("calories", entry.calories)?;
    validate_amount("protein", entry.protein)?;
    validate_amount("carbs", entry.carbs)?;
    validate_amount("fat", entry.fat)?;
    Ok(())
}

pub fn validate_aggregate(aggregate: &DailyAggregate) -> Result<()> {
    validate_canonical_date(&aggregate.date)?;
    if aggregate.id != daily_id(&aggregate.date) {
        return Err(LedgerError::validation(format!(
            "Aggregate id '{}' does not match date '{}'",
            aggregate.id, aggregate.date
        )));
    }
    validate_amount("calorieTarget", aggregate.calorie_target)?;
    validate_amount("proteinTarget", aggregate.protein_target)?;
    validate_amount("carbsTarget", aggregate.carbs_target)?;
    validate_amount("fatTarget", aggregate.fat_target)?;
    validate_amount("currentCalories", aggregate.current_calories)?;
    validate_amount("currentProtein", aggregate.current_protein)?;
    validate_amount("currentCarbs", aggregate.current_carbs)?;
    validate_amount("currentFat", aggregate.current_fat)?;
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.id != SETTINGS_ID {
        return Err(LedgerError::validation(format!(
            "Settings id must be '{SETTINGS_ID}' (got '{}')",
            settings.id
        )));
    }
    validate_goals(&GoalsUpdate {
        calorie_goal: Some(settings.calorie_goal),
        protein_goal: Some(settings.protein_goal),
        carbs_goal: Some(settings.carbs_goal),
        fat_goal: Some(settings.fat_goal),
    })
}

pub fn validate_goals(goals: &GoalsUpdate) -> Result<()> {
    if let Some(v) = goals.calorie_goal {
        validate_amount("calorieGoal", v)?;
        if v == 0.0 {
            return Err(LedgerError::validation("calorieGoal must be greater than 0"));
        }
    }
    if let Some(v) = goals.protein_goal {
        validate_amount("proteinGoal", v)?;
    }
    if let Some(v) = goals.carbs_goal {
        validate_amount("carbsGoal", v)?;
    }
    if let Some(v) = goals.fat_goal {
        validate_amount("fatGoal", v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> FoodLogEntry {
        FoodLogEntry {
            id: "e1".to_string(),
            date: "2024-06-15".to_string(),
            timestamp: 1_718_445_600_000,
            food_id: 42,
            food_name: "Greek Yogurt".to_string(),
            brand_name: None,
            serving_size: "1 cup".to_string(),
            calories: 200.0,
            protein: 2.0,
            carbs: 22.0,
            fat: 11.0,
        }
    }

    #[test]
    fn test_date_key_zero_pads() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert_eq!(date_key(date), "2024-06-05");
    }

    #[test]
    fn test_parse_date_key_legacy() {
        assert_eq!(normalize_date_key("2024-6-5").unwrap(), "2024-06-05");
        assert_eq!(normalize_date_key("2024-12-25").unwrap(), "2024-12-25");
    }

    #[test]
    fn test_parse_date_key_invalid() {
        assert!(parse_date_key("2024-13-01").is_err());
        assert!(parse_date_key("2024/06/05").is_err());
        assert!(parse_date_key("nope").is_err());
        assert!(parse_date_key("").is_err());
    }

    #[test]
    fn test_macros_arithmetic() {
        let a = Macros::new(200.0, 2.0, 22.0, 11.0);
        let b = Macros::new(300.0, 10.0, 5.0, 1.5);
        let sum = a + b;
        assert!((sum.calories - 500.0).abs() < f64::EPSILON);
        assert!((sum.fat - 12.5).abs() < f64::EPSILON);

        let back = sum + -b;
        assert!((back.protein - 2.0).abs() < 1e-9);

        let total: Macros = vec![a, b].into_iter().sum();
        assert_eq!(total, sum);
    }

    #[test]
    fn test_round_to_tenth() {
        assert!((round_to_tenth(3.14159) - 3.1).abs() < 1e-9);
        assert!((round_to_tenth(2.25) - 2.3).abs() < 1e-9);
        assert!((round_to_tenth(0.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_seeded_aggregate() {
        let settings = Settings::default();
        let agg = DailyAggregate::seeded("2024-06-15", &settings);
        assert_eq!(agg.id, "daily_2024-06-15");
        assert!((agg.calorie_target - 2000.0).abs() < f64::EPSILON);
        assert!((agg.fat_target - 70.0).abs() < f64::EPSILON);
        assert_eq!(agg.totals(), Macros::ZERO);

        let remaining = agg.remaining();
        assert!((remaining.protein - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.id, "main");
        assert_eq!(s.theme, Theme::System);
        assert_eq!(s.units, Units::Metric);
        assert!((s.carbs_goal - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_theme_units_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!("imperial".parse::<Units>().unwrap(), Units::Imperial);
        assert!("sepia".parse::<Theme>().is_err());
        assert!("furlongs".parse::<Units>().is_err());
        assert_eq!(Theme::System.to_string(), "system");
    }

    #[test]
    fn test_goals_update_partial() {
        let mut s = Settings::default();
        let update = GoalsUpdate {
            calorie_goal: Some(2500.0),
            ..GoalsUpdate::default()
        };
        assert!(!update.is_empty());
        update.apply_to_settings(&mut s);
        assert!((s.calorie_goal - 2500.0).abs() < f64::EPSILON);
        assert!((s.protein_goal - 150.0).abs() < f64::EPSILON);
        assert!(GoalsUpdate::default().is_empty());
    }

    #[test]
    fn test_validate_entry() {
        assert!(validate_entry(&sample_entry()).is_ok());

        let mut e = sample_entry();
        e.food_name = "  ".to_string();
        assert!(validate_entry(&e).is_err());

        let mut e = sample_entry();
        e.calories = -1.0;
        assert!(validate_entry(&e).is_err());

        let mut e = sample_entry();
        e.fat = f64::NAN;
        assert!(validate_entry(&e).is_err());

        let mut e = sample_entry();
        e.date = "2024-6-15".to_string();
        assert!(validate_entry(&e).is_err());

        let mut e = sample_entry();
        e.id = String::new();
        assert!(validate_entry(&e).is_err());
    }

    #[test]
    fn test_validate_aggregate_id_mismatch() {
        let mut agg = DailyAggregate::seeded("2024-06-15", &Settings::default());
        assert!(validate_aggregate(&agg).is_ok());
        agg.id = "daily_2024-06-16".to_string();
        assert!(validate_aggregate(&agg).is_err());
    }

    #[test]
    fn test_validate_settings() {
        assert!(validate_settings(&Settings::default()).is_ok());

        let mut s = Settings::default();
        s.calorie_goal = 0.0;
        assert!(validate_settings(&s).is_err());

        let mut s = Settings::default();
        s.id = "other".to_string();
        assert!(validate_settings(&s).is_err());
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(json["foodName"], "Greek Yogurt");
        assert_eq!(json["servingSize"], "1 cup");
        assert!(json.get("brandName").is_none());
    }
}

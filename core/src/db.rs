use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::models::{
    DailyAggregate, FoodLogEntry, Settings, validate_aggregate, validate_entry, validate_settings,
};

const SCHEMA_VERSION: i64 = 2;

/// Logical tables of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    FoodLogs,
    DailyTracking,
    UserSettings,
}

impl Table {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Table::FoodLogs => "food_logs",
            Table::DailyTracking => "daily_tracking",
            Table::UserSettings => "user_settings",
        }
    }
}

/// Secondary indexes available for `get_all_by_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    Date,
    Timestamp,
}

impl Index {
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Index::Date => "date",
            Index::Timestamp => "timestamp",
        }
    }
}

/// A row type stored in one of the ledger tables.
pub trait Record: Sized {
    const TABLE: Table;
    const KIND: &'static str;
    const INDEXES: &'static [Index];
    /// Column list in the order `from_row` and `upsert` expect.
    const COLUMNS: &'static str;

    fn key(&self) -> &str;
    fn validate(&self) -> Result<()>;
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

impl Record for FoodLogEntry {
    const TABLE: Table = Table::FoodLogs;
    const KIND: &'static str = "food log entry";
    const INDEXES: &'static [Index] = &[Index::Date, Index::Timestamp];
    const COLUMNS: &'static str = "id, date, timestamp, food_id, food_name, brand_name, serving_size, calories, protein, carbs, fat";

    fn key(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_entry(self)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(FoodLogEntry {
            id: row.get(0)?,
            date: row.get(1)?,
            timestamp: row.get(2)?,
            food_id: row.get(3)?,
            food_name: row.get(4)?,
            brand_name: row.get(5)?,
            serving_size: row.get(6)?,
            calories: row.get(7)?,
            protein: row.get(8)?,
            carbs: row.get(9)?,
            fat: row.get(10)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO food_logs (id, date, timestamp, food_id, food_name, brand_name, serving_size, calories, protein, carbs, fat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                date = excluded.date, timestamp = excluded.timestamp, food_id = excluded.food_id,
                food_name = excluded.food_name, brand_name = excluded.brand_name,
                serving_size = excluded.serving_size, calories = excluded.calories,
                protein = excluded.protein, carbs = excluded.carbs, fat = excluded.fat",
            params![
                self.id,
                self.date,
                self.timestamp,
                self.food_id,
                self.food_name,
                self.brand_name,
                self.serving_size,
                self.calories,
                self.protein,
                self.carbs,
                self.fat,
            ],
        )
    }
}

impl Record for DailyAggregate {
    const TABLE: Table = Table::DailyTracking;
    const KIND: &'static str = "daily aggregate";
    const INDEXES: &'static [Index] = &[Index::Date];
    const COLUMNS: &'static str = "id, date, calorie_target, protein_target, carbs_target, fat_target, current_calories, current_protein, current_carbs, current_fat";

    fn key(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_aggregate(self)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DailyAggregate {
            id: row.get(0)?,
            date: row.get(1)?,
            calorie_target: row.get(2)?,
            protein_target: row.get(3)?,
            carbs_target: row.get(4)?,
            fat_target: row.get(5)?,
            current_calories: row.get(6)?,
            current_protein: row.get(7)?,
            current_carbs: row.get(8)?,
            current_fat: row.get(9)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO daily_tracking (id, date, calorie_target, protein_target, carbs_target, fat_target,
                                         current_calories, current_protein, current_carbs, current_fat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                calorie_target = excluded.calorie_target, protein_target = excluded.protein_target,
                carbs_target = excluded.carbs_target, fat_target = excluded.fat_target,
                current_calories = excluded.current_calories, current_protein = excluded.current_protein,
                current_carbs = excluded.current_carbs, current_fat = excluded.current_fat",
            params![
                self.id,
                self.date,
                self.calorie_target,
                self.protein_target,
                self.carbs_target,
                self.fat_target,
                self.current_calories,
                self.current_protein,
                self.current_carbs,
                self.current_fat,
            ],
        )
    }
}

fn text_conversion_error(idx: usize, e: crate::error::LedgerError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

impl Record for Settings {
    const TABLE: Table = Table::UserSettings;
    const KIND: &'static str = "settings";
    const INDEXES: &'static [Index] = &[];
    const COLUMNS: &'static str =
        "id, theme, units, calorie_goal, protein_goal, carbs_goal, fat_goal";

    fn key(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let theme: String = row.get(1)?;
        let units: String = row.get(2)?;
        Ok(Settings {
            id: row.get(0)?,
            theme: theme.parse().map_err(|e| text_conversion_error(1, e))?,
            units: units.parse().map_err(|e| text_conversion_error(2, e))?,
            calorie_goal: row.get(3)?,
            protein_goal: row.get(4)?,
            carbs_goal: row.get(5)?,
            fat_goal: row.get(6)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO user_settings (id, theme, units, calorie_goal, protein_goal, carbs_goal, fat_goal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                theme = excluded.theme, units = excluded.units,
                calorie_goal = excluded.calorie_goal, protein_goal = excluded.protein_goal,
                carbs_goal = excluded.carbs_goal, fat_goal = excluded.fat_goal",
            params![
                self.id,
                self.theme.as_str(),
                self.units.as_str(),
                self.calorie_goal,
                self.protein_goal,
                self.carbs_goal,
                self.fat_goal,
            ],
        )
    }
}

/// Record Store: owns the SQLite connection and every persisted table.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init()?;
        debug!(path = %path.display(), "opened ledger database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init()?;
        Ok(db)
    }

    /// Flush and release the connection.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| LedgerError::Storage(e))
    }

    /// Idempotent schema setup; each step only creates what is missing.
    pub fn init(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_logs (
                    id TEXT PRIMARY KEY NOT NULL,
                    date TEXT NOT NULL,
                    timestamp INTEGER NOT NULL,
                    food_id INTEGER NOT NULL,
                    food_name TEXT NOT NULL,
                    brand_name TEXT,
                    serving_size TEXT NOT NULL,
                    calories REAL NOT NULL,
                    protein REAL NOT NULL,
                    carbs REAL NOT NULL,
                    fat REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_tracking (
                    id TEXT PRIMARY KEY NOT NULL,
                    date TEXT NOT NULL UNIQUE,
                    calorie_target REAL NOT NULL,
                    protein_target REAL NOT NULL,
                    carbs_target REAL NOT NULL,
                    fat_target REAL NOT NULL,
                    current_calories REAL NOT NULL DEFAULT 0,
                    current_protein REAL NOT NULL DEFAULT 0,
                    current_carbs REAL NOT NULL DEFAULT 0,
                    current_fat REAL NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    id TEXT PRIMARY KEY NOT NULL,
                    theme TEXT NOT NULL,
                    units TEXT NOT NULL,
                    calorie_goal REAL NOT NULL,
                    protein_goal REAL NOT NULL,
                    carbs_goal REAL NOT NULL,
                    fat_goal REAL NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_logs_date ON food_logs(date);

                PRAGMA user_version = 1;",
            )?;
            info!("ledger schema created (v1)");
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_food_logs_timestamp ON food_logs(timestamp);
                 PRAGMA user_version = 2;",
            )?;
            info!("ledger schema migrated to v{SCHEMA_VERSION}");
        }

        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Run `f` inside one transaction. Any error rolls back every write made by `f`.
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // --- Generic record operations ---

    /// Insert or overwrite by primary key. The row keeps its original
    /// insertion position when overwritten.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        record.validate()?;
        record.upsert(&self.conn)?;
        debug!(table = R::TABLE.name(), key = record.key(), "put");
        Ok(())
    }

    pub fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            R::COLUMNS,
            R::TABLE.name()
        );
        Ok(self
            .conn
            .query_row(&sql, params![key], |row| R::from_row(row))
            .optional()?)
    }

    /// Like `get`, but absence is a `NotFound` error.
    pub fn require<R: Record>(&self, key: &str) -> Result<R> {
        self.get(key)?.ok_or_else(|| LedgerError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        })
    }

    /// All rows whose indexed column equals `value`, in insertion order.
    pub fn get_all_by_index<R: Record>(&self, index: Index, value: &dyn ToSql) -> Result<Vec<R>> {
        if !R::INDEXES.contains(&index) {
            return Err(LedgerError::validation(format!(
                "Table {} has no index on '{}'",
                R::TABLE.name(),
                index.column()
            )));
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY rowid",
            R::COLUMNS,
            R::TABLE.name(),
            index.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(&[value][..], |row| R::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Idempotent delete; returns whether a row was removed.
    pub fn delete<R: Record>(&self, key: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE.name());
        let rows = self.conn.execute(&sql, params![key])?;
        debug!(table = R::TABLE.name(), key, removed = rows > 0, "delete");
        Ok(rows > 0)
    }

    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let sql = format!("SELECT {} FROM {} ORDER BY rowid", R::COLUMNS, R::TABLE.name());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| R::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count<R: Record>(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", R::TABLE.name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // --- Table-specific helpers ---

    /// Insert `aggregate` unless a row for its date already exists.
    /// Returns whether a row was created.
    pub fn insert_aggregate_if_absent(&self, aggregate: &DailyAggregate) -> Result<bool> {
        aggregate.validate()?;
        let rows = self.conn.execute(
            "INSERT INTO daily_tracking (id, date, calorie_target, protein_target, carbs_target, fat_target,
                                         current_calories, current_protein, current_carbs, current_fat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT DO NOTHING",
            params![
                aggregate.id,
                aggregate.date,
                aggregate.calorie_target,
                aggregate.protein_target,
                aggregate.carbs_target,
                aggregate.fat_target,
                aggregate.current_calories,
                aggregate.current_protein,
                aggregate.current_carbs,
                aggregate.current_fat,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Same as `insert_aggregate_if_absent` for the settings singleton.
    pub fn insert_settings_if_absent(&self, settings: &Settings) -> Result<bool> {
        settings.validate()?;
        let rows = self.conn.execute(
            "INSERT INTO user_settings (id, theme, units, calorie_goal, protein_goal, carbs_goal, fat_goal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                settings.id,
                settings.theme.as_str(),
                settings.units.as_str(),
                settings.calorie_goal,
                settings.protein_goal,
                settings.carbs_goal,
                settings.fat_goal,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Aggregates with `from <= date <= to`, newest first.
    pub fn aggregates_between(&self, from: &str, to: &str) -> Result<Vec<DailyAggregate>> {
        let sql = format!(
            "SELECT {} FROM daily_tracking WHERE date >= ?1 AND date <= ?2 ORDER BY date DESC",
            DailyAggregate::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![from, to], DailyAggregate::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Whether `EXPLAIN QUERY PLAN` for a date lookup uses an index.
    #[cfg(test)]
    fn date_lookup_uses_index(&self, table: Table) -> Result<bool> {
        let sql = format!(
            "EXPLAIN QUERY PLAN SELECT * FROM {} WHERE date = ?1",
            table.name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let details = stmt
            .query_map(["2024-06-15"], |row| row.get::<_, String>(3))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(details.iter().any(|d| d.contains("USING") && d.contains("INDEX")))
    }
}

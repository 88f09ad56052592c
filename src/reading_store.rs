// src/reading_store.rs

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A metered utility whose last reading is remembered between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilityType {
    Electricity,
    Water,
}

impl UtilityType {
    pub const ALL: [UtilityType; 2] = [UtilityType::Electricity, UtilityType::Water];

    /// Storage key, also the identifier accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            UtilityType::Electricity => "electricity",
            UtilityType::Water => "water",
        }
    }

    /// Unit the meter counts in.
    pub fn unit(self) -> &'static str {
        match self {
            UtilityType::Electricity => "kWh",
            UtilityType::Water => "m³",
        }
    }
}

impl fmt::Display for UtilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UtilityType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "electricity" => Ok(UtilityType::Electricity),
            "water" => Ok(UtilityType::Water),
            _ => Err(StoreError::UnknownUtility(s.to_string())),
        }
    }
}

/// Last-known meter reading per utility. Entries are overwritten, never versioned.
pub trait ReadingStore {
    /// Last saved reading, or `0.0` when the utility has never been recorded.
    fn get_reading(&self, utility: UtilityType) -> Result<f64, StoreError>;

    /// Overwrite the reading for `utility`. Durable once this returns `Ok`.
    fn save_reading(&mut self, utility: UtilityType, value: f64) -> Result<(), StoreError>;

    fn get_reading_by_name(&self, utility: &str) -> Result<f64, StoreError> {
        self.get_reading(utility.parse()?)
    }

    fn save_reading_by_name(&mut self, utility: &str, value: f64) -> Result<(), StoreError> {
        self.save_reading(utility.parse()?, value)
    }
}

/// Open the backend selected in the config.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn ReadingStore>, StoreError> {
    info!(backend = ?config.backend, path = %config.path, "Opening reading store");
    Ok(match config.backend {
        StoreBackend::Json => Box::new(JsonReadingStore::new(&config.path)),
        StoreBackend::Sqlite => Box::new(SqliteReadingStore::new(&config.path)?),
        StoreBackend::Memory => Box::new(MemoryReadingStore::new()),
    })
}

/// Outcome of [`advance_reading`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingAdvance {
    pub utility: UtilityType,
    pub previous: f64,
    pub current: f64,
    /// `current - previous`
    pub consumption: f64,
}

/// Record a fresh meter value and return the usage since the previous one.
///
/// Nothing is written when `current` is below the stored reading.
pub fn advance_reading(
    store: &mut dyn ReadingStore,
    utility: UtilityType,
    current: f64,
) -> Result<ReadingAdvance, StoreError> {
    validate_reading(current)?;
    let previous = store.get_reading(utility)?;
    if current < previous {
        return Err(StoreError::ReadingDecreased { previous, current });
    }

    store.save_reading(utility, current)?;
    let consumption = current - previous;
    info!(utility = %utility, previous, current, consumption, "Meter reading advanced");
    Ok(ReadingAdvance {
        utility,
        previous,
        current,
        consumption,
    })
}

fn validate_reading(value: f64) -> Result<(), StoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StoreError::InvalidReading(value))
    }
}

fn default_readings() -> BTreeMap<String, f64> {
    UtilityType::ALL
        .iter()
        .map(|u| (u.as_str().to_string(), 0.0))
        .collect()
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// Readings kept in a small pretty-printed JSON object, e.g.
/// `{"electricity": 5230.5, "water": 812.0}`.
pub struct JsonReadingStore {
    path: PathBuf,
}

impl JsonReadingStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all readings, creating the file with zero defaults if it does not exist.
    fn load(&self) -> Result<BTreeMap<String, f64>, StoreError> {
        if !self.path.exists() {
            let defaults = default_readings();
            self.write(&defaults)?;
            info!(path = %self.path.display(), "Created reading store with default readings");
            return Ok(defaults);
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<BTreeMap<String, f64>>(&content) {
            Ok(readings) => Ok(readings),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Reading store is empty or corrupt — using default readings"
                );
                Ok(default_readings())
            }
        }
    }

    /// Replace the file via a synced temp file so a reader never sees a partial write.
    fn write(&self, readings: &BTreeMap<String, f64>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(readings)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ReadingStore for JsonReadingStore {
    fn get_reading(&self, utility: UtilityType) -> Result<f64, StoreError> {
        let reading = self
            .load()?
            .get(utility.as_str())
            .copied()
            .unwrap_or(0.0);
        debug!(utility = %utility, reading, "Reading loaded");
        Ok(reading)
    }

    fn save_reading(&mut self, utility: UtilityType, value: f64) -> Result<(), StoreError> {
        validate_reading(value)?;
        let mut readings = self.load()?;
        readings.insert(utility.as_str().to_string(), value);
        self.write(&readings)?;
        info!(utility = %utility, value, path = %self.path.display(), "Reading saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

pub struct SqliteReadingStore {
    conn: Connection,
}

impl SqliteReadingStore {
    /// Open (or create) the database and make sure every known utility has a row.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(dir) = db_path
            .as_ref()
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
        {
            fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS meter_readings (
                utility TEXT PRIMARY KEY,
                reading REAL NOT NULL DEFAULT 0.0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        for utility in UtilityType::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO meter_readings (utility, reading) VALUES (?1, 0.0)",
                params![utility.as_str()],
            )?;
        }

        info!("Reading database initialized");
        Ok(Self { conn })
    }
}

impl ReadingStore for SqliteReadingStore {
    fn get_reading(&self, utility: UtilityType) -> Result<f64, StoreError> {
        let reading: Option<f64> = self
            .conn
            .query_row(
                "SELECT reading FROM meter_readings WHERE utility = ?1",
                params![utility.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(reading.unwrap_or(0.0))
    }

    fn save_reading(&mut self, utility: UtilityType, value: f64) -> Result<(), StoreError> {
        validate_reading(value)?;
        self.conn.execute(
            "INSERT INTO meter_readings (utility, reading, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(utility) DO UPDATE SET
                reading = excluded.reading,
                updated_at = excluded.updated_at",
            params![utility.as_str(), value],
        )?;
        info!(utility = %utility, value, "Reading saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Session-scoped readings; gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    readings: HashMap<UtilityType, f64>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadingStore for MemoryReadingStore {
    fn get_reading(&self, utility: UtilityType) -> Result<f64, StoreError> {
        Ok(self.readings.get(&utility).copied().unwrap_or(0.0))
    }

    fn save_reading(&mut self, utility: UtilityType, value: f64) -> Result<(), StoreError> {
        validate_reading(value)?;
        self.readings.insert(utility, value);
        debug!(utility = %utility, value, "Reading kept in memory");
        Ok(())
    }
}

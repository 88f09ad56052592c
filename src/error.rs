// src/error.rs

use thiserror::Error;

/// Failures of the split calculator.
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    /// A monetary or consumption figure is negative (or not a finite number).
    #[error("invalid amount for {field}: {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("fixed fees ({fixed_fees}) cannot be greater than the total amount ({total_amount})")]
    FeesExceedTotal { fixed_fees: f64, total_amount: f64 },

    #[error(
        "party 1 consumption ({party1_consumption}) cannot be greater than total consumption ({total_consumption})"
    )]
    ConsumptionExceedsTotal {
        party1_consumption: f64,
        total_consumption: f64,
    },

    /// The two party totals do not reconcile with the bill total. Arithmetic bug, not bad input.
    #[error("calculation mismatch: party 1 ({party1_total}) + party 2 ({party2_total}) != total ({total_amount})")]
    SplitMismatch {
        party1_total: f64,
        party2_total: f64,
        total_amount: f64,
    },
}

/// Failures of the meter reading store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid utility type '{0}': must be 'electricity' or 'water'")]
    UnknownUtility(String),

    #[error("invalid meter reading: {0}")]
    InvalidReading(f64),

    #[error("current reading ({current}) is lower than the previous reading ({previous})")]
    ReadingDecreased { previous: f64, current: f64 },

    #[error("reading store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reading store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

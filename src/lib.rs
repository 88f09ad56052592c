//! Household bill splitting: consumption and flat splits between two parties, plus a
//! small persistent store of the last meter reading per utility.

pub mod calculator;
pub mod config;
pub mod error;
pub mod pdf_extract;
pub mod reading_store;
pub mod report;

pub use calculator::{
    BillSplitRequest, BillSplitResult, FlatSplitResult, compute_consumption_split,
    compute_flat_split,
};
pub use error::{CalcError, StoreError};
pub use reading_store::{ReadingAdvance, ReadingStore, UtilityType, advance_reading, open_store};

// src/calculator.rs

use crate::error::CalcError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Largest allowed gap between the two party totals and the bill total.
pub const SPLIT_EPSILON: f64 = 0.01;

/// Input for a consumption-based (electricity / water) bill split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillSplitRequest {
    pub total_amount: f64,
    /// Part of the total split 50/50 regardless of usage.
    #[serde(default)]
    pub fixed_fees: f64,
    /// Units consumed by both parties together (kWh, m³).
    pub total_consumption: f64,
    pub party1_consumption: f64,
}

impl BillSplitRequest {
    /// Units attributed to party 2 (the remainder of the total).
    pub fn party2_consumption(&self) -> f64 {
        self.total_consumption - self.party1_consumption
    }
}

/// Per-party breakdown of a consumption split. All amounts rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillSplitResult {
    pub party1_fixed_fee: f64,
    pub party1_consumption_cost: f64,
    pub party1_total: f64,
    pub party2_fixed_fee: f64,
    pub party2_consumption_cost: f64,
    pub party2_total: f64,
    pub total_check: f64,
}

/// Result of an even 50/50 split (property tax).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatSplitResult {
    pub party1_total: f64,
    pub party2_total: f64,
}

/// Split a bill into equally shared fixed fees and usage-proportional consumption cost.
///
/// A bill with zero total consumption has a per-unit rate of zero, so only the fixed
/// fees are distributed. The reconciliation check runs on unrounded values; rounding to
/// cents happens only in the returned result.
pub fn compute_consumption_split(request: &BillSplitRequest) -> Result<BillSplitResult, CalcError> {
    let BillSplitRequest {
        total_amount,
        fixed_fees,
        total_consumption,
        party1_consumption,
    } = *request;

    ensure_non_negative("total_amount", total_amount)?;
    ensure_non_negative("fixed_fees", fixed_fees)?;
    ensure_non_negative("total_consumption", total_consumption)?;
    ensure_non_negative("party1_consumption", party1_consumption)?;

    if fixed_fees > total_amount {
        return Err(CalcError::FeesExceedTotal {
            fixed_fees,
            total_amount,
        });
    }
    if party1_consumption > total_consumption {
        return Err(CalcError::ConsumptionExceedsTotal {
            party1_consumption,
            total_consumption,
        });
    }

    let consumption_cost = total_amount - fixed_fees;
    let cost_per_unit = if total_consumption > 0.0 {
        consumption_cost / total_consumption
    } else {
        0.0
    };

    let party_fixed = fixed_fees / 2.0;

    let party1_consumption_cost = party1_consumption * cost_per_unit;
    let party2_consumption_cost = request.party2_consumption() * cost_per_unit;

    let party1_total = party_fixed + party1_consumption_cost;
    let party2_total = party_fixed + party2_consumption_cost;

    // A usage component with zero measured usage cannot be allocated and lands here too.
    // Written as `!(.. < ..)` so an overflowed or NaN total fails the check.
    if !((party1_total + party2_total - total_amount).abs() < SPLIT_EPSILON) {
        error!(
            party1_total,
            party2_total,
            total_amount,
            "Split totals do not reconcile with the bill total"
        );
        return Err(CalcError::SplitMismatch {
            party1_total,
            party2_total,
            total_amount,
        });
    }

    debug!(
        cost_per_unit,
        party1_total, party2_total, "Consumption split computed"
    );

    Ok(BillSplitResult {
        party1_fixed_fee: round_cents(party_fixed),
        party1_consumption_cost: round_cents(party1_consumption_cost),
        party1_total: round_cents(party1_total),
        party2_fixed_fee: round_cents(party_fixed),
        party2_consumption_cost: round_cents(party2_consumption_cost),
        party2_total: round_cents(party2_total),
        total_check: round_cents(party1_total + party2_total),
    })
}

/// Split an amount 50/50.
///
/// Works in whole cents: an odd cent goes to party 1, so the halves always add back up
/// to the rounded input.
pub fn compute_flat_split(total_amount: f64) -> Result<FlatSplitResult, CalcError> {
    ensure_non_negative("total_amount", total_amount)?;

    let cents = (total_amount * 100.0).round();
    let party2_cents = (cents / 2.0).floor();
    let party1_cents = cents - party2_cents;

    Ok(FlatSplitResult {
        party1_total: party1_cents / 100.0,
        party2_total: party2_cents / 100.0,
    })
}

/// Round to two decimal places, half away from zero.
///
/// Values too large to scale by 100 are returned unchanged; they carry no cents anyway.
pub fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), CalcError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CalcError::InvalidAmount { field, value })
    }
}

// src/report.rs
//
// Collects several split results from one sitting and renders them per party.

use crate::calculator::{
    BillSplitRequest, BillSplitResult, FlatSplitResult, compute_consumption_split,
    compute_flat_split, round_cents,
};
use crate::config::PartiesConfig;
use crate::error::CalcError;
use crate::reading_store::UtilityType;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::{fs, path::Path};
use tracing::info;

/// One computed bill inside a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SplitEntry {
    Consumption {
        label: String,
        utility: Option<UtilityType>,
        request: BillSplitRequest,
        result: BillSplitResult,
    },
    Flat {
        label: String,
        total_amount: f64,
        result: FlatSplitResult,
    },
}

impl SplitEntry {
    pub fn label(&self) -> &str {
        match self {
            SplitEntry::Consumption { label, .. } | SplitEntry::Flat { label, .. } => label,
        }
    }

    pub fn party_totals(&self) -> (f64, f64) {
        match self {
            SplitEntry::Consumption { result, .. } => (result.party1_total, result.party2_total),
            SplitEntry::Flat { result, .. } => (result.party1_total, result.party2_total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedTotals {
    pub party1_total: f64,
    pub party2_total: f64,
    pub total: f64,
}

/// Bills split in one sitting. The calculator knows nothing about sessions; summing
/// across bills happens here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BillSession {
    pub entries: Vec<SplitEntry>,
}

impl BillSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_consumption(
        &mut self,
        label: impl Into<String>,
        utility: Option<UtilityType>,
        request: BillSplitRequest,
    ) -> Result<&SplitEntry, CalcError> {
        let result = compute_consumption_split(&request)?;
        let label = label.into();
        info!(label = %label, party1 = result.party1_total, party2 = result.party2_total, "Consumption bill split");
        self.entries.push(SplitEntry::Consumption {
            label,
            utility,
            request,
            result,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn add_flat(
        &mut self,
        label: impl Into<String>,
        total_amount: f64,
    ) -> Result<&SplitEntry, CalcError> {
        let result = compute_flat_split(total_amount)?;
        let label = label.into();
        info!(label = %label, party1 = result.party1_total, party2 = result.party2_total, "Flat bill split");
        self.entries.push(SplitEntry::Flat {
            label,
            total_amount,
            result,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn combined_totals(&self) -> CombinedTotals {
        let (party1, party2) = self
            .entries
            .iter()
            .map(SplitEntry::party_totals)
            .fold((0.0, 0.0), |(a, b), (p1, p2)| (a + p1, b + p2));
        CombinedTotals {
            party1_total: round_cents(party1),
            party2_total: round_cents(party2),
            total: round_cents(party1 + party2),
        }
    }

    /// Split every bill in `bills`, stopping at the first one that fails.
    pub fn from_bills(bills: &[BillInput]) -> Result<Self, CalcError> {
        let mut session = Self::new();
        for (i, bill) in bills.iter().enumerate() {
            match bill {
                BillInput::Consumption {
                    label,
                    utility,
                    total_amount,
                    fixed_fees,
                    total_consumption,
                    party1_consumption,
                } => {
                    let label = label
                        .clone()
                        .or_else(|| utility.map(|u| u.to_string()))
                        .unwrap_or_else(|| format!("Bill {}", i + 1));
                    let request = BillSplitRequest {
                        total_amount: *total_amount,
                        fixed_fees: *fixed_fees,
                        total_consumption: *total_consumption,
                        party1_consumption: *party1_consumption,
                    };
                    session.add_consumption(label, *utility, request)?;
                }
                BillInput::Flat {
                    label,
                    total_amount,
                } => {
                    let label = label.clone().unwrap_or_else(|| format!("Bill {}", i + 1));
                    session.add_flat(label, *total_amount)?;
                }
            }
        }
        Ok(session)
    }
}

/// A bill as written in a session file (`[[bill]]` tables).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BillInput {
    Consumption {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        utility: Option<UtilityType>,
        total_amount: f64,
        #[serde(default)]
        fixed_fees: f64,
        total_consumption: f64,
        party1_consumption: f64,
    },
    Flat {
        #[serde(default)]
        label: Option<String>,
        total_amount: f64,
    },
}

#[derive(Debug, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub bill: Vec<BillInput>,
}

impl SessionFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

pub fn render_consumption(
    parties: &PartiesConfig,
    label: &str,
    utility: Option<UtilityType>,
    request: &BillSplitRequest,
    result: &BillSplitResult,
) -> String {
    let unit = utility.map(UtilityType::unit).unwrap_or("units");
    let mut out = String::new();
    let _ = writeln!(out, "{label}");
    for (name, fixed, units, cost, total) in [
        (
            &parties.party1,
            result.party1_fixed_fee,
            request.party1_consumption,
            result.party1_consumption_cost,
            result.party1_total,
        ),
        (
            &parties.party2,
            result.party2_fixed_fee,
            request.party2_consumption(),
            result.party2_consumption_cost,
            result.party2_total,
        ),
    ] {
        let _ = writeln!(out, "  {name}:");
        let _ = writeln!(out, "    - Fixed charges share: {fixed:.2}");
        let units = round_units(units);
        let _ = writeln!(out, "    - Consumption cost ({units} {unit}): {cost:.2}");
        let _ = writeln!(out, "    - Total: {total:.2}");
    }
    let _ = writeln!(out, "  Bill total: {:.2}", result.total_check);
    out
}

/// Meter units to three decimals, which also drops float noise from subtraction.
fn round_units(value: f64) -> f64 {
    let scaled = value * 1000.0;
    if scaled.is_finite() {
        scaled.round() / 1000.0
    } else {
        value
    }
}

pub fn render_flat(
    parties: &PartiesConfig,
    label: &str,
    total_amount: f64,
    result: &FlatSplitResult,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{label}");
    let _ = writeln!(out, "  {}: {:.2}", parties.party1, result.party1_total);
    let _ = writeln!(out, "  {}: {:.2}", parties.party2, result.party2_total);
    let _ = writeln!(out, "  Bill total: {total_amount:.2}");
    out
}

pub fn render_entry(parties: &PartiesConfig, entry: &SplitEntry) -> String {
    match entry {
        SplitEntry::Consumption {
            label,
            utility,
            request,
            result,
        } => render_consumption(parties, label, *utility, request, result),
        SplitEntry::Flat {
            label,
            total_amount,
            result,
        } => render_flat(parties, label, *total_amount, result),
    }
}

/// All bills, then a combined section when there is more than one.
pub fn render_session(parties: &PartiesConfig, session: &BillSession) -> String {
    let sections: Vec<String> = session
        .entries
        .iter()
        .map(|entry| render_entry(parties, entry))
        .collect();
    let mut out = sections.join("\n");

    if session.entries.len() > 1 {
        let combined = session.combined_totals();
        let _ = writeln!(out);
        let _ = writeln!(out, "Combined ({} bills)", session.entries.len());
        let _ = writeln!(out, "  {}: {:.2}", parties.party1, combined.party1_total);
        let _ = writeln!(out, "  {}: {:.2}", parties.party2, combined.party2_total);
        let _ = writeln!(out, "  Total: {:.2}", combined.total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_request() -> BillSplitRequest {
        BillSplitRequest {
            total_amount: 300.0,
            fixed_fees: 50.0,
            total_consumption: 200.0,
            party1_consumption: 120.0,
        }
    }

    #[test]
    fn test_combined_totals() {
        let mut session = BillSession::new();
        session
            .add_consumption("Electricity", Some(UtilityType::Electricity), reference_request())
            .unwrap();
        session.add_flat("Arnona", 400.0).unwrap();

        let combined = session.combined_totals();
        assert_eq!(combined.party1_total, 375.0);
        assert_eq!(combined.party2_total, 325.0);
        assert_eq!(combined.total, 700.0);
    }

    #[test]
    fn test_failed_bill_is_not_recorded() {
        let mut session = BillSession::new();
        let err = session.add_flat("Arnona", -1.0).unwrap_err();
        assert!(matches!(err, CalcError::InvalidAmount { .. }));
        assert!(session.entries.is_empty());
    }

    #[test]
    fn test_render_consumption_sections() {
        let parties = PartiesConfig::default();
        let request = reference_request();
        let result = compute_consumption_split(&request).unwrap();
        let text = render_consumption(
            &parties,
            "Electricity",
            Some(UtilityType::Electricity),
            &request,
            &result,
        );

        assert!(text.starts_with("Electricity\n"));
        assert!(text.contains("  Apartment 1:\n"));
        assert!(text.contains("    - Consumption cost (120 kWh): 150.00\n"));
        assert!(text.contains("    - Consumption cost (80 kWh): 100.00\n"));
        assert!(text.contains("    - Total: 175.00\n"));
        assert!(text.contains("    - Total: 125.00\n"));
        assert!(text.contains("  Bill total: 300.00\n"));
    }

    #[test]
    fn test_fractional_units_render_clean() {
        let request = BillSplitRequest {
            total_amount: 100.0,
            fixed_fees: 0.0,
            total_consumption: 200.3,
            party1_consumption: 120.1,
        };
        let result = compute_consumption_split(&request).unwrap();
        let text = render_consumption(
            &PartiesConfig::default(),
            "Electricity",
            Some(UtilityType::Electricity),
            &request,
            &result,
        );

        assert!(text.contains("(120.1 kWh)"), "{text}");
        assert!(text.contains("(80.2 kWh)"), "{text}");
        assert!(!text.contains("0000000"), "{text}");
    }

    #[test]
    fn test_single_bill_has_no_combined_section() {
        let mut session = BillSession::new();
        session.add_flat("Arnona", 400.0).unwrap();
        let text = render_session(&PartiesConfig::default(), &session);
        assert!(!text.contains("Combined"));
        assert!(text.contains("  Apartment 2: 200.00\n"));
    }

    #[test]
    fn test_session_file_bills() {
        let file: SessionFile = toml::from_str(
            r#"
[[bill]]
kind = "consumption"
utility = "water"
total_amount = 300
fixed_fees = 50
total_consumption = 200
party1_consumption = 120

[[bill]]
kind = "flat"
label = "Arnona"
total_amount = 400.0
"#,
        )
        .unwrap();
        assert_eq!(file.bill.len(), 2);

        let session = BillSession::from_bills(&file.bill).unwrap();
        assert_eq!(session.entries[0].label(), "water");
        assert_eq!(session.entries[1].label(), "Arnona");

        let parties = PartiesConfig {
            party1: "Ground floor".to_string(),
            party2: "First floor".to_string(),
        };
        let text = render_session(&parties, &session);
        assert!(text.contains("    - Consumption cost (120 m³): 150.00\n"));
        assert!(text.contains("Combined (2 bills)\n"));
        assert!(text.contains("  Ground floor: 375.00\n"));
        assert!(text.contains("  First floor: 325.00\n"));
        assert!(text.contains("  Total: 700.00\n"));
    }

    #[test]
    fn test_session_stops_on_bad_bill() {
        let bills = vec![
            BillInput::Flat {
                label: None,
                total_amount: 10.0,
            },
            BillInput::Consumption {
                label: None,
                utility: None,
                total_amount: 300.0,
                fixed_fees: 500.0,
                total_consumption: 200.0,
                party1_consumption: 120.0,
            },
        ];
        let err = BillSession::from_bills(&bills).unwrap_err();
        assert!(matches!(err, CalcError::FeesExceedTotal { .. }));
    }

    #[test]
    fn test_session_serializes_kind_tag() {
        let mut session = BillSession::new();
        session.add_flat("Arnona", 400.0).unwrap();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["entries"][0]["kind"], "flat");
        assert_eq!(json["entries"][0]["result"]["party1_total"], 200.0);
    }
}

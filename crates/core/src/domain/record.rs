use crate::pipeline::normalize::parse_float_prefix;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column holding the company identifier in the source sheet.
pub const ID_COLUMN: &str = "ID";
/// Column holding the fiscal year in the source sheet.
pub const YEAR_COLUMN: &str = "Year";

/// One cell as handed over by a spreadsheet reader, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Empty,
    Number(f64),
    Text(String),
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

impl From<f64> for RawCell {
    fn from(v: f64) -> Self {
        RawCell::Number(v)
    }
}

/// A source row: header name to raw cell, in column order. Cells missing from the map were
/// empty in the sheet.
pub type RawRow = IndexMap<String, RawCell>;

/// A normalized cell: a number, or the cleaned text when it is not numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// The value as a finite number, parsing text when it holds one.
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            CellValue::Number(_) => None,
            CellValue::Text(s) => parse_float_prefix(s).filter(|v| v.is_finite()),
        }
    }

    /// Text form used for identifier comparison: integral numbers print without a fraction,
    /// so `2412` and `"2412"` compare equal.
    pub fn to_key_text(&self) -> String {
        match self {
            CellValue::Number(v) => number_to_text(*v),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Identifiers that normalized to zero or to blank text carry no identity.
    pub fn is_blank_identifier(&self) -> bool {
        match self {
            CellValue::Number(v) => *v == 0.0 || v.is_nan(),
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }
}

fn number_to_text(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "STD")]
    ShortTermDebt,
    #[serde(rename = "CPLTD")]
    CurrentPortionLongTermDebt,
    #[serde(rename = "LTD")]
    LongTermDebt,
    #[serde(rename = "EBITDA")]
    Ebitda,
    #[serde(rename = "Sales")]
    Sales,
    #[serde(rename = "FCF")]
    FreeCashFlow,
    #[serde(rename = "TIE")]
    TimesInterestEarned,
    #[serde(rename = "CR")]
    CurrentRatio,
    #[serde(rename = "CapEx")]
    CapitalExpenditure,
    #[serde(rename = "Assets")]
    TotalAssets,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::ShortTermDebt,
        Metric::CurrentPortionLongTermDebt,
        Metric::LongTermDebt,
        Metric::Ebitda,
        Metric::Sales,
        Metric::FreeCashFlow,
        Metric::TimesInterestEarned,
        Metric::CurrentRatio,
        Metric::CapitalExpenditure,
        Metric::TotalAssets,
    ];

    /// Header of this metric's column in the source sheet.
    pub fn column(self) -> &'static str {
        match self {
            Metric::ShortTermDebt => "STD",
            Metric::CurrentPortionLongTermDebt => "CPLTD",
            Metric::LongTermDebt => "LTD",
            Metric::Ebitda => "EBITDA",
            Metric::Sales => "Sales",
            Metric::FreeCashFlow => "FCF",
            Metric::TimesInterestEarned => "TIE",
            Metric::CurrentRatio => "CR",
            Metric::CapitalExpenditure => "CapEx",
            Metric::TotalAssets => "Assets",
        }
    }

    pub fn from_column(column: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.column() == column)
    }
}

/// One company-year observation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialRecord {
    pub company_id: String,
    pub fiscal_year: i32,
    pub metrics: BTreeMap<Metric, CellValue>,
}

impl FinancialRecord {
    pub fn metric(&self, metric: Metric) -> Option<&CellValue> {
        self.metrics.get(&metric)
    }
}

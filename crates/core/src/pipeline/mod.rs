//! Spreadsheet rows to per-company series and summary statistics.

pub mod aggregate;
pub mod charts;
pub mod filter;
pub mod normalize;
pub mod records;

use crate::domain::record::FinancialRecord;
use thiserror::Error;

/// The selected company has no rows in the loaded sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no data for company {company_id}")]
pub struct NoData {
    pub company_id: String,
}

/// Records of one company, oldest fiscal year first.
///
/// Identifiers are compared as text, so a sheet that stored `2412` as a number still matches
/// the directory's `"2412"`. No matching rows is reported as [`NoData`].
pub fn select_company(
    records: &[FinancialRecord],
    company_id: &str,
) -> Result<Vec<FinancialRecord>, NoData> {
    let target = company_id.trim();
    let mut selected: Vec<FinancialRecord> = records
        .iter()
        .filter(|r| r.company_id == target)
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(NoData {
            company_id: target.to_string(),
        });
    }

    // Stable: rows sharing a year keep their source order.
    selected.sort_by_key(|r| r.fiscal_year);
    Ok(selected)
}

use crate::domain::record::{
    CellValue, FinancialRecord, Metric, RawRow, ID_COLUMN, YEAR_COLUMN,
};
use crate::pipeline::normalize::normalize_cell;
use std::collections::BTreeMap;

/// Maps raw sheet rows to financial records, in source order.
///
/// Keys are trimmed and every value is normalized. When two headers trim to the same key the
/// later column wins. Rows whose identifier is missing or blank after normalization are dropped.
pub fn build_records<I>(rows: I) -> Vec<FinancialRecord>
where
    I: IntoIterator<Item = RawRow>,
{
    let mut out = Vec::new();
    let mut rows_in: usize = 0;

    for row in rows {
        rows_in += 1;
        let normalized: BTreeMap<String, CellValue> = row
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), normalize_cell(&v)))
            .collect();

        if let Some(record) = build_record(normalized, rows_in) {
            out.push(record);
        }
    }

    tracing::info!(
        rows_in,
        records = out.len(),
        dropped = rows_in - out.len(),
        "built financial records"
    );
    out
}

fn build_record(
    mut cells: BTreeMap<String, CellValue>,
    row_number: usize,
) -> Option<FinancialRecord> {
    let company_id = match cells.remove(ID_COLUMN) {
        Some(id) if !id.is_blank_identifier() => id.to_key_text(),
        _ => {
            tracing::debug!(row_number, "dropping row without company identifier");
            return None;
        }
    };

    let fiscal_year = match cells.remove(YEAR_COLUMN).as_ref().and_then(CellValue::as_finite) {
        Some(y) if y.fract() == 0.0 && y.abs() <= f64::from(i32::MAX) => y as i32,
        other => {
            tracing::warn!(row_number, %company_id, year = ?other, "row has no usable fiscal year; using 0");
            0
        }
    };

    let metrics = cells
        .into_iter()
        .filter_map(|(column, value)| Metric::from_column(&column).map(|m| (m, value)))
        .collect();

    Some(FinancialRecord {
        company_id,
        fiscal_year,
        metrics,
    })
}

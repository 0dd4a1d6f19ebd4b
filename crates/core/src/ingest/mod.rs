pub mod csv;
pub mod xlsx;

use crate::domain::company::CompanyDirectory;
use crate::domain::record::{FinancialRecord, RawRow};
use crate::pipeline::records::build_records;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Csv,
}

impl SpreadsheetFormat {
    /// Zip containers are workbooks; otherwise the extension decides, defaulting to xlsx.
    pub fn detect(path: &Path, bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) {
            return SpreadsheetFormat::Xlsx;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => SpreadsheetFormat::Csv,
            _ => SpreadsheetFormat::Xlsx,
        }
    }
}

/// Everything loaded once at startup and held for the session.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub directory: CompanyDirectory,
    pub records: Vec<FinancialRecord>,
}

#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub companies: PathBuf,
    pub workbook: PathBuf,
}

/// Reads the first sheet of a spreadsheet as row objects. Returns the sheet name with the rows.
pub fn read_rows(bytes: &[u8], format: SpreadsheetFormat) -> Result<(String, Vec<RawRow>)> {
    match format {
        SpreadsheetFormat::Xlsx => {
            let sheet = xlsx::read_first_sheet(bytes)?;
            Ok((sheet.sheet_name, sheet.rows))
        }
        SpreadsheetFormat::Csv => Ok(("csv".to_string(), csv::read_rows(bytes)?)),
    }
}

pub fn build_dataset(
    directory_json: &[u8],
    spreadsheet: &[u8],
    format: SpreadsheetFormat,
) -> Result<Dataset> {
    let directory = CompanyDirectory::from_json_slice(directory_json)?;
    anyhow::ensure!(!directory.is_empty(), "company directory is empty");

    let (sheet_name, rows) = read_rows(spreadsheet, format)?;
    let records = build_records(rows);

    tracing::info!(
        companies = directory.len(),
        records = records.len(),
        sheet = %sheet_name,
        "dataset loaded"
    );
    Ok(Dataset { directory, records })
}

/// Loads the directory and spreadsheet from disk. Any failure here is fatal for the session.
pub async fn load_dataset(paths: &DatasetPaths) -> Result<Dataset> {
    let directory_json = tokio::fs::read(&paths.companies)
        .await
        .with_context(|| format!("read company directory {} failed", paths.companies.display()))?;
    let spreadsheet = tokio::fs::read(&paths.workbook)
        .await
        .with_context(|| format!("read spreadsheet {} failed", paths.workbook.display()))?;

    let format = SpreadsheetFormat::detect(&paths.workbook, &spreadsheet);
    let workbook = paths.workbook.display().to_string();
    tokio::task::spawn_blocking(move || build_dataset(&directory_json, &spreadsheet, format))
        .await
        .context("join spreadsheet parse task failed")?
        .with_context(|| format!("load {workbook} failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Metric;

    const DIRECTORY: &str = r#"[{"id": "2412", "name": "中華電信", "nameEn": "Chunghwa Telecom"}]"#;

    #[test]
    fn detects_format_by_magic_then_extension() {
        assert_eq!(
            SpreadsheetFormat::detect(Path::new("a.csv"), b"PK\x03\x04rest"),
            SpreadsheetFormat::Xlsx
        );
        assert_eq!(
            SpreadsheetFormat::detect(Path::new("a.CSV"), b"ID,Year"),
            SpreadsheetFormat::Csv
        );
        assert_eq!(
            SpreadsheetFormat::detect(Path::new("a.xlsx"), b"ID,Year"),
            SpreadsheetFormat::Xlsx
        );
    }

    #[test]
    fn builds_dataset_from_csv() {
        let csv = "ID,Year,STD\n2412,2021,\"1,000\"\n,2021,100\n";
        let dataset = build_dataset(DIRECTORY.as_bytes(), csv.as_bytes(), SpreadsheetFormat::Csv)
            .unwrap();
        assert_eq!(dataset.directory.len(), 1);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(
            dataset.records[0]
                .metric(Metric::ShortTermDebt)
                .and_then(|v| v.as_finite()),
            Some(1000.0)
        );
    }

    #[test]
    fn builds_dataset_from_workbook() {
        let sheet = r#"<worksheet><sheetData>
            <row><c t="inlineStr"><is><t>ID</t></is></c><c t="inlineStr"><is><t>Year</t></is></c></row>
            <row><c><v>2412</v></c><c><v>2021</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = xlsx::tests::workbook(sheet, None);
        let dataset =
            build_dataset(DIRECTORY.as_bytes(), &bytes, SpreadsheetFormat::Xlsx).unwrap();
        assert_eq!(dataset.records[0].company_id, "2412");
        assert_eq!(dataset.records[0].fiscal_year, 2021);
    }

    #[test]
    fn unreadable_spreadsheet_is_fatal() {
        let err = build_dataset(DIRECTORY.as_bytes(), b"garbage", SpreadsheetFormat::Xlsx)
            .unwrap_err();
        assert!(format!("{err:#}").contains("zip"));
    }

    #[test]
    fn empty_directory_is_fatal() {
        assert!(build_dataset(b"[]", b"ID\n1\n", SpreadsheetFormat::Csv).is_err());
    }

    #[tokio::test]
    async fn missing_files_are_fatal() {
        let paths = DatasetPaths {
            companies: PathBuf::from("/nonexistent/companies.json"),
            workbook: PathBuf::from("/nonexistent/book.xlsx"),
        };
        let err = load_dataset(&paths).await.unwrap_err();
        assert!(format!("{err:#}").contains("company directory"));
    }
}

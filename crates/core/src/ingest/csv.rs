use crate::domain::record::{RawCell, RawRow};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use encoding_rs::BIG5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a CSV export: header row first, empty cells omitted, blank lines skipped.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let text = decode(bytes);
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()
        .context("CSV export has no header row")?
        .clone();
    anyhow::ensure!(
        headers.iter().any(|h| !h.trim().is_empty()),
        "CSV export has an empty header row"
    );

    let mut out = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("malformed CSV row {}", idx + 2))?;
        let row: RawRow = headers
            .iter()
            .zip(rec.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| (h.to_string(), RawCell::Text(v.to_string())))
            .collect();
        if !row.is_empty() {
            out.push(row);
        }
    }
    Ok(out)
}

/// UTF-8 (BOM optional) when valid, otherwise Big5 as written by Traditional Chinese Excel.
fn decode(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, had_errors) = BIG5.decode(body);
            if had_errors {
                tracing::warn!("CSV export is neither UTF-8 nor clean Big5; some characters were replaced");
            }
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_keyed_rows() {
        let csv = "ID,Year,STD,TIE\n2412,2021,\"1,000\",15%\n,,,\n2412,2020,500,\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["STD"], RawCell::Text("1,000".into()));
        assert_eq!(rows[0]["TIE"], RawCell::Text("15%".into()));
        assert!(!rows[1].contains_key("TIE"));
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("ID,Year\n2412,2021\n".as_bytes());
        let rows = read_rows(&bytes).unwrap();
        assert_eq!(rows[0]["ID"], RawCell::Text("2412".into()));
    }

    #[test]
    fn decodes_big5_exports() {
        let (encoded, _, _) = BIG5.encode("ID,公司\n2412,中華電信\n");
        let rows = read_rows(&encoded).unwrap();
        assert_eq!(rows[0]["公司"], RawCell::Text("中華電信".into()));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(read_rows(b"").is_err());
    }
}

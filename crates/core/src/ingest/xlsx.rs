//! First-worksheet reader for `.xlsx` workbooks.
//!
//! Produces the same row objects a spreadsheet-to-JSON export would: the first non-empty row
//! is the header, later rows become header-keyed maps, empty cells are omitted.

use crate::domain::record::{CellValue, RawCell, RawRow};
use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

#[derive(Debug, Clone)]
pub struct SheetRows {
    pub sheet_name: String,
    pub rows: Vec<RawRow>,
}

pub fn read_first_sheet(bytes: &[u8]) -> Result<SheetRows> {
    let mut zip =
        zip::ZipArchive::new(Cursor::new(bytes)).context("workbook is not a zip archive")?;

    let workbook = read_entry(&mut zip, WORKBOOK_PATH)?
        .with_context(|| format!("workbook has no {WORKBOOK_PATH}"))?;
    let first = first_sheet(&workbook)?.context("workbook contains no sheets")?;

    let sheet_path = match (read_entry(&mut zip, WORKBOOK_RELS_PATH)?, &first.rel_id) {
        (Some(rels), Some(rel_id)) => sheet_target(&rels, rel_id)?,
        _ => None,
    }
    .unwrap_or_else(|| FALLBACK_SHEET_PATH.to_string());

    let shared = match read_entry(&mut zip, SHARED_STRINGS_PATH)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_entry(&mut zip, &sheet_path)?
        .with_context(|| format!("sheet {:?} not found at {sheet_path}", first.name))?;
    let grid = parse_sheet(&sheet_xml, &shared)
        .with_context(|| format!("failed to parse sheet {:?}", first.name))?;

    let rows = rows_from_grid(grid)
        .with_context(|| format!("sheet {:?} has no header row", first.name))?;
    Ok(SheetRows {
        sheet_name: first.name,
        rows,
    })
}

fn read_entry<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match zip.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("open zip entry {name} failed")),
    };
    let mut out = String::new();
    file.read_to_string(&mut out)
        .with_context(|| format!("read zip entry {name} failed"))?;
    Ok(Some(out))
}

struct SheetRef {
    name: String,
    rel_id: Option<String>,
}

fn first_sheet(workbook_xml: &str) -> Result<Option<SheetRef>> {
    let mut reader = Reader::from_str(workbook_xml);
    loop {
        match reader.read_event().context("malformed workbook.xml")? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name")?.unwrap_or_default();
                let rel_id = attr(&e, b"id")?;
                return Ok(Some(SheetRef { name, rel_id }));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn sheet_target(rels_xml: &str, rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels_xml);
    loop {
        match reader.read_event().context("malformed workbook.xml.rels")? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id")?.as_deref() != Some(rel_id) {
                    continue;
                }
                return Ok(attr(&e, b"Target")?.map(|target| match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{target}"),
                }));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Matches on the local name, so `r:id` is found as `id`.
fn attr(e: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.context("malformed XML attribute")?;
        if a.key.local_name().as_ref() == local_name {
            let value = a.unescape_value().context("malformed XML attribute value")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs carry reading hints, not cell text.
    let mut phonetic_depth: usize = 0;

    loop {
        match reader.read_event().context("malformed sharedStrings.xml")? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => phonetic_depth += 1,
                b"t" => in_text = phonetic_depth == 0,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().context("malformed shared string")?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.push(std::mem::take(&mut current)),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Non-empty cells of one sheet row, keyed by zero-based column.
type GridRow = BTreeMap<usize, RawCell>;

struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    value: String,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<GridRow>> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row = GridRow::new();
    let mut next_column: usize = 0;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event().context("malformed worksheet XML")? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = GridRow::new();
                    next_column = 0;
                }
                b"c" => {
                    let column = cell_column(&e)?.unwrap_or(next_column);
                    next_column = column + 1;
                    pending = Some(PendingCell {
                        column,
                        cell_type: attr(&e, b"t")?,
                        value: String::new(),
                    });
                }
                // <v> for stored values, <t> inside <is> for inline strings.
                b"v" | b"t" => in_value = pending.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => next_column = cell_column(&e)?.unwrap_or(next_column) + 1,
                b"row" => rows.push(GridRow::new()),
                _ => {}
            },
            Event::Text(t) if in_value => {
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&t.unescape().context("malformed cell text")?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        if let Some(value) = decode_cell(&cell, shared)? {
                            row.insert(cell.column, value);
                        }
                    }
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn cell_column(e: &BytesStart<'_>) -> Result<Option<usize>> {
    Ok(attr(e, b"r")?.and_then(|r| column_index(&r)))
}

/// `"A1"` -> 0, `"AB12"` -> 27.
fn column_index(reference: &str) -> Option<usize> {
    let mut index: usize = 0;
    let mut seen = false;
    for ch in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        index = index * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
        seen = true;
    }
    seen.then(|| index - 1)
}

fn decode_cell(cell: &PendingCell, shared: &[String]) -> Result<Option<RawCell>> {
    if cell.value.is_empty() {
        return Ok(None);
    }
    let value = cell.value.as_str();
    let decoded = match cell.cell_type.as_deref() {
        Some("s") => {
            let idx = value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("bad shared string index {value:?}"))?;
            let text = shared
                .get(idx)
                .with_context(|| format!("shared string index {idx} out of range"))?;
            RawCell::Text(text.clone())
        }
        Some("b") => {
            let flag = if value.trim() == "1" { "TRUE" } else { "FALSE" };
            RawCell::Text(flag.to_string())
        }
        Some("str") | Some("inlineStr") | Some("e") | Some("d") => RawCell::Text(value.to_string()),
        _ => match value.trim().parse::<f64>() {
            Ok(v) => RawCell::Number(v),
            Err(_) => RawCell::Text(value.to_string()),
        },
    };
    Ok(Some(decoded))
}

/// Turns the cell grid into header-keyed rows. Columns without a header are named
/// `__EMPTY`; repeated names get `_1`, `_2`, ... suffixes.
fn rows_from_grid(grid: Vec<GridRow>) -> Result<Vec<RawRow>> {
    let mut rows = grid.into_iter().filter(|r| !r.is_empty());
    let header_row = rows.next().context("no non-empty rows")?;
    let data: Vec<GridRow> = rows.collect();

    let columns: BTreeSet<usize> = header_row
        .keys()
        .chain(data.iter().flat_map(|r| r.keys()))
        .copied()
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let headers: HashMap<usize, String> = columns
        .into_iter()
        .map(|col| {
            let base = header_row
                .get(&col)
                .map(header_text)
                .unwrap_or_else(|| "__EMPTY".to_string());
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}_{count}")
            };
            *count += 1;
            (col, name)
        })
        .collect();

    Ok(data
        .into_iter()
        .map(|r| {
            r.into_iter()
                .filter_map(|(col, cell)| headers.get(&col).map(|h| (h.clone(), cell)))
                .collect()
        })
        .collect())
}

fn header_text(cell: &RawCell) -> String {
    match cell {
        RawCell::Text(s) => s.clone(),
        RawCell::Number(v) => CellValue::Number(*v).to_key_text(),
        RawCell::Empty => String::new(),
    }
}

//! A1 notation helpers. Rows and columns are 1-based here, as on the sheet.
use super::error::{SheetError, SheetResult};

pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase()
            .then(|| acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1))
            .flatten()
    })
}

/// `rowcol_to_a1(3, 28) == "AB3"`.
pub fn rowcol_to_a1(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// Parses one A1 reference. Either part may be missing (`"C"`, `"4"`).
fn parse_ref(reference: &str) -> Option<(Option<u32>, Option<u32>)> {
    let reference = reference.trim().replace('$', "");
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(split);
    let col = if letters.is_empty() {
        None
    } else {
        Some(column_number(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<u32>().ok().filter(|row| *row > 0)?)
    };
    if row.is_none() && col.is_none() {
        return None;
    }
    Some((row, col))
}

/// `a1_to_rowcol("AB3") == (3, 28)`.
pub fn a1_to_rowcol(label: &str) -> SheetResult<(u32, u32)> {
    match parse_ref(label) {
        Some((Some(row), Some(col))) => Ok((row, col)),
        _ => Err(SheetError::InvalidRange(label.to_string())),
    }
}

/// Zero-based, end-exclusive bounds of an A1 range; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeBounds {
    pub start_row: Option<u32>,
    pub end_row: Option<u32>,
    pub start_col: Option<u32>,
    pub end_col: Option<u32>,
}

/// Parses `B2`, `A1:C5`, `A:A`, `2:4` or `'Sheet 1'!B2:D`.
pub fn parse_range(range: &str) -> SheetResult<RangeBounds> {
    let invalid = || SheetError::InvalidRange(range.to_string());
    let cells = match range.rsplit_once('!') {
        Some((_, cells)) => cells,
        None => range,
    };
    let (first, last) = match cells.split_once(':') {
        Some((first, last)) => (first, last),
        None => (cells, cells),
    };
    let (row1, col1) = parse_ref(first).ok_or_else(invalid)?;
    let (row2, col2) = parse_ref(last).ok_or_else(invalid)?;

    let rows = match (row1, row2) {
        (Some(a), Some(b)) => (Some(a.min(b) - 1), Some(a.max(b))),
        (Some(a), None) => (Some(a - 1), None),
        (None, Some(b)) => (None, Some(b)),
        (None, None) => (None, None),
    };
    let cols = match (col1, col2) {
        (Some(a), Some(b)) => (Some(a.min(b) - 1), Some(a.max(b))),
        (Some(a), None) => (Some(a - 1), None),
        (None, Some(b)) => (None, Some(b)),
        (None, None) => (None, None),
    };
    Ok(RangeBounds {
        start_row: rows.0,
        end_row: rows.1,
        start_col: cols.0,
        end_col: cols.1,
    })
}

/// Quotes a worksheet title for use in a range: `Sheet 1` becomes `'Sheet 1'`.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

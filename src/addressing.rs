use crate::columns::COLUMN_COUNT;
use crate::error::{SheetError, SheetResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RANGE_ROW_REGEX: Regex = Regex::new(r"![$]?[A-Za-z]+[$]?(\d+)").unwrap();
    static ref PLAIN_TAB_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Convert a zero-based column index to its letter name (0 -> A, 26 -> AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut result = String::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        result.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result.chars().rev().collect()
}

/// Inverse of `column_letter`.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// Letter of the last mirrored column.
pub fn last_column() -> String {
    column_letter(COLUMN_COUNT - 1)
}

/// Tab name as it must appear in A1 notation.
pub fn quote_tab(tab: &str) -> String {
    if PLAIN_TAB_REGEX.is_match(tab) {
        tab.to_string()
    } else {
        format!("'{}'", tab.replace('\'', "''"))
    }
}

/// The sixteen-cell range of one sheet row, e.g. `Sheet1!A2:P2`.
pub fn row_range(tab: &str, row: u32) -> SheetResult<String> {
    if row == 0 {
        return Err(SheetError::InvalidRow(row.to_string()));
    }
    Ok(format!("{}!A{row}:{}{row}", quote_tab(tab), last_column()))
}

/// Every mirrored column of the tab, used to count occupied rows.
pub fn columns_range(tab: &str) -> String {
    format!("{}!A:{}", quote_tab(tab), last_column())
}

/// First cell of the tab, where the header lives.
pub fn header_range(tab: &str) -> String {
    format!("{}!A1:{}1", quote_tab(tab), last_column())
}

/// Row number of the first cell in an A1 range such as `Sheet1!A2:P2`.
pub fn range_row(range: &str) -> Option<u32> {
    RANGE_ROW_REGEX
        .captures(range)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

use crate::columns::COLUMN_COUNT;
use crate::error::SheetResult;
use async_trait::async_trait;

/// The four operations the mirror needs from a spreadsheet service.
///
/// Row numbers are 1-based and row 1 holds the header labels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// Write the header labels into row 1 if that row is empty.
    /// Returns whether anything was written.
    async fn ensure_header(&self, tab: &str) -> SheetResult<bool>;

    /// Append one data row after the last populated row and return the
    /// row number it landed on.
    async fn append_row(&self, tab: &str, values: &[String]) -> SheetResult<u32>;

    /// Overwrite the sixteen cells of `row`; returns the range written.
    async fn update_row(&self, tab: &str, row: u32, values: &[String]) -> SheetResult<String>;

    /// Blank the sixteen cells of `row`, leaving the row in place; returns
    /// the range cleared.
    async fn clear_row(&self, tab: &str, row: u32) -> SheetResult<String>;
}

/// Pad or cut `values` to exactly one mirrored row.
pub(crate) fn fit_to_columns(values: &[String]) -> Vec<String> {
    let mut row: Vec<String> = values.iter().take(COLUMN_COUNT).cloned().collect();
    row.resize(COLUMN_COUNT, String::new());
    row
}

pub(crate) fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.is_empty())
}

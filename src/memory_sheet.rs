use crate::addressing::row_range;
use crate::columns::{COLUMN_COUNT, header_row};
use crate::error::{SheetError, SheetResult};
use crate::gateway::{SheetGateway, fit_to_columns, is_blank};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    EnsureHeader,
    Append,
    Update,
    Clear,
}

/// One attempted gateway call, recorded whether or not it succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCall {
    pub op: GatewayOp,
    pub tab: String,
    pub row: Option<u32>,
}

#[derive(Default)]
struct MemoryState {
    tabs: BTreeMap<String, Vec<Vec<String>>>,
    failing: HashSet<GatewayOp>,
    calls: Vec<GatewayCall>,
}

/// A spreadsheet held in process memory.
///
/// Behaves like the remote service for the mirror's purposes: appends go
/// after the last non-blank row and cleared rows stay in place. Operations
/// can be made to fail on demand.
pub struct MemorySheet {
    state: Mutex<MemoryState>,
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self::with_tabs(&["Sheet1"])
    }
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tabs(tabs: &[&str]) -> Self {
        let state = MemoryState {
            tabs: tabs.iter().map(|t| (t.to_string(), Vec::new())).collect(),
            ..Default::default()
        };
        MemorySheet {
            state: Mutex::new(state),
        }
    }

    /// Make every later call of `op` fail with a remote error.
    pub fn fail(&self, op: GatewayOp) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: GatewayOp) {
        self.lock().failing.remove(&op);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// The sixteen cells of a 1-based row, if the tab reaches that far.
    pub fn row(&self, tab: &str, row: u32) -> Option<Vec<String>> {
        let state = self.lock();
        let grid = state.tabs.get(tab)?;
        let index = (row as usize).checked_sub(1)?;
        grid.get(index).map(|cells| fit_to_columns(cells))
    }

    /// Every row of a tab, trailing blank rows included.
    pub fn rows(&self, tab: &str) -> Vec<Vec<String>> {
        self.lock().tabs.get(tab).cloned().unwrap_or_default()
    }

    /// Seed a raw row, bypassing the call log.
    pub fn put_row(&self, tab: &str, row: u32, values: &[String]) -> SheetResult<()> {
        row_range(tab, row)?;
        let mut state = self.lock();
        let grid = state.tabs.entry(tab.to_string()).or_default();
        write_row(grid, row, fit_to_columns(values));
        Ok(())
    }

    // A poisoned lock only means another test thread panicked mid-call.
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(
        &self,
        op: GatewayOp,
        tab: &str,
        row: Option<u32>,
    ) -> SheetResult<std::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.calls.push(GatewayCall {
            op,
            tab: tab.to_string(),
            row,
        });
        if state.failing.contains(&op) {
            return Err(SheetError::Remote {
                status: 503,
                message: format!("simulated {op:?} failure"),
            });
        }
        if !state.tabs.contains_key(tab) {
            return Err(SheetError::TabNotFound(tab.to_string()));
        }
        Ok(state)
    }
}

fn write_row(grid: &mut Vec<Vec<String>>, row: u32, values: Vec<String>) {
    let Some(index) = (row as usize).checked_sub(1) else {
        return;
    };
    if grid.len() <= index {
        grid.resize(index + 1, vec![String::new(); COLUMN_COUNT]);
    }
    grid[index] = values;
}

#[async_trait]
impl SheetGateway for MemorySheet {
    async fn ensure_header(&self, tab: &str) -> SheetResult<bool> {
        let mut state = self.begin(GatewayOp::EnsureHeader, tab, Some(1))?;
        let grid = state.tabs.entry(tab.to_string()).or_default();
        if grid.first().is_some_and(|row| !is_blank(row)) {
            return Ok(false);
        }
        write_row(grid, 1, header_row());
        Ok(true)
    }

    async fn append_row(&self, tab: &str, values: &[String]) -> SheetResult<u32> {
        let mut state = self.begin(GatewayOp::Append, tab, None)?;
        let grid = state.tabs.entry(tab.to_string()).or_default();
        let occupied = grid
            .iter()
            .rposition(|row| !is_blank(row))
            .map_or(0, |i| i + 1);
        grid.truncate(occupied);
        grid.push(fit_to_columns(values));
        Ok(grid.len() as u32)
    }

    async fn update_row(&self, tab: &str, row: u32, values: &[String]) -> SheetResult<String> {
        let range = row_range(tab, row)?;
        let mut state = self.begin(GatewayOp::Update, tab, Some(row))?;
        let grid = state.tabs.entry(tab.to_string()).or_default();
        write_row(grid, row, fit_to_columns(values));
        Ok(range)
    }

    async fn clear_row(&self, tab: &str, row: u32) -> SheetResult<String> {
        let range = row_range(tab, row)?;
        let mut state = self.begin(GatewayOp::Clear, tab, Some(row))?;
        let grid = state.tabs.entry(tab.to_string()).or_default();
        if let Some(cells) = (row as usize).checked_sub(1).and_then(|i| grid.get_mut(i)) {
            *cells = vec![String::new(); COLUMN_COUNT];
        }
        Ok(range)
    }
}

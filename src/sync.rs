//! Keeps the spreadsheet mirror in step with the record store.
//!
//! Every operation writes the store first. Only once that write is
//! confirmed does the coordinator touch the sheet, and a sheet failure is
//! reported in the outcome rather than undoing the store write. Nothing is
//! retried: an entry whose append failed stays without a sheet row, and a
//! row whose clear failed keeps its stale values.

use crate::columns::EntryFields;
use crate::error::SyncError;
use crate::gateway::SheetGateway;
use crate::store::{Entry, RecordStore};
use serde::Serialize;
use std::sync::Arc;

/// What happened on the spreadsheet side of an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MirrorStatus {
    /// The sheet row was written (or cleared) successfully.
    Synced { row: u32 },
    /// The entry has no sheet row, so the sheet was left alone.
    NotLinked,
    /// The sheet call failed; the store change stands.
    Failed { message: String },
    /// The append landed at `row` but recording that row on the entry failed.
    Unlinked { row: u32, message: String },
}

impl MirrorStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, MirrorStatus::Synced { .. } | MirrorStatus::NotLinked)
    }

    fn warning(&self, done: &str, failed: &str) -> Option<String> {
        match self {
            MirrorStatus::Failed { message } => {
                Some(format!("{done}, but failed to {failed}: {message}"))
            }
            MirrorStatus::Unlinked { row, message } => Some(format!(
                "{done} and appended to sheet row {row}, but failed to link the row: {message}"
            )),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateOutcome {
    pub entry: Entry,
    pub mirror: MirrorStatus,
}

impl CreateOutcome {
    pub fn warning(&self) -> Option<String> {
        self.mirror.warning("Added", "append to sheet")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct EditOutcome {
    pub entry: Entry,
    pub mirror: MirrorStatus,
}

impl EditOutcome {
    pub fn warning(&self) -> Option<String> {
        self.mirror.warning("Saved", "update sheet")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub mirror: MirrorStatus,
}

impl DeleteOutcome {
    pub fn warning(&self) -> Option<String> {
        self.mirror.warning("Deleted", "delete in sheet")
    }
}

pub struct SyncCoordinator {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn SheetGateway>,
    tab: String,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn SheetGateway>,
        tab: impl Into<String>,
    ) -> Self {
        SyncCoordinator {
            store,
            gateway,
            tab: tab.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn SheetGateway> {
        &self.gateway
    }

    pub fn tab(&self) -> &str {
        &self.tab
    }

    pub async fn create(&self, fields: EntryFields) -> Result<CreateOutcome, SyncError> {
        let mut entry = self.store.insert(fields).await.inspect_err(|e| {
            log::error!("insert failed: {e}");
        })?;

        let mirror = match self.append(&entry).await {
            Ok(row) => match self.store.set_sheet_row(&entry.id, row).await {
                Ok(()) => {
                    entry.sheet_row = Some(row);
                    MirrorStatus::Synced { row }
                }
                Err(e) => {
                    log::warn!("entry {} appended at row {row} but left unlinked: {e}", entry.id);
                    MirrorStatus::Unlinked {
                        row,
                        message: e.to_string(),
                    }
                }
            },
            Err(e) => {
                log::warn!("entry {} not mirrored: {e}", entry.id);
                MirrorStatus::Failed {
                    message: e.to_string(),
                }
            }
        };

        Ok(CreateOutcome { entry, mirror })
    }

    async fn append(&self, entry: &Entry) -> crate::error::SheetResult<u32> {
        self.gateway.ensure_header(&self.tab).await?;
        self.gateway
            .append_row(&self.tab, &entry.fields.to_row())
            .await
    }

    pub async fn edit(&self, id: &str, fields: EntryFields) -> Result<EditOutcome, SyncError> {
        let entry = self.store.update_fields(id, fields).await.inspect_err(|e| {
            log::error!("update of {id} failed: {e}");
        })?;

        let mirror = match entry.sheet_row {
            None => MirrorStatus::NotLinked,
            Some(row) => match self
                .gateway
                .update_row(&self.tab, row, &entry.fields.to_row())
                .await
            {
                Ok(_) => MirrorStatus::Synced { row },
                Err(e) => {
                    log::warn!("sheet row {row} of entry {id} is now stale: {e}");
                    MirrorStatus::Failed {
                        message: e.to_string(),
                    }
                }
            },
        };

        Ok(EditOutcome { entry, mirror })
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, SyncError> {
        let sheet_row = self
            .store
            .get(id)
            .await?
            .and_then(|entry| entry.sheet_row);

        self.store.delete(id).await.inspect_err(|e| {
            log::error!("delete of {id} failed: {e}");
        })?;

        let mirror = match sheet_row {
            None => MirrorStatus::NotLinked,
            Some(row) => match self.gateway.clear_row(&self.tab, row).await {
                Ok(_) => MirrorStatus::Synced { row },
                Err(e) => {
                    log::warn!("sheet row {row} keeps data of deleted entry {id}: {e}");
                    MirrorStatus::Failed {
                        message: e.to_string(),
                    }
                }
            },
        };

        Ok(DeleteOutcome {
            id: id.to_string(),
            mirror,
        })
    }
}

/*!
# Fleet Sheet

A record-keeping backend for car, driver and customer entries, with a
Google Sheets copy kept alongside for reporting.

## Overview

Entries are created, edited and deleted through a small JSON API. The
record store is the source of truth; every change is then mirrored into a
spreadsheet tab on a best-effort basis. A mirror failure never undoes the
store change; it is reported back to the caller as a partial success.

## Architecture

### Record Store
- Authoritative entries with id, creation time, sixteen text fields and an
  optional sheet row pointer
- Full-snapshot subscriptions for live views
- JSON document persistence

### Spreadsheet Mirror
- Row codec: fixed sixteen-column layout with a header row
- Column addressing: bijective base-26 letters (A..Z, AA..)
- Gateway: ensure-header, append, update and clear of one row
- Google Sheets v4 client authenticated as a service account

### Sync Coordinator
- Create: insert, then append and link the sheet row
- Edit: update, then rewrite the linked row
- Delete: capture the row, delete, then clear the row

## Modules

- **columns**: record fields, header labels and the row codec
- **addressing**: column letters and A1 ranges
- **config**: environment configuration
- **error**: error types
- **auth**: service account tokens
- **gateway**: the spreadsheet gateway trait
- **sheets**: Google Sheets implementation of the gateway
- **memory_sheet**: in-process gateway for tests and local runs
- **store**: the record store
- **sync**: the sync coordinator
- **app**: HTTP routes (feature `web`)

## REST API Endpoints

- `POST /api/sheets/append` - Append a row, returns `{ ok, row }`
- `POST /api/sheets/update` - Overwrite a row, returns `{ ok, range }`
- `POST /api/sheets/delete` - Blank a row, returns `{ ok, clearedRange }`
- `GET|POST /api/entries`, `PUT|DELETE /api/entries/{id}` - Coordinated entry operations
*/

pub mod addressing;
pub mod app;
pub mod auth;
pub mod columns;
pub mod config;
pub mod error;
pub mod gateway;
pub mod memory_sheet;
pub mod sheets;
pub mod store;
pub mod sync;

/// Re-export the commonly used types to make them easier to reach
pub use columns::{EntryFields, SHEET_HEADERS};
pub use config::{AppConfig, SheetConfig};
pub use error::{SheetError, StoreError, SyncError};
pub use gateway::SheetGateway;
pub use memory_sheet::{GatewayCall, GatewayOp, MemorySheet};
pub use sheets::SheetsClient;
pub use store::{Entry, EntryStore, RecordStore, Subscription};
pub use sync::{MirrorStatus, SyncCoordinator};

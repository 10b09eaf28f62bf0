#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::addressing::row_range;
use crate::columns::{EntryFields, row_from_json};
use crate::config::AppConfig;
use crate::error::{SheetError, StoreError, SyncError};
use crate::sheets::SheetsClient;
use crate::store::{Entry, EntryStore, RecordStore};
use crate::sync::{MirrorStatus, SyncCoordinator};

pub struct AppState {
    sync: SyncCoordinator,
}

impl AppState {
    pub fn new(sync: SyncCoordinator) -> Self {
        AppState { sync }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<SheetError> for ApiError {
    fn from(err: SheetError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        SyncError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "ok": false, "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    ok: bool,
    row: u32,
    updated_range: String,
}

#[derive(Serialize)]
struct UpdateResponse {
    ok: bool,
    range: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    ok: bool,
    cleared_range: String,
}

#[derive(Serialize)]
struct EntryResponse<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: T,
    mirror: MirrorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sheets/append", post(sheet_append))
        .route("/api/sheets/update", post(sheet_update))
        .route("/api/sheets/delete", post(sheet_delete))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/form", get(entry_form))
        .route("/api/entries/:id", put(edit_entry).delete(delete_entry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(EntryStore::open(&config.store_path).await?);
    let gateway = Arc::new(SheetsClient::new(&config.sheet));
    if config.sheet.sheet_id.is_none() || config.sheet.service_account().is_err() {
        log::warn!("spreadsheet mirror is not configured; sheet writes will fail until it is");
    }

    // Kept attached for the life of the server.
    let _snapshots = store.subscribe(Box::new(|entries: &[Entry]| {
        log::debug!("store now holds {} entries", entries.len());
    }))
    .await;

    let sync = SyncCoordinator::new(store, gateway, config.sheet.tab.clone());
    let app = router(Arc::new(AppState::new(sync)));

    let listener = TcpListener::bind(config.addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Accepts a JSON number or numeric string; anything else is not a row.
fn parse_row(value: Option<&Value>) -> Result<u32, SheetError> {
    let invalid = || {
        SheetError::InvalidRow(value.map_or_else(|| "nothing".to_string(), |v| v.to_string()))
    };
    let row = match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) => v,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f > 0.0 => f as u64,
                _ => return Err(invalid()),
            },
        },
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    match u32::try_from(row) {
        Ok(row) if row > 0 => Ok(row),
        _ => Err(invalid()),
    }
}

async fn sheet_append(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<AppendResponse> {
    let Json(body) = body?;
    let gateway = state.sync.gateway();
    let tab = state.sync.tab();

    gateway.ensure_header(tab).await?;
    let row = gateway.append_row(tab, &row_from_json(&body)).await?;

    Ok(Json(AppendResponse {
        ok: true,
        row,
        updated_range: row_range(tab, row)?,
    }))
}

async fn sheet_update(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<UpdateResponse> {
    let Json(body) = body?;
    let row = parse_row(body.get("row"))?;
    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| ApiError::bad_request("row and data are required"))?;

    let range = state
        .sync
        .gateway()
        .update_row(state.sync.tab(), row, &row_from_json(data))
        .await?;

    Ok(Json(UpdateResponse { ok: true, range }))
}

async fn sheet_delete(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ClearResponse> {
    let Json(body) = body?;
    let row = parse_row(body.get("row"))?;

    let cleared_range = state
        .sync
        .gateway()
        .clear_row(state.sync.tab(), row)
        .await?;

    Ok(Json(ClearResponse {
        ok: true,
        cleared_range,
    }))
}

async fn list_entries(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let entries = state.sync.store().list().await?;
    Ok(Json(json!({ "ok": true, "entries": entries })))
}

async fn entry_form() -> Json<EntryFields> {
    Json(EntryFields::form_defaults())
}

async fn create_entry(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let outcome = state.sync.create(EntryFields::from_json(&body)).await?;
    let warning = outcome.warning();

    Ok(Json(EntryResponse {
        ok: true,
        body: json!({ "entry": outcome.entry }),
        mirror: outcome.mirror,
        warning,
    })
    .into_response())
}

async fn edit_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let outcome = state.sync.edit(&id, EntryFields::from_json(&body)).await?;
    let warning = outcome.warning();

    Ok(Json(EntryResponse {
        ok: true,
        body: json!({ "entry": outcome.entry }),
        mirror: outcome.mirror,
        warning,
    })
    .into_response())
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state.sync.delete(&id).await?;
    let warning = outcome.warning();

    Ok(Json(EntryResponse {
        ok: true,
        body: json!({ "id": outcome.id }),
        mirror: outcome.mirror,
        warning,
    })
    .into_response())
}

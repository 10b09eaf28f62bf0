//! An in-process stand-in for the Google Sheets v4 API and token endpoint.

#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fleetsheet::config::SheetConfig;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SHEET_ID: &str = "test-sheet";
pub const TOKEN: &str = "fake-access-token";
const PRIVATE_KEY: &str = include_str!("../fixtures/test_service_key.pem");

struct Tab {
    id: i64,
    title: String,
    rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct FakeState {
    tabs: Vec<Tab>,
    requests: Vec<String>,
    tokens_issued: usize,
    fail_next: Option<(u16, String)>,
    value_inputs: Vec<String>,
    reject_tokens: Option<String>,
}

#[derive(Clone)]
pub struct FakeSheets {
    pub base: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSheets {
    pub async fn start(tabs: &[&str]) -> Self {
        let state = Arc::new(Mutex::new(FakeState {
            tabs: tabs
                .iter()
                .enumerate()
                .map(|(i, title)| Tab {
                    id: 1000 + i as i64,
                    title: title.to_string(),
                    rows: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/token", post(issue_token))
            .route("/v4/spreadsheets/:id", get(metadata).post(batch_update))
            .route(
                "/v4/spreadsheets/:id/values/:range",
                get(get_values).put(put_values).post(clear_values),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeSheets {
            base: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self, tab: &str) -> SheetConfig {
        let base = self.base.clone();
        let tab = tab.to_string();
        SheetConfig::from_lookup(move |key| match key {
            "GOOGLE_SERVICE_ACCOUNT_EMAIL" => {
                Some("mirror@fleet.iam.gserviceaccount.com".to_string())
            }
            "GOOGLE_PRIVATE_KEY" => Some(PRIVATE_KEY.to_string()),
            "SHEET_ID" => Some(SHEET_ID.to_string()),
            "SHEET_TAB" => Some(tab.clone()),
            "SHEETS_API_BASE" => Some(base.clone()),
            "GOOGLE_TOKEN_URI" => Some(format!("{base}/token")),
            _ => None,
        })
    }

    /// Rows of a tab as stored, padded to sixteen cells.
    pub fn rows(&self, tab: &str) -> Vec<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .tabs
            .iter()
            .find(|t| t.title == tab)
            .map(|t| t.rows.iter().map(|r| padded(r)).collect())
            .unwrap_or_default()
    }

    pub fn row(&self, tab: &str, row: usize) -> Vec<String> {
        self.rows(tab)
            .get(row - 1)
            .cloned()
            .unwrap_or_else(|| vec![String::new(); 16])
    }

    pub fn set_row(&self, tab: &str, row: usize, values: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let tab = state.tabs.iter_mut().find(|t| t.title == tab).unwrap();
        let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        write_row(&mut tab.rows, row, cells);
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn tokens_issued(&self) -> usize {
        self.state.lock().unwrap().tokens_issued
    }

    /// `valueInputOption` of every values.update call, in order.
    pub fn value_inputs(&self) -> Vec<String> {
        self.state.lock().unwrap().value_inputs.clone()
    }

    /// Answer every token request with an OAuth `invalid_grant` error.
    pub fn reject_tokens(&self, description: &str) {
        self.state.lock().unwrap().reject_tokens = Some(description.to_string());
    }

    /// Make the next API call answer with a Google-style error body.
    pub fn fail_next(&self, status: u16, message: &str) {
        self.state.lock().unwrap().fail_next = Some((status, message.to_string()));
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn padded(row: &[String]) -> Vec<String> {
    let mut row = row.to_vec();
    row.resize(16.max(row.len()), String::new());
    row
}

fn write_row(rows: &mut Vec<Vec<String>>, row: usize, cells: Vec<String>) {
    if rows.len() < row {
        rows.resize(row, Vec::new());
    }
    rows[row - 1] = cells;
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

fn google_error(status: u16, message: &str) -> Response {
    let code = StatusCode::from_u16(status).unwrap();
    let body = json!({
        "error": { "code": status, "message": message, "status": "FAILED_PRECONDITION" }
    });
    (code, Json(body)).into_response()
}

/// Common checks: bearer token and injected failures.
fn admit(state: &mut FakeState, headers: &HeaderMap, request: String) -> Result<(), Response> {
    state.requests.push(request);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"));
    if !authorized {
        return Err(google_error(401, "Request is missing required authentication credential."));
    }
    if let Some((status, message)) = state.fail_next.take() {
        return Err(google_error(status, &message));
    }
    Ok(())
}

/// Split `Tab!A2:P2` into the tab title and the first/last row, if given.
fn parse_range(range: &str) -> (String, Option<usize>, Option<usize>) {
    let (tab, cells) = range.rsplit_once('!').unwrap_or((range, ""));
    let tab = tab
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .map(|t| t.replace("''", "'"))
        .unwrap_or_else(|| tab.to_string());
    let row_of = |cell: &str| {
        cell.trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
            .parse::<usize>()
            .ok()
    };
    let mut parts = cells.split(':');
    let start = parts.next().and_then(row_of);
    let end = parts.next().and_then(row_of).or(start);
    (tab, start, end)
}

async fn issue_token(
    State(state): State<Shared>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(description) = state.reject_tokens.clone() {
        let body = json!({ "error": "invalid_grant", "error_description": description });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    let valid = form.get("grant_type").map(String::as_str)
        == Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
        && form.get("assertion").is_some_and(|a| a.split('.').count() == 3);
    if !valid {
        let body = json!({ "error": "invalid_grant" });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    state.tokens_issued += 1;
    let body = json!({ "access_token": TOKEN, "expires_in": 3600, "token_type": "Bearer" });
    Json(body).into_response()
}

async fn metadata(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = admit(&mut state, &headers, format!("GET meta {id}")) {
        return response;
    }
    let sheets: Vec<Value> = state
        .tabs
        .iter()
        .map(|t| json!({ "properties": { "sheetId": t.id, "title": t.title } }))
        .collect();
    Json(json!({ "sheets": sheets })).into_response()
}

async fn batch_update(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = admit(&mut state, &headers, format!("POST {id}")) {
        return response;
    }
    let append = &body["requests"][0]["appendCells"];
    let sheet_id = append["sheetId"].as_i64().unwrap_or(-1);
    let cells: Vec<String> = append["rows"][0]["values"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .map(|v| v["userEnteredValue"]["stringValue"].as_str().unwrap_or("").to_string())
                .collect()
        })
        .unwrap_or_default();

    let Some(tab) = state.tabs.iter_mut().find(|t| t.id == sheet_id) else {
        return google_error(400, &format!("No grid with id: {sheet_id}"));
    };
    let occupied = tab.rows.iter().rposition(|r| !is_blank(r)).map_or(0, |i| i + 1);
    tab.rows.truncate(occupied);
    tab.rows.push(cells);
    Json(json!({ "spreadsheetId": SHEET_ID, "replies": [{}] })).into_response()
}

async fn get_values(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = admit(&mut state, &headers, format!("GET {range}")) {
        return response;
    }
    let (title, start, end) = parse_range(&range);
    let Some(tab) = state.tabs.iter().find(|t| t.title == title) else {
        return google_error(400, &format!("Unable to parse range: {range}"));
    };

    let first = start.unwrap_or(1);
    let last = end.unwrap_or(tab.rows.len()).min(tab.rows.len());
    let mut values: Vec<Vec<String>> = (first..=last)
        .filter_map(|r| tab.rows.get(r - 1))
        .map(|row| {
            let keep = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
            row[..keep].to_vec()
        })
        .collect();
    while values.last().is_some_and(|r| r.is_empty()) {
        values.pop();
    }

    if values.is_empty() {
        Json(json!({ "range": range, "majorDimension": "ROWS" })).into_response()
    } else {
        Json(json!({ "range": range, "majorDimension": "ROWS", "values": values })).into_response()
    }
}

async fn put_values(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = admit(&mut state, &headers, format!("PUT {range}")) {
        return response;
    }
    // Cells are stored as sent, which only matches the service for RAW input.
    let input = params.get("valueInputOption").cloned().unwrap_or_default();
    state.value_inputs.push(input.clone());
    if input != "RAW" {
        return google_error(400, &format!("unexpected valueInputOption: {input:?}"));
    }
    let (title, start, _) = parse_range(&range);
    let Some(tab) = state.tabs.iter_mut().find(|t| t.title == title) else {
        return google_error(400, &format!("Unable to parse range: {range}"));
    };
    let cells: Vec<String> = body["values"][0]
        .as_array()
        .map(|v| v.iter().map(|c| c.as_str().unwrap_or("").to_string()).collect())
        .unwrap_or_default();
    write_row(&mut tab.rows, start.unwrap_or(1), cells);
    let body = json!({ "spreadsheetId": SHEET_ID, "updatedRange": range, "updatedRows": 1 });
    Json(body).into_response()
}

async fn clear_values(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(range) = range.strip_suffix(":clear").map(str::to_string) else {
        return google_error(404, "Not found");
    };
    let mut state = state.lock().unwrap();
    if let Err(response) = admit(&mut state, &headers, format!("CLEAR {range}")) {
        return response;
    }
    let (title, start, _) = parse_range(&range);
    let Some(tab) = state.tabs.iter_mut().find(|t| t.title == title) else {
        return google_error(400, &format!("Unable to parse range: {range}"));
    };
    if let Some(row) = start.and_then(|r| tab.rows.get_mut(r - 1)) {
        row.iter_mut().for_each(String::clear);
    }
    Json(json!({ "spreadsheetId": SHEET_ID, "clearedRange": range })).into_response()
}

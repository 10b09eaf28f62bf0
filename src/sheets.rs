//! Google Sheets v4 REST client.
//!
//! Appends use the structural `appendCells` request addressed by the tab's
//! numeric sheet id, then read the tab's mirrored columns back to learn
//! which row the data landed on. Blank rows between records stay counted,
//! which positional `values.append` range parsing can get wrong.
//!
//! Data cells are written literally on both paths: `appendCells` sends
//! string values and `values.update` uses `valueInputOption=RAW`, so an
//! edited row reads back exactly like a freshly appended one.

use crate::addressing::{columns_range, header_range, range_row, row_range};
use crate::auth::TokenProvider;
use crate::columns::header_row;
use crate::config::SheetConfig;
use crate::error::{SheetError, SheetResult};
use crate::gateway::{SheetGateway, fit_to_columns, is_blank};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    updated_range: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearValuesResponse {
    cleared_range: Option<String>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    config: SheetConfig,
    // Held from appendCells until the row count is read.
    append_lock: Mutex<()>,
}

impl SheetsClient {
    pub fn new(config: &SheetConfig) -> Self {
        Self::with_http(config, reqwest::Client::new())
    }

    pub fn with_http(config: &SheetConfig, http: reqwest::Client) -> Self {
        SheetsClient {
            http,
            tokens: TokenProvider::new(config.service_account().ok(), config.token_uri.clone()),
            config: config.clone(),
            append_lock: Mutex::new(()),
        }
    }

    fn spreadsheet_url(&self, sheet_id: &str) -> String {
        format!("{}/v4/spreadsheets/{}", self.config.api_base, urlencoding::encode(sheet_id))
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(sheet_id),
            urlencoding::encode(range)
        )
    }

    async fn request(&self, method: Method, url: String) -> SheetResult<RequestBuilder> {
        let token = self.tokens.access_token(&self.http).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> SheetResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SheetError::Remote {
            status: status.as_u16(),
            message: remote_message(&body).unwrap_or_else(|| status.to_string()),
        })
    }

    async fn get_values(&self, range: &str) -> SheetResult<Vec<Vec<String>>> {
        let sheet_id = self.config.require_sheet_id()?;
        let builder = self
            .request(Method::GET, self.values_url(sheet_id, range))
            .await?;
        let body: ValueRange = Self::send(builder).await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn put_values(&self, range: &str, values: Vec<String>) -> SheetResult<String> {
        let sheet_id = self.config.require_sheet_id()?;
        let builder = self
            .request(Method::PUT, self.values_url(sheet_id, range))
            .await?
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [values],
            }));
        let body: UpdateValuesResponse = Self::send(builder).await?;

        Ok(body.updated_range.unwrap_or_else(|| range.to_string()))
    }

    async fn numeric_sheet_id(&self, tab: &str) -> SheetResult<i64> {
        let sheet_id = self.config.require_sheet_id()?;
        let builder = self
            .request(Method::GET, self.spreadsheet_url(sheet_id))
            .await?
            .query(&[("fields", "sheets.properties(sheetId,title)")]);
        let meta: SpreadsheetMeta = Self::send(builder).await?;

        meta.sheets
            .into_iter()
            .find(|s| s.properties.title == tab)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| SheetError::TabNotFound(tab.to_string()))
    }
}

#[async_trait]
impl SheetGateway for SheetsClient {
    async fn ensure_header(&self, tab: &str) -> SheetResult<bool> {
        let range = header_range(tab);
        let first = self.get_values(&range).await?;
        if first.first().is_some_and(|row| !is_blank(row)) {
            return Ok(false);
        }

        log::info!("writing header row into '{tab}'");
        self.put_values(&range, header_row()).await?;
        Ok(true)
    }

    async fn append_row(&self, tab: &str, values: &[String]) -> SheetResult<u32> {
        let sheet_id = self.config.require_sheet_id()?;
        let numeric_id = self.numeric_sheet_id(tab).await?;

        let cells: Vec<Value> = fit_to_columns(values)
            .into_iter()
            .map(|v| json!({ "userEnteredValue": { "stringValue": v } }))
            .collect();
        let builder = self
            .request(
                Method::POST,
                format!("{}:batchUpdate", self.spreadsheet_url(sheet_id)),
            )
            .await?
            .json(&json!({
                "requests": [{
                    "appendCells": {
                        "sheetId": numeric_id,
                        "rows": [{ "values": cells }],
                        "fields": "userEnteredValue",
                    }
                }]
            }));

        let _append = self.append_lock.lock().await;
        let _: Value = Self::send(builder).await?;
        let occupied = self.get_values(&columns_range(tab)).await?;
        // Row 1 is the header, so a data row can never land there.
        match u32::try_from(occupied.len()) {
            Ok(row) if row > 1 => {
                log::debug!("appended row {row} in '{tab}'");
                Ok(row)
            }
            _ => Err(SheetError::RowNotLocated(tab.to_string())),
        }
    }

    async fn update_row(&self, tab: &str, row: u32, values: &[String]) -> SheetResult<String> {
        let range = row_range(tab, row)?;
        let written = self.put_values(&range, fit_to_columns(values)).await?;
        if range_row(&written) != Some(row) {
            log::warn!("service reported {written} for an update of row {row}");
        }
        log::debug!("updated {written}");
        Ok(written)
    }

    async fn clear_row(&self, tab: &str, row: u32) -> SheetResult<String> {
        let range = row_range(tab, row)?;
        let sheet_id = self.config.require_sheet_id()?;
        let builder = self
            .request(
                Method::POST,
                format!("{}:clear", self.values_url(sheet_id, &range)),
            )
            .await?
            .json(&json!({}));
        let body: ClearValuesResponse = Self::send(builder).await?;

        let cleared = body.cleared_range.unwrap_or(range);
        log::debug!("cleared {cleared}");
        Ok(cleared)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pull `error.message` out of a Google API error body.
fn remote_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    match parsed.get("error")? {
        Value::String(s) => Some(s.clone()),
        error => error.get("message")?.as_str().map(str::to_string),
    }
}

use crate::error::{SheetError, SheetResult};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_TAB: &str = "Sheet1";
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STORE: &str = "database/car_entries.json";

/// Connection settings for the mirrored spreadsheet.
///
/// Read once at start-up. Missing credentials or sheet id are not an error
/// here; the gateway reports them when an operation is attempted.
#[derive(Clone, Debug)]
pub struct SheetConfig {
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    pub sheet_id: Option<String>,
    pub tab: String,
    pub api_base: String,
    pub token_uri: String,
}

/// Service account identity, present only when both halves are configured.
#[derive(Clone, Debug)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
}

impl SheetConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        SheetConfig {
            client_email: non_empty("GOOGLE_SERVICE_ACCOUNT_EMAIL"),
            private_key: non_empty("GOOGLE_PRIVATE_KEY").map(|k| unescape_key(&k)),
            sheet_id: non_empty("SHEET_ID"),
            tab: non_empty("SHEET_TAB").unwrap_or_else(|| DEFAULT_TAB.to_string()),
            api_base: non_empty("SHEETS_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token_uri: non_empty("GOOGLE_TOKEN_URI")
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        }
    }

    pub fn service_account(&self) -> SheetResult<ServiceAccount> {
        match (&self.client_email, &self.private_key) {
            (Some(email), Some(key)) => Ok(ServiceAccount {
                client_email: email.clone(),
                private_key: key.clone(),
            }),
            _ => Err(SheetError::Config(
                "Missing Google service account env".to_string(),
            )),
        }
    }

    pub fn require_sheet_id(&self) -> SheetResult<&str> {
        self.sheet_id
            .as_deref()
            .ok_or_else(|| SheetError::Config("Missing SHEET_ID env".to_string()))
    }
}

// Keys pasted into a single-line env var carry literal "\n" sequences.
fn unescape_key(key: &str) -> String {
    if key.contains("\\n") {
        key.replace("\\n", "\n")
    } else {
        key.to_string()
    }
}

/// Process-wide settings for the server binary.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub store_path: PathBuf,
    pub sheet: SheetConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let addr = std::env::var("FLEETSHEET_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()?;
        let store_path = std::env::var("FLEETSHEET_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE));

        Ok(AppConfig {
            addr,
            store_path,
            sheet: SheetConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> SheetConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SheetConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.tab, "Sheet1");
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.token_uri, DEFAULT_TOKEN_URI);
        assert!(matches!(cfg.service_account(), Err(SheetError::Config(_))));
        assert!(matches!(cfg.require_sheet_id(), Err(SheetError::Config(_))));
    }

    #[test]
    fn private_key_newlines_are_unescaped() {
        let cfg = config(&[
            ("GOOGLE_SERVICE_ACCOUNT_EMAIL", "bot@project.iam.gserviceaccount.com"),
            ("GOOGLE_PRIVATE_KEY", "-----BEGIN-----\\nabc\\n-----END-----"),
            ("SHEET_ID", "sheet-123"),
            ("SHEET_TAB", "Cars"),
            ("SHEETS_API_BASE", "http://localhost:9000/"),
        ]);
        let account = cfg.service_account().unwrap();
        assert_eq!(account.private_key, "-----BEGIN-----\nabc\n-----END-----");
        assert_eq!(cfg.require_sheet_id().unwrap(), "sheet-123");
        assert_eq!(cfg.tab, "Cars");
        assert_eq!(cfg.api_base, "http://localhost:9000");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = config(&[("SHEET_ID", "  "), ("SHEET_TAB", "")]);
        assert!(cfg.sheet_id.is_none());
        assert_eq!(cfg.tab, "Sheet1");
    }
}

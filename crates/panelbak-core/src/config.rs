//! Panel connection settings
//!
//! Exactly four values drive a run. They are read once at startup and
//! passed by reference from then on.

use crate::error::PanelError;
use std::fmt;

pub const ENV_SERVER_ID: &str = "SERVERID";
pub const ENV_API_KEY: &str = "APIKEY";
pub const ENV_BACKUP_NUM: &str = "BACKUPNUM";
pub const ENV_PANEL_URL: &str = "PANELURL";

/// Validated configuration for one run
#[derive(Clone, PartialEq, Eq)]
pub struct PanelConfig {
    /// Panel-assigned server identifier, embedded in the URL path
    pub server_id: String,
    /// Bearer token for the `Authorization` header
    pub api_key: String,
    /// Zero-based position in the panel's backup list
    pub backup_index: usize,
    /// Panel host, with or without scheme
    pub panel_host: String,
}

impl PanelConfig {
    /// Build a config from raw values, rejecting blanks and a non-numeric index
    pub fn new(
        server_id: &str,
        api_key: &str,
        backup_index: &str,
        panel_host: &str,
    ) -> Result<Self, PanelError> {
        let server_id = required(ENV_SERVER_ID, server_id)?;
        let api_key = required(ENV_API_KEY, api_key)?;
        let backup_index = parse_index(&required(ENV_BACKUP_NUM, backup_index)?)?;
        let panel_host = required(ENV_PANEL_URL, panel_host)?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            server_id,
            api_key,
            backup_index,
            panel_host,
        })
    }

    /// Panel root URL; `https://` unless the host already names a scheme
    pub fn base_url(&self) -> String {
        if self.panel_host.starts_with("https://") || self.panel_host.starts_with("http://") {
            self.panel_host.clone()
        } else {
            format!("https://{}", self.panel_host)
        }
    }

    pub fn backups_url(&self) -> String {
        format!(
            "{}/api/client/servers/{}/backups",
            self.base_url(),
            self.server_id
        )
    }

    pub fn download_link_url(&self, backup_uuid: &str) -> String {
        format!("{}/{}/download", self.backups_url(), backup_uuid)
    }
}

impl fmt::Debug for PanelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelConfig")
            .field("server_id", &self.server_id)
            .field("api_key", &"<redacted>")
            .field("backup_index", &self.backup_index)
            .field("panel_host", &self.panel_host)
            .finish()
    }
}

fn required(key: &'static str, value: &str) -> Result<String, PanelError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PanelError::config(key, "is not set"));
    }
    Ok(value.to_string())
}

/// Digits only; `usize::from_str` would also take a leading `+`
fn parse_index(value: &str) -> Result<usize, PanelError> {
    let invalid = || PanelError::config(ENV_BACKUP_NUM, "must be a non-negative integer");
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

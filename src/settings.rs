use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::statement::{SignRules, StatementRules, DEFAULT_STATEMENT_MARKERS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    /// Chart of accounts document; defaults to `<data_dir>/config/chart of accounts.pdf`.
    #[serde(default)]
    pub chart_of_accounts: Option<String>,
    /// Folder scanned when `process` is given no inputs.
    #[serde(default)]
    pub downloads_dir: Option<String>,
    #[serde(default = "default_parse_timeout_secs")]
    pub parse_timeout_secs: u64,
    #[serde(default)]
    pub skip_card_payments: bool,
    #[serde(default = "default_statement_markers")]
    pub statement_markers: Vec<String>,
    /// Description column width in characters, for statements that cut
    /// long vendors off mid-word.
    #[serde(default)]
    pub wrap_width: Option<usize>,
    #[serde(default)]
    pub sign_rules: SignRules,
}

fn default_parse_timeout_secs() -> u64 {
    30
}

fn default_statement_markers() -> Vec<String> {
    DEFAULT_STATEMENT_MARKERS.iter().map(|s| s.to_string()).collect()
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            chart_of_accounts: None,
            downloads_dir: None,
            parse_timeout_secs: default_parse_timeout_secs(),
            skip_card_payments: false,
            statement_markers: default_statement_markers(),
            wrap_width: None,
            sign_rules: SignRules::default(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_path().join("coding_history.db")
    }

    pub fn chart_path(&self) -> PathBuf {
        match &self.chart_of_accounts {
            Some(p) => PathBuf::from(shellexpand_path(p)),
            None => self.data_path().join("config").join("chart of accounts.pdf"),
        }
    }

    pub fn downloads_path(&self) -> PathBuf {
        match &self.downloads_dir {
            Some(p) => PathBuf::from(shellexpand_path(p)),
            None => self.data_path().join("downloads"),
        }
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs.max(1))
    }

    pub fn statement_rules(&self, default_year: i32) -> StatementRules {
        StatementRules {
            markers: self.statement_markers.clone(),
            sign: self.sign_rules.clone(),
            wrap_width: self.wrap_width,
            skip_card_payments: self.skip_card_payments,
            default_year,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cardledger")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cardledger")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| LedgerError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

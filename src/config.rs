// ⚙️ Configuration - JSON file + environment overrides

use crate::plans::{PlanCatalog, DEFAULT_PLAN};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_ENV: &str = "FINANCE_CONFIG";
pub const DB_PATH_ENV: &str = "FINANCE_DB_PATH";
pub const BIND_ADDR_ENV: &str = "FINANCE_BIND_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file standing in for the document store
    pub database_path: PathBuf,

    /// Address the API server listens on
    pub bind_addr: String,

    /// Plan written to first-time user documents
    pub default_plan: String,

    /// Optional JSON plan catalog; the built-in catalog is used otherwise
    pub catalog_path: Option<PathBuf>,

    /// tracing EnvFilter directive, used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("finance.db"),
            bind_addr: "0.0.0.0:3000".to_string(),
            default_plan: DEFAULT_PLAN.to_string(),
            catalog_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Config file named by FINANCE_CONFIG (defaults if unset or unreadable),
    /// then single-field environment overrides.
    ///
    /// Runs before any subscriber exists, so a file that failed to load is
    /// handed back for the caller to report.
    pub fn from_env() -> (Self, Option<anyhow::Error>) {
        let (mut config, load_error) = match env::var(CONFIG_ENV) {
            Ok(path) => match AppConfig::load(&path) {
                Ok(config) => (config, None),
                Err(e) => (AppConfig::default(), Some(e)),
            },
            Err(_) => (AppConfig::default(), None),
        };

        if let Ok(db) = env::var(DB_PATH_ENV) {
            config.database_path = PathBuf::from(db);
        }
        if let Ok(addr) = env::var(BIND_ADDR_ENV) {
            config.bind_addr = addr;
        }

        (config, load_error)
    }

    /// Log a `from_env` load failure once tracing is installed
    pub fn report_load_error(error: &anyhow::Error) {
        warn!(error = format!("{:#}", error), "config not loaded, using defaults");
    }

    /// Catalog from `catalog_path`, or the standard catalog. The default plan
    /// must exist in whichever catalog is used.
    pub fn load_catalog(&self) -> Result<PlanCatalog> {
        let catalog = match &self.catalog_path {
            Some(path) => PlanCatalog::from_file(path)?,
            None => PlanCatalog::standard(),
        };

        if !catalog.contains(&self.default_plan) {
            bail!("default plan '{}' is not in the plan catalog", self.default_plan);
        }

        Ok(catalog)
    }

    /// Filter for tracing-subscriber: RUST_LOG wins over the config value
    pub fn log_directive(&self) -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| self.log_filter.clone())
    }
}

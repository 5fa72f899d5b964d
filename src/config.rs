//! Server configuration read from the command line.

use crate::auth::AuthConfig;
use crate::dispatcher::{DEFAULT_EXPORT_BASE_URL, DispatchConfig};
use crate::error::ConfigError;
use crate::grid::Workbook;
use crate::saving;
use crate::spreadsheet::MemoryWorkbook;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sheetlog-server", about = "Spreadsheet-backed JSON API")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Users file; without it a single anonymous user has full access
    #[arg(long)]
    pub users: Option<PathBuf>,

    /// Workbook snapshot, loaded at start and rewritten after every write
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Tab to create when the workbook does not have it (repeatable)
    #[arg(long = "sheet")]
    pub sheets: Vec<String>,

    #[arg(long, default_value = "local")]
    pub spreadsheet_id: String,

    /// Prefix of the csvUrl and sheetUrl links
    #[arg(long, default_value = DEFAULT_EXPORT_BASE_URL)]
    pub export_base_url: String,
}

impl ServerConfig {
    pub fn load_auth(&self) -> Result<AuthConfig, ConfigError> {
        match &self.users {
            Some(path) => AuthConfig::load(path),
            None => Ok(AuthConfig::default()),
        }
    }

    /// Load the snapshot when one exists, otherwise start empty, then add any
    /// requested tab that is missing.
    pub fn load_workbook(&self) -> Result<MemoryWorkbook, ConfigError> {
        let mut workbook = match &self.data {
            Some(path) if path.exists() => saving::load_workbook(path)?,
            _ => MemoryWorkbook::new(&self.spreadsheet_id),
        };

        for name in &self.sheets {
            if workbook.find_sheet(name).is_none() {
                workbook.add_sheet(name);
            }
        }
        Ok(workbook)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            export_base_url: self.export_base_url.clone(),
            ..DispatchConfig::default()
        }
    }
}

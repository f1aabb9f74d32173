//! Configuration management for Docpack Server

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_EXPORT_BASE: &str = "https://docs.google.com/spreadsheets/d";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub assets: AssetsConfig,
    pub converter: ConverterConfig,
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Multipart body limit in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AssetsConfig {
    /// Root for template files and the instruction document
    pub base_dir: PathBuf,
    /// JSON template catalog
    pub catalog_path: PathBuf,
    /// Directory holding the per-kit spreadsheet templates
    pub kits_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Office converter binary used for DOCX -> PDF
    pub soffice_bin: String,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub timeout_secs: u64,
    /// Base of the CSV export URL, `{base}/{id}/export?format=csv&gid={gid}`
    pub export_base: String,
}

impl AssetsConfig {
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        AssetsConfig {
            catalog_path: base_dir.join("templates.json"),
            kits_dir: base_dir.join("table_templates"),
            base_dir,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                max_upload_bytes: 20 * 1024 * 1024,
            },
            assets: AssetsConfig::from_base_dir("."),
            converter: ConverterConfig {
                soffice_bin: "soffice".to_string(),
            },
            sheets: SheetsConfig {
                timeout_secs: 30,
                export_base: DEFAULT_EXPORT_BASE.to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dir = PathBuf::from(env::var("DOCPACK_BASE_DIR").unwrap_or_else(|_| ".".to_string()));
        let defaults = AssetsConfig::from_base_dir(&base_dir);

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8000)?,
                max_upload_bytes: megabytes("MAX_UPLOAD_MB", parse_var("MAX_UPLOAD_MB", 20)?)?,
            },
            assets: AssetsConfig {
                catalog_path: env::var("DOCPACK_CATALOG")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.catalog_path),
                kits_dir: env::var("DOCPACK_KITS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.kits_dir),
                base_dir,
            },
            converter: ConverterConfig {
                soffice_bin: env::var("SOFFICE_BIN").unwrap_or_else(|_| "soffice".to_string()),
            },
            sheets: SheetsConfig {
                timeout_secs: parse_var("GSHEET_TIMEOUT_SECS", 30)?,
                export_base: env::var("GSHEET_EXPORT_BASE")
                    .map(|base| base.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| DEFAULT_EXPORT_BASE.to_string()),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        _ => Ok(default),
    }
}

fn megabytes(name: &'static str, mb: usize) -> Result<usize, ConfigError> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| ConfigError::InvalidNumber { name, value: mb.to_string() })
}

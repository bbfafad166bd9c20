//! Runtime settings and source configuration
//!
//! Sources come from a JSON file or from environment variables; both end up
//! as the same `SourcesConfig`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reconciler::codes::BRAND_CODES;
use reconciler::{brand_from_code, HeaderRow};
use serde::{Deserialize, Deserializer};
use tokio::fs;

use crate::cache::SheetRequest;
use crate::files::FileSheetSource;
use crate::http::HttpSheetSource;
use crate::source::SheetBackend;

// =============================================================================
// Runtime settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    Fs,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "sheets" => Ok(SourceKind::Http),
            "fs" | "file" | "files" => Ok(SourceKind::Fs),
            other => bail!("unknown SOURCE_KIND '{}' (expected http or fs)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_kind: SourceKind,
    pub source_dir: PathBuf,
    pub cache_ttl: Duration,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_kind = match lookup("SOURCE_KIND") {
            Some(kind) => kind.parse()?,
            None => SourceKind::default(),
        };
        Ok(Self {
            source_kind,
            source_dir: PathBuf::from(
                lookup("SOURCE_DIR").unwrap_or_else(|| "./data/sheets".to_string()),
            ),
            cache_ttl: Duration::from_secs(
                lookup("SHEET_CACHE_TTL_SECS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(300),
            ),
            http_timeout: Duration::from_secs(
                lookup("HTTP_TIMEOUT_SECS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(60),
            ),
        })
    }

    /// Build the configured sheet source.
    pub fn backend(&self) -> Result<SheetBackend> {
        Ok(match self.source_kind {
            SourceKind::Http => SheetBackend::Http(
                HttpSheetSource::new(self.http_timeout).context("Failed to build HTTP client")?,
            ),
            SourceKind::Fs => SheetBackend::Files(FileSheetSource::new(&self.source_dir)),
        })
    }
}

// =============================================================================
// Source configuration
// =============================================================================

/// Header row as written in config: a number, `"auto"`, or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderRowSetting {
    Index(usize),
    Text(String),
}

fn deserialize_header_row<'de, D>(deserializer: D) -> std::result::Result<HeaderRow, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<HeaderRowSetting>::deserialize(deserializer)? {
        None => Ok(HeaderRow::Auto),
        Some(HeaderRowSetting::Index(i)) => Ok(HeaderRow::Index(i)),
        Some(HeaderRowSetting::Text(text)) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// The base catalog sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default, deserialize_with = "deserialize_header_row")]
    pub header_row: HeaderRow,
}

impl SheetConfig {
    pub fn request(&self) -> SheetRequest {
        SheetRequest::new(self.spreadsheet_id.trim())
            .with_sheet(self.sheet.clone())
            .with_header_row(self.header_row)
    }
}

/// One brand's tracking sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BrandConfig {
    /// Two-letter brand code, e.g. `sp`
    pub code: String,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default, deserialize_with = "deserialize_header_row")]
    pub header_row: HeaderRow,
    #[serde(default)]
    pub shot_column: Option<String>,
    #[serde(default)]
    pub register_column: Option<String>,
}

impl BrandConfig {
    pub fn brand(&self) -> String {
        brand_from_code(&self.code)
    }

    /// `None` when no spreadsheet is configured; such brands are skipped.
    pub fn request(&self) -> Option<SheetRequest> {
        let id = self.spreadsheet_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        Some(
            SheetRequest::new(id)
                .with_sheet(self.sheet.clone())
                .with_header_row(self.header_row),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourcesConfig {
    pub base: SheetConfig,
    #[serde(default)]
    pub brands: Vec<BrandConfig>,
}

impl SourcesConfig {
    /// Load from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read sources config {}", path.display()))?;
        let config: SourcesConfig =
            serde_json::from_str(&content).context("Failed to parse sources config")?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `BASE_*`, `BRANDS` and `<CODE>_*` variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let header_row = |key: &str| -> Result<HeaderRow> {
            match get(key) {
                Some(raw) => raw.parse().map_err(|e| anyhow!("{}: {}", key, e)),
                None => Ok(HeaderRow::Auto),
            }
        };

        let base = SheetConfig {
            spreadsheet_id: get("BASE_SPREADSHEET_ID").context("BASE_SPREADSHEET_ID env var missing")?,
            sheet: get("BASE_SHEET_NAME"),
            header_row: header_row("BASE_HEADER_ROW")?,
        };

        let codes: Vec<String> = match get("BRANDS") {
            Some(list) => list
                .split(',')
                .map(|c| c.trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            None => BRAND_CODES.iter().map(|(code, _)| code.to_string()).collect(),
        };

        let mut brands = Vec::with_capacity(codes.len());
        for code in codes {
            let prefix = code.to_ascii_uppercase();
            brands.push(BrandConfig {
                spreadsheet_id: get(&format!("{}_SPREADSHEET_ID", prefix)),
                sheet: get(&format!("{}_SHEET_NAME", prefix)),
                header_row: header_row(&format!("{}_HEADER_ROW", prefix))?,
                shot_column: get(&format!("{}_SHOT_COLUMN", prefix)),
                register_column: get(&format!("{}_REGISTER_COLUMN", prefix)),
                code,
            });
        }

        Ok(Self { base, brands })
    }

    /// Brands that have a spreadsheet configured.
    pub fn active_brands(&self) -> impl Iterator<Item = &BrandConfig> {
        self.brands.iter().filter(|b| b.request().is_some())
    }
}

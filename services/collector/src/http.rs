//! Google Sheets CSV export over HTTP

use std::time::Duration;

use tracing::debug;

use crate::error::SourceError;
use crate::source::{decode_text, parse_csv_grid, Grid, SheetSource};

pub const DEFAULT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

const USER_AGENT: &str = "merch-status-collector/0.1 (internal merchandising dashboard)";

#[derive(Debug, Clone)]
pub struct HttpSheetSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSheetSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at a different export host (mirrors, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Export request for one sheet: the gviz endpoint when a sheet name is
    /// given, the plain CSV export of the first sheet otherwise.
    fn request(&self, spreadsheet_id: &str, sheet: Option<&str>) -> reqwest::RequestBuilder {
        match sheet {
            Some(name) => self
                .client
                .get(format!("{}/{}/gviz/tq", self.base_url, spreadsheet_id))
                .query(&[("tqx", "out:csv"), ("sheet", name)]),
            None => self
                .client
                .get(format!("{}/{}/export", self.base_url, spreadsheet_id))
                .query(&[("format", "csv")]),
        }
    }
}

impl SheetSource for HttpSheetSource {
    async fn fetch_grid(&self, source_id: &str, sheet: Option<&str>) -> Result<Grid, SourceError> {
        let resp = self.request(source_id, sheet).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        debug!(source = source_id, bytes = bytes.len(), "sheet downloaded");

        let grid = parse_csv_grid(&decode_text(&bytes))?;
        if grid.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(grid)
    }
}

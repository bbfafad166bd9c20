//! Sheet sources
//!
//! A source turns `(source id, sheet name)` into a raw grid of cell text.
//! Header detection, normalization and everything after happen in the
//! reconciler; sources only move bytes and decode them.

use std::future::Future;

use encoding_rs::EUC_KR;
use sha2::{Digest, Sha256};

use crate::error::SourceError;
use crate::files::FileSheetSource;
use crate::http::HttpSheetSource;

/// Raw cell text, row-major, header row not yet identified.
pub type Grid = Vec<Vec<String>>;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub trait SheetSource: Send + Sync + 'static {
    /// Fetch one sheet. `sheet` of `None` means the source's default sheet.
    fn fetch_grid(
        &self,
        source_id: &str,
        sheet: Option<&str>,
    ) -> impl Future<Output = Result<Grid, SourceError>> + Send;
}

/// The source selected at startup.
#[derive(Debug, Clone)]
pub enum SheetBackend {
    Http(HttpSheetSource),
    Files(FileSheetSource),
}

impl SheetSource for SheetBackend {
    async fn fetch_grid(&self, source_id: &str, sheet: Option<&str>) -> Result<Grid, SourceError> {
        match self {
            SheetBackend::Http(source) => source.fetch_grid(source_id, sheet).await,
            SheetBackend::Files(source) => source.fetch_grid(source_id, sheet).await,
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// UTF-8 with the BOM stripped; anything that is not valid UTF-8 is read as
/// EUC-KR, which is what Korean Excel exports default to.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, had_errors) = EUC_KR.decode(bytes);
            if had_errors {
                tracing::debug!("EUC-KR decode replaced malformed sequences");
            }
            text.into_owned()
        }
    }
}

/// Parse CSV text into a grid. Ragged rows are kept as they are.
pub fn parse_csv_grid(text: &str) -> Result<Grid, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(grid)
}

/// Content fingerprint of a grid: `sha256:<hex>`.
pub fn fingerprint(grid: &[Vec<String>]) -> String {
    let mut hasher = Sha256::new();
    for row in grid {
        for cell in row {
            hasher.update(cell.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // decode_text
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("스타일코드,수량".as_bytes());
        assert_eq!(decode_text(&bytes), "스타일코드,수량");
    }

    #[test]
    fn test_decode_euc_kr_fallback() {
        let (encoded, _, _) = EUC_KR.encode("품번,리터칭완료");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_text(&encoded), "품번,리터칭완료");
    }

    // -------------------------------------------------------------------------
    // parse_csv_grid
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_csv_grid_keeps_ragged_rows() {
        let grid = parse_csv_grid("a,b,c\n1,2\n\"x, y\",z,w,extra\n").unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], vec!["1", "2"]);
        assert_eq!(grid[2][0], "x, y");
        assert_eq!(grid[2].len(), 4);
    }

    #[test]
    fn test_parse_csv_grid_empty() {
        assert!(parse_csv_grid("").unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // fingerprint
    // -------------------------------------------------------------------------

    #[test]
    fn test_fingerprint_stable_and_cell_sensitive() {
        let a = vec![vec!["ab".to_string(), "c".to_string()]];
        let b = vec![vec!["a".to_string(), "bc".to_string()]];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert!(fingerprint(&a).starts_with("sha256:"));
        assert_eq!(fingerprint(&a).len(), "sha256:".len() + 64);
    }
}

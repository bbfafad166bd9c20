//! Local sheet files
//!
//! CSV exports and Excel/ODS workbooks dropped into a directory. Relative
//! source ids resolve against the configured root.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use tokio::fs;

use crate::error::SourceError;
use crate::source::{decode_text, parse_csv_grid, Grid, SheetSource};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone)]
pub struct FileSheetSource {
    root: PathBuf,
}

impl FileSheetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, source_id: &str) -> PathBuf {
        let path = Path::new(source_id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl SheetSource for FileSheetSource {
    async fn fetch_grid(&self, source_id: &str, sheet: Option<&str>) -> Result<Grid, SourceError> {
        let path = self.resolve(source_id);

        let grid = if is_workbook(&path) {
            let sheet = sheet.map(str::to_string);
            tokio::task::spawn_blocking(move || read_workbook(&path, sheet.as_deref()))
                .await
                .map_err(|e| SourceError::Workbook(e.to_string()))??
        } else {
            let bytes = fs::read(&path).await?;
            parse_csv_grid(&decode_text(&bytes))?
        };

        if grid.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(grid)
    }
}

/// Read one worksheet, the named one or the first.
pub fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Grid, SourceError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.trim() == wanted.trim())
            .cloned()
            .ok_or_else(|| SourceError::SheetNotFound(wanted.to_string()))?,
        None => names.first().cloned().ok_or(SourceError::Empty)?,
    };

    let range = workbook.worksheet_range(&name)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Cell as text. Date cells become their serial day number so the date
/// interpreter sees the same thing an exported CSV would carry.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::EUC_KR;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[tokio::test]
    async fn test_reads_utf8_csv_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.csv", "\u{feff}스타일코드,입고수량\nSP00001G1,3\n".as_bytes());

        let source = FileSheetSource::new(dir.path());
        let grid = source.fetch_grid("base.csv", None).await.unwrap();
        assert_eq!(grid[0], vec!["스타일코드", "입고수량"]);
        assert_eq!(grid[1], vec!["SP00001G1", "3"]);
    }

    #[tokio::test]
    async fn test_reads_euc_kr_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (encoded, _, _) = EUC_KR.encode("품번,리터칭완료\nCV0000F2,2025-03-14\n");
        write_file(dir.path(), "cv.csv", &encoded);

        let source = FileSheetSource::new("/nonexistent");
        let absolute = dir.path().join("cv.csv");
        let grid = source
            .fetch_grid(absolute.to_str().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(grid[0], vec!["품번", "리터칭완료"]);
        assert_eq!(grid[1][1], "2025-03-14");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSheetSource::new(dir.path());
        let err = source.fetch_grid("missing.csv", None).await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "empty.csv", b"");
        let source = FileSheetSource::new(dir.path());
        let err = source.fetch_grid("empty.csv", None).await.unwrap_err();
        assert!(matches!(err, SourceError::Empty));
    }

    #[test]
    fn test_workbook_extension_detection() {
        assert!(is_workbook(Path::new("a/b/Stock.XLSX")));
        assert!(is_workbook(Path::new("tracking.ods")));
        assert!(!is_workbook(Path::new("tracking.csv")));
        assert!(!is_workbook(Path::new("tracking")));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("  SP001 ".to_string())), "SP001");
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Int(12)), "12");
    }
}

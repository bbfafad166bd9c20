//! TTL-cached sheet loader
//!
//! Entries are immutable once stored, expired on read, and the entry count
//! is bounded with the oldest entry evicted first. Failed fetches are never
//! cached so a flaky source is retried on the next run.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reconciler::{HeaderRow, Sheet, Snapshot};
use tracing::{debug, info, warn};

use crate::source::{fingerprint, SheetSource};

pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Cache key: one sheet of one source read with one header-row setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRequest {
    pub source_id: String,
    pub sheet: Option<String>,
    pub header_row: HeaderRow,
}

impl SheetRequest {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            sheet: None,
            header_row: HeaderRow::Auto,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_header_row(mut self, header_row: HeaderRow) -> Self {
        self.header_row = header_row;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    sheet: Sheet,
    fingerprint: String,
    created_at: Instant,
}

pub struct SheetLoader<S> {
    source: S,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<SheetRequest, CacheEntry>>,
}

impl<S: SheetSource> SheetLoader<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of live entries.
    pub fn cached_entries(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.expire(&mut entries);
        entries.len()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn expire(&self, entries: &mut HashMap<SheetRequest, CacheEntry>) {
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
    }

    fn cached(&self, request: &SheetRequest) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.expire(&mut entries);
        entries.get(request).cloned()
    }

    fn store(&self, request: &SheetRequest, entry: CacheEntry) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.expire(&mut entries);
        while entries.len() >= self.max_entries && !entries.contains_key(request) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
        entries.insert(request.clone(), entry);
    }

    /// Snapshot for one request. Never fails: transport errors come back
    /// as an unavailable snapshot carrying the reason.
    pub async fn load(&self, request: &SheetRequest) -> Snapshot {
        if let Some(entry) = self.cached(request) {
            debug!(source = %request.source_id, "sheet cache hit");
            return Snapshot::Loaded {
                sheet: entry.sheet,
                fingerprint: Some(entry.fingerprint),
            };
        }

        match self
            .source
            .fetch_grid(&request.source_id, request.sheet.as_deref())
            .await
        {
            Ok(grid) => {
                let fingerprint = fingerprint(&grid);
                let sheet = Sheet::from_grid(grid, request.header_row);
                info!(
                    source = %request.source_id,
                    sheet = request.sheet.as_deref().unwrap_or("-"),
                    rows = sheet.len(),
                    %fingerprint,
                    "sheet loaded"
                );
                self.store(
                    request,
                    CacheEntry {
                        sheet: sheet.clone(),
                        fingerprint: fingerprint.clone(),
                        created_at: Instant::now(),
                    },
                );
                Snapshot::Loaded {
                    sheet,
                    fingerprint: Some(fingerprint),
                }
            }
            Err(err) => {
                warn!(source = %request.source_id, error = %err, "sheet unavailable");
                Snapshot::unavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::Grid;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory source keyed by source id; unknown ids fail.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub grids: HashMap<String, Grid>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        pub fn with(mut self, source_id: &str, rows: &[&[&str]]) -> Self {
            let grid = rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect();
            self.grids.insert(source_id.to_string(), grid);
            self
        }
    }

    impl SheetSource for FakeSource {
        async fn fetch_grid(&self, source_id: &str, _sheet: Option<&str>) -> Result<Grid, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.grids
                .get(source_id)
                .cloned()
                .ok_or_else(|| SourceError::Status {
                    status: 404,
                    url: source_id.to_string(),
                })
        }
    }

    fn base_source() -> FakeSource {
        FakeSource::default().with("base", &[&["스타일코드", "입고수량"], &["SP00001G1", "3"]])
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_load_builds_sheet_with_fingerprint() {
        let loader = SheetLoader::new(base_source(), Duration::from_secs(60));
        let snapshot = loader.load(&SheetRequest::new("base")).await;
        match snapshot {
            Snapshot::Loaded { sheet, fingerprint } => {
                assert_eq!(sheet.headers(), &["스타일코드".to_string(), "입고수량".to_string()]);
                assert_eq!(sheet.len(), 1);
                assert!(fingerprint.unwrap().starts_with("sha256:"));
            }
            other => panic!("expected loaded snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_unavailable_and_is_not_cached() {
        let source = FakeSource::default();
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::from_secs(60));

        let first = loader.load(&SheetRequest::new("missing")).await;
        let second = loader.load(&SheetRequest::new("missing")).await;
        assert!(matches!(first, Snapshot::Unavailable { ref reason } if reason.contains("404")));
        assert!(matches!(second, Snapshot::Unavailable { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.cached_entries(), 0);
    }

    // -------------------------------------------------------------------------
    // Caching
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let source = base_source();
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::from_secs(60));

        let request = SheetRequest::new("base");
        let first = loader.load(&request).await;
        let second = loader.load(&request).await;
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_header_row_is_part_of_the_key() {
        let source = base_source();
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::from_secs(60));

        loader.load(&SheetRequest::new("base")).await;
        loader
            .load(&SheetRequest::new("base").with_header_row(HeaderRow::Index(0)))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.cached_entries(), 2);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let source = base_source();
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::from_millis(30));

        let request = SheetRequest::new("base");
        loader.load(&request).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(loader.cached_entries(), 0);
        loader.load(&request).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let source = base_source();
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::ZERO);

        let request = SheetRequest::new("base");
        loader.load(&request).await;
        loader.load(&request).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_when_full() {
        let source = base_source()
            .with("a", &[&["품번"], &["CV0000F2"]])
            .with("b", &[&["품번"], &["MI00001G1"]]);
        let calls = Arc::clone(&source.calls);
        let loader = SheetLoader::new(source, Duration::from_secs(60)).with_max_entries(2);

        loader.load(&SheetRequest::new("base")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        loader.load(&SheetRequest::new("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        loader.load(&SheetRequest::new("b")).await;
        assert_eq!(loader.cached_entries(), 2);

        // "a" survived, "base" was evicted
        loader.load(&SheetRequest::new("a")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        loader.load(&SheetRequest::new("base")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_blank_sheet_name_means_default() {
        let request = SheetRequest::new("base").with_sheet(Some("  ".to_string()));
        assert_eq!(request.sheet, None);
    }
}

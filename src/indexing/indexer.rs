use crate::core::config::{Config, IndexSettings};
use crate::core::error::{Error, Result};
use crate::indexing::scanner::{ScanEvent, ScanStats, Scanner};
use crate::search::embedder::Embedder;
use crate::search::engine::{SearchEngine, SearchHit, Strategy};
use crate::storage::files::{IndexStats, MetadataStore};
use crate::storage::record::FileRecord;
use crate::storage::schema::{self, IndexedColumn};
use crate::storage::vectors::EmbeddingIndex;
use redb::Database;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Entry point for indexing and querying.
///
/// Owns the stores and the optional embedder. At most one scan runs at a
/// time; searches may run while a scan is in progress and then see the
/// records written so far.
#[derive(Clone)]
pub struct FileIndexer {
    store: MetadataStore,
    vectors: EmbeddingIndex,
    embedder: Option<Arc<dyn Embedder>>,
    settings: IndexSettings,
    engine: Arc<SearchEngine>,
    scanning: Arc<AtomicBool>,
}

impl FileIndexer {
    /// Open the index database described by `config`
    pub fn open(config: &Config, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let db = schema::open_database(config)?;
        Ok(Self::new(db, embedder, IndexSettings::default()))
    }

    pub fn new(
        db: Arc<Database>,
        embedder: Option<Arc<dyn Embedder>>,
        settings: IndexSettings,
    ) -> Self {
        let store = MetadataStore::new(Arc::clone(&db));
        let vectors = EmbeddingIndex::new(db);
        let engine = SearchEngine::new(store.clone(), vectors.clone(), embedder.clone());

        Self {
            store,
            vectors,
            embedder,
            settings,
            engine: Arc::new(engine),
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Same stores, different embedding capability
    pub fn with_embedder(&self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let engine = SearchEngine::new(self.store.clone(), self.vectors.clone(), embedder.clone());
        Self {
            store: self.store.clone(),
            vectors: self.vectors.clone(),
            embedder,
            settings: self.settings,
            engine: Arc::new(engine),
            scanning: Arc::clone(&self.scanning),
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn vectors(&self) -> &EmbeddingIndex {
        &self.vectors
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Scan `root` on the calling thread.
    ///
    /// Fails with [`Error::ScanInProgress`] without touching the index when
    /// another scan is running.
    pub fn index(
        &self,
        root: &Path,
        clear_old: bool,
        progress: Option<&Sender<ScanEvent>>,
    ) -> Result<ScanStats> {
        let _guard = ScanGuard::acquire(&self.scanning)?;
        self.scanner().scan(root, clear_old, progress)
    }

    /// Scan `root` on a worker thread.
    ///
    /// The exclusivity check happens before the thread is started, so a
    /// refused call returns immediately.
    pub fn spawn_index(
        &self,
        root: PathBuf,
        clear_old: bool,
        progress: Option<Sender<ScanEvent>>,
    ) -> Result<JoinHandle<Result<ScanStats>>> {
        let guard = ScanGuard::acquire(&self.scanning)?;
        let scanner = self.scanner();

        let handle = thread::Builder::new()
            .name("filescout-scan".to_string())
            .spawn(move || {
                let _guard = guard;
                scanner.scan(&root, clear_old, progress.as_ref())
            })?;
        Ok(handle)
    }

    pub fn search(&self, query: &str, strategy: Strategy, limit: usize) -> Result<Vec<SearchHit>> {
        self.engine.search(query, strategy, limit)
    }

    /// Search with the configured default limit
    pub fn search_default(&self, query: &str, strategy: Strategy) -> Result<Vec<SearchHit>> {
        self.search(query, strategy, self.settings.default_limit)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    pub fn records_with(&self, column: IndexedColumn, value: &str) -> Result<Vec<FileRecord>> {
        self.store.records_with(column, value)
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(
            self.store.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
            self.settings,
        )
    }
}

/// Holds the single-scan flag; released on drop, including during unwinding.
struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl ScanGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ScanInProgress)?;
        debug!("Scan slot acquired");
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedder::HashEmbedder;
    use std::fs;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn open_indexer(temp_dir: &TempDir, embedder: Option<Arc<dyn Embedder>>) -> FileIndexer {
        let config = Config::new(Some(temp_dir.path().join("scout"))).unwrap();
        FileIndexer::open(&config, embedder).unwrap()
    }

    fn make_tree(temp_dir: &TempDir, files: usize) -> PathBuf {
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        for i in 0..files {
            fs::write(root.join(format!("file{}.txt", i)), "contents").unwrap();
        }
        root
    }

    /// Blocks inside `embed` until the test releases it
    struct GateEmbedder {
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl Embedder for GateEmbedder {
        fn model_name(&self) -> &str {
            "gate"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(vec![1.0, 0.0])
        }
    }

    struct PanickingEmbedder;

    impl Embedder for PanickingEmbedder {
        fn model_name(&self) -> &str {
            "panicking"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            panic!("embedder crashed");
        }
    }

    #[test]
    fn test_index_and_search() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 3);
        let indexer = open_indexer(&temp_dir, None);

        let stats = indexer.index(&root, true, None).unwrap();
        assert_eq!(stats.indexed, 3);
        assert!(!indexer.is_scanning());

        let hits = indexer.search("file1", Strategy::Exact, 50).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.name, "file1.txt");

        let hits = indexer.search_default("file", Strategy::Fuzzy).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_concurrent_scan_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 3);

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = GateEmbedder {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let indexer = open_indexer(&temp_dir, Some(Arc::new(gate)));

        let handle = indexer.spawn_index(root.clone(), true, None).unwrap();
        entered_rx.recv().unwrap();
        assert!(indexer.is_scanning());

        assert!(matches!(indexer.index(&root, true, None), Err(Error::ScanInProgress)));
        assert!(matches!(
            indexer.spawn_index(root.clone(), true, None),
            Err(Error::ScanInProgress)
        ));

        drop(release_tx);
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats, ScanStats { total: 3, indexed: 3, skipped: 0, errors: 0 });
        assert_eq!(indexer.store().len().unwrap(), 3);
        assert!(!indexer.is_scanning());

        // the slot is free again
        assert!(indexer.index(&root, false, None).is_ok());
    }

    #[test]
    fn test_guard_released_after_panic() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 1);
        let indexer = open_indexer(&temp_dir, Some(Arc::new(PanickingEmbedder)));

        let handle = indexer.spawn_index(root, true, None).unwrap();
        assert!(handle.join().is_err());
        assert!(!indexer.is_scanning());
    }

    #[test]
    fn test_invalid_root_releases_slot() {
        let temp_dir = TempDir::new().unwrap();
        let indexer = open_indexer(&temp_dir, None);

        let missing = temp_dir.path().join("missing");
        assert!(matches!(indexer.index(&missing, true, None), Err(Error::InvalidRoot(_))));
        assert!(!indexer.is_scanning());
    }

    #[test]
    fn test_spawned_progress_reaches_receiver() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 12);
        let indexer = open_indexer(&temp_dir, None);

        let (tx, rx) = mpsc::channel();
        let handle = indexer.spawn_index(root, false, Some(tx)).unwrap();
        let events: Vec<ScanEvent> = rx.into_iter().collect();
        let stats = handle.join().unwrap().unwrap();

        assert_eq!(events.first(), Some(&ScanEvent::Status("Starting indexing...".to_string())));
        assert_eq!(events.last(), Some(&ScanEvent::Counters(stats)));
        assert_eq!(stats.indexed, 12);
    }

    #[test]
    fn test_with_embedder_shares_stores() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 2);
        let indexer = open_indexer(&temp_dir, None);
        indexer.index(&root, true, None).unwrap();
        assert!(indexer.vectors().is_empty().unwrap());

        // no embedder: semantic behaves like metadata
        let hits = indexer.search("file", Strategy::Semantic, 50).unwrap();
        assert_eq!(hits.len(), 2);

        let with = indexer.with_embedder(Some(Arc::new(HashEmbedder::new())));
        assert!(with.has_embedder());
        assert_eq!(with.store().len().unwrap(), 2);
        // nothing embedded yet, so there is nothing to rank
        assert!(with.search("file", Strategy::Semantic, 50).unwrap().is_empty());

        with.index(&root, true, None).unwrap();
        assert_eq!(indexer.vectors().len().unwrap(), 2);
    }

    #[test]
    fn test_records_with() {
        let temp_dir = TempDir::new().unwrap();
        let root = make_tree(&temp_dir, 2);
        fs::write(root.join("data.csv"), "a,b").unwrap();
        let indexer = open_indexer(&temp_dir, None);
        indexer.index(&root, true, None).unwrap();

        let text = indexer.records_with(IndexedColumn::Type, "Text").unwrap();
        assert_eq!(text.len(), 2);

        let csv = indexer.records_with(IndexedColumn::Extension, ".csv").unwrap();
        assert_eq!(csv.len(), 1);
        assert_eq!(csv[0].name, "data.csv");

        let stats = indexer.stats().unwrap();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.distinct_types, 2);
    }
}

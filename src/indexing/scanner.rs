use crate::core::config::IndexSettings;
use crate::core::error::{Error, Result};
use crate::indexing::filter::{is_allowed_hidden, is_hidden, PathFilter};
use crate::search::embedder::Embedder;
use crate::storage::files::{calculate_file_hash, MetadataStore};
use crate::storage::record::{extension_of, now_seconds, unix_seconds, FileRecord, FileType};
use crate::storage::vectors::EmbeddingIndex;
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use std::fs::{self, Metadata};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files visited by the walk
    pub total: u64,
    pub indexed: u64,
    /// Ignored files plus pruned directories
    pub skipped: u64,
    pub errors: u64,
}

/// Progress notification sent while a scan runs
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Status(String),
    Counters(ScanStats),
}

/// Walks a directory tree and writes one record per file.
pub struct Scanner {
    store: MetadataStore,
    vectors: EmbeddingIndex,
    embedder: Option<Arc<dyn Embedder>>,
    settings: IndexSettings,
}

impl Scanner {
    pub fn new(
        store: MetadataStore,
        vectors: EmbeddingIndex,
        embedder: Option<Arc<dyn Embedder>>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            store,
            vectors,
            embedder,
            settings,
        }
    }

    /// Index every file under `root`.
    ///
    /// With `clear_old` the store is emptied before the walk starts. Failures on
    /// individual files are counted and logged; only an invalid root or a
    /// failure to clear the store aborts the scan.
    pub fn scan(
        &self,
        root: &Path,
        clear_old: bool,
        progress: Option<&Sender<ScanEvent>>,
    ) -> Result<ScanStats> {
        if !root.is_dir() {
            return Err(Error::InvalidRoot(root.to_path_buf()));
        }
        // Stored paths are absolute so a tree reached through a relative root
        // maps onto the same records.
        let root = std::path::absolute(root)?;
        let root = root.as_path();

        if clear_old {
            emit(progress, ScanEvent::Status("Clearing old index...".to_string()));
            self.store.clear()?;
            self.vectors.clear()?;
        }
        emit(progress, ScanEvent::Status("Starting indexing...".to_string()));
        info!("Indexing {}", root.display());

        let filter = PathFilter::rooted(root);
        let pruned = Arc::new(AtomicUsize::new(0));

        let walker = {
            let filter = filter.clone();
            let pruned = Arc::clone(&pruned);
            WalkBuilder::new(root)
                .standard_filters(false)
                .follow_links(false)
                .filter_entry(move |entry| {
                    if entry.depth() == 0 || !is_directory(entry) {
                        return true;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if (is_hidden(&name) && !is_allowed_hidden(&name))
                        || filter.should_ignore(entry.path(), true)
                    {
                        debug!("Pruning {}", entry.path().display());
                        pruned.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                    true
                })
                .build()
        };

        let interval = self.settings.progress_interval.max(1);
        let mut stats = ScanStats::default();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Failed to read directory entry: {}", err);
                    continue;
                }
            };
            if entry.depth() == 0 || is_directory(&entry) {
                continue;
            }

            let path = entry.path();
            if filter.should_ignore(path, false) {
                stats.total += 1;
                stats.skipped += 1;
            } else {
                match fs::metadata(path) {
                    // symlink to a directory
                    Ok(metadata) if metadata.is_dir() => continue,
                    Ok(metadata) => {
                        stats.total += 1;
                        match self.index_file(path, &metadata, entry.depth()) {
                            Ok(()) => stats.indexed += 1,
                            Err(err) => {
                                warn!("Failed to index {}: {}", path.display(), err);
                                stats.errors += 1;
                            }
                        }
                    }
                    Err(err) => {
                        warn!("Failed to stat {}: {}", path.display(), err);
                        stats.total += 1;
                        stats.errors += 1;
                    }
                }
            }

            if stats.total % interval == 0 {
                emit(progress, ScanEvent::Counters(snapshot(stats, &pruned)));
            }
        }

        let stats = snapshot(stats, &pruned);
        emit(progress, ScanEvent::Counters(stats));
        info!(
            total = stats.total,
            indexed = stats.indexed,
            skipped = stats.skipped,
            errors = stats.errors,
            "Indexing finished"
        );

        Ok(stats)
    }

    fn index_file(&self, path: &Path, metadata: &Metadata, depth: usize) -> Result<()> {
        let record = build_record(path, metadata, depth, self.settings.hash_size_limit)?;
        let embedding_text = record.embedding_text();
        let size = record.size;
        let id = self.store.upsert(record)?;

        if let Some(embedder) = &self.embedder {
            if size < self.settings.embedding_size_limit {
                let stored = embedder
                    .embed(&embedding_text)
                    .and_then(|vector| self.vectors.put(id, &vector));
                if let Err(err) = stored {
                    warn!("No embedding for {}: {}", path.display(), err);
                }
            }
        }

        Ok(())
    }
}

/// Extract a record from filesystem metadata. The id is assigned by the store.
pub fn build_record(
    path: &Path,
    metadata: &Metadata,
    depth: usize,
    hash_size_limit: u64,
) -> Result<FileRecord> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::Parsing(format!("No file name in {}", path.display())))?;
    let extension = extension_of(path);
    let parent_directory = path
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let size = metadata.len();
    let modified_at = metadata.modified().map(unix_seconds)?;
    let accessed_at = metadata.accessed().map(unix_seconds).unwrap_or(modified_at);
    let created_at = match metadata.created() {
        Ok(created) => unix_seconds(created),
        Err(_) => fallback_created(metadata, modified_at),
    };

    let content_hash = if size < hash_size_limit {
        match calculate_file_hash(path) {
            Ok(hash) => Some(hash),
            Err(err) => {
                debug!("Could not hash {}: {}", path.display(), err);
                None
            }
        }
    } else {
        None
    };

    Ok(FileRecord {
        id: 0,
        path: path.to_string_lossy().to_string(),
        hidden: name.starts_with('.'),
        name,
        file_type: FileType::from_extension(&extension),
        extension,
        size,
        created_at,
        modified_at,
        accessed_at,
        parent_directory,
        depth: depth as u32,
        indexed_at: now_seconds(),
        content_hash,
    })
}

#[cfg(unix)]
fn fallback_created(metadata: &Metadata, _modified_at: f64) -> f64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1e9
}

#[cfg(not(unix))]
fn fallback_created(_metadata: &Metadata, modified_at: f64) -> f64 {
    modified_at
}

fn is_directory(entry: &DirEntry) -> bool {
    entry.file_type().map_or(false, |ft| ft.is_dir())
}

fn snapshot(mut stats: ScanStats, pruned: &AtomicUsize) -> ScanStats {
    stats.skipped += pruned.load(Ordering::Relaxed) as u64;
    stats
}

fn emit(progress: Option<&Sender<ScanEvent>>, event: ScanEvent) {
    if let Some(sender) = progress {
        // Receiver may have gone away; the scan carries on regardless.
        let _ = sender.send(event);
    }
}

use crate::core::config::Config;
use crate::core::error::Result;
use crate::storage::record::{FileRecord, FileType};
use crate::storage::schema::{
    self, IndexedColumn, EMBEDDINGS_TABLE, FILES_TABLE, PATH_INDEX,
};
use redb::{Database, ReadableMultimapTable, ReadableTable};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Aggregate view over the whole index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_files: u64,
    pub total_size: u64,
    pub distinct_types: usize,
    /// (type, count) ordered by count descending
    pub type_histogram: Vec<(FileType, u64)>,
}

/// Durable table of file records, unique by path
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<Database>,
}

impl MetadataStore {
    /// Open or create the store described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(schema::open_database(config)?))
    }

    /// Wrap an already opened database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Insert or replace the record for `record.path`.
    ///
    /// An existing path keeps its id; the caller-supplied id is ignored. Any
    /// embedding stored for the previous version of the record is dropped.
    pub fn upsert(&self, mut record: FileRecord) -> Result<u64> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut files = write_txn.open_table(FILES_TABLE)?;
            let mut paths = write_txn.open_table(PATH_INDEX)?;

            let existing = paths.get(record.path.as_str())?.map(|guard| guard.value());
            let id = match existing {
                Some(id) => {
                    let previous = files
                        .get(id)?
                        .map(|guard| FileRecord::from_json(guard.value()))
                        .transpose()?;
                    if let Some(previous) = previous {
                        for column in IndexedColumn::ALL {
                            let mut index = write_txn.open_multimap_table(column.table())?;
                            index.remove(column.key(&previous), id)?;
                        }
                    }
                    let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
                    embeddings.remove(id)?;
                    id
                }
                None => {
                    let last = files.iter()?.next_back().transpose()?.map(|(k, _)| k.value());
                    last.map_or(1, |k| k + 1)
                }
            };

            record.id = id;
            let json_str = record.to_json()?;
            files.insert(id, json_str.as_str())?;
            paths.insert(record.path.as_str(), id)?;
            for column in IndexedColumn::ALL {
                let mut index = write_txn.open_multimap_table(column.table())?;
                index.insert(column.key(&record), id)?;
            }
            id
        };
        write_txn.commit()?;

        Ok(id)
    }

    /// Get a record by id
    pub fn get(&self, id: u64) -> Result<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES_TABLE)?;

        let result = match files.get(id)? {
            Some(guard) => FileRecord::from_json(guard.value()).map(Some),
            None => Ok(None),
        };
        result
    }

    /// Get a record by its unique path
    pub fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let paths = read_txn.open_table(PATH_INDEX)?;
            let id = paths.get(path)?.map(|guard| guard.value());
            id
        };
        match id {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    /// Fetch several records in one read transaction; unknown ids are skipped.
    pub fn get_many(&self, ids: &[u64]) -> Result<Vec<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES_TABLE)?;

        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(guard) = files.get(id)? {
                records.push(FileRecord::from_json(guard.value())?);
            }
        }
        Ok(records)
    }

    /// Remove the record for `path` together with its embedding.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut paths = write_txn.open_table(PATH_INDEX)?;
            let id = paths.remove(path)?.map(|guard| guard.value());
            match id {
                Some(id) => {
                    let mut files = write_txn.open_table(FILES_TABLE)?;
                    let previous = files
                        .remove(id)?
                        .map(|guard| FileRecord::from_json(guard.value()))
                        .transpose()?;
                    if let Some(previous) = previous {
                        for column in IndexedColumn::ALL {
                            let mut index = write_txn.open_multimap_table(column.table())?;
                            index.remove(column.key(&previous), id)?;
                        }
                    }
                    let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
                    embeddings.remove(id)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;

        Ok(removed)
    }

    /// Delete every record and every embedding.
    pub fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(FILES_TABLE)?;
        write_txn.delete_table(PATH_INDEX)?;
        write_txn.delete_table(EMBEDDINGS_TABLE)?;
        for column in IndexedColumn::ALL {
            write_txn.delete_multimap_table(column.table())?;
        }
        schema::open_tables(&write_txn)?;
        write_txn.commit()?;

        Ok(())
    }

    pub fn len(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES_TABLE)?;
        let len = files.len()?;
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All records accepted by `predicate`, in id order.
    pub fn scan<F>(&self, mut predicate: F) -> Result<Vec<FileRecord>>
    where
        F: FnMut(&FileRecord) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES_TABLE)?;

        let mut records = Vec::new();
        for item in files.iter()? {
            let (_id, value) = item?;
            let record = FileRecord::from_json(value.value())?;
            if predicate(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn all(&self) -> Result<Vec<FileRecord>> {
        self.scan(|_| true)
    }

    /// Records whose `column` equals `value` exactly, looked up through the secondary index.
    pub fn records_with(&self, column: IndexedColumn, value: &str) -> Result<Vec<FileRecord>> {
        let ids = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_multimap_table(column.table())?;
            let mut ids = Vec::new();
            for id in index.get(value)? {
                ids.push(id?.value());
            }
            ids
        };
        self.get_many(&ids)
    }

    /// Totals plus a per-type histogram built from the type index.
    pub fn stats(&self) -> Result<IndexStats> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES_TABLE)?;
        let type_index = read_txn.open_multimap_table(IndexedColumn::Type.table())?;

        let mut total_size = 0u64;
        for item in files.iter()? {
            let (_id, value) = item?;
            total_size += FileRecord::from_json(value.value())?.size;
        }

        let mut counts: HashMap<FileType, u64> = HashMap::new();
        for item in type_index.iter()? {
            let (key, ids) = item?;
            let file_type = FileType::from_name(key.value()).unwrap_or(FileType::Other);
            let mut count = 0u64;
            for id in ids {
                id?;
                count += 1;
            }
            if count > 0 {
                *counts.entry(file_type).or_default() += count;
            }
        }

        let mut type_histogram: Vec<(FileType, u64)> = counts.into_iter().collect();
        type_histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        Ok(IndexStats {
            total_files: files.len()?,
            total_size,
            distinct_types: type_histogram.len(),
            type_histogram,
        })
    }
}

/// Calculate SHA256 hash of file contents
pub fn calculate_file_hash(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

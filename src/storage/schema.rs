//! Table layout of the index database.
//!
//! Everything lives in a single redb file so that removing a file record and
//! its embedding happens in one write transaction.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::storage::record::FileRecord;
use redb::{Database, MultimapTableDefinition, TableDefinition, WriteTransaction};
use std::sync::Arc;

/// Key: record id. Value: JSON serialized FileRecord
pub(crate) const FILES_TABLE: TableDefinition<u64, &str> = TableDefinition::new("files");

/// Unique path index. Key: absolute path. Value: record id
pub(crate) const PATH_INDEX: TableDefinition<&str, u64> = TableDefinition::new("files_by_path");

/// Key: record id. Value: little-endian f32 blob
pub(crate) const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");

const NAME_INDEX: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("files_by_name");
const TYPE_INDEX: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("files_by_type");
const EXTENSION_INDEX: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("files_by_extension");
const PARENT_INDEX: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("files_by_parent");

/// Record columns with a secondary (non-unique) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedColumn {
    Name,
    Type,
    Extension,
    ParentDirectory,
}

impl IndexedColumn {
    pub const ALL: [IndexedColumn; 4] = [
        IndexedColumn::Name,
        IndexedColumn::Type,
        IndexedColumn::Extension,
        IndexedColumn::ParentDirectory,
    ];

    pub(crate) fn table(self) -> MultimapTableDefinition<'static, &'static str, u64> {
        match self {
            IndexedColumn::Name => NAME_INDEX,
            IndexedColumn::Type => TYPE_INDEX,
            IndexedColumn::Extension => EXTENSION_INDEX,
            IndexedColumn::ParentDirectory => PARENT_INDEX,
        }
    }

    pub(crate) fn key(self, record: &FileRecord) -> &str {
        match self {
            IndexedColumn::Name => &record.name,
            IndexedColumn::Type => record.file_type.as_str(),
            IndexedColumn::Extension => &record.extension,
            IndexedColumn::ParentDirectory => &record.parent_directory,
        }
    }
}

/// Open or create the index database and make sure every table exists.
pub fn open_database(config: &Config) -> Result<Arc<Database>> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::create(&config.database_path).map_err(|e| {
        let msg = e.to_string();
        if msg.to_lowercase().contains("lock") {
            Error::Database("Index database is locked. Another filescout process may be running. Close other instances and try again.".to_string())
        } else {
            Error::Database(format!("Failed to open index database: {}", e))
        }
    })?;

    create_tables(&db)?;
    Ok(Arc::new(db))
}

fn create_tables(db: &Database) -> Result<()> {
    let write_txn = db.begin_write()?;
    open_tables(&write_txn)?;
    write_txn.commit()?;
    Ok(())
}

/// Create any missing table inside `write_txn`.
pub(crate) fn open_tables(write_txn: &WriteTransaction) -> Result<()> {
    write_txn.open_table(FILES_TABLE)?;
    write_txn.open_table(PATH_INDEX)?;
    write_txn.open_table(EMBEDDINGS_TABLE)?;
    for column in IndexedColumn::ALL {
        write_txn.open_multimap_table(column.table())?;
    }
    Ok(())
}

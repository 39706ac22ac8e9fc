// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
}

// Data storage
pub mod storage {
    pub mod files;
    pub mod record;
    pub mod schema;
    pub mod vectors;
}

// Indexing pipeline
pub mod indexing {
    pub mod filter;
    pub mod indexer;
    pub mod scanner;
}

// Query parsing & ranking
pub mod search {
    pub mod embedder;
    pub mod engine;
    pub mod query;
}

// User interfaces
pub mod ui {
    pub mod cli;
}

// Re-export commonly used types
pub use core::config::{Config, IndexSettings};
pub use core::error::{Error, Result};
pub use indexing::filter::PathFilter;
pub use indexing::indexer::FileIndexer;
pub use indexing::scanner::{ScanEvent, ScanStats, Scanner};
pub use search::embedder::{Embedder, HashEmbedder};
pub use search::engine::{Relevance, SearchEngine, SearchHit, Strategy};
pub use search::query::{ParsedQuery, QueryParser, SizeConstraint, SizeOp, TimeConstraint};
pub use storage::files::{calculate_file_hash, IndexStats, MetadataStore};
pub use storage::record::{FileRecord, FileType, TimeField};
pub use storage::schema::IndexedColumn;
pub use storage::vectors::{Candidates, EmbeddingIndex};
pub use ui::cli::Cli;

use super::error::{Error, Result};
use std::path::PathBuf;

/// Files at or above this size are indexed without a content hash.
pub const HASH_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Files at or above this size never get an embedding.
pub const EMBEDDING_SIZE_LIMIT: u64 = 1024 * 1024;

/// Number of files between two progress snapshots.
pub const PROGRESS_INTERVAL: u64 = 10;

/// Result limit used when the caller does not pass one.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Configuration for filescout
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for filescout data
    pub base_dir: PathBuf,
    /// Directory holding the index database
    pub index_dir: PathBuf,
    /// Path to the redb index file
    pub database_path: PathBuf,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".filescout"))
    }

    /// Create a new configuration
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = match base_dir {
            Some(dir) => dir,
            None => Self::default_base_dir()?,
        };
        let index_dir = base_dir.join("index");

        Ok(Self {
            database_path: index_dir.join("filescout.redb"),
            index_dir,
            base_dir,
        })
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists() && self.index_dir.exists()
    }
}

/// Tunables for a scan and for searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    pub hash_size_limit: u64,
    pub embedding_size_limit: u64,
    pub progress_interval: u64,
    pub default_limit: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            hash_size_limit: HASH_SIZE_LIMIT,
            embedding_size_limit: EMBEDDING_SIZE_LIMIT,
            progress_interval: PROGRESS_INTERVAL,
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_layout() {
        let temp_dir = TempDir::new().unwrap();
        let base_dir = temp_dir.path().join("scout");
        let config = Config::new(Some(base_dir.clone())).unwrap();

        assert_eq!(config.base_dir, base_dir);
        assert_eq!(config.index_dir, base_dir.join("index"));
        assert_eq!(config.database_path, base_dir.join("index").join("filescout.redb"));
    }

    #[test]
    fn test_config_init() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(Some(temp_dir.path().join("scout"))).unwrap();

        assert!(!config.is_initialized());
        config.init().unwrap();
        assert!(config.is_initialized());
    }

    #[test]
    fn test_default_settings() {
        let settings = IndexSettings::default();
        assert_eq!(settings.hash_size_limit, 10 * 1024 * 1024);
        assert_eq!(settings.embedding_size_limit, 1024 * 1024);
        assert_eq!(settings.progress_interval, 10);
        assert_eq!(settings.default_limit, 50);
    }
}

use clap::{ArgAction, Parser, Subcommand};

/// filescout - Index file metadata and search it with plain-language queries
#[derive(Parser, Debug)]
#[command(name = "filescout")]
#[command(about = "Index a directory tree's file metadata and search it", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.filescout)
    #[arg(long, global = true)]
    pub base_dir: Option<String>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the index directory
    Init,
    /// Index every file under a directory
    Index {
        /// Directory to scan
        path: String,
        /// Keep records from earlier scans instead of clearing the index first
        #[arg(long)]
        keep_old: bool,
        /// Skip computing embeddings
        #[arg(long)]
        no_embeddings: bool,
    },
    /// Search the index
    Search {
        /// Query, e.g. "reports modified in the last 3 days smaller than 2 mb"
        query: String,
        /// Search mode: exact, fuzzy, metadata or semantic
        #[arg(short, long, default_value = "fuzzy")]
        mode: String,
        /// Maximum number of results to return
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Search without the embedder; semantic mode then filters like metadata
        #[arg(long)]
        no_embeddings: bool,
    },
    /// Show index statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from(["filescout", "search", "big logs", "--mode", "metadata", "-l", "5"]);
        match cli.command {
            Commands::Search { query, mode, limit, json, no_embeddings } => {
                assert_eq!(query, "big logs");
                assert_eq!(mode, "metadata");
                assert_eq!(limit, 5);
                assert!(!json);
                assert!(!no_embeddings);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_index_with_global_flags() {
        let cli = Cli::parse_from([
            "filescout", "index", "/data", "--keep-old", "--base-dir", "/tmp/scout", "-vv",
        ]);
        assert_eq!(cli.base_dir.as_deref(), Some("/tmp/scout"));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Index { path, keep_old, no_embeddings } => {
                assert_eq!(path, "/data");
                assert!(keep_old);
                assert!(!no_embeddings);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_without_embeddings() {
        let cli = Cli::parse_from(["filescout", "search", "x", "--mode", "semantic", "--no-embeddings"]);
        assert!(matches!(cli.command, Commands::Search { no_embeddings: true, .. }));
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from(["filescout", "search", "report"]);
        match cli.command {
            Commands::Search { mode, limit, .. } => {
                assert_eq!(mode, "fuzzy");
                assert_eq!(limit, 50);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use filescout::ui::cli::{Cli, Commands};
use filescout::{
    Config, Embedder, FileIndexer, HashEmbedder, Relevance, ScanEvent, SearchHit, Strategy,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::new(cli.base_dir.as_deref().map(PathBuf::from))?;

    match &cli.command {
        Commands::Init => handle_init(&config),
        Commands::Index {
            path,
            keep_old,
            no_embeddings,
        } => handle_index(&config, path, *keep_old, *no_embeddings),
        Commands::Search {
            query,
            mode,
            limit,
            json,
            no_embeddings,
        } => handle_search(&config, query, mode, *limit, *json, *no_embeddings),
        Commands::Stats { json } => handle_stats(&config, *json),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_init(config: &Config) -> Result<()> {
    println!("Initializing filescout...");

    if config.is_initialized() {
        println!("filescout is already initialized at: {:?}", config.base_dir);
        return Ok(());
    }

    config.init()?;
    println!("✓ Created index directory: {:?}", config.index_dir);
    println!("\nNext: filescout index <directory>");
    Ok(())
}

fn require_initialized(config: &Config) -> Result<()> {
    if !config.is_initialized() {
        bail!("filescout is not initialized. Run 'filescout init' first.");
    }
    Ok(())
}

fn default_embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new())
}

fn handle_index(config: &Config, path: &str, keep_old: bool, no_embeddings: bool) -> Result<()> {
    require_initialized(config)?;

    let root = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
    let embedder = if no_embeddings {
        None
    } else {
        Some(default_embedder())
    };
    let indexer = FileIndexer::open(config, embedder).context("Failed to open index")?;

    println!("Indexing directory: {}", root.display());

    let (tx, rx) = mpsc::channel();
    let handle = indexer.spawn_index(root, !keep_old, Some(tx))?;

    for event in rx {
        match event {
            ScanEvent::Status(message) => println!("{}", message),
            ScanEvent::Counters(stats) => {
                print!(
                    "\r  Scanned {} files ({} indexed, {} skipped, {} errors)",
                    stats.total, stats.indexed, stats.skipped, stats.errors
                );
                std::io::stdout().flush()?;
            }
        }
    }

    let stats = handle
        .join()
        .map_err(|_| anyhow!("Indexing thread panicked"))?
        .context("Indexing failed")?;

    println!("\n\nIndexing complete!");
    println!("  Indexed: {} files", stats.indexed);
    if stats.skipped > 0 {
        println!("  Skipped: {} entries", stats.skipped);
    }
    if stats.errors > 0 {
        println!("  Errors: {} files", stats.errors);
    }
    Ok(())
}

fn handle_search(
    config: &Config,
    query: &str,
    mode: &str,
    limit: usize,
    json: bool,
    no_embeddings: bool,
) -> Result<()> {
    require_initialized(config)?;

    let indexer = FileIndexer::open(config, None).context("Failed to open index")?;
    let has_vectors = !indexer.vectors().is_empty()?;
    let indexer = if use_embedder(no_embeddings, has_vectors) {
        indexer.with_embedder(Some(default_embedder()))
    } else {
        info!("Searching without embeddings");
        indexer
    };
    let strategy = Strategy::parse(mode);
    let hits = indexer.search(query, strategy, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    println!("Searching for: \"{}\" ({})", query, strategy);
    if hits.is_empty() {
        println!("\nNo results found.");
        return Ok(());
    }

    println!("\nFound {} results:", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

/// An index built with `--no-embeddings` has no vectors to rank
fn use_embedder(no_embeddings: bool, has_vectors: bool) -> bool {
    !no_embeddings && has_vectors
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let record = &hit.record;
    match hit.relevance {
        Relevance::None => println!("\n{}. {}", rank, record.path),
        Relevance::Score(score) => println!("\n{}. {} (score: {})", rank, record.path, score),
        Relevance::Similarity(similarity) => {
            println!("\n{}. {} (similarity: {:.3})", rank, record.path, similarity)
        }
    }
    println!(
        "   {} · {} · modified {}",
        format_size(record.size),
        record.file_type,
        format_age(record.modified_at)
    );
}

fn handle_stats(config: &Config, json: bool) -> Result<()> {
    require_initialized(config)?;

    let indexer = FileIndexer::open(config, None).context("Failed to open index")?;
    let stats = indexer.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Files:      {}", stats.total_files);
    println!("Total size: {}", format_size(stats.total_size));
    println!("File types: {}", stats.distinct_types);
    for (file_type, count) in &stats.type_histogram {
        println!("  {:<14} {}", file_type.as_str(), count);
    }
    Ok(())
}

/// Human-readable byte count, e.g. "1.5 MB"
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn format_age(timestamp: f64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let seconds = (now - timestamp).max(0.0) as u64;

    match seconds {
        s if s < 60 => "just now".to_string(),
        s if s < 3_600 => format!("{} min ago", s / 60),
        s if s < 86_400 => format!("{} h ago", s / 3_600),
        s => format!("{} days ago", s / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024u64.pow(4)), "3.0 TB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.0 TB");
    }

    #[test]
    fn test_use_embedder() {
        assert!(use_embedder(false, true));
        assert!(!use_embedder(true, true));
        assert!(!use_embedder(false, false));
    }

    #[test]
    fn test_format_age() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64();
        assert_eq!(format_age(now), "just now");
        assert_eq!(format_age(now - 3.0 * 86_400.0 - 5.0), "3 days ago");
    }
}

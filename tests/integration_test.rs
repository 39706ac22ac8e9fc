use filescout::{
    Config, Error, FileIndexer, FileType, HashEmbedder, IndexedColumn, Result, ScanStats, Strategy,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

fn age(path: &Path, days: u64) -> Result<()> {
    let file = fs::File::options().write(true).open(path)?;
    file.set_modified(SystemTime::now() - Duration::from_secs(days * 86_400))?;
    Ok(())
}

/// A small home directory with some noise that must not be indexed
fn sample_tree(temp_dir: &TempDir) -> Result<PathBuf> {
    let root = temp_dir.path().join("home");
    write(&root.join("docs").join("report_q1.pdf"), &[0u8; 3000])?;
    write(&root.join("docs").join("report_q2.pdf"), &[0u8; 500])?;
    write(&root.join("docs").join("notes.txt"), b"remember the milk")?;
    write(&root.join("pics").join("holiday_beach.jpg"), &[1u8; 4096])?;
    write(&root.join("code").join("main.py"), b"print('hi')")?;
    write(&root.join("code").join("data.csv"), b"a,b\n1,2\n")?;

    write(&root.join("code").join("node_modules").join("lib").join("index.js"), b"x")?;
    write(&root.join("code").join("__pycache__").join("main.cpython-311.pyc"), b"x")?;
    write(&root.join(".cache").join("blob"), b"x")?;
    write(&root.join("docs").join(".DS_Store"), b"x")?;

    age(&root.join("docs").join("report_q1.pdf"), 30)?;
    age(&root.join("docs").join("notes.txt"), 1)?;
    Ok(root)
}

fn open(temp_dir: &TempDir) -> Result<FileIndexer> {
    let config = Config::new(Some(temp_dir.path().join("scout")))?;
    config.init()?;
    FileIndexer::open(&config, Some(Arc::new(HashEmbedder::new())))
}

#[test]
fn test_init_command() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let base_dir = temp_dir.path().join("test_filescout");

    let config = Config::new(Some(base_dir.clone()))?;
    assert!(!config.is_initialized());

    config.init()?;

    assert!(config.is_initialized());
    assert!(config.base_dir.exists());
    assert!(config.index_dir.exists());

    Ok(())
}

#[test]
fn test_index_tree() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    let indexer = open(&temp_dir)?;

    let stats = indexer.index(&root, true, None)?;

    // node_modules, __pycache__ and .cache are pruned; .DS_Store is skipped
    assert_eq!(stats, ScanStats { total: 7, indexed: 6, skipped: 4, errors: 0 });
    assert_eq!(indexer.vectors().len()?, 6);

    let summary = indexer.stats()?;
    assert_eq!(summary.total_files, 6);
    assert_eq!(summary.total_size, 3000 + 500 + 17 + 4096 + 11 + 8);
    assert_eq!(
        summary.type_histogram,
        vec![
            (FileType::Document, 2),
            (FileType::Code, 1),
            (FileType::Image, 1),
            (FileType::Spreadsheet, 1),
            (FileType::Text, 1),
        ]
    );

    let pdfs = indexer.records_with(IndexedColumn::Extension, ".pdf")?;
    assert_eq!(pdfs.len(), 2);

    Ok(())
}

#[test]
fn test_rescan_keeps_one_record_per_path() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    let indexer = open(&temp_dir)?;

    indexer.index(&root, true, None)?;
    let before: Vec<(u64, String)> = indexer
        .store()
        .all()?
        .into_iter()
        .map(|r| (r.id, r.path))
        .collect();

    indexer.index(&root, false, None)?;
    let after: Vec<(u64, String)> = indexer
        .store()
        .all()?
        .into_iter()
        .map(|r| (r.id, r.path))
        .collect();
    assert_eq!(before, after);

    indexer.index(&root, true, None)?;
    assert_eq!(indexer.store().len()?, before.len() as u64);

    Ok(())
}

#[test]
fn test_invalid_root_changes_nothing() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    let indexer = open(&temp_dir)?;
    indexer.index(&root, true, None)?;

    let result = indexer.index(&temp_dir.path().join("nope"), true, None);
    assert!(matches!(result, Err(Error::InvalidRoot(_))));
    assert_eq!(indexer.store().len()?, 6);

    Ok(())
}

#[test]
fn test_natural_language_queries() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    let indexer = open(&temp_dir)?;
    indexer.index(&root, true, None)?;

    let hits = indexer.search("report smaller than 1 kb", Strategy::Metadata, 50)?;
    let names: Vec<&str> = hits.iter().map(|h| h.record.name.as_str()).collect();
    assert_eq!(names, vec!["report_q2.pdf"]);

    // everything except the 30 day old report
    let hits = indexer.search("files in the last 2 weeks", Strategy::Fuzzy, 50)?;
    assert_eq!(hits.len(), 5);
    assert!(hits.iter().all(|h| h.record.name != "report_q1.pdf"));

    // "modified" stays in the text and matches no name
    let hits = indexer.search("modified in the last 2 weeks", Strategy::Fuzzy, 50)?;
    assert!(hits.is_empty());

    let hits = indexer.search("report", Strategy::Fuzzy, 50)?;
    assert_eq!(hits.len(), 2);
    // equal scores: newer first
    assert_eq!(hits[0].record.name, "report_q2.pdf");

    let hits = indexer.search("REPORT_Q1", Strategy::Exact, 50)?;
    assert_eq!(hits.len(), 1);

    let hits = indexer.search("anything", Strategy::Fuzzy, 0)?;
    assert!(hits.is_empty());

    Ok(())
}

#[test]
fn test_semantic_search() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    let indexer = open(&temp_dir)?;
    indexer.index(&root, true, None)?;

    let hits = indexer.search("holiday beach", Strategy::Semantic, 3)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].record.name, "holiday_beach.jpg");

    let hits = indexer.search("holiday larger than 1 gb", Strategy::Semantic, 10)?;
    assert!(hits.is_empty());

    Ok(())
}

#[test]
fn test_index_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let root = sample_tree(&temp_dir)?;
    {
        let indexer = open(&temp_dir)?;
        indexer.index(&root, true, None)?;
    }

    let indexer = open(&temp_dir)?;
    assert_eq!(indexer.stats()?.total_files, 6);
    let hits = indexer.search("notes", Strategy::Exact, 10)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.content_hash.as_ref().map(|h| h.len()), Some(64));

    Ok(())
}

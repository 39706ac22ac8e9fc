use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Coarse classification of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileType {
    Text,
    Document,
    Spreadsheet,
    Presentation,
    Image,
    Video,
    Audio,
    Archive,
    Code,
    Executable,
    Other,
}

impl FileType {
    pub const ALL: [FileType; 11] = [
        FileType::Text,
        FileType::Document,
        FileType::Spreadsheet,
        FileType::Presentation,
        FileType::Image,
        FileType::Video,
        FileType::Audio,
        FileType::Archive,
        FileType::Code,
        FileType::Executable,
        FileType::Other,
    ];

    /// Classify a lower-cased extension including its leading dot.
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            ".txt" => FileType::Text,
            ".doc" | ".docx" | ".pdf" | ".odt" => FileType::Document,
            ".xls" | ".xlsx" | ".csv" => FileType::Spreadsheet,
            ".ppt" | ".pptx" => FileType::Presentation,
            ".jpg" | ".jpeg" | ".png" | ".gif" | ".bmp" | ".svg" => FileType::Image,
            ".mp4" | ".avi" | ".mov" | ".mkv" => FileType::Video,
            ".mp3" | ".wav" | ".flac" | ".m4a" => FileType::Audio,
            ".zip" | ".rar" | ".7z" | ".tar" | ".gz" => FileType::Archive,
            ".py" | ".js" | ".java" | ".cpp" | ".c" | ".html" | ".css" | ".json" | ".xml"
            | ".sql" => FileType::Code,
            ".exe" | ".app" | ".dmg" => FileType::Executable,
            _ => FileType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Text => "Text",
            FileType::Document => "Document",
            FileType::Spreadsheet => "Spreadsheet",
            FileType::Presentation => "Presentation",
            FileType::Image => "Image",
            FileType::Video => "Video",
            FileType::Audio => "Audio",
            FileType::Archive => "Archive",
            FileType::Code => "Code",
            FileType::Executable => "Executable",
            FileType::Other => "Other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which timestamp a time constraint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeField {
    CreatedAt,
    ModifiedAt,
    AccessedAt,
}

/// Metadata of one indexed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Store-assigned identity, stable across re-indexing of the same path
    pub id: u64,
    /// Absolute path, unique across the index
    pub path: String,
    pub name: String,
    /// Lower-cased extension with its leading dot, or empty
    pub extension: String,
    pub file_type: FileType,
    pub size: u64,
    pub created_at: f64,
    pub modified_at: f64,
    pub accessed_at: f64,
    pub parent_directory: String,
    /// Path components between the scan root and the file, root excluded
    pub depth: u32,
    pub hidden: bool,
    pub indexed_at: f64,
    /// SHA256 of the contents, absent for large files or unreadable contents
    pub content_hash: Option<String>,
}

impl FileRecord {
    pub fn timestamp(&self, field: TimeField) -> f64 {
        match field {
            TimeField::CreatedAt => self.created_at,
            TimeField::ModifiedAt => self.modified_at,
            TimeField::AccessedAt => self.accessed_at,
        }
    }

    /// Text handed to the embedder for this record.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.name, self.file_type, self.parent_directory)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Lower-cased extension of `path` including the leading dot, or "" when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Seconds since the Unix epoch with sub-second precision; pre-epoch times are negative.
pub fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

pub fn now_seconds() -> f64 {
    unix_seconds(SystemTime::now())
}

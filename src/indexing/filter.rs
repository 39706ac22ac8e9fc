use std::path::{Component, Path, PathBuf};

/// Directory and file names that are never indexed, compared case-insensitively
const IGNORED_SEGMENTS: &[&str] = &[
    // Python environments
    "venv", ".venv", "env", ".env", "virtualenv", ".virtualenv", "env.bak", "venv.bak",
    // JavaScript
    "node_modules", ".npm", ".yarn", ".yarn-cache",
    // Tool caches
    "__pycache__", ".pytest_cache", ".mypy_cache", ".ruff_cache", ".tox", ".coverage",
    "htmlcov", ".hypothesis", ".cache",
    // Build output
    "build", "dist", ".eggs",
    // Editors
    ".idea", ".vscode", ".vs", ".sublime-project", ".sublime-workspace",
    // Version control
    ".git", ".svn", ".hg", ".bzr",
    // Package managers and frameworks
    ".pip", ".conda", ".next", ".nuxt", ".output",
    // Scratch
    ".temp", ".tmp", "coverage", ".nyc_output", ".parcel-cache", "logs",
];

/// Hidden names that are still indexed
const ALLOWED_HIDDEN: &[&str] = &[
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
    ".pre-commit-config.yaml",
];

const JUNK_FILES: &[&str] = &[
    ".ds_store",
    "thumbs.db",
    "desktop.ini",
    ".directory",
    ".localized",
    ".trash",
    ".trashes",
];

const BYTECODE_SUFFIXES: &[&str] = &[".pyc", ".pyo", ".pyd"];

const BACKUP_SUFFIXES: &[&str] = &[".bak", ".tmp", ".temp", ".swp", ".swo", "~"];

const LOCK_FILES: &[&str] = &["package-lock.json", "yarn.lock", "poetry.lock", "pipfile.lock"];

const BINARY_SUFFIXES: &[&str] = &[".so", ".dylib", ".dll", ".exe"];

/// Segments under which native binaries are treated as environment artifacts
const BINARY_HOSTS: &[&str] = &["node_modules", "venv", ".venv", "env", ".env"];

const VENV_NAMES: &[&str] = &["venv", ".venv", "env", ".env", "virtualenv"];

/// Files that mark a directory as a Python virtual environment
const VENV_MARKERS: &[&str] = &["pyvenv.cfg", "activate", "activate.bat", "activate.ps1"];

/// Decides which paths are left out of the index.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    root: Option<PathBuf>,
}

impl PathFilter {
    /// Filter that examines every component of a path
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Filter that only examines components below `root`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn should_ignore(&self, path: &Path, is_directory: bool) -> bool {
        let segments = self.segments(path);

        if segments
            .iter()
            .any(|s| IGNORED_SEGMENTS.contains(&s.as_str()) || s.ends_with(".egg-info"))
        {
            return true;
        }

        if is_directory {
            if segments.iter().any(|s| is_hidden(s) && !is_allowed_hidden(s)) {
                return true;
            }
            return self.inside_virtualenv(path);
        }

        let Some(name) = segments.last() else {
            return false;
        };

        if JUNK_FILES.contains(&name.as_str()) || LOCK_FILES.contains(&name.as_str()) {
            return true;
        }
        if BYTECODE_SUFFIXES
            .iter()
            .chain(BACKUP_SUFFIXES)
            .any(|suffix| name.ends_with(suffix))
        {
            return true;
        }

        BINARY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            && segments.iter().any(|s| BINARY_HOSTS.contains(&s.as_str()))
    }

    /// Lower-cased names of the components this filter looks at
    fn segments(&self, path: &Path) -> Vec<String> {
        let relative = match &self.root {
            Some(root) => path.strip_prefix(root).unwrap_or(path),
            None => path,
        };

        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .collect()
    }

    /// True when `dir` or one of its ancestors is an environment directory
    /// carrying an activation marker.
    fn inside_virtualenv(&self, dir: &Path) -> bool {
        for ancestor in dir.ancestors() {
            if let Some(root) = &self.root {
                if !ancestor.starts_with(root) || ancestor == root.as_path() {
                    break;
                }
            }

            let Some(name) = ancestor.file_name() else {
                break;
            };
            let name = name.to_string_lossy().to_lowercase();
            if VENV_NAMES.contains(&name.as_str())
                && VENV_MARKERS.iter().any(|m| ancestor.join(m).exists())
            {
                return true;
            }
        }
        false
    }
}

/// Starts with a dot and is longer than one character
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name.len() > 1
}

/// Hidden names that the filter lets through
pub fn is_allowed_hidden(name: &str) -> bool {
    ALLOWED_HIDDEN.contains(&name.to_lowercase().as_str())
}

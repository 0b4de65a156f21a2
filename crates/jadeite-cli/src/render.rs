//! File-system collaborators of the compiler: source loader, compiled-output
//! cache and output sink.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jadeite_codegen::Options;

/// I/O and configuration errors. The compiler itself never produces these.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read a template source file.
pub fn load(path: &Path) -> Result<String, RenderError> {
    if !path.exists() {
        return Err(RenderError::NotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Modification time of a file.
pub fn modified(path: &Path) -> Result<SystemTime, RenderError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| RenderError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Load compiler tables from a JSON file. Missing fields keep their defaults.
pub fn load_options(path: &Path) -> Result<Options, RenderError> {
    let json = load(path)?;
    serde_json::from_str(&json).map_err(|source| RenderError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Write output, creating parent directories as needed.
pub fn write(path: &Path, content: &str) -> Result<(), RenderError> {
    let err = |source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(err)?;
    }
    fs::write(path, content).map_err(err)
}

/// Cache key of a template: its file stem, followed by the config file's
/// stem when one is in use.
pub fn cache_key(path: &Path, config: Option<&Path>) -> Option<String> {
    let stem = |path: &Path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string);

    let key = stem(path)?;
    match config {
        Some(config) => Some(format!("{key}.{}", stem(config)?)),
        None => Some(key),
    }
}

/// Newest modification time among the template and its config. A cache
/// entry older than this is stale.
pub fn newest_input(path: &Path, config: Option<&Path>) -> Result<SystemTime, RenderError> {
    let mtime = modified(path)?;
    match config {
        Some(config) => Ok(mtime.max(modified(config)?)),
        None => Ok(mtime),
    }
}

/// Compiled templates stored as `<dir>/<key>.php`.
///
/// An entry is fresh while it is at least as new as its source.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.php"))
    }

    /// The cached output for `key`, unless it is missing or older than
    /// `source_mtime`.
    pub fn get_if_fresh(
        &self,
        key: &str,
        source_mtime: SystemTime,
    ) -> Result<Option<String>, RenderError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        if modified(&path)? < source_mtime {
            tracing::debug!(key, "cache entry is stale");
            return Ok(None);
        }

        load(&path).map(Some)
    }

    pub fn put(&self, key: &str, compiled: &str) -> Result<(), RenderError> {
        write(&self.path(key), compiled)
    }
}

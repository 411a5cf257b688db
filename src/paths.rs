//! XDG-compliant path resolution for corpus-ingest.
//!
//! The CLI uses [`IngestPaths`] to locate its default config file and the
//! data directories of the embedded object store and triple store.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(corpus::paths::no_home),
        help("Set the HOME environment variable or pass --data-dir explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(corpus::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for corpus-ingest.
#[derive(Debug, Clone)]
pub struct IngestPaths {
    /// `$XDG_CONFIG_HOME/corpus-ingest/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/corpus-ingest/`
    pub data_dir: PathBuf,
}

impl IngestPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("corpus-ingest");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("corpus-ingest");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Root all directories under a single base (used by `--data-dir`).
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config_dir: base.clone(),
            data_dir: base,
        }
    }

    /// Default config file location.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory of the redb object store.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    /// Root directory of embedded triple-store repositories.
    pub fn triples_dir(&self) -> PathBuf {
        self.data_dir.join("triples")
    }

    /// Create the data directories if they don't exist.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_paths_share_base() {
        let paths = IngestPaths::rooted_at("/tmp/ci");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/ci/config.toml"));
        assert_eq!(paths.objects_dir(), PathBuf::from("/tmp/ci/objects"));
        assert_eq!(paths.triples_dir(), PathBuf::from("/tmp/ci/triples"));
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = IngestPaths {
            config_dir: tmp.path().join("config"),
            data_dir: tmp.path().join("data"),
        };
        paths.ensure_dirs().unwrap();
        assert!(paths.config_dir.is_dir());
        assert!(paths.data_dir.is_dir());
    }
}

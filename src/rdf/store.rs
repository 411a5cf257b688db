//! Triple store interface and the embedded oxigraph implementation.
//!
//! A triple store hosts one named repository per collection. The pipeline
//! only needs four operations: idempotent repository creation, repository
//! lookup, SELECT queries and bulk insertion of RDF files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::store::Store;

use crate::error::{TripleStoreError, TripleStoreResult};

use super::graph::file_base_iri;
use super::{QueryRow, SelectQuery, select_on_store};

/// Storage flavour requested when creating a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Persistent, on-disk repository.
    Native,
    /// Volatile repository.
    Memory,
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Files whose statements were stored.
    pub loaded: usize,
    /// Files that could not be parsed or stored.
    pub failed: Vec<PathBuf>,
}

/// A server hosting named RDF repositories.
pub trait TripleStore: Send + Sync {
    /// Create the repository unless it already exists.
    fn create_repository(&self, kind: StoreKind, name: &str, description: &str)
    -> TripleStoreResult<()>;

    /// Handle to an existing repository.
    fn repository(&self, name: &str) -> TripleStoreResult<Box<dyn TripleRepository + '_>>;
}

/// A single named repository.
pub trait TripleRepository {
    fn name(&self) -> &str;

    fn query(&self, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>>;

    /// Insert every statement of the given Turtle files.
    fn insert_from_rdf_files(&self, paths: &[PathBuf]) -> TripleStoreResult<InsertReport>;
}

/// Embedded triple store: one oxigraph store per repository.
///
/// With a root directory, native repositories live in `{root}/{name}/store`;
/// without one every repository is in memory. Opened stores are cached, so a
/// repository handle is cheap and the same on-disk store is never opened twice.
pub struct LocalTripleStore {
    root: Option<PathBuf>,
    repositories: Mutex<HashMap<String, Store>>,
}

impl LocalTripleStore {
    /// A store whose repositories vanish with the process.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// A store persisting native repositories under `root`.
    pub fn open(root: &Path) -> TripleStoreResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| TripleStoreError::Backend {
            message: format!("failed to create {}: {e}", root.display()),
        })?;
        Ok(Self {
            root: Some(root.to_path_buf()),
            repositories: Mutex::new(HashMap::new()),
        })
    }

    fn repository_dir(&self, name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(name))
    }

    fn lock(&self) -> TripleStoreResult<std::sync::MutexGuard<'_, HashMap<String, Store>>> {
        self.repositories.lock().map_err(|_| TripleStoreError::Backend {
            message: "repository cache mutex poisoned".into(),
        })
    }

    fn open_on_disk(dir: &Path) -> TripleStoreResult<Store> {
        Store::open(dir.join("store")).map_err(|e| TripleStoreError::Backend {
            message: format!("failed to open oxigraph store at {}: {e}", dir.display()),
        })
    }
}

impl TripleStore for LocalTripleStore {
    fn create_repository(
        &self,
        kind: StoreKind,
        name: &str,
        description: &str,
    ) -> TripleStoreResult<()> {
        let mut repos = self.lock()?;
        if repos.contains_key(name) {
            return Ok(());
        }

        let store = match (kind, self.repository_dir(name)) {
            (StoreKind::Native, Some(dir)) => {
                let existed = dir.is_dir();
                std::fs::create_dir_all(&dir).map_err(|e| TripleStoreError::Backend {
                    message: format!("failed to create {}: {e}", dir.display()),
                })?;
                if !existed {
                    std::fs::write(dir.join("description.txt"), description).map_err(|e| {
                        TripleStoreError::Backend {
                            message: format!("failed to write repository description: {e}"),
                        }
                    })?;
                    tracing::info!(repository = name, description, "created triple store repository");
                }
                Self::open_on_disk(&dir)?
            }
            _ => {
                tracing::info!(repository = name, description, "created in-memory repository");
                Store::new().map_err(|e| TripleStoreError::Backend {
                    message: format!("failed to create in-memory store: {e}"),
                })?
            }
        };
        repos.insert(name.to_string(), store);
        Ok(())
    }

    fn repository(&self, name: &str) -> TripleStoreResult<Box<dyn TripleRepository + '_>> {
        let mut repos = self.lock()?;
        let store = match repos.get(name) {
            Some(store) => store.clone(),
            None => {
                let dir = self
                    .repository_dir(name)
                    .filter(|d| d.is_dir())
                    .ok_or_else(|| TripleStoreError::NoRepository { name: name.into() })?;
                let store = Self::open_on_disk(&dir)?;
                repos.insert(name.to_string(), store.clone());
                store
            }
        };
        Ok(Box::new(LocalRepository {
            name: name.to_string(),
            store,
        }))
    }
}

impl std::fmt::Debug for LocalTripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTripleStore")
            .field("root", &self.root)
            .finish()
    }
}

/// Handle to one embedded repository.
struct LocalRepository {
    name: String,
    store: Store,
}

impl LocalRepository {
    fn load_file(&self, path: &Path) -> TripleStoreResult<()> {
        let file = std::fs::File::open(path).map_err(|e| TripleStoreError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut parser = RdfParser::from_format(RdfFormat::Turtle);
        if let Some(base) = file_base_iri(path) {
            parser = parser.with_base_iri(&base).map_err(|e| TripleStoreError::Load {
                path: path.to_path_buf(),
                message: format!("invalid base IRI: {e}"),
            })?;
        }
        self.store
            .load_from_reader(parser, std::io::BufReader::new(file))
            .map_err(|e| TripleStoreError::Load {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

impl TripleRepository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>> {
        select_on_store(&self.store, query)
    }

    fn insert_from_rdf_files(&self, paths: &[PathBuf]) -> TripleStoreResult<InsertReport> {
        let mut report = InsertReport::default();
        for path in paths {
            match self.load_file(path) {
                Ok(()) => report.loaded += 1,
                Err(e) => {
                    tracing::warn!(repository = %self.name, path = %path.display(), error = %e, "skipping unloadable RDF file");
                    report.failed.push(path.clone());
                }
            }
        }
        Ok(report)
    }
}

//! The ingest pipeline: corpus directory in, repository records out.
//!
//! [`Pipeline::ingest_one`] sequences the components for a single metadata
//! file: manifest, collection, triple store population, item
//! reconciliation and, when the item changed, annotations, documents and
//! completion events. Only structural problems with the file itself fail
//! the call; everything else is reported as an [`IngestWarning`].

pub mod annotations;
pub mod collection;
pub mod documents;
pub mod item;
pub mod owner;
pub mod populate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{IngestConfig, TripleStoreBackend};
use crate::error::{IngestError, IngestResult};
use crate::manifest::{self, Manifest};
use crate::notify::{Broker, NotificationOutcome, NotificationPublisher, QueueSearchIndex, SearchIndex, broker_from_config};
use crate::objects::{Collection, ObjectStore};
use crate::paths::IngestPaths;
use crate::rdf::{LocalTripleStore, SesameServer, TripleStore};

pub use annotations::AnnotationOutcome;
pub use collection::ResolvedCollection;
pub use item::ItemState;
pub use owner::OwnerResolution;

/// A non-fatal problem encountered while ingesting a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestWarning {
    /// The collection was created without an owner.
    #[error("collection {collection} has no data owner: {reason}")]
    CollectionOwnerless { collection: String, reason: String },
    /// The triple store could not be created or populated; population was skipped.
    #[error("triple store unavailable: {message}")]
    TripleStoreUnavailable { message: String },
    /// Some RDF files could not be loaded into the triple store.
    #[error("{} RDF file(s) could not be loaded into the triple store", .files.len())]
    TripleStoreLoadFailures { files: Vec<PathBuf> },
    /// Primary text could not be determined or attached.
    #[error("primary text not attached: {message}")]
    PrimaryTextUnavailable { message: String },
    #[error("document {file_name} failed: {message}")]
    DocumentFailed { file_name: String, message: String },
    #[error("reindex of {pid} failed: {message}")]
    ReindexFailed { pid: String, message: String },
    #[error("notification failed: {message}")]
    NotificationFailed { message: String },
}

/// Result of ingesting one metadata file.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Pid of the ingested item.
    pub pid: String,
    pub handle: String,
    pub state: ItemState,
    /// Pids of the documents created or updated.
    pub documents: Vec<String>,
    /// `None` when the item was current and no events were sent.
    pub notification: Option<NotificationOutcome>,
    pub warnings: Vec<IngestWarning>,
}

/// Result of ingesting every metadata file in a directory.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub ingested: Vec<IngestOutcome>,
    pub failed: Vec<(PathBuf, IngestError)>,
    /// Directory-level warnings (collection, triple store).
    pub warnings: Vec<IngestWarning>,
}

impl BatchReport {
    pub fn count(&self, state: ItemState) -> usize {
        self.ingested.iter().filter(|o| o.state == state).count()
    }
}

/// Directory-level work shared by every file of a corpus directory.
struct Prepared {
    manifest: Manifest,
    collection: Collection,
    warnings: Vec<IngestWarning>,
}

/// Ingest pipeline over an object store, a triple store and a broker.
pub struct Pipeline {
    config: IngestConfig,
    objects: ObjectStore,
    triples: Arc<dyn TripleStore>,
    notifier: NotificationPublisher,
    search: Arc<dyn SearchIndex>,
}

impl Pipeline {
    /// Reindex requests go through `broker` on the configured reindex topic.
    pub fn new(
        config: IngestConfig,
        objects: ObjectStore,
        triples: Arc<dyn TripleStore>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        let notifier = NotificationPublisher::new(Arc::clone(&broker), &config.broker);
        let search: Arc<dyn SearchIndex> = Arc::new(QueueSearchIndex::new(broker, &config.broker.reindex_topic));
        Self {
            config,
            objects,
            triples,
            notifier,
            search,
        }
    }

    /// Replace the search index client.
    pub fn with_search_index(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = search;
        self
    }

    /// Open the persistent stores the configuration names, defaulting to
    /// directories under `paths`.
    pub fn open(config: IngestConfig, paths: &IngestPaths) -> IngestResult<Self> {
        let objects_dir = config
            .repository
            .data_dir
            .clone()
            .unwrap_or_else(|| paths.objects_dir());
        let objects = ObjectStore::open(&objects_dir, &config.repository.pid_namespace)?;

        let triples: Arc<dyn TripleStore> = match config.triple_store.backend {
            TripleStoreBackend::Local => {
                let root = config
                    .triple_store
                    .data_dir
                    .clone()
                    .unwrap_or_else(|| paths.triples_dir());
                Arc::new(LocalTripleStore::open(&root)?)
            }
            TripleStoreBackend::Sesame => Arc::new(SesameServer::new(&config.triple_store.url)),
        };

        let broker = broker_from_config(&config.broker);
        Ok(Self::new(config, objects, triples, broker))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn triples(&self) -> &dyn TripleStore {
        self.triples.as_ref()
    }

    /// Ingest one metadata file of `corpus_dir`, building the manifest and
    /// collection first if needed. `pid` fixes the pid of a newly created
    /// item.
    pub fn ingest_one(&self, corpus_dir: &Path, rdf_file: &Path, pid: Option<&str>) -> IngestResult<IngestOutcome> {
        check_metadata_file(rdf_file)?;
        let prepared = self.prepare(corpus_dir)?;
        let mut outcome = self.ingest_file(&prepared, rdf_file, pid)?;
        let mut warnings = prepared.warnings;
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;
        Ok(outcome)
    }

    /// Ingest every metadata file of `corpus_dir`. The directory-level steps
    /// run once; per-file failures are collected in the report.
    pub fn ingest_directory(&self, corpus_dir: &Path) -> IngestResult<BatchReport> {
        let prepared = self.prepare(corpus_dir)?;
        let mut report = BatchReport {
            warnings: prepared.warnings.clone(),
            ..BatchReport::default()
        };

        for file in manifest::metadata_files(corpus_dir)? {
            match self.ingest_file(&prepared, &file, None) {
                Ok(outcome) => report.ingested.push(outcome),
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "ingest failed");
                    report.failed.push((file, e));
                }
            }
        }

        tracing::info!(
            dir = %corpus_dir.display(),
            created = report.count(ItemState::Absent),
            updated = report.count(ItemState::StaleExisting),
            unchanged = report.count(ItemState::CurrentExisting),
            failed = report.failed.len(),
            "directory ingested"
        );
        Ok(report)
    }

    fn prepare(&self, corpus_dir: &Path) -> IngestResult<Prepared> {
        let manifest = manifest::ensure_manifest(corpus_dir, &self.config)?;
        let name = manifest.collection_name.clone();
        let mut warnings = Vec::new();

        let collection = match collection::resolve_collection(&self.objects, &self.config, &name, corpus_dir)? {
            ResolvedCollection::Existing(collection) => collection,
            ResolvedCollection::Created { collection, owner } => {
                let reason = match &owner {
                    OwnerResolution::Resolved(_) => None,
                    OwnerResolution::NotFound => Some("no matching user".to_string()),
                    OwnerResolution::Ineligible(user) => Some(format!("{} cannot own data", user.email)),
                };
                if let Some(reason) = reason {
                    warnings.push(IngestWarning::CollectionOwnerless {
                        collection: name.clone(),
                        reason,
                    });
                }
                collection
            }
            ResolvedCollection::Unavailable { reason } => {
                tracing::error!(collection = %name, reason = %reason, "collection unavailable");
                return Err(IngestError::CollectionUnavailable { name });
            }
        };

        match populate::populate_triple_store(self.triples.as_ref(), corpus_dir, &name) {
            Ok(report) if !report.failed.is_empty() => {
                warnings.push(IngestWarning::TripleStoreLoadFailures { files: report.failed });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(collection = %name, error = %e, "could not populate the triple store");
                warnings.push(IngestWarning::TripleStoreUnavailable { message: e.to_string() });
            }
        }

        Ok(Prepared {
            manifest,
            collection,
            warnings,
        })
    }

    fn ingest_file(&self, prepared: &Prepared, rdf_file: &Path, pid: Option<&str>) -> IngestResult<IngestOutcome> {
        check_metadata_file(rdf_file)?;
        tracing::info!(file = %rdf_file.display(), "ingesting item");

        let mut warnings = Vec::new();
        let item::Reconciled { mut item, state } =
            item::reconcile_item(&self.objects, &prepared.manifest, &prepared.collection, rdf_file, pid)?;

        if state == ItemState::StaleExisting {
            if let Err(e) = self.search.reindex(item.pid()) {
                tracing::warn!(item = item.pid(), error = %e, "reindex request failed");
                warnings.push(IngestWarning::ReindexFailed {
                    pid: item.meta.pid.clone(),
                    message: e.to_string(),
                });
            }
        }

        if !state.changed() {
            return Ok(IngestOutcome {
                pid: item.meta.pid.clone(),
                handle: item.handle.clone(),
                state,
                documents: Vec::new(),
                notification: None,
                warnings,
            });
        }

        annotations::attach_annotations(&mut item, rdf_file);

        let name = &prepared.manifest.collection_name;
        documents::attach_primary_text(&self.objects, self.triples.as_ref(), name, &mut item, &mut warnings);
        let entry = item::manifest_entry(&prepared.manifest, rdf_file)?;
        let documents =
            documents::discover_documents(&self.objects, &mut item, &prepared.collection, &entry.docs, &mut warnings);

        self.objects.save(&mut item)?;

        let notification = self.notifier.notify_ingested(item.pid(), &documents);
        if let NotificationOutcome::Failed { message, .. } = &notification {
            warnings.push(IngestWarning::NotificationFailed {
                message: message.clone(),
            });
        }

        Ok(IngestOutcome {
            pid: item.meta.pid.clone(),
            handle: item.handle.clone(),
            state,
            documents,
            notification: Some(notification),
            warnings,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("objects", &self.objects)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Only files whose name mentions `metadata` describe items.
fn check_metadata_file(rdf_file: &Path) -> IngestResult<()> {
    let is_metadata = rdf_file
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("metadata"));
    if is_metadata {
        Ok(())
    } else {
        Err(IngestError::NotMetadataFile {
            path: rdf_file.to_path_buf(),
        })
    }
}

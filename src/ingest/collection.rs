//! Find or create the collection a corpus directory belongs to.
//!
//! Collections are created from a `<name>.n3` file that sits in the parent
//! of the corpus directory. Collections configured as nested keep their
//! corpus directories one level deeper, so their `.n3` file is looked up in
//! the grandparent unless the corpus directory is itself named after the
//! collection.

use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult, ObjectStoreError};
use crate::objects::{AccessControl, Collection, ObjectStore};
use crate::rdf::RdfGraph;

use super::owner::{OwnerResolution, resolve_data_owner};

/// Result of collection resolution.
#[derive(Debug, Clone)]
pub enum ResolvedCollection {
    Existing(Collection),
    Created {
        collection: Collection,
        owner: OwnerResolution,
    },
    /// No collection could be found or created; `reason` says why.
    Unavailable { reason: String },
}

impl ResolvedCollection {
    pub fn collection(&self) -> Option<&Collection> {
        match self {
            Self::Existing(c) | Self::Created { collection: c, .. } => Some(c),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Directory expected to hold `<name>.n3` for a corpus directory.
pub fn collection_metadata_dir(config: &IngestConfig, name: &str, corpus_dir: &Path) -> Option<PathBuf> {
    let corpus_dir = std::path::absolute(corpus_dir).ok()?;
    let named_after_collection = corpus_dir.file_name().is_some_and(|n| n == name);
    let parent = corpus_dir.parent()?;
    if config.is_nested(name) && !named_after_collection {
        parent.parent().map(Path::to_path_buf)
    } else {
        Some(parent.to_path_buf())
    }
}

/// Look the collection up by short name, creating it from its `.n3` file when absent.
pub fn resolve_collection(
    objects: &ObjectStore,
    config: &IngestConfig,
    name: &str,
    corpus_dir: &Path,
) -> IngestResult<ResolvedCollection> {
    if let Some(existing) = objects.collection_by_short_name(name)? {
        return Ok(ResolvedCollection::Existing(existing));
    }

    tracing::info!(collection = name, "creating collection");
    let metadata_file = collection_metadata_dir(config, name, corpus_dir)
        .map(|dir| dir.join(format!("{name}.n3")))
        .filter(|path| path.is_file());
    let Some(metadata_file) = metadata_file else {
        tracing::warn!(collection = name, dir = %corpus_dir.display(), "no collection metadata file found");
        return Ok(ResolvedCollection::Unavailable {
            reason: format!("no {name}.n3 found for {}", corpus_dir.display()),
        });
    };

    create_collection_from_file(objects, config, name, &metadata_file)
}

/// Create a collection from its Turtle metadata file.
pub fn create_collection_from_file(
    objects: &ObjectStore,
    config: &IngestConfig,
    name: &str,
    metadata_file: &Path,
) -> IngestResult<ResolvedCollection> {
    let rdf_metadata = std::fs::read_to_string(metadata_file).map_err(|e| IngestError::Io {
        path: metadata_file.to_path_buf(),
        source: e,
    })?;
    let graph = match RdfGraph::load(metadata_file) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::error!(collection = name, error = %e, "collection metadata is not valid Turtle");
            return Ok(ResolvedCollection::Unavailable {
                reason: e.to_string(),
            });
        }
    };
    let Some(uri) = graph.first_subject().map(str::to_string) else {
        tracing::error!(collection = name, path = %metadata_file.display(), "collection metadata file has no statements");
        return Ok(ResolvedCollection::Unavailable {
            reason: format!("{} has no statements", metadata_file.display()),
        });
    };

    if let Some(existing) = objects.collection_by_uri(&uri)? {
        tracing::error!(
            collection = name,
            uri = %uri,
            existing = %existing.short_name,
            "collection already exists in the system; skipping"
        );
        return Ok(ResolvedCollection::Unavailable {
            reason: format!("uri {uri} already belongs to collection {}", existing.short_name),
        });
    }

    let owner = resolve_data_owner(
        objects,
        config.ownership.default_data_owner.as_deref(),
        name,
        &graph,
    )?;

    let mut collection = Collection::new(objects.allocate_pid()?, name, &uri, rdf_metadata);
    collection.data_owner = owner.owner_email().map(str::to_string);
    collection.access = AccessControl::for_collection(name, collection.data_owner.as_deref());

    match objects.save(&mut collection) {
        Ok(()) => {}
        Err(e @ ObjectStoreError::Duplicate { .. }) => {
            tracing::error!(collection = name, error = %e, "collection creation rejected");
            return Ok(ResolvedCollection::Unavailable {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(collection = name, pid = collection.pid(), "collection created");
    Ok(ResolvedCollection::Created { collection, owner })
}

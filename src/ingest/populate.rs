//! Bulk-load a corpus directory's RDF into its collection repository.

use std::path::{Path, PathBuf};

use crate::error::TripleStoreResult;
use crate::rdf::{InsertReport, StoreKind, TripleStore};

pub const METADATA_SUFFIX: &str = "-metadata.rdf";
pub const ANNOTATION_SUFFIX: &str = "-ann.rdf";

/// Every regular file under `dir` (recursively) whose name ends in `suffix`,
/// in a stable order.
pub fn rdf_files_under(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.ends_with(suffix)))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

pub fn repository_description(collection_name: &str) -> String {
    format!("Metadata and Annotations for {collection_name} collection")
}

/// Ensure the collection's repository exists, then insert all metadata and
/// annotation files found under `corpus_dir`.
///
/// Inserts are repeated on every call; the store must treat them as upserts.
pub fn populate_triple_store(
    triples: &dyn TripleStore,
    corpus_dir: &Path,
    collection_name: &str,
) -> TripleStoreResult<InsertReport> {
    tracing::debug!(dir = %corpus_dir.display(), collection = collection_name, "start loading metadata and annotations");

    triples.create_repository(
        StoreKind::Native,
        collection_name,
        &repository_description(collection_name),
    )?;
    let repository = triples.repository(collection_name)?;

    let mut report = repository.insert_from_rdf_files(&rdf_files_under(corpus_dir, METADATA_SUFFIX))?;
    let annotations = repository.insert_from_rdf_files(&rdf_files_under(corpus_dir, ANNOTATION_SUFFIX))?;
    report.loaded += annotations.loaded;
    report.failed.extend(annotations.failed);

    tracing::debug!(
        dir = %corpus_dir.display(),
        loaded = report.loaded,
        failed = report.failed.len(),
        "finished loading metadata and annotations"
    );
    Ok(report)
}

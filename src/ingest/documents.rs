//! Document discovery: primary text for the item plus one Document record
//! per document listed in the manifest entry.

use std::path::{Path, PathBuf};

use crate::error::{IngestResult, TripleStoreResult};
use crate::manifest::{DocRef, last_segment};
use crate::mime::{TEXT_PLAIN, mime_type_for};
use crate::objects::{AccessControl, Collection, Datastream, Document, Item, ObjectStore, dsid};
use crate::rdf::{DC_SOURCE, INDEXABLE_DOCUMENT, SelectQuery, TripleStore};

use super::IngestWarning;

/// Local path of a document source. `file:` URLs are decoded; anything
/// else is taken as a plain path.
pub fn local_path(source: &str) -> PathBuf {
    if source.starts_with("file:") {
        if let Some(path) = url::Url::parse(source)
            .ok()
            .and_then(|u| u.to_file_path().ok())
        {
            return path;
        }
        let stripped = source
            .strip_prefix("file://")
            .or_else(|| source.strip_prefix("file:"))
            .unwrap_or(source);
        return PathBuf::from(stripped);
    }
    PathBuf::from(source)
}

fn indexable_documents_query(item_uri: &str) -> SelectQuery {
    SelectQuery::new(
        format!(
            "SELECT ?document ?source WHERE {{ \
               <{item_uri}> <{INDEXABLE_DOCUMENT}> ?document . \
               ?document <{DC_SOURCE}> ?source \
             }}"
        ),
        &["document", "source"],
    )
}

fn attach_primary_text_file(objects: &ObjectStore, item: &mut Item, path: &Path) -> IngestResult<()> {
    objects.attach_file(item, dsid::PRIMARY_TEXT, TEXT_PLAIN, path)?;
    tracing::debug!(item = item.pid(), path = %path.display(), "primary text attached");
    Ok(())
}

/// Attach the item's indexable documents, as recorded in the collection's
/// triple store repository, as its `primary_text` stream.
///
/// Returns the number of files attached. A source that cannot be attached
/// is reported in `warnings` and the remaining sources are still tried.
pub fn attach_primary_text(
    objects: &ObjectStore,
    triples: &dyn TripleStore,
    collection_name: &str,
    item: &mut Item,
    warnings: &mut Vec<IngestWarning>,
) -> usize {
    let sources = match indexable_sources(triples, collection_name, &item.uri) {
        Ok(sources) => sources,
        Err(e) => {
            tracing::error!(item = item.pid(), repository = collection_name, error = %e, "could not query the triple store for primary text");
            warnings.push(IngestWarning::PrimaryTextUnavailable {
                message: e.to_string(),
            });
            return 0;
        }
    };

    let mut attached = 0;
    for source in sources {
        let path = local_path(&source);
        if !path.is_file() {
            continue;
        }
        match attach_primary_text_file(objects, item, &path) {
            Ok(()) => attached += 1,
            Err(e) => {
                tracing::warn!(item = item.pid(), path = %path.display(), error = %e, "could not attach primary text");
                warnings.push(IngestWarning::PrimaryTextUnavailable {
                    message: e.to_string(),
                });
            }
        }
    }
    attached
}

fn indexable_sources(triples: &dyn TripleStore, collection_name: &str, item_uri: &str) -> TripleStoreResult<Vec<String>> {
    let repository = triples.repository(collection_name)?;
    repository
        .query(&indexable_documents_query(item_uri))?
        .iter()
        .map(|row| row.value("source").map(str::to_string))
        .collect()
}

/// Create or update a Document for every `DocRef`, returning the pids of
/// the documents touched. A failing document is reported in `warnings` and
/// does not stop its siblings.
pub fn discover_documents(
    objects: &ObjectStore,
    item: &mut Item,
    collection: &Collection,
    docs: &[DocRef],
    warnings: &mut Vec<IngestWarning>,
) -> Vec<String> {
    let mut touched = Vec::new();
    for doc in docs {
        let file_name = last_segment(&doc.source).to_string();
        match upsert_document(objects, item, collection, doc, &file_name, warnings) {
            Ok(pid) => touched.push(pid),
            Err(e) => {
                tracing::error!(item = item.pid(), file = %file_name, error = %e, "error creating document");
                warnings.push(IngestWarning::DocumentFailed {
                    file_name,
                    message: e.to_string(),
                });
            }
        }
    }
    touched
}

fn upsert_document(
    objects: &ObjectStore,
    item: &mut Item,
    collection: &Collection,
    doc: &DocRef,
    file_name: &str,
    warnings: &mut Vec<IngestWarning>,
) -> IngestResult<String> {
    let (mut document, created) = match objects.document_by_file(file_name, item.pid())? {
        Some(existing) => (existing, false),
        None => {
            let mut document = Document::new(objects.allocate_pid()?, file_name, item.pid());
            document.access = AccessControl::for_collection(&collection.short_name, collection.data_owner.as_deref());
            (document, true)
        }
    };

    document.file_name = file_name.to_string();
    document.doc_type = doc.doc_type;
    document.mime_type = mime_type_for(file_name).to_string();
    document.label = doc.source.clone();
    document.item = item.pid().to_string();
    document.datastreams.insert(
        dsid::CONTENT.to_string(),
        Datastream::external(dsid::CONTENT, &document.mime_type, &doc.source),
    );
    objects.save(&mut document)?;

    // Saved: the pid is reported even when primary text fails.
    let path = local_path(&doc.source);
    if doc.doc_type.is_storable() && path.is_file() {
        if let Err(e) = attach_primary_text_file(objects, item, &path) {
            tracing::warn!(document = document.pid(), path = %path.display(), error = %e, "could not attach primary text");
            warnings.push(IngestWarning::PrimaryTextUnavailable {
                message: format!("{file_name}: {e}"),
            });
        }
    }

    tracing::info!(
        doc_type = %doc.doc_type,
        document = document.pid(),
        file = file_name,
        created,
        "document saved"
    );
    Ok(document.meta.pid)
}

//! Attach a metadata file's sibling annotation file to its item.

use std::path::{Path, PathBuf};

use crate::objects::{Datastream, Item, dsid};

/// What happened to the item's annotation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationOutcome {
    Attached,
    Updated,
    /// No annotation file exists (or the name doesn't follow the convention).
    Absent,
}

/// `foo-metadata.rdf` → `foo-ann.rdf` in the same directory. Only the file
/// name is rewritten; `None` when the name has no `metadata` part.
pub fn annotation_path(metadata_file: &Path) -> Option<PathBuf> {
    let name = metadata_file.file_name()?.to_str()?;
    let renamed = name.replacen("metadata", "ann", 1);
    if renamed == name {
        return None;
    }
    Some(metadata_file.with_file_name(renamed))
}

/// `file://` URL for a local path.
pub fn file_url(path: &Path) -> String {
    std::path::absolute(path)
        .ok()
        .and_then(|abs| url::Url::from_file_path(abs).ok())
        .map(String::from)
        .unwrap_or_else(|| format!("file://{}", path.display()))
}

/// Point the item's `annotation_set` stream at the annotation file, if there
/// is one. The item still has to be saved.
pub fn attach_annotations(item: &mut Item, metadata_file: &Path) -> AnnotationOutcome {
    let Some(path) = annotation_path(metadata_file) else {
        return AnnotationOutcome::Absent;
    };
    if !path.is_file() {
        return AnnotationOutcome::Absent;
    }

    let stream = Datastream::external(dsid::ANNOTATION_SET, crate::mime::TEXT_PLAIN, &file_url(&path));
    let file = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    match item.datastreams.insert(dsid::ANNOTATION_SET.to_string(), stream) {
        None => {
            tracing::info!(item = item.pid(), file = %file, "annotation stream added");
            AnnotationOutcome::Attached
        }
        Some(_) => {
            tracing::info!(item = item.pid(), file = %file, "annotation stream updated");
            AnnotationOutcome::Updated
        }
    }
}

//! Item reconciliation: decide whether a metadata file's item is new, stale
//! or current, and create or update it accordingly.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{IngestError, IngestResult};
use crate::manifest::{FileEntry, ItemEntry, Manifest, file_name_of};
use crate::objects::{AccessControl, Collection, Item, ObjectStore};

/// Reconciliation state of one metadata file's item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// No item with the handle existed; one was created.
    Absent,
    /// The item existed and the file is not older than it; it was updated.
    StaleExisting,
    /// The item is newer than the file; nothing was touched.
    CurrentExisting,
}

impl ItemState {
    /// Whether the rest of the per-file pipeline should run.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::CurrentExisting)
    }
}

/// The reconciled item and how it got there.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub item: Item,
    pub state: ItemState,
}

/// The manifest entry for `rdf_file`, rejecting missing and error-tagged entries.
pub fn manifest_entry<'m>(manifest: &'m Manifest, rdf_file: &Path) -> IngestResult<&'m ItemEntry> {
    let file = file_name_of(rdf_file);
    match manifest.entry(&file) {
        None => Err(IngestError::ManifestEntryMissing { file }),
        Some(FileEntry::Failed { error }) => Err(IngestError::ManifestEntryErrored {
            file,
            error: error.clone(),
        }),
        Some(FileEntry::Parsed(entry)) => Ok(entry),
    }
}

pub fn item_handle(collection_name: &str, identifier: &str) -> String {
    format!("{collection_name}:{identifier}")
}

fn file_mtime(path: &Path) -> IngestResult<DateTime<Utc>> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Reconcile the item described by `rdf_file` against the object store.
///
/// New and stale items are persisted before returning. A stale item's
/// reindex request is left to the caller.
pub fn reconcile_item(
    objects: &ObjectStore,
    manifest: &Manifest,
    collection: &Collection,
    rdf_file: &Path,
    pid: Option<&str>,
) -> IngestResult<Reconciled> {
    let entry = manifest_entry(manifest, rdf_file)?;
    let handle = item_handle(&manifest.collection_name, &entry.id);

    if let Some(mut item) = objects.item_by_handle(&handle)? {
        if file_mtime(rdf_file)? < item.meta.modified_date {
            tracing::info!(item = item.pid(), handle = %handle, "item already up to date");
            return Ok(Reconciled {
                item,
                state: ItemState::CurrentExisting,
            });
        }

        item.label = handle.clone();
        item.uri = entry.uri.clone();
        item.collection = collection.pid().to_string();
        objects.save(&mut item)?;
        tracing::info!(item = item.pid(), handle = %handle, "item updated");
        return Ok(Reconciled {
            item,
            state: ItemState::StaleExisting,
        });
    }

    let pid = match pid {
        Some(pid) => pid.to_string(),
        None => objects.allocate_pid()?,
    };
    let mut item = Item::new(pid, &handle, &entry.uri, collection.pid());
    item.access = AccessControl::for_collection(&manifest.collection_name, collection.data_owner.as_deref());
    objects.save(&mut item)?;
    tracing::info!(item = item.pid(), handle = %handle, "item created");

    Ok(Reconciled {
        item,
        state: ItemState::Absent,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::{Duration, SystemTime};

    use super::*;

    fn fixture() -> (tempfile::TempDir, ObjectStore, Collection, Manifest) {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-metadata.rdf"), "").unwrap();

        let objects = ObjectStore::in_memory("test").unwrap();
        let mut collection = Collection::new("test:c", "demo", "http://example.org/demo", String::new());
        collection.data_owner = Some("owner@example.org".into());
        objects.save(&mut collection).unwrap();

        let mut files = BTreeMap::new();
        files.insert(
            "a-metadata.rdf".to_string(),
            FileEntry::Parsed(ItemEntry {
                id: "item1".into(),
                uri: "http://example.org/item1".into(),
                docs: Vec::new(),
            }),
        );
        files.insert(
            "bad-metadata.rdf".to_string(),
            FileEntry::Failed {
                error: "parse-error".into(),
            },
        );
        let manifest = Manifest {
            collection_name: "demo".into(),
            files,
        };
        (dir, objects, collection, manifest)
    }

    fn set_mtime(path: &Path, when: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn absent_then_current_then_stale() {
        let (dir, objects, collection, manifest) = fixture();
        let file = dir.path().join("a-metadata.rdf");
        set_mtime(&file, SystemTime::now() - Duration::from_secs(3600));

        let created = reconcile_item(&objects, &manifest, &collection, &file, Some("fixed:1")).unwrap();
        assert_eq!(created.state, ItemState::Absent);
        assert_eq!(created.item.pid(), "fixed:1");
        assert_eq!(created.item.handle, "demo:item1");
        assert_eq!(created.item.label, "demo:item1");
        assert!(created.item.access.edit_groups.contains("demo-edit"));
        assert!(created.item.access.edit_users.contains("owner@example.org"));

        let current = reconcile_item(&objects, &manifest, &collection, &file, None).unwrap();
        assert_eq!(current.state, ItemState::CurrentExisting);
        assert!(!current.state.changed());
        assert_eq!(current.item.meta.version, created.item.meta.version);

        set_mtime(&file, SystemTime::now() + Duration::from_secs(3600));
        let stale = reconcile_item(&objects, &manifest, &collection, &file, None).unwrap();
        assert_eq!(stale.state, ItemState::StaleExisting);
        assert_eq!(stale.item.pid(), "fixed:1");
        assert!(stale.item.meta.modified_date > created.item.meta.modified_date);
    }

    #[test]
    fn bad_manifest_entries_are_fatal() {
        let (dir, objects, collection, manifest) = fixture();
        let missing = reconcile_item(&objects, &manifest, &collection, &dir.path().join("zzz-metadata.rdf"), None);
        assert!(matches!(missing, Err(IngestError::ManifestEntryMissing { .. })));

        let errored = reconcile_item(&objects, &manifest, &collection, &dir.path().join("bad-metadata.rdf"), None);
        assert!(matches!(errored, Err(IngestError::ManifestEntryErrored { error, .. }) if error == "parse-error"));
    }
}

//! Object store for collection, item and document records, backed by redb.
//!
//! Records are bincode-encoded under `{kind}/{pid}`. Two index tables back
//! the query-by-field capability: unique fields map `{kind}/{field}/{value}`
//! to a pid, membership fields (back-references such as "items of a
//! collection") map `{kind}/{field}/{value}\0{pid}` to a pid. Managed
//! datastream bytes live in a separate content table.
//!
//! Every save runs in one write transaction that checks the record's
//! `version` against the stored one, enforces unique and immutable fields,
//! rewrites the index entries and bumps `modified_date`.

pub mod model;

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ObjectStoreError, ObjectStoreResult};

pub use model::{
    AccessControl, Collection, Datastream, DatastreamLocation, Document, DocumentType, Item,
    RecordMeta, User, UserRole, dsid,
};

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
const UNIQUE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("unique_index");
const MEMBER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("member_index");
const CONTENT: TableDefinition<&str, &[u8]> = TableDefinition::new("content");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// A record type the store can persist and index.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: &'static str;

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Fields whose values identify at most one record of this kind.
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Non-unique fields that are queryable (back-references).
    fn member_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Fields that may never change once the record exists.
    fn immutable_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

impl Record for Collection {
    const KIND: &'static str = "collection";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("short_name", self.short_name.clone()),
            ("uri", self.uri.clone()),
        ]
    }
}

impl Record for Item {
    const KIND: &'static str = "item";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        vec![("handle", self.handle.clone())]
    }
    fn member_fields(&self) -> Vec<(&'static str, String)> {
        vec![("collection", self.collection.clone())]
    }
    fn immutable_fields(&self) -> Vec<(&'static str, String)> {
        vec![("handle", self.handle.clone())]
    }
}

impl Record for Document {
    const KIND: &'static str = "document";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        vec![("item_file", document_key(&self.item, &self.file_name))]
    }
    fn member_fields(&self) -> Vec<(&'static str, String)> {
        vec![("item", self.item.clone())]
    }
}

/// Composite `(item, file_name)` key; file names are last path segments, so
/// they never contain `/`.
fn document_key(item_pid: &str, file_name: &str) -> String {
    format!("{item_pid}/{file_name}")
}

fn record_key(kind: &str, pid: &str) -> String {
    format!("{kind}/{pid}")
}

fn unique_key(kind: &str, field: &str, value: &str) -> String {
    format!("{kind}/{field}/{value}")
}

fn member_prefix(kind: &str, field: &str, value: &str) -> String {
    format!("{kind}/{field}/{value}\0")
}

fn redb_err(context: &str, e: impl std::fmt::Display) -> ObjectStoreError {
    ObjectStoreError::Redb {
        message: format!("{context} failed: {e}"),
    }
}

fn encode<T: Serialize>(value: &T) -> ObjectStoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ObjectStoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ObjectStoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| ObjectStoreError::Serialization {
        message: e.to_string(),
    })
}

/// ACID object store using redb.
#[derive(Clone)]
pub struct ObjectStore {
    db: Arc<Database>,
    pid_namespace: String,
}

impl ObjectStore {
    /// Open or create a store in the given directory.
    pub fn open(data_dir: &Path, pid_namespace: &str) -> ObjectStoreResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("objects.redb");
        let db = Database::create(&db_path).map_err(|e| ObjectStoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        Self::init(db, pid_namespace)
    }

    /// A store that lives only as long as the process.
    pub fn in_memory(pid_namespace: &str) -> ObjectStoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| redb_err("in-memory create", e))?;
        Self::init(db, pid_namespace)
    }

    fn init(db: Database, pid_namespace: &str) -> ObjectStoreResult<Self> {
        // Create every table up front so read transactions never hit a missing table.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        for table in [RECORDS, CONTENT, USERS] {
            txn.open_table(table).map_err(|e| redb_err("open_table", e))?;
        }
        for table in [UNIQUE_INDEX, MEMBER_INDEX] {
            txn.open_table(table).map_err(|e| redb_err("open_table", e))?;
        }
        txn.open_table(COUNTERS)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        Ok(Self {
            db: Arc::new(db),
            pid_namespace: pid_namespace.to_string(),
        })
    }

    /// Allocate a fresh `{namespace}:{n}` pid.
    pub fn allocate_pid(&self) -> ObjectStoreResult<String> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        let next = {
            let mut counters = txn
                .open_table(COUNTERS)
                .map_err(|e| redb_err("open_table", e))?;
            let current = counters
                .get("pid")
                .map_err(|e| redb_err("get", e))?
                .map(|g| g.value())
                .unwrap_or(0);
            let next = current + 1;
            counters
                .insert("pid", next)
                .map_err(|e| redb_err("insert", e))?;
            next
        };
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(format!("{}:{next}", self.pid_namespace))
    }

    /// Persist a record. On success the record's version and
    /// `modified_date` reflect what was stored; on failure they are unchanged.
    pub fn save<R: Record>(&self, record: &mut R) -> ObjectStoreResult<()> {
        let before = record.meta().clone();
        let result = self.save_inner(record);
        if result.is_err() {
            *record.meta_mut() = before;
        }
        result
    }

    fn save_inner<R: Record>(&self, record: &mut R) -> ObjectStoreResult<()> {
        let pid = record.meta().pid.clone();
        let key = record_key(R::KIND, &pid);

        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut records = txn
                .open_table(RECORDS)
                .map_err(|e| redb_err("open_table", e))?;
            let mut unique = txn
                .open_table(UNIQUE_INDEX)
                .map_err(|e| redb_err("open_table", e))?;
            let mut members = txn
                .open_table(MEMBER_INDEX)
                .map_err(|e| redb_err("open_table", e))?;

            let previous: Option<R> = match records.get(key.as_str()).map_err(|e| redb_err("get", e))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };

            match &previous {
                Some(_) if record.meta().is_new() => {
                    return Err(ObjectStoreError::Duplicate {
                        kind: R::KIND,
                        field: "pid",
                        value: pid,
                    });
                }
                Some(prev) => {
                    if prev.meta().version != record.meta().version {
                        return Err(ObjectStoreError::VersionConflict {
                            kind: R::KIND,
                            pid,
                            expected: record.meta().version,
                            found: prev.meta().version,
                        });
                    }
                    let old_values = prev.immutable_fields();
                    for (field, value) in record.immutable_fields() {
                        if old_values.iter().any(|(f, v)| *f == field && *v != value) {
                            return Err(ObjectStoreError::Immutable {
                                kind: R::KIND,
                                pid,
                                field,
                            });
                        }
                    }
                }
                None if !record.meta().is_new() => {
                    return Err(ObjectStoreError::VersionConflict {
                        kind: R::KIND,
                        pid,
                        expected: record.meta().version,
                        found: 0,
                    });
                }
                None => {}
            }

            for (field, value) in record.unique_fields() {
                let ukey = unique_key(R::KIND, field, &value);
                let owner = unique
                    .get(ukey.as_str())
                    .map_err(|e| redb_err("get", e))?
                    .map(|g| g.value().to_string());
                if owner.is_some_and(|o| o != pid) {
                    return Err(ObjectStoreError::Duplicate {
                        kind: R::KIND,
                        field,
                        value,
                    });
                }
            }

            if let Some(prev) = &previous {
                for (field, value) in prev.unique_fields() {
                    unique
                        .remove(unique_key(R::KIND, field, &value).as_str())
                        .map_err(|e| redb_err("remove", e))?;
                }
                for (field, value) in prev.member_fields() {
                    let mkey = format!("{}{pid}", member_prefix(R::KIND, field, &value));
                    members
                        .remove(mkey.as_str())
                        .map_err(|e| redb_err("remove", e))?;
                }
            }

            let now = Utc::now();
            let meta = record.meta_mut();
            if meta.is_new() {
                meta.created_date = now;
                meta.modified_date = now;
            } else {
                meta.modified_date = now.max(meta.modified_date + Duration::nanoseconds(1));
            }
            meta.version += 1;

            let bytes = encode(record)?;
            records
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
            for (field, value) in record.unique_fields() {
                unique
                    .insert(unique_key(R::KIND, field, &value).as_str(), pid.as_str())
                    .map_err(|e| redb_err("insert", e))?;
            }
            for (field, value) in record.member_fields() {
                let mkey = format!("{}{pid}", member_prefix(R::KIND, field, &value));
                members
                    .insert(mkey.as_str(), pid.as_str())
                    .map_err(|e| redb_err("insert", e))?;
            }
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Load a record by pid.
    pub fn get<R: Record>(&self, pid: &str) -> ObjectStoreResult<Option<R>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let records = txn
            .open_table(RECORDS)
            .map_err(|e| redb_err("open_table", e))?;
        let stored = records
            .get(record_key(R::KIND, pid).as_str())
            .map_err(|e| redb_err("get", e))?;
        stored.map(|guard| decode(guard.value())).transpose()
    }

    /// Load a record by pid, failing if it doesn't exist.
    pub fn load<R: Record>(&self, pid: &str) -> ObjectStoreResult<R> {
        self.get(pid)?.ok_or_else(|| ObjectStoreError::NotFound {
            kind: R::KIND,
            key: pid.to_string(),
        })
    }

    /// Find the record whose unique `field` equals `value`.
    pub fn find_by_field<R: Record>(&self, field: &str, value: &str) -> ObjectStoreResult<Option<R>> {
        let pid = {
            let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
            let unique = txn
                .open_table(UNIQUE_INDEX)
                .map_err(|e| redb_err("open_table", e))?;
            let found = unique
                .get(unique_key(R::KIND, field, value).as_str())
                .map_err(|e| redb_err("get", e))?;
            found.map(|g| g.value().to_string())
        };
        match pid {
            Some(pid) => self.get(&pid),
            None => Ok(None),
        }
    }

    /// All records whose membership `field` equals `value`, in pid order.
    pub fn find_members<R: Record>(&self, field: &str, value: &str) -> ObjectStoreResult<Vec<R>> {
        let prefix = member_prefix(R::KIND, field, value);
        let pids: Vec<String> = {
            let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
            let members = txn
                .open_table(MEMBER_INDEX)
                .map_err(|e| redb_err("open_table", e))?;
            let mut pids = Vec::new();
            for entry in members
                .range(prefix.as_str()..)
                .map_err(|e| redb_err("range", e))?
            {
                let (key, value) = entry.map_err(|e| redb_err("range", e))?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                pids.push(value.value().to_string());
            }
            pids
        };
        let mut found = Vec::with_capacity(pids.len());
        for pid in pids {
            if let Some(record) = self.get(&pid)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    pub fn collection_by_short_name(&self, short_name: &str) -> ObjectStoreResult<Option<Collection>> {
        self.find_by_field("short_name", short_name)
    }

    pub fn collection_by_uri(&self, uri: &str) -> ObjectStoreResult<Option<Collection>> {
        self.find_by_field("uri", uri)
    }

    pub fn item_by_handle(&self, handle: &str) -> ObjectStoreResult<Option<Item>> {
        self.find_by_field("handle", handle)
    }

    /// Look a document up by its `(file_name, item)` identity.
    pub fn document_by_file(&self, file_name: &str, item_pid: &str) -> ObjectStoreResult<Option<Document>> {
        self.find_by_field("item_file", &document_key(item_pid, file_name))
    }

    pub fn items_of(&self, collection_pid: &str) -> ObjectStoreResult<Vec<Item>> {
        self.find_members("collection", collection_pid)
    }

    pub fn documents_of(&self, item_pid: &str) -> ObjectStoreResult<Vec<Document>> {
        self.find_members("item", item_pid)
    }

    // -- datastream content ---------------------------------------------------

    /// Store the bytes of a managed datastream.
    pub fn put_content(&self, pid: &str, dsid: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut content = txn
                .open_table(CONTENT)
                .map_err(|e| redb_err("open_table", e))?;
            content
                .insert(format!("{pid}/{dsid}").as_str(), bytes)
                .map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Bytes of a managed datastream, if any were stored.
    pub fn content(&self, pid: &str, dsid: &str) -> ObjectStoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let content = txn
            .open_table(CONTENT)
            .map_err(|e| redb_err("open_table", e))?;
        let stored = content
            .get(format!("{pid}/{dsid}").as_str())
            .map_err(|e| redb_err("get", e))?;
        Ok(stored.map(|g| g.value().to_vec()))
    }

    /// Copy a local file into the store as a managed datastream of `item`.
    /// The item itself still has to be saved.
    pub fn attach_file(
        &self,
        item: &mut Item,
        dsid: &str,
        mime_type: &str,
        path: &Path,
    ) -> ObjectStoreResult<()> {
        let bytes = std::fs::read(path)?;
        self.put_content(item.pid(), dsid, &bytes)?;
        item.datastreams.insert(
            dsid.to_string(),
            Datastream {
                dsid: dsid.to_string(),
                mime_type: mime_type.to_string(),
                location: DatastreamLocation::Managed {
                    size: bytes.len() as u64,
                },
            },
        );
        Ok(())
    }

    // -- users ----------------------------------------------------------------

    pub fn put_user(&self, user: &User) -> ObjectStoreResult<()> {
        let bytes = encode(user)?;
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut users = txn
                .open_table(USERS)
                .map_err(|e| redb_err("open_table", e))?;
            users
                .insert(user.email.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> ObjectStoreResult<Option<User>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let users = txn
            .open_table(USERS)
            .map_err(|e| redb_err("open_table", e))?;
        let stored = users.get(email).map_err(|e| redb_err("get", e))?;
        stored.map(|guard| decode(guard.value())).transpose()
    }

    pub fn users(&self) -> ObjectStoreResult<Vec<User>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let users = txn
            .open_table(USERS)
            .map_err(|e| redb_err("open_table", e))?;
        let mut all = Vec::new();
        for entry in users.iter().map_err(|e| redb_err("iter", e))? {
            let (_, value) = entry.map_err(|e| redb_err("iter", e))?;
            all.push(decode(value.value())?);
        }
        Ok(all)
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("pid_namespace", &self.pid_namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> ObjectStore {
        ObjectStore::in_memory("test").unwrap()
    }

    fn collection(store: &ObjectStore, short_name: &str, uri: &str) -> Collection {
        let mut c = Collection::new(store.allocate_pid().unwrap(), short_name, uri, String::new());
        store.save(&mut c).unwrap();
        c
    }

    #[test]
    fn pids_are_sequential_and_namespaced() {
        let store = store();
        assert_eq!(store.allocate_pid().unwrap(), "test:1");
        assert_eq!(store.allocate_pid().unwrap(), "test:2");
    }

    #[test]
    fn save_and_find_by_unique_fields() {
        let store = store();
        let c = collection(&store, "demo", "http://example.org/demo");
        assert_eq!(c.meta.version, 1);

        let by_name = store.collection_by_short_name("demo").unwrap().unwrap();
        assert_eq!(by_name.pid(), c.pid());
        let by_uri = store.collection_by_uri("http://example.org/demo").unwrap().unwrap();
        assert_eq!(by_uri.pid(), c.pid());
        assert!(store.collection_by_short_name("other").unwrap().is_none());
    }

    #[test]
    fn duplicate_uri_is_rejected_and_original_kept() {
        let store = store();
        let original = collection(&store, "demo", "http://example.org/demo");

        let mut dup = Collection::new(store.allocate_pid().unwrap(), "demo2", "http://example.org/demo", String::new());
        let err = store.save(&mut dup).unwrap_err();
        assert!(matches!(err, ObjectStoreError::Duplicate { field: "uri", .. }));
        assert!(dup.meta.is_new());

        let kept = store.collection_by_uri("http://example.org/demo").unwrap().unwrap();
        assert_eq!(kept.pid(), original.pid());
        assert!(store.collection_by_short_name("demo2").unwrap().is_none());
    }

    #[test]
    fn modified_date_increases_on_every_save() {
        let store = store();
        let mut c = collection(&store, "demo", "http://example.org/demo");
        let first = c.meta.modified_date;
        store.save(&mut c).unwrap();
        let second = c.meta.modified_date;
        store.save(&mut c).unwrap();
        assert!(second > first);
        assert!(c.meta.modified_date > second);
        assert_eq!(c.meta.version, 3);
    }

    #[test]
    fn stale_copy_cannot_overwrite() {
        let store = store();
        let c = collection(&store, "demo", "http://example.org/demo");
        let mut a = store.load::<Collection>(c.pid()).unwrap();
        let mut b = store.load::<Collection>(c.pid()).unwrap();

        a.label = "first".into();
        store.save(&mut a).unwrap();

        b.label = "second".into();
        let err = store.save(&mut b).unwrap_err();
        assert!(matches!(err, ObjectStoreError::VersionConflict { expected: 1, found: 2, .. }));
        assert_eq!(store.load::<Collection>(c.pid()).unwrap().label, "first");
    }

    #[test]
    fn handle_is_immutable() {
        let store = store();
        let c = collection(&store, "demo", "http://example.org/demo");
        let mut item = Item::new(store.allocate_pid().unwrap(), "demo:1", "http://x/1", c.pid());
        store.save(&mut item).unwrap();

        item.handle = "demo:2".into();
        let err = store.save(&mut item).unwrap_err();
        assert!(matches!(err, ObjectStoreError::Immutable { field: "handle", .. }));
    }

    #[test]
    fn caller_supplied_pid_must_be_fresh() {
        let store = store();
        let c = collection(&store, "demo", "http://example.org/demo");
        let mut first = Item::new("fixed:1", "demo:1", "http://x/1", c.pid());
        store.save(&mut first).unwrap();

        let mut second = Item::new("fixed:1", "demo:2", "http://x/2", c.pid());
        let err = store.save(&mut second).unwrap_err();
        assert!(matches!(err, ObjectStoreError::Duplicate { field: "pid", .. }));
    }

    #[test]
    fn back_references_follow_updates() {
        let store = store();
        let a = collection(&store, "a", "http://example.org/a");
        let b = collection(&store, "b", "http://example.org/b");

        let mut item = Item::new(store.allocate_pid().unwrap(), "a:1", "http://x/1", a.pid());
        store.save(&mut item).unwrap();
        assert_eq!(store.items_of(a.pid()).unwrap().len(), 1);

        item.collection = b.pid().to_string();
        store.save(&mut item).unwrap();
        assert!(store.items_of(a.pid()).unwrap().is_empty());
        assert_eq!(store.items_of(b.pid()).unwrap()[0].handle, "a:1");
    }

    #[test]
    fn documents_are_unique_per_item_and_file() {
        let store = store();
        let mut d1 = Document::new(store.allocate_pid().unwrap(), "d1.txt", "test:item");
        store.save(&mut d1).unwrap();

        let found = store.document_by_file("d1.txt", "test:item").unwrap().unwrap();
        assert_eq!(found.pid(), d1.pid());
        assert!(store.document_by_file("d1.txt", "test:other").unwrap().is_none());

        let mut dup = Document::new(store.allocate_pid().unwrap(), "d1.txt", "test:item");
        assert!(store.save(&mut dup).is_err());
        assert_eq!(store.documents_of("test:item").unwrap().len(), 1);
    }

    #[test]
    fn attach_file_stores_managed_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d1.txt");
        std::fs::write(&path, "hello corpus").unwrap();

        let store = store();
        let mut item = Item::new(store.allocate_pid().unwrap(), "demo:1", "http://x/1", "test:c");
        store
            .attach_file(&mut item, dsid::PRIMARY_TEXT, "text/plain", &path)
            .unwrap();
        store.save(&mut item).unwrap();

        let stream = item.datastream(dsid::PRIMARY_TEXT).unwrap();
        assert_eq!(stream.location, DatastreamLocation::Managed { size: 12 });
        assert_eq!(
            store.content(item.pid(), dsid::PRIMARY_TEXT).unwrap().unwrap(),
            b"hello corpus"
        );
    }

    #[test]
    fn records_and_users_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let pid;
        {
            let store = ObjectStore::open(dir.path(), "test").unwrap();
            pid = collection(&store, "demo", "http://example.org/demo").meta.pid;
            store
                .put_user(&User::new("owner@example.org", UserRole::DataOwner))
                .unwrap();
        }

        let store = ObjectStore::open(dir.path(), "test").unwrap();
        assert_eq!(store.load::<Collection>(&pid).unwrap().short_name, "demo");
        let user = store.find_user_by_email("owner@example.org").unwrap().unwrap();
        assert!(user.can_own_data());
        assert_eq!(store.users().unwrap().len(), 1);
        // The pid counter resumes instead of restarting.
        assert_eq!(store.allocate_pid().unwrap(), "test:2");
    }
}

//! Repository records: collections, items, documents and users.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content category of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Text,
    Image,
    Audio,
    Video,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        Self::Text,
        Self::Image,
        Self::Audio,
        Self::Video,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::Other => "Other",
        }
    }

    /// Parse the label used in metadata files (`"Text"`, `"Image"`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    /// Whether documents of this type are copied into their item as primary text.
    pub fn is_storable(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping shared by every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Repository identity, immutable once created.
    pub pid: String,
    /// Optimistic concurrency token; 0 means "never saved".
    pub version: u64,
    pub created_date: DateTime<Utc>,
    /// Maintained by the store; strictly increases on every save.
    pub modified_date: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new(pid: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pid: pid.into(),
            version: 0,
            created_date: now,
            modified_date: now,
        }
    }

    pub fn is_new(&self) -> bool {
        self.version == 0
    }
}

/// Discover/read/edit group and user sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub discover_groups: BTreeSet<String>,
    pub read_groups: BTreeSet<String>,
    pub edit_groups: BTreeSet<String>,
    pub discover_users: BTreeSet<String>,
    pub read_users: BTreeSet<String>,
    pub edit_users: BTreeSet<String>,
}

impl AccessControl {
    /// Default sets for anything belonging to a collection: the
    /// `<collection>-{discover,read,edit}` groups plus full rights for the owner.
    pub fn for_collection(short_name: &str, owner: Option<&str>) -> Self {
        let mut access = Self::default();
        access.set_collection_groups(short_name);
        if let Some(owner) = owner {
            access.set_owner(owner);
        }
        access
    }

    pub fn set_collection_groups(&mut self, short_name: &str) {
        self.discover_groups = BTreeSet::from([format!("{short_name}-discover")]);
        self.read_groups = BTreeSet::from([format!("{short_name}-read")]);
        self.edit_groups = BTreeSet::from([format!("{short_name}-edit")]);
    }

    pub fn set_owner(&mut self, owner: &str) {
        self.discover_users = BTreeSet::from([owner.to_string()]);
        self.read_users = BTreeSet::from([owner.to_string()]);
        self.edit_users = BTreeSet::from([owner.to_string()]);
    }
}

/// Where a datastream's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatastreamLocation {
    /// The stream points at content held elsewhere (a URL or `file://` path).
    External(String),
    /// The bytes were copied into the object store's content table.
    Managed { size: u64 },
}

/// A named content stream attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastream {
    pub dsid: String,
    pub mime_type: String,
    pub location: DatastreamLocation,
}

impl Datastream {
    pub fn external(dsid: &str, mime_type: &str, location: &str) -> Self {
        Self {
            dsid: dsid.to_string(),
            mime_type: mime_type.to_string(),
            location: DatastreamLocation::External(location.to_string()),
        }
    }
}

/// Well-known datastream ids.
pub mod dsid {
    pub const PRIMARY_TEXT: &str = "primary_text";
    pub const ANNOTATION_SET: &str = "annotation_set";
    pub const CONTENT: &str = "content";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub meta: RecordMeta,
    /// Unique; the prefix of every item handle.
    pub short_name: String,
    /// Subject of the collection metadata; globally unique.
    pub uri: String,
    pub label: String,
    pub privacy_status: bool,
    /// Email of the owning user.
    pub data_owner: Option<String>,
    pub access: AccessControl,
    /// Turtle source of the collection-level metadata.
    pub rdf_metadata: String,
}

impl Collection {
    pub fn new(pid: impl Into<String>, short_name: &str, uri: &str, rdf_metadata: String) -> Self {
        Self {
            meta: RecordMeta::new(pid),
            short_name: short_name.to_string(),
            uri: uri.to_string(),
            label: uri.to_string(),
            privacy_status: false,
            data_owner: None,
            access: AccessControl::default(),
            rdf_metadata,
        }
    }

    pub fn pid(&self) -> &str {
        &self.meta.pid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub meta: RecordMeta,
    pub label: String,
    /// `{collection}:{identifier}`; unique and immutable.
    pub handle: String,
    pub uri: String,
    /// Pid of the owning collection.
    pub collection: String,
    pub access: AccessControl,
    pub datastreams: BTreeMap<String, Datastream>,
}

impl Item {
    pub fn new(pid: impl Into<String>, handle: &str, uri: &str, collection: &str) -> Self {
        Self {
            meta: RecordMeta::new(pid),
            label: handle.to_string(),
            handle: handle.to_string(),
            uri: uri.to_string(),
            collection: collection.to_string(),
            access: AccessControl::default(),
            datastreams: BTreeMap::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.meta.pid
    }

    pub fn datastream(&self, dsid: &str) -> Option<&Datastream> {
        self.datastreams.get(dsid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub meta: RecordMeta,
    /// Last path segment of the source; unique per item.
    pub file_name: String,
    pub doc_type: DocumentType,
    pub mime_type: String,
    /// The source URI.
    pub label: String,
    /// Pid of the owning item.
    pub item: String,
    pub access: AccessControl,
    pub datastreams: BTreeMap<String, Datastream>,
}

impl Document {
    pub fn new(pid: impl Into<String>, file_name: &str, item: &str) -> Self {
        Self {
            meta: RecordMeta::new(pid),
            file_name: file_name.to_string(),
            doc_type: DocumentType::Other,
            mime_type: crate::mime::OCTET_STREAM.to_string(),
            label: String::new(),
            item: item.to_string(),
            access: AccessControl::default(),
            datastreams: BTreeMap::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.meta.pid
    }
}

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    DataOwner,
    Researcher,
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "data-owner" | "data_owner" | "dataowner" => Ok(Self::DataOwner),
            "researcher" => Ok(Self::Researcher),
            other => Err(format!("unknown role \"{other}\" (expected admin, data-owner or researcher)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub role: UserRole,
}

impl User {
    pub fn new(email: &str, role: UserRole) -> Self {
        Self {
            email: email.to_string(),
            role,
        }
    }

    pub fn can_own_data(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::DataOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_labels() {
        for t in DocumentType::ALL {
            assert_eq!(DocumentType::from_label(t.as_str()), Some(t));
        }
        assert_eq!(DocumentType::from_label("text"), None);
        assert!(DocumentType::Text.is_storable());
        assert!(!DocumentType::Image.is_storable());
    }

    #[test]
    fn collection_access_defaults() {
        let access = AccessControl::for_collection("demo", Some("owner@example.org"));
        assert!(access.discover_groups.contains("demo-discover"));
        assert!(access.read_groups.contains("demo-read"));
        assert!(access.edit_groups.contains("demo-edit"));
        assert!(access.edit_users.contains("owner@example.org"));

        let ownerless = AccessControl::for_collection("demo", None);
        assert!(ownerless.read_users.is_empty());
    }

    #[test]
    fn roles_gate_data_ownership() {
        assert!(User::new("a@x", UserRole::Admin).can_own_data());
        assert!(User::new("d@x", UserRole::DataOwner).can_own_data());
        assert!(!User::new("r@x", UserRole::Researcher).can_own_data());
        assert_eq!("data-owner".parse::<UserRole>(), Ok(UserRole::DataOwner));
        assert!("guest".parse::<UserRole>().is_err());
    }
}

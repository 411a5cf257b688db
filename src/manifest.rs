//! Per-directory corpus manifest backed by `manifest.json`.
//!
//! The manifest records, for every `*-metadata.rdf` file in a corpus
//! directory, the item identifier and URI plus the documents the item
//! describes. It is built once by parsing each file and then serves as the
//! only checkpoint between ingest runs: files that failed to parse keep an
//! error entry so later runs can report them without parsing again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::{IngestConfig, ManifestPolicy};
use crate::error::{ManifestError, ManifestResult};
use crate::objects::DocumentType;
use crate::rdf::{DC_IDENTIFIER, DC_IS_PART_OF, DC_SOURCE, DC_TYPE, RdfGraph, SelectQuery};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Error marker written for files that could not be parsed.
pub const PARSE_ERROR: &str = "parse-error";

const METADATA_SUFFIX: &str = "-metadata.rdf";

/// Facts extracted from one corpus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub collection_name: String,
    /// Keyed by metadata file name (not path).
    pub files: BTreeMap<String, FileEntry>,
}

/// Manifest entry for one metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileEntry {
    /// The file could not be parsed or queried.
    Failed { error: String },
    Parsed(ItemEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub id: String,
    pub uri: String,
    pub docs: Vec<DocRef>,
}

/// A document described by an item's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    pub identifier: String,
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
}

impl FileEntry {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Parsed(_) => None,
        }
    }

    pub fn item(&self) -> Option<&ItemEntry> {
        match self {
            Self::Parsed(item) => Some(item),
            Self::Failed { .. } => None,
        }
    }
}

impl Manifest {
    /// Read `manifest.json` from a corpus directory.
    pub fn load(corpus_dir: &Path) -> ManifestResult<Self> {
        let path = manifest_path(corpus_dir);
        let data = std::fs::read_to_string(&path).map_err(|e| ManifestError::Io {
            message: format!("read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&data).map_err(|e| ManifestError::Invalid {
            path,
            message: e.to_string(),
        })
    }

    /// Write `manifest.json` into a corpus directory, replacing any previous one.
    pub fn save(&self, corpus_dir: &Path) -> ManifestResult<()> {
        let path = manifest_path(corpus_dir);
        let tmp = corpus_dir.join(format!("{MANIFEST_FILE_NAME}.tmp"));
        let json = serde_json::to_string_pretty(self).map_err(|e| ManifestError::Io {
            message: format!("serialize manifest: {e}"),
        })?;
        std::fs::write(&tmp, json).map_err(|e| ManifestError::Io {
            message: format!("write {}: {e}", tmp.display()),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| ManifestError::Io {
            message: format!("rename {} -> {}: {e}", tmp.display(), path.display()),
        })
    }

    pub fn entry(&self, file_name: &str) -> Option<&FileEntry> {
        self.files.get(file_name)
    }

    /// Names of the files whose entries record an error.
    pub fn failures(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|(_, entry)| entry.error().is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

pub fn manifest_path(corpus_dir: &Path) -> PathBuf {
    corpus_dir.join(MANIFEST_FILE_NAME)
}

/// `*-metadata.rdf` files directly inside `corpus_dir`, sorted by name.
pub fn metadata_files(corpus_dir: &Path) -> ManifestResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(corpus_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ManifestError::Io {
            message: format!("list {}: {e}", corpus_dir.display()),
        })?;
        let is_metadata = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.ends_with(METADATA_SUFFIX));
        if is_metadata && entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Build the manifest for `corpus_dir` and write it, overwriting any existing one.
pub fn create_collection_manifest(corpus_dir: &Path, config: &IngestConfig) -> ManifestResult<Manifest> {
    tracing::info!(dir = %corpus_dir.display(), "creating collection manifest");
    let started = Instant::now();

    let files = metadata_files(corpus_dir)?;
    if files.is_empty() {
        return Err(ManifestError::NoMetadataFiles {
            dir: corpus_dir.to_path_buf(),
        });
    }

    let collection_name = files
        .iter()
        .find_map(|f| extract_collection_name(f, config))
        .ok_or_else(|| ManifestError::NoCollectionName {
            dir: corpus_dir.to_path_buf(),
        })?;

    let mut manifest = Manifest {
        collection_name,
        files: BTreeMap::new(),
    };
    for path in &files {
        let file_name = file_name_of(path);
        let entry = match extract_item_entry(path) {
            Ok(item) => FileEntry::Parsed(item),
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "metadata file could not be read into the manifest");
                FileEntry::Failed {
                    error: PARSE_ERROR.into(),
                }
            }
        };
        manifest.files.insert(file_name, entry);
    }

    manifest.save(corpus_dir)?;

    tracing::debug!(
        dir = %corpus_dir.display(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "manifest written"
    );
    let failures = manifest.failures();
    if !failures.is_empty() {
        tracing::debug!(?failures, "manifest failures");
    }
    Ok(manifest)
}

/// Return the directory's manifest, building it when the policy asks for it.
pub fn ensure_manifest(corpus_dir: &Path, config: &IngestConfig) -> ManifestResult<Manifest> {
    let path = manifest_path(corpus_dir);
    if !path.exists() {
        return create_collection_manifest(corpus_dir, config);
    }
    if config.manifest.policy == ManifestPolicy::RefreshIfStale && is_stale(corpus_dir)? {
        tracing::info!(dir = %corpus_dir.display(), "manifest is older than its metadata; rebuilding");
        return create_collection_manifest(corpus_dir, config);
    }
    Manifest::load(corpus_dir)
}

/// Delete the manifest so the next ingest rebuilds it. Returns whether one existed.
pub fn invalidate_manifest(corpus_dir: &Path) -> ManifestResult<bool> {
    let path = manifest_path(corpus_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "manifest invalidated");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ManifestError::Io {
            message: format!("remove {}: {e}", path.display()),
        }),
    }
}

/// Whether any metadata file was modified after the manifest was written.
fn is_stale(corpus_dir: &Path) -> ManifestResult<bool> {
    let written = mtime(&manifest_path(corpus_dir))?;
    for file in metadata_files(corpus_dir)? {
        if mtime(&file)? > written {
            return Ok(true);
        }
    }
    Ok(false)
}

fn mtime(path: &Path) -> ManifestResult<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ManifestError::Io {
            message: format!("stat {}: {e}", path.display()),
        })
}

/// Last `/`-separated segment of a path or URI. Strings containing
/// whitespace are not paths and are returned whole.
pub fn last_segment(value: &str) -> &str {
    if value.chars().any(char::is_whitespace) {
        return value;
    }
    value
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(value)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn collection_query() -> SelectQuery {
    SelectQuery::new(
        format!("SELECT ?item ?collection WHERE {{ ?item <{DC_IS_PART_OF}> ?collection }}"),
        &["item", "collection"],
    )
}

fn identifier_query() -> SelectQuery {
    SelectQuery::new(
        format!(
            "SELECT ?item ?identifier WHERE {{ \
               ?item <{DC_IDENTIFIER}> ?identifier . \
               FILTER NOT EXISTS {{ ?item <{DC_SOURCE}> ?any }} \
             }} ORDER BY ?item ?identifier"
        ),
        &["item", "identifier"],
    )
}

fn documents_query() -> SelectQuery {
    SelectQuery::new(
        format!(
            "SELECT ?document ?type ?identifier ?source WHERE {{ \
               ?document <{DC_TYPE}> ?type ; \
                         <{DC_IDENTIFIER}> ?identifier ; \
                         <{DC_SOURCE}> ?source . \
             }} ORDER BY ?identifier ?source"
        ),
        &["document", "type", "identifier", "source"],
    )
}

/// Collection short name from one metadata file, or `None` if the file
/// can't be parsed or names no collection.
fn extract_collection_name(path: &Path, config: &IngestConfig) -> Option<String> {
    let graph = match RdfGraph::load(path) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read collection from metadata file");
            return None;
        }
    };
    let rows = match graph.query(&collection_query()) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "collection query failed");
            return None;
        }
    };

    let collections: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.value("collection").ok())
        .collect();
    if let Some(alias) = collections.iter().find_map(|c| config.alias_for(c)) {
        return Some(alias.to_string());
    }
    collections
        .first()
        .map(|c| last_segment(c).to_string())
        .filter(|name| !name.is_empty())
}

fn extract_item_entry(path: &Path) -> ManifestResult<ItemEntry> {
    let parse_error = |message: String| ManifestError::RdfParse {
        path: path.to_path_buf(),
        message,
    };

    let graph = RdfGraph::load(path).map_err(|e| parse_error(e.to_string()))?;

    let rows = graph
        .query(&identifier_query())
        .map_err(|e| parse_error(e.to_string()))?;
    let first = rows
        .first()
        .ok_or_else(|| parse_error("no item identifier".into()))?;
    let id = first
        .value("identifier")
        .map_err(|e| parse_error(e.to_string()))?
        .to_string();
    let uri = first
        .value("item")
        .map_err(|e| parse_error(e.to_string()))?
        .to_string();

    let mut docs = Vec::new();
    for row in graph
        .query(&documents_query())
        .map_err(|e| parse_error(e.to_string()))?
    {
        let label = row.value("type").map_err(|e| parse_error(e.to_string()))?;
        let doc_type = DocumentType::from_label(label).unwrap_or_else(|| {
            tracing::warn!(path = %path.display(), doc_type = label, "unknown document type, recording as Other");
            DocumentType::Other
        });
        docs.push(DocRef {
            identifier: row
                .value("identifier")
                .map_err(|e| parse_error(e.to_string()))?
                .to_string(),
            source: row
                .value("source")
                .map_err(|e| parse_error(e.to_string()))?
                .to_string(),
            doc_type,
        });
    }

    Ok(ItemEntry { id, uri, docs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item_ttl(id: &str, collection: &str) -> String {
        format!(
            r#"@prefix dcterms: <http://purl.org/dc/terms/> .
<http://example.org/{id}> dcterms:identifier "{id}" ;
    dcterms:isPartOf <{collection}> .
<http://example.org/{id}/d1> dcterms:type "Text" ;
    dcterms:identifier "{id}-d1.txt" ;
    dcterms:source <file:///corpus/{id}-d1.txt> .
<http://example.org/{id}/d2> dcterms:type "Audio" ;
    dcterms:identifier "{id}-d2.wav" ;
    dcterms:source <file:///corpus/{id}-d2.wav> .
"#
        )
    }

    #[test]
    fn last_segment_rules() {
        assert_eq!(last_segment("http://example.org/corpus/demo"), "demo");
        assert_eq!(last_segment("http://example.org/corpus/demo/"), "demo");
        assert_eq!(last_segment("file:///corpus/d1.txt"), "d1.txt");
        assert_eq!(last_segment("not a path/really"), "not a path/really");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn builds_entries_and_records_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-metadata.rdf"), item_ttl("a", "http://example.org/corpus/demo")).unwrap();
        std::fs::write(dir.path().join("b-metadata.rdf"), item_ttl("b", "http://example.org/corpus/demo")).unwrap();
        std::fs::write(dir.path().join("c-metadata.rdf"), "garbage that is not turtle").unwrap();
        std::fs::write(dir.path().join("a-ann.rdf"), "ignored").unwrap();

        let manifest = create_collection_manifest(dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(manifest.collection_name, "demo");
        assert_eq!(manifest.files.len(), 3);
        assert_eq!(manifest.failures(), vec!["c-metadata.rdf"]);

        let a = manifest.entry("a-metadata.rdf").unwrap().item().unwrap();
        assert_eq!(a.id, "a");
        assert_eq!(a.uri, "http://example.org/a");
        assert_eq!(a.docs.len(), 2);
        assert_eq!(a.docs[0].identifier, "a-d1.txt");
        assert_eq!(a.docs[0].doc_type, DocumentType::Text);
        assert_eq!(a.docs[1].doc_type, DocumentType::Audio);

        assert!(manifest_path(dir.path()).is_file());
        assert_eq!(Manifest::load(dir.path()).unwrap(), manifest);
    }

    #[test]
    fn error_entries_serialize_as_bare_error() {
        let entry = FileEntry::Failed {
            error: PARSE_ERROR.into(),
        };
        assert_eq!(serde_json::to_string(&entry).unwrap(), r#"{"error":"parse-error"}"#);

        let parsed: FileEntry = serde_json::from_str(
            r#"{"id":"x","uri":"http://x","docs":[{"identifier":"d","source":"s","type":"Image"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.item().unwrap().docs[0].doc_type, DocumentType::Image);
    }

    #[test]
    fn alias_overrides_derived_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("s1-metadata.rdf"), item_ttl("s1", "http://ns.austalk.edu.au/corpus")).unwrap();
        let manifest = create_collection_manifest(dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(manifest.collection_name, "austalk");
    }

    #[test]
    fn collection_name_falls_back_to_later_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-metadata.rdf"), "broken").unwrap();
        std::fs::write(dir.path().join("b-metadata.rdf"), item_ttl("b", "http://example.org/corpus/demo")).unwrap();
        let manifest = create_collection_manifest(dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(manifest.collection_name, "demo");
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = create_collection_manifest(dir.path(), &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, ManifestError::NoMetadataFiles { .. }));

        std::fs::write(dir.path().join("a-metadata.rdf"), "broken").unwrap();
        let err = create_collection_manifest(dir.path(), &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, ManifestError::NoCollectionName { .. }));
    }

    #[test]
    fn existing_manifest_is_reused_until_invalidated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-metadata.rdf"), item_ttl("a", "http://example.org/corpus/demo")).unwrap();
        let config = IngestConfig::default();
        ensure_manifest(dir.path(), &config).unwrap();

        std::fs::write(dir.path().join("b-metadata.rdf"), item_ttl("b", "http://example.org/corpus/demo")).unwrap();
        assert_eq!(ensure_manifest(dir.path(), &config).unwrap().files.len(), 1);

        assert!(invalidate_manifest(dir.path()).unwrap());
        assert!(!invalidate_manifest(dir.path()).unwrap());
        assert_eq!(ensure_manifest(dir.path(), &config).unwrap().files.len(), 2);
    }

    #[test]
    fn refresh_policy_rebuilds_stale_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-metadata.rdf"), item_ttl("a", "http://example.org/corpus/demo")).unwrap();
        let mut config = IngestConfig::default();
        config.manifest.policy = ManifestPolicy::RefreshIfStale;
        ensure_manifest(dir.path(), &config).unwrap();

        let newer = dir.path().join("b-metadata.rdf");
        std::fs::write(&newer, item_ttl("b", "http://example.org/corpus/demo")).unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(60);
        std::fs::File::options()
            .write(true)
            .open(&newer)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(ensure_manifest(dir.path(), &config).unwrap().files.len(), 2);
    }
}

//! Rich diagnostic error types for the ingest pipeline.
//!
//! Each backing store defines its own error type with miette `#[diagnostic]`
//! derives, so a failed ingest tells the operator which store failed and what
//! to check.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for an ingest.
///
/// Store-specific variants are wrapped transparently; the remaining variants
/// are the structural failures that stop processing of a single metadata file.
#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    TripleStore(#[from] TripleStoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("{} does not appear to be a metadata file", path.display())]
    #[diagnostic(
        code(corpus::ingest::not_metadata),
        help(
            "Only files whose name contains `metadata` (normally `*-metadata.rdf`) \
             describe items. Annotation files are picked up automatically."
        )
    )]
    NotMetadataFile { path: PathBuf },

    #[error("no manifest entry for \"{file}\"")]
    #[diagnostic(
        code(corpus::ingest::manifest_entry_missing),
        help(
            "The manifest was built before this file existed. Invalidate it with \
             `corpus-ingest manifest invalidate <dir>` and ingest again."
        )
    )]
    ManifestEntryMissing { file: String },

    #[error("manifest entry for \"{file}\" records an error: {error}")]
    #[diagnostic(
        code(corpus::ingest::manifest_entry_errored),
        help(
            "The metadata file could not be parsed when the manifest was built. \
             Fix the RDF, invalidate the manifest and ingest again."
        )
    )]
    ManifestEntryErrored { file: String, error: String },

    #[error("collection \"{name}\" is not available")]
    #[diagnostic(
        code(corpus::ingest::collection_unavailable),
        help(
            "The collection does not exist and could not be created. Check that \
             `{name}.n3` sits next to the corpus directory and that its URI is not \
             already used by another collection."
        )
    )]
    CollectionUnavailable { name: String },

    #[error("I/O error on {}: {source}", path.display())]
    #[diagnostic(
        code(corpus::ingest::io),
        help("A filesystem operation failed. Check file paths and permissions.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for pipeline results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

// ---------------------------------------------------------------------------
// Manifest errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("no metadata files in {}", dir.display())]
    #[diagnostic(
        code(corpus::manifest::no_metadata_files),
        help("A corpus directory must contain at least one `*-metadata.rdf` file.")
    )]
    NoMetadataFiles { dir: PathBuf },

    #[error("no collection name could be derived from the metadata in {}", dir.display())]
    #[diagnostic(
        code(corpus::manifest::no_collection_name),
        help(
            "At least one metadata file must parse and state \
             `dcterms:isPartOf <collection>` for its item."
        )
    )]
    NoCollectionName { dir: PathBuf },

    #[error("RDF parse error in {}: {message}", path.display())]
    #[diagnostic(
        code(corpus::manifest::rdf_parse),
        help("Metadata files are read as Turtle. Check the file for syntax errors.")
    )]
    RdfParse { path: PathBuf, message: String },

    #[error("manifest I/O error: {message}")]
    #[diagnostic(
        code(corpus::manifest::io),
        help(
            "Failed to read or write `manifest.json`. Check that the corpus \
             directory is writable."
        )
    )]
    Io { message: String },

    #[error("manifest at {} is not valid JSON: {message}", path.display())]
    #[diagnostic(
        code(corpus::manifest::invalid),
        help("Delete the file (or run `corpus-ingest manifest invalidate`) to rebuild it.")
    )]
    Invalid { path: PathBuf, message: String },
}

pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

// ---------------------------------------------------------------------------
// Object store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ObjectStoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(corpus::objects::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(corpus::objects::redb),
        help(
            "The embedded database encountered a transaction error. \
             If the problem persists, move the data directory aside and re-ingest."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(corpus::objects::serde),
        help(
            "Failed to encode or decode a stored record. The stored format may \
             have changed between versions; re-ingest into a fresh data directory."
        )
    )]
    Serialization { message: String },

    #[error("{kind} not found: {key}")]
    #[diagnostic(
        code(corpus::objects::not_found),
        help("The requested record does not exist. Verify the identifier.")
    )]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} with {field} = \"{value}\" already exists")]
    #[diagnostic(
        code(corpus::objects::duplicate),
        help("This field is unique. The existing record was left untouched.")
    )]
    Duplicate {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{kind} {pid} was modified concurrently (expected version {expected}, found {found})")]
    #[diagnostic(
        code(corpus::objects::version_conflict),
        help(
            "Another ingest saved this record after it was loaded. Re-run the \
             ingest for this file; the item will be reconciled again."
        )
    )]
    VersionConflict {
        kind: &'static str,
        pid: String,
        expected: u64,
        found: u64,
    },

    #[error("{field} of {kind} {pid} is immutable")]
    #[diagnostic(
        code(corpus::objects::immutable),
        help("Handles and pids never change after creation.")
    )]
    Immutable {
        kind: &'static str,
        pid: String,
        field: &'static str,
    },
}

pub type ObjectStoreResult<T> = std::result::Result<T, ObjectStoreError>;

impl From<std::io::Error> for ObjectStoreError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Triple store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TripleStoreError {
    #[error("triple store unreachable at {url}: {message}")]
    #[diagnostic(
        code(corpus::triples::unreachable),
        help("Check that the Sesame/RDF4J server is running and the configured URL is correct.")
    )]
    Unreachable { url: String, message: String },

    #[error("triple store returned HTTP {status}: {message}")]
    #[diagnostic(
        code(corpus::triples::http_status),
        help("The server rejected the request. Check the server log for details.")
    )]
    Status { status: u16, message: String },

    #[error("repository \"{name}\" does not exist")]
    #[diagnostic(
        code(corpus::triples::no_repository),
        help("Repositories are created by the populate step; ingest the corpus first.")
    )]
    NoRepository { name: String },

    #[error("SPARQL query error: {message}")]
    #[diagnostic(
        code(corpus::triples::sparql),
        help("The SPARQL query failed. Check the query syntax and the store state.")
    )]
    Sparql { message: String },

    #[error("query row is missing required variable ?{variable}")]
    #[diagnostic(
        code(corpus::triples::missing_binding),
        help("The query result did not match the expected shape.")
    )]
    MissingBinding { variable: String },

    #[error("failed to load {}: {message}", path.display())]
    #[diagnostic(
        code(corpus::triples::load),
        help("The RDF file could not be parsed as Turtle.")
    )]
    Load { path: PathBuf, message: String },

    #[error("triple store backend error: {message}")]
    #[diagnostic(
        code(corpus::triples::backend),
        help("The embedded oxigraph store failed. Check the data directory permissions.")
    )]
    Backend { message: String },
}

pub type TripleStoreResult<T> = std::result::Result<T, TripleStoreError>;

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NotifyError {
    #[error("message broker connection failed: {message}")]
    #[diagnostic(
        code(corpus::notify::connect),
        help("Check that the AMQP broker is running and the configured URL is correct.")
    )]
    Connect { message: String },

    #[error("publish to \"{topic}\" failed: {message}")]
    #[diagnostic(
        code(corpus::notify::publish),
        help("The broker rejected the message or the connection dropped.")
    )]
    Publish { topic: String, message: String },

    #[error("broker connection already closed")]
    #[diagnostic(
        code(corpus::notify::closed),
        help("Open a new connection for each batch of notifications.")
    )]
    Closed,
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

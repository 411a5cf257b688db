//! A single RDF document parsed into an in-memory oxigraph store.
//!
//! Used for per-file manifest extraction and for the collection-level
//! metadata graph the data owner is resolved from.

use std::io::Read;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::store::Store;

use crate::error::{TripleStoreError, TripleStoreResult};

use super::{QueryRow, SelectQuery, bare_iri, select_on_store};

/// Parsed graph plus the subject of its first statement in document order.
pub struct RdfGraph {
    store: Store,
    first_subject: Option<String>,
    len: usize,
}

impl RdfGraph {
    /// Parse a Turtle file. Relative IRIs resolve against the file's URL.
    pub fn load(path: &Path) -> TripleStoreResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| TripleStoreError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let base = file_base_iri(path);
        Self::from_reader(std::io::BufReader::new(file), base.as_deref()).map_err(|e| match e {
            TripleStoreError::Load { message, .. } => TripleStoreError::Load {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse Turtle text held in memory.
    pub fn parse_turtle(text: &str, base_iri: Option<&str>) -> TripleStoreResult<Self> {
        Self::from_reader(text.as_bytes(), base_iri)
    }

    fn from_reader(reader: impl Read, base_iri: Option<&str>) -> TripleStoreResult<Self> {
        let mut parser = RdfParser::from_format(RdfFormat::Turtle);
        if let Some(base) = base_iri {
            parser = parser.with_base_iri(base).map_err(|e| TripleStoreError::Load {
                path: base.into(),
                message: format!("invalid base IRI: {e}"),
            })?;
        }

        let store = Store::new().map_err(|e| TripleStoreError::Backend {
            message: format!("failed to create in-memory store: {e}"),
        })?;

        let mut first_subject = None;
        let mut len = 0usize;
        for quad in parser.for_reader(reader) {
            let quad = quad.map_err(|e| TripleStoreError::Load {
                path: Default::default(),
                message: e.to_string(),
            })?;
            if first_subject.is_none() {
                first_subject = Some(bare_iri(&quad.subject.to_string()).to_string());
            }
            store.insert(&quad).map_err(|e| TripleStoreError::Backend {
                message: format!("insert failed: {e}"),
            })?;
            len += 1;
        }

        Ok(Self {
            store,
            first_subject,
            len,
        })
    }

    /// Subject of the first statement as written in the source document.
    pub fn first_subject(&self) -> Option<&str> {
        self.first_subject.as_deref()
    }

    /// Number of statements parsed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn query(&self, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>> {
        select_on_store(&self.store, query)
    }
}

impl std::fmt::Debug for RdfGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdfGraph")
            .field("first_subject", &self.first_subject)
            .field("len", &self.len)
            .finish()
    }
}

/// `file://` URL of a path, used as the base IRI when parsing it.
pub(crate) fn file_base_iri(path: &Path) -> Option<String> {
    let absolute = std::path::absolute(path).ok()?;
    url::Url::from_file_path(absolute).ok().map(String::from)
}

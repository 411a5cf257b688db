// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # corpus-ingest
//!
//! Ingests directories of per-item RDF metadata ("corpora") into a digital
//! collection repository.
//!
//! ## Architecture
//!
//! - **Manifest** (`manifest`): per-directory `manifest.json` checkpoint of item and document facts
//! - **Ingest** (`ingest`): collection resolution, item reconciliation, documents, annotations
//! - **Objects** (`objects`): redb-backed Collection/Item/Document records with field indexes
//! - **RDF** (`rdf`): typed SPARQL results over oxigraph or a Sesame/RDF4J server
//! - **Notify** (`notify`): completion events and reindex requests over AMQP
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use corpus_ingest::config::IngestConfig;
//! use corpus_ingest::ingest::Pipeline;
//! use corpus_ingest::notify::NullBroker;
//! use corpus_ingest::objects::ObjectStore;
//! use corpus_ingest::rdf::LocalTripleStore;
//!
//! let pipeline = Pipeline::new(
//!     IngestConfig::default(),
//!     ObjectStore::in_memory("corpus").unwrap(),
//!     Arc::new(LocalTripleStore::in_memory()),
//!     Arc::new(NullBroker),
//! );
//! let corpus = Path::new("/corpus/sample1");
//! let outcome = pipeline
//!     .ingest_one(corpus, &corpus.join("a-metadata.rdf"), None)
//!     .unwrap();
//! println!("{} -> {}", outcome.handle, outcome.pid);
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod mime;
pub mod notify;
pub mod objects;
pub mod paths;
pub mod rdf;

//! RDF plumbing: vocabulary, typed SPARQL results, parsed graphs and triple stores.
//!
//! Every query the pipeline runs is a [`SelectQuery`] that names the variables
//! it projects. Result rows from any backend are converted into [`QueryRow`]s
//! and checked against that list at the boundary, so callers read bindings
//! through typed accessors instead of poking at backend-specific solutions.

pub mod graph;
pub mod sesame;
pub mod store;

use std::collections::BTreeMap;

use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{TripleStoreError, TripleStoreResult};

pub use graph::RdfGraph;
pub use sesame::SesameServer;
pub use store::{InsertReport, LocalTripleStore, StoreKind, TripleRepository, TripleStore};

/// Dublin Core terms used by item and document descriptions.
pub const DC_IS_PART_OF: &str = "http://purl.org/dc/terms/isPartOf";
pub const DC_IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";
pub const DC_TYPE: &str = "http://purl.org/dc/terms/type";
pub const DC_SOURCE: &str = "http://purl.org/dc/terms/source";

/// Links an item to the document whose text should be indexed as its primary text.
pub const INDEXABLE_DOCUMENT: &str =
    "http://ns.ausnc.org.au/schemas/ausnc_md_model/indexable_document";

/// Library of Congress relator "responsible party".
pub const LOC_RESPONSIBLE_PERSON: &str = "http://www.loc.gov/loc.terms/relators/rpy";

/// A bound value in a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdfTerm {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl RdfTerm {
    /// Lexical value: the IRI, the blank node id, or the literal's value.
    pub fn value(&self) -> &str {
        match self {
            Self::Iri(iri) => iri,
            Self::Blank(id) => id,
            Self::Literal { value, .. } => value,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

impl From<&Term> for RdfTerm {
    fn from(term: &Term) -> Self {
        match term {
            Term::NamedNode(n) => Self::Iri(n.as_str().to_owned()),
            Term::BlankNode(b) => Self::Blank(b.as_str().to_owned()),
            Term::Literal(l) => Self::Literal {
                value: l.value().to_owned(),
                datatype: Some(l.datatype().as_str().to_owned()),
                language: l.language().map(str::to_owned),
            },
            #[allow(unreachable_patterns)]
            other => Self::Literal {
                value: other.to_string(),
                datatype: None,
                language: None,
            },
        }
    }
}

/// A SPARQL SELECT query together with the variables every row must bind.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    sparql: String,
    variables: Vec<&'static str>,
}

impl SelectQuery {
    pub fn new(sparql: impl Into<String>, variables: &[&'static str]) -> Self {
        Self {
            sparql: sparql.into(),
            variables: variables.to_vec(),
        }
    }

    pub fn sparql(&self) -> &str {
        &self.sparql
    }

    pub fn variables(&self) -> &[&'static str] {
        &self.variables
    }
}

/// One validated result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    bindings: BTreeMap<String, RdfTerm>,
}

impl QueryRow {
    /// Build a row, rejecting it if any variable the query requires is unbound.
    pub fn from_bindings(
        query: &SelectQuery,
        bindings: BTreeMap<String, RdfTerm>,
    ) -> TripleStoreResult<Self> {
        if let Some(missing) = query
            .variables()
            .iter()
            .find(|v| !bindings.contains_key(**v))
        {
            return Err(TripleStoreError::MissingBinding {
                variable: (*missing).to_string(),
            });
        }
        Ok(Self { bindings })
    }

    pub fn term(&self, variable: &str) -> TripleStoreResult<&RdfTerm> {
        self.bindings
            .get(variable)
            .ok_or_else(|| TripleStoreError::MissingBinding {
                variable: variable.to_string(),
            })
    }

    /// Lexical value of a bound variable.
    pub fn value(&self, variable: &str) -> TripleStoreResult<&str> {
        self.term(variable).map(RdfTerm::value)
    }

    /// IRI bound to a variable; fails if the binding is a literal or blank node.
    pub fn iri(&self, variable: &str) -> TripleStoreResult<&str> {
        self.term(variable)?
            .as_iri()
            .ok_or_else(|| TripleStoreError::Sparql {
                message: format!("?{variable} is not bound to an IRI"),
            })
    }
}

/// Run a SELECT query against an oxigraph store and validate the rows.
pub(crate) fn select_on_store(store: &Store, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>> {
    let results = store
        .query(query.sparql())
        .map_err(|e| TripleStoreError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;

    match results {
        QueryResults::Solutions(solutions) => {
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|e| TripleStoreError::Sparql {
                    message: format!("solution error: {e}"),
                })?;
                let bindings = solution
                    .iter()
                    .map(|(var, term)| (var.as_str().to_string(), RdfTerm::from(term)))
                    .collect();
                rows.push(QueryRow::from_bindings(query, bindings)?);
            }
            Ok(rows)
        }
        _ => Err(TripleStoreError::Sparql {
            message: "expected solutions from a SELECT query".into(),
        }),
    }
}

/// Strip the angle brackets oxigraph puts around IRIs in `Display` output.
pub(crate) fn bare_iri(display: &str) -> &str {
    display
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(display)
}

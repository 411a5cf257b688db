//! Sesame / RDF4J server backend over the REST protocol.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{TripleStoreError, TripleStoreResult};

use super::store::{InsertReport, StoreKind, TripleRepository, TripleStore};
use super::{QueryRow, RdfTerm, SelectQuery};

/// Client for a remote Sesame-protocol server.
pub struct SesameServer {
    base_url: String,
    agent: ureq::Agent,
}

impl SesameServer {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn repository_url(&self, name: &str) -> String {
        format!("{}/repositories/{name}", self.base_url)
    }

    fn exists(&self, name: &str) -> TripleStoreResult<bool> {
        let url = format!("{}/size", self.repository_url(name));
        match self.agent.get(&url).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(map_ureq_error(&url, e)),
        }
    }
}

impl TripleStore for SesameServer {
    fn create_repository(
        &self,
        kind: StoreKind,
        name: &str,
        description: &str,
    ) -> TripleStoreResult<()> {
        if self.exists(name)? {
            return Ok(());
        }
        let url = self.repository_url(name);
        self.agent
            .put(&url)
            .set("Content-Type", "text/turtle")
            .send_string(&repository_config(kind, name, description))
            .map_err(|e| map_ureq_error(&url, e))?;
        tracing::info!(repository = name, server = %self.base_url, "created triple store repository");
        Ok(())
    }

    fn repository(&self, name: &str) -> TripleStoreResult<Box<dyn TripleRepository + '_>> {
        if !self.exists(name)? {
            return Err(TripleStoreError::NoRepository { name: name.into() });
        }
        Ok(Box::new(SesameRepository {
            server: self,
            name: name.to_string(),
        }))
    }
}

impl std::fmt::Debug for SesameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SesameServer")
            .field("base_url", &self.base_url)
            .finish()
    }
}

struct SesameRepository<'a> {
    server: &'a SesameServer,
    name: String,
}

impl TripleRepository for SesameRepository<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>> {
        let url = self.server.repository_url(&self.name);
        let response = self
            .server
            .agent
            .get(&url)
            .query("query", query.sparql())
            .set("Accept", "application/sparql-results+json")
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        let results: SparqlJson = response.into_json().map_err(|e| TripleStoreError::Sparql {
            message: format!("invalid SPARQL JSON results: {e}"),
        })?;
        results.into_rows(query)
    }

    fn insert_from_rdf_files(&self, paths: &[PathBuf]) -> TripleStoreResult<InsertReport> {
        let url = format!("{}/statements", self.server.repository_url(&self.name));
        let mut report = InsertReport::default();
        for path in paths {
            let body = match std::fs::read(path) {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read RDF file");
                    report.failed.push(path.clone());
                    continue;
                }
            };
            match self
                .server
                .agent
                .post(&url)
                .set("Content-Type", "text/turtle;charset=UTF-8")
                .send_bytes(&body)
            {
                Ok(_) => report.loaded += 1,
                // A transport failure means the server is gone; stop the batch.
                Err(e @ ureq::Error::Transport(_)) => return Err(map_ureq_error(&url, e)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "server rejected RDF file");
                    report.failed.push(path.clone());
                }
            }
        }
        Ok(report)
    }
}

/// Turtle repository configuration understood by Sesame 2 and RDF4J.
fn repository_config(kind: StoreKind, name: &str, description: &str) -> String {
    let sail = match kind {
        StoreKind::Native => "openrdf:NativeStore",
        StoreKind::Memory => "openrdf:MemoryStore",
    };
    let description = description.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix rep: <http://www.openrdf.org/config/repository#> .
@prefix sr: <http://www.openrdf.org/config/repository/sail#> .
@prefix sail: <http://www.openrdf.org/config/sail#> .

[] a rep:Repository ;
   rep:repositoryID "{name}" ;
   rdfs:label "{description}" ;
   rep:repositoryImpl [
      rep:repositoryType "openrdf:SailRepository" ;
      sr:sailImpl [ sail:sailType "{sail}" ]
   ] .
"#
    )
}

fn map_ureq_error(url: &str, error: ureq::Error) -> TripleStoreError {
    match error {
        ureq::Error::Status(status, response) => TripleStoreError::Status {
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => TripleStoreError::Unreachable {
            url: url.to_string(),
            message: t.to_string(),
        },
    }
}

/// `application/sparql-results+json` document.
#[derive(Debug, Deserialize)]
struct SparqlJson {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<BTreeMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(rename = "xml:lang", default)]
    language: Option<String>,
}

impl SparqlJson {
    fn into_rows(self, query: &SelectQuery) -> TripleStoreResult<Vec<QueryRow>> {
        self.results
            .bindings
            .into_iter()
            .map(|binding| {
                let terms = binding
                    .into_iter()
                    .map(|(var, term)| (var, term.into()))
                    .collect();
                QueryRow::from_bindings(query, terms)
            })
            .collect()
    }
}

impl From<JsonTerm> for RdfTerm {
    fn from(term: JsonTerm) -> Self {
        match term.kind.as_str() {
            "uri" => RdfTerm::Iri(term.value),
            "bnode" => RdfTerm::Blank(term.value),
            _ => RdfTerm::Literal {
                value: term.value,
                datatype: term.datatype,
                language: term.language,
            },
        }
    }
}

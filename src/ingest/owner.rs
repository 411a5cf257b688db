//! Data owner resolution for newly created collections.

use crate::error::IngestResult;
use crate::objects::{ObjectStore, User};
use crate::rdf::{LOC_RESPONSIBLE_PERSON, RdfGraph, SelectQuery};

/// Why a collection did or did not get an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerResolution {
    Resolved(User),
    /// Neither a responsible person nor the default owner maps to a user.
    NotFound,
    /// The candidate exists but is not allowed to own data.
    Ineligible(User),
}

impl OwnerResolution {
    pub fn owner_email(&self) -> Option<&str> {
        match self {
            Self::Resolved(user) => Some(&user.email),
            _ => None,
        }
    }
}

fn responsible_person_query() -> SelectQuery {
    SelectQuery::new(
        format!("SELECT ?collection ?person WHERE {{ ?collection <{LOC_RESPONSIBLE_PERSON}> ?person }}"),
        &["collection", "person"],
    )
}

/// Person IRIs are usually `mailto:` URIs; users are keyed by bare email.
fn person_email(person: &str) -> &str {
    person.strip_prefix("mailto:").unwrap_or(person)
}

/// Pick the owner of a collection from its metadata graph.
///
/// The first responsible person who is a known user wins; otherwise the
/// configured default owner is tried. An ineligible candidate is never
/// replaced by the fallback.
pub fn resolve_data_owner(
    objects: &ObjectStore,
    default_owner: Option<&str>,
    collection: &str,
    graph: &RdfGraph,
) -> IngestResult<OwnerResolution> {
    let mut candidate = None;
    match graph.query(&responsible_person_query()) {
        Ok(rows) => {
            for row in &rows {
                let Ok(person) = row.value("person") else {
                    continue;
                };
                if let Some(user) = objects.find_user_by_email(person_email(person))? {
                    candidate = Some(user);
                    break;
                }
            }
        }
        Err(e) => {
            tracing::warn!(collection, error = %e, "responsible person query failed");
        }
    }

    if candidate.is_none() {
        if let Some(email) = default_owner {
            tracing::debug!(collection, email, "looking up default data owner");
            candidate = objects.find_user_by_email(email)?;
        }
    }

    Ok(match candidate {
        None => {
            tracing::warn!(collection, "cannot determine data owner");
            OwnerResolution::NotFound
        }
        Some(user) if !user.can_own_data() => {
            tracing::warn!(collection, email = %user.email, "proposed data owner does not have appropriate permission; ignoring");
            OwnerResolution::Ineligible(user)
        }
        Some(user) => {
            tracing::info!(collection, email = %user.email, "setting data owner");
            OwnerResolution::Resolved(user)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::UserRole;

    const COLLECTION_TTL: &str = r#"
        @prefix loc: <http://www.loc.gov/loc.terms/relators/> .
        <http://example.org/corpus/demo> loc:rpy <mailto:curator@example.org> .
    "#;

    fn store_with(users: &[(&str, UserRole)]) -> ObjectStore {
        let store = ObjectStore::in_memory("test").unwrap();
        for (email, role) in users {
            store.put_user(&User::new(email, *role)).unwrap();
        }
        store
    }

    #[test]
    fn responsible_person_wins() {
        let store = store_with(&[
            ("curator@example.org", UserRole::DataOwner),
            ("default@example.org", UserRole::Admin),
        ]);
        let graph = RdfGraph::parse_turtle(COLLECTION_TTL, None).unwrap();
        let owner = resolve_data_owner(&store, Some("default@example.org"), "demo", &graph).unwrap();
        assert_eq!(owner.owner_email(), Some("curator@example.org"));
    }

    #[test]
    fn falls_back_to_default_owner() {
        let store = store_with(&[("default@example.org", UserRole::Admin)]);
        let graph = RdfGraph::parse_turtle(COLLECTION_TTL, None).unwrap();
        let owner = resolve_data_owner(&store, Some("default@example.org"), "demo", &graph).unwrap();
        assert_eq!(owner.owner_email(), Some("default@example.org"));
    }

    #[test]
    fn nobody_found_leaves_collection_ownerless() {
        let store = store_with(&[]);
        let graph = RdfGraph::parse_turtle(COLLECTION_TTL, None).unwrap();
        let owner = resolve_data_owner(&store, Some("default@example.org"), "demo", &graph).unwrap();
        assert_eq!(owner, OwnerResolution::NotFound);
    }

    #[test]
    fn ineligible_candidate_is_not_overridden() {
        let store = store_with(&[
            ("curator@example.org", UserRole::Researcher),
            ("default@example.org", UserRole::Admin),
        ]);
        let graph = RdfGraph::parse_turtle(COLLECTION_TTL, None).unwrap();
        let owner = resolve_data_owner(&store, Some("default@example.org"), "demo", &graph).unwrap();
        assert!(matches!(owner, OwnerResolution::Ineligible(u) if u.email == "curator@example.org"));
    }
}

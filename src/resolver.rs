//! # Relationship Resolver
//!
//! Turns external identifier strings from inbound representations into
//! internal owning keys, and wires those keys onto the owning side of a
//! relation. The inverse side (`shop.items`, `category.items`, `user.shops`)
//! is a derived view computed by the store from the owning keys, so a single
//! key assignment moves both sides of a relation at once; re-wiring on
//! update overwrites the key, which simultaneously removes the old inverse
//! membership and establishes the new one.

use crate::{EntityKind, ExternalId, Store, StoreError};

/// Errors produced while resolving an entity reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference string is not a well-formed external identifier.
    Malformed,
    /// The identifier names a different kind than the relation expects.
    KindMismatch,
    /// The identifier is well-formed but no such entity exists.
    NotFound,
    /// The persistence collaborator failed while checking existence.
    Store(StoreError),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Malformed => write!(f, "malformed entity reference"),
            ResolveError::KindMismatch => write!(f, "reference names the wrong entity kind"),
            ResolveError::NotFound => write!(f, "referenced entity does not exist"),
            ResolveError::Store(e) => write!(f, "store failure during resolution: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<StoreError> for ResolveError {
    fn from(e: StoreError) -> Self {
        ResolveError::Store(e)
    }
}

/// Resolves external references against the persistence collaborator and
/// wires owning foreign keys.
pub struct Resolver<'a> {
    store: &'a dyn Store,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given store.
    pub fn new(store: &'a dyn Store) -> Self {
        Resolver { store }
    }

    /// Resolves a reference string to the internal key of an existing entity
    /// of the expected kind.
    ///
    /// Callers surface failures as a validation violation on the referencing
    /// field, so API consumers see "category: introuvable" rather than a
    /// generic lookup error.
    pub fn resolve(&self, reference: &str, expected: EntityKind) -> Result<u64, ResolveError> {
        let id: ExternalId = reference.parse().map_err(|_| ResolveError::Malformed)?;
        if id.kind() != expected {
            return Err(ResolveError::KindMismatch);
        }
        if self.store.contains(expected, id.key())? {
            Ok(id.key())
        } else {
            Err(ResolveError::NotFound)
        }
    }

    /// Points an owning foreign-key slot at the entity named by `reference`.
    ///
    /// The previous key, if any, is simply overwritten: the inverse
    /// collections are derived from owning keys, so the un-wiring of the old
    /// target and the wiring of the new one are one atomic assignment.
    pub fn rewire(
        &self,
        slot: &mut u64,
        reference: &str,
        expected: EntityKind,
    ) -> Result<(), ResolveError> {
        *slot = self.resolve(reference, expected)?;
        Ok(())
    }
}

//! # Resource Lifecycle Machinery
//!
//! The per-resource controllers all march through the same phases: parse
//! the candidate, validate, wire relations, persist. Every outcome
//! translates into one [`LifecycleError`] variant. This module owns that error
//! taxonomy, its HTTP status mapping, the shared application state, and the
//! small helpers the controllers use to read accepted candidates.
//!
//! Status contract: 201 on create, 200 on read/update, 204 on delete, 400
//! for a payload that could not be parsed at all, 422 with the complete
//! violation list on validation rejection, 404 when the operation target
//! does not resolve, 409 for storage-level conflicts discovered at commit.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value, json};

use crate::{EntityKind, ExternalId, PasswordHasher, ResolveError, Store, StoreError, Violation};

/// Terminal outcome of a failed lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The inbound representation could not be parsed into candidate fields
    /// at all; no rules were evaluated.
    Malformed(String),
    /// One or more field rules were violated; carries the complete set.
    Validation(Vec<Violation>),
    /// The target of a read/update/delete operation does not exist.
    NotFound,
    /// A storage-level constraint violation discovered only at commit time.
    Conflict(String),
    /// A collaborator failed; fatal to this operation only.
    Internal(String),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::Malformed(msg) => write!(f, "malformed input: {}", msg),
            LifecycleError::Validation(violations) => {
                write!(f, "validation failed with {} violation(s)", violations.len())
            }
            LifecycleError::NotFound => write!(f, "entity not found"),
            LifecycleError::Conflict(msg) => write!(f, "storage conflict: {}", msg),
            LifecycleError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => LifecycleError::NotFound,
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::Internal(msg) => LifecycleError::Internal(msg),
        }
    }
}

impl From<ResolveError> for LifecycleError {
    fn from(e: ResolveError) -> Self {
        match e {
            // Controllers re-resolve only after validation accepted the
            // reference, so a row missing here vanished in between: a
            // commit-time conflict, not a missing target.
            ResolveError::NotFound => {
                LifecycleError::Conflict("referenced entity no longer exists".to_string())
            }
            // Validation already vouched that the value parses and names
            // the expected kind.
            ResolveError::Malformed | ResolveError::KindMismatch => {
                LifecycleError::Internal("reference unresolvable after validation".to_string())
            }
            ResolveError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        match self {
            LifecycleError::Malformed(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": 400, "error": msg})),
            )
                .into_response(),
            LifecycleError::Validation(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"status": 422, "violations": violations})),
            )
                .into_response(),
            LifecycleError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({"status": 404, "error": "not found"})),
            )
                .into_response(),
            LifecycleError::Conflict(msg) => (
                StatusCode::CONFLICT,
                Json(json!({"status": 409, "error": msg})),
            )
                .into_response(),
            LifecycleError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": 500, "error": msg})),
            )
                .into_response(),
        }
    }
}

////////////////////////////////////////////// AppState ////////////////////////////////////////////

/// Shared state handed to every route: the persistence collaborator and the
/// password-hashing collaborator.
#[derive(Clone)]
pub struct AppState {
    /// The persistence store.
    pub store: Arc<dyn Store>,
    /// The password hasher used when creating or updating users.
    pub hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
    /// Creates the application state from its collaborators.
    pub fn new(store: Arc<dyn Store>, hasher: Arc<dyn PasswordHasher>) -> Self {
        AppState { store, hasher }
    }
}

/////////////////////////////////////////////// Helpers ////////////////////////////////////////////

/// Interprets a request body as a candidate field bag.
pub(crate) fn candidate_object(body: &Value) -> Result<&Map<String, Value>, LifecycleError> {
    body.as_object()
        .ok_or_else(|| LifecycleError::Malformed("request body must be a JSON object".to_string()))
}

/// Resolves a path segment to the internal key of the operation target.
///
/// Accepts either the bare encoded key (the usual URL form) or the full
/// external identifier; anything that does not name the expected kind is a
/// [`LifecycleError::NotFound`], since such a target can never resolve.
pub(crate) fn target_key(kind: EntityKind, raw: &str) -> Result<u64, LifecycleError> {
    let full = if raw.contains(':') {
        raw.to_string()
    } else {
        format!("{}:{}", kind.as_str(), raw)
    };
    let id: ExternalId = full.parse().map_err(|_| LifecycleError::NotFound)?;
    if id.kind() != kind {
        return Err(LifecycleError::NotFound);
    }
    Ok(id.key())
}

/// Reads a string field from an accepted candidate.
///
/// Only called after validation accepted the candidate, so absence here is a
/// controller bug, not a client error.
pub(crate) fn accepted_str(
    fields: &Map<String, Value>,
    field: &str,
) -> Result<String, LifecycleError> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LifecycleError::Internal(format!("{} missing after validation", field)))
}

/// Reads an integer field from an accepted candidate.
pub(crate) fn accepted_i64(
    fields: &Map<String, Value>,
    field: &str,
) -> Result<i64, LifecycleError> {
    fields
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| LifecycleError::Internal(format!("{} missing after validation", field)))
}

/// Reads an optional string field from an accepted candidate (present,
/// non-null values only).
pub(crate) fn present_str(fields: &Map<String, Value>, field: &str) -> Option<String> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                LifecycleError::Malformed("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                LifecycleError::Validation(vec![]),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LifecycleError::NotFound, StatusCode::NOT_FOUND),
            (
                LifecycleError::Conflict("dup".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                LifecycleError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn target_key_accepts_bare_and_full_forms() {
        let id = ExternalId::new(EntityKind::Item, 41);
        let full = id.to_string();
        let bare = full.strip_prefix("item:").unwrap();
        assert_eq!(target_key(EntityKind::Item, &full).unwrap(), 41);
        assert_eq!(target_key(EntityKind::Item, bare).unwrap(), 41);
    }

    #[test]
    fn target_key_rejects_wrong_kind_and_garbage() {
        let full = ExternalId::new(EntityKind::Shop, 41).to_string();
        assert_eq!(
            target_key(EntityKind::Item, &full),
            Err(LifecycleError::NotFound)
        );
        assert_eq!(
            target_key(EntityKind::Item, "definitely-not-an-id"),
            Err(LifecycleError::NotFound)
        );
    }

    #[test]
    fn vanished_reference_is_a_conflict() {
        assert_eq!(
            LifecycleError::from(ResolveError::NotFound),
            LifecycleError::Conflict("referenced entity no longer exists".to_string())
        );
        assert!(matches!(
            LifecycleError::from(ResolveError::Malformed),
            LifecycleError::Internal(_)
        ));
        assert!(matches!(
            LifecycleError::from(ResolveError::KindMismatch),
            LifecycleError::Internal(_)
        ));
    }

    #[test]
    fn store_errors_translate() {
        assert_eq!(
            LifecycleError::from(StoreError::NotFound),
            LifecycleError::NotFound
        );
        assert_eq!(
            LifecycleError::from(StoreError::Conflict("dup".to_string())),
            LifecycleError::Conflict("dup".to_string())
        );
    }
}

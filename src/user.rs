//! Users: account records that own shops.
//!
//! `password` is write-only; it enters as plain text, leaves through the
//! [`PasswordHasher`] collaborator, and is never serialized back out. Email
//! uniqueness gets a best-effort pre-check here (read-then-decide) and is
//! ultimately enforced by the store at commit; losing that race is an
//! expected 409, not a bug.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::lifecycle::{accepted_str, candidate_object, present_str, target_key};
use crate::validate::check_fields;
use crate::{
    AppState, EntityKind, ExternalId, FieldRule, LifecycleError, OpKind, Resolver, Rule, Store,
    Violation,
};

/////////////////////////////////////////////// User ///////////////////////////////////////////////

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Internal store key, assigned at creation.
    pub key: u64,
    /// Unique email address.
    pub email: String,
    /// Display name.
    pub pseudo: String,
    /// Hashed credential; write-only over the wire.
    pub password: String,
    /// Role tags, e.g. `ROLE_USER`.
    pub roles: Vec<String>,
    /// Whether the account has been verified.
    pub is_verified: bool,
}

///////////////////////////////////////// PasswordHasher ///////////////////////////////////////////

/// Collaborator that turns a plain-text credential into its stored form.
///
/// Hashing mechanics are outside this crate; deployments plug in their own
/// implementation.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plain-text password into its stored representation.
    fn hash(&self, plain: &str) -> String;
}

/// Development stand-in for a real key-derivation function.
///
/// Deterministic and NOT cryptographically secure; suitable only for
/// fixtures and tests.
pub struct DevPasswordHasher;

impl PasswordHasher for DevPasswordHasher {
    fn hash(&self, plain: &str) -> String {
        // FNV-1a over the bytes, tagged so stored values are recognizable.
        let mut h: u64 = 0xcbf29ce484222325;
        for b in plain.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        format!("dev${:016x}", h)
    }
}

/////////////////////////////////////////////// Rules //////////////////////////////////////////////

const USER_RULES: &[FieldRule] = &[
    FieldRule {
        field: "email",
        rule: Rule::NonBlank,
        message: "L'email est obligatoire",
    },
    FieldRule {
        field: "pseudo",
        rule: Rule::NonBlank,
        message: "Le pseudo est obligatoire",
    },
    FieldRule {
        field: "password",
        rule: Rule::NonBlank,
        message: "Le mot de passe est obligatoire",
    },
];

fn parse_roles(fields: &Map<String, Value>) -> Result<Option<Vec<String>>, Violation> {
    match fields.get("roles") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut roles = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(role) => roles.push(role.to_string()),
                    None => {
                        return Err(Violation::new(
                            "roles",
                            "type",
                            "Les rôles doivent être une liste de chaînes",
                        ));
                    }
                }
            }
            Ok(Some(roles))
        }
        Some(_) => Err(Violation::new(
            "roles",
            "type",
            "Les rôles doivent être une liste de chaînes",
        )),
    }
}

fn parse_is_verified(fields: &Map<String, Value>) -> Result<Option<bool>, Violation> {
    match fields.get("isVerified") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(Violation::new(
            "isVerified",
            "type",
            "Le champ isVerified doit être un booléen",
        )),
    }
}

/// Best-effort uniqueness pre-check; the store re-checks at commit.
fn email_violation(
    store: &dyn Store,
    fields: &Map<String, Value>,
    exclude: Option<u64>,
) -> Result<Option<Violation>, LifecycleError> {
    if let Some(email) = present_str(fields, "email") {
        if let Some(existing) = store.find_user_by_email(&email)? {
            if Some(existing.key) != exclude {
                return Ok(Some(Violation::new(
                    "email",
                    "unique",
                    "Cet email est déjà utilisé",
                )));
            }
        }
    }
    Ok(None)
}

///////////////////////////////////////////// Controller ///////////////////////////////////////////

/// Validates a candidate and persists a new user.
pub fn create_user(
    store: &dyn Store,
    hasher: &dyn PasswordHasher,
    body: &Value,
) -> Result<User, LifecycleError> {
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let mut violations = check_fields(fields, USER_RULES, OpKind::Create, &resolver);
    if let Some(violation) = email_violation(store, fields, None)? {
        violations.push(violation);
    }
    let roles = parse_roles(fields).unwrap_or_else(|v| {
        violations.push(v);
        None
    });
    let is_verified = parse_is_verified(fields).unwrap_or_else(|v| {
        violations.push(v);
        None
    });
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    let user = User {
        key: 0,
        email: accepted_str(fields, "email")?,
        pseudo: accepted_str(fields, "pseudo")?,
        password: hasher.hash(&accepted_str(fields, "password")?),
        roles: roles.unwrap_or_else(|| vec!["ROLE_USER".to_string()]),
        is_verified: is_verified.unwrap_or(false),
    };
    Ok(store.create_user(user)?)
}

/// Validates a partial candidate and merges it into an existing user.
pub fn update_user(
    store: &dyn Store,
    hasher: &dyn PasswordHasher,
    key: u64,
    body: &Value,
) -> Result<User, LifecycleError> {
    let mut user = store.get_user(key)?.ok_or(LifecycleError::NotFound)?;
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let mut violations = check_fields(fields, USER_RULES, OpKind::Update, &resolver);
    if let Some(violation) = email_violation(store, fields, Some(key))? {
        violations.push(violation);
    }
    let roles = parse_roles(fields).unwrap_or_else(|v| {
        violations.push(v);
        None
    });
    let is_verified = parse_is_verified(fields).unwrap_or_else(|v| {
        violations.push(v);
        None
    });
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    if let Some(email) = present_str(fields, "email") {
        user.email = email;
    }
    if let Some(pseudo) = present_str(fields, "pseudo") {
        user.pseudo = pseudo;
    }
    if let Some(plain) = present_str(fields, "password") {
        user.password = hasher.hash(&plain);
    }
    if let Some(roles) = roles {
        user.roles = roles;
    }
    if let Some(is_verified) = is_verified {
        user.is_verified = is_verified;
    }

    if !store.update_user(&user)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(user)
}

/// Deletes a user by key.
pub fn delete_user(store: &dyn Store, key: u64) -> Result<(), LifecycleError> {
    if !store.delete_user(key)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(())
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

/// Wire representation of a user. `password` never appears.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// External identifier.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub pseudo: String,
    /// Role tags.
    pub roles: Vec<String>,
    /// Verification flag.
    pub is_verified: bool,
    /// Inverse view: external identifiers of the shops this user owns.
    pub shops: Vec<String>,
}

impl UserResponse {
    fn build(user: &User, store: &dyn Store) -> Result<Self, LifecycleError> {
        let shops = store
            .shops_for_owner(user.key)?
            .iter()
            .map(|s| ExternalId::new(EntityKind::Shop, s.key).to_string())
            .collect();
        Ok(UserResponse {
            id: ExternalId::new(EntityKind::User, user.key).to_string(),
            email: user.email.clone(),
            pseudo: user.pseudo.clone(),
            roles: user.roles.clone(),
            is_verified: user.is_verified,
            shops,
        })
    }
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<UserResponse>), LifecycleError> {
    let user = create_user(&*state.store, &*state.hasher, &body)?;
    tracing::info!(user = %ExternalId::new(EntityKind::User, user.key), "user created");
    let response = UserResponse::build(&user, &*state.store)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, LifecycleError> {
    let users = state.store.list_users()?;
    let mut responses = Vec::with_capacity(users.len());
    for user in &users {
        responses.push(UserResponse::build(user, &*state.store)?);
    }
    Ok(Json(responses))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, LifecycleError> {
    let key = target_key(EntityKind::User, &id)?;
    let user = state.store.get_user(key)?.ok_or(LifecycleError::NotFound)?;
    Ok(Json(UserResponse::build(&user, &*state.store)?))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<UserResponse>, LifecycleError> {
    let key = target_key(EntityKind::User, &id)?;
    let user = update_user(&*state.store, &*state.hasher, key, &body)?;
    Ok(Json(UserResponse::build(&user, &*state.store)?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, LifecycleError> {
    let key = target_key(EntityKind::User, &id)?;
    delete_user(&*state.store, key)?;
    tracing::info!(user = %ExternalId::new(EntityKind::User, key), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the router for the user resource.
pub fn create_user_router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list).post(create))
        .route("/users/:id", get(fetch).patch(patch).delete(remove))
        .with_state(state)
}

//! # Brocante: A Second-Hand Marketplace API
//!
//! Brocante is a resource-oriented HTTP API for a small marketplace of
//! second-hand collectibles. Sellers register as users, open shops, and
//! list items filed under shared categories; every resource is exposed
//! through uniform create/read/update/delete operations over JSON.
//!
//! This crate provides:
//!
//! - **Resource Lifecycle**: Every mutation marches through the same
//!   phases - parse the candidate, validate, wire relations, persist -
//!   with one error taxonomy mapping each outcome to an HTTP status
//! - **Declarative Validation**: Per-resource rule tables evaluated by a
//!   single engine that collects the complete violation list before
//!   rejecting, so a client sees every problem at once
//! - **Reference Wiring**: Relationships are owned by exactly one side
//!   (an item owns its shop and category keys, a shop owns its owner
//!   key) and the inverse views are derived, so the two directions can
//!   never disagree
//! - **HTTP API**: RESTful endpoints for users, shops, categories, and
//!   items, built on axum
//!
//! ## Core Concepts
//!
//! ### External Identifiers
//! Rows are addressed by external identifiers of the form `kind:key`,
//! where `key` is the URL-safe base64 encoding of the internal 64-bit
//! store key (e.g. `item:AAAAAAAAAAE`). Parsing enforces the canonical
//! encoding, so two spellings never alias the same row.
//!
//! ### Candidates and Violations
//! An inbound representation is a candidate field bag. Validation
//! evaluates every rule against it and either accepts it whole or
//! rejects it with the full list of [`Violation`]s; a rejected
//! candidate never reaches the store.
//!
//! ### The Store
//! Persistence sits behind the [`Store`] trait. The in-memory
//! implementation keeps all four arenas behind one lock so commit-time
//! integrity checks (email and slug uniqueness, foreign-key existence,
//! restricted deletes) observe a consistent whole.
//!
//! ## Status Contract
//!
//! | Outcome | Status |
//! |---|---|
//! | create accepted | 201 |
//! | read or update accepted | 200 |
//! | delete accepted | 204 |
//! | target does not resolve | 404 |
//! | validation rejected | 422 + violations |
//! | unparseable payload | 400 |
//! | commit-time conflict | 409 |
//!
//! ## Example
//!
//! ```
//! use brocante::{InMemoryStore, create_category};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! let category = create_category(
//!     &store,
//!     &json!({"name": "Figurines Vintage", "slug": "figurines-vintage"}),
//! )
//! .unwrap();
//! assert_eq!(category.slug, "figurines-vintage");
//! ```

#![deny(missing_docs)]

mod category;
mod fixtures;
mod ident;
mod item;
mod lifecycle;
mod resolver;
mod router;
mod shop;
mod store;
mod user;
mod validate;

pub use category::{
    Category, CategoryResponse, create_category, create_category_router, delete_category,
    update_category,
};
pub use fixtures::{FIXTURE_PASSWORD_ENV, load_fixtures};
pub use ident::{EntityKind, ExternalId, IdentParseError};
pub use item::{
    Item, ItemResponse, ItemStatus, ItemStatusParseError, create_item, create_item_router,
    delete_item, update_item,
};
pub use lifecycle::{AppState, LifecycleError};
pub use resolver::{ResolveError, Resolver};
pub use router::api_router;
pub use shop::{Shop, ShopResponse, create_shop, create_shop_router, delete_shop, update_shop};
pub use store::{InMemoryStore, Store, StoreError};
pub use user::{
    DevPasswordHasher, PasswordHasher, User, UserResponse, create_user, create_user_router,
    delete_user, update_user,
};
pub use validate::{FieldRule, OpKind, Rule, Violation, check_fields};

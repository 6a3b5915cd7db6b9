//! Categories: labeled buckets items are filed under. Slug uniqueness is a
//! storage-layer constraint, not a validation pre-check, so a duplicate slug
//! surfaces as a 409 at commit.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::Serialize;
use serde_json::Value;

use crate::lifecycle::{accepted_str, candidate_object, present_str, target_key};
use crate::validate::check_fields;
use crate::{
    AppState, EntityKind, ExternalId, FieldRule, LifecycleError, OpKind, Resolver, Rule, Store,
};

///////////////////////////////////////////// Category /////////////////////////////////////////////

/// An item category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Internal store key, assigned at creation.
    pub key: u64,
    /// Category name.
    pub name: String,
    /// URL-safe slug, unique at the storage layer.
    pub slug: String,
}

/////////////////////////////////////////////// Rules //////////////////////////////////////////////

const CATEGORY_RULES: &[FieldRule] = &[
    FieldRule {
        field: "name",
        rule: Rule::NonBlank,
        message: "Le nom est obligatoire",
    },
    FieldRule {
        field: "slug",
        rule: Rule::NonBlank,
        message: "Le slug est obligatoire",
    },
];

///////////////////////////////////////////// Controller ///////////////////////////////////////////

/// Validates a candidate and persists a new category.
pub fn create_category(store: &dyn Store, body: &Value) -> Result<Category, LifecycleError> {
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let violations = check_fields(fields, CATEGORY_RULES, OpKind::Create, &resolver);
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    let category = Category {
        key: 0,
        name: accepted_str(fields, "name")?,
        slug: accepted_str(fields, "slug")?,
    };
    Ok(store.create_category(category)?)
}

/// Validates a partial candidate and merges it into an existing category.
pub fn update_category(
    store: &dyn Store,
    key: u64,
    body: &Value,
) -> Result<Category, LifecycleError> {
    let mut category = store.get_category(key)?.ok_or(LifecycleError::NotFound)?;
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let violations = check_fields(fields, CATEGORY_RULES, OpKind::Update, &resolver);
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    if let Some(name) = present_str(fields, "name") {
        category.name = name;
    }
    if let Some(slug) = present_str(fields, "slug") {
        category.slug = slug;
    }

    if !store.update_category(&category)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(category)
}

/// Deletes a category by key.
pub fn delete_category(store: &dyn Store, key: u64) -> Result<(), LifecycleError> {
    if !store.delete_category(key)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(())
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

/// Wire representation of a category, with the derived inverse item view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    /// External identifier.
    pub id: String,
    /// Category name.
    pub name: String,
    /// URL-safe slug.
    pub slug: String,
    /// Inverse view: external identifiers of the items in this category.
    pub items: Vec<String>,
}

impl CategoryResponse {
    fn build(category: &Category, store: &dyn Store) -> Result<Self, LifecycleError> {
        let items = store
            .items_for_category(category.key)?
            .iter()
            .map(|i| ExternalId::new(EntityKind::Item, i.key).to_string())
            .collect();
        Ok(CategoryResponse {
            id: ExternalId::new(EntityKind::Category, category.key).to_string(),
            name: category.name.clone(),
            slug: category.slug.clone(),
            items,
        })
    }
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CategoryResponse>), LifecycleError> {
    let category = create_category(&*state.store, &body)?;
    tracing::info!(
        category = %ExternalId::new(EntityKind::Category, category.key),
        "category created"
    );
    let response = CategoryResponse::build(&category, &*state.store)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, LifecycleError> {
    let categories = state.store.list_categories()?;
    let mut responses = Vec::with_capacity(categories.len());
    for category in &categories {
        responses.push(CategoryResponse::build(category, &*state.store)?);
    }
    Ok(Json(responses))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse>, LifecycleError> {
    let key = target_key(EntityKind::Category, &id)?;
    let category = state
        .store
        .get_category(key)?
        .ok_or(LifecycleError::NotFound)?;
    Ok(Json(CategoryResponse::build(&category, &*state.store)?))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CategoryResponse>, LifecycleError> {
    let key = target_key(EntityKind::Category, &id)?;
    let category = update_category(&*state.store, key, &body)?;
    Ok(Json(CategoryResponse::build(&category, &*state.store)?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, LifecycleError> {
    let key = target_key(EntityKind::Category, &id)?;
    delete_category(&*state.store, key)?;
    tracing::info!(
        category = %ExternalId::new(EntityKind::Category, key),
        "category deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the router for the category resource.
pub fn create_category_router(state: AppState) -> Router {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", get(fetch).patch(patch).delete(remove))
        .with_state(state)
}

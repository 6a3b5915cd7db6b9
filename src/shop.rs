//! Shops: storefront records owned by a user, owning items through the
//! derived inverse view.

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

/////////////////////////////////////////////// Shop ///////////////////////////////////////////////

/// A shop run by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shop {
    /// Internal store key, assigned at creation.
    pub key: u64,
    /// Shop name.
    pub name: String,
    /// Shop description.
    pub description: String,
    /// Owning foreign key: the user this shop belongs to.
    pub owner: u64,
}

/////////////////////////////////////////////// Rules //////////////////////////////////////////////

const SHOP_RULES: &[FieldRule] = &[
    FieldRule {
        field: "name",
        rule: Rule::NonBlank,
        message: "Le nom est obligatoire",
    },
    FieldRule {
        field: "description",
        rule: Rule::NonBlank,
        message: "La description est obligatoire",
    },
    FieldRule {
        field: "owner",
        rule: Rule::Required,
        message: "Le propriétaire est obligatoire",
    },
    FieldRule {
        field: "owner",
        rule: Rule::Reference(EntityKind::User),
        message: "Le propriétaire est introuvable",
    },
];

///////////////////////////////////////////// Controller ///////////////////////////////////////////

/// Validates a candidate, wires the owner reference, and persists a new shop.
pub fn create_shop(store: &dyn Store, body: &Value) -> Result<Shop, LifecycleError> {
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let violations = check_fields(fields, SHOP_RULES, OpKind::Create, &resolver);
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    let owner = resolver.resolve(&accepted_str(fields, "owner")?, EntityKind::User)?;
    let shop = Shop {
        key: 0,
        name: accepted_str(fields, "name")?,
        description: accepted_str(fields, "description")?,
        owner,
    };
    Ok(store.create_shop(shop)?)
}

/// Validates a partial candidate and merges it into an existing shop,
/// re-wiring the owner when a new reference is present.
pub fn update_shop(store: &dyn Store, key: u64, body: &Value) -> Result<Shop, LifecycleError> {
    let mut shop = store.get_shop(key)?.ok_or(LifecycleError::NotFound)?;
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let violations = check_fields(fields, SHOP_RULES, OpKind::Update, &resolver);
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    if let Some(name) = present_str(fields, "name") {
        shop.name = name;
    }
    if let Some(description) = present_str(fields, "description") {
        shop.description = description;
    }
    if let Some(owner) = present_str(fields, "owner") {
        resolver.rewire(&mut shop.owner, &owner, EntityKind::User)?;
    }

    if !store.update_shop(&shop)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(shop)
}

/// Deletes a shop by key.
pub fn delete_shop(store: &dyn Store, key: u64) -> Result<(), LifecycleError> {
    if !store.delete_shop(key)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(())
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

/// Wire representation of a shop, with the derived inverse item view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopResponse {
    /// External identifier.
    pub id: String,
    /// Shop name.
    pub name: String,
    /// Shop description.
    pub description: String,
    /// External identifier of the owning user.
    pub owner: String,
    /// Inverse view: external identifiers of the items in this shop.
    pub items: Vec<String>,
}

impl ShopResponse {
    fn build(shop: &Shop, store: &dyn Store) -> Result<Self, LifecycleError> {
        let items = store
            .items_for_shop(shop.key)?
            .iter()
            .map(|i| ExternalId::new(EntityKind::Item, i.key).to_string())
            .collect();
        Ok(ShopResponse {
            id: ExternalId::new(EntityKind::Shop, shop.key).to_string(),
            name: shop.name.clone(),
            description: shop.description.clone(),
            owner: ExternalId::new(EntityKind::User, shop.owner).to_string(),
            items,
        })
    }
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ShopResponse>), LifecycleError> {
    let shop = create_shop(&*state.store, &body)?;
    tracing::info!(shop = %ExternalId::new(EntityKind::Shop, shop.key), "shop created");
    let response = ShopResponse::build(&shop, &*state.store)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<ShopResponse>>, LifecycleError> {
    let shops = state.store.list_shops()?;
    let mut responses = Vec::with_capacity(shops.len());
    for shop in &shops {
        responses.push(ShopResponse::build(shop, &*state.store)?);
    }
    Ok(Json(responses))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShopResponse>, LifecycleError> {
    let key = target_key(EntityKind::Shop, &id)?;
    let shop = state.store.get_shop(key)?.ok_or(LifecycleError::NotFound)?;
    Ok(Json(ShopResponse::build(&shop, &*state.store)?))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ShopResponse>, LifecycleError> {
    let key = target_key(EntityKind::Shop, &id)?;
    let shop = update_shop(&*state.store, key, &body)?;
    Ok(Json(ShopResponse::build(&shop, &*state.store)?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, LifecycleError> {
    let key = target_key(EntityKind::Shop, &id)?;
    delete_shop(&*state.store, key)?;
    tracing::info!(shop = %ExternalId::new(EntityKind::Shop, key), "shop deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the router for the shop resource.
pub fn create_shop_router(state: AppState) -> Router {
    Router::new()
        .route("/shops", get(list).post(create))
        .route("/shops/:id", get(fetch).patch(patch).delete(remove))
        .with_state(state)
}

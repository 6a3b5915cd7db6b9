//! Items: the listings themselves. An item owns its references to exactly
//! one shop and one category; `createdAt` is assigned exactly once, as an
//! explicit step of the persist phase, and no later update can change it.

use std::str::FromStr;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lifecycle::{accepted_i64, accepted_str, candidate_object, present_str, target_key};
use crate::validate::check_fields;
use crate::{
    AppState, EntityKind, ExternalId, FieldRule, LifecycleError, OpKind, Resolver, Rule, Store,
    Violation,
};

///////////////////////////////////////////// ItemStatus ///////////////////////////////////////////

/// Moderation status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemStatus {
    /// Not yet submitted for moderation.
    Draft,
    /// Accepted and visible.
    Validated,
    /// Refused by moderation.
    Rejected,
}

impl ItemStatus {
    /// The accepted wire spellings, in declaration order.
    pub const CHOICES: &'static [&'static str] = &["DRAFT", "VALIDATED", "REJECTED"];

    /// Returns the wire spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Draft => "DRAFT",
            ItemStatus::Validated => "VALIDATED",
            ItemStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatusParseError;

impl std::fmt::Display for ItemStatusParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status must be one of DRAFT, VALIDATED, REJECTED")
    }
}

impl std::error::Error for ItemStatusParseError {}

impl FromStr for ItemStatus {
    type Err = ItemStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ItemStatus::Draft),
            "VALIDATED" => Ok(ItemStatus::Validated),
            "REJECTED" => Ok(ItemStatus::Rejected),
            _ => Err(ItemStatusParseError),
        }
    }
}

/////////////////////////////////////////////// Item ///////////////////////////////////////////////

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Internal store key, assigned at creation.
    pub key: u64,
    /// Listing name, 1–255 characters.
    pub name: String,
    /// Listing description.
    pub description: String,
    /// Price in cents; strictly positive.
    pub price: i64,
    /// Moderation status.
    pub status: ItemStatus,
    /// Owning foreign key: the shop this item belongs to.
    pub shop: u64,
    /// Owning foreign key: the category this item belongs to.
    pub category: u64,
    /// Creation timestamp; set exactly once, immutable afterwards.
    pub created_at: DateTime<Utc>,
}

/////////////////////////////////////////////// Rules //////////////////////////////////////////////

const ITEM_RULES: &[FieldRule] = &[
    FieldRule {
        field: "name",
        rule: Rule::NonBlank,
        message: "Le nom est obligatoire",
    },
    FieldRule {
        field: "name",
        rule: Rule::MaxLength(255),
        message: "Le nom ne peut pas dépasser 255 caractères",
    },
    FieldRule {
        field: "description",
        rule: Rule::NonBlank,
        message: "La description est obligatoire",
    },
    FieldRule {
        field: "price",
        rule: Rule::Required,
        message: "Le prix est obligatoire",
    },
    FieldRule {
        field: "price",
        rule: Rule::PositiveInt,
        message: "Le prix doit être positif",
    },
    FieldRule {
        field: "status",
        rule: Rule::NonBlank,
        message: "Le statut est obligatoire",
    },
    FieldRule {
        field: "status",
        rule: Rule::OneOf(ItemStatus::CHOICES),
        message: "Le statut doit être DRAFT, VALIDATED ou REJECTED",
    },
    FieldRule {
        field: "shop",
        rule: Rule::Required,
        message: "La boutique est obligatoire",
    },
    FieldRule {
        field: "shop",
        rule: Rule::Reference(EntityKind::Shop),
        message: "La boutique est introuvable",
    },
    FieldRule {
        field: "category",
        rule: Rule::Required,
        message: "La catégorie est obligatoire",
    },
    FieldRule {
        field: "category",
        rule: Rule::Reference(EntityKind::Category),
        message: "La catégorie est introuvable",
    },
];

/// Reads an optional `createdAt` from a create candidate.
fn parse_created_at(fields: &Map<String, Value>) -> Result<Option<DateTime<Utc>>, Violation> {
    match fields.get("createdAt") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
            Err(_) => Err(Violation::new(
                "createdAt",
                "type",
                "La date de création est invalide",
            )),
        },
        Some(_) => Err(Violation::new(
            "createdAt",
            "type",
            "La date de création est invalide",
        )),
    }
}

///////////////////////////////////////////// Controller ///////////////////////////////////////////

/// Validates a candidate, wires both owning references, and persists a new
/// item. `createdAt` defaults to the persist time when the candidate does
/// not carry one.
pub fn create_item(store: &dyn Store, body: &Value) -> Result<Item, LifecycleError> {
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let mut violations = check_fields(fields, ITEM_RULES, OpKind::Create, &resolver);
    let created_at = parse_created_at(fields).unwrap_or_else(|v| {
        violations.push(v);
        None
    });
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    let shop = resolver.resolve(&accepted_str(fields, "shop")?, EntityKind::Shop)?;
    let category = resolver.resolve(&accepted_str(fields, "category")?, EntityKind::Category)?;
    let status = ItemStatus::from_str(&accepted_str(fields, "status")?)
        .map_err(|e| LifecycleError::Internal(e.to_string()))?;

    let item = Item {
        key: 0,
        name: accepted_str(fields, "name")?,
        description: accepted_str(fields, "description")?,
        price: accepted_i64(fields, "price")?,
        status,
        shop,
        category,
        created_at: created_at.unwrap_or_else(Utc::now),
    };
    Ok(store.create_item(item)?)
}

/// Validates a partial candidate and merges it into an existing item.
///
/// Re-wiring `shop` or `category` overwrites the owning key in one step.
/// `createdAt` is immutable and ignored when present.
pub fn update_item(store: &dyn Store, key: u64, body: &Value) -> Result<Item, LifecycleError> {
    let mut item = store.get_item(key)?.ok_or(LifecycleError::NotFound)?;
    let fields = candidate_object(body)?;
    let resolver = Resolver::new(store);

    let violations = check_fields(fields, ITEM_RULES, OpKind::Update, &resolver);
    if !violations.is_empty() {
        return Err(LifecycleError::Validation(violations));
    }

    if let Some(name) = present_str(fields, "name") {
        item.name = name;
    }
    if let Some(description) = present_str(fields, "description") {
        item.description = description;
    }
    if let Some(price) = fields.get("price").and_then(Value::as_i64) {
        item.price = price;
    }
    if let Some(status) = present_str(fields, "status") {
        item.status = ItemStatus::from_str(&status)
            .map_err(|e| LifecycleError::Internal(e.to_string()))?;
    }
    if let Some(shop) = present_str(fields, "shop") {
        resolver.rewire(&mut item.shop, &shop, EntityKind::Shop)?;
    }
    if let Some(category) = present_str(fields, "category") {
        resolver.rewire(&mut item.category, &category, EntityKind::Category)?;
    }

    if !store.update_item(&item)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(item)
}

/// Deletes an item by key. Inverse membership in the shop and category
/// views disappears with the row.
pub fn delete_item(store: &dyn Store, key: u64) -> Result<(), LifecycleError> {
    if !store.delete_item(key)? {
        return Err(LifecycleError::NotFound);
    }
    Ok(())
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

/// Wire representation of an item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    /// External identifier.
    pub id: String,
    /// Listing name.
    pub name: String,
    /// Listing description.
    pub description: String,
    /// Price in cents.
    pub price: i64,
    /// Moderation status.
    pub status: ItemStatus,
    /// External identifier of the owning shop.
    pub shop: String,
    /// External identifier of the owning category.
    pub category: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&Item> for ItemResponse {
    fn from(item: &Item) -> Self {
        ItemResponse {
            id: ExternalId::new(EntityKind::Item, item.key).to_string(),
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            status: item.status,
            shop: ExternalId::new(EntityKind::Shop, item.shop).to_string(),
            category: ExternalId::new(EntityKind::Category, item.category).to_string(),
            created_at: item.created_at,
        }
    }
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ItemResponse>), LifecycleError> {
    let item = create_item(&*state.store, &body)?;
    tracing::info!(item = %ExternalId::new(EntityKind::Item, item.key), "item created");
    Ok((StatusCode::CREATED, Json(ItemResponse::from(&item))))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<ItemResponse>>, LifecycleError> {
    let items = state.store.list_items()?;
    Ok(Json(items.iter().map(ItemResponse::from).collect()))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, LifecycleError> {
    let key = target_key(EntityKind::Item, &id)?;
    let item = state.store.get_item(key)?.ok_or(LifecycleError::NotFound)?;
    Ok(Json(ItemResponse::from(&item)))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ItemResponse>, LifecycleError> {
    let key = target_key(EntityKind::Item, &id)?;
    let item = update_item(&*state.store, key, &body)?;
    Ok(Json(ItemResponse::from(&item)))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, LifecycleError> {
    let key = target_key(EntityKind::Item, &id)?;
    delete_item(&*state.store, key)?;
    tracing::info!(item = %ExternalId::new(EntityKind::Item, key), "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the router for the item resource.
pub fn create_item_router(state: AppState) -> Router {
    Router::new()
        .route("/items", get(list).post(create))
        .route("/items/:id", get(fetch).patch(patch).delete(remove))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::create_category;
    use crate::shop::create_shop;
    use crate::user::{DevPasswordHasher, create_user};
    use crate::InMemoryStore;
    use serde_json::json;

    struct Seeded {
        store: InMemoryStore,
        shop: String,
        category: String,
    }

    fn seeded() -> Seeded {
        let store = InMemoryStore::new();
        let user = create_user(
            &store,
            &DevPasswordHasher,
            &json!({
                "email": "vendeur@collector.shop",
                "pseudo": "RetroHunter",
                "password": "plain",
            }),
        )
        .unwrap();
        let shop = create_shop(
            &store,
            &json!({
                "name": "La Caverne aux Merveilles",
                "description": "Spécialiste des jouets des années 80.",
                "owner": ExternalId::new(EntityKind::User, user.key).to_string(),
            }),
        )
        .unwrap();
        let category = create_category(
            &store,
            &json!({"name": "Figurines Vintage", "slug": "figurines-vintage"}),
        )
        .unwrap();
        Seeded {
            store,
            shop: ExternalId::new(EntityKind::Shop, shop.key).to_string(),
            category: ExternalId::new(EntityKind::Category, category.key).to_string(),
        }
    }

    fn goldorak(seeded: &Seeded) -> Value {
        json!({
            "name": "Goldorak Jumbo Shogun",
            "description": "Figurine géante en plastique, très bon état.",
            "price": 25000,
            "status": "VALIDATED",
            "shop": seeded.shop,
            "category": seeded.category,
        })
    }

    fn violated_fields(error: LifecycleError) -> Vec<String> {
        match error {
            LifecycleError::Validation(v) => v.into_iter().map(|v| v.field).collect(),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn create_commits_and_appears_in_inverse_views() {
        let seeded = seeded();
        let item = create_item(&seeded.store, &goldorak(&seeded)).unwrap();
        assert!(item.key > 0);
        assert_eq!(item.status, ItemStatus::Validated);

        let in_shop = seeded.store.items_for_shop(item.shop).unwrap();
        assert!(in_shop.iter().any(|i| i.key == item.key));
        let in_category = seeded.store.items_for_category(item.category).unwrap();
        assert!(in_category.iter().any(|i| i.key == item.key));
    }

    #[test]
    fn nonpositive_price_cites_price() {
        let seeded = seeded();
        for price in [0, -100] {
            let mut body = goldorak(&seeded);
            body["price"] = json!(price);
            let error = create_item(&seeded.store, &body).unwrap_err();
            assert_eq!(violated_fields(error), vec!["price"]);
        }
    }

    #[test]
    fn unknown_status_cites_status_regardless_of_other_fields() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["status"] = json!("INVALID_STATUS");
        let error = create_item(&seeded.store, &body).unwrap_err();
        assert_eq!(violated_fields(error), vec!["status"]);
    }

    #[test]
    fn empty_name_and_missing_price_cited_together() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["name"] = json!("");
        body.as_object_mut().unwrap().remove("price");
        let error = create_item(&seeded.store, &body).unwrap_err();
        let fields = violated_fields(error);
        assert!(fields.contains(&"name".to_string()));
        assert!(fields.contains(&"price".to_string()));
    }

    #[test]
    fn dangling_category_cites_category() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["category"] = json!(ExternalId::new(EntityKind::Category, 9999).to_string());
        let error = create_item(&seeded.store, &body).unwrap_err();
        assert_eq!(violated_fields(error), vec!["category"]);
    }

    #[test]
    fn rejected_candidate_never_touches_the_store() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["price"] = json!(-1);
        let _ = create_item(&seeded.store, &body).unwrap_err();
        assert!(seeded.store.list_items().unwrap().is_empty());
    }

    #[test]
    fn created_at_defaults_at_persist_and_never_changes() {
        let seeded = seeded();
        let item = create_item(&seeded.store, &goldorak(&seeded)).unwrap();
        let stamped = item.created_at;

        let updated = update_item(
            &seeded.store,
            item.key,
            &json!({"price": 28000, "status": "VALIDATED", "createdAt": "1999-01-01T00:00:00Z"}),
        )
        .unwrap();
        assert_eq!(updated.created_at, stamped);
        assert_eq!(updated.price, 28000);
    }

    #[test]
    fn create_honors_supplied_created_at() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["createdAt"] = json!("2020-05-01T12:00:00Z");
        let item = create_item(&seeded.store, &body).unwrap();
        assert_eq!(
            item.created_at,
            DateTime::parse_from_rfc3339("2020-05-01T12:00:00Z").unwrap()
        );
    }

    #[test]
    fn unparseable_created_at_is_a_violation() {
        let seeded = seeded();
        let mut body = goldorak(&seeded);
        body["createdAt"] = json!("pas-une-date");
        let error = create_item(&seeded.store, &body).unwrap_err();
        assert_eq!(violated_fields(error), vec!["createdAt"]);
    }

    #[test]
    fn partial_patch_leaves_other_fields_alone() {
        let seeded = seeded();
        let item = create_item(&seeded.store, &goldorak(&seeded)).unwrap();
        let updated = update_item(
            &seeded.store,
            item.key,
            &json!({"price": 28000, "status": "DRAFT"}),
        )
        .unwrap();
        assert_eq!(updated.price, 28000);
        assert_eq!(updated.status, ItemStatus::Draft);
        assert_eq!(updated.name, item.name);
        assert_eq!(updated.description, item.description);
        assert_eq!(updated.shop, item.shop);
        assert_eq!(updated.category, item.category);
        assert_eq!(updated.created_at, item.created_at);
    }

    #[test]
    fn patch_with_null_name_is_rejected() {
        let seeded = seeded();
        let item = create_item(&seeded.store, &goldorak(&seeded)).unwrap();
        let error = update_item(&seeded.store, item.key, &json!({"name": null})).unwrap_err();
        assert_eq!(violated_fields(error), vec!["name"]);
    }

    #[test]
    fn delete_removes_item_from_both_inverse_views() {
        let seeded = seeded();
        let item = create_item(&seeded.store, &goldorak(&seeded)).unwrap();
        delete_item(&seeded.store, item.key).unwrap();
        assert!(seeded.store.items_for_shop(item.shop).unwrap().is_empty());
        assert!(seeded
            .store
            .items_for_category(item.category)
            .unwrap()
            .is_empty());
        assert_eq!(seeded.store.get_item(item.key).unwrap(), None);
        assert_eq!(
            delete_item(&seeded.store, item.key),
            Err(LifecycleError::NotFound)
        );
    }

    #[test]
    fn status_spellings_round_trip() {
        for spelling in ItemStatus::CHOICES {
            let status = ItemStatus::from_str(spelling).unwrap();
            assert_eq!(status.as_str(), *spelling);
        }
        assert!(ItemStatus::from_str("PENDING").is_err());
    }
}

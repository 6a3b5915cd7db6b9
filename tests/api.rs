//! End-to-end exercises of the HTTP surface: the four resource endpoints
//! mounted together, seeded with the development fixtures, driven through
//! real requests.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use brocante::{
    AppState, DevPasswordHasher, EntityKind, ExternalId, InMemoryStore, api_router, load_fixtures,
};

fn seeded_server() -> TestServer {
    let store = Arc::new(InMemoryStore::new());
    let hasher = Arc::new(DevPasswordHasher);
    load_fixtures(&*store, &*hasher).unwrap();
    let state = AppState::new(store, hasher);
    TestServer::new(api_router(state)).unwrap()
}

async fn first_id(server: &TestServer, path: &str) -> String {
    let response = server.get(path).await;
    response.assert_status_ok();
    let body: Value = response.json();
    body[0]["id"].as_str().unwrap().to_string()
}

async fn goldorak_body(server: &TestServer) -> Value {
    json!({
        "name": "Goldorak Jumbo Shogun",
        "description": "Figurine géante en plastique, très bon état.",
        "price": 25000,
        "status": "VALIDATED",
        "shop": first_id(server, "/shops").await,
        "category": first_id(server, "/categories").await,
    })
}

fn violated_fields(body: &Value) -> Vec<&str> {
    body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn create_item_returns_201_with_id_and_created_at() {
    let server = seeded_server();
    let body = goldorak_body(&server).await;

    let response = server.post("/items").json(&body).await;
    response.assert_status(StatusCode::CREATED);

    let item: Value = response.json();
    assert!(item["id"].as_str().unwrap().starts_with("item:"));
    assert!(item["createdAt"].as_str().is_some());
    assert_eq!(item["price"], 25000);
    assert_eq!(item["status"], "VALIDATED");

    // The new item appears in the shop's derived inverse view.
    let shop_id = body["shop"].as_str().unwrap();
    let shop: Value = server.get(&format!("/shops/{}", shop_id)).await.json();
    let items: Vec<&str> = shop["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i.as_str().unwrap())
        .collect();
    assert!(items.contains(&item["id"].as_str().unwrap()));
}

#[tokio::test]
async fn blank_name_and_missing_price_are_cited_together() {
    let server = seeded_server();
    let mut body = goldorak_body(&server).await;
    body["name"] = json!("");
    body.as_object_mut().unwrap().remove("price");

    let response = server.post("/items").json(&body).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let error: Value = response.json();
    assert_eq!(error["status"], 422);
    let fields = violated_fields(&error);
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"price"));
}

#[tokio::test]
async fn unknown_status_is_rejected() {
    let server = seeded_server();
    let mut body = goldorak_body(&server).await;
    body["status"] = json!("PENDING");

    let response = server.post("/items").json(&body).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert_eq!(violated_fields(&error), vec!["status"]);
    assert_eq!(
        error["violations"][0]["message"],
        "Le statut doit être DRAFT, VALIDATED ou REJECTED"
    );
}

#[tokio::test]
async fn nonpositive_price_is_rejected() {
    let server = seeded_server();
    for price in [0, -500] {
        let mut body = goldorak_body(&server).await;
        body["price"] = json!(price);
        let response = server.post("/items").json(&body).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let error: Value = response.json();
        assert_eq!(violated_fields(&error), vec!["price"]);
    }
}

#[tokio::test]
async fn dangling_category_reference_is_a_field_violation() {
    let server = seeded_server();
    let mut body = goldorak_body(&server).await;
    body["category"] = json!(ExternalId::new(EntityKind::Category, 999_999).to_string());

    let response = server.post("/items").json(&body).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert_eq!(violated_fields(&error), vec!["category"]);
    assert_eq!(
        error["violations"][0]["message"],
        "La catégorie est introuvable"
    );
}

#[tokio::test]
async fn patch_changes_only_the_named_fields() {
    let server = seeded_server();
    let item_id = first_id(&server, "/items").await;
    let before: Value = server.get(&format!("/items/{}", item_id)).await.json();

    let response = server
        .patch(&format!("/items/{}", item_id))
        .json(&json!({"price": 28000, "status": "DRAFT"}))
        .await;
    response.assert_status_ok();

    let after: Value = response.json();
    assert_eq!(after["price"], 28000);
    assert_eq!(after["status"], "DRAFT");
    assert_eq!(after["name"], before["name"]);
    assert_eq!(after["description"], before["description"]);
    assert_eq!(after["shop"], before["shop"]);
    assert_eq!(after["category"], before["category"]);
    assert_eq!(after["createdAt"], before["createdAt"]);
}

#[tokio::test]
async fn patch_cannot_rewrite_created_at() {
    let server = seeded_server();
    let item_id = first_id(&server, "/items").await;
    let before: Value = server.get(&format!("/items/{}", item_id)).await.json();

    let response = server
        .patch(&format!("/items/{}", item_id))
        .json(&json!({"createdAt": "1999-01-01T00:00:00Z"}))
        .await;
    response.assert_status_ok();
    let after: Value = response.json();
    assert_eq!(after["createdAt"], before["createdAt"]);
}

#[tokio::test]
async fn delete_item_empties_the_inverse_views() {
    let server = seeded_server();
    let item_id = first_id(&server, "/items").await;
    let item: Value = server.get(&format!("/items/{}", item_id)).await.json();

    let response = server.delete(&format!("/items/{}", item_id)).await;
    response.assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/items/{}", item_id))
        .await
        .assert_status_not_found();

    let shop: Value = server
        .get(&format!("/shops/{}", item["shop"].as_str().unwrap()))
        .await
        .json();
    assert!(shop["items"].as_array().unwrap().is_empty());

    let category: Value = server
        .get(&format!("/categories/{}", item["category"].as_str().unwrap()))
        .await
        .json();
    assert!(category["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_a_unique_violation() {
    let server = seeded_server();
    let response = server
        .post("/users")
        .json(&json!({
            "email": "vendeur@collector.shop",
            "pseudo": "Imposteur",
            "password": "plain",
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert_eq!(error["violations"][0]["field"], "email");
    assert_eq!(error["violations"][0]["rule"], "unique");
    assert_eq!(error["violations"][0]["message"], "Cet email est déjà utilisé");
}

#[tokio::test]
async fn duplicate_slug_is_a_storage_conflict() {
    let server = seeded_server();
    let response = server
        .post("/categories")
        .json(&json!({"name": "Doublon", "slug": "figurines-vintage"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let error: Value = response.json();
    assert_eq!(error["status"], 409);
}

#[tokio::test]
async fn user_response_never_carries_the_password() {
    let server = seeded_server();
    let users: Value = server.get("/users").await.json();
    let user = &users[0];
    assert!(user.get("password").is_none());
    assert_eq!(user["email"], "vendeur@collector.shop");
    assert_eq!(user["isVerified"], true);
    assert_eq!(user["shops"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_targets_are_404() {
    let server = seeded_server();
    let missing_item = ExternalId::new(EntityKind::Item, 999_999).to_string();
    let missing_category = ExternalId::new(EntityKind::Category, 999_999).to_string();
    server
        .get(&format!("/items/{}", missing_item))
        .await
        .assert_status_not_found();
    server
        .patch("/items/definitely-not-an-id")
        .json(&json!({"price": 1}))
        .await
        .assert_status_not_found();
    server
        .delete(&format!("/categories/{}", missing_category))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn wrong_kind_in_the_path_is_404() {
    let server = seeded_server();
    let shop_id = first_id(&server, "/shops").await;
    server
        .get(&format!("/items/{}", shop_id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn non_object_body_is_400() {
    let server = seeded_server();
    let response = server.post("/items").json(&json!("not an object")).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: Value = response.json();
    assert_eq!(error["status"], 400);
}

#[tokio::test]
async fn shop_create_read_update_delete_cycle() {
    let server = seeded_server();
    let owner = first_id(&server, "/users").await;

    let response = server
        .post("/shops")
        .json(&json!({
            "name": "Annexe",
            "description": "Le surplus de la caverne.",
            "owner": owner,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let shop: Value = response.json();
    let shop_id = shop["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/shops/{}", shop_id))
        .json(&json!({"description": "Fermée pour inventaire."}))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["description"], "Fermée pour inventaire.");
    assert_eq!(updated["name"], "Annexe");

    server
        .delete(&format!("/shops/{}", shop_id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/shops/{}", shop_id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn deleting_a_referenced_shop_is_a_conflict() {
    let server = seeded_server();
    let shop_id = first_id(&server, "/shops").await;
    let response = server.delete(&format!("/shops/{}", shop_id)).await;
    response.assert_status(StatusCode::CONFLICT);
}

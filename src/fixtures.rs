//! Development fixtures: a small, coherent marketplace seeded through the
//! same controllers the API uses, so every fixture row passes the same
//! validation and wiring as a live request.

use serde_json::json;

use crate::category::create_category;
use crate::item::create_item;
use crate::shop::create_shop;
use crate::user::create_user;
use crate::{EntityKind, ExternalId, LifecycleError, PasswordHasher, Store};

/// Environment variable overriding the fixture user's password.
pub const FIXTURE_PASSWORD_ENV: &str = "FIXTURE_USER_PASSWORD";

const DEFAULT_FIXTURE_PASSWORD: &str = "change-this-fixture-password";

/// Seeds the store with one verified user, their shop, one category, and one
/// validated item filed under both.
pub fn load_fixtures(
    store: &dyn Store,
    hasher: &dyn PasswordHasher,
) -> Result<(), LifecycleError> {
    let password =
        std::env::var(FIXTURE_PASSWORD_ENV).unwrap_or_else(|_| DEFAULT_FIXTURE_PASSWORD.to_string());

    let user = create_user(
        store,
        hasher,
        &json!({
            "email": "vendeur@collector.shop",
            "pseudo": "RetroHunter",
            "password": password,
            "roles": ["ROLE_USER"],
            "isVerified": true,
        }),
    )?;

    let shop = create_shop(
        store,
        &json!({
            "name": "La Caverne aux Merveilles",
            "description": "Spécialiste des jouets des années 80.",
            "owner": ExternalId::new(EntityKind::User, user.key).to_string(),
        }),
    )?;

    let category = create_category(
        store,
        &json!({
            "name": "Figurines Vintage",
            "slug": "figurines-vintage",
        }),
    )?;

    create_item(
        store,
        &json!({
            "name": "Goldorak Jumbo Shogun",
            "description": "Figurine géante en plastique, très bon état, boite d'origine.",
            "price": 25000,
            "status": "VALIDATED",
            "shop": ExternalId::new(EntityKind::Shop, shop.key).to_string(),
            "category": ExternalId::new(EntityKind::Category, category.key).to_string(),
        }),
    )?;

    tracing::info!("fixtures loaded");
    Ok(())
}

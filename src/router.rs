//! Assembles the per-resource routers into the full API surface.

use axum::Router;

use crate::AppState;
use crate::category::create_category_router;
use crate::item::create_item_router;
use crate::shop::create_shop_router;
use crate::user::create_user_router;

/// Builds the complete API router over a shared application state.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(create_user_router(state.clone()))
        .merge(create_shop_router(state.clone()))
        .merge(create_category_router(state.clone()))
        .merge(create_item_router(state))
}

//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};
use apotik_core::stock::fits_amount;
use apotik_shared::types::PageRequest;
use rust_decimal::Decimal;
use validator::ValidationError;

pub mod auth;
pub mod drugs;
pub mod health;
pub mod organization;
pub mod parties;
pub mod pharmacies;
pub mod purchase_orders;
pub mod roles;
pub mod stock;

/// Creates the API router; everything outside health and auth sits behind
/// the bearer-token middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(auth::protected_routes())
        .merge(organization::routes())
        .merge(pharmacies::routes())
        .merge(drugs::routes())
        .merge(parties::routes())
        .merge(roles::routes())
        .merge(stock::routes())
        .merge(purchase_orders::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(protected_routes)
}

/// Builds a normalized page request from optional query parameters.
pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest {
        page: page.unwrap_or(defaults.page),
        per_page: per_page.unwrap_or(defaults.per_page),
    }
    .normalized()
}

/// Rejects quantities, prices and deltas a `NUMERIC(19,4)` column cannot hold.
pub(crate) fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if fits_amount(*value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount is outside the supported range".into());
        Err(err)
    }
}

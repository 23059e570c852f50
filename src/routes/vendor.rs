use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::listings::{ListingList, SubmitListingRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::InventoryListing,
    response::ApiResponse,
    routes::params::{ListingListQuery, LowStockQuery},
    services::listing_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings", post(submit_listing).get(list_own_listings))
        .route("/listings/low-stock", get(list_low_stock))
}

#[utoipa::path(
    post,
    path = "/api/vendor/listings",
    request_body = SubmitListingRequest,
    responses(
        (status = 200, description = "Listing created or updated; lands in pending_approval either way", body = ApiResponse<InventoryListing>),
        (status = 400, description = "Invalid quantity/price or unknown catalog reference"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn submit_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SubmitListingRequest>,
) -> AppResult<Json<ApiResponse<InventoryListing>>> {
    let resp = listing_service::submit_or_update(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vendor/listings",
    params(
        ("status" = Option<String>, Query, description = "Filter by status: pending_approval, approved, rejected"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Vendor's own listings, rejection reasons included", body = ApiResponse<ListingList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn list_own_listings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListingListQuery>,
) -> AppResult<Json<ApiResponse<ListingList>>> {
    let resp = listing_service::list_own(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vendor/listings/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 10"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Listings below the stock threshold", body = ApiResponse<ListingList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ListingList>>> {
    let resp =
        listing_service::list_low_stock(&state, &user, query.threshold, query.pagination).await?;
    Ok(Json(resp))
}

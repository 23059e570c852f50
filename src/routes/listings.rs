use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::listings::PurchasableListingList,
    error::AppResult,
    response::ApiResponse,
    routes::params::PurchasableQuery,
    services::listing_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search_purchasable))
}

#[utoipa::path(
    get,
    path = "/api/listings",
    params(
        ("phone_model_id" = uuid::Uuid, Query, description = "Phone model"),
        ("component_id" = uuid::Uuid, Query, description = "Component"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Approved, in-stock listings for the model/component pair", body = ApiResponse<PurchasableListingList>)
    ),
    tag = "Listings"
)]
pub async fn search_purchasable(
    State(state): State<AppState>,
    Query(query): Query<PurchasableQuery>,
) -> AppResult<Json<ApiResponse<PurchasableListingList>>> {
    let resp = listing_service::get_purchasable(
        &state,
        query.phone_model_id,
        query.component_id,
        query.pagination,
    )
    .await?;
    Ok(Json(resp))
}

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    error::AppResult,
    models::{Component, PhoneModel},
    response::ApiResponse,
    routes::params::Pagination,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/models", get(list_models))
        .route("/components", get(list_components))
}

#[utoipa::path(
    get,
    path = "/api/catalog/models",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List phone models", body = ApiResponse<Vec<PhoneModel>>)
    ),
    tag = "Catalog"
)]
pub async fn list_models(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<Vec<PhoneModel>>>> {
    let resp = catalog_service::list_models(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/catalog/components",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List components", body = ApiResponse<Vec<Component>>)
    ),
    tag = "Catalog"
)]
pub async fn list_components(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<Vec<Component>>>> {
    let resp = catalog_service::list_components(&state, pagination).await?;
    Ok(Json(resp))
}

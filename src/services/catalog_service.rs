use crate::{
    error::AppResult,
    models::{Component, PhoneModel},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

// Read-only catalog lookups. The marketplace stores opaque references to
// these rows; editing them is outside this service.

pub async fn list_models(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<PhoneModel>>> {
    let (page, limit, offset) = pagination.normalize();
    let items: Vec<PhoneModel> = sqlx::query_as(
        "SELECT * FROM phone_models ORDER BY brand, name LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM phone_models")
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Phone models", items, Some(meta)))
}

pub async fn list_components(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<Component>>> {
    let (page, limit, offset) = pagination.normalize();
    let items: Vec<Component> =
        sqlx::query_as("SELECT * FROM components ORDER BY name LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM components")
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Components", items, Some(meta)))
}

use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::listings::{
        ListingList, PurchasableListingDto, PurchasableListingList, SubmitListingRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_vendor},
    models::InventoryListing,
    response::{ApiResponse, Meta},
    routes::params::{ListingListQuery, Pagination},
    state::AppState,
};

/// Vendor submission. An existing (vendor, model, component) row is updated in
/// place; either path lands the listing in `pending_approval`, so nothing a
/// vendor writes reaches buyers without review.
pub async fn submit_or_update(
    state: &AppState,
    user: &AuthUser,
    payload: SubmitListingRequest,
) -> AppResult<ApiResponse<InventoryListing>> {
    ensure_vendor(user)?;

    if payload.quantity < 0 {
        return Err(AppError::Validation("quantity must not be negative".into()));
    }
    if payload.price <= 0 {
        return Err(AppError::Validation("price must be greater than 0".into()));
    }

    let model_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM phone_models WHERE id = $1")
        .bind(payload.phone_model_id)
        .fetch_optional(&state.pool)
        .await?;
    if model_exists.is_none() {
        return Err(AppError::Validation("unknown phone model".into()));
    }
    let component_exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM components WHERE id = $1")
            .bind(payload.component_id)
            .fetch_optional(&state.pool)
            .await?;
    if component_exists.is_none() {
        return Err(AppError::Validation("unknown component".into()));
    }

    let listing: InventoryListing = sqlx::query_as(
        r#"
        INSERT INTO inventory_listings
            (id, vendor_id, phone_model_id, component_id, quantity, price, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending_approval')
        ON CONFLICT (vendor_id, phone_model_id, component_id) DO UPDATE
        SET quantity = EXCLUDED.quantity,
            price = EXCLUDED.price,
            status = 'pending_approval',
            rejection_reason = NULL,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.phone_model_id)
    .bind(payload.component_id)
    .bind(payload.quantity)
    .bind(payload.price)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "listing_submit",
        Some("inventory_listings"),
        Some(serde_json::json!({ "listing_id": listing.id, "quantity": listing.quantity, "price": listing.price })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Listing submitted for review",
        listing,
        Some(Meta::empty()),
    ))
}

#[derive(FromRow)]
struct PurchasableRow {
    id: Uuid,
    vendor_id: Uuid,
    vendor_email: String,
    phone_model_id: Uuid,
    brand: String,
    model_name: String,
    component_id: Uuid,
    component_name: String,
    quantity: i32,
    price: i64,
}

/// Buyer-facing search: approved, in-stock listings for a (model, component)
/// pair. Non-approved rows never leave this filter.
pub async fn get_purchasable(
    state: &AppState,
    phone_model_id: Uuid,
    component_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<PurchasableListingList>> {
    let (page, limit, offset) = pagination.normalize();

    let rows = sqlx::query_as::<_, PurchasableRow>(
        r#"
        SELECT l.id, l.vendor_id, u.email AS vendor_email,
               l.phone_model_id, m.brand, m.name AS model_name,
               l.component_id, c.name AS component_name,
               l.quantity, l.price
        FROM inventory_listings l
        JOIN users u ON u.id = l.vendor_id
        JOIN phone_models m ON m.id = l.phone_model_id
        JOIN components c ON c.id = l.component_id
        WHERE l.phone_model_id = $1
          AND l.component_id = $2
          AND l.status = 'approved'
          AND l.quantity > 0
        ORDER BY l.price ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(phone_model_id)
    .bind(component_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM inventory_listings
        WHERE phone_model_id = $1 AND component_id = $2
          AND status = 'approved' AND quantity > 0
        "#,
    )
    .bind(phone_model_id)
    .bind(component_id)
    .fetch_one(&state.pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| PurchasableListingDto {
            id: row.id,
            vendor_id: row.vendor_id,
            vendor_email: row.vendor_email,
            phone_model_id: row.phone_model_id,
            brand: row.brand,
            model_name: row.model_name,
            component_id: row.component_id,
            component_name: row.component_name,
            quantity: row.quantity,
            price: row.price,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        PurchasableListingList { items },
        Some(meta),
    ))
}

/// Vendor's own listings, rejected ones included so the vendor sees the
/// rejection reason.
pub async fn list_own(
    state: &AppState,
    user: &AuthUser,
    query: ListingListQuery,
) -> AppResult<ApiResponse<ListingList>> {
    ensure_vendor(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let items: Vec<InventoryListing> = sqlx::query_as(
        r#"
        SELECT * FROM inventory_listings
        WHERE vendor_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY updated_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user.user_id)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM inventory_listings WHERE vendor_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(user.user_id)
    .bind(query.status)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", ListingList { items }, Some(meta)))
}

/// Listings running low, so the vendor knows what to restock.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    threshold: Option<i32>,
    pagination: Pagination,
) -> AppResult<ApiResponse<ListingList>> {
    ensure_vendor(user)?;
    let threshold = threshold.unwrap_or(state.config.low_stock_threshold);
    let (page, limit, offset) = pagination.normalize();

    let items: Vec<InventoryListing> = sqlx::query_as(
        r#"
        SELECT * FROM inventory_listings
        WHERE vendor_id = $1 AND quantity < $2
        ORDER BY quantity ASC, updated_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user.user_id)
    .bind(threshold)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM inventory_listings WHERE vendor_id = $1 AND quantity < $2",
    )
    .bind(user.user_id)
    .bind(threshold)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Low stock",
        ListingList { items },
        Some(meta),
    ))
}

/// Atomic check-and-decrement. The WHERE clause is the whole point: the
/// decrement only happens if the row is still approved and still has the
/// stock, so two racing reservations can never drive quantity negative.
pub async fn reserve<'e, E>(executor: E, listing_id: Uuid, quantity: i32) -> AppResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE inventory_listings
        SET quantity = quantity - $2, updated_at = now()
        WHERE id = $1 AND status = 'approved' AND quantity >= $2
        "#,
    )
    .bind(listing_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Oversell(listing_id));
    }
    Ok(())
}

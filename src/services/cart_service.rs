use chrono::{Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLineDto, CartView, SetQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{CartItem, InventoryListing, ListingStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Upper bound on a single cart line. Keeps repeated adds from summing toward
/// the integer column's range, where Postgres would reject the update.
const MAX_LINE_QUANTITY: i64 = 1_000;

/// Lazy expiry: the cart has a sliding TTL refreshed by every mutation. When
/// the newest touch is older than the window the whole cart is dropped and the
/// buyer simply sees an empty cart, never an error.
pub(crate) async fn purge_if_expired(pool: &DbPool, user_id: Uuid, ttl_days: i64) -> AppResult<()> {
    let newest: (Option<chrono::DateTime<Utc>>,) =
        sqlx::query_as("SELECT MAX(touched_at) FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    if let Some(touched) = newest.0 {
        if touched < Utc::now() - Duration::days(ttl_days) {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(user_id)
                .execute(pool)
                .await?;
            tracing::debug!(user_id = %user_id, "expired cart purged");
        }
    }
    Ok(())
}

/// Sliding-window refresh across the whole cart, not per line.
async fn touch(pool: &DbPool, user_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE cart_items SET touched_at = now() WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(FromRow)]
struct CartLineRow {
    id: Uuid,
    listing_id: Uuid,
    quantity: i32,
    price_snapshot: i64,
    brand: String,
    model_name: String,
    component_name: String,
    live_price: i64,
    status: ListingStatus,
    stock: i32,
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    ensure_customer(user)?;
    purge_if_expired(&state.pool, user.user_id, state.config.cart_ttl_days).await?;

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id, ci.listing_id, ci.quantity, ci.price_snapshot,
               m.brand, m.name AS model_name, c.name AS component_name,
               l.price AS live_price, l.status, l.quantity AS stock
        FROM cart_items ci
        JOIN inventory_listings l ON l.id = ci.listing_id
        JOIN phone_models m ON m.id = l.phone_model_id
        JOIN components c ON c.id = l.component_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut total: i64 = 0;
    let mut total_items: i64 = 0;
    let items: Vec<CartLineDto> = rows
        .into_iter()
        .map(|row| {
            total += row.price_snapshot * i64::from(row.quantity);
            total_items += i64::from(row.quantity);
            // Stale lines stay visible, flagged, so the buyer can adjust
            // rather than wonder where a line went.
            let available = row.status == ListingStatus::Approved && row.stock >= row.quantity;
            CartLineDto {
                id: row.id,
                listing_id: row.listing_id,
                brand: row.brand,
                model_name: row.model_name,
                component_name: row.component_name,
                quantity: row.quantity,
                price_snapshot: row.price_snapshot,
                live_price: row.live_price,
                available,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartView {
            items,
            total_items,
            total,
        },
        Some(Meta::empty()),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    purge_if_expired(&state.pool, user.user_id, state.config.cart_ttl_days).await?;

    let listing: Option<InventoryListing> =
        sqlx::query_as("SELECT * FROM inventory_listings WHERE id = $1")
            .bind(payload.listing_id)
            .fetch_optional(&state.pool)
            .await?;
    let listing = match listing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    // Advisory only; checkout re-validates against the live ledger.
    if !listing.is_purchasable() {
        return Err(AppError::UnavailableItem {
            listing_id: listing.id,
            reason: "listing is not available for purchase".into(),
        });
    }

    let existing: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND listing_id = $2")
            .bind(user.user_id)
            .bind(payload.listing_id)
            .fetch_optional(&state.pool)
            .await?;
    let summed = i64::from(existing.map_or(0, |(q,)| q)) + i64::from(payload.quantity);
    if summed > MAX_LINE_QUANTITY {
        return Err(AppError::Validation(format!(
            "cart line quantity may not exceed {MAX_LINE_QUANTITY}"
        )));
    }

    // Re-adding the same listing sums quantities; the price snapshot from the
    // first add is kept.
    let cart_item: CartItem = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, user_id, listing_id, quantity, price_snapshot)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, listing_id) DO UPDATE
        SET quantity = cart_items.quantity + EXCLUDED.quantity,
            touched_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.listing_id)
    .bind(payload.quantity)
    .bind(listing.price)
    .fetch_one(&state.pool)
    .await?;

    touch(&state.pool, user.user_id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "listing_id": payload.listing_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    if payload.quantity < 0 {
        return Err(AppError::Validation(
            "quantity must not be negative".to_string(),
        ));
    }

    purge_if_expired(&state.pool, user.user_id, state.config.cart_ttl_days).await?;

    if payload.quantity == 0 {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line_id)
            .bind(user.user_id)
            .execute(&state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
    } else {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3, touched_at = now() WHERE id = $1 AND user_id = $2",
        )
        .bind(line_id)
        .bind(user.user_id)
        .bind(payload.quantity)
        .execute(&state.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
    }

    touch(&state.pool, user.user_id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_set_quantity",
        Some("cart_items"),
        Some(serde_json::json!({ "line_id": line_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn remove_line(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    purge_if_expired(&state.pool, user.user_id, state.config.cart_ttl_days).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
        .bind(line_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    touch(&state.pool, user.user_id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "line_id": line_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

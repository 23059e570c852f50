use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        listings::{ListingReviewDto, ListingReviewList, RejectListingRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{InventoryListing, ListingStatus, Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{ListingListQuery, OrderListQuery, SortOrder},
    state::AppState,
};

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    vendor_id: Uuid,
    vendor_email: String,
    brand: String,
    model_name: String,
    component_name: String,
    quantity: i32,
    price: i64,
    status: ListingStatus,
    rejection_reason: Option<String>,
}

/// Review queue. Defaults to pending submissions; a status filter widens it.
pub async fn list_listings(
    state: &AppState,
    user: &AuthUser,
    query: ListingListQuery,
) -> AppResult<ApiResponse<ListingReviewList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let status = query.status.unwrap_or(ListingStatus::PendingApproval);

    let rows = sqlx::query_as::<_, ReviewRow>(
        r#"
        SELECT l.id, l.vendor_id, u.email AS vendor_email,
               m.brand, m.name AS model_name, c.name AS component_name,
               l.quantity, l.price, l.status, l.rejection_reason
        FROM inventory_listings l
        JOIN users u ON u.id = l.vendor_id
        JOIN phone_models m ON m.id = l.phone_model_id
        JOIN components c ON c.id = l.component_id
        WHERE l.status = $1
        ORDER BY l.updated_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM inventory_listings WHERE status = $1")
        .bind(status)
        .fetch_one(&state.pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| ListingReviewDto {
            id: row.id,
            vendor_id: row.vendor_id,
            vendor_email: row.vendor_email,
            brand: row.brand,
            model_name: row.model_name,
            component_name: row.component_name,
            quantity: row.quantity,
            price: row.price,
            status: row.status,
            rejection_reason: row.rejection_reason,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        ListingReviewList { items },
        Some(meta),
    ))
}

/// Approving makes the listing purchasable immediately (stock permitting).
/// Only a pending submission can be approved; approving twice fails.
pub async fn approve_listing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<InventoryListing>> {
    ensure_admin(user)?;
    let listing = review_listing(state, user, id, ListingStatus::Approved, None).await?;
    Ok(ApiResponse::success(
        "Listing approved",
        listing,
        Some(Meta::empty()),
    ))
}

pub async fn reject_listing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RejectListingRequest,
) -> AppResult<ApiResponse<InventoryListing>> {
    ensure_admin(user)?;
    let reason = payload.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::Validation(
            "rejection reason must not be empty".to_string(),
        ));
    }
    let listing = review_listing(state, user, id, ListingStatus::Rejected, Some(reason)).await?;
    Ok(ApiResponse::success(
        "Listing rejected",
        listing,
        Some(Meta::empty()),
    ))
}

async fn review_listing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    verdict: ListingStatus,
    reason: Option<String>,
) -> AppResult<InventoryListing> {
    let mut txn = state.pool.begin().await?;

    let listing: Option<InventoryListing> =
        sqlx::query_as("SELECT * FROM inventory_listings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *txn)
            .await?;
    let listing = match listing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    if !listing.status.can_transition_to(verdict) {
        return Err(AppError::InvalidTransition(format!(
            "{:?} -> {:?}",
            listing.status, verdict
        )));
    }

    let listing: InventoryListing = sqlx::query_as(
        r#"
        UPDATE inventory_listings
        SET status = $2, rejection_reason = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(listing.id)
    .bind(verdict)
    .bind(&reason)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "listing_review",
        Some("inventory_listings"),
        Some(serde_json::json!({ "listing_id": listing.id, "verdict": verdict, "reason": reason })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(listing)
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let sort = query.sort_order.unwrap_or(SortOrder::Desc);

    let sql = format!(
        r#"
        SELECT * FROM orders
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at {}
        LIMIT $2 OFFSET $3
        "#,
        sort.as_sql()
    );

    let items: Vec<Order> = sqlx::query_as(&sql)
        .bind(query.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
            .bind(query.status)
            .fetch_one(&state.pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order.id)
        .fetch_all(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Fulfilment transitions are checked against the order state machine; orders
/// are never deleted, only moved between statuses.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let mut txn = state.pool.begin().await?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !order.status.can_transition_to(payload.status) {
        return Err(AppError::InvalidTransition(format!(
            "{:?} -> {:?}",
            order.status, payload.status
        )));
    }

    let order: Order = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(payload.status)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

use chrono::Utc;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{ListingStatus, Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, listing_service},
    state::AppState,
};

#[derive(Debug, FromRow)]
struct CheckoutRow {
    listing_id: Uuid,
    requested: i32,
    status: ListingStatus,
    stock: i32,
    price: i64,
    vendor_id: Uuid,
    phone_model_id: Uuid,
    component_id: Uuid,
}

/// The whole pipeline runs in one transaction: validate, persist the order,
/// decrement stock, clear the cart. Listing rows are locked in id order up
/// front, so two checkouts racing on the same listing serialize and the loser
/// sees the already-decremented quantity. Any error rolls everything back and
/// leaves cart and ledger untouched.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;

    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::Validation(
            "shipping_address must not be empty".to_string(),
        ));
    }

    // An expired cart must check out as empty, not with week-old lines.
    cart_service::purge_if_expired(&state.pool, user.user_id, state.config.cart_ttl_days).await?;

    let mut txn = state.pool.begin().await?;

    let rows = sqlx::query_as::<_, CheckoutRow>(
        r#"
        SELECT ci.listing_id, ci.quantity AS requested,
               l.status, l.quantity AS stock, l.price,
               l.vendor_id, l.phone_model_id, l.component_id
        FROM cart_items ci
        JOIN inventory_listings l ON l.id = ci.listing_id
        WHERE ci.user_id = $1
        ORDER BY l.id
        FOR UPDATE OF l
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&mut *txn)
    .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Authoritative re-validation against the live ledger. The first bad line
    // aborts the whole order; there are no partial orders.
    for row in &rows {
        if row.status != ListingStatus::Approved {
            return Err(AppError::UnavailableItem {
                listing_id: row.listing_id,
                reason: "listing is no longer available for purchase".into(),
            });
        }
        if row.stock < row.requested {
            return Err(AppError::UnavailableItem {
                listing_id: row.listing_id,
                reason: format!(
                    "only {} in stock, {} requested",
                    row.stock, row.requested
                ),
            });
        }
    }

    // Totals come from live listing prices; the cart snapshot is display only.
    let mut subtotal: i64 = 0;
    let mut total_items: i32 = 0;
    for row in &rows {
        subtotal += row.price * i64::from(row.requested);
        total_items += row.requested;
    }
    let total_amount = subtotal;

    let order_id = Uuid::new_v4();
    let order_number = build_order_number(order_id);

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders
            (id, order_number, user_id, status, subtotal, total_amount, total_items, shipping_address)
        VALUES ($1, $2, $3, 'confirmed', $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(user.user_id)
    .bind(subtotal)
    .bind(total_amount)
    .bind(total_items)
    .bind(&shipping_address)
    .fetch_one(&mut *txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(rows.len());
    for row in &rows {
        let item: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items
                (id, order_id, listing_id, vendor_id, phone_model_id, component_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(row.listing_id)
        .bind(row.vendor_id)
        .bind(row.phone_model_id)
        .bind(row.component_id)
        .bind(row.requested)
        .bind(row.price)
        .fetch_one(&mut *txn)
        .await?;
        items.push(item);

        // Conditional decrement; a failure here aborts the transaction, so
        // the just-inserted order vanishes with it.
        listing_service::reserve(&mut *txn, row.listing_id, row.requested).await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    tracing::info!(order_id = %order.id, total = order.total_amount, "order placed");

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_customer(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let sort = query.sort_order.unwrap_or(SortOrder::Desc);

    let sql = format!(
        r#"
        SELECT * FROM orders
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at {}
        LIMIT $3 OFFSET $4
        "#,
        sort.as_sql()
    );

    let items: Vec<Order> = sqlx::query_as(&sql)
        .bind(user.user_id)
        .bind(query.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(user.user_id)
    .bind(query.status)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
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
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Buyers may back out only while the order is still `confirmed`; after the
/// admin starts processing, cancellation goes through support.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_customer(user)?;
    let mut txn = state.pool.begin().await?;

    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(&mut *txn)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status != OrderStatus::Confirmed {
        return Err(AppError::InvalidTransition(format!(
            "cannot cancel an order in status {:?}",
            order.status
        )));
    }

    let order: Order = sqlx::query_as(
        "UPDATE orders SET status = 'cancelled', updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    ))
}

fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short)
}

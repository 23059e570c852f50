use partsmarket_api::{
    config::AppConfig,
    db::create_pool,
    dto::{
        cart::{AddToCartRequest, SetQuantityRequest},
        listings::{RejectListingRequest, SubmitListingRequest},
        orders::{CheckoutRequest, UpdateOrderStatusRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{ListingStatus, OrderStatus, Role},
    routes::params::{ListingListQuery, OrderListQuery, Pagination},
    services::{admin_service, cart_service, listing_service, order_service},
    state::AppState,
};
use uuid::Uuid;

// Integration tests run against a real Postgres; they skip when no database is
// configured. Every test creates its own users and catalog rows, so tests do
// not step on each other and nothing is truncated.

async fn test_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        cart_ttl_days: 7,
        low_stock_threshold: 10,
    };

    Ok(Some(AppState { pool, config }))
}

async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'dummy', $3)")
        .bind(id)
        .bind(format!("{}-{}@example.com", role.as_str(), id))
        .bind(role)
        .execute(&state.pool)
        .await?;
    Ok(AuthUser { user_id: id, role })
}

async fn seed_catalog_pair(state: &AppState) -> anyhow::Result<(Uuid, Uuid)> {
    let model_id = Uuid::new_v4();
    sqlx::query("INSERT INTO phone_models (id, brand, name) VALUES ($1, 'TestBrand', $2)")
        .bind(model_id)
        .bind(format!("Model-{model_id}"))
        .execute(&state.pool)
        .await?;

    let component_id = Uuid::new_v4();
    sqlx::query("INSERT INTO components (id, name) VALUES ($1, $2)")
        .bind(component_id)
        .bind(format!("Component-{component_id}"))
        .execute(&state.pool)
        .await?;

    Ok((model_id, component_id))
}

fn page() -> Pagination {
    Pagination {
        page: Some(1),
        per_page: Some(50),
    }
}

async fn submit_listing(
    state: &AppState,
    vendor: &AuthUser,
    model_id: Uuid,
    component_id: Uuid,
    quantity: i32,
    price: i64,
) -> anyhow::Result<partsmarket_api::models::InventoryListing> {
    let resp = listing_service::submit_or_update(
        state,
        vendor,
        SubmitListingRequest {
            phone_model_id: model_id,
            component_id,
            quantity,
            price,
        },
    )
    .await?;
    Ok(resp.data.unwrap())
}

async fn purchasable_count(
    state: &AppState,
    model_id: Uuid,
    component_id: Uuid,
) -> anyhow::Result<usize> {
    let resp = listing_service::get_purchasable(state, model_id, component_id, page()).await?;
    Ok(resp.data.unwrap().items.len())
}

#[tokio::test]
async fn approval_gates_listing_visibility() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 5, 2000).await?;
    assert_eq!(listing.status, ListingStatus::PendingApproval);
    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 0);

    let approved = admin_service::approve_listing(&state, &admin, listing.id)
        .await?
        .data
        .unwrap();
    assert_eq!(approved.status, ListingStatus::Approved);
    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 1);

    // Second approve must fail and leave the state alone.
    let err = admin_service::approve_listing(&state, &admin, listing.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // A vendor edit reopens review and takes the listing off the market.
    let edited = submit_listing(&state, &vendor, model_id, component_id, 8, 2000).await?;
    assert_eq!(edited.id, listing.id);
    assert_eq!(edited.status, ListingStatus::PendingApproval);
    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn rejection_requires_reason_and_stays_visible_to_vendor() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 5, 99000).await?;

    let err = admin_service::reject_listing(
        &state,
        &admin,
        listing.id,
        RejectListingRequest { reason: "  ".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    admin_service::reject_listing(
        &state,
        &admin,
        listing.id,
        RejectListingRequest {
            reason: "price too high".into(),
        },
    )
    .await?;

    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 0);

    let own = listing_service::list_own(
        &state,
        &vendor,
        ListingListQuery {
            pagination: page(),
            status: Some(ListingStatus::Rejected),
        },
    )
    .await?
    .data
    .unwrap();
    let mine = own
        .items
        .iter()
        .find(|l| l.id == listing.id)
        .expect("rejected listing visible to its vendor");
    assert_eq!(mine.rejection_reason.as_deref(), Some("price too high"));

    Ok(())
}

#[tokio::test]
async fn checkout_rechecks_live_stock_not_cart_snapshot() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 5, 2000).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;

    // Two adds of 3 sum to a single line of 6.
    for _ in 0..2 {
        cart_service::add_to_cart(
            &state,
            &customer,
            AddToCartRequest {
                listing_id: listing.id,
                quantity: 3,
            },
        )
        .await?;
    }
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 6);
    assert_eq!(cart.items[0].price_snapshot, 2000);
    assert!(!cart.items[0].available, "6 requested but only 5 in stock");

    // 6 > 5 available: the live ledger wins over the cart.
    let err = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "12 Sample St".into(),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::UnavailableItem { listing_id, .. } => assert_eq!(listing_id, listing.id),
        other => panic!("expected UnavailableItem, got {other:?}"),
    }

    // Failed checkout left everything untouched.
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 6);
    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 1);

    // Trim the line and retry.
    cart_service::set_quantity(
        &state,
        &customer,
        cart.items[0].id,
        SetQuantityRequest { quantity: 5 },
    )
    .await?;

    let placed = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "12 Sample St".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(placed.order.status, OrderStatus::Confirmed);
    assert_eq!(placed.order.total_amount, 5 * 2000);
    assert_eq!(placed.order.total_items, 5);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].price, 2000);
    assert!(placed.order.order_number.starts_with("ORD-"));

    // Stock is consumed and the cart is gone.
    assert_eq!(purchasable_count(&state, model_id, component_id).await?, 0);
    let err = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "12 Sample St".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    Ok(())
}

#[tokio::test]
async fn set_quantity_zero_removes_and_negative_fails() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 10, 900).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 2,
        },
    )
    .await?;
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    let line_id = cart.items[0].id;

    let err = cart_service::set_quantity(
        &state,
        &customer,
        line_id,
        SetQuantityRequest { quantity: -1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // The failed update left the line alone.
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 2);

    // Zero removes the line outright.
    cart_service::set_quantity(&state, &customer, line_id, SetQuantityRequest { quantity: 0 })
        .await?;
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert!(cart.items.is_empty());

    // The line is gone, so addressing it again is NotFound.
    let err = cart_service::set_quantity(
        &state,
        &customer,
        line_id,
        SetQuantityRequest { quantity: 1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn repeated_adds_cannot_exceed_line_cap() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 5, 700).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 600,
        },
    )
    .await?;

    // A second add that would push the line past the cap is rejected before
    // the database sees it, and the line keeps its old quantity.
    let err = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 600,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 600);

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let buyer_a = create_user(&state, Role::Customer).await?;
    let buyer_b = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 5, 1500).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;

    for buyer in [&buyer_a, &buyer_b] {
        cart_service::add_to_cart(
            &state,
            buyer,
            AddToCartRequest {
                listing_id: listing.id,
                quantity: 3,
            },
        )
        .await?;
    }

    let (res_a, res_b) = tokio::join!(
        order_service::checkout(
            &state,
            &buyer_a,
            CheckoutRequest {
                shipping_address: "A St".into()
            },
        ),
        order_service::checkout(
            &state,
            &buyer_b,
            CheckoutRequest {
                shipping_address: "B St".into()
            },
        ),
    );

    let successes = [&res_a, &res_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of the racing checkouts wins");

    let loser = if res_a.is_err() { res_a } else { res_b };
    match loser.unwrap_err() {
        AppError::UnavailableItem { .. } | AppError::Oversell(_) => {}
        other => panic!("unexpected race failure: {other:?}"),
    }

    // 5 - 3 = 2 left, never negative, never partially consumed.
    let (stock,): (i32,) =
        sqlx::query_as("SELECT quantity FROM inventory_listings WHERE id = $1")
            .bind(listing.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(stock, 2);

    Ok(())
}

#[tokio::test]
async fn cart_expires_after_sliding_ttl() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 10, 800).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 1,
        },
    )
    .await?;

    // Touched 6 days ago: inside the 7-day window, still there.
    sqlx::query(
        "UPDATE cart_items SET touched_at = now() - interval '6 days' WHERE user_id = $1",
    )
    .bind(customer.user_id)
    .execute(&state.pool)
    .await?;
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);

    // Listing the cart does not refresh the window; only mutations do.
    let (touched,): (chrono::DateTime<chrono::Utc>,) =
        sqlx::query_as("SELECT touched_at FROM cart_items WHERE user_id = $1")
            .bind(customer.user_id)
            .fetch_one(&state.pool)
            .await?;
    assert!(touched < chrono::Utc::now() - chrono::Duration::days(5));

    // Past the deadline: the cart reads as empty, not as an error.
    sqlx::query(
        "UPDATE cart_items SET touched_at = now() - interval '8 days' WHERE user_id = $1",
    )
    .bind(customer.user_id)
    .execute(&state.pool)
    .await?;
    let cart = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    Ok(())
}

#[tokio::test]
async fn order_lifecycle_and_cancellation_rules() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let listing = submit_listing(&state, &vendor, model_id, component_id, 10, 1200).await?;
    admin_service::approve_listing(&state, &admin, listing.id).await?;
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 2,
        },
    )
    .await?;
    let placed = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "7 Part Ave".into(),
        },
    )
    .await?
    .data
    .unwrap();

    // Admin walks the order forward.
    let updated = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);

    // Once processing, the buyer can no longer cancel.
    let err = order_service::cancel_order(&state, &customer, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Skipping straight to delivered is illegal.
    let err = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // A fresh confirmed order cancels fine.
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            listing_id: listing.id,
            quantity: 1,
        },
    )
    .await?;
    let second = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "7 Part Ave".into(),
        },
    )
    .await?
    .data
    .unwrap();
    let cancelled = order_service::cancel_order(&state, &customer, second.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // Orders are never deleted; both remain listed.
    let orders = order_service::list_orders(
        &state,
        &customer,
        OrderListQuery {
            pagination: page(),
            status: None,
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(orders.items.len(), 2);

    Ok(())
}

#[tokio::test]
async fn vendor_low_stock_and_role_gates() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let customer = create_user(&state, Role::Customer).await?;
    let (model_a, component_a) = seed_catalog_pair(&state).await?;
    let (model_b, component_b) = seed_catalog_pair(&state).await?;

    let low = submit_listing(&state, &vendor, model_a, component_a, 3, 500).await?;
    let high = submit_listing(&state, &vendor, model_b, component_b, 50, 500).await?;

    let resp = listing_service::list_low_stock(&state, &vendor, None, page())
        .await?
        .data
        .unwrap();
    assert!(resp.items.iter().any(|l| l.id == low.id));
    assert!(!resp.items.iter().any(|l| l.id == high.id));

    // Customers cannot submit listings, vendors cannot shop.
    let err = listing_service::submit_or_update(
        &state,
        &customer,
        SubmitListingRequest {
            phone_model_id: model_a,
            component_id: component_a,
            quantity: 1,
            price: 100,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = cart_service::add_to_cart(
        &state,
        &vendor,
        AddToCartRequest {
            listing_id: low.id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn submission_validation_rules() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };
    let vendor = create_user(&state, Role::Vendor).await?;
    let (model_id, component_id) = seed_catalog_pair(&state).await?;

    let err = listing_service::submit_or_update(
        &state,
        &vendor,
        SubmitListingRequest {
            phone_model_id: model_id,
            component_id,
            quantity: -1,
            price: 100,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = listing_service::submit_or_update(
        &state,
        &vendor,
        SubmitListingRequest {
            phone_model_id: model_id,
            component_id,
            quantity: 1,
            price: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = listing_service::submit_or_update(
        &state,
        &vendor,
        SubmitListingRequest {
            phone_model_id: Uuid::new_v4(),
            component_id,
            quantity: 1,
            price: 100,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Searching an unused pair is fine, just empty.
    let resp =
        listing_service::get_purchasable(&state, model_id, component_id, page()).await?;
    assert!(resp.data.unwrap().items.is_empty());

    Ok(())
}

use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartLineDto, CartView, SetQuantityRequest},
        listings::{
            ListingList, ListingReviewDto, ListingReviewList, PurchasableListingDto,
            PurchasableListingList, RejectListingRequest, SubmitListingRequest,
        },
        orders::{CheckoutRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    models::{
        CartItem, Component, InventoryListing, ListingStatus, Order, OrderItem, OrderStatus,
        PhoneModel, Role, User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, catalog, health, listings, orders, params, vendor},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        catalog::list_models,
        catalog::list_components,
        listings::search_purchasable,
        vendor::submit_listing,
        vendor::list_own_listings,
        vendor::list_low_stock,
        cart::view_cart,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_line,
        cart::clear_cart,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        admin::list_listings,
        admin::approve_listing,
        admin::reject_listing,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Role,
            PhoneModel,
            Component,
            InventoryListing,
            ListingStatus,
            CartItem,
            Order,
            OrderStatus,
            OrderItem,
            SubmitListingRequest,
            RejectListingRequest,
            ListingList,
            ListingReviewDto,
            ListingReviewList,
            PurchasableListingDto,
            PurchasableListingList,
            AddToCartRequest,
            SetQuantityRequest,
            CartLineDto,
            CartView,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::ListingListQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<InventoryListing>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ListingReviewList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Catalog", description = "Phone model and component lookups"),
        (name = "Listings", description = "Buyer-facing listing search"),
        (name = "Vendor", description = "Vendor inventory submissions"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Listing review and order administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

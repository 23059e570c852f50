use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Vendor,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::Customer => "customer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "vendor" => Some(Role::Vendor),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// Review state of a vendor listing. Only the admin moves a listing out of
/// `PendingApproval`; any vendor edit moves it back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        match (self, next) {
            (PendingApproval, Approved) | (PendingApproval, Rejected) => true,
            // A vendor edit reopens review from any state.
            (Approved, PendingApproval) | (Rejected, PendingApproval) => true,
            // No approved <-> rejected shortcut without a fresh review.
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Confirmed, Processing) | (Confirmed, Cancelled) => true,
            (Processing, Shipped) | (Processing, Cancelled) => true,
            (Shipped, Delivered) => true,
            // Delivered and Cancelled are terminal.
            _ => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PhoneModel {
    pub id: Uuid,
    pub brand: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Component {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A vendor's offer of one component for one phone model. At most one active
/// row per (vendor, model, component); prices are minor units (cents).
#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct InventoryListing {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub phone_model_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub status: ListingStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryListing {
    /// Buyers may purchase iff the listing is approved and in stock.
    pub fn is_purchasable(&self) -> bool {
        self.status == ListingStatus::Approved && self.quantity > 0
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub quantity: i32,
    /// Listing price at add-time. Display only; checkout re-derives the price
    /// from the live listing.
    pub price_snapshot: i64,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub total_amount: i64,
    pub total_items: i32,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub listing_id: Uuid,
    pub vendor_id: Uuid,
    pub phone_model_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
    /// Unit price at order time, fixed forever.
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_review_requires_pending() {
        assert!(ListingStatus::PendingApproval.can_transition_to(ListingStatus::Approved));
        assert!(ListingStatus::PendingApproval.can_transition_to(ListingStatus::Rejected));
        assert!(!ListingStatus::Approved.can_transition_to(ListingStatus::Rejected));
        assert!(!ListingStatus::Rejected.can_transition_to(ListingStatus::Approved));
        assert!(!ListingStatus::Approved.can_transition_to(ListingStatus::Approved));
    }

    #[test]
    fn vendor_edit_reopens_review() {
        assert!(ListingStatus::Approved.can_transition_to(ListingStatus::PendingApproval));
        assert!(ListingStatus::Rejected.can_transition_to(ListingStatus::PendingApproval));
    }

    #[test]
    fn order_status_flow() {
        use OrderStatus::*;
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Processing));
    }

    #[test]
    fn purchasable_needs_approval_and_stock() {
        let mut listing = InventoryListing {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            phone_model_id: Uuid::new_v4(),
            component_id: Uuid::new_v4(),
            quantity: 3,
            price: 2000,
            status: ListingStatus::Approved,
            rejection_reason: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(listing.is_purchasable());

        listing.quantity = 0;
        assert!(!listing.is_purchasable());

        listing.quantity = 3;
        listing.status = ListingStatus::PendingApproval;
        assert!(!listing.is_purchasable());
    }
}

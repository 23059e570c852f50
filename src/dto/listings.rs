use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{InventoryListing, ListingStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitListingRequest {
    pub phone_model_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
    /// Unit price in minor units (cents).
    pub price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectListingRequest {
    pub reason: String,
}

/// Buyer-facing view of a purchasable listing, enriched with catalog and
/// vendor display data.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchasableListingDto {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub vendor_email: String,
    pub phone_model_id: Uuid,
    pub brand: String,
    pub model_name: String,
    pub component_id: Uuid,
    pub component_name: String,
    pub quantity: i32,
    pub price: i64,
}

/// Admin review queue entry; includes the vendor so the reviewer knows whose
/// submission it is.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListingReviewDto {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub vendor_email: String,
    pub brand: String,
    pub model_name: String,
    pub component_name: String,
    pub quantity: i32,
    pub price: i64,
    pub status: ListingStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingList {
    pub items: Vec<InventoryListing>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchasableListingList {
    pub items: Vec<PurchasableListingDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingReviewList {
    pub items: Vec<ListingReviewDto>,
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    /// New line quantity; 0 removes the line.
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineDto {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub brand: String,
    pub model_name: String,
    pub component_name: String,
    pub quantity: i32,
    /// Price captured when the line was added. Display only.
    pub price_snapshot: i64,
    /// Current listing price; this is what checkout will charge.
    pub live_price: i64,
    /// False when the listing is no longer approved or lacks the stock to
    /// cover this line. The line is still returned, never silently dropped.
    pub available: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLineDto>,
    pub total_items: i64,
    /// Sum of snapshot prices; advisory until checkout recomputes.
    pub total: i64,
}

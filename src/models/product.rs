use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::{PriceObservation, PriceSeries};

// ---------------------------------------------------------------------------
// ModerationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    #[serde(alias = "accepted")]
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A listed product together with its full price history.
///
/// `price_per_unit` mirrors the price of the most recently appended
/// observation. It is not derived on read; every append path must go
/// through [`record_price`](Self::record_price) (or the store equivalent)
/// to keep the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub image_url: Option<String>,
    pub vendor_id: String,
    pub vendor_name: String,
    pub market_id: String,
    pub market_name: String,
    pub status: ModerationStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_unit: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub price_history: PriceSeries,
}

/// Listing details supplied when a product is created.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub image_url: Option<String>,
    pub vendor_id: String,
    pub vendor_name: String,
    pub market_id: String,
    pub market_name: String,
}

impl Product {
    /// Create a pending product whose history starts with `initial`.
    pub fn new(listing: NewProduct, initial: PriceObservation, created_at: DateTime<Utc>) -> Self {
        let mut price_history = PriceSeries::new();
        price_history.append(initial);
        Self {
            id: listing.id,
            name: listing.name,
            description: listing.description,
            unit: listing.unit,
            image_url: listing.image_url,
            vendor_id: listing.vendor_id,
            vendor_name: listing.vendor_name,
            market_id: listing.market_id,
            market_name: listing.market_name,
            status: ModerationStatus::Pending,
            price_per_unit: initial.price,
            created_at,
            price_history,
        }
    }

    /// Append a new observation and move `price_per_unit` to its price.
    pub fn record_price(&mut self, observation: PriceObservation) {
        self.price_history.append(observation);
        self.price_per_unit = observation.price;
    }
}

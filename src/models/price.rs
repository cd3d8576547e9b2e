use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

// ---------------------------------------------------------------------------
// PriceObservation: Single dated price point
// ---------------------------------------------------------------------------

/// Deserializing goes through [`PriceObservation::new`], so a negative
/// price is rejected wherever it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawObservation")]
pub struct PriceObservation {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Wire shape of a [`PriceObservation`] before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObservation {
    date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
}

impl TryFrom<RawObservation> for PriceObservation {
    type Error = MarketError;

    fn try_from(raw: RawObservation) -> Result<Self> {
        Self::new(raw.date, raw.price)
    }
}

impl PriceObservation {
    /// Create an observation, rejecting negative prices.
    pub fn new(date: NaiveDate, price: Decimal) -> Result<Self> {
        if price < Decimal::ZERO {
            return Err(MarketError::Validation(format!(
                "price must not be negative, got {price}"
            )));
        }
        Ok(Self { date, price })
    }
}

// ---------------------------------------------------------------------------
// PriceSeries: Append-only history for one product
// ---------------------------------------------------------------------------

/// Price history of one product, kept in insertion order.
///
/// Observations are never edited in place; a correction is a new
/// observation. Use [`chronological`](Self::chronological) for any
/// date-ordered computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, observation: PriceObservation) {
        self.observations.push(observation);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations in the order they were recorded.
    pub fn as_recorded(&self) -> &[PriceObservation] {
        &self.observations
    }

    /// The most recently appended observation, regardless of its date.
    pub fn last_recorded(&self) -> Option<&PriceObservation> {
        self.observations.last()
    }

    /// Observations sorted by date ascending.
    ///
    /// The sort is stable: observations sharing a date keep their insertion
    /// order, so the later-recorded one comes last.
    pub fn chronological(&self) -> Vec<PriceObservation> {
        let mut sorted = self.observations.clone();
        sorted.sort_by_key(|o| o.date);
        sorted
    }
}

impl From<Vec<PriceObservation>> for PriceSeries {
    fn from(observations: Vec<PriceObservation>) -> Self {
        Self { observations }
    }
}

impl FromIterator<PriceObservation> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = PriceObservation>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// PriceStats: Aggregated statistics over a series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStats {
    #[serde(with = "rust_decimal::serde::str")]
    pub min_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_price: Decimal,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub data_points: usize,
}

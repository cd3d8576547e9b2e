use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::PriceObservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub direction: TrendDirection,
    /// Percentage change rounded to one decimal place.
    #[serde(with = "rust_decimal::serde::str")]
    pub percent_change: Decimal,
}

impl Trend {
    pub fn flat() -> Self {
        Self {
            direction: TrendDirection::Flat,
            percent_change: Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// ComparisonResult
// ---------------------------------------------------------------------------

/// Price change between the first two observations on or after an anchor date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    series: Vec<PriceObservation>,
    #[serde(with = "rust_decimal::serde::str")]
    pub previous_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub current_price: Decimal,
    pub trend: Trend,
}

impl ComparisonResult {
    pub(crate) fn new(
        series: Vec<PriceObservation>,
        previous_price: Decimal,
        current_price: Decimal,
        trend: Trend,
    ) -> Self {
        Self {
            series,
            previous_price,
            current_price,
            trend,
        }
    }

    /// Observations on or after the anchor date, ascending.
    pub fn series(&self) -> impl Iterator<Item = &PriceObservation> + '_ {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// What a comparison over an anchor date produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ComparisonOutcome {
    /// At least two observations were available.
    Trend(ComparisonResult),
    /// Exactly one observation; shown as "insufficient data", not an error.
    InsufficientData { series: Vec<PriceObservation> },
}

impl ComparisonOutcome {
    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            ComparisonOutcome::Trend(r) => Some(r),
            ComparisonOutcome::InsufficientData { .. } => None,
        }
    }
}

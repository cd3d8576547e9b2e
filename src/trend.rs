//! Pure price-trend computations over a [`PriceSeries`].
//!
//! Nothing here performs I/O. Degenerate but legitimate input (a zero
//! historical price, a single-point comparison) produces an explicit value
//! instead of an error.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{MarketError, Result};
use crate::models::{
    ComparisonOutcome, ComparisonResult, PriceObservation, PriceSeries, PriceStats, Trend,
    TrendDirection,
};

/// Price of the chronologically last observation.
///
/// When several observations share the latest date, the one recorded last
/// wins.
pub fn latest_price(series: &PriceSeries) -> Result<Decimal> {
    series
        .chronological()
        .last()
        .map(|o| o.price)
        .ok_or(MarketError::EmptySeries)
}

/// `((current - previous) / previous) * 100`, rounded to one decimal place.
///
/// A zero `previous` price yields `0` rather than an infinite change.
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    let hundred = Decimal::ONE_HUNDRED;
    match ((current - previous) * hundred).checked_div(previous) {
        Some(pct) => pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
        None => Decimal::ZERO,
    }
}

pub fn trend_direction(delta: Decimal) -> TrendDirection {
    if delta > Decimal::ZERO {
        TrendDirection::Up
    } else if delta < Decimal::ZERO {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// Direction and percentage change from `previous` to `current`.
///
/// The direction follows the raw price delta, so a change too small to
/// show in the rounded percentage still reads as up or down. A zero
/// previous price always reads as flat.
pub fn trend(previous: Decimal, current: Decimal) -> Trend {
    let direction = if previous.is_zero() {
        TrendDirection::Flat
    } else {
        trend_direction(current - previous)
    };
    Trend {
        direction,
        percent_change: percent_change(previous, current),
    }
}

/// Observations dated on or after `anchor`, in ascending date order.
pub fn observations_since(
    series: &PriceSeries,
    anchor: NaiveDate,
) -> impl Iterator<Item = PriceObservation> {
    series
        .chronological()
        .into_iter()
        .filter(move |o| o.date >= anchor)
}

/// Compare prices starting at `anchor`.
///
/// Returns [`MarketError::NoDataForDate`] when no observation is dated on or
/// after the anchor, so callers can tell "no data" apart from a failure.
pub fn compare_at(
    product_id: &str,
    series: &PriceSeries,
    anchor: NaiveDate,
) -> Result<ComparisonOutcome> {
    let slice: Vec<PriceObservation> = observations_since(series, anchor).collect();
    if slice.is_empty() {
        return Err(MarketError::NoDataForDate {
            product_id: product_id.to_string(),
            anchor,
        });
    }
    Ok(summarize_slice(slice))
}

/// Build a comparison from an already-filtered, ascending slice.
///
/// The trend runs from `slice[0]` to `slice[1]`. Fewer than two points
/// produce [`ComparisonOutcome::InsufficientData`].
pub fn summarize_slice(slice: Vec<PriceObservation>) -> ComparisonOutcome {
    match (slice.first(), slice.get(1)) {
        (Some(previous), Some(current)) => {
            let (previous, current) = (previous.price, current.price);
            ComparisonOutcome::Trend(ComparisonResult::new(
                slice,
                previous,
                current,
                trend(previous, current),
            ))
        }
        _ => ComparisonOutcome::InsufficientData { series: slice },
    }
}

/// Min/max/average and date span of a series. `None` when empty.
pub fn price_stats(series: &PriceSeries) -> Option<PriceStats> {
    let sorted = series.chronological();
    let first = sorted.first()?;
    let last = sorted.last()?;

    let mut min = first.price;
    let mut max = first.price;
    let mut sum = Decimal::ZERO;
    for o in &sorted {
        min = min.min(o.price);
        max = max.max(o.price);
        sum += o.price;
    }
    let avg = (sum / Decimal::from(sorted.len()))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Some(PriceStats {
        min_price: min,
        max_price: max,
        avg_price: avg,
        first_date: first.date,
        last_date: last.date,
        data_points: sorted.len(),
    })
}

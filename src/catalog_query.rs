//! Validation of raw catalog input into a [`CatalogFilter`].

use chrono::NaiveDate;

use crate::config;
use crate::error::{MarketError, Result};
use crate::models::{CatalogFilter, CatalogInput, DateRange, SortField, SortOrder};
use crate::pager::CatalogPager;

/// Holds the active catalog filter and turns user input into new ones.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    filter: CatalogFilter,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &CatalogFilter {
        &self.filter
    }

    /// Normalize raw input into a filter without touching any state.
    ///
    /// Empty strings count as absent. Fails with
    /// [`MarketError::Validation`] for unparsable dates, unknown sort keys,
    /// or a start date after the end date.
    pub fn normalize(input: &CatalogInput) -> Result<CatalogFilter> {
        let start = parse_date("start", input.start_date.as_deref())?;
        let end = parse_date("end", input.end_date.as_deref())?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(MarketError::Validation(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }

        let (sort_field, sort_order) = match non_empty(input.sort.as_deref()) {
            Some(key) => parse_sort_key(key)?,
            None => (SortField::default(), SortOrder::default()),
        };

        Ok(CatalogFilter {
            sort_field,
            sort_order,
            date_range: DateRange { start, end },
            search_text: input.search_text.trim().to_string(),
        })
    }

    /// Validate `input` and make it the active filter.
    ///
    /// Every successful normalization moves `pager` back to page 1 because
    /// the old page number refers to a different result set. On failure the
    /// active filter and the pager are left as they were.
    pub fn apply(&mut self, input: &CatalogInput, pager: &mut CatalogPager) -> Result<&CatalogFilter> {
        let filter = Self::normalize(input)?;
        pager.reset_to_first_page();
        self.filter = filter;
        Ok(&self.filter)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(label: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                MarketError::Validation(format!(
                    "{label} date '{raw}' is not a valid YYYY-MM-DD date"
                ))
            }),
    }
}

/// Parse `field:order` (e.g. `pricePerUnit:asc`) or a named alias such as
/// `price_low`. A bare field name sorts descending.
pub fn parse_sort_key(key: &str) -> Result<(SortField, SortOrder)> {
    let aliases = config::sort_key_aliases();
    let canonical: &str = match aliases.get(key) {
        Some(alias) => *alias,
        None => key,
    };

    let (field, order) = match canonical.split_once(':') {
        Some((f, o)) => (f.trim(), Some(o.trim())),
        None => (canonical.trim(), None),
    };

    let field = match field {
        "createdAt" | "created_at" => SortField::CreatedAt,
        "pricePerUnit" | "price_per_unit" => SortField::PricePerUnit,
        other => {
            return Err(MarketError::Validation(format!(
                "unknown sort field '{other}'"
            )))
        }
    };

    let order = match order.map(|o| o.to_ascii_lowercase()).as_deref() {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => {
            return Err(MarketError::Validation(format!(
                "unknown sort order '{other}'"
            )))
        }
    };

    Ok((field, order))
}

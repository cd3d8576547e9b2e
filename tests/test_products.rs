//! Local store integration tests: catalog search, product reads and writes,
//! price history against in-memory sample data.

mod common;

use common::{date, dec, obs};
use localmarket_sdk::{
    trend, CatalogFilter, ComparisonOutcome, DateRange, MarketError, ModerationStatus, NewProduct,
    Product, SortField, SortOrder, TrendDirection,
};

fn filter(text: &str) -> CatalogFilter {
    CatalogFilter {
        search_text: text.to_string(),
        ..Default::default()
    }
}

fn ids(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

#[test]
fn unfiltered_search_is_newest_first() {
    let (market, _tmp) = common::setup_market();

    let page = market
        .products()
        .search(&CatalogFilter::default(), 1, 32)
        .unwrap();
    assert_eq!(page.total, common::PRODUCT_COUNT as u64);
    assert_eq!(page.items.len(), 32);
    assert_eq!(ids(&page.items[..5]), vec!["rye", "tomato", "eggs", "honey", "rice-39"]);
}

#[test]
fn search_items_omit_price_history() {
    let (market, _tmp) = common::setup_market();

    let page = market.products().search(&filter("honey"), 1, 32).unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.items[0].price_history.is_empty());
    assert_eq!(page.items[0].price_per_unit, dec("12.50"));
}

#[test]
fn forty_matches_split_into_two_pages() {
    let (market, _tmp) = common::setup_market();
    let rice = filter("rice");

    let first = market.products().search(&rice, 1, 32).unwrap();
    let second = market.products().search(&rice, 2, 32).unwrap();
    assert_eq!(first.total, 40);
    assert_eq!(first.items.len(), 32);
    assert_eq!(second.total, 40);
    assert_eq!(second.items.len(), 8);

    let third = market.products().search(&rice, 3, 32).unwrap();
    assert!(third.items.is_empty());
}

#[test]
fn search_is_case_insensitive() {
    let (market, _tmp) = common::setup_market();
    assert_eq!(market.products().count(&filter("RICE")).unwrap(), 40);
}

#[test]
fn search_matches_market_name() {
    let (market, _tmp) = common::setup_market();

    let page = market.products().search(&filter("hillside"), 1, 32).unwrap();
    let mut found = ids(&page.items);
    found.sort();
    assert_eq!(found, vec!["eggs", "honey"]);
}

#[test]
fn wildcard_characters_match_literally() {
    let (market, _tmp) = common::setup_market();
    let products = market.products();

    assert_eq!(ids(&products.search(&filter("100%"), 1, 32).unwrap().items), vec!["rye"]);
    assert_eq!(products.count(&filter("%")).unwrap(), 1);
    assert_eq!(products.count(&filter("_")).unwrap(), 0);
}

#[test]
fn date_range_is_inclusive() {
    let (market, _tmp) = common::setup_market();
    let products = market.products();

    let march = CatalogFilter {
        date_range: DateRange {
            start: Some(date("2024-03-01")),
            end: Some(date("2024-03-31")),
        },
        ..Default::default()
    };
    let march_page = products.search(&march, 1, 32).unwrap();
    let mut found = ids(&march_page.items);
    found.sort();
    assert_eq!(found, vec!["eggs", "honey"]);

    let single_day = CatalogFilter {
        date_range: DateRange {
            start: Some(date("2024-01-01")),
            end: Some(date("2024-01-01")),
        },
        ..Default::default()
    };
    assert_eq!(ids(&products.search(&single_day, 1, 32).unwrap().items), vec!["rice-00"]);
}

#[test]
fn open_ended_range_uses_one_bound() {
    let (market, _tmp) = common::setup_market();

    let since_april = CatalogFilter {
        date_range: DateRange {
            start: Some(date("2024-04-01")),
            end: None,
        },
        ..Default::default()
    };
    assert_eq!(market.products().count(&since_april).unwrap(), 2);
}

#[test]
fn price_sort_breaks_ties_by_id() {
    let (market, _tmp) = common::setup_market();

    let cheapest = CatalogFilter {
        sort_field: SortField::PricePerUnit,
        sort_order: SortOrder::Asc,
        ..Default::default()
    };
    let page = market.products().search(&cheapest, 1, 6).unwrap();
    // rice-04 and tomato are both 3.00
    assert_eq!(
        ids(&page.items),
        vec!["rice-00", "rice-01", "rice-02", "rice-03", "rice-04", "tomato"]
    );
}

#[test]
fn price_sort_descending() {
    let (market, _tmp) = common::setup_market();

    let priciest = CatalogFilter {
        sort_field: SortField::PricePerUnit,
        sort_order: SortOrder::Desc,
        ..Default::default()
    };
    let page = market.products().search(&priciest, 1, 2).unwrap();
    assert_eq!(ids(&page.items), vec!["honey", "rice-39"]);
    assert_eq!(page.items[1].price_per_unit, common::rice_price(39));
}

#[test]
fn zero_page_is_rejected() {
    let (market, _tmp) = common::setup_market();

    let err = market
        .products()
        .search(&CatalogFilter::default(), 0, 32)
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

#[test]
fn get_loads_full_product() {
    let (market, _tmp) = common::setup_market();

    let honey = market.products().get("honey").unwrap().unwrap();
    assert_eq!(honey.name, "Wildflower Honey");
    assert_eq!(honey.description.as_deref(), Some("Wildflower Honey from local growers"));
    assert_eq!(honey.image_url.as_deref(), Some("https://img.localmarket.example/honey.jpg"));
    assert_eq!(honey.status, ModerationStatus::Approved);
    assert_eq!(honey.created_at.to_rfc3339(), "2024-03-01T09:30:00+00:00");
    assert_eq!(
        honey.price_history.as_recorded(),
        &[
            obs("2024-03-01", "10.00"),
            obs("2024-03-10", "11.00"),
            obs("2024-03-20", "12.50"),
        ]
    );
}

#[test]
fn get_unknown_id_is_none() {
    let (market, _tmp) = common::setup_market();
    assert!(market.products().get("missing").unwrap().is_none());
}

#[test]
fn back_dated_entry_keeps_recording_order() {
    let (market, _tmp) = common::setup_market();

    let eggs = market.products().get("eggs").unwrap().unwrap();
    assert_eq!(eggs.status, ModerationStatus::Pending);
    assert_eq!(eggs.price_per_unit, dec("6.00"));
    assert_eq!(eggs.price_history.last_recorded(), Some(&obs("2024-03-20", "6.00")));
    // Chronologically the 03-25 observation is still the latest.
    assert_eq!(trend::latest_price(&eggs.price_history).unwrap(), dec("5.40"));
}

// ---------------------------------------------------------------------------
// create / append_price
// ---------------------------------------------------------------------------

fn new_listing(id: &str) -> NewProduct {
    NewProduct {
        id: id.to_string(),
        name: "Black Garlic".to_string(),
        description: Some("Fermented for 40 days".to_string()),
        unit: "bulb".to_string(),
        image_url: None,
        vendor_id: "v-garlic".to_string(),
        vendor_name: "Allium Acres".to_string(),
        market_id: "m-riverside".to_string(),
        market_name: "Riverside Market".to_string(),
    }
}

fn created_at() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc)
}

#[test]
fn created_product_round_trips() {
    let (market, _tmp) = common::setup_market();
    let mut garlic = Product::new(new_listing("garlic"), obs("2024-05-01", "2.40"), created_at());
    garlic.record_price(obs("2024-05-08", "2.60"));

    market.products().create(&garlic).unwrap();

    let stored = market.products().get("garlic").unwrap().unwrap();
    assert_eq!(stored, garlic);
    assert_eq!(
        market.products().count(&CatalogFilter::default()).unwrap(),
        common::PRODUCT_COUNT as u64 + 1
    );
}

#[test]
fn created_at_keeps_sub_second_precision() {
    let (market, _tmp) = common::setup_market();
    let stamp = created_at() + chrono::Duration::microseconds(250_125);
    let garlic = Product::new(new_listing("garlic"), obs("2024-05-01", "2.40"), stamp);

    market.products().create(&garlic).unwrap();

    let stored = market.products().get("garlic").unwrap().unwrap();
    assert_eq!(stored.created_at, stamp);
    assert_eq!(stored.created_at.to_rfc3339(), "2024-05-01T12:00:00.250125+00:00");
}

#[test]
fn create_rejects_stale_price_per_unit() {
    let (market, _tmp) = common::setup_market();
    let mut garlic = Product::new(new_listing("garlic"), obs("2024-05-01", "2.40"), created_at());
    garlic.price_per_unit = dec("9.99");

    let err = market.products().create(&garlic).unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    assert!(market.products().get("garlic").unwrap().is_none());
}

#[test]
fn create_duplicate_id_fails_without_partial_rows() {
    let (market, _tmp) = common::setup_market();
    let mut dup = Product::new(new_listing("honey"), obs("2024-05-01", "1.00"), created_at());
    dup.name = "Duplicate".to_string();

    assert!(market.products().create(&dup).is_err());
    assert_eq!(market.prices().count("honey").unwrap(), 3);
}

#[test]
fn append_price_moves_price_per_unit() {
    let (market, _tmp) = common::setup_market();

    let honey = market
        .products()
        .append_price("honey", obs("2024-04-01", "13.00"))
        .unwrap();
    assert_eq!(honey.price_per_unit, dec("13.00"));
    assert_eq!(honey.price_history.len(), 4);
    assert_eq!(trend::latest_price(&honey.price_history).unwrap(), dec("13.00"));
}

#[test]
fn back_dated_append_still_sets_price_per_unit() {
    let (market, _tmp) = common::setup_market();

    let honey = market
        .products()
        .append_price("honey", obs("2024-03-05", "9.00"))
        .unwrap();
    assert_eq!(honey.price_per_unit, dec("9.00"));
    assert_eq!(honey.price_history.last_recorded(), Some(&obs("2024-03-05", "9.00")));
    assert_eq!(trend::latest_price(&honey.price_history).unwrap(), dec("12.50"));
}

#[test]
fn append_price_to_unknown_product_writes_nothing() {
    let (market, _tmp) = common::setup_market();

    let err = market
        .products()
        .append_price("missing", obs("2024-04-01", "1.00"))
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound(_)));
    assert_eq!(market.prices().count("missing").unwrap(), 0);
}

// ---------------------------------------------------------------------------
// cheapest_in_market / markets
// ---------------------------------------------------------------------------

#[test]
fn cheapest_in_market_orders_by_price() {
    let (market, _tmp) = common::setup_market();

    let cheapest = market
        .products()
        .cheapest_in_market("m-riverside", None, 3)
        .unwrap();
    assert_eq!(ids(&cheapest), vec!["rice-00", "rice-01", "rice-02"]);
}

#[test]
fn cheapest_in_market_skips_unapproved() {
    let (market, _tmp) = common::setup_market();

    let hillside = market
        .products()
        .cheapest_in_market("m-hillside", None, 10)
        .unwrap();
    assert_eq!(ids(&hillside), vec!["honey"]);
}

#[test]
fn cheapest_in_market_narrows_by_text() {
    let (market, _tmp) = common::setup_market();

    let bread = market
        .products()
        .cheapest_in_market("m-riverside", Some(" bread "), 5)
        .unwrap();
    assert_eq!(ids(&bread), vec!["rye"]);
}

#[test]
fn markets_are_listed_by_name() {
    let (market, _tmp) = common::setup_market();

    assert_eq!(
        market.products().markets().unwrap(),
        vec![
            ("m-hillside".to_string(), "Hillside Farmers Market".to_string()),
            ("m-riverside".to_string(), "Riverside Market".to_string()),
        ]
    );
}

// ---------------------------------------------------------------------------
// prices
// ---------------------------------------------------------------------------

#[test]
fn history_filters_by_date() {
    let (market, _tmp) = common::setup_market();

    let since = market
        .prices()
        .history("honey", Some(date("2024-03-05")), None)
        .unwrap();
    assert_eq!(since.as_recorded(), &[obs("2024-03-10", "11.00"), obs("2024-03-20", "12.50")]);

    let until = market
        .prices()
        .history("honey", None, Some(date("2024-03-10")))
        .unwrap();
    assert_eq!(until.len(), 2);
}

#[test]
fn compare_returns_ascending_slice() {
    let (market, _tmp) = common::setup_market();

    let slice = market.prices().compare("eggs", date("2024-03-01")).unwrap();
    assert_eq!(slice, vec![obs("2024-03-20", "6.00"), obs("2024-03-25", "5.40")]);
}

#[test]
fn compare_after_last_observation_is_no_data() {
    let (market, _tmp) = common::setup_market();

    let err = market
        .prices()
        .compare("honey", date("2024-03-21"))
        .unwrap_err();
    match err {
        MarketError::NoDataForDate { product_id, anchor } => {
            assert_eq!(product_id, "honey");
            assert_eq!(anchor, date("2024-03-21"));
        }
        other => panic!("expected NoDataForDate, got {other:?}"),
    }
}

#[test]
fn compare_at_reports_trend_from_anchor() {
    let (market, _tmp) = common::setup_market();

    let outcome = market.prices().compare_at("honey", date("2024-03-02")).unwrap();
    let result = outcome.result().unwrap();
    assert_eq!(result.previous_price, dec("11.00"));
    assert_eq!(result.current_price, dec("12.50"));
    assert_eq!(result.trend.direction, TrendDirection::Up);
    assert_eq!(result.trend.percent_change, dec("13.6"));
}

#[test]
fn single_observation_is_insufficient() {
    let (market, _tmp) = common::setup_market();

    let outcome = market.prices().compare_at("tomato", date("2024-01-01")).unwrap();
    assert_eq!(
        outcome,
        ComparisonOutcome::InsufficientData {
            series: vec![obs("2024-04-01", "3.00")]
        }
    );
}

#[test]
fn price_stats_over_history() {
    let (market, _tmp) = common::setup_market();

    let stats = market.prices().price_stats("honey").unwrap().unwrap();
    assert_eq!(stats.min_price, dec("10.00"));
    assert_eq!(stats.max_price, dec("12.50"));
    assert_eq!(stats.avg_price, dec("11.17"));
    assert_eq!(stats.first_date, date("2024-03-01"));
    assert_eq!(stats.last_date, date("2024-03-20"));
    assert_eq!(stats.data_points, 3);

    assert!(market.prices().price_stats("missing").unwrap().is_none());
}

// ---------------------------------------------------------------------------
// LocalMarket
// ---------------------------------------------------------------------------

#[test]
fn display_lists_loaded_tables() {
    let (market, _tmp) = common::setup_market();

    let shown = market.to_string();
    assert!(shown.starts_with("LocalMarket(cache_dir="));
    assert!(shown.contains("tables=[price_observations, products]"));
    assert!(shown.contains("offline=true"));
}

#[test]
fn empty_store_accepts_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let market = localmarket_sdk::LocalMarket::builder()
        .cache_dir(tmp.path())
        .offline(true)
        .seed_from_snapshot(false)
        .build()
        .unwrap();

    assert_eq!(market.products().count(&CatalogFilter::default()).unwrap(), 0);
    let garlic = Product::new(new_listing("garlic"), obs("2024-05-01", "2.40"), created_at());
    market.products().create(&garlic).unwrap();
    assert_eq!(market.products().count(&CatalogFilter::default()).unwrap(), 1);
}

#[test]
fn refresh_offline_without_version_is_stale() {
    let (market, _tmp) = common::setup_market();

    // No version.txt was ever written, so the local copy counts as stale
    // and the tables are reset for re-import.
    assert!(market.refresh().unwrap());
    assert!(market.loaded_tables().is_empty());
}

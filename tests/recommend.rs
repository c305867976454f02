mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{catalog, record, CENTER};
use festa::{Category, Location, StatusStage};
use serde_json::json;

/// 2025-08-02 19:00 in Tokyo.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 2, 10, 0, 0).unwrap()
}

fn center() -> Location {
    Location::new(CENTER.0, CENTER.1)
}

fn event(
    key: &str,
    category: &str,
    lat: f64,
    lng: f64,
    heat: i32,
    window: serde_json::Value,
) -> festa::EncodedRecordItem {
    let mut value = json!({
        "category": category,
        "primaryKey": key,
        "scaleScore": 50,
        "heatScore": heat,
        "rawFields": {"name": key, "lat": lat, "lng": lng}
    });
    if let (Some(target), Some(fields)) = (value.as_object_mut(), window.as_object()) {
        target.extend(fields.clone());
    }
    record(value)
}

#[test]
fn test_ongoing_beats_hotter_event_starting_soon() {
    let catalog = catalog(vec![
        event(
            "ongoing",
            "hanabi",
            CENTER.0,
            CENTER.1,
            80,
            json!({
                "normalizedStartDate": "2025-08-02", "normalizedStartTime": "18:30",
                "normalizedEndDate": "2025-08-02", "normalizedEndTime": "20:30"
            }),
        ),
        event(
            "soon",
            "hanabi",
            CENTER.0,
            CENTER.1,
            95,
            json!({"normalizedStartDate": "2025-08-02", "normalizedStartTime": "19:30"}),
        ),
    ]);

    let best = catalog.top_pick(center(), now()).unwrap();
    assert_eq!(best.id, "ongoing");

    let ranked = catalog.recommend(center(), now(), 2, 1_000.0, 10);
    assert_eq!(ranked[0].1.stage, StatusStage::Ongoing);
    assert_eq!(ranked[0].1.time, 1.0);
    assert_eq!(ranked[1].1.stage, StatusStage::Upcoming);
    assert_eq!(ranked[1].1.time, 0.8);
}

#[test]
fn test_sooner_event_beats_slightly_closer_distant_date() {
    let catalog = catalog(vec![
        event(
            "in-75-days",
            "hanabi",
            35.6722,
            139.7671,
            50,
            json!({"normalizedStartDate": "2025-10-16", "normalizedStartTime": "19:00"}),
        ),
        event(
            "in-20-hours",
            "hanabi",
            35.6920,
            139.7671,
            50,
            json!({"normalizedStartDate": "2025-08-03", "normalizedStartTime": "15:00"}),
        ),
    ]);

    let ranked = catalog.ranked_nearby(center(), now(), 10);
    let ids: Vec<_> = ranked.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["in-20-hours", "in-75-days"]);
    assert!(ranked[0].distance_meters > ranked[1].distance_meters);
}

#[test]
fn test_category_weight_and_geo_penalty_shape_order() {
    let undated = json!({});
    let mut coarse = event("coarse-hanabi", "hanabi", CENTER.0, CENTER.1, 50, undated.clone());
    coarse
        .raw_fields
        .insert("coordSource".into(), json!("prefecture_centroid"));

    let catalog = catalog(vec![
        event("nature", "nature", CENTER.0, CENTER.1, 50, undated.clone()),
        event("matsuri", "matsuri", CENTER.0, CENTER.1, 50, undated.clone()),
        event("hanabi", "hanabi", CENTER.0, CENTER.1, 50, undated),
        coarse,
    ]);

    let ranked = catalog.recommend(center(), now(), 10, 1_000.0, 10);
    let ids: Vec<_> = ranked.iter().map(|(p, _)| p.id.as_str()).collect();
    // 1.2 > 1.2·0.85 = 1.02 > 1.0 > 0.8
    assert_eq!(ids, ["hanabi", "coarse-hanabi", "matsuri", "nature"]);
    assert_eq!(ranked[0].0.category, Category::Hanabi);
    assert_eq!(ranked[1].1.geo_penalty, 0.85);
}

#[test]
fn test_ranking_is_deterministic_across_input_order() {
    let window = json!({"normalizedStartDate": "2025-08-10"});
    let records = vec![
        event("b", "matsuri", 35.6830, 139.7671, 40, window.clone()),
        event("a", "matsuri", 35.6830, 139.7671, 40, window.clone()),
        event("c", "matsuri", 35.6794, 139.7671, 40, window),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let first: Vec<_> = catalog(records)
        .ranked_nearby(center(), now(), 10)
        .into_iter()
        .map(|p| p.id)
        .collect();
    let second: Vec<_> = catalog(reversed)
        .ranked_nearby(center(), now(), 10)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_ended_and_unknown_sink_below_upcoming() {
    let catalog = catalog(vec![
        event(
            "ended",
            "matsuri",
            CENTER.0,
            CENTER.1,
            100,
            json!({"normalizedStartDate": "2025-08-01", "normalizedStartTime": "18:00"}),
        ),
        event("unknown", "matsuri", CENTER.0, CENTER.1, 100, json!({})),
        event(
            "next-week",
            "matsuri",
            CENTER.0,
            CENTER.1,
            100,
            json!({"normalizedStartDate": "2025-08-09", "normalizedStartTime": "18:00"}),
        ),
    ]);
    let ids: Vec<_> = catalog
        .ranked_nearby(center(), now(), 10)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, ["next-week", "unknown", "ended"]);
}

#[test]
fn test_global_catalog_round_trip() {
    let built = common::build(vec![event(
        "global",
        "hanabi",
        CENTER.0,
        CENTER.1,
        60,
        json!({"normalizedStartDate": "2025-08-02", "normalizedStartTime": "19:30"}),
    )]);
    let sources = festa::CatalogSources::new(built.envelope_json().unwrap(), built.payload);
    assert!(festa::init(sources, festa::CatalogConfig::new(common::SEED)));

    assert_eq!(festa::search(center(), 1_000.0, 5).len(), 1);
    assert_eq!(festa::top_pick(center(), now()).unwrap().id, "global");
    assert_eq!(festa::ranked_nearby(center(), now(), 5).len(), 1);
}

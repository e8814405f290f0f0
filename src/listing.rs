use crate::types::{keys, ListingEntry};
use geojson::{Feature, Value};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Builds the sidebar listing from the features the backend currently has on
/// screen. The same point can come back more than once (tile boundaries,
/// overlapping clusters), so entries are deduplicated on a composite
/// coordinates-plus-title key; the first occurrence wins and input order is
/// preserved. Features without a title are left out entirely.
pub fn visible_listing(rendered: &[Feature]) -> Vec<ListingEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for feature in rendered {
        let Some(title) = feature.property(keys::TITLE).and_then(JsonValue::as_str) else {
            continue;
        };
        let Some(coordinates) = point_coordinates(feature) else {
            continue;
        };
        let key = format!("{},{}-{}", coordinates[0], coordinates[1], title);
        if !seen.insert(key) {
            continue;
        }
        entries.push(ListingEntry {
            title: title.to_string(),
            coordinates,
            description: string_property(feature, keys::DESCRIPTION),
            website_url: string_property(feature, keys::WEBSITE_URL),
        });
    }

    entries
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(JsonValue::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Point coordinates of a feature, or `None` for missing or non-point
/// geometry.
pub fn point_coordinates(feature: &Feature) -> Option<[f64; 2]> {
    match feature.geometry.as_ref().map(|geometry| &geometry.value) {
        Some(Value::Point(position)) if position.len() >= 2 => Some([position[0], position[1]]),
        _ => None,
    }
}

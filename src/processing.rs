use crate::types::{keys, CompactFeature, FocusArea, FundedStatus, TagCategory, TagValue};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

/// Expands compact records into map-ready GeoJSON features. Order-preserving;
/// one output feature per input record.
pub fn decompress(records: &[CompactFeature]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().map(decompress_one).collect(),
        foreign_members: None,
    }
}

fn decompress_one(record: &CompactFeature) -> Feature {
    let mut properties = Map::new();
    properties.insert(keys::TITLE.into(), JsonValue::String(record.title.clone()));
    if let Some(description) = non_empty(&record.description) {
        properties.insert(keys::DESCRIPTION.into(), JsonValue::String(description.into()));
    }
    if let Some(url) = non_empty(&record.website_url) {
        properties.insert(keys::WEBSITE_URL.into(), JsonValue::String(url.into()));
    }
    if let Some(area) = record.focus_area {
        properties.insert(keys::FOCUS_AREA.into(), JsonValue::String(area.as_str().into()));
    }
    if let Some(status) = record.funded_status {
        properties.insert(
            keys::FUNDED_STATUS.into(),
            JsonValue::String(status.as_str().into()),
        );
    }
    // Every new optional field on CompactFeature needs a matching insert here,
    // or the field is silently dropped from the map data.

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(record.coordinates.to_vec()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Absent and empty optional fields must not leak into feature properties.
fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// The set of currently enabled tag values per category. Seeded from the
/// enums, never from the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    focus_areas: HashSet<FocusArea>,
    funded_statuses: HashSet<FundedStatus>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl FilterState {
    pub fn all_enabled() -> Self {
        Self {
            focus_areas: FocusArea::ALL.into_iter().collect(),
            funded_statuses: FundedStatus::ALL.into_iter().collect(),
        }
    }

    pub fn set_enabled(&mut self, value: TagValue, enabled: bool) {
        match value {
            TagValue::FocusArea(area) => {
                if enabled {
                    self.focus_areas.insert(area);
                } else {
                    self.focus_areas.remove(&area);
                }
            }
            TagValue::FundedStatus(status) => {
                if enabled {
                    self.funded_statuses.insert(status);
                } else {
                    self.funded_statuses.remove(&status);
                }
            }
        }
    }

    pub fn is_enabled(&self, value: TagValue) -> bool {
        match value {
            TagValue::FocusArea(area) => self.focus_areas.contains(&area),
            TagValue::FundedStatus(status) => self.funded_statuses.contains(&status),
        }
    }

    /// Disables every value of one category.
    pub fn clear(&mut self, category: TagCategory) {
        match category {
            TagCategory::FocusArea => self.focus_areas.clear(),
            TagCategory::FundedStatus => self.funded_statuses.clear(),
        }
    }

    /// A feature matches when every category either finds no property on the
    /// feature (absence is filter-transparent) or finds a value in the
    /// category's enabled set. A tag string outside the closed enums can
    /// never be enabled.
    pub fn matches(&self, feature: &Feature) -> bool {
        let focus_ok = match feature.property(keys::FOCUS_AREA) {
            None => true,
            Some(value) => value
                .as_str()
                .and_then(FocusArea::parse)
                .is_some_and(|area| self.focus_areas.contains(&area)),
        };
        let funded_ok = match feature.property(keys::FUNDED_STATUS) {
            None => true,
            Some(value) => value
                .as_str()
                .and_then(FundedStatus::parse)
                .is_some_and(|status| self.funded_statuses.contains(&status)),
        };
        focus_ok && funded_ok
    }

    /// Checkbox groups for the filter navbar, one per category, in a fixed
    /// declaration order.
    pub fn groups(&self) -> Vec<FilterGroup> {
        TagCategory::ALL
            .into_iter()
            .map(|category| {
                let options = match category {
                    TagCategory::FocusArea => FocusArea::ALL
                        .into_iter()
                        .map(TagValue::FocusArea)
                        .collect::<Vec<_>>(),
                    TagCategory::FundedStatus => FundedStatus::ALL
                        .into_iter()
                        .map(TagValue::FundedStatus)
                        .collect(),
                };
                FilterGroup {
                    category,
                    options: options
                        .into_iter()
                        .map(|value| FilterOption {
                            value,
                            enabled: self.is_enabled(value),
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

/// One checkbox group of the filter navbar.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    pub category: TagCategory,
    pub options: Vec<FilterOption>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOption {
    pub value: TagValue,
    pub enabled: bool,
}

/// Recomputes the subset of `collection` matching `filter`, preserving input
/// order. The caller swaps the result into the rendering source wholesale.
pub fn visible_features(collection: &FeatureCollection, filter: &FilterState) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: collection
            .features
            .iter()
            .filter(|feature| filter.matches(feature))
            .cloned()
            .collect(),
        foreign_members: None,
    }
}

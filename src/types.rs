use serde::{Deserialize, Serialize};
use std::fmt;

/// Property keys used on decompressed GeoJSON features.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const WEBSITE_URL: &str = "websiteURL";
    pub const FOCUS_AREA: &str = "focusArea";
    pub const FUNDED_STATUS: &str = "fundedStatus";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusArea {
    Environment,
    Health,
    Community,
    Education,
}

impl FocusArea {
    pub const ALL: [FocusArea; 4] = [
        FocusArea::Environment,
        FocusArea::Health,
        FocusArea::Community,
        FocusArea::Education,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FocusArea::Environment => "ENVIRONMENT",
            FocusArea::Health => "HEALTH",
            FocusArea::Community => "COMMUNITY",
            FocusArea::Education => "EDUCATION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.as_str() == value)
    }
}

impl fmt::Display for FocusArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundedStatus {
    Incubator,
    Pitched,
    Funded,
}

impl FundedStatus {
    pub const ALL: [FundedStatus; 3] = [
        FundedStatus::Incubator,
        FundedStatus::Pitched,
        FundedStatus::Funded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FundedStatus::Incubator => "INCUBATOR",
            FundedStatus::Pitched => "PITCHED",
            FundedStatus::Funded => "FUNDED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for FundedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two classification axes features can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    FocusArea,
    FundedStatus,
}

impl TagCategory {
    pub const ALL: [TagCategory; 2] = [TagCategory::FocusArea, TagCategory::FundedStatus];

    /// The GeoJSON property key this category filters on.
    pub fn key(self) -> &'static str {
        match self {
            TagCategory::FocusArea => keys::FOCUS_AREA,
            TagCategory::FundedStatus => keys::FUNDED_STATUS,
        }
    }
}

/// A single tag value, carrying its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagValue {
    FocusArea(FocusArea),
    FundedStatus(FundedStatus),
}

impl TagValue {
    pub fn category(self) -> TagCategory {
        match self {
            TagValue::FocusArea(_) => TagCategory::FocusArea,
            TagValue::FundedStatus(_) => TagCategory::FundedStatus,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagValue::FocusArea(area) => area.as_str(),
            TagValue::FundedStatus(status) => status.as_str(),
        }
    }
}

/// A hand-authored point-of-interest record, before decompression into
/// GeoJSON. Only `title` and `coordinates` are required; `coordinates` is
/// `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactFeature {
    pub title: String,
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "websiteURL", skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, alias = "focusArea", skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<FocusArea>,
    #[serde(default, alias = "fundedStatus", skip_serializing_if = "Option::is_none")]
    pub funded_status: Option<FundedStatus>,
}

/// One row of the visible-feature listing. Carries the popup fields so
/// activating an entry needs no second feature lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub title: String,
    pub coordinates: [f64; 2],
    pub description: Option<String>,
    pub website_url: Option<String>,
}

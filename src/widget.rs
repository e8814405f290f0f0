use crate::config::{MapConfig, OverlayConfig};
use crate::listing;
use crate::processing::{self, FilterGroup, FilterState};
use crate::types::{keys, FocusArea, ListingEntry, TagValue};
use anyhow::Result;
use geojson::{Feature, FeatureCollection};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

pub const PLACES_SOURCE: &str = "places";
pub const CLUSTER_LAYER: &str = "clusters";
pub const CLUSTER_COUNT_LAYER: &str = "cluster-count";
pub const POINT_LAYER: &str = "unclustered-point";

/// Delay between a bulk data swap and the listing refresh that reads the
/// re-rendered features back; the backend's cluster geometry needs a beat to
/// settle.
pub const DATA_SETTLE_DELAY: Duration = Duration::from_millis(20);
/// Delay between move-end and the listing refresh, for the same reason.
pub const VIEWPORT_SETTLE_DELAY: Duration = Duration::from_millis(10);
/// Viewport animation length when navigating from a listing entry.
pub const LISTING_EASE_DURATION: Duration = Duration::from_millis(1000);
/// Viewport animation length when expanding a cluster.
pub const CLUSTER_EASE_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupId(pub u64);

/// A popup anchored at a coordinate, with pre-rendered HTML content.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub coordinates: [f64; 2],
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Pointer,
}

/// Work the controller asks the backend to run after a settle delay. The
/// deferral is fire-and-forget: a superseding event does not cancel it, it
/// just causes one extra idempotent refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredEvent {
    RefreshListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    pub radius: u32,
    pub max_zoom: u8,
}

/// Everything that can happen to the widget. The host translates library
/// callbacks into these and feeds them to [`WidgetController::handle`] on a
/// single thread.
#[derive(Debug, Clone)]
pub enum MapEvent {
    Loaded,
    FilterToggled { value: TagValue, enabled: bool },
    PointClicked(Feature),
    ClusterClicked { cluster_id: u64, coordinates: [f64; 2] },
    ListingActivated(usize),
    PointerEntered,
    PointerLeft,
    MoveStarted,
    MoveEnded,
    Deferred(DeferredEvent),
}

/// The rendering capability. Layer specs are style-spec JSON fragments so
/// backends can hand them to the mapping library untouched.
pub trait MapBackend {
    fn add_clustered_source(
        &mut self,
        id: &str,
        data: &FeatureCollection,
        cluster: ClusterConfig,
    ) -> Result<()>;
    /// Replaces the source's data wholesale. No incremental diff.
    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> Result<()>;
    /// Re-triggers clustering after a bulk swap; clustering is stateful in
    /// the backend and does not recompute on its own.
    fn configure_clustering(&mut self, id: &str, cluster: ClusterConfig) -> Result<()>;
    fn add_url_source(&mut self, id: &str, url: &str) -> Result<()>;
    fn add_layer(&mut self, layer: JsonValue) -> Result<()>;
    /// Features currently rendered on screen for the given layer.
    fn query_rendered_features(&self, layer: &str) -> Result<Vec<Feature>>;
    fn ease_to(&mut self, center: [f64; 2], zoom: Option<f64>, duration: Duration);
    fn open_popup(&mut self, popup: Popup) -> PopupId;
    fn close_popup(&mut self, id: PopupId);
    fn set_cursor(&mut self, cursor: Cursor);
    fn cluster_expansion_zoom(&self, source: &str, cluster_id: u64) -> Result<f64>;
    /// Schedules `event` to come back as [`MapEvent::Deferred`] after the
    /// given delay.
    fn schedule(&mut self, after: Duration, event: DeferredEvent);
}

/// The UI collaborator: the checkbox navbar and the feature listing.
/// Implementations must fail with a "missing required UI element" error when
/// a container is absent, not dereference a null.
pub trait UiSurface {
    fn render_filter_controls(&mut self, groups: &[FilterGroup]) -> Result<()>;
    fn render_listing(&mut self, entries: &[ListingEntry]) -> Result<()>;
    fn clear_listing(&mut self);
}

/// Owns the widget state (filter set, decompressed snapshot, listing, open
/// popups) and drives both collaborators. All mutation happens inside
/// [`handle`](Self::handle); the pure recomputation lives in `processing`
/// and `listing`.
pub struct WidgetController<B: MapBackend, U: UiSurface> {
    backend: B,
    ui: U,
    config: MapConfig,
    overlays: Vec<OverlayConfig>,
    features: FeatureCollection,
    filter: FilterState,
    listing: Vec<ListingEntry>,
    popups: Vec<PopupId>,
}

impl<B: MapBackend, U: UiSurface> WidgetController<B, U> {
    pub fn new(
        backend: B,
        ui: U,
        config: MapConfig,
        overlays: Vec<OverlayConfig>,
        features: FeatureCollection,
    ) -> Self {
        Self {
            backend,
            ui,
            config,
            overlays,
            features,
            filter: FilterState::all_enabled(),
            listing: Vec::new(),
            popups: Vec::new(),
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn listing(&self) -> &[ListingEntry] {
        &self.listing
    }

    pub fn handle(&mut self, event: MapEvent) -> Result<()> {
        match event {
            MapEvent::Loaded => self.install(),
            MapEvent::FilterToggled { value, enabled } => self.apply_filter_toggle(value, enabled),
            MapEvent::PointClicked(feature) => {
                self.open_feature_popup(&feature);
                Ok(())
            }
            MapEvent::ClusterClicked {
                cluster_id,
                coordinates,
            } => {
                self.expand_cluster(cluster_id, coordinates);
                Ok(())
            }
            MapEvent::ListingActivated(index) => self.activate_listing_entry(index),
            MapEvent::PointerEntered => {
                self.backend.set_cursor(Cursor::Pointer);
                Ok(())
            }
            MapEvent::PointerLeft => {
                self.backend.set_cursor(Cursor::Default);
                Ok(())
            }
            MapEvent::MoveStarted => {
                // No listing while the viewport is in motion.
                self.listing.clear();
                self.ui.clear_listing();
                Ok(())
            }
            MapEvent::MoveEnded => {
                self.backend.schedule(VIEWPORT_SETTLE_DELAY, DeferredEvent::RefreshListing);
                Ok(())
            }
            MapEvent::Deferred(DeferredEvent::RefreshListing) => self.refresh_listing(),
        }
    }

    fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            radius: self.config.cluster_radius,
            max_zoom: self.config.cluster_max_zoom,
        }
    }

    fn install(&mut self) -> Result<()> {
        for overlay in &self.overlays {
            self.backend.add_url_source(&overlay.name, &overlay.url)?;
            self.backend.add_layer(overlay_fill_layer(overlay))?;
            if let Some(line) = overlay_line_layer(overlay) {
                self.backend.add_layer(line)?;
            }
        }

        self.backend
            .add_clustered_source(PLACES_SOURCE, &self.features, self.cluster_config())?;
        self.backend.add_layer(cluster_layer())?;
        self.backend.add_layer(cluster_count_layer())?;
        self.backend.add_layer(point_layer(&self.config))?;

        self.ui.render_filter_controls(&self.filter.groups())
    }

    fn apply_filter_toggle(&mut self, value: TagValue, enabled: bool) -> Result<()> {
        self.filter.set_enabled(value, enabled);
        let visible = processing::visible_features(&self.features, &self.filter);
        self.backend.set_source_data(PLACES_SOURCE, &visible)?;
        self.backend
            .configure_clustering(PLACES_SOURCE, self.cluster_config())?;
        self.backend.schedule(DATA_SETTLE_DELAY, DeferredEvent::RefreshListing);
        Ok(())
    }

    fn refresh_listing(&mut self) -> Result<()> {
        let rendered = match self.backend.query_rendered_features(POINT_LAYER) {
            Ok(rendered) => rendered,
            Err(error) => {
                // Best-effort: a failed query aborts this refresh only.
                tracing::warn!("rendered-feature query failed: {error:#}");
                return Ok(());
            }
        };
        self.listing = listing::visible_listing(&rendered);
        self.ui.render_listing(&self.listing)
    }

    fn activate_listing_entry(&mut self, index: usize) -> Result<()> {
        let Some(entry) = self.listing.get(index).cloned() else {
            return Ok(());
        };
        self.backend
            .ease_to(entry.coordinates, None, LISTING_EASE_DURATION);
        self.close_all_popups();
        let id = self.backend.open_popup(Popup {
            coordinates: entry.coordinates,
            html: popup_html(
                &entry.title,
                entry.description.as_deref(),
                entry.website_url.as_deref(),
            ),
        });
        self.popups.push(id);
        Ok(())
    }

    fn open_feature_popup(&mut self, feature: &Feature) {
        let Some(title) = feature
            .property(keys::TITLE)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
        else {
            return;
        };
        let Some(coordinates) = listing::point_coordinates(feature) else {
            return;
        };
        let description = feature
            .property(keys::DESCRIPTION)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let website_url = feature
            .property(keys::WEBSITE_URL)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let id = self.backend.open_popup(Popup {
            coordinates,
            html: popup_html(&title, description.as_deref(), website_url.as_deref()),
        });
        self.popups.push(id);
    }

    fn expand_cluster(&mut self, cluster_id: u64, coordinates: [f64; 2]) {
        match self.backend.cluster_expansion_zoom(PLACES_SOURCE, cluster_id) {
            Ok(zoom) => self
                .backend
                .ease_to(coordinates, Some(zoom), CLUSTER_EASE_DURATION),
            Err(error) => {
                tracing::warn!("cluster expansion lookup failed: {error:#}");
            }
        }
    }

    /// Drained in full before a listing-driven popup opens.
    fn close_all_popups(&mut self) {
        for id in self.popups.drain(..) {
            self.backend.close_popup(id);
        }
    }
}

/// Cluster circles, color and radius stepped on the point count.
fn cluster_layer() -> JsonValue {
    json!({
        "id": CLUSTER_LAYER,
        "type": "circle",
        "source": PLACES_SOURCE,
        "filter": ["has", "point_count"],
        "paint": {
            "circle-color": [
                "step", ["get", "point_count"],
                "#51bbd6", 10, "#f1f075", 20, "#f28cb1"
            ],
            "circle-radius": [
                "step", ["get", "point_count"],
                20, 5, 25, 10, 30, 15, 35, 20, 40, 25, 45
            ]
        }
    })
}

fn cluster_count_layer() -> JsonValue {
    json!({
        "id": CLUSTER_COUNT_LAYER,
        "type": "symbol",
        "source": PLACES_SOURCE,
        "filter": ["has", "point_count"],
        "layout": {
            "text-field": ["get", "point_count_abbreviated"],
            "text-font": ["DIN Offc Pro Medium", "Arial Unicode MS Bold"],
            "text-size": 12
        }
    })
}

/// Unclustered points, colored by focus area from the configured palette.
fn point_layer(config: &MapConfig) -> JsonValue {
    let mut branches: Vec<JsonValue> = Vec::new();
    for area in FocusArea::ALL {
        if let Some(hex) = config.focus_colors.get(area.as_str()) {
            branches.push(json!(area.as_str()));
            branches.push(json!(hex));
        }
    }

    let circle_color = if branches.is_empty() {
        json!(config.default_point_color)
    } else {
        let mut expression = vec![json!("match"), json!(["get", keys::FOCUS_AREA])];
        expression.extend(branches);
        expression.push(json!(config.default_point_color));
        JsonValue::Array(expression)
    };

    json!({
        "id": POINT_LAYER,
        "type": "circle",
        "source": PLACES_SOURCE,
        "filter": ["!", ["has", "point_count"]],
        "paint": {
            "circle-color": circle_color,
            "circle-radius": config.point_radius,
            "circle-stroke-width": 1,
            "circle-stroke-color": "#fff"
        }
    })
}

fn overlay_fill_layer(overlay: &OverlayConfig) -> JsonValue {
    json!({
        "id": format!("{}-fill", overlay.name),
        "type": "fill",
        "source": overlay.name,
        "paint": {
            "fill-color": overlay.fill_color,
            "fill-opacity": overlay.fill_opacity
        }
    })
}

fn overlay_line_layer(overlay: &OverlayConfig) -> Option<JsonValue> {
    let line_color = overlay.line_color.as_ref()?;
    Some(json!({
        "id": format!("{}-line", overlay.name),
        "type": "line",
        "source": overlay.name,
        "paint": {
            "line-color": line_color,
            "line-width": overlay.line_width.unwrap_or(1.0)
        }
    }))
}

/// Popup body: title always, description and website link when present.
fn popup_html(title: &str, description: Option<&str>, website_url: Option<&str>) -> String {
    let mut html = format!("<strong>{}</strong>", escape_html(title));
    if let Some(description) = description.filter(|text| !text.is_empty()) {
        html.push_str(&format!("<p>{}</p>", escape_html(description)));
    }
    if let Some(url) = website_url.filter(|url| !url.is_empty()) {
        html.push_str(&format!(
            "<p><a href=\"{}\">Website</a></p>",
            escape_html(url)
        ));
    }
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub map: MapConfig,
    #[serde(default)]
    pub overlay: Vec<OverlayConfig>,
    pub bundle: BundleConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Compact feature table (.toml, .csv, or .json, dispatched on extension).
    pub features: PathBuf,
    /// Where `generate` writes the ES module consumed by the site entry script.
    pub generated_module: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MapConfig {
    /// Basemap style URL handed to the rendering library.
    pub style: String,
    /// Initial view center, `[longitude, latitude]`.
    pub center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub cluster_radius: u32,
    pub cluster_max_zoom: u8,
    pub point_radius: u32,
    /// Circle color for points whose focus area has no configured color.
    pub default_point_color: String,
    /// Hex color per focus-area value, keyed by tag string.
    #[serde(default)]
    pub focus_colors: HashMap<String, String>,
}

/// A named GeoJSON overlay drawn underneath the point layers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OverlayConfig {
    pub name: String,
    pub url: String,
    pub fill_color: String,
    #[serde(default = "default_opacity")]
    pub fill_opacity: f64,
    #[serde(default)]
    pub line_color: Option<String>,
    #[serde(default)]
    pub line_width: Option<f64>,
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct BundleConfig {
    /// Markup template holding the widget containers and script references.
    pub template: PathBuf,
    /// Directory of style sheets combined into a single `<style>` block.
    pub styles_dir: PathBuf,
    /// Single-file artifact path.
    pub output: PathBuf,
    /// Script tags injected before `</head>`, one per CDN dependency.
    #[serde(default)]
    pub cdn_scripts: Vec<String>,
    /// Module names that stay external (served from the CDN, never inlined).
    #[serde(default)]
    pub external_modules: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

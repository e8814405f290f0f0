use crate::config::AppConfig;
use crate::types::{CompactFeature, FocusArea, FundedStatus};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geojson::FeatureCollection;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Loads the compact feature table named by the config, dispatching on the
/// file extension, and validates every record before anything downstream
/// sees it.
pub fn load_features(path: &Path) -> Result<Vec<CompactFeature>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Feature table {:?} has no extension", path))?;

    let records = match extension.as_str() {
        "toml" => load_toml(path)?,
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        _ => return Err(anyhow!("Unsupported feature table format: {}", extension)),
    };

    validate(&records)?;
    println!("Loaded {} features from {:?}", records.len(), path);

    Ok(records)
}

#[derive(Deserialize)]
struct FeatureTable {
    #[serde(default)]
    feature: Vec<CompactFeature>,
}

fn load_toml(path: &Path) -> Result<Vec<CompactFeature>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature table: {:?}", path))?;
    let table: FeatureTable =
        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(table.feature)
}

fn load_json(path: &Path) -> Result<Vec<CompactFeature>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open feature table: {:?}", path))?;
    let records: Vec<CompactFeature> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(records)
}

fn load_csv(path: &Path) -> Result<Vec<CompactFeature>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open feature table: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let title_idx =
        column("title").ok_or_else(|| anyhow!("Column 'title' not found in {:?}", path))?;
    let lng_idx =
        column("longitude").ok_or_else(|| anyhow!("Column 'longitude' not found in {:?}", path))?;
    let lat_idx =
        column("latitude").ok_or_else(|| anyhow!("Column 'latitude' not found in {:?}", path))?;
    let description_idx = column("description");
    let website_idx = column("website_url");
    let focus_idx = column("focus_area");
    let funded_idx = column("funded_status");

    let mut records = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is row 1.
        let line = row + 2;

        let optional = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let coordinate = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .unwrap_or("")
                .trim()
                .parse()
                .with_context(|| format!("Row {}: invalid {}", line, name))
        };

        let focus_area = match optional(focus_idx) {
            Some(value) => Some(
                FocusArea::parse(&value)
                    .ok_or_else(|| anyhow!("Row {}: unknown focus area '{}'", line, value))?,
            ),
            None => None,
        };
        let funded_status = match optional(funded_idx) {
            Some(value) => Some(
                FundedStatus::parse(&value)
                    .ok_or_else(|| anyhow!("Row {}: unknown funded status '{}'", line, value))?,
            ),
            None => None,
        };

        records.push(CompactFeature {
            title: optional(Some(title_idx))
                .ok_or_else(|| anyhow!("Row {}: missing title", line))?,
            coordinates: [
                coordinate(lng_idx, "longitude")?,
                coordinate(lat_idx, "latitude")?,
            ],
            description: optional(description_idx),
            website_url: optional(website_idx),
            focus_area,
            funded_status,
        });
    }

    Ok(records)
}

/// Fail-fast validation: malformed records abort the run instead of
/// propagating broken geodata to the map.
pub fn validate(records: &[CompactFeature]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        if record.title.trim().is_empty() {
            return Err(anyhow!("Feature {} has an empty title", index));
        }
        let [lng, lat] = record.coordinates;
        if !lng.is_finite() || !lat.is_finite() {
            return Err(anyhow!("Feature '{}' has non-finite coordinates", record.title));
        }
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(anyhow!(
                "Feature '{}' has out-of-range coordinates [{}, {}]",
                record.title,
                lng,
                lat
            ));
        }
    }
    Ok(())
}

/// Writes the decompressed collection and the map settings as an ES module
/// for the site entry script. The bundler later inlines it.
pub fn write_features_module(
    path: &Path,
    collection: &FeatureCollection,
    config: &AppConfig,
) -> Result<()> {
    let collection_json = serde_json::to_string_pretty(collection)
        .context("Failed to serialize feature collection")?;
    let settings_json =
        serde_json::to_string_pretty(&config.map).context("Failed to serialize map settings")?;
    let overlays_json =
        serde_json::to_string_pretty(&config.overlay).context("Failed to serialize overlays")?;

    let module = format!(
        "// Generated by `poimap generate`. Do not edit by hand.\n\
         export const collection = {};\n\n\
         export const mapSettings = {};\n\n\
         export const overlays = {};\n",
        collection_json, settings_json, overlays_json
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    fs::write(path, module).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote generated feature module to {:?}", path);

    Ok(())
}

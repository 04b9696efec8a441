//! Dashboard configuration.
//!
//! Defaults describe the Taipei deployment. A JSON file may override any
//! subset of fields; `ATLAS_*` environment variables are applied last.

use std::path::Path;

use layers::{ArcSettings, RenderType, RouteSettings, StyleCatalog, StyleRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::locations::SavedLocation;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceProfile {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(DeviceProfile::Desktop),
            "mobile" => Some(DeviceProfile::Mobile),
            _ => None,
        }
    }
}

/// A plain layer drawn under every dashboard layer and never registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLayerConfig {
    /// Dataset id; also used as the renderer source and layer id.
    pub dataset_id: String,
    #[serde(rename = "type")]
    pub render_type: RenderType,
    #[serde(default)]
    pub paint: StyleRecord,
    #[serde(default)]
    pub layout: StyleRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingsConfig {
    pub layer_id: String,
    pub tiles_url: String,
    pub source_layer: String,
    #[serde(default)]
    pub min_zoom: f64,
    #[serde(default)]
    pub paint: StyleRecord,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    InvalidEnv { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "reading {path} failed: {message}"),
            ConfigError::Parse(msg) => write!(f, "invalid dashboard config: {msg}"),
            ConfigError::InvalidEnv { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub base_url: String,
    pub device: DeviceProfile,
    /// Delay before an arc layer is registered with the overlay engine.
    pub arc_settle_ms: u64,
    pub arc_settle_mobile_ms: u64,
    pub resize_debounce_ms: u64,
    pub ease_duration_ms: u64,
    /// Maximum number of distinct layers in one detail view.
    pub popup_limit: usize,
    pub arc: ArcSettings,
    pub route: RouteSettings,
    pub base_layers: Vec<BaseLayerConfig>,
    /// Omitted on mobile regardless of this setting.
    pub buildings: Option<BuildingsConfig>,
    pub symbol_images: Vec<String>,
    pub saved_locations: Vec<SavedLocation>,
    /// Presets added on top of the built-in catalog.
    pub styles: StyleCatalog,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            device: DeviceProfile::Desktop,
            arc_settle_ms: 500,
            arc_settle_mobile_ms: 2000,
            resize_debounce_ms: 200,
            ease_duration_ms: 4000,
            popup_limit: 3,
            arc: ArcSettings::default(),
            route: RouteSettings::default(),
            base_layers: default_base_layers(),
            buildings: Some(BuildingsConfig {
                layer_id: "taipei_building_3d".to_string(),
                tiles_url: "mapbox://taipei.buildings".to_string(),
                source_layer: "tpe3d".to_string(),
                min_zoom: 14.0,
                paint: record(json!({
                    "fill-extrusion-color": "#888888",
                    "fill-extrusion-height": ["get", "1_top_high"],
                    "fill-extrusion-opacity": 0.5
                })),
            }),
            symbol_images: [
                "metro",
                "triangle_green",
                "triangle_white",
                "bike_green",
                "bike_orange",
                "bike_red",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            saved_locations: vec![SavedLocation::home()],
            styles: StyleCatalog::new(),
        }
    }
}

fn default_base_layers() -> Vec<BaseLayerConfig> {
    vec![
        BaseLayerConfig {
            dataset_id: "taipei_town".to_string(),
            render_type: RenderType::Line,
            paint: record(json!({ "line-color": "#aaaaaa", "line-width": 1.5, "line-opacity": 0.6 })),
            layout: StyleRecord::new(),
        },
        BaseLayerConfig {
            dataset_id: "taipei_village".to_string(),
            render_type: RenderType::Symbol,
            paint: record(json!({ "text-color": "#cccccc" })),
            layout: record(json!({ "text-field": ["get", "VNAME"], "text-size": 10 })),
        },
    ]
}

fn record(value: serde_json::Value) -> StyleRecord {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => StyleRecord::new(),
    }
}

impl DashboardConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(payload).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let payload = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&payload)
    }

    /// Applies `ATLAS_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ATLAS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(value) = lookup("ATLAS_DEVICE") {
            self.device = DeviceProfile::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                key: "ATLAS_DEVICE".to_string(),
                value,
            })?;
        }
        env_u64(&lookup, "ATLAS_ARC_SETTLE_MS", &mut self.arc_settle_ms)?;
        env_u64(&lookup, "ATLAS_ARC_SETTLE_MOBILE_MS", &mut self.arc_settle_mobile_ms)?;
        env_u64(&lookup, "ATLAS_RESIZE_DEBOUNCE_MS", &mut self.resize_debounce_ms)?;
        Ok(())
    }

    pub fn is_mobile(&self) -> bool {
        self.device == DeviceProfile::Mobile
    }

    pub fn arc_settle_delay_ms(&self) -> u64 {
        match self.device {
            DeviceProfile::Desktop => self.arc_settle_ms,
            DeviceProfile::Mobile => self.arc_settle_mobile_ms,
        }
    }

    /// Built-in presets with `styles` layered on top.
    pub fn style_catalog(&self) -> StyleCatalog {
        let mut catalog = StyleCatalog::builtin();
        catalog.extend(self.styles.clone());
        catalog
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/map/{name}.png", self.base_url.trim_end_matches('/'))
    }
}

fn env_u64<F>(lookup: &F, key: &str, slot: &mut u64) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *slot = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DashboardConfig, DeviceProfile};
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_desktop_deployment() {
        let c = DashboardConfig::default();
        assert_eq!(c.arc_settle_delay_ms(), 500);
        assert_eq!(c.resize_debounce_ms, 200);
        assert_eq!(c.ease_duration_ms, 4000);
        assert_eq!(c.popup_limit, 3);
        assert_eq!(c.arc.subdivisions, 20);
        assert_eq!(c.route.duration_ms, 1_000_000);
        assert_eq!(c.base_layers.len(), 2);
        assert_eq!(c.symbol_images.len(), 6);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let c = DashboardConfig::from_json_str(
            r#"{ "device": "mobile", "base_url": "https://dash.example", "arc": { "subdivisions": 10, "elevation_scale": 1000.0 } }"#,
        )
        .expect("config");
        assert_eq!(c.device, DeviceProfile::Mobile);
        assert_eq!(c.arc_settle_delay_ms(), 2000);
        assert_eq!(c.arc.subdivisions, 10);
        assert_eq!(c.popup_limit, 3);
        assert_eq!(c.image_url("metro"), "https://dash.example/images/map/metro.png");
    }

    #[test]
    fn env_overrides_apply_last() {
        let mut c = DashboardConfig::default();
        c.apply_env_from(env(&[
            ("ATLAS_DEVICE", "Mobile"),
            ("ATLAS_ARC_SETTLE_MOBILE_MS", "750"),
            ("ATLAS_BASE_URL", "http://localhost:8080"),
        ]))
        .expect("env");
        assert!(c.is_mobile());
        assert_eq!(c.arc_settle_delay_ms(), 750);
        assert_eq!(c.base_url, "http://localhost:8080");
    }

    #[test]
    fn malformed_env_values_are_rejected() {
        let mut c = DashboardConfig::default();
        let err = c
            .apply_env_from(env(&[("ATLAS_RESIZE_DEBOUNCE_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "ATLAS_RESIZE_DEBOUNCE_MS"));
        assert_eq!(c.resize_debounce_ms, 200);
    }

    #[test]
    fn style_overrides_extend_builtin_catalog() {
        let c = DashboardConfig::from_json_str(
            r#"{ "styles": { "paint": { "circle-huge": { "circle-radius": 9 } } } }"#,
        )
        .expect("config");
        let catalog = c.style_catalog();
        assert!(catalog.paint.contains_key("circle-huge"));
        assert!(catalog.paint.contains_key("circle"));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::descriptor::LayerDescriptor;

/// Flat paint or layout property set, e.g. `{"circle-radius": 3}`.
pub type StyleRecord = BTreeMap<String, Value>;

/// Merges `records` in order; a later record's top-level properties replace
/// earlier ones wholesale. Nested values are never merged.
pub fn merge_overrides<'a, I>(records: I) -> StyleRecord
where
    I: IntoIterator<Item = &'a StyleRecord>,
{
    let mut out = StyleRecord::new();
    for record in records {
        for (k, v) in record {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedStyle {
    pub paint: StyleRecord,
    pub layout: StyleRecord,
}

/// Named paint/layout presets.
///
/// Keys are a render type (`"circle"`) or a type-variant pair
/// (`"circle-big"`, `"symbol-metro"`). Resolution for a descriptor is the
/// override chain base type ◁ icon variant ◁ size variant ◁ descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleCatalog {
    #[serde(default)]
    pub paint: BTreeMap<String, StyleRecord>,
    #[serde(default)]
    pub layout: BTreeMap<String, StyleRecord>,
}

impl StyleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets shipped with the dashboard.
    pub fn builtin() -> Self {
        let mut c = Self::new();

        c.set_paint(
            "circle",
            json!({ "circle-radius": 2.5, "circle-color": "#ffffff", "circle-opacity": 0.9 }),
        );
        c.set_paint("circle-big", json!({ "circle-radius": 4.0 }));
        c.set_paint("circle-small", json!({ "circle-radius": 1.5 }));
        c.set_paint(
            "line",
            json!({ "line-width": 2.0, "line-color": "#ffffff", "line-opacity": 0.9 }),
        );
        c.set_paint("line-wide", json!({ "line-width": 4.0 }));
        c.set_paint("line-dash", json!({ "line-dasharray": [2, 2] }));
        c.set_layout("line", json!({ "line-cap": "round", "line-join": "round" }));
        c.set_paint("fill", json!({ "fill-opacity": 0.3, "fill-color": "#ffffff" }));
        c.set_paint(
            "fill-extrusion",
            json!({ "fill-extrusion-opacity": 0.5, "fill-extrusion-color": "#888888" }),
        );
        c.set_paint("heatmap", json!({ "heatmap-opacity": 0.6 }));
        c.set_layout(
            "symbol",
            json!({ "icon-size": 0.5, "icon-allow-overlap": true, "icon-ignore-placement": true }),
        );
        for icon in [
            "metro",
            "triangle_green",
            "triangle_white",
            "bike_green",
            "bike_orange",
            "bike_red",
        ] {
            c.set_layout(&format!("symbol-{icon}"), json!({ "icon-image": icon }));
        }
        c.set_layout("symbol-big", json!({ "icon-size": 1.0 }));
        c
    }

    /// Adds or replaces presets from `other`.
    pub fn extend(&mut self, other: StyleCatalog) {
        self.paint.extend(other.paint);
        self.layout.extend(other.layout);
    }

    pub fn resolve(&self, descriptor: &LayerDescriptor) -> ResolvedStyle {
        let ty = descriptor.render_type.as_str();
        let variants: Vec<String> = std::iter::once(ty.to_string())
            .chain(descriptor.icon.iter().map(|icon| format!("{ty}-{icon}")))
            .chain(descriptor.size.iter().map(|size| format!("{ty}-{size}")))
            .collect();

        let paint = merge_overrides(
            variants
                .iter()
                .filter_map(|name| self.paint.get(name))
                .chain(std::iter::once(&descriptor.paint)),
        );
        let layout = merge_overrides(
            variants
                .iter()
                .filter_map(|name| self.layout.get(name))
                .chain(std::iter::once(&descriptor.layout)),
        );
        ResolvedStyle { paint, layout }
    }

    fn set_paint(&mut self, name: &str, record: Value) {
        self.paint.insert(name.to_string(), record_from(record));
    }

    fn set_layout(&mut self, name: &str, record: Value) {
        self.layout.insert(name.to_string(), record_from(record));
    }
}

fn record_from(value: Value) -> StyleRecord {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => StyleRecord::new(),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` or `#rgb`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        let nibble = |c: char| c.to_digit(16).map(|d| d as u8);
        match hex.len() {
            6 => {
                let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
                Some(Self::new(byte(0)?, byte(2)?, byte(4)?))
            }
            3 => {
                let mut chars = hex.chars();
                let mut next = || nibble(chars.next()?).map(|d| d * 17);
                Some(Self::new(next()?, next()?, next()?))
            }
            _ => None,
        }
    }

    fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }
}

/// `steps` colours evenly spaced from `from` to `to`, both ends included.
pub fn gradient_steps(from: Rgb, to: Rgb, steps: usize) -> Vec<Rgb> {
    match steps {
        0 => Vec::new(),
        1 => vec![from],
        n => (0..n)
            .map(|i| from.lerp(to, i as f64 / (n - 1) as f64))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Rgb, StyleCatalog, StyleRecord, gradient_steps, merge_overrides};
    use crate::descriptor::LayerDescriptor;
    use crate::layer::RenderType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn later_records_win_without_deep_merge() {
        let a: StyleRecord = [
            ("circle-radius".to_string(), json!(2)),
            ("circle-color".to_string(), json!(["match", ["get", "k"], "a", "#f00", "#fff"])),
        ]
        .into_iter()
        .collect();
        let b: StyleRecord = [("circle-color".to_string(), json!("#00f"))]
            .into_iter()
            .collect();

        let merged = merge_overrides([&a, &b]);
        assert_eq!(merged.get("circle-radius"), Some(&json!(2)));
        assert_eq!(merged.get("circle-color"), Some(&json!("#00f")));
    }

    #[test]
    fn resolve_applies_base_icon_size_then_descriptor() {
        let catalog = StyleCatalog::builtin();
        let d = LayerDescriptor::new("metro_station", RenderType::Symbol)
            .with_icon("metro")
            .with_size("big")
            .with_layout("icon-size", 0.8);

        let style = catalog.resolve(&d);
        assert_eq!(style.layout.get("icon-image"), Some(&json!("metro")));
        assert_eq!(style.layout.get("icon-allow-overlap"), Some(&json!(true)));
        // size variant overrides base, descriptor overrides size variant
        assert_eq!(style.layout.get("icon-size"), Some(&json!(0.8)));
    }

    #[test]
    fn unknown_variants_fall_back_to_base() {
        let catalog = StyleCatalog::builtin();
        let d = LayerDescriptor::new("youbike", RenderType::Circle).with_icon("nonexistent");
        let style = catalog.resolve(&d);
        assert_eq!(style.paint.get("circle-radius"), Some(&json!(2.5)));
    }

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(Rgb::parse_hex("#ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse_hex("#fff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("ff8000"), None);
        assert_eq!(Rgb::parse_hex("#ggg"), None);
    }

    #[test]
    fn gradient_includes_both_ends() {
        let steps = gradient_steps(Rgb::new(0, 0, 0), Rgb::new(200, 100, 0), 3);
        assert_eq!(
            steps,
            vec![Rgb::new(0, 0, 0), Rgb::new(100, 50, 0), Rgb::new(200, 100, 0)]
        );
        assert_eq!(gradient_steps(Rgb::WHITE, Rgb::WHITE, 1), vec![Rgb::WHITE]);
    }
}

//! Arc layers: origin/destination lines lifted into parabolic 3D arcs.
//!
//! The overlay engine cannot update features incrementally, so every build
//! produces the complete object list for the layer.

use std::f64::consts::PI;

use formats::{FeatureCollection, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::objects::{OverlayLine, RenderObject};
use crate::symbology::{Rgb, StyleRecord, gradient_steps};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSettings {
    /// Number of segments; each arc has `subdivisions + 1` vertices.
    pub subdivisions: usize,
    /// Meters of apex height per degree of `sqrt(|Δlng·Δlat|)`.
    pub elevation_scale: f64,
}

impl Default for ArcSettings {
    fn default() -> Self {
        Self {
            subdivisions: 20,
            elevation_scale: 80_000.0,
        }
    }
}

/// Vertices of the arc from `from` to `to`.
///
/// Vertex `j` sits at `from + j·Δ/N` with altitude
/// `sin(π·j/N) · sqrt(|Δlng·Δlat|) · elevation_scale`, so both ends are on
/// the ground and the apex is at the midpoint.
pub fn arc_vertices(from: Position, to: Position, settings: ArcSettings) -> Vec<Position> {
    let n = settings.subdivisions.max(1);
    let d_lng = to.lng - from.lng;
    let d_lat = to.lat - from.lat;
    let step_lng = d_lng / n as f64;
    let step_lat = d_lat / n as f64;
    let apex = (d_lng * d_lat).abs().sqrt() * settings.elevation_scale;

    (0..=n)
        .map(|j| {
            let elevation = (PI * j as f64 / n as f64).sin() * apex;
            Position::with_alt(
                from.lng + step_lng * j as f64,
                from.lat + step_lat * j as f64,
                elevation,
            )
        })
        .collect()
}

/// Arc paint: `arc-color` is `[from]` or `[from, to]`, plus optional
/// `arc-width` and `arc-opacity`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArcPaint {
    pub from: Rgb,
    pub to: Rgb,
    pub width: f64,
    pub opacity: f64,
}

impl Default for ArcPaint {
    fn default() -> Self {
        Self {
            from: Rgb::WHITE,
            to: Rgb::WHITE,
            width: 2.0,
            opacity: 0.5,
        }
    }
}

impl ArcPaint {
    pub fn from_paint(paint: &StyleRecord) -> Self {
        let mut out = Self::default();

        if let Some(colors) = paint.get("arc-color").and_then(Value::as_array) {
            let parsed: Vec<Rgb> = colors
                .iter()
                .filter_map(Value::as_str)
                .filter_map(Rgb::parse_hex)
                .collect();
            if let Some(first) = parsed.first() {
                out.from = *first;
                out.to = parsed.get(1).copied().unwrap_or(*first);
            }
        }
        if let Some(width) = paint.get("arc-width").and_then(Value::as_f64) {
            out.width = width;
        }
        // An explicit 0 is a valid opacity.
        if let Some(opacity) = paint.get("arc-opacity").and_then(Value::as_f64) {
            out.opacity = opacity;
        }
        out
    }
}

/// One gradient-coloured arc per line feature in `data`.
///
/// Each feature contributes its first and last vertex; features without a
/// line geometry or with fewer than two vertices are skipped.
pub fn build_arc_objects(
    data: &FeatureCollection,
    paint: &StyleRecord,
    settings: ArcSettings,
) -> Vec<RenderObject> {
    let style = ArcPaint::from_paint(paint);
    let colors = gradient_steps(style.from, style.to, settings.subdivisions.max(1) + 1);

    let mut out = Vec::with_capacity(data.len());
    for (i, feature) in data.features.iter().enumerate() {
        let Some(vertices) = feature.geometry.line_vertices() else {
            debug!("arc feature {i} is a {}, skipped", feature.geometry.type_name());
            continue;
        };
        let (Some(from), Some(to)) = (vertices.first(), vertices.last()) else {
            continue;
        };
        if vertices.len() < 2 {
            debug!("arc feature {i} has a single vertex, skipped");
            continue;
        }

        out.push(RenderObject::Line(OverlayLine {
            vertices: arc_vertices(*from, *to, settings),
            width: style.width,
            opacity: style.opacity,
            color: Rgb::WHITE,
            vertex_colors: colors.clone(),
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ArcPaint, ArcSettings, arc_vertices, build_arc_objects};
    use crate::symbology::{Rgb, StyleRecord};
    use formats::{Feature, FeatureCollection, Geometry, Position};
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn same_latitude_arc_stays_flat() {
        let v = arc_vertices(
            Position::new(0.0, 0.0),
            Position::new(2.0, 0.0),
            ArcSettings::default(),
        );
        assert_eq!(v.len(), 21);
        let mid = v[10];
        assert!(approx(mid.lng, 1.0));
        assert!(approx(mid.alt.unwrap_or(f64::NAN), 0.0));
    }

    #[test]
    fn diagonal_arc_peaks_at_scale() {
        let v = arc_vertices(
            Position::new(0.0, 0.0),
            Position::new(1.0, 1.0),
            ArcSettings::default(),
        );
        let mid = v[10];
        assert!(approx(mid.alt.unwrap_or(f64::NAN), 80_000.0));
        assert!(approx(mid.lng, 0.5) && approx(mid.lat, 0.5));
        // Endpoints touch the ground.
        assert!(approx(v[0].alt.unwrap_or(f64::NAN), 0.0));
        assert!(v[20].alt.unwrap_or(f64::NAN).abs() < 1e-6);
        assert!(approx(v[20].lng, 1.0));
    }

    #[test]
    fn paint_defaults_and_zero_opacity() {
        let empty = StyleRecord::new();
        assert_eq!(ArcPaint::from_paint(&empty), ArcPaint::default());

        let mut paint = StyleRecord::new();
        paint.insert("arc-color".to_string(), json!(["#ff0000"]));
        paint.insert("arc-opacity".to_string(), json!(0));
        let p = ArcPaint::from_paint(&paint);
        assert_eq!(p.from, Rgb::new(255, 0, 0));
        assert_eq!(p.to, Rgb::new(255, 0, 0));
        assert_eq!(p.opacity, 0.0);
        assert_eq!(p.width, 2.0);
    }

    #[test]
    fn builds_one_gradient_line_per_line_feature() {
        let data = FeatureCollection::new(vec![
            Feature::new(Geometry::LineString(vec![
                Position::new(121.5, 25.0),
                Position::new(121.6, 25.1),
            ])),
            Feature::new(Geometry::Point(Position::new(121.5, 25.0))),
        ]);
        let mut paint = StyleRecord::new();
        paint.insert("arc-color".to_string(), json!(["#000000", "#ffffff"]));

        let objects = build_arc_objects(&data, &paint, ArcSettings::default());
        assert_eq!(objects.len(), 1);
        let line = objects[0].as_line().expect("line object");
        assert_eq!(line.vertices.len(), 21);
        assert_eq!(line.vertex_colors.len(), 21);
        assert_eq!(line.vertex_colors[0], Rgb::new(0, 0, 0));
        assert_eq!(line.vertex_colors[20], Rgb::WHITE);
    }
}

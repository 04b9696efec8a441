//! Animated 3D routes: each line feature becomes a lifted polyline plus a
//! model that follows it.

use formats::{FeatureCollection, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::objects::{ModelSpec, OverlayLine, PathFollower, RenderObject};
use crate::symbology::{Rgb, StyleRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Constant altitude added to every path vertex, in meters.
    pub elevation_offset: f64,
    pub duration_ms: u64,
    pub line_width: f64,
    pub model: ModelSpec,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            elevation_offset: 15.0,
            duration_ms: 1_000_000,
            line_width: 5.0,
            model: ModelSpec::default(),
        }
    }
}

/// A line and a path follower per route feature, in feature order.
///
/// The line colour comes from `routeLineColor` in the layer paint.
pub fn build_route_objects(
    data: &FeatureCollection,
    paint: &StyleRecord,
    settings: &RouteSettings,
) -> Vec<RenderObject> {
    let color = paint
        .get("routeLineColor")
        .and_then(Value::as_str)
        .and_then(Rgb::parse_hex)
        .unwrap_or(Rgb::WHITE);

    let mut out = Vec::with_capacity(data.len() * 2);
    for feature in &data.features {
        let Some(vertices) = feature.geometry.line_vertices() else {
            debug!("route feature {:?} has no line geometry", feature.id);
            continue;
        };
        let Some(first) = vertices.first() else {
            continue;
        };

        let path: Vec<Position> = vertices
            .iter()
            .map(|p| Position::with_alt(p.lng, p.lat, settings.elevation_offset))
            .collect();

        out.push(RenderObject::Line(OverlayLine {
            vertices: path.clone(),
            width: settings.line_width,
            opacity: 1.0,
            color,
            vertex_colors: Vec::new(),
        }));
        out.push(RenderObject::Follower(PathFollower {
            model: settings.model.clone(),
            start: Position::new(first.lng, first.lat),
            path: vertices.to_vec(),
            duration_ms: settings.duration_ms,
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{RouteSettings, build_route_objects};
    use crate::symbology::{Rgb, StyleRecord};
    use formats::{Feature, FeatureCollection, Geometry, Position};
    use serde_json::json;

    fn bus(name: &str) -> Feature {
        Feature::new(Geometry::LineString(vec![
            Position::new(121.50, 25.00),
            Position::new(121.51, 25.01),
            Position::new(121.52, 25.03),
        ]))
        .with_property("model", json!({ "routeName": name }))
    }

    #[test]
    fn lifts_paths_and_attaches_a_follower() {
        let data = FeatureCollection::new(vec![bus("307"), bus("262")]);
        let mut paint = StyleRecord::new();
        paint.insert("routeLineColor".to_string(), json!("#ff0000"));

        let objects = build_route_objects(&data, &paint, &RouteSettings::default());
        assert_eq!(objects.len(), 4);

        let line = objects[0].as_line().expect("line first");
        assert_eq!(line.color, Rgb::new(255, 0, 0));
        assert_eq!(line.width, 5.0);
        assert!(line.vertices.iter().all(|v| v.alt == Some(15.0)));

        let follower = objects[1].as_follower().expect("follower second");
        assert_eq!(follower.duration_ms, 1_000_000);
        assert_eq!(follower.start, Position::new(121.50, 25.00));
        assert_eq!(follower.path.len(), 3);
    }

    #[test]
    fn skips_non_line_features() {
        let data = FeatureCollection::new(vec![Feature::new(Geometry::Point(Position::new(
            121.5, 25.0,
        )))]);
        let objects = build_route_objects(&data, &StyleRecord::new(), &RouteSettings::default());
        assert!(objects.is_empty());
    }

    #[test]
    fn settings_fill_missing_fields() {
        let s: RouteSettings =
            serde_json::from_value(json!({ "line_width": 3.0 })).expect("settings");
        assert_eq!(s.line_width, 3.0);
        assert_eq!(s.elevation_offset, 15.0);
        assert_eq!(s.model.uri, "model/car03.gltf");
    }
}

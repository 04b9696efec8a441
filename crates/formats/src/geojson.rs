use serde_json::{Map, Value};

/// A GeoJSON position. Altitude is carried when present (arc and route
/// construction emit 3D positions).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
    pub alt: Option<f64>,
}

impl Position {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat, alt: None }
    }

    pub const fn with_alt(lng: f64, lat: f64, alt: f64) -> Self {
        Self {
            lng,
            lat,
            alt: Some(alt),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Vertices of a `LineString`, or of the first line of a `MultiLineString`.
    pub fn line_vertices(&self) -> Option<&[Position]> {
        match self {
            Geometry::LineString(ps) => Some(ps),
            Geometry::MultiLineString(lines) => lines.first().map(|l| l.as_slice()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            properties: Map::new(),
            geometry,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Looks up a property through nested objects, e.g. `["model", "routeName"]`.
    pub fn property_at(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut cur = self.properties.get(first)?;
        for seg in rest {
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug)]
pub enum GeoJsonError {
    Json(String),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Json(msg) => write!(f, "JSON parse error: {msg}"),
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy holding only the features accepted by `keep`. `self` is untouched.
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Feature) -> bool,
    {
        Self {
            features: self.features.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::Json(e.to_string()))?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_value(value: Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(GeoJsonError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let invalid = |reason: String| GeoJsonError::InvalidFeature { index, reason };

            let feat_obj = feat_val
                .as_object()
                .ok_or_else(|| invalid("feature must be an object".to_string()))?;

            let feat_type = feat_obj
                .get("type")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid("feature missing type".to_string()))?;
            if feat_type != "Feature" {
                return Err(invalid(format!("unexpected feature type: {feat_type}")));
            }

            let id = match feat_obj.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };

            let properties = feat_obj
                .get("properties")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();

            let geometry_val = feat_obj
                .get("geometry")
                .ok_or_else(|| invalid("feature missing geometry".to_string()))?;
            let geometry = parse_geometry(geometry_val).map_err(invalid)?;

            features.push(Feature {
                id,
                properties,
                geometry,
            });
        }

        Ok(Self { features })
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "type".to_string(),
            Value::String("FeatureCollection".to_string()),
        );

        let features = self
            .features
            .iter()
            .map(|feat| {
                let mut fobj = Map::new();
                fobj.insert("type".to_string(), Value::String("Feature".to_string()));
                if let Some(id) = &feat.id {
                    fobj.insert("id".to_string(), Value::String(id.clone()));
                }
                fobj.insert(
                    "properties".to_string(),
                    Value::Object(feat.properties.clone()),
                );
                fobj.insert("geometry".to_string(), geometry_to_value(&feat.geometry));
                Value::Object(fobj)
            })
            .collect();

        root.insert("features".to_string(), Value::Array(features));
        Value::Object(root)
    }

    pub fn to_geojson_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_geojson_value())
    }
}

fn geometry_to_value(geom: &Geometry) -> Value {
    let coords = match geom {
        Geometry::Point(p) => position_value(p),
        Geometry::MultiPoint(ps) | Geometry::LineString(ps) => positions_value(ps),
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
            Value::Array(lines.iter().map(|l| positions_value(l)).collect())
        }
        Geometry::MultiPolygon(polys) => Value::Array(
            polys
                .iter()
                .map(|rings| Value::Array(rings.iter().map(|r| positions_value(r)).collect()))
                .collect(),
        ),
    };

    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(geom.type_name().to_string()),
    );
    obj.insert("coordinates".to_string(), coords);
    Value::Object(obj)
}

fn position_value(p: &Position) -> Value {
    let mut out = vec![Value::from(p.lng), Value::from(p.lat)];
    if let Some(alt) = p.alt {
        out.push(Value::from(alt));
    }
    Value::Array(out)
}

fn positions_value(ps: &[Position]) -> Value {
    Value::Array(ps.iter().map(position_value).collect())
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_position(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_positions(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_positions(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_nested(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_nested(coords)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_nested(poly)?);
            }
            Ok(Geometry::MultiPolygon(out))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_position(coords: &Value) -> Result<Position, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lng, lat]".to_string());
    }
    let lng = arr[0].as_f64().ok_or("lng must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    let alt = arr.get(2).and_then(|v| v.as_f64());
    Ok(Position { lng, lat, alt })
}

fn parse_positions(coords: &Value) -> Result<Vec<Position>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_position).collect()
}

fn parse_nested(coords: &Value) -> Result<Vec<Vec<Position>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of arrays".to_string())?;
    arr.iter().map(parse_positions).collect()
}

#[cfg(test)]
mod tests {
    use super::{Feature, FeatureCollection, GeoJsonError, Geometry, Position};
    use serde_json::json;

    #[test]
    fn parses_lines_with_nested_properties() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": 7,
                "properties": { "model": { "routeName": "307" } },
                "geometry": { "type": "LineString", "coordinates": [[121.5, 25.0], [121.6, 25.1, 12.0]] }
            }]
        });
        let fc = FeatureCollection::from_geojson_value(payload).expect("parse");
        assert_eq!(fc.len(), 1);
        let feat = &fc.features[0];
        assert_eq!(feat.id.as_deref(), Some("7"));
        assert_eq!(
            feat.geometry.line_vertices().map(|v| v[1]),
            Some(Position::with_alt(121.6, 25.1, 12.0))
        );
        let path = vec!["model".to_string(), "routeName".to_string()];
        assert_eq!(feat.property_at(&path), Some(&json!("307")));
    }

    #[test]
    fn rejects_non_collections() {
        let err = FeatureCollection::from_geojson_str(r#"{"type":"Feature"}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::NotAFeatureCollection));
        let err = FeatureCollection::from_geojson_str("not json").unwrap_err();
        assert!(matches!(err, GeoJsonError::Json(_)));
    }

    #[test]
    fn filtered_leaves_source_untouched() {
        let fc = FeatureCollection::new(vec![
            Feature::new(Geometry::Point(Position::new(0.0, 0.0))).with_property("kind", "a"),
            Feature::new(Geometry::Point(Position::new(1.0, 1.0))).with_property("kind", "b"),
        ]);
        let only_a = fc.filtered(|f| f.properties.get("kind") == Some(&json!("a")));
        assert_eq!(only_a.len(), 1);
        assert_eq!(fc.len(), 2);
    }

    #[test]
    fn emits_altitude_only_when_present() {
        let fc = FeatureCollection::new(vec![Feature::new(Geometry::LineString(vec![
            Position::new(0.0, 0.0),
            Position::with_alt(1.0, 1.0, 80000.0),
        ]))]);
        let value = fc.to_geojson_value();
        assert_eq!(
            value["features"][0]["geometry"]["coordinates"],
            json!([[0.0, 0.0], [1.0, 1.0, 80000.0]])
        );
    }
}

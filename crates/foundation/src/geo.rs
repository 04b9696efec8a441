use serde::{Deserialize, Serialize};

/// Geographic position in degrees (WGS84 longitude/latitude).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Pixel position on the map canvas, origin top-left.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snapshot of the 2D map camera.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub center: LngLat,
    pub zoom: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
}

impl CameraPose {
    pub const fn new(center: LngLat, zoom: f64, pitch: f64, bearing: f64) -> Self {
        Self {
            center,
            zoom,
            pitch,
            bearing,
        }
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        // Taipei city hall, the dashboard's home view.
        Self {
            center: LngLat::new(121.536609, 25.044808),
            zoom: 12.5,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPose, LngLat};

    #[test]
    fn camera_pose_deserializes_with_optional_angles() {
        let pose: CameraPose =
            serde_json::from_str(r#"{"center":{"lng":121.5,"lat":25.0},"zoom":14.0}"#)
                .expect("parse pose");
        assert_eq!(pose.center, LngLat::new(121.5, 25.0));
        assert_eq!(pose.pitch, 0.0);
        assert_eq!(pose.bearing, 0.0);
    }
}

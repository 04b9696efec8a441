use formats::Position;
use serde::{Deserialize, Serialize};

use crate::symbology::Rgb;

/// A polyline drawn by the 3D overlay engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLine {
    /// 3D vertices; altitude in meters.
    pub vertices: Vec<Position>,
    pub width: f64,
    pub opacity: f64,
    pub color: Rgb,
    /// Per-vertex colours; empty means the whole line uses `color`.
    pub vertex_colors: Vec<Rgb>,
}

/// 3D model asset placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub uri: String,
    #[serde(default = "default_model_kind")]
    pub kind: String,
    #[serde(default = "default_model_scale")]
    pub scale: f64,
    /// Euler rotation in degrees.
    #[serde(default)]
    pub rotation_deg: [f64; 3],
    #[serde(default = "default_model_anchor")]
    pub anchor: String,
}

fn default_model_kind() -> String {
    "gltf".to_string()
}

fn default_model_scale() -> f64 {
    100.0
}

fn default_model_anchor() -> String {
    "center".to_string()
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            uri: "model/car03.gltf".to_string(),
            kind: default_model_kind(),
            scale: default_model_scale(),
            rotation_deg: [90.0, 0.0, 0.0],
            anchor: default_model_anchor(),
        }
    }
}

/// A model that is loaded at `start` and then animated along `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFollower {
    pub model: ModelSpec,
    pub start: Position,
    pub path: Vec<Position>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderObject {
    Line(OverlayLine),
    Follower(PathFollower),
}

impl RenderObject {
    pub fn as_line(&self) -> Option<&OverlayLine> {
        match self {
            RenderObject::Line(line) => Some(line),
            RenderObject::Follower(_) => None,
        }
    }

    pub fn as_follower(&self) -> Option<&PathFollower> {
        match self {
            RenderObject::Follower(f) => Some(f),
            RenderObject::Line(_) => None,
        }
    }
}

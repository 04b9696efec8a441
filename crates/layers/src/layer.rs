use serde::{Deserialize, Serialize};

/// Render type of a dashboard layer, as named in layer configs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RenderType {
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "fill")]
    Fill,
    #[serde(rename = "fill-extrusion")]
    FillExtrusion,
    #[serde(rename = "symbol")]
    Symbol,
    #[serde(rename = "heatmap")]
    Heatmap,
    #[serde(rename = "arc")]
    Arc,
    #[serde(rename = "3DRoute")]
    Route3D,
}

impl RenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderType::Circle => "circle",
            RenderType::Line => "line",
            RenderType::Fill => "fill",
            RenderType::FillExtrusion => "fill-extrusion",
            RenderType::Symbol => "symbol",
            RenderType::Heatmap => "heatmap",
            RenderType::Arc => "arc",
            RenderType::Route3D => "3DRoute",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "circle" => RenderType::Circle,
            "line" => RenderType::Line,
            "fill" => RenderType::Fill,
            "fill-extrusion" => RenderType::FillExtrusion,
            "symbol" => RenderType::Symbol,
            "heatmap" => RenderType::Heatmap,
            "arc" => RenderType::Arc,
            "3DRoute" => RenderType::Route3D,
            _ => return None,
        })
    }
}

impl std::fmt::Display for RenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical identity of a layer: the dataset index plus how it is drawn.
///
/// The same dataset may be registered once per render type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerKey {
    pub index: String,
    pub render_type: RenderType,
}

impl LayerKey {
    pub fn new(index: impl Into<String>, render_type: RenderType) -> Self {
        Self {
            index: index.into(),
            render_type,
        }
    }

    /// Renderer layer id, `{index}-{type}`.
    pub fn layer_id(&self) -> String {
        format!("{}-{}", self.index, self.render_type)
    }

    /// Renderer source id backing the layer.
    pub fn source_id(&self) -> String {
        format!("{}-source", self.layer_id())
    }
}

impl std::fmt::Display for LayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.index, self.render_type)
    }
}

use foundation::{CameraPose, LngLat, ScreenPoint};
use formats::{Feature, FeatureCollection};
use layers::{FilterPredicate, LayerDescriptor, RenderObject, StandardLayer, StyleRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    DuplicateSource(String),
    DuplicateLayer(String),
    UnknownSource(String),
    UnknownLayer(String),
}

impl std::fmt::Display for RendererError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RendererError::DuplicateSource(id) => write!(f, "source already exists: {id}"),
            RendererError::DuplicateLayer(id) => write!(f, "layer already exists: {id}"),
            RendererError::UnknownSource(id) => write!(f, "no such source: {id}"),
            RendererError::UnknownLayer(id) => write!(f, "no such layer: {id}"),
        }
    }
}

impl std::error::Error for RendererError {}

/// A feature hit by a pick query, tagged with the layer it was drawn by.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub feature: Feature,
}

/// Extruded building layer streamed from a vector tile source.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorTileLayer {
    pub id: String,
    pub tiles_url: String,
    pub source_layer: String,
    pub min_zoom: f64,
    pub paint: StyleRecord,
}

/// The 2D vector map renderer.
///
/// Ids are strings owned by the caller. Mutating calls on unknown ids fail
/// with [`RendererError`]; callers are expected to check `has_*` first.
pub trait MapRenderer {
    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), RendererError>;
    fn remove_source(&mut self, id: &str) -> Result<(), RendererError>;
    fn has_source(&self, id: &str) -> bool;
    fn source_data(&self, id: &str) -> Option<&FeatureCollection>;

    fn add_layer(&mut self, layer: &StandardLayer) -> Result<(), RendererError>;
    /// Registers a layer whose drawing is delegated to the overlay engine.
    fn add_custom_layer(&mut self, id: &str) -> Result<(), RendererError>;
    fn add_vector_tile_layer(&mut self, layer: &VectorTileLayer) -> Result<(), RendererError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), RendererError>;
    fn has_layer(&self, id: &str) -> bool;

    fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), RendererError>;
    fn set_filter(
        &mut self,
        id: &str,
        filter: Option<&FilterPredicate>,
    ) -> Result<(), RendererError>;

    /// Features under `point` drawn by any of `layer_ids`, top-most first.
    fn query_features_at(&self, point: ScreenPoint, layer_ids: &[String]) -> Vec<RenderedFeature>;

    fn camera(&self) -> CameraPose;
    fn ease_to(&mut self, pose: CameraPose, duration_ms: u64);
    fn resize(&mut self);
    fn add_image(&mut self, name: &str, uri: &str) -> Result<(), RendererError>;
}

/// 3D scene drawn inside custom layers.
pub trait OverlayEngine {
    fn add_object(&mut self, layer_id: &str, object: RenderObject);
    /// Removes every object of `layer_id`.
    fn clear_layer(&mut self, layer_id: &str);
    /// Advances animations and redraws; called once per frame.
    fn update(&mut self);
    /// Whether the 3D context is initialised and can take objects right away.
    fn context_ready(&self) -> bool;
}

/// Up to three picked features and the descriptors of their layers,
/// index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopupContent {
    pub features: Vec<Feature>,
    pub descriptors: Vec<LayerDescriptor>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PopupHandle(pub u64);

pub trait DetailView {
    fn mount(&mut self, at: LngLat, content: PopupContent) -> PopupHandle;
    fn unmount(&mut self, handle: PopupHandle);
}

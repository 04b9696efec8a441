//! In-memory renderer, overlay and detail view.
//!
//! They keep the same bookkeeping a live map would (sources, layers,
//! visibility, filters, overlay objects, mounted popup) so the dashboard can
//! run without a GPU, in tests and in the CLI.

use std::collections::BTreeMap;

use foundation::{CameraPose, LngLat, ScreenPoint};
use formats::FeatureCollection;
use layers::{FilterPredicate, RenderObject, StandardLayer};

use crate::renderer::{
    DetailView, MapRenderer, OverlayEngine, PopupContent, PopupHandle, RenderedFeature,
    RendererError, VectorTileLayer,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessLayerKind {
    Standard(StandardLayer),
    Custom,
    VectorTile(VectorTileLayer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessLayer {
    pub kind: HeadlessLayerKind,
    pub visible: bool,
    pub filter: Option<FilterPredicate>,
}

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    sources: BTreeMap<String, FeatureCollection>,
    layers: BTreeMap<String, HeadlessLayer>,
    /// Layer ids in draw order, bottom first.
    order: Vec<String>,
    images: BTreeMap<String, String>,
    camera: CameraPose,
    picks: Vec<RenderedFeature>,
    pub eases: Vec<(CameraPose, u64)>,
    pub resizes: usize,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate hits for the next pick, top-most first. Only hits on
    /// existing, visible layers whose filter accepts the feature are
    /// reported.
    pub fn script_picks(&mut self, picks: Vec<RenderedFeature>) {
        self.picks = picks;
    }

    pub fn set_camera(&mut self, pose: CameraPose) {
        self.camera = pose;
    }

    pub fn layer(&self, id: &str) -> Option<&HeadlessLayer> {
        self.layers.get(id)
    }

    pub fn layer_ids(&self) -> &[String] {
        &self.order
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    /// Number of features a standard layer currently draws: its source
    /// passed through its filter, or zero when hidden.
    pub fn rendered_feature_count(&self, id: &str) -> usize {
        let Some(layer) = self.layers.get(id) else {
            return 0;
        };
        let HeadlessLayerKind::Standard(standard) = &layer.kind else {
            return 0;
        };
        if !layer.visible {
            return 0;
        }
        let Some(data) = self.sources.get(&standard.source_id) else {
            return 0;
        };
        match &layer.filter {
            Some(filter) => data.features.iter().filter(|f| filter.matches(f)).count(),
            None => data.len(),
        }
    }

    fn insert_layer(&mut self, id: &str, kind: HeadlessLayerKind) -> Result<(), RendererError> {
        if self.layers.contains_key(id) {
            return Err(RendererError::DuplicateLayer(id.to_string()));
        }
        self.layers.insert(
            id.to_string(),
            HeadlessLayer {
                kind,
                visible: true,
                filter: None,
            },
        );
        self.order.push(id.to_string());
        Ok(())
    }

    fn layer_mut(&mut self, id: &str) -> Result<&mut HeadlessLayer, RendererError> {
        self.layers
            .get_mut(id)
            .ok_or_else(|| RendererError::UnknownLayer(id.to_string()))
    }
}

impl MapRenderer for HeadlessRenderer {
    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), RendererError> {
        if self.sources.contains_key(id) {
            return Err(RendererError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), RendererError> {
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RendererError::UnknownSource(id.to_string()))
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn source_data(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    fn add_layer(&mut self, layer: &StandardLayer) -> Result<(), RendererError> {
        if !self.sources.contains_key(&layer.source_id) {
            return Err(RendererError::UnknownSource(layer.source_id.clone()));
        }
        self.insert_layer(&layer.id, HeadlessLayerKind::Standard(layer.clone()))
    }

    fn add_custom_layer(&mut self, id: &str) -> Result<(), RendererError> {
        self.insert_layer(id, HeadlessLayerKind::Custom)
    }

    fn add_vector_tile_layer(&mut self, layer: &VectorTileLayer) -> Result<(), RendererError> {
        self.insert_layer(&layer.id, HeadlessLayerKind::VectorTile(layer.clone()))
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), RendererError> {
        if self.layers.remove(id).is_none() {
            return Err(RendererError::UnknownLayer(id.to_string()));
        }
        self.order.retain(|l| l != id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), RendererError> {
        self.layer_mut(id)?.visible = visible;
        Ok(())
    }

    fn set_filter(
        &mut self,
        id: &str,
        filter: Option<&FilterPredicate>,
    ) -> Result<(), RendererError> {
        self.layer_mut(id)?.filter = filter.cloned();
        Ok(())
    }

    fn query_features_at(
        &self,
        _point: ScreenPoint,
        layer_ids: &[String],
    ) -> Vec<RenderedFeature> {
        self.picks
            .iter()
            .filter(|hit| layer_ids.contains(&hit.layer_id))
            .filter(|hit| {
                self.layers.get(&hit.layer_id).is_some_and(|layer| {
                    layer.visible
                        && layer
                            .filter
                            .as_ref()
                            .is_none_or(|filter| filter.matches(&hit.feature))
                })
            })
            .cloned()
            .collect()
    }

    fn camera(&self) -> CameraPose {
        self.camera
    }

    fn ease_to(&mut self, pose: CameraPose, duration_ms: u64) {
        self.eases.push((pose, duration_ms));
        self.camera = pose;
    }

    fn resize(&mut self) {
        self.resizes += 1;
    }

    fn add_image(&mut self, name: &str, uri: &str) -> Result<(), RendererError> {
        self.images.insert(name.to_string(), uri.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct HeadlessOverlay {
    objects: BTreeMap<String, Vec<RenderObject>>,
    pub ready: bool,
    pub frames: u64,
}

impl HeadlessOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    pub fn objects(&self, layer_id: &str) -> &[RenderObject] {
        self.objects.get(layer_id).map_or(&[], Vec::as_slice)
    }

    pub fn total_objects(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }
}

impl OverlayEngine for HeadlessOverlay {
    fn add_object(&mut self, layer_id: &str, object: RenderObject) {
        self.objects
            .entry(layer_id.to_string())
            .or_default()
            .push(object);
    }

    fn clear_layer(&mut self, layer_id: &str) {
        self.objects.remove(layer_id);
    }

    fn update(&mut self) {
        self.frames += 1;
    }

    fn context_ready(&self) -> bool {
        self.ready
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDetailView {
    next: u64,
    mounted: Option<(PopupHandle, LngLat, PopupContent)>,
    pub mounts: usize,
    pub unmounts: usize,
}

impl HeadlessDetailView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> Option<&(PopupHandle, LngLat, PopupContent)> {
        self.mounted.as_ref()
    }
}

impl DetailView for HeadlessDetailView {
    fn mount(&mut self, at: LngLat, content: PopupContent) -> PopupHandle {
        self.next += 1;
        let handle = PopupHandle(self.next);
        self.mounted = Some((handle, at, content));
        self.mounts += 1;
        handle
    }

    fn unmount(&mut self, handle: PopupHandle) {
        if self.mounted.as_ref().is_some_and(|(h, _, _)| *h == handle) {
            self.mounted = None;
            self.unmounts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HeadlessDetailView, HeadlessOverlay, HeadlessRenderer};
    use crate::renderer::{
        DetailView, MapRenderer, OverlayEngine, PopupContent, RenderedFeature, RendererError,
    };
    use foundation::{LngLat, ScreenPoint};
    use formats::{Feature, FeatureCollection, Geometry, Position};
    use layers::{FilterPredicate, LayerDescriptor, RenderType, StrategyContext};

    fn points(kinds: &[&str]) -> FeatureCollection {
        FeatureCollection::new(
            kinds
                .iter()
                .map(|k| {
                    Feature::new(Geometry::Point(Position::new(121.5, 25.0)))
                        .with_property("kind", *k)
                })
                .collect(),
        )
    }

    #[test]
    fn standard_layer_needs_its_source() {
        let mut r = HeadlessRenderer::new();
        let layer =
            StrategyContext::default().standard_layer(&LayerDescriptor::new("a", RenderType::Circle));
        assert_eq!(
            r.add_layer(&layer),
            Err(RendererError::UnknownSource("a-circle-source".to_string()))
        );

        r.add_source(&layer.source_id, points(&["x", "y"])).expect("source");
        r.add_layer(&layer).expect("layer");
        assert_eq!(r.rendered_feature_count("a-circle"), 2);
        assert!(matches!(
            r.add_layer(&layer),
            Err(RendererError::DuplicateLayer(_))
        ));
    }

    #[test]
    fn filter_and_visibility_shape_rendered_count() {
        let mut r = HeadlessRenderer::new();
        let layer =
            StrategyContext::default().standard_layer(&LayerDescriptor::new("a", RenderType::Circle));
        r.add_source(&layer.source_id, points(&["x", "y", "x"])).expect("source");
        r.add_layer(&layer).expect("layer");

        let p = FilterPredicate::equals("kind", "x");
        r.set_filter("a-circle", Some(&p)).expect("filter");
        assert_eq!(r.rendered_feature_count("a-circle"), 2);
        assert_eq!(r.source_data("a-circle-source").map(|d| d.len()), Some(3));

        r.set_visibility("a-circle", false).expect("hide");
        assert_eq!(r.rendered_feature_count("a-circle"), 0);
        assert!(r.set_visibility("missing", true).is_err());
    }

    #[test]
    fn picks_are_restricted_to_requested_visible_layers() {
        let mut r = HeadlessRenderer::new();
        r.add_custom_layer("a-arc").expect("a");
        r.add_custom_layer("b-arc").expect("b");
        r.set_visibility("b-arc", false).expect("hide b");

        let hit = |layer: &str| RenderedFeature {
            layer_id: layer.to_string(),
            feature: Feature::new(Geometry::Point(Position::new(0.0, 0.0))),
        };
        r.script_picks(vec![hit("a-arc"), hit("b-arc"), hit("c-arc")]);

        let ids = vec!["a-arc".to_string(), "b-arc".to_string(), "c-arc".to_string()];
        let hits = r.query_features_at(ScreenPoint::new(1.0, 1.0), &ids);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id, "a-arc");
    }

    #[test]
    fn overlay_clear_drops_all_objects_of_a_layer() {
        let mut o = HeadlessOverlay::new();
        let line = layers::RenderObject::Line(layers::OverlayLine {
            vertices: Vec::new(),
            width: 1.0,
            opacity: 1.0,
            color: layers::Rgb::WHITE,
            vertex_colors: Vec::new(),
        });
        o.add_object("a-arc", line.clone());
        o.add_object("a-arc", line.clone());
        o.add_object("b-arc", line);
        assert_eq!(o.objects("a-arc").len(), 2);
        o.clear_layer("a-arc");
        assert!(o.objects("a-arc").is_empty());
        assert_eq!(o.total_objects(), 1);
        o.update();
        assert_eq!(o.frames, 1);
    }

    #[test]
    fn stale_unmount_is_ignored() {
        let mut v = HeadlessDetailView::new();
        let first = v.mount(LngLat::new(0.0, 0.0), PopupContent::default());
        let second = v.mount(LngLat::new(1.0, 1.0), PopupContent::default());
        v.unmount(first);
        assert!(v.mounted().is_some());
        v.unmount(second);
        assert!(v.mounted().is_none());
        assert_eq!(v.unmounts, 1);
    }
}

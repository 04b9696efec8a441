use formats::FeatureCollection;

use crate::arc::{ArcSettings, build_arc_objects};
use crate::descriptor::LayerDescriptor;
use crate::layer::RenderType;
use crate::objects::RenderObject;
use crate::route::{RouteSettings, build_route_objects};
use crate::symbology::{StyleCatalog, StyleRecord};

/// How a layer is turned into renderer state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Declarative renderer layer over a GeoJSON source.
    Standard,
    /// Custom overlay layer of gradient arcs.
    Arc,
    /// Custom overlay layer of animated routes.
    Route3D,
}

impl RenderStrategy {
    pub fn for_type(render_type: RenderType) -> Self {
        match render_type {
            RenderType::Arc => RenderStrategy::Arc,
            RenderType::Route3D => RenderStrategy::Route3D,
            _ => RenderStrategy::Standard,
        }
    }

    /// Filters on overlay layers are applied client-side by rebuilding.
    pub fn is_overlay(self) -> bool {
        !matches!(self, RenderStrategy::Standard)
    }
}

/// A declarative layer ready for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardLayer {
    pub id: String,
    pub source_id: String,
    pub render_type: RenderType,
    pub paint: StyleRecord,
    pub layout: StyleRecord,
}

/// Complete object list of one custom overlay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBuild {
    pub layer_id: String,
    pub objects: Vec<RenderObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    Standard(StandardLayer),
    Overlay(OverlayBuild),
}

/// Construction parameters shared by every layer.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    pub catalog: StyleCatalog,
    pub arc: ArcSettings,
    pub route: RouteSettings,
}

impl StrategyContext {
    pub fn plan(&self, descriptor: &LayerDescriptor, data: &FeatureCollection) -> RenderPlan {
        match RenderStrategy::for_type(descriptor.render_type) {
            RenderStrategy::Standard => RenderPlan::Standard(self.standard_layer(descriptor)),
            RenderStrategy::Arc | RenderStrategy::Route3D => {
                RenderPlan::Overlay(self.overlay_build(descriptor, data))
            }
        }
    }

    pub fn standard_layer(&self, descriptor: &LayerDescriptor) -> StandardLayer {
        let key = descriptor.key();
        let style = self.catalog.resolve(descriptor);
        StandardLayer {
            id: key.layer_id(),
            source_id: key.source_id(),
            render_type: descriptor.render_type,
            paint: style.paint,
            layout: style.layout,
        }
    }

    /// Builds the overlay objects for `data`, which is already filtered when
    /// a predicate is active. Standard layers produce an empty build.
    pub fn overlay_build(
        &self,
        descriptor: &LayerDescriptor,
        data: &FeatureCollection,
    ) -> OverlayBuild {
        let objects = match RenderStrategy::for_type(descriptor.render_type) {
            RenderStrategy::Arc => build_arc_objects(data, &descriptor.paint, self.arc),
            RenderStrategy::Route3D => build_route_objects(data, &descriptor.paint, &self.route),
            RenderStrategy::Standard => Vec::new(),
        };
        OverlayBuild {
            layer_id: descriptor.key().layer_id(),
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderPlan, RenderStrategy, StrategyContext};
    use crate::descriptor::LayerDescriptor;
    use crate::layer::RenderType;
    use formats::{Feature, FeatureCollection, Geometry, Position};
    use serde_json::json;

    #[test]
    fn dispatch_by_render_type() {
        assert_eq!(RenderStrategy::for_type(RenderType::Circle), RenderStrategy::Standard);
        assert_eq!(RenderStrategy::for_type(RenderType::Arc), RenderStrategy::Arc);
        assert!(RenderStrategy::for_type(RenderType::Route3D).is_overlay());
        assert!(!RenderStrategy::for_type(RenderType::FillExtrusion).is_overlay());
    }

    #[test]
    fn standard_plan_resolves_style_and_ids() {
        let ctx = StrategyContext {
            catalog: crate::symbology::StyleCatalog::builtin(),
            ..Default::default()
        };
        let d = LayerDescriptor::new("bike", RenderType::Circle).with_paint("circle-color", "#f00");
        let RenderPlan::Standard(layer) = ctx.plan(&d, &FeatureCollection::default()) else {
            panic!("expected a standard plan");
        };
        assert_eq!(layer.id, "bike-circle");
        assert_eq!(layer.source_id, "bike-circle-source");
        assert_eq!(layer.paint.get("circle-color"), Some(&json!("#f00")));
        assert_eq!(layer.paint.get("circle-radius"), Some(&json!(2.5)));
    }

    #[test]
    fn arc_plan_builds_overlay_objects() {
        let ctx = StrategyContext::default();
        let data = FeatureCollection::new(vec![Feature::new(Geometry::LineString(vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 1.0),
        ]))]);
        let d = LayerDescriptor::new("od", RenderType::Arc);
        let RenderPlan::Overlay(build) = ctx.plan(&d, &data) else {
            panic!("expected an overlay plan");
        };
        assert_eq!(build.layer_id, "od-arc");
        assert_eq!(build.objects.len(), 1);
    }
}

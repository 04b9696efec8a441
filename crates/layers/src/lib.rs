pub mod arc;
pub mod descriptor;
pub mod filter;
pub mod layer;
pub mod loading;
pub mod objects;
pub mod registry;
pub mod route;
pub mod strategy;
pub mod symbology;

pub use arc::{ArcPaint, ArcSettings, arc_vertices, build_arc_objects};
pub use descriptor::*;
pub use filter::{FilterPredicate, PropertyPath};
pub use layer::*;
pub use loading::{LoadingSet, LoadingToken};
pub use objects::*;
pub use registry::{LayerRegistry, RegistryEntry};
pub use route::{RouteSettings, build_route_objects};
pub use strategy::*;
pub use symbology::{ResolvedStyle, Rgb, StyleCatalog, StyleRecord, gradient_steps, merge_overrides};

pub mod headless;
pub mod renderer;

pub use headless::{HeadlessDetailView, HeadlessLayer, HeadlessLayerKind, HeadlessOverlay, HeadlessRenderer};
pub use renderer::*;

use dashboard::{DashboardConfig, FetchDriver, MapStore, StoreSnapshot};
use engine::{HeadlessDetailView, HeadlessOverlay, HeadlessRenderer};
use layers::{FilterPredicate, LayerDescriptor, LayerKey};
use runtime::MapEvent;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// One user action in a simulated session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    StyleLoaded,
    Show { layers: Vec<LayerDescriptor> },
    Hide { layers: Vec<LayerKey> },
    Filter { layer: LayerKey, predicate: FilterPredicate },
    FilterProperty { layer: LayerKey, property: String, value: Value },
    RouteSelection { layer: LayerKey, property: String, values: Vec<Value> },
    SelectHour { layer: LayerKey, hour: u32 },
    ClearFilter { layer: LayerKey },
    Idle,
    Advance { ms: u64 },
    ClearAll,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json_str(payload: &str) -> Result<Self, String> {
        serde_json::from_str(payload).map_err(|e| format!("invalid session script: {e}"))
    }
}

pub type HeadlessStore = MapStore<HeadlessRenderer, HeadlessOverlay, HeadlessDetailView>;

pub fn headless_store(config: DashboardConfig) -> HeadlessStore {
    let mut store = MapStore::new(
        config,
        HeadlessRenderer::new(),
        HeadlessOverlay::new(),
        HeadlessDetailView::new(),
    );
    store.initialize();
    store
}

/// Applies every step, resolving fetches after each one.
pub async fn run(store: &mut HeadlessStore, driver: &FetchDriver, script: Script) -> StoreSnapshot {
    for (i, step) in script.steps.into_iter().enumerate() {
        info!("step {i}: {step:?}");
        apply(store, step);
        driver.run_until_idle(store).await;
    }
    store.snapshot()
}

fn apply(store: &mut HeadlessStore, step: Step) {
    match step {
        Step::StyleLoaded => store.dispatch(MapEvent::StyleLoaded),
        Step::Show { layers } => store.show_layers(&layers),
        Step::Hide { layers } => store.hide_layers(&layers),
        Step::Filter { layer, predicate } => store.apply_predicate(&layer, predicate, None),
        Step::FilterProperty {
            layer,
            property,
            value,
        } => store.apply_filter(&layer, &property, value, None),
        Step::RouteSelection {
            layer,
            property,
            values,
        } => store.apply_route_selection(&layer, &property, &values),
        Step::SelectHour { layer, hour } => store.select_hour(&layer, hour),
        Step::ClearFilter { layer } => store.clear_filter(&layer, None),
        Step::Idle => store.dispatch(MapEvent::Idle),
        Step::Advance { ms } => store.advance_by(ms),
        Step::ClearAll => store.clear_all_layers(),
    }
}

//! Map layer lifecycle and filtering.
//!
//! [`MapStore`] owns the layer registry and loading set and drives the
//! injected renderer, overlay engine and detail view. It never performs I/O
//! or reads a clock itself. The host:
//! - drains [`MapStore::take_fetch_requests`] and hands each result back to
//!   [`MapStore::complete_fetch`], in any order;
//! - forwards renderer events through [`MapStore::dispatch`];
//! - advances time with [`MapStore::advance_to`] so settle and resize timers
//!   fire.
//!
//! Nothing already started is ever cancelled. Every completion is checked on
//! arrival instead: the store must still be attached, its epoch (bumped by
//! `clear_all_layers` and `detach`) must match, an overlay rebuild must carry
//! the key's latest generation, and the renderer must still hold the target
//! layer or source. Failed checks drop the work with a debug log.

use std::collections::{BTreeMap, BTreeSet};

use engine::{
    DetailView, MapRenderer, OverlayEngine, PopupContent, PopupHandle, RendererError,
    VectorTileLayer,
};
use formats::FeatureCollection;
use foundation::{LngLat, Millis, ScreenPoint};
use layers::{
    FilterPredicate, LayerDescriptor, LayerKey, LayerRegistry, LoadingSet, LoadingToken,
    OverlayBuild, PropertyPath, RegistryEntry, RenderPlan, RenderStrategy, RenderType,
    StandardLayer, StrategyContext,
};
use runtime::{
    Counter, EventBus, EventKind, Gauge, MapEvent, Metrics, MetricsSnapshot, TimerId, TimerQueue,
};
use serde::Serialize;
use serde_json::Value;
use streaming::{FetchError, FetchQueue, FetchRequest, FetchTicket};
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::locations::{SavedLocation, SavedLocations};
use crate::selection::select_hits;

#[derive(Debug)]
enum FetchPurpose {
    Layer {
        epoch: u64,
        descriptor: LayerDescriptor,
    },
    Base {
        epoch: u64,
        index: usize,
    },
}

#[derive(Debug)]
struct SettleTask {
    epoch: u64,
    key: LayerKey,
    generation: u64,
    /// Descriptor and unfiltered data of a layer that is not registered yet.
    initial: Option<(LayerDescriptor, FeatureCollection)>,
    build: OverlayBuild,
}

#[derive(Debug)]
enum Timer {
    Settle(SettleTask),
    Resize,
}

/// Serializable view of the observable store state.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub attached: bool,
    pub registered: Vec<String>,
    pub visible: Vec<String>,
    pub loading: Vec<LoadingToken>,
    pub filters: BTreeMap<String, FilterPredicate>,
    pub popup_open: bool,
    pub time_selector: bool,
    pub saved_locations: Vec<SavedLocation>,
    pub metrics: MetricsSnapshot,
}

pub struct MapStore<R, O, D> {
    config: DashboardConfig,
    strategies: StrategyContext,
    renderer: R,
    overlay: O,
    detail: D,
    registry: LayerRegistry,
    loading: LoadingSet,
    fetches: FetchQueue<FetchPurpose>,
    timers: TimerQueue<Timer>,
    events: EventBus,
    metrics: Metrics,
    locations: SavedLocations,
    /// Keys fetched or awaiting settle but not registered yet.
    in_flight: BTreeSet<LayerKey>,
    /// In-flight keys hidden before they were registered.
    hidden_in_flight: BTreeSet<LayerKey>,
    generations: BTreeMap<LayerKey, u64>,
    /// Arc layers whose latest build waits on a settle timer.
    settling: BTreeSet<LayerKey>,
    popup: Option<PopupHandle>,
    resize_timer: Option<TimerId>,
    time_selector: bool,
    attached: bool,
    epoch: u64,
    now: Millis,
}

impl<R, O, D> MapStore<R, O, D>
where
    R: MapRenderer,
    O: OverlayEngine,
    D: DetailView,
{
    pub fn new(config: DashboardConfig, renderer: R, overlay: O, detail: D) -> Self {
        let strategies = StrategyContext {
            catalog: config.style_catalog(),
            arc: config.arc,
            route: config.route.clone(),
        };
        let locations = SavedLocations::new(config.saved_locations.clone());
        Self {
            config,
            strategies,
            renderer,
            overlay,
            detail,
            registry: LayerRegistry::new(),
            loading: LoadingSet::new(),
            fetches: FetchQueue::new(),
            timers: TimerQueue::new(),
            events: EventBus::new(),
            metrics: Metrics::new(),
            locations,
            in_flight: BTreeSet::new(),
            hidden_in_flight: BTreeSet::new(),
            generations: BTreeMap::new(),
            settling: BTreeSet::new(),
            popup: None,
            resize_timer: None,
            time_selector: false,
            attached: true,
            epoch: 0,
            now: Millis::ZERO,
        }
    }

    /// Attaches the store to the map and subscribes to renderer events.
    pub fn initialize(&mut self) {
        self.attached = true;
        for kind in [EventKind::StyleLoaded, EventKind::Click, EventKind::Idle] {
            self.events.subscribe(kind);
        }
        info!("map store initialized (epoch {})", self.epoch);
    }

    /// Feeds one renderer event through the subscription bus.
    pub fn dispatch(&mut self, event: MapEvent) {
        if !self.live("dispatch") {
            return;
        }
        if !self.events.publish(event) {
            debug!("ignoring unsubscribed {:?} event", event.kind());
            return;
        }
        while let Some(event) = self.events.pop() {
            match event {
                MapEvent::StyleLoaded => self.load_base_layers(),
                MapEvent::Click { point, lng_lat } => self.handle_click(point, lng_lat),
                MapEvent::Idle => {
                    let cleared = self.loading.end_all_rendering();
                    if cleared > 0 {
                        debug!("renderer idle, cleared {cleared} rendering tokens");
                    }
                }
            }
        }
        self.refresh_gauges();
    }

    /// Makes each layer visible, fetching the ones never seen before.
    pub fn show_layers(&mut self, descriptors: &[LayerDescriptor]) {
        if !self.live("show_layers") {
            return;
        }
        for descriptor in descriptors {
            let key = descriptor.key();
            if self.registry.has(&key) {
                self.loading.begin(LoadingToken::Rendering);
                let layer_id = key.layer_id();
                if self.renderer.has_layer(&layer_id) {
                    let result = self.renderer.set_visibility(&layer_id, true);
                    self.check("set_visibility", &layer_id, result);
                } else if !self.awaiting_settle(&key) {
                    self.inconsistent("set_visibility", &layer_id);
                }
                self.registry.set_visible(&key, true);
                debug!("{key} shown from registry");
            } else if self.in_flight.contains(&key) {
                self.hidden_in_flight.remove(&key);
                debug!("{key} is already loading");
            } else {
                // a failed fetch leaves its token behind; the retry reuses it
                let token = LoadingToken::Layer(key.clone());
                if !self.loading.contains(&token) {
                    self.loading.begin(token);
                }
                self.in_flight.insert(key.clone());
                self.fetches.submit(
                    descriptor.index.clone(),
                    FetchPurpose::Layer {
                        epoch: self.epoch,
                        descriptor: descriptor.clone(),
                    },
                );
                self.metrics.incr(Counter::FetchesIssued);
                info!("{key} requested, fetching dataset {}", descriptor.index);
            }
        }
        self.refresh_gauges();
    }

    /// Hides layers without dropping their data. Also ends their loading
    /// tokens and dismisses the popup.
    pub fn hide_layers(&mut self, keys: &[LayerKey]) {
        if !self.live("hide_layers") {
            return;
        }
        for key in keys {
            let token = LoadingToken::Layer(key.clone());
            while self.loading.end(&token) {}

            if self.in_flight.contains(key) {
                self.hidden_in_flight.insert(key.clone());
            }
            if !self.registry.has(key) {
                continue;
            }

            let layer_id = key.layer_id();
            let overlay = RenderStrategy::for_type(key.render_type).is_overlay();
            if self.renderer.has_layer(&layer_id) {
                if !overlay {
                    let result = self.renderer.set_filter(&layer_id, None);
                    self.check("set_filter", &layer_id, result);
                }
                let result = self.renderer.set_visibility(&layer_id, false);
                self.check("set_visibility", &layer_id, result);
            } else if !self.awaiting_settle(key) {
                self.inconsistent("set_visibility", &layer_id);
            }
            if !overlay {
                self.registry.set_filter(key, None);
            }
            self.registry.set_visible(key, false);
            debug!("{key} hidden");
        }
        self.close_popup();
        self.refresh_gauges();
    }

    /// Filters a layer on `property == value`.
    pub fn apply_filter(
        &mut self,
        key: &LayerKey,
        property: &str,
        value: Value,
        revised: Option<LayerDescriptor>,
    ) {
        self.apply_predicate(key, FilterPredicate::equals(property, value), revised);
    }

    /// Standard layers get a declarative renderer filter. Arc and route
    /// layers are rebuilt from the filtered superset.
    pub fn apply_predicate(
        &mut self,
        key: &LayerKey,
        predicate: FilterPredicate,
        revised: Option<LayerDescriptor>,
    ) {
        if !self.live("apply_filter") || !self.known(key, "apply_filter") {
            return;
        }
        self.revise(key, revised);

        if RenderStrategy::for_type(key.render_type).is_overlay() {
            self.registry.set_filter(key, Some(predicate));
            self.rebuild_overlay(key);
        } else {
            let layer_id = key.layer_id();
            if self.renderer.has_layer(&layer_id) {
                let result = self.renderer.set_filter(&layer_id, Some(&predicate));
                self.check("set_filter", &layer_id, result);
            } else {
                self.inconsistent("set_filter", &layer_id);
            }
            self.registry.set_filter(key, Some(predicate));
        }
        debug!("{key} filtered");
        self.refresh_gauges();
    }

    pub fn clear_filter(&mut self, key: &LayerKey, revised: Option<LayerDescriptor>) {
        if !self.live("clear_filter") || !self.known(key, "clear_filter") {
            return;
        }
        self.revise(key, revised);
        self.registry.set_filter(key, None);

        if RenderStrategy::for_type(key.render_type).is_overlay() {
            self.rebuild_overlay(key);
        } else {
            let layer_id = key.layer_id();
            if self.renderer.has_layer(&layer_id) {
                let result = self.renderer.set_filter(&layer_id, None);
                self.check("set_filter", &layer_id, result);
            } else {
                self.inconsistent("set_filter", &layer_id);
            }
        }
        debug!("{key} filter cleared");
        self.refresh_gauges();
    }

    /// Route picker: one value selects that route by `model.<property>`,
    /// several values select every route not named in them.
    pub fn apply_route_selection(&mut self, key: &LayerKey, property: &str, values: &[Value]) {
        let predicate = match values {
            [single] => FilterPredicate::Equals {
                path: PropertyPath::nested("model", property),
                value: single.clone(),
            },
            _ => FilterPredicate::NotIn {
                path: PropertyPath::nested("model", "routeName"),
                values: values.to_vec(),
            },
        };
        self.apply_predicate(key, predicate, None);
    }

    pub fn show_time_selector(&mut self) {
        self.time_selector = true;
    }

    pub fn hide_time_selector(&mut self) {
        self.time_selector = false;
    }

    pub fn time_selector_visible(&self) -> bool {
        self.time_selector
    }

    /// Restricts an hourly dataset to `hour`, skipping placeholder rows.
    pub fn select_hour(&mut self, key: &LayerKey, hour: u32) {
        let predicate = FilterPredicate::All {
            parts: vec![
                FilterPredicate::equals("Hour", hour),
                FilterPredicate::NotEquals {
                    path: PropertyPath::parse("Day"),
                    value: Value::from("placeholder"),
                },
            ],
        };
        self.apply_predicate(key, predicate, None);
    }

    /// Removes every registered layer and its source, empties the loading
    /// set and dismisses the popup. Work still in flight becomes stale.
    pub fn clear_all_layers(&mut self) {
        if !self.live("clear_all_layers") {
            return;
        }
        let keys: Vec<LayerKey> = self
            .registry
            .keys()
            .iter()
            .chain(self.in_flight.iter())
            .cloned()
            .collect();
        for key in &keys {
            let layer_id = key.layer_id();
            if self.renderer.has_layer(&layer_id) {
                let result = self.renderer.remove_layer(&layer_id);
                self.check("remove_layer", &layer_id, result);
            }
            if RenderStrategy::for_type(key.render_type).is_overlay() {
                self.overlay.clear_layer(&layer_id);
            }
            let source_id = key.source_id();
            if self.renderer.has_source(&source_id) {
                let result = self.renderer.remove_source(&source_id);
                self.check("remove_source", &source_id, result);
            }
        }
        let removed = self.registry.len();
        self.forget_layers();
        self.close_popup();
        info!("cleared {removed} layers, now at epoch {}", self.epoch);
        self.refresh_gauges();
    }

    /// Leaves the map view. State is forgotten without touching the
    /// renderer, and every later operation is ignored until `initialize`.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.forget_layers();
        self.popup = None;
        self.events.reset();
        self.attached = false;
        info!("map store detached");
        self.refresh_gauges();
    }

    pub fn close_popup(&mut self) {
        if let Some(handle) = self.popup.take() {
            self.detail.unmount(handle);
        }
    }

    pub fn add_saved_location(&mut self, name: impl Into<String>) {
        if !self.live("add_saved_location") {
            return;
        }
        let location = SavedLocation::new(name, self.renderer.camera());
        debug!("saved location {}", location.name);
        self.locations.push(location);
    }

    pub fn go_to_location(&mut self, location: &SavedLocation) {
        if !self.live("go_to_location") {
            return;
        }
        self.renderer
            .ease_to(location.camera, self.config.ease_duration_ms);
    }

    pub fn remove_saved_location(&mut self, index: usize) -> Option<SavedLocation> {
        self.locations.remove(index)
    }

    pub fn saved_locations(&self) -> &[SavedLocation] {
        self.locations.as_slice()
    }

    /// Debounced renderer resize; a newer request replaces a pending one.
    pub fn request_resize(&mut self) {
        if !self.live("request_resize") {
            return;
        }
        if let Some(id) = self.resize_timer.take() {
            self.timers.cancel(id);
        }
        let due = self.now.after(self.config.resize_debounce_ms);
        self.resize_timer = Some(self.timers.schedule(due, Timer::Resize));
    }

    /// Per-frame hook: advances the overlay scene when any custom layer exists.
    pub fn render_frame(&mut self) {
        if !self.attached {
            return;
        }
        let has_custom = self
            .registry
            .keys()
            .iter()
            .any(|k| RenderStrategy::for_type(k.render_type).is_overlay());
        if has_custom {
            self.overlay.update();
        }
    }

    pub fn take_fetch_requests(&mut self) -> Vec<FetchRequest> {
        self.fetches.take_outbox()
    }

    pub fn pending_fetches(&self) -> usize {
        self.fetches.pending_len()
    }

    /// Resolves a fetch issued by this store. Unknown tickets are ignored.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<FeatureCollection, FetchError>,
    ) {
        let Some((dataset_id, purpose)) = self.fetches.complete(ticket) else {
            debug!("fetch ticket {} is unknown or already completed", ticket.0);
            return;
        };
        let epoch = match &purpose {
            FetchPurpose::Layer { epoch, .. } | FetchPurpose::Base { epoch, .. } => *epoch,
        };
        if !self.attached || epoch != self.epoch {
            self.metrics.incr(Counter::FetchesStale);
            debug!("dropping stale fetch of {dataset_id} (epoch {epoch})");
            return;
        }

        match (purpose, result) {
            (FetchPurpose::Layer { descriptor, .. }, Ok(data)) => {
                self.construct_layer(descriptor, data);
            }
            (FetchPurpose::Layer { descriptor, .. }, Err(err)) => {
                let key = descriptor.key();
                self.in_flight.remove(&key);
                self.hidden_in_flight.remove(&key);
                self.metrics.incr(Counter::FetchesFailed);
                warn!("{key} stays loading: {err}");
            }
            (FetchPurpose::Base { index, .. }, Ok(data)) => self.add_base_layer(index, data),
            (FetchPurpose::Base { .. }, Err(err)) => {
                self.metrics.incr(Counter::FetchesFailed);
                warn!("base layer unavailable: {err}");
            }
        }
        self.refresh_gauges();
    }

    /// Moves the store clock forward and fires every timer now due.
    pub fn advance_to(&mut self, now: Millis) {
        if now > self.now {
            self.now = now;
        }
        while let Some((id, timer)) = self.timers.pop_due(self.now) {
            match timer {
                Timer::Settle(task) => self.settle(task),
                Timer::Resize => {
                    if self.resize_timer == Some(id) {
                        self.resize_timer = None;
                    }
                    if self.attached {
                        self.renderer.resize();
                    } else {
                        debug!("resize dropped, store detached");
                    }
                }
            }
        }
        self.refresh_gauges();
    }

    pub fn advance_by(&mut self, delay_ms: u64) {
        self.advance_to(self.now.after(delay_ms));
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn next_timer_due(&self) -> Option<Millis> {
        self.timers.next_due()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn registered_keys(&self) -> &[LayerKey] {
        self.registry.keys()
    }

    pub fn visible_keys(&self) -> &[LayerKey] {
        self.registry.list_visible()
    }

    pub fn loading_tokens(&self) -> &[LoadingToken] {
        self.loading.tokens()
    }

    pub fn entry(&self, key: &LayerKey) -> Option<&RegistryEntry> {
        self.registry.get(key)
    }

    pub fn popup_open(&self) -> bool {
        self.popup.is_some()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    pub fn detail_view(&self) -> &D {
        &self.detail
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            attached: self.attached,
            registered: self.registry.keys().iter().map(LayerKey::layer_id).collect(),
            visible: self
                .registry
                .list_visible()
                .iter()
                .map(LayerKey::layer_id)
                .collect(),
            loading: self.loading.tokens().to_vec(),
            filters: self
                .registry
                .keys()
                .iter()
                .filter_map(|k| {
                    let filter = self.registry.get(k)?.filter.clone()?;
                    Some((k.layer_id(), filter))
                })
                .collect(),
            popup_open: self.popup.is_some(),
            time_selector: self.time_selector,
            saved_locations: self.locations.as_slice().to_vec(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn load_base_layers(&mut self) {
        for (index, base) in self.config.base_layers.iter().enumerate() {
            self.fetches.submit(
                base.dataset_id.clone(),
                FetchPurpose::Base {
                    epoch: self.epoch,
                    index,
                },
            );
            self.metrics.incr(Counter::FetchesIssued);
        }

        match &self.config.buildings {
            Some(_) if self.config.is_mobile() => debug!("3D buildings skipped on mobile"),
            Some(b) if !self.renderer.has_layer(&b.layer_id) => {
                let layer = VectorTileLayer {
                    id: b.layer_id.clone(),
                    tiles_url: b.tiles_url.clone(),
                    source_layer: b.source_layer.clone(),
                    min_zoom: b.min_zoom,
                    paint: b.paint.clone(),
                };
                let result = self.renderer.add_vector_tile_layer(&layer);
                self.check("add_vector_tile_layer", &layer.id, result);
            }
            _ => {}
        }

        for name in &self.config.symbol_images {
            let url = self.config.image_url(name);
            if let Err(err) = self.renderer.add_image(name, &url) {
                warn!("symbol image {name} not added: {err}");
            }
        }
        info!("style loaded, base layers requested");
    }

    fn add_base_layer(&mut self, index: usize, data: FeatureCollection) {
        let Some(base) = self.config.base_layers.get(index).cloned() else {
            return;
        };
        let id = base.dataset_id;
        if self.renderer.has_source(&id) || self.renderer.has_layer(&id) {
            self.inconsistent("add_source", &id);
            return;
        }
        let result = self.renderer.add_source(&id, data);
        self.check("add_source", &id, result);
        let layer = StandardLayer {
            id: id.clone(),
            source_id: id.clone(),
            render_type: base.render_type,
            paint: base.paint,
            layout: base.layout,
        };
        let result = self.renderer.add_layer(&layer);
        self.check("add_layer", &id, result);
    }

    fn construct_layer(&mut self, descriptor: LayerDescriptor, data: FeatureCollection) {
        let key = descriptor.key();
        if self.registry.has(&key) {
            debug!("{key} registered while its fetch was pending");
            self.finish_registration(&key);
            return;
        }

        let source_id = key.source_id();
        if self.renderer.has_source(&source_id) {
            self.inconsistent("add_source", &source_id);
        } else {
            let result = self.renderer.add_source(&source_id, data.clone());
            self.check("add_source", &source_id, result);
        }

        self.loading.begin(LoadingToken::Rendering);
        match self.strategies.plan(&descriptor, &data) {
            RenderPlan::Standard(layer) => {
                if self.renderer.has_layer(&layer.id) {
                    self.inconsistent("add_layer", &layer.id);
                } else {
                    let result = self.renderer.add_layer(&layer);
                    self.check("add_layer", &layer.id, result);
                }
                self.registry.register(descriptor, data);
                self.finish_registration(&key);
            }
            RenderPlan::Overlay(build) => {
                let generation = self.next_generation(&key);
                if key.render_type == RenderType::Arc && !self.overlay.context_ready() {
                    self.schedule_settle(SettleTask {
                        epoch: self.epoch,
                        key,
                        generation,
                        initial: Some((descriptor, data)),
                        build,
                    });
                } else {
                    self.install_overlay(&key, build);
                    self.registry.register(descriptor, data);
                    self.finish_registration(&key);
                    self.loading.end(&LoadingToken::Rendering);
                }
            }
        }
    }

    fn finish_registration(&mut self, key: &LayerKey) {
        self.in_flight.remove(key);
        self.loading.end(&LoadingToken::Layer(key.clone()));
        self.metrics.incr(Counter::LayersRegistered);
        if self.hidden_in_flight.remove(key) {
            let layer_id = key.layer_id();
            if self.renderer.has_layer(&layer_id) {
                let result = self.renderer.set_visibility(&layer_id, false);
                self.check("set_visibility", &layer_id, result);
            }
            self.registry.set_visible(key, false);
            info!("{key} registered hidden");
        } else {
            info!("{key} registered");
        }
    }

    /// Replaces the overlay objects of `key` from its retained superset and
    /// current filter.
    fn rebuild_overlay(&mut self, key: &LayerKey) {
        let Some(entry) = self.registry.get(key) else {
            return;
        };
        let data = match &entry.filter {
            Some(filter) => filter.apply(&entry.data),
            None => entry.data.clone(),
        };
        let build = self.strategies.overlay_build(&entry.descriptor, &data);

        let layer_id = key.layer_id();
        if self.renderer.has_layer(&layer_id) {
            let result = self.renderer.remove_layer(&layer_id);
            self.check("remove_layer", &layer_id, result);
        }
        self.overlay.clear_layer(&layer_id);
        self.metrics.incr(Counter::OverlayRebuilds);
        self.loading.begin(LoadingToken::Rendering);

        let generation = self.next_generation(key);
        if key.render_type == RenderType::Arc && !self.overlay.context_ready() {
            self.schedule_settle(SettleTask {
                epoch: self.epoch,
                key: key.clone(),
                generation,
                initial: None,
                build,
            });
        } else {
            self.install_overlay(key, build);
            self.loading.end(&LoadingToken::Rendering);
        }
        debug!("{key} rebuilt with {} features (generation {generation})", data.len());
    }

    fn schedule_settle(&mut self, task: SettleTask) {
        let delay = self.config.arc_settle_delay_ms();
        debug!(
            "{} settles in {delay} ms (generation {})",
            task.key, task.generation
        );
        self.settling.insert(task.key.clone());
        self.timers
            .schedule(self.now.after(delay), Timer::Settle(task));
    }

    fn settle(&mut self, task: SettleTask) {
        if !self.attached || task.epoch != self.epoch {
            self.metrics.incr(Counter::StaleSettlesDropped);
            debug!("{} settle from epoch {} dropped", task.key, task.epoch);
            return;
        }
        self.loading.end(&LoadingToken::Rendering);
        if self.generations.get(&task.key) != Some(&task.generation) {
            self.metrics.incr(Counter::StaleSettlesDropped);
            debug!(
                "{} settle generation {} superseded",
                task.key, task.generation
            );
            return;
        }

        let key = task.key;
        self.settling.remove(&key);
        match task.initial {
            Some((descriptor, data)) => {
                self.install_overlay(&key, task.build);
                self.registry.register(descriptor, data);
                self.finish_registration(&key);
            }
            None if self.registry.has(&key) => self.install_overlay(&key, task.build),
            None => self.inconsistent("add_custom_layer", &key.layer_id()),
        }
    }

    fn install_overlay(&mut self, key: &LayerKey, build: OverlayBuild) {
        let layer_id = build.layer_id;
        if !self.renderer.has_layer(&layer_id) {
            let result = self.renderer.add_custom_layer(&layer_id);
            self.check("add_custom_layer", &layer_id, result);
        }
        self.overlay.clear_layer(&layer_id);
        for object in build.objects {
            self.overlay.add_object(&layer_id, object);
        }
        if self.registry.has(key) && !self.registry.is_visible(key) {
            let result = self.renderer.set_visibility(&layer_id, false);
            self.check("set_visibility", &layer_id, result);
        }
    }

    fn handle_click(&mut self, point: ScreenPoint, lng_lat: LngLat) {
        self.close_popup();

        let layer_ids: Vec<String> = self
            .registry
            .list_visible()
            .iter()
            .map(LayerKey::layer_id)
            .collect();
        if layer_ids.is_empty() {
            return;
        }
        let hits = self.renderer.query_features_at(point, &layer_ids);
        let mut content = PopupContent::default();
        for hit in select_hits(hits, self.config.popup_limit) {
            let Some(entry) = self
                .registry
                .key_for_layer_id(&hit.layer_id)
                .and_then(|k| self.registry.get(k))
            else {
                continue;
            };
            content.descriptors.push(entry.descriptor.clone());
            content.features.push(hit.feature);
        }
        if content.features.is_empty() {
            return;
        }
        debug!("popup with {} features", content.features.len());
        self.popup = Some(self.detail.mount(lng_lat, content));
        self.metrics.incr(Counter::PopupsShown);
    }

    fn forget_layers(&mut self) {
        self.registry.clear();
        self.loading.clear();
        self.in_flight.clear();
        self.hidden_in_flight.clear();
        self.generations.clear();
        self.settling.clear();
        self.epoch += 1;
    }

    fn revise(&mut self, key: &LayerKey, revised: Option<LayerDescriptor>) {
        let Some(descriptor) = revised else {
            return;
        };
        if descriptor.key() != *key {
            warn!("ignoring revised descriptor {} for {key}", descriptor.key());
            return;
        }
        self.registry.revise_descriptor(descriptor);
    }

    fn next_generation(&mut self, key: &LayerKey) -> u64 {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// A registered arc whose rebuild has not settled has no renderer layer.
    fn awaiting_settle(&self, key: &LayerKey) -> bool {
        self.settling.contains(key)
    }

    fn live(&self, op: &str) -> bool {
        if !self.attached {
            debug!("{op} ignored, store detached");
        }
        self.attached
    }

    fn known(&self, key: &LayerKey, op: &str) -> bool {
        let known = self.registry.has(key);
        if !known {
            warn!("{op} on unregistered layer {key}");
        }
        known
    }

    fn inconsistent(&mut self, op: &str, id: &str) {
        self.metrics.incr(Counter::RendererInconsistencies);
        debug!("{op} dropped, renderer has no {id}");
    }

    fn check(&mut self, op: &str, id: &str, result: Result<(), RendererError>) {
        if let Err(err) = result {
            self.metrics.incr(Counter::RendererInconsistencies);
            debug!("{op} on {id} dropped: {err}");
        }
    }

    fn refresh_gauges(&mut self) {
        self.metrics
            .set_gauge(Gauge::RegisteredLayers, self.registry.len() as u64);
        self.metrics.set_gauge(
            Gauge::VisibleLayers,
            self.registry.list_visible().len() as u64,
        );
        self.metrics
            .set_gauge(Gauge::LoadingTokens, self.loading.len() as u64);
    }
}

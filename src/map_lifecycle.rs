//! Ownership of the map widget across panel expand/collapse cycles.
//!
//! The map library's resources are installed at most once per process. Each
//! time the panel expands, one map instance is created for the current event
//! collection; each time it collapses (or the collection changes) that
//! instance is destroyed. Instances are never reused.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MapConfig;
use crate::data::{marker_diameter, EventCollection, EventRecord, MagnitudeColor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn of(record: &EventRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }

    /// Arithmetic mean of every record's position.
    pub fn centroid(events: &[EventRecord]) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        let count = events.len() as f64;
        let latitude = events.iter().map(|e| e.latitude).sum::<f64>() / count;
        let longitude = events.iter().map(|e| e.longitude).sum::<f64>() / count;
        Some(Self { latitude, longitude })
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: f64,
}

/// Base raster layer every map instance is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub heading: String,
    pub date_time: String,
    pub location: String,
    pub depth: String,
    pub detail_link: Option<String>,
}

/// Everything a backend needs to draw one event's marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub index: usize,
    pub position: Coordinate,
    pub color: MagnitudeColor,
    pub diameter: f64,
    pub label: String,
    pub popup: PopupContent,
}

impl MarkerSpec {
    /// Widget size in pixels. Negative and NaN diameters become zero.
    pub fn pixel_size(&self) -> i32 {
        (self.diameter.round() as i32).max(0)
    }

    pub fn for_record(index: usize, record: &EventRecord) -> Self {
        Self {
            index,
            position: Coordinate::of(record),
            color: MagnitudeColor::for_magnitude(record.magnitude),
            diameter: marker_diameter(record.magnitude),
            label: record.magnitude_label(),
            popup: PopupContent {
                heading: format!("Magnitude {}", record.magnitude_label()),
                date_time: record.date_time.clone(),
                location: record.display_location(),
                depth: format!("Depth: {}", record.depth_label()),
                detail_link: record.detail_url().map(str::to_string),
            },
        }
    }
}

/// Seam between the lifecycle and a concrete map toolkit.
pub trait MapBackend: 'static {
    /// Where a map widget gets mounted.
    type Container: Clone + 'static;
    type Map: MapInstance;

    /// Whether the library's resources are already installed in this process.
    fn probe(&self) -> bool;

    /// Starts installing the library's resources. `done` runs once, after they are in place.
    fn load(&self, done: Box<dyn FnOnce()>);

    /// Returns `None` when the library is unavailable; the caller retries on its next run.
    fn create_map(
        &self,
        container: &Self::Container,
        viewport: Viewport,
        tiles: &TileSource,
    ) -> Option<Self::Map>;

    /// Runs `task` once after `delay`. Not cancellable.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

pub trait MapInstance: 'static {
    fn add_marker(&mut self, marker: MarkerSpec, on_click: Rc<dyn Fn()>);
    fn set_view(&mut self, viewport: Viewport);
    fn invalidate_size(&self);
    /// Detaches the widget and drops every marker, popup and handler.
    fn remove(self);
}

/// What the rest of the panel may ask of the live map.
pub trait MapControl {
    /// Re-centre on `record` at the focus zoom, if a map is live.
    fn focus(&self, record: &EventRecord);
    /// The container is being resized by a transition; recompute once it settles.
    fn layout_changed(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryState {
    Uninitialized,
    Loading,
    Ready,
}

struct LibraryCell {
    state: LibraryState,
    waiters: Vec<Box<dyn FnOnce()>>,
}

thread_local! {
    // The GTK main loop is single threaded, so thread-local is process-wide for us.
    static LIBRARY: RefCell<LibraryCell> = RefCell::new(LibraryCell {
        state: LibraryState::Uninitialized,
        waiters: Vec::new(),
    });
}

pub fn library_state() -> LibraryState {
    LIBRARY.with(|cell| cell.borrow().state)
}

/// Runs `ready` once the library is usable, loading it first if nobody has.
fn when_library_ready<B: MapBackend>(backend: &B, ready: Box<dyn FnOnce()>) {
    match library_state() {
        LibraryState::Ready => ready(),
        LibraryState::Loading => LIBRARY.with(|cell| cell.borrow_mut().waiters.push(ready)),
        LibraryState::Uninitialized => {
            if backend.probe() {
                debug!("Map library already present");
                LIBRARY.with(|cell| cell.borrow_mut().state = LibraryState::Ready);
                ready();
                return;
            }
            LIBRARY.with(|cell| {
                let mut cell = cell.borrow_mut();
                cell.state = LibraryState::Loading;
                cell.waiters.push(ready);
            });
            info!("Loading map library");
            backend.load(Box::new(finish_library_load));
        }
    }
}

fn finish_library_load() {
    let waiters = LIBRARY.with(|cell| {
        let mut cell = cell.borrow_mut();
        cell.state = LibraryState::Ready;
        std::mem::take(&mut cell.waiters)
    });
    debug!("Map library ready, {} initialization(s) waiting", waiters.len());
    for waiter in waiters {
        waiter();
    }
}

#[cfg(test)]
pub(crate) fn reset_library_state() {
    LIBRARY.with(|cell| {
        let mut cell = cell.borrow_mut();
        cell.state = LibraryState::Uninitialized;
        cell.waiters.clear();
    });
}

struct LiveMap<M> {
    map: M,
    generation: u64,
    markers: usize,
}

struct Lifecycle<B: MapBackend> {
    expanded: bool,
    container: Option<B::Container>,
    events: EventCollection,
    live: Option<LiveMap<B::Map>>,
    generation: u64,
}

pub struct MapLifecycleManager<B: MapBackend> {
    backend: B,
    tiles: TileSource,
    initial_zoom: f64,
    focus_zoom: f64,
    settle_delay: Duration,
    sidebar_transition: Duration,
    this: Weak<Self>,
    state: RefCell<Lifecycle<B>>,
    marker_handler: RefCell<Option<Rc<dyn Fn(usize)>>>,
}

impl<B: MapBackend> MapLifecycleManager<B> {
    pub fn new(backend: B, config: &MapConfig) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            backend,
            tiles: TileSource {
                url_template: config.tile_url.clone(),
                attribution: config.attribution.clone(),
                max_zoom: config.max_zoom,
            },
            initial_zoom: config.initial_zoom,
            focus_zoom: config.focus_zoom,
            settle_delay: config.settle_delay(),
            sidebar_transition: config.sidebar_transition(),
            this: this.clone(),
            state: RefCell::new(Lifecycle {
                expanded: false,
                container: None,
                events: EventCollection::default(),
                live: None,
                generation: 0,
            }),
            marker_handler: RefCell::new(None),
        })
    }

    pub fn on_marker_click(&self, handler: impl Fn(usize) + 'static) {
        *self.marker_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Mounts into `container` and builds a fresh map once the library is ready.
    pub fn acquire(&self, container: B::Container, events: EventCollection) {
        self.teardown();
        {
            let mut state = self.state.borrow_mut();
            state.expanded = true;
            state.container = Some(container);
            state.events = events;
        }
        self.sync();
    }

    /// Destroys the live map. A pending library load will find nothing to do.
    pub fn release(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.expanded = false;
            state.container = None;
        }
        self.teardown();
    }

    /// A different collection rebuilds the map from scratch.
    pub fn set_events(&self, events: EventCollection) {
        {
            let mut state = self.state.borrow_mut();
            if state.events.same_as(&events) {
                return;
            }
            state.events = events;
        }
        self.teardown();
        self.sync();
    }

    pub fn is_live(&self) -> bool {
        self.state.borrow().live.is_some()
    }

    #[cfg(test)]
    pub fn marker_count(&self) -> usize {
        self.state.borrow().live.as_ref().map_or(0, |live| live.markers)
    }

    fn sync(&self) {
        if !self.state.borrow().expanded {
            return;
        }
        let this = self.this.clone();
        when_library_ready(
            &self.backend,
            Box::new(move || {
                if let Some(manager) = this.upgrade() {
                    manager.initialize();
                }
            }),
        );
    }

    fn initialize(&self) {
        let mut state = self.state.borrow_mut();
        if !state.expanded || state.live.is_some() {
            return;
        }
        let Some(container) = state.container.clone() else {
            debug!("No container mounted yet, map initialization deferred");
            return;
        };
        let Some(center) = Coordinate::centroid(&state.events) else {
            debug!("No events, skipping map initialization");
            return;
        };

        let viewport = Viewport {
            center,
            zoom: self.initial_zoom,
        };
        let Some(mut map) = self.backend.create_map(&container, viewport, &self.tiles) else {
            debug!("Map library unavailable, initialization skipped");
            return;
        };

        let events = state.events.clone();
        for (index, record) in events.iter().enumerate() {
            let this = self.this.clone();
            map.add_marker(
                MarkerSpec::for_record(index, record),
                Rc::new(move || {
                    if let Some(manager) = this.upgrade() {
                        manager.marker_clicked(index);
                    }
                }),
            );
        }

        state.generation += 1;
        let generation = state.generation;
        state.live = Some(LiveMap {
            map,
            generation,
            markers: events.len(),
        });
        drop(state);

        info!(
            "Map created at ({:.3}, {:.3}) with {} markers",
            center.latitude,
            center.longitude,
            events.len()
        );
        self.recompute_size_after(self.settle_delay);
    }

    fn marker_clicked(&self, index: usize) {
        let handler = self.marker_handler.borrow().clone();
        if let Some(handler) = handler {
            handler(index);
        }
    }

    fn recompute_size_after(&self, delay: Duration) {
        let Some(generation) = self.state.borrow().live.as_ref().map(|live| live.generation) else {
            return;
        };
        let this = self.this.clone();
        self.backend.schedule(
            delay,
            Box::new(move || {
                let Some(manager) = this.upgrade() else {
                    return;
                };
                let state = manager.state.borrow();
                match &state.live {
                    Some(live) if live.generation == generation => live.map.invalidate_size(),
                    _ => debug!("Map instance gone before resize timer fired"),
                }
            }),
        );
    }

    fn teardown(&self) {
        let live = self.state.borrow_mut().live.take();
        if let Some(live) = live {
            live.map.remove();
            debug!("Map instance with {} markers released", live.markers);
        }
    }
}

impl<B: MapBackend> MapControl for MapLifecycleManager<B> {
    fn focus(&self, record: &EventRecord) {
        let mut state = self.state.borrow_mut();
        if let Some(live) = state.live.as_mut() {
            live.map.set_view(Viewport {
                center: Coordinate::of(record),
                zoom: self.focus_zoom,
            });
        }
    }

    fn layout_changed(&self) {
        if self.state.borrow().expanded {
            self.recompute_size_after(self.sidebar_transition);
        }
    }
}

impl<B: MapBackend> Drop for MapLifecycleManager<B> {
    fn drop(&mut self) {
        if let Some(live) = self.state.get_mut().live.take() {
            live.map.remove();
        }
    }
}

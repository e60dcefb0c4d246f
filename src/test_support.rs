//! In-memory map backend. Records what the lifecycle asks of it and lets
//! tests fire library loads, timers and marker clicks by hand.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::map_lifecycle::{self, MapBackend, MapInstance, MarkerSpec, TileSource, Viewport};

#[derive(Default)]
pub struct World {
    pub installed: Cell<bool>,
    /// Keep the library missing even after a load completes.
    pub unavailable_after_load: Cell<bool>,
    pub loads_started: Cell<usize>,
    pending_load: RefCell<Option<Box<dyn FnOnce()>>>,
    timers: RefCell<Vec<(Duration, Box<dyn FnOnce()>)>>,
    pub maps: RefCell<Vec<Rc<FakeMapState>>>,
}

impl World {
    pub fn finish_load(&self) {
        if !self.unavailable_after_load.get() {
            self.installed.set(true);
        }
        let done = self.pending_load.borrow_mut().take();
        if let Some(done) = done {
            done();
        }
    }

    pub fn pending_timers(&self) -> Vec<Duration> {
        self.timers.borrow().iter().map(|(delay, _)| *delay).collect()
    }

    pub fn run_timers(&self) {
        let timers = std::mem::take(&mut *self.timers.borrow_mut());
        for (_, task) in timers {
            task();
        }
    }

    pub fn map_count(&self) -> usize {
        self.maps.borrow().len()
    }

    pub fn last_map(&self) -> Rc<FakeMapState> {
        self.maps.borrow().last().cloned().expect("no map was created")
    }
}

#[derive(Clone)]
pub struct FakeBackend {
    pub world: Rc<World>,
}

impl FakeBackend {
    /// Library already installed.
    pub fn ready() -> Self {
        let backend = Self::unloaded();
        backend.world.installed.set(true);
        backend
    }

    pub fn unloaded() -> Self {
        map_lifecycle::reset_library_state();
        Self {
            world: Rc::new(World::default()),
        }
    }
}

pub struct FakeMapState {
    pub container: u32,
    pub tiles: TileSource,
    pub viewport: Cell<Viewport>,
    pub view_changes: Cell<usize>,
    pub markers: RefCell<Vec<MarkerSpec>>,
    clicks: RefCell<Vec<Rc<dyn Fn()>>>,
    pub invalidations: Cell<usize>,
    pub removed: Cell<bool>,
}

impl FakeMapState {
    pub fn click(&self, index: usize) {
        let handler = self.clicks.borrow()[index].clone();
        handler();
    }
}

pub struct FakeMap(Rc<FakeMapState>);

impl MapInstance for FakeMap {
    fn add_marker(&mut self, marker: MarkerSpec, on_click: Rc<dyn Fn()>) {
        self.0.markers.borrow_mut().push(marker);
        self.0.clicks.borrow_mut().push(on_click);
    }

    fn set_view(&mut self, viewport: Viewport) {
        self.0.viewport.set(viewport);
        self.0.view_changes.set(self.0.view_changes.get() + 1);
    }

    fn invalidate_size(&self) {
        self.0.invalidations.set(self.0.invalidations.get() + 1);
    }

    fn remove(self) {
        self.0.removed.set(true);
        self.0.clicks.borrow_mut().clear();
    }
}

impl MapBackend for FakeBackend {
    type Container = u32;
    type Map = FakeMap;

    fn probe(&self) -> bool {
        self.world.installed.get()
    }

    fn load(&self, done: Box<dyn FnOnce()>) {
        self.world.loads_started.set(self.world.loads_started.get() + 1);
        *self.world.pending_load.borrow_mut() = Some(done);
    }

    fn create_map(
        &self,
        container: &u32,
        viewport: Viewport,
        tiles: &TileSource,
    ) -> Option<FakeMap> {
        if !self.world.installed.get() {
            return None;
        }
        let state = Rc::new(FakeMapState {
            container: *container,
            tiles: tiles.clone(),
            viewport: Cell::new(viewport),
            view_changes: Cell::new(0),
            markers: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            invalidations: Cell::new(0),
            removed: Cell::new(false),
        });
        self.world.maps.borrow_mut().push(state.clone());
        Some(FakeMap(state))
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        self.world.timers.borrow_mut().push((delay, task));
    }
}

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

use crate::data::EventCollection;
use crate::map_lifecycle::{MapBackend, MapControl, MapLifecycleManager};
use crate::selection::SelectionCoordinator;
use crate::sidebar::SidebarCollapseController;

/// The two collapse flags of the panel.
///
/// `panel_expanded` decides whether the map and list exist at all; a live map
/// always implies it. `sidebar_collapsed` only hides the list pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityState {
    panel_expanded: bool,
    sidebar_collapsed: bool,
}

impl VisibilityState {
    pub fn panel_expanded(self) -> bool {
        self.panel_expanded
    }

    pub fn sidebar_collapsed(self) -> bool {
        self.sidebar_collapsed
    }

    pub fn with_panel_expanded(self, panel_expanded: bool) -> Self {
        Self {
            panel_expanded,
            ..self
        }
    }

    pub fn with_sidebar_collapsed(self, sidebar_collapsed: bool) -> Self {
        Self {
            sidebar_collapsed,
            ..self
        }
    }
}

/// Mounts and unmounts the map + list subtree.
///
/// The expanded flag is owned by the caller: clicking the header only invokes
/// `on_toggle`, and the caller answers with `expand` or `collapse`.
pub struct AccordionGate<B: MapBackend> {
    visibility: Rc<Cell<VisibilityState>>,
    map: Rc<MapLifecycleManager<B>>,
    selection: Rc<SelectionCoordinator>,
    sidebar: Rc<SidebarCollapseController>,
    events: RefCell<EventCollection>,
    on_toggle: Box<dyn Fn()>,
}

impl<B: MapBackend> AccordionGate<B> {
    pub fn new(map: Rc<MapLifecycleManager<B>>, on_toggle: impl Fn() + 'static) -> Self {
        let visibility = Rc::new(Cell::new(VisibilityState::default()));
        let map_control: Weak<dyn MapControl> = Rc::downgrade(&map) as Weak<dyn MapControl>;

        let selection = SelectionCoordinator::new();
        selection.attach_map(map_control.clone());
        let sidebar = SidebarCollapseController::new(visibility.clone(), map_control);

        let selection_weak = Rc::downgrade(&selection);
        map.on_marker_click(move |index| {
            if let Some(selection) = selection_weak.upgrade() {
                selection.select_from_marker(index);
            }
        });

        Self {
            visibility,
            map,
            selection,
            sidebar,
            events: RefCell::new(EventCollection::default()),
            on_toggle: Box::new(on_toggle),
        }
    }

    pub fn toggle_expanded(&self) {
        (self.on_toggle)();
    }

    pub fn expand(&self, container: B::Container) {
        if self.is_expanded() {
            debug!("Panel re-expanded into a new container");
        }
        self.visibility
            .set(self.visibility.get().with_panel_expanded(true));
        let events = self.events();
        self.selection.reset(events.clone());
        self.sidebar.reset();
        self.map.acquire(container, events);
        self.check_invariant();
    }

    pub fn collapse(&self) {
        if !self.is_expanded() {
            return;
        }
        self.visibility
            .set(self.visibility.get().with_panel_expanded(false));
        self.map.release();
        self.selection.reset(self.events());
        self.sidebar.reset();
        self.check_invariant();
    }

    /// Only a different collection (by identity) counts as a change.
    pub fn set_events(&self, events: EventCollection) {
        if self.events.borrow().same_as(&events) {
            return;
        }
        *self.events.borrow_mut() = events.clone();
        self.selection.reset(events.clone());
        self.map.set_events(events);
        self.check_invariant();
    }

    pub fn events(&self) -> EventCollection {
        self.events.borrow().clone()
    }

    pub fn count_label(&self) -> String {
        format!("{} events", self.events.borrow().len())
    }

    pub fn is_expanded(&self) -> bool {
        self.visibility.get().panel_expanded()
    }

    #[cfg(test)]
    pub fn visibility(&self) -> VisibilityState {
        self.visibility.get()
    }

    #[cfg(test)]
    pub fn map(&self) -> &Rc<MapLifecycleManager<B>> {
        &self.map
    }

    pub fn selection(&self) -> &Rc<SelectionCoordinator> {
        &self.selection
    }

    pub fn sidebar(&self) -> &Rc<SidebarCollapseController> {
        &self.sidebar
    }

    fn check_invariant(&self) {
        debug_assert!(
            !self.map.is_live() || self.is_expanded(),
            "map instance outlived the expanded panel"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::data::{record, EventRecord, MagnitudeColor};
    use crate::map_lifecycle::{Coordinate, MapLifecycleManager};
    use crate::test_support::FakeBackend;
    use std::time::Duration;

    fn gate(backend: &FakeBackend, records: Vec<EventRecord>) -> AccordionGate<FakeBackend> {
        let map = MapLifecycleManager::new(backend.clone(), &MapConfig::default());
        let gate = AccordionGate::new(map, || {});
        gate.set_events(EventCollection::new(records));
        gate
    }

    fn three_events() -> Vec<EventRecord> {
        vec![record(1.2, 9.0, 123.0), record(2.4, 10.0, 124.0), record(3.6, 11.0, 125.0)]
    }

    #[test]
    fn toggle_only_delegates_to_caller() {
        let backend = FakeBackend::ready();
        let map = MapLifecycleManager::new(backend.clone(), &MapConfig::default());
        let toggles = Rc::new(Cell::new(0));
        let counter = toggles.clone();
        let gate = AccordionGate::new(map, move || counter.set(counter.get() + 1));

        gate.toggle_expanded();
        gate.toggle_expanded();
        assert_eq!(toggles.get(), 2);
        assert!(!gate.is_expanded());
        assert_eq!(backend.world.map_count(), 0);
    }

    #[test]
    fn count_label_ignores_expansion() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        assert_eq!(gate.count_label(), "3 events");
        gate.expand(7);
        assert_eq!(gate.count_label(), "3 events");
        gate.collapse();
        assert_eq!(gate.count_label(), "3 events");
    }

    #[test]
    fn expand_mounts_map_into_container() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(7);

        assert!(gate.visibility().panel_expanded());
        assert_eq!(gate.map().marker_count(), 3);
        assert_eq!(backend.world.last_map().container, 7);
    }

    #[test]
    fn collapse_and_reexpand_leaves_no_stale_state() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);
        backend.world.last_map().click(2);
        gate.selection().toggle_row_detail(0);
        gate.sidebar().toggle_sidebar();

        gate.collapse();
        assert!(!gate.map().is_live());
        assert!(backend.world.last_map().removed.get());

        gate.expand(1);
        assert_eq!(backend.world.map_count(), 2);
        assert_eq!(backend.world.last_map().markers.borrow().len(), 3);
        assert_eq!(gate.selection().selected(), None);
        assert!(gate.selection().expanded_rows().is_empty());
        assert!(!gate.sidebar().is_collapsed());
    }

    #[test]
    fn empty_collection_expands_without_map() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, Vec::new());
        gate.expand(1);
        assert!(gate.is_expanded());
        assert!(!gate.map().is_live());
        assert_eq!(backend.world.map_count(), 0);
        assert_eq!(gate.count_label(), "0 events");
    }

    #[test]
    fn marker_click_selects_and_expands_without_camera_move() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);
        let map = backend.world.last_map();

        map.click(1);
        assert!(gate.selection().is_selected(1));
        assert!(gate.selection().is_expanded(1));
        assert_eq!(map.view_changes.get(), 0);
        assert_eq!(map.viewport.get().zoom, 8.0);
    }

    #[test]
    fn row_click_moves_camera_and_expands() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);

        gate.selection().select_from_row(2);
        let view = backend.world.last_map().viewport.get();
        assert_eq!(view.center, Coordinate { latitude: 11.0, longitude: 125.0 });
        assert_eq!(view.zoom, 10.0);
        assert!(gate.selection().is_selected(2));
        assert!(gate.selection().is_expanded(2));
    }

    #[test]
    fn twin_records_select_independently_through_markers() {
        let backend = FakeBackend::ready();
        let twin = record(2.0, 10.0, 124.0);
        let gate = gate(&backend, vec![twin.clone(), twin]);
        gate.expand(1);

        backend.world.last_map().click(1);
        assert!(gate.selection().is_selected(1));
        assert!(!gate.selection().is_selected(0));
    }

    #[test]
    fn new_collection_rebuilds_map_and_clears_selection() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);
        gate.selection().select_from_marker(0);

        gate.set_events(EventCollection::new(vec![record(4.0, 1.0, 1.0)]));
        assert_eq!(backend.world.map_count(), 2);
        assert_eq!(gate.map().marker_count(), 1);
        assert_eq!(gate.selection().selected(), None);
    }

    #[test]
    fn sidebar_toggle_resizes_after_transition() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);
        backend.world.run_timers();

        gate.sidebar().toggle_sidebar();
        assert!(gate.visibility().sidebar_collapsed());
        assert_eq!(backend.world.pending_timers(), vec![Duration::from_millis(300)]);
        backend.world.run_timers();
        assert_eq!(backend.world.last_map().invalidations.get(), 2);
    }

    #[test]
    fn sidebar_timer_after_collapse_is_absorbed() {
        let backend = FakeBackend::ready();
        let gate = gate(&backend, three_events());
        gate.expand(1);
        gate.sidebar().toggle_sidebar();
        gate.collapse();

        backend.world.run_timers();
        assert_eq!(backend.world.last_map().invalidations.get(), 0);
    }

    #[test]
    fn single_cebu_event_end_to_end() {
        let backend = FakeBackend::ready();
        let mut quake = record(5.2, 10.3, 123.9);
        quake.depth_km = Some(15);
        quake.location = "Off the coast\n of Cebu".to_string();
        quake.date_time = "Oct 5, 2025 - 14:30".to_string();
        let gate = gate(&backend, vec![quake]);
        gate.expand(1);

        let map = backend.world.last_map();
        {
            let markers = map.markers.borrow();
            assert_eq!(markers.len(), 1);
            assert_eq!(markers[0].color, MagnitudeColor::Red);
            assert_eq!(markers[0].diameter, 46.0);
            assert_eq!(markers[0].position, Coordinate { latitude: 10.3, longitude: 123.9 });
        }

        map.click(0);
        let (index, selected) = gate.selection().selected().unwrap();
        assert_eq!(index, 0);
        assert!(gate.selection().is_expanded(0));
        assert_eq!(selected.display_location(), "Off the coast of Cebu");
        assert_eq!(selected.time_of_day(), Some("14:30"));
    }
}

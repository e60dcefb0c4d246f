use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

use crate::data::{EventCollection, EventRecord};
use crate::map_lifecycle::MapControl;

/// Single owner of "which event is selected" and "which rows show details".
///
/// Records carry no stable id, so both are keyed by position in the current
/// collection. Two rows with identical field values are different selections.
pub struct SelectionCoordinator {
    events: RefCell<EventCollection>,
    selected: Cell<Option<usize>>,
    expanded: RefCell<BTreeSet<usize>>,
    map: RefCell<Option<Weak<dyn MapControl>>>,
    listeners: RefCell<Vec<Rc<dyn Fn()>>>,
}

impl SelectionCoordinator {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            events: RefCell::new(EventCollection::default()),
            selected: Cell::new(None),
            expanded: RefCell::new(BTreeSet::new()),
            map: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn attach_map(&self, map: Weak<dyn MapControl>) {
        *self.map.borrow_mut() = Some(map);
    }

    pub fn connect_changed(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// The map is already showing this marker, so the camera stays put.
    pub fn select_from_marker(&self, index: usize) {
        if self.select(index).is_some() {
            self.notify();
        }
    }

    pub fn select_from_row(&self, index: usize) {
        let Some(record) = self.select(index) else {
            return;
        };
        self.notify();

        let map = self.map.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(map) = map {
            map.focus(&record);
        }
    }

    /// Flips a row's detail section. Never touches the selection.
    pub fn toggle_row_detail(&self, index: usize) {
        {
            let mut expanded = self.expanded.borrow_mut();
            if !expanded.remove(&index) {
                expanded.insert(index);
            }
        }
        self.notify();
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get() == Some(index)
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.borrow().contains(&index)
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<(usize, EventRecord)> {
        let index = self.selected.get()?;
        self.events.borrow().get(index).cloned().map(|record| (index, record))
    }

    #[cfg(test)]
    pub fn expanded_rows(&self) -> Vec<usize> {
        self.expanded.borrow().iter().copied().collect()
    }

    /// Forgets everything and adopts `events` as the current collection.
    pub fn reset(&self, events: EventCollection) {
        *self.events.borrow_mut() = events;
        self.selected.set(None);
        self.expanded.borrow_mut().clear();
        self.notify();
    }

    fn select(&self, index: usize) -> Option<EventRecord> {
        let record = self.events.borrow().get(index).cloned();
        let Some(record) = record else {
            warn!(
                "Ignoring selection of row {} outside {} events",
                index,
                self.events.borrow().len()
            );
            return None;
        };
        debug!("Selected event {} ({})", index, record.display_location());
        self.selected.set(Some(index));
        self.expanded.borrow_mut().insert(index);
        Some(record)
    }

    fn notify(&self) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record;

    #[derive(Default)]
    struct RecordingMap {
        focused: RefCell<Vec<(f64, f64)>>,
    }

    impl MapControl for RecordingMap {
        fn focus(&self, record: &EventRecord) {
            self.focused.borrow_mut().push((record.latitude, record.longitude));
        }

        fn layout_changed(&self) {}
    }

    fn coordinator_with(records: Vec<EventRecord>) -> (Rc<SelectionCoordinator>, Rc<RecordingMap>) {
        let selection = SelectionCoordinator::new();
        let map = Rc::new(RecordingMap::default());
        let weak: Weak<dyn MapControl> = Rc::downgrade(&map) as Weak<dyn MapControl>;
        selection.attach_map(weak);
        selection.reset(EventCollection::new(records));
        (selection, map)
    }

    #[test]
    fn marker_selection_expands_row_without_focusing() {
        let (selection, map) = coordinator_with(vec![record(1.0, 1.0, 1.0), record(2.0, 2.0, 2.0)]);
        selection.select_from_marker(1);

        assert!(selection.is_selected(1));
        assert!(selection.is_expanded(1));
        assert!(map.focused.borrow().is_empty());
    }

    #[test]
    fn row_selection_focuses_map_and_expands_row() {
        let (selection, map) = coordinator_with(vec![record(1.0, 1.0, 1.0), record(2.0, 8.5, 126.0)]);
        selection.select_from_row(1);

        assert!(selection.is_selected(1));
        assert!(selection.is_expanded(1));
        assert_eq!(*map.focused.borrow(), vec![(8.5, 126.0)]);
    }

    #[test]
    fn toggling_detail_never_changes_selection() {
        let (selection, _map) = coordinator_with(vec![record(1.0, 1.0, 1.0), record(2.0, 2.0, 2.0)]);
        selection.select_from_row(0);

        selection.toggle_row_detail(0);
        assert!(selection.is_selected(0));
        assert!(!selection.is_expanded(0));

        selection.toggle_row_detail(1);
        assert!(selection.is_selected(0));
        assert!(!selection.is_selected(1));
        assert!(selection.is_expanded(1));
        assert_eq!(selection.expanded_rows(), vec![1]);
    }

    #[test]
    fn identical_records_are_distinct_selections() {
        let twin = record(2.5, 10.0, 124.0);
        let (selection, _map) = coordinator_with(vec![twin.clone(), twin]);
        selection.select_from_marker(0);

        assert!(selection.is_selected(0));
        assert!(!selection.is_selected(1));
        assert!(!selection.is_expanded(1));
        assert_eq!(selection.selected().map(|(index, _)| index), Some(0));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let (selection, map) = coordinator_with(vec![record(1.0, 1.0, 1.0)]);
        selection.select_from_row(5);
        selection.select_from_marker(5);

        assert_eq!(selection.selected(), None);
        assert!(selection.expanded_rows().is_empty());
        assert!(map.focused.borrow().is_empty());
    }

    #[test]
    fn reset_clears_selection_and_expanded_rows() {
        let (selection, _map) = coordinator_with(vec![record(1.0, 1.0, 1.0), record(2.0, 2.0, 2.0)]);
        selection.select_from_marker(0);
        selection.toggle_row_detail(1);

        selection.reset(EventCollection::new(vec![record(1.0, 1.0, 1.0)]));
        assert_eq!(selection.selected(), None);
        assert!(selection.expanded_rows().is_empty());
    }

    #[test]
    fn listeners_hear_every_change() {
        let (selection, _map) = coordinator_with(vec![record(1.0, 1.0, 1.0)]);
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        selection.connect_changed(move || counter.set(counter.get() + 1));

        selection.select_from_marker(0);
        selection.select_from_row(0);
        selection.toggle_row_detail(0);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn dropped_map_is_not_focused() {
        let (selection, map) = coordinator_with(vec![record(1.0, 1.0, 1.0)]);
        drop(map);
        selection.select_from_row(0);
        assert!(selection.is_selected(0));
    }
}

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

use crate::accordion::VisibilityState;
use crate::map_lifecycle::MapControl;

/// Collapses and restores the event list pane beside the map.
pub struct SidebarCollapseController {
    visibility: Rc<Cell<VisibilityState>>,
    map: Weak<dyn MapControl>,
    listeners: RefCell<Vec<Rc<dyn Fn(bool)>>>,
}

impl SidebarCollapseController {
    pub fn new(visibility: Rc<Cell<VisibilityState>>, map: Weak<dyn MapControl>) -> Rc<Self> {
        Rc::new(Self {
            visibility,
            map,
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Listeners receive the new collapsed flag.
    pub fn connect_changed(&self, listener: impl Fn(bool) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn is_collapsed(&self) -> bool {
        self.visibility.get().sidebar_collapsed()
    }

    /// The map cannot see the pane's width animation, so it is told to
    /// recompute its size once the transition is over.
    pub fn toggle_sidebar(&self) {
        let collapsed = !self.is_collapsed();
        self.set_collapsed(collapsed);
        if let Some(map) = self.map.upgrade() {
            map.layout_changed();
        }
    }

    pub fn reset(&self) {
        if self.is_collapsed() {
            self.set_collapsed(false);
        }
    }

    fn set_collapsed(&self, collapsed: bool) {
        self.visibility
            .set(self.visibility.get().with_sidebar_collapsed(collapsed));
        debug!("Sidebar {}", if collapsed { "collapsed" } else { "expanded" });
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(collapsed);
        }
    }
}

/// Horizontal offset of the floating toggle button: docked to the pane's
/// edge while it is open, to the container's edge once it is collapsed.
pub fn toggle_offset(collapsed: bool, pane_width: i32) -> i32 {
    if collapsed {
        0
    } else {
        pane_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EventRecord;

    #[derive(Default)]
    struct CountingMap {
        layouts: Cell<usize>,
    }

    impl MapControl for CountingMap {
        fn focus(&self, _record: &EventRecord) {}

        fn layout_changed(&self) {
            self.layouts.set(self.layouts.get() + 1);
        }
    }

    fn controller() -> (Rc<SidebarCollapseController>, Rc<CountingMap>, Rc<Cell<VisibilityState>>) {
        let visibility = Rc::new(Cell::new(VisibilityState::default().with_panel_expanded(true)));
        let map = Rc::new(CountingMap::default());
        let weak: Weak<dyn MapControl> = Rc::downgrade(&map) as Weak<dyn MapControl>;
        (SidebarCollapseController::new(visibility.clone(), weak), map, visibility)
    }

    #[test]
    fn toggle_flips_flag_and_asks_for_resize() {
        let (sidebar, map, visibility) = controller();
        assert!(!sidebar.is_collapsed());

        sidebar.toggle_sidebar();
        assert!(sidebar.is_collapsed());
        assert!(visibility.get().sidebar_collapsed());
        assert!(visibility.get().panel_expanded());
        assert_eq!(map.layouts.get(), 1);

        sidebar.toggle_sidebar();
        assert!(!sidebar.is_collapsed());
        assert_eq!(map.layouts.get(), 2);
    }

    #[test]
    fn listeners_receive_new_state() {
        let (sidebar, _map, _visibility) = controller();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        sidebar.connect_changed(move |collapsed| sink.borrow_mut().push(collapsed));

        sidebar.toggle_sidebar();
        sidebar.toggle_sidebar();
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn reset_reopens_without_resizing() {
        let (sidebar, map, _visibility) = controller();
        sidebar.toggle_sidebar();
        sidebar.reset();
        assert!(!sidebar.is_collapsed());
        assert_eq!(map.layouts.get(), 1);
    }

    #[test]
    fn toggle_button_tracks_collapsed_flag() {
        assert_eq!(toggle_offset(false, 320), 320);
        assert_eq!(toggle_offset(true, 320), 0);
    }
}

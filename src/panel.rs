use gtk::prelude::*;
use gtk::{Label, ListBox, Orientation, ScrolledWindow};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::accordion::AccordionGate;
use crate::config::MapConfig;
use crate::data::{EventCollection, EventRecord, MagnitudeColor, NO_EVENTS_MESSAGE};
use crate::map_lifecycle::MapLifecycleManager;
use crate::shumate_backend::ShumateBackend;
use crate::sidebar::toggle_offset;

const CONTENT_HEIGHT: i32 = 600;

pub struct PanelProps {
    pub title: String,
    pub subtitle: String,
    /// Extra CSS classes, purely cosmetic
    pub header_css_class: Option<String>,
    pub content_css_class: Option<String>,
}

/// Collapsible card holding the event list and the marker map side by side.
///
/// Expansion is controlled from outside: clicking the header calls the
/// `on_toggle` callback, which is expected to answer with `set_expanded`.
#[derive(Clone)]
pub struct EarthquakePanel {
    inner: Rc<PanelInner>,
}

struct PanelInner {
    root: gtk::Box,
    count_label: Label,
    chevron: gtk::Image,
    gate: AccordionGate<ShumateBackend>,
    content: RefCell<Option<PanelContent>>,
    content_css_class: Option<String>,
    sidebar_width: i32,
    sidebar_transition_ms: u32,
}

/// Widgets that only exist while the panel is expanded.
struct PanelContent {
    root: gtk::Box,
    sidebar_revealer: gtk::Revealer,
    sidebar_toggle: gtk::Button,
    sidebar_count: Label,
    list_holder: gtk::Box,
    rows: Vec<EventRow>,
}

struct EventRow {
    row: gtk::ListBoxRow,
    detail: gtk::Revealer,
    toggle: gtk::Button,
}

impl EarthquakePanel {
    pub fn new(props: PanelProps, map_config: &MapConfig, on_toggle: impl Fn() + 'static) -> Self {
        let root = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .build();
        root.add_css_class("quake-panel");

        // Accordion header
        let header = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(16)
            .margin_top(16)
            .margin_bottom(16)
            .margin_start(16)
            .margin_end(16)
            .build();
        header.add_css_class("quake-panel-header");
        if let Some(class) = &props.header_css_class {
            header.add_css_class(class);
        }

        let titles = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(4)
            .hexpand(true)
            .build();
        let title_label = Label::builder()
            .label(&props.title)
            .xalign(0.0)
            .build();
        title_label.add_css_class("title-3");
        let subtitle_label = Label::builder()
            .label(&props.subtitle)
            .xalign(0.0)
            .build();
        subtitle_label.add_css_class("dim-label");
        titles.append(&title_label);
        titles.append(&subtitle_label);

        let count_label = Label::builder()
            .label("0 events")
            .build();
        count_label.add_css_class("dim-label");
        let chevron = gtk::Image::from_icon_name("pan-down-symbolic");

        header.append(&titles);
        header.append(&count_label);
        header.append(&chevron);
        root.append(&header);

        let manager = MapLifecycleManager::new(ShumateBackend::new(), map_config);
        let gate = AccordionGate::new(manager, on_toggle);

        let inner = Rc::new(PanelInner {
            root,
            count_label,
            chevron,
            gate,
            content: RefCell::new(None),
            content_css_class: props.content_css_class,
            sidebar_width: map_config.sidebar_width,
            sidebar_transition_ms: u32::try_from(map_config.sidebar_transition_ms).unwrap_or(u32::MAX),
        });

        let gesture = gtk::GestureClick::new();
        let inner_weak = Rc::downgrade(&inner);
        gesture.connect_released(move |_, _, _, _| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.gate.toggle_expanded();
            }
        });
        header.add_controller(gesture);

        let inner_weak = Rc::downgrade(&inner);
        inner.gate.selection().connect_changed(move || {
            if let Some(inner) = inner_weak.upgrade() {
                inner.refresh_rows();
            }
        });

        let inner_weak = Rc::downgrade(&inner);
        inner.gate.sidebar().connect_changed(move |collapsed| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.apply_sidebar(collapsed);
            }
        });

        Self { inner }
    }

    pub fn widget(&self) -> &gtk::Box {
        &self.inner.root
    }

    /// Builds or destroys the map + list subtree.
    pub fn set_expanded(&self, expanded: bool) {
        let inner = &self.inner;
        if expanded == inner.gate.is_expanded() {
            return;
        }
        inner.chevron.set_icon_name(Some(if expanded {
            "pan-up-symbolic"
        } else {
            "pan-down-symbolic"
        }));

        if expanded {
            let (content, map_container) = inner.build_content();
            inner.root.append(&content.root);
            *inner.content.borrow_mut() = Some(content);
            inner.gate.expand(map_container);
        } else {
            inner.gate.collapse();
            let content = inner.content.borrow_mut().take();
            if let Some(content) = content {
                inner.root.remove(&content.root);
            }
        }
        debug!("Panel {}", if expanded { "expanded" } else { "collapsed" });
    }

    pub fn set_events(&self, events: EventCollection) {
        let inner = &self.inner;
        if inner.gate.events().same_as(&events) {
            return;
        }
        inner.gate.set_events(events);
        inner.count_label.set_label(&inner.gate.count_label());
        inner.rebuild_list();
    }
}

impl PanelInner {
    /// Returns the new subtree and the empty box the map gets mounted into.
    fn build_content(self: &Rc<Self>) -> (PanelContent, gtk::Box) {
        let root = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .build();
        root.add_css_class("quake-panel-content");
        if let Some(class) = &self.content_css_class {
            root.add_css_class(class);
        }

        let overlay = gtk::Overlay::builder()
            .height_request(CONTENT_HEIGHT)
            .build();
        let body = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .build();

        // Sidebar with the event list
        let sidebar = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .width_request(self.sidebar_width)
            .build();
        sidebar.add_css_class("quake-sidebar");

        let sidebar_header = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(2)
            .margin_top(16)
            .margin_bottom(12)
            .margin_start(16)
            .margin_end(16)
            .build();
        let sidebar_title = Label::builder()
            .label("Recent Earthquakes")
            .xalign(0.0)
            .build();
        sidebar_title.add_css_class("title-4");
        let sidebar_count = Label::builder()
            .xalign(0.0)
            .build();
        sidebar_count.add_css_class("dim-label");
        sidebar_header.append(&sidebar_title);
        sidebar_header.append(&sidebar_count);

        let scrolled = ScrolledWindow::builder()
            .vexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .build();
        let list_holder = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .build();
        scrolled.set_child(Some(&list_holder));

        sidebar.append(&sidebar_header);
        sidebar.append(&scrolled);

        let sidebar_revealer = gtk::Revealer::builder()
            .transition_type(gtk::RevealerTransitionType::SlideRight)
            .transition_duration(self.sidebar_transition_ms)
            .reveal_child(true)
            .child(&sidebar)
            .build();

        // Map area with the legend floating bottom-right
        let map_overlay = gtk::Overlay::builder()
            .hexpand(true)
            .vexpand(true)
            .build();
        let map_container = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .hexpand(true)
            .vexpand(true)
            .build();
        map_container.add_css_class("quake-map");
        map_overlay.set_child(Some(&map_container));
        map_overlay.add_overlay(&create_legend());

        body.append(&sidebar_revealer);
        body.append(&map_overlay);
        overlay.set_child(Some(&body));

        // Floating button that follows the sidebar's edge
        let sidebar_toggle = gtk::Button::builder()
            .icon_name("go-previous-symbolic")
            .tooltip_text("Hide event list")
            .halign(gtk::Align::Start)
            .valign(gtk::Align::Center)
            .margin_start(toggle_offset(false, self.sidebar_width))
            .build();
        sidebar_toggle.add_css_class("sidebar-toggle");
        let inner_weak = Rc::downgrade(self);
        sidebar_toggle.connect_clicked(move |_| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.gate.sidebar().toggle_sidebar();
            }
        });
        overlay.add_overlay(&sidebar_toggle);

        root.append(&overlay);

        let events = self.gate.events();
        sidebar_count.set_label(&sidebar_count_label(events.len()));
        let rows = self.fill_list(&list_holder, &events);

        let content = PanelContent {
            root,
            sidebar_revealer,
            sidebar_toggle,
            sidebar_count,
            list_holder,
            rows,
        };
        (content, map_container)
    }

    fn rebuild_list(self: &Rc<Self>) {
        {
            let mut content = self.content.borrow_mut();
            let Some(content) = content.as_mut() else {
                return;
            };

            while let Some(child) = content.list_holder.first_child() {
                content.list_holder.remove(&child);
            }
            let events = self.gate.events();
            content
                .sidebar_count
                .set_label(&sidebar_count_label(events.len()));
            content.rows = self.fill_list(&content.list_holder, &events);
        }
        self.refresh_rows();
    }

    fn fill_list(self: &Rc<Self>, holder: &gtk::Box, events: &[EventRecord]) -> Vec<EventRow> {
        if let Some(message) = list_placeholder(events) {
            let placeholder = Label::builder()
                .label(message)
                .margin_top(16)
                .margin_bottom(16)
                .build();
            placeholder.add_css_class("dim-label");
            holder.append(&placeholder);
            return Vec::new();
        }

        let list = ListBox::builder()
            .selection_mode(gtk::SelectionMode::None)
            .build();
        list.add_css_class("quake-list");

        let rows: Vec<EventRow> = events
            .iter()
            .enumerate()
            .map(|(index, record)| self.create_event_row(index, record))
            .collect();
        for event_row in &rows {
            list.append(&event_row.row);
        }

        // Rows activate on click; the detail toggle button swallows its own clicks
        let inner_weak = Rc::downgrade(self);
        list.connect_row_activated(move |_, row| {
            let Ok(index) = usize::try_from(row.index()) else {
                return;
            };
            if let Some(inner) = inner_weak.upgrade() {
                inner.gate.selection().select_from_row(index);
            }
        });

        holder.append(&list);
        rows
    }

    fn create_event_row(self: &Rc<Self>, index: usize, record: &EventRecord) -> EventRow {
        let row = gtk::ListBoxRow::builder()
            .activatable(true)
            .build();
        row.add_css_class("quake-row");

        let row_box = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .build();

        let summary = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .margin_top(12)
            .margin_bottom(12)
            .margin_start(16)
            .margin_end(12)
            .build();

        let info = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(4)
            .hexpand(true)
            .build();

        let meta = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .build();
        let badge = Label::builder()
            .label(&format!("M {}", record.magnitude_label()))
            .build();
        badge.add_css_class("magnitude-badge");
        badge.add_css_class(MagnitudeColor::for_magnitude(record.magnitude).css_class());
        meta.append(&badge);
        if let Some(time) = record.time_of_day() {
            let time_label = Label::builder()
                .label(time)
                .build();
            time_label.add_css_class("caption");
            time_label.add_css_class("dim-label");
            meta.append(&time_label);
        }
        info.append(&meta);

        let location = Label::builder()
            .label(&record.display_location())
            .xalign(0.0)
            .wrap(true)
            .wrap_mode(gtk::pango::WrapMode::WordChar)
            .build();
        location.add_css_class("quake-location");
        info.append(&location);

        let toggle = gtk::Button::builder()
            .icon_name("pan-down-symbolic")
            .valign(gtk::Align::Start)
            .tooltip_text("Show details")
            .build();
        toggle.add_css_class("flat");
        let inner_weak = Rc::downgrade(self);
        toggle.connect_clicked(move |_| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.gate.selection().toggle_row_detail(index);
            }
        });

        summary.append(&info);
        summary.append(&toggle);

        let detail = gtk::Revealer::builder()
            .transition_type(gtk::RevealerTransitionType::SlideDown)
            .reveal_child(false)
            .child(&create_detail_box(record))
            .build();

        row_box.append(&summary);
        row_box.append(&detail);
        row.set_child(Some(&row_box));

        EventRow { row, detail, toggle }
    }

    fn refresh_rows(&self) {
        let content = self.content.borrow();
        let Some(content) = content.as_ref() else {
            return;
        };
        let selection = self.gate.selection();
        for (index, event_row) in content.rows.iter().enumerate() {
            if selection.is_selected(index) {
                event_row.row.add_css_class("selected-event");
            } else {
                event_row.row.remove_css_class("selected-event");
            }
            let expanded = selection.is_expanded(index);
            event_row.detail.set_reveal_child(expanded);
            event_row.toggle.set_icon_name(if expanded {
                "pan-up-symbolic"
            } else {
                "pan-down-symbolic"
            });
        }
    }

    fn apply_sidebar(&self, collapsed: bool) {
        let content = self.content.borrow();
        let Some(content) = content.as_ref() else {
            return;
        };
        content.sidebar_revealer.set_reveal_child(!collapsed);
        content
            .sidebar_toggle
            .set_margin_start(toggle_offset(collapsed, self.sidebar_width));
        if collapsed {
            content.sidebar_toggle.set_icon_name("go-next-symbolic");
            content.sidebar_toggle.set_tooltip_text(Some("Show event list"));
        } else {
            content.sidebar_toggle.set_icon_name("go-previous-symbolic");
            content.sidebar_toggle.set_tooltip_text(Some("Hide event list"));
        }
    }
}

/// Text shown in place of the list when there is nothing to list.
fn list_placeholder(events: &[EventRecord]) -> Option<&'static str> {
    events.is_empty().then_some(NO_EVENTS_MESSAGE)
}

fn sidebar_count_label(count: usize) -> String {
    format!("{} events recorded", count)
}

fn create_detail_box(record: &EventRecord) -> gtk::Box {
    let detail_box = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(8)
        .margin_start(16)
        .margin_end(16)
        .margin_bottom(16)
        .build();
    detail_box.add_css_class("quake-detail");

    let fields = [
        ("Date & Time:", record.date_time.clone()),
        ("Depth:", record.depth_label()),
        ("Coordinates:", record.coordinates_label()),
        ("Location:", record.display_location()),
    ];
    for (name, value) in fields {
        let line = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .build();
        let name_label = Label::builder()
            .label(name)
            .xalign(0.0)
            .valign(gtk::Align::Start)
            .build();
        name_label.add_css_class("quake-detail-name");
        let value_label = Label::builder()
            .label(&value)
            .xalign(0.0)
            .wrap(true)
            .hexpand(true)
            .build();
        line.append(&name_label);
        line.append(&value_label);
        detail_box.append(&line);
    }

    if let Some(url) = record.detail_url() {
        let url = url.to_string();
        let details_button = gtk::Button::builder()
            .label("View Full Details")
            .halign(gtk::Align::Start)
            .build();
        details_button.add_css_class("link");
        details_button.connect_clicked(move |_| {
            if let Err(e) = open::that(&url) {
                warn!("Failed to open URL: {}", e);
            }
        });
        detail_box.append(&details_button);
    }

    detail_box
}

fn create_legend() -> gtk::Box {
    let legend = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(4)
        .halign(gtk::Align::End)
        .valign(gtk::Align::End)
        .margin_end(24)
        .margin_bottom(24)
        .build();
    legend.add_css_class("map-legend");

    let heading = gtk::Box::builder()
        .orientation(Orientation::Horizontal)
        .spacing(6)
        .build();
    heading.append(&gtk::Image::from_icon_name("dialog-information-symbolic"));
    let heading_label = Label::builder()
        .label("Magnitude Scale")
        .build();
    heading_label.add_css_class("heading");
    heading.append(&heading_label);
    legend.append(&heading);

    for (color, range) in MagnitudeColor::legend() {
        let entry = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .build();
        let dot = gtk::Box::builder()
            .width_request(16)
            .height_request(16)
            .valign(gtk::Align::Center)
            .build();
        dot.add_css_class("legend-dot");
        dot.add_css_class(color.css_class());
        let range_label = Label::builder()
            .label(range)
            .build();
        range_label.add_css_class("caption");
        entry.append(&dot);
        entry.append(&range_label);
        legend.append(&entry);
    }

    legend
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record;

    #[test]
    fn empty_list_shows_no_data_message() {
        assert_eq!(list_placeholder(&[]), Some("No earthquake data available"));
        assert_eq!(list_placeholder(&[record(2.0, 10.0, 124.0)]), None);
    }

    #[test]
    fn sidebar_count_reads_events_recorded() {
        assert_eq!(sidebar_count_label(0), "0 events recorded");
        assert_eq!(sidebar_count_label(12), "12 events recorded");
    }
}

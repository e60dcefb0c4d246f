use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use gtk::prelude::*;
use gtk::{glib, Label, Orientation, ScrolledWindow};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::data::{format_number, EventCollection, EventRecord, NO_EVENTS_MESSAGE};
use crate::error::FetchError;
use crate::fetch::{PhivolcsClient, Snapshot};
use crate::panel::{EarthquakePanel, PanelProps};
use crate::summary::{EventFilter, Stats};

const COLD_START_HINT: &str =
    "The server might be spinning up (first request can take 50 seconds). Please wait and try again.";

/// Main scrolling view: status, stats, filters and the earthquake panel.
#[derive(Clone)]
pub struct Dashboard {
    inner: Rc<DashboardInner>,
}

struct DashboardInner {
    root: ScrolledWindow,
    client: PhivolcsClient,
    timezone: Tz,
    refresh_buttons: Vec<gtk::Button>,

    events: RefCell<Vec<EventRecord>>,
    filter: RefCell<EventFilter>,
    loading: Cell<bool>,
    last_error: RefCell<Option<String>>,
    panel_expanded: Cell<bool>,

    connection_icon: gtk::Image,
    updated_row: gtk::Box,
    updated_label: Label,
    cached_badge: Label,
    stats_row: gtk::Box,
    stat_values: StatLabels,
    error_box: gtk::Box,
    error_message: Label,
    error_hint: Label,
    loading_box: gtk::Box,
    spinner: gtk::Spinner,
    filters_card: gtk::Box,
    magnitude_label: Label,
    showing_label: Label,
    panel: EarthquakePanel,
    empty_state: gtk::Box,
}

struct StatLabels {
    total: Label,
    average: Label,
    highest: Label,
    strong: Label,
}

impl Dashboard {
    /// `refresh_button` and `force_button` live in the window's header bar.
    pub fn new(config: &Config, refresh_button: &gtk::Button, force_button: &gtk::Button) -> Self {
        let content = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(24)
            .margin_top(24)
            .margin_bottom(24)
            .margin_start(24)
            .margin_end(24)
            .build();

        let clamp = libadwaita::Clamp::builder()
            .maximum_size(1200)
            .child(&content)
            .build();

        let root = ScrolledWindow::builder()
            .hscrollbar_policy(gtk::PolicyType::Never)
            .vexpand(true)
            .child(&clamp)
            .build();

        // Status card
        let status_card = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(8)
            .build();
        status_card.add_css_class("card");
        status_card.add_css_class("dashboard-card");

        let tagline = Label::builder()
            .label("Real-time seismic events in the Philippines")
            .xalign(0.0)
            .build();
        tagline.add_css_class("dim-label");
        status_card.append(&tagline);

        let host_row = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .build();
        let connection_icon = gtk::Image::from_icon_name("network-wireless-symbolic");
        let host_label = Label::builder()
            .label(config.backend_host())
            .xalign(0.0)
            .build();
        host_label.add_css_class("caption");
        host_label.add_css_class("monospace");
        host_row.append(&connection_icon);
        host_row.append(&host_label);
        status_card.append(&host_row);

        let updated_row = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(8)
            .visible(false)
            .build();
        updated_row.append(&gtk::Image::from_icon_name("document-open-recent-symbolic"));
        let updated_label = Label::builder()
            .xalign(0.0)
            .build();
        updated_label.add_css_class("caption");
        let cached_badge = Label::builder()
            .label("Cached")
            .visible(false)
            .build();
        cached_badge.add_css_class("cached-badge");
        updated_row.append(&updated_label);
        updated_row.append(&cached_badge);
        status_card.append(&updated_row);

        content.append(&status_card);

        // Summary statistics
        let stats_row = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(16)
            .homogeneous(true)
            .visible(false)
            .build();
        let stat_values = StatLabels {
            total: append_stat_card(&stats_row, "Total Earthquakes", "stat-total"),
            average: append_stat_card(&stats_row, "Average Magnitude", "stat-average"),
            highest: append_stat_card(&stats_row, "Highest Magnitude", "stat-highest"),
            strong: append_stat_card(&stats_row, "Strong (≥5.0)", "stat-strong"),
        };
        content.append(&stats_row);

        // Error banner
        let error_box = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(12)
            .visible(false)
            .build();
        error_box.add_css_class("card");
        error_box.add_css_class("error-card");
        let error_icon = gtk::Image::from_icon_name("dialog-error-symbolic");
        error_icon.set_valign(gtk::Align::Start);
        let error_text = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(4)
            .hexpand(true)
            .build();
        let error_title = Label::builder()
            .label("Error fetching data")
            .xalign(0.0)
            .build();
        error_title.add_css_class("heading");
        let error_message = Label::builder()
            .xalign(0.0)
            .wrap(true)
            .selectable(true)
            .build();
        let error_hint = Label::builder()
            .label(COLD_START_HINT)
            .xalign(0.0)
            .wrap(true)
            .visible(false)
            .build();
        error_hint.add_css_class("caption");
        error_text.append(&error_title);
        error_text.append(&error_message);
        error_text.append(&error_hint);
        error_box.append(&error_icon);
        error_box.append(&error_text);
        content.append(&error_box);

        // Loading indicator
        let loading_box = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(8)
            .visible(false)
            .build();
        loading_box.add_css_class("card");
        loading_box.add_css_class("loading-card");
        let spinner = gtk::Spinner::builder()
            .width_request(48)
            .height_request(48)
            .halign(gtk::Align::Center)
            .build();
        let loading_title = Label::builder()
            .label("Fetching earthquake data...")
            .build();
        loading_title.add_css_class("heading");
        let loading_hint = Label::builder()
            .label("This may take up to 50 seconds on first request")
            .build();
        loading_hint.add_css_class("dim-label");
        loading_hint.add_css_class("caption");
        loading_box.append(&spinner);
        loading_box.append(&loading_title);
        loading_box.append(&loading_hint);
        content.append(&loading_box);

        // Filters
        let filters_card = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(12)
            .visible(false)
            .build();
        filters_card.add_css_class("card");
        filters_card.add_css_class("dashboard-card");
        let filters_title = Label::builder()
            .label("Filters")
            .xalign(0.0)
            .build();
        filters_title.add_css_class("heading");
        filters_card.append(&filters_title);

        let filter_inputs = gtk::Box::builder()
            .orientation(Orientation::Horizontal)
            .spacing(24)
            .homogeneous(true)
            .build();

        let magnitude_column = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(4)
            .build();
        let magnitude_label = Label::builder()
            .label("Minimum Magnitude: 0")
            .xalign(0.0)
            .build();
        let magnitude_scale = gtk::Scale::with_range(Orientation::Horizontal, 0.0, 6.0, 0.5);
        magnitude_scale.set_draw_value(false);
        magnitude_column.append(&magnitude_label);
        magnitude_column.append(&magnitude_scale);

        let location_column = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(4)
            .build();
        let location_label = Label::builder()
            .label("Search Location")
            .xalign(0.0)
            .build();
        let search_entry = gtk::SearchEntry::builder()
            .placeholder_text("e.g., Cebu, Bogo")
            .build();
        location_column.append(&location_label);
        location_column.append(&search_entry);

        filter_inputs.append(&magnitude_column);
        filter_inputs.append(&location_column);
        filters_card.append(&filter_inputs);

        let showing_label = Label::builder()
            .xalign(0.0)
            .build();
        showing_label.add_css_class("dim-label");
        filters_card.append(&showing_label);
        content.append(&filters_card);

        // Map + list panel. Its expansion is answered by `toggle_panel`.
        let dashboard_weak: Rc<RefCell<Weak<DashboardInner>>> = Rc::new(RefCell::new(Weak::new()));
        let toggle_target = dashboard_weak.clone();
        let panel = EarthquakePanel::new(
            PanelProps {
                title: "Earthquake Activity Map".to_string(),
                subtitle: "October 2025 - Philippines Region".to_string(),
                header_css_class: Some("panel-header-tint".to_string()),
                content_css_class: Some("panel-content-tint".to_string()),
            },
            &config.map,
            move || {
                if let Some(inner) = toggle_target.borrow().upgrade() {
                    inner.toggle_panel();
                }
            },
        );
        panel.widget().set_visible(false);
        content.append(panel.widget());

        // Empty state
        let empty_state = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(8)
            .visible(false)
            .build();
        empty_state.add_css_class("card");
        empty_state.add_css_class("empty-card");
        let empty_icon = gtk::Image::from_icon_name("find-location-symbolic");
        empty_icon.set_pixel_size(64);
        empty_icon.add_css_class("dim-label");
        let empty_title = Label::builder()
            .label(NO_EVENTS_MESSAGE)
            .build();
        empty_title.add_css_class("title-4");
        let empty_hint = Label::builder()
            .label("Click \"Refresh\" to fetch latest information")
            .build();
        empty_hint.add_css_class("dim-label");
        empty_state.append(&empty_icon);
        empty_state.append(&empty_title);
        empty_state.append(&empty_hint);
        content.append(&empty_state);

        content.append(&create_about_section());

        let inner = Rc::new(DashboardInner {
            root,
            client: PhivolcsClient::new(&config.backend_url),
            timezone: local_timezone(),
            refresh_buttons: vec![refresh_button.clone(), force_button.clone()],
            events: RefCell::new(Vec::new()),
            filter: RefCell::new(EventFilter::default()),
            loading: Cell::new(false),
            last_error: RefCell::new(None),
            panel_expanded: Cell::new(true),
            connection_icon,
            updated_row,
            updated_label,
            cached_badge,
            stats_row,
            stat_values,
            error_box,
            error_message,
            error_hint,
            loading_box,
            spinner,
            filters_card,
            magnitude_label,
            showing_label,
            panel,
            empty_state,
        });
        *dashboard_weak.borrow_mut() = Rc::downgrade(&inner);

        inner.panel.set_expanded(inner.panel_expanded.get());

        let inner_weak = Rc::downgrade(&inner);
        refresh_button.connect_clicked(move |_| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.refresh(false);
            }
        });

        let inner_weak = Rc::downgrade(&inner);
        force_button.connect_clicked(move |_| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.refresh(true);
            }
        });

        let inner_weak = Rc::downgrade(&inner);
        magnitude_scale.connect_value_changed(move |scale| {
            // Snap to the half-step grid
            let value = (scale.value() * 2.0).round() / 2.0;
            if let Some(inner) = inner_weak.upgrade() {
                inner.set_min_magnitude(value);
            }
        });

        let inner_weak = Rc::downgrade(&inner);
        search_entry.connect_search_changed(move |entry| {
            if let Some(inner) = inner_weak.upgrade() {
                inner.set_location_query(entry.text().to_string());
            }
        });

        inner.render();
        Self { inner }
    }

    pub fn widget(&self) -> &ScrolledWindow {
        &self.inner.root
    }

    pub fn refresh(&self, force_refresh: bool) {
        self.inner.refresh(force_refresh);
    }

    /// Re-fetches every `interval` for as long as the dashboard exists.
    pub fn start_auto_refresh(&self, interval: Duration) {
        info!("Auto refresh every {} minutes", interval.as_secs() / 60);
        let seconds = u32::try_from(interval.as_secs()).unwrap_or(u32::MAX);
        let inner_weak = Rc::downgrade(&self.inner);
        glib::timeout_add_seconds_local(seconds, move || {
            let Some(inner) = inner_weak.upgrade() else {
                return glib::ControlFlow::Break;
            };
            inner.refresh(false);
            glib::ControlFlow::Continue
        });
    }
}

impl DashboardInner {
    fn refresh(self: &Rc<Self>, force_refresh: bool) {
        if self.loading.get() {
            debug!("Fetch already in flight, ignoring refresh");
            return;
        }
        self.loading.set(true);
        *self.last_error.borrow_mut() = None;
        self.render();

        let client = self.client.clone();
        let inner_weak = Rc::downgrade(self);
        glib::spawn_future_local(async move {
            let result = client.fetch(force_refresh).await;
            if let Some(inner) = inner_weak.upgrade() {
                inner.finish_fetch(result);
            }
        });
    }

    fn finish_fetch(&self, result: Result<Snapshot, FetchError>) {
        self.loading.set(false);
        match result {
            Ok(snapshot) => {
                self.show_freshness(snapshot.last_updated, snapshot.cached);
                *self.events.borrow_mut() = snapshot.events;
                self.error_hint.set_visible(false);
                self.apply_filter();
            }
            Err(e) => {
                error!("Error fetching earthquakes: {}", e);
                self.error_message.set_label(&e.to_string());
                self.error_hint.set_visible(e.is_cold_start());
                *self.last_error.borrow_mut() = Some(e.to_string());
            }
        }
        self.render();
    }

    fn show_freshness(&self, last_updated: DateTime<Utc>, cached: bool) {
        let local = last_updated.with_timezone(&self.timezone);
        self.updated_label.set_label(&format!(
            "Last updated: {}",
            local.format("%b %-d, %Y, %-I:%M:%S %p %Z")
        ));
        self.updated_row.set_visible(true);
        self.cached_badge.set_visible(cached);
    }

    fn set_min_magnitude(&self, value: f64) {
        if self.filter.borrow().min_magnitude == value {
            return;
        }
        self.magnitude_label
            .set_label(&format!("Minimum Magnitude: {}", format_number(value)));
        self.filter.borrow_mut().min_magnitude = value;
        self.apply_filter();
        self.render();
    }

    fn set_location_query(&self, query: String) {
        if self.filter.borrow().location_query == query {
            return;
        }
        self.filter.borrow_mut().location_query = query;
        self.apply_filter();
        self.render();
    }

    /// Hands the panel a new collection. Only called when data or filter changed.
    fn apply_filter(&self) {
        let filtered = {
            let events = self.events.borrow();
            let filtered = self.filter.borrow().apply(&events);
            self.showing_label.set_label(&format!(
                "Showing {} of {} earthquakes",
                filtered.len(),
                events.len()
            ));
            filtered
        };
        debug!("Filter kept {} earthquakes", filtered.len());
        self.panel.widget().set_visible(!filtered.is_empty());
        self.panel.set_events(EventCollection::new(filtered));
    }

    fn toggle_panel(&self) {
        let expanded = !self.panel_expanded.get();
        self.panel_expanded.set(expanded);
        self.panel.set_expanded(expanded);
    }

    /// Visibility of every section that depends on loading / error state.
    fn render(&self) {
        let loading = self.loading.get();
        let has_error = self.last_error.borrow().is_some();
        let events = self.events.borrow();

        for button in &self.refresh_buttons {
            button.set_sensitive(!loading);
        }
        self.connection_icon.set_icon_name(Some(if loading {
            "network-offline-symbolic"
        } else {
            "network-wireless-symbolic"
        }));

        match Stats::compute(&events) {
            Some(stats) if !loading && !has_error => {
                self.stat_values.total.set_label(&stats.total.to_string());
                self.stat_values.average.set_label(&stats.avg_label());
                self.stat_values.highest.set_label(&stats.max_label());
                self.stat_values.strong.set_label(&stats.strong.to_string());
                self.stats_row.set_visible(true);
            }
            _ => self.stats_row.set_visible(false),
        }

        self.error_box.set_visible(has_error);
        self.loading_box.set_visible(loading);
        if loading {
            self.spinner.start();
        } else {
            self.spinner.stop();
        }
        self.filters_card.set_visible(!events.is_empty() && !loading);
        self.empty_state
            .set_visible(!loading && !has_error && events.is_empty());
    }
}

fn append_stat_card(row: &gtk::Box, caption: &str, accent_class: &str) -> Label {
    let card = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(4)
        .build();
    card.add_css_class("card");
    card.add_css_class("stat-card");
    card.add_css_class(accent_class);

    let caption_label = Label::builder()
        .label(caption)
        .xalign(0.0)
        .build();
    caption_label.add_css_class("dim-label");
    caption_label.add_css_class("caption");
    let value_label = Label::builder()
        .label("—")
        .xalign(0.0)
        .build();
    value_label.add_css_class("title-1");

    card.append(&caption_label);
    card.append(&value_label);
    row.append(&card);
    value_label
}

fn create_about_section() -> gtk::Box {
    let about = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(8)
        .build();
    about.add_css_class("card");
    about.add_css_class("about-card");

    let heading = Label::builder()
        .label("About this data:")
        .xalign(0.0)
        .build();
    heading.add_css_class("heading");
    about.append(&heading);

    let lines = [
        "Data sourced from PHIVOLCS (Philippine Institute of Volcanology and Seismology)",
        "Times are in Philippine Standard Time (PST = UTC+8)",
        "Magnitude scale: <span foreground=\"#22c55e\">Minor (&lt;4)</span>, \
         <span foreground=\"#eab308\">Light (4-5)</span>, \
         <span foreground=\"#f97316\">Moderate (5-6)</span>, \
         <span foreground=\"#ef4444\">Strong (≥6)</span>",
        "Data is cached for 5 minutes to reduce server load",
    ];
    for line in lines {
        let item = Label::builder()
            .label(format!("• {}", line))
            .use_markup(true)
            .xalign(0.0)
            .wrap(true)
            .build();
        about.append(&item);
    }

    about
}

fn local_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| {
            debug!("Detected timezone: {}", name);
            name.parse().ok()
        })
        .unwrap_or_else(|| {
            warn!("Failed to detect timezone, using UTC");
            chrono_tz::UTC
        })
}

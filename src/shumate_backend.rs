use gtk::prelude::*;
use gtk::{glib, Label, Orientation, Popover};
use libshumate::prelude::{LocationExt, MapSourceExt, MarkerExt};
use std::cell::OnceCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::MagnitudeColor;
use crate::map_lifecycle::{MapBackend, MapInstance, MarkerSpec, TileSource, Viewport};

const TILE_SOURCE_ID: &str = "quakewatch-base";

/// Marker and popover styling. Installed once, the first time a map is needed.
const MARKER_BASE_STYLESHEET: &str = "
    .quake-marker {
        border-radius: 9999px;
        border: 2px solid white;
        box-shadow: 0 2px 8px alpha(black, 0.3);
        color: white;
        font-weight: bold;
        font-size: 10px;
        padding: 0;
        min-height: 0;
        min-width: 0;
    }
    .quake-marker:hover {
        box-shadow: 0 3px 10px alpha(black, 0.5);
    }
    .quake-popover > contents {
        background-color: alpha(@card_bg_color, 0.95);
        border-radius: 12px;
        box-shadow: 0 4px 16px alpha(black, 0.6);
    }
    .quake-popover-heading {
        font-size: 14px;
        font-weight: 700;
    }
    .quake-popover-meta {
        font-size: 12px;
        color: alpha(@window_fg_color, 0.6);
    }
";

fn marker_stylesheet() -> String {
    let mut css = MARKER_BASE_STYLESHEET.to_string();
    for (color, _) in MagnitudeColor::legend() {
        css.push_str(&format!(
            ".quake-marker.{} {{ background: {}; }}\n",
            color.css_class(),
            color.hex()
        ));
    }
    css
}

thread_local! {
    static MARKER_STYLES: OnceCell<gtk::CssProvider> = const { OnceCell::new() };
}

fn marker_styles_installed() -> bool {
    MARKER_STYLES.with(|styles| styles.get().is_some())
}

fn install_marker_styles() {
    MARKER_STYLES.with(|styles| {
        if styles.get().is_some() {
            return;
        }
        let Some(display) = gdk::Display::default() else {
            warn!("No display available, marker styles not installed");
            return;
        };
        let provider = gtk::CssProvider::new();
        provider.load_from_data(&marker_stylesheet());
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
        let _ = styles.set(provider);
    });
}

/// libshumate implementation of the map seam.
#[derive(Debug, Clone, Default)]
pub struct ShumateBackend;

impl ShumateBackend {
    pub fn new() -> Self {
        Self
    }
}

pub struct ShumateMap {
    container: gtk::Box,
    widget: libshumate::SimpleMap,
    map: libshumate::Map,
    marker_layer: libshumate::MarkerLayer,
    popovers: Vec<Popover>,
}

impl MapBackend for ShumateBackend {
    type Container = gtk::Box;
    type Map = ShumateMap;

    fn probe(&self) -> bool {
        marker_styles_installed()
    }

    fn load(&self, done: Box<dyn FnOnce()>) {
        // Finish on the main loop so callers always see the load as asynchronous
        glib::idle_add_local_once(move || {
            install_marker_styles();
            done();
        });
    }

    fn create_map(
        &self,
        container: &gtk::Box,
        viewport: Viewport,
        tiles: &TileSource,
    ) -> Option<ShumateMap> {
        if !marker_styles_installed() {
            return None;
        }

        let widget = libshumate::SimpleMap::new();

        // Base tile layer with its attribution shown in the map's license overlay
        let map_source = libshumate::RasterRenderer::from_url(&tiles.url_template);
        map_source.set_id(TILE_SOURCE_ID);
        map_source.set_license(&tiles.attribution);
        map_source.set_max_zoom_level(tiles.max_zoom);
        widget.set_map_source(Some(&map_source));

        let map = widget.map()?;
        let map_viewport = map.viewport()?;

        let marker_layer = libshumate::MarkerLayer::new(&map_viewport);
        map.add_layer(&marker_layer);

        map_viewport.set_max_zoom_level(tiles.max_zoom);
        map_viewport.set_zoom_level(viewport.zoom);
        if viewport.center.is_finite() {
            map.center_on(viewport.center.latitude, viewport.center.longitude);
        } else {
            warn!("Event coordinates unreadable, map left at its default centre");
        }

        widget.set_vexpand(true);
        widget.set_hexpand(true);
        container.append(&widget);

        Some(ShumateMap {
            container: container.clone(),
            widget,
            map,
            marker_layer,
            popovers: Vec::new(),
        })
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        glib::timeout_add_local_once(delay, move || task());
    }
}

impl MapInstance for ShumateMap {
    fn add_marker(&mut self, spec: MarkerSpec, on_click: Rc<dyn Fn()>) {
        let size = spec.pixel_size();

        let marker_button = gtk::Button::builder()
            .label(&spec.label)
            .width_request(size)
            .height_request(size)
            .build();
        marker_button.add_css_class("quake-marker");
        marker_button.add_css_class(spec.color.css_class());

        let popover = Popover::builder().build();
        popover.add_css_class("quake-popover");
        popover.set_child(Some(&create_popup_box(&spec)));
        popover.set_parent(&marker_button);

        let index = spec.index;
        let popover_clone = popover.clone();
        marker_button.connect_clicked(move |_| {
            debug!("Marker {} clicked", index);
            popover_clone.popup();
            on_click();
        });

        let marker = libshumate::Marker::new();
        marker.set_child(Some(&marker_button));
        if spec.position.is_finite() {
            marker.set_location(spec.position.latitude, spec.position.longitude);
        }
        self.marker_layer.add_marker(&marker);
        self.popovers.push(popover);
    }

    fn set_view(&mut self, viewport: Viewport) {
        if !viewport.center.is_finite() {
            debug!("Ignoring focus on unreadable coordinates");
            return;
        }
        self.map.go_to_full(
            viewport.center.latitude,
            viewport.center.longitude,
            viewport.zoom,
        );
    }

    fn invalidate_size(&self) {
        self.widget.queue_resize();
    }

    fn remove(self) {
        for popover in &self.popovers {
            popover.unparent();
        }
        self.marker_layer.remove_all();
        self.container.remove(&self.widget);
    }
}

fn create_popup_box(spec: &MarkerSpec) -> gtk::Box {
    let popup = &spec.popup;
    let popup_box = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(4)
        .margin_top(10)
        .margin_bottom(10)
        .margin_start(10)
        .margin_end(10)
        .build();

    let heading = Label::builder()
        .label(&popup.heading)
        .xalign(0.0)
        .build();
    heading.add_css_class("quake-popover-heading");
    popup_box.append(&heading);

    for text in [&popup.date_time, &popup.location, &popup.depth] {
        let label = Label::builder()
            .label(text)
            .xalign(0.0)
            .wrap(true)
            .max_width_chars(36)
            .build();
        label.add_css_class("quake-popover-meta");
        popup_box.append(&label);
    }

    if let Some(link) = popup.detail_link.clone() {
        let details_button = gtk::Button::builder()
            .label("View Details")
            .halign(gtk::Align::Start)
            .build();
        details_button.add_css_class("link");
        details_button.connect_clicked(move |_| {
            if let Err(e) = open::that(&link) {
                warn!("Failed to open URL: {}", e);
            }
        });
        popup_box.append(&details_button);
    }

    popup_box
}

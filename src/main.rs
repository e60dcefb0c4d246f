mod accordion;
mod config;
mod dashboard;
mod data;
mod error;
mod fetch;
mod map_lifecycle;
mod panel;
mod selection;
mod shumate_backend;
mod sidebar;
mod summary;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use gtk::prelude::*;
use gtk::{glib, Application, Label};
use libadwaita::{ApplicationWindow, ColorScheme, HeaderBar, StyleManager, ToolbarView};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::data::{MagnitudeColor, APP_ID};

const APP_BASE_STYLESHEET: &str = "
    .dashboard-card, .stat-card, .error-card, .loading-card, .empty-card, .about-card {
        padding: 20px;
    }
    .stat-card {
        border-left: 4px solid transparent;
    }
    .stat-card.stat-total { border-left-color: #3b82f6; }
    .stat-card.stat-average { border-left-color: #22c55e; }
    .stat-card.stat-highest { border-left-color: #f97316; }
    .stat-card.stat-strong { border-left-color: #ef4444; }
    .error-card {
        border-left: 4px solid #ef4444;
        background-color: alpha(#ef4444, 0.08);
    }
    .cached-badge {
        background-color: alpha(#eab308, 0.2);
        color: #a16207;
        border-radius: 9999px;
        padding: 2px 10px;
        font-size: 11px;
        font-weight: 600;
    }
    .quake-panel {
        border-radius: 12px;
        background-color: @card_bg_color;
        box-shadow: 0 2px 8px alpha(black, 0.15);
    }
    .panel-header-tint {
        background-color: alpha(@accent_bg_color, 0.08);
        border-radius: 12px;
    }
    .panel-content-tint {
        background-color: alpha(@window_fg_color, 0.03);
    }
    .quake-sidebar {
        background-color: @view_bg_color;
        border-right: 1px solid alpha(@borders, 0.8);
    }
    .quake-row.selected-event {
        background-color: alpha(@accent_bg_color, 0.12);
        border-left: 4px solid @accent_bg_color;
    }
    .magnitude-badge {
        border-radius: 9999px;
        padding: 2px 8px;
        font-size: 11px;
        font-weight: bold;
        color: white;
    }
    .quake-detail-name {
        font-weight: 600;
    }
    .map-legend {
        background-color: alpha(@window_bg_color, 0.9);
        border-radius: 12px;
        padding: 12px;
        box-shadow: 0 4px 12px alpha(black, 0.3);
    }
    .legend-dot {
        border-radius: 9999px;
        border: 2px solid white;
    }
    .sidebar-toggle {
        border-radius: 9999px;
        background-color: alpha(@window_bg_color, 0.9);
        box-shadow: 0 2px 8px alpha(black, 0.3);
    }
";

/// Badge and legend colours follow the marker tiers.
fn app_stylesheet() -> String {
    let mut css = APP_BASE_STYLESHEET.to_string();
    for (color, _) in MagnitudeColor::legend() {
        css.push_str(&format!(
            ".magnitude-badge.{class}, .legend-dot.{class} {{ background-color: {hex}; }}\n",
            class = color.css_class(),
            hex = color.hex()
        ));
    }
    css
}

fn main() -> glib::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quakewatch=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // reqwest needs a tokio reactor; GLib drives the futures themselves
    let rt = match tokio::runtime::Runtime::new().context("Failed to start tokio runtime") {
        Ok(rt) => rt,
        Err(e) => {
            error!("{:#}", e);
            return glib::ExitCode::FAILURE;
        }
    };
    let _guard = rt.enter();

    let config = load_config();

    let app = Application::builder()
        .application_id(APP_ID)
        .build();

    app.connect_activate(move |app| build_ui(app, &config));

    let exit_code = app.run();

    // Keep runtime alive until app exits
    drop(_guard);
    drop(rt);

    exit_code
}

fn load_config() -> Config {
    match config::load().context("Failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}, using defaults", e);
            Config::default()
        }
    }
}

fn build_ui(app: &Application, config: &Config) {
    let style_manager = StyleManager::default();
    style_manager.set_color_scheme(ColorScheme::PreferDark);

    let header_bar = HeaderBar::builder()
        .build();

    let title_label = Label::builder()
        .label("PHIVOLCS Earthquake Monitor")
        .build();
    title_label.add_css_class("title");

    let refresh_button = gtk::Button::builder()
        .icon_name("view-refresh-symbolic")
        .tooltip_text("Refresh")
        .build();

    let force_button = gtk::Button::builder()
        .icon_name("network-server-symbolic")
        .tooltip_text("Force Refresh (bypass server cache)")
        .build();

    header_bar.pack_start(&refresh_button);
    header_bar.pack_start(&force_button);
    header_bar.set_title_widget(Some(&title_label));

    let dashboard = Dashboard::new(config, &refresh_button, &force_button);

    let toolbar_view = ToolbarView::builder()
        .build();
    toolbar_view.add_top_bar(&header_bar);
    toolbar_view.set_content(Some(dashboard.widget()));

    let window = ApplicationWindow::builder()
        .application(app)
        .title("Quakewatch")
        .default_width(1200)
        .default_height(900)
        .content(&toolbar_view)
        .build();

    let css_provider = gtk::CssProvider::new();
    css_provider.load_from_data(&app_stylesheet());
    if let Some(display) = gdk::Display::default() {
        gtk::style_context_add_provider_for_display(
            &display,
            &css_provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }

    dashboard.refresh(false);
    if let Some(interval) = config.auto_refresh_interval() {
        dashboard.start_auto_refresh(interval);
    }

    info!("Window ready, backend {}", config.backend_url);
    window.present();
}

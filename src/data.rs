use serde::{Deserialize, Deserializer};
use std::ops::Deref;
use std::rc::Rc;

pub const APP_ID: &str = "com.toasterrepair.Quakewatch";

pub const NO_EVENTS_MESSAGE: &str = "No earthquake data available";

/// One seismic event as delivered by the PHIVOLCS API.
///
/// Numeric fields arrive either as JSON numbers or as numeric strings. A value
/// that does not parse is kept as NaN (or `None` for depth) instead of failing
/// the whole payload, so rendering degrades for that one record only.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default = "nan", deserialize_with = "lenient_float")]
    pub magnitude: f64,
    #[serde(default = "nan", deserialize_with = "lenient_float")]
    pub latitude: f64,
    #[serde(default = "nan", deserialize_with = "lenient_float")]
    pub longitude: f64,
    #[serde(rename = "depth", default, deserialize_with = "lenient_depth")]
    pub depth_km: Option<i64>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub date_time: String,
    #[serde(default)]
    pub detail_link: Option<String>,
}

impl EventRecord {
    /// Location with line breaks (and the indentation after them) folded into single spaces.
    pub fn display_location(&self) -> String {
        normalize_location(&self.location)
    }

    /// The `<time>` half of `"<date> - <time>"`.
    pub fn time_of_day(&self) -> Option<&str> {
        self.date_time.split(" - ").nth(1)
    }

    pub fn magnitude_label(&self) -> String {
        format_number(self.magnitude)
    }

    pub fn depth_label(&self) -> String {
        match self.depth_km {
            Some(depth) => format!("{} km", depth),
            None => "NaN km".to_string(),
        }
    }

    pub fn coordinates_label(&self) -> String {
        format!("{}, {}", format_number(self.latitude), format_number(self.longitude))
    }

    /// Non-empty detail link, if any.
    pub fn detail_url(&self) -> Option<&str> {
        self.detail_link.as_deref().filter(|link| !link.trim().is_empty())
    }
}

/// Ordered, shared, read-only event list.
///
/// Cloning shares the storage. Two collections are the same collection only
/// when they share storage; equal contents do not count.
#[derive(Debug, Clone, Default)]
pub struct EventCollection(Rc<[EventRecord]>);

impl EventCollection {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self(events.into())
    }

    pub fn same_as(&self, other: &EventCollection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for EventCollection {
    type Target = [EventRecord];

    fn deref(&self) -> &[EventRecord] {
        &self.0
    }
}

/// Marker colour ladder. Each tier includes its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnitudeColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl MagnitudeColor {
    pub fn for_magnitude(magnitude: f64) -> Self {
        // NaN fails every comparison and lands on green
        if magnitude >= 3.0 {
            MagnitudeColor::Red
        } else if magnitude >= 2.0 {
            MagnitudeColor::Orange
        } else if magnitude >= 1.5 {
            MagnitudeColor::Yellow
        } else {
            MagnitudeColor::Green
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            MagnitudeColor::Red => "#ef4444",
            MagnitudeColor::Orange => "#f97316",
            MagnitudeColor::Yellow => "#eab308",
            MagnitudeColor::Green => "#22c55e",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            MagnitudeColor::Red => "magnitude-red",
            MagnitudeColor::Orange => "magnitude-orange",
            MagnitudeColor::Yellow => "magnitude-yellow",
            MagnitudeColor::Green => "magnitude-green",
        }
    }

    /// Legend entries, lowest tier first.
    pub fn legend() -> [(MagnitudeColor, &'static str); 4] {
        [
            (MagnitudeColor::Green, "< 1.5"),
            (MagnitudeColor::Yellow, "1.5 - 2.0"),
            (MagnitudeColor::Orange, "2.0 - 3.0"),
            (MagnitudeColor::Red, "≥ 3.0"),
        ]
    }
}

pub const MARKER_BASE_DIAMETER: f64 = 20.0;
pub const MARKER_DIAMETER_PER_MAGNITUDE: f64 = 5.0;

pub fn marker_diameter(magnitude: f64) -> f64 {
    MARKER_BASE_DIAMETER + MARKER_DIAMETER_PER_MAGNITUDE * magnitude
}

pub fn normalize_location(location: &str) -> String {
    let mut out = String::with_capacity(location.len());
    let mut chars = location.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' {
            out.push(' ');
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Renders a float the way the feed shows it: `5.2`, `5`, `NaN`.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

fn nan() -> f64 {
    f64::NAN
}

fn parse_float(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn lenient_float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => parse_float(&s),
        _ => f64::NAN,
    })
}

fn lenient_depth<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let depth = lenient_float(deserializer)?;
    Ok(depth.is_finite().then(|| depth.trunc() as i64))
}

#[cfg(test)]
pub(crate) fn record(magnitude: f64, latitude: f64, longitude: f64) -> EventRecord {
    EventRecord {
        magnitude,
        latitude,
        longitude,
        depth_km: Some(10),
        location: "Somewhere".to_string(),
        date_time: "Oct 5, 2025 - 14:30".to_string(),
        detail_link: None,
    }
}

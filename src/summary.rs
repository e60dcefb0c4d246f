use crate::data::EventRecord;

pub const STRONG_MAGNITUDE: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub min_magnitude: f64,
    pub location_query: String,
}

impl EventFilter {
    /// Records with an unreadable magnitude never pass.
    pub fn matches(&self, record: &EventRecord) -> bool {
        let query = self.location_query.trim();
        record.magnitude >= self.min_magnitude
            && (query.is_empty()
                || record
                    .location
                    .to_lowercase()
                    .contains(&query.to_lowercase()))
    }

    pub fn apply(&self, events: &[EventRecord]) -> Vec<EventRecord> {
        events
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub max_magnitude: Option<f64>,
    pub avg_magnitude: Option<f64>,
    pub strong: usize,
}

impl Stats {
    pub fn compute(events: &[EventRecord]) -> Option<Self> {
        if events.is_empty() {
            return None;
        }

        let magnitudes: Vec<f64> = events
            .iter()
            .map(|record| record.magnitude)
            .filter(|magnitude| !magnitude.is_nan())
            .collect();
        let max_magnitude = magnitudes.iter().copied().reduce(f64::max);
        let avg_magnitude = (!magnitudes.is_empty())
            .then(|| magnitudes.iter().sum::<f64>() / magnitudes.len() as f64);
        let strong = magnitudes
            .iter()
            .filter(|&&magnitude| magnitude >= STRONG_MAGNITUDE)
            .count();

        Some(Self {
            total: events.len(),
            max_magnitude,
            avg_magnitude,
            strong,
        })
    }

    pub fn avg_label(&self) -> String {
        self.avg_magnitude
            .map_or_else(|| "—".to_string(), |avg| format!("{:.2}", avg))
    }

    pub fn max_label(&self) -> String {
        self.max_magnitude
            .map_or_else(|| "—".to_string(), |max| format!("{}", max))
    }
}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::data::EventRecord;
use crate::error::FetchError;

const EARTHQUAKES_PATH: &str = "/api/earthquakes";
const REFRESH_PATH: &str = "/api/earthquakes/refresh";

/// One successful answer from the backend.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub events: Vec<EventRecord>,
    pub last_updated: DateTime<Utc>,
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<EventRecord>>,
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PhivolcsClient {
    http: reqwest::Client,
    base_url: String,
}

impl PhivolcsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// A forced refresh asks the backend to bypass its cache.
    pub fn endpoint(&self, force_refresh: bool) -> String {
        let path = if force_refresh { REFRESH_PATH } else { EARTHQUAKES_PATH };
        format!("{}{}", self.base_url, path)
    }

    pub async fn fetch(&self, force_refresh: bool) -> Result<Snapshot, FetchError> {
        let url = self.endpoint(force_refresh);
        info!("Fetching earthquakes from {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let text = response.text().await?;
        debug!(
            "Response text (first 200 chars): {}",
            text.chars().take(200).collect::<String>()
        );
        parse_envelope(&text, Utc::now())
    }
}

/// `received_at` stands in for a missing or unreadable `lastUpdated`.
pub fn parse_envelope(text: &str, received_at: DateTime<Utc>) -> Result<Snapshot, FetchError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if !envelope.success {
        return Err(FetchError::Api(
            envelope
                .error
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Failed to fetch data".to_string()),
        ));
    }

    let last_updated = envelope
        .last_updated
        .as_deref()
        .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
        .map(|stamp| stamp.with_timezone(&Utc))
        .unwrap_or(received_at);

    let events = envelope.data.unwrap_or_default();
    info!("Received {} earthquakes (cached: {})", events.len(), envelope.cached);
    Ok(Snapshot {
        events,
        last_updated,
        cached: envelope.cached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 7, 0, 0).unwrap()
    }

    #[test]
    fn endpoints_follow_refresh_mode() {
        let client = PhivolcsClient::new("https://example.org/");
        assert_eq!(client.endpoint(false), "https://example.org/api/earthquakes");
        assert_eq!(client.endpoint(true), "https://example.org/api/earthquakes/refresh");
    }

    #[test]
    fn successful_envelope_becomes_snapshot() {
        let body = r#"{
            "success": true,
            "cached": true,
            "lastUpdated": "2025-10-05T06:30:00.000Z",
            "data": [
                {"magnitude": "5.2", "latitude": "10.3", "longitude": "123.9", "depth": "15",
                 "location": "Off the coast\n of Cebu", "dateTime": "Oct 5, 2025 - 14:30", "detailLink": null}
            ]
        }"#;
        let snapshot = parse_envelope(body, received()).unwrap();
        assert!(snapshot.cached);
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].magnitude, 5.2);
        assert_eq!(
            snapshot.last_updated,
            Utc.with_ymd_and_hms(2025, 10, 5, 6, 30, 0).unwrap()
        );
    }

    #[test]
    fn missing_timestamp_uses_receipt_time() {
        let snapshot = parse_envelope(r#"{"success": true, "data": []}"#, received()).unwrap();
        assert_eq!(snapshot.last_updated, received());
        assert!(!snapshot.cached);
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn unsuccessful_envelope_reports_server_message() {
        let err = parse_envelope(r#"{"success": false, "error": "Scraper offline"}"#, received()).unwrap_err();
        assert_eq!(err.to_string(), "Scraper offline");
        assert!(!err.is_cold_start());

        let err = parse_envelope(r#"{"success": false, "data": null}"#, received()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch data");
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        let err = parse_envelope("<html>502</html>", received()).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn status_error_reads_like_http_line() {
        let err = FetchError::Status {
            code: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }
}

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;
use std::fmt;

/// Delimiter the frontend uses to append the client user agent to a message.
pub const USER_AGENT_DELIMITER: &str = "| UA:";

/// A presentable location string: "City, Country", "City", "Country" or "Unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoLabel(String);

impl GeoLabel {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Builds a label from optional city and country names.
    ///
    /// Empty strings count as missing. Returns `None` when neither part is
    /// usable so callers can pick their own fallback.
    pub fn compose(city: Option<&str>, country: Option<&str>) -> Option<Self> {
        let city = city.map(str::trim).filter(|s| !s.is_empty());
        let country = country.map(str::trim).filter(|s| !s.is_empty());

        match (city, country) {
            (Some(city), Some(country)) => Some(Self(format!("{}, {}", city, country))),
            (Some(only), None) | (None, Some(only)) => Some(Self(only.to_string())),
            (None, None) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub message: String,
    pub level: String,
    #[serde(default)]
    pub ip: Option<String>,
    pub created_at: String,
}

impl LogEntry {
    /// Splits the message into its display text and the embedded user agent.
    pub fn split_message(&self) -> (String, Option<String>) {
        split_user_agent(&self.message)
    }
}

/// Separates a trailing `| UA: ...` suffix from a log message.
///
/// Only the segment between the first and second delimiter is kept as the
/// user agent. An empty user agent is reported as `None`.
pub fn split_user_agent(message: &str) -> (String, Option<String>) {
    if !message.contains(USER_AGENT_DELIMITER) {
        return (message.to_string(), None);
    }

    let mut parts = message.split(USER_AGENT_DELIMITER);
    let text = parts.next().unwrap_or_default().trim().to_string();
    let agent = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    (text, agent)
}

/// Formats a backend timestamp as `dd/mm/YYYY HH:MM:SS`.
///
/// Offset-carrying timestamps are converted to local time; naive ones are
/// shown as-is. Anything unparseable is returned verbatim.
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%d/%m/%Y %H:%M:%S";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(DISPLAY).to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format(DISPLAY).to_string();
    }
    raw.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogStats {
    pub log_count: i64,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    pub backend: String,
    pub db: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_uses_both_parts_when_present() {
        let label = GeoLabel::compose(Some("Lyon"), Some("France")).unwrap();
        assert_eq!(label.as_str(), "Lyon, France");
    }

    #[test]
    fn compose_falls_back_to_single_part() {
        assert_eq!(GeoLabel::compose(Some("Lyon"), None).unwrap().as_str(), "Lyon");
        assert_eq!(GeoLabel::compose(Some(""), Some("France")).unwrap().as_str(), "France");
        assert!(GeoLabel::compose(Some(""), None).is_none());
    }

    #[test]
    fn user_agent_is_split_out() {
        let (text, ua) = split_user_agent("Hello | UA: TestAgent/1.0");
        assert_eq!(text, "Hello");
        assert_eq!(ua.as_deref(), Some("TestAgent/1.0"));
    }

    #[test]
    fn message_without_delimiter_is_untouched() {
        let (text, ua) = split_user_agent("  plain message ");
        assert_eq!(text, "  plain message ");
        assert!(ua.is_none());
    }

    #[test]
    fn empty_user_agent_is_dropped() {
        let (text, ua) = split_user_agent("Hello | UA:   ");
        assert_eq!(text, "Hello");
        assert!(ua.is_none());
    }

    #[test]
    fn offset_timestamps_are_shown_in_local_time() {
        let expected = DateTime::parse_from_rfc3339("2025-03-04T09:05:07+00:00")
            .unwrap()
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M:%S")
            .to_string();
        assert_eq!(format_timestamp("2025-03-04T09:05:07+00:00"), expected);
    }

    #[test]
    fn naive_timestamps_are_formatted() {
        assert_eq!(
            format_timestamp("2025-03-04T09:05:07.123456"),
            "04/03/2025 09:05:07"
        );
        assert_eq!(format_timestamp("not a date"), "not a date");
    }

    #[test]
    fn log_entry_ignores_backend_geo_field() {
        let entry: LogEntry = serde_json::from_value(serde_json::json!({
            "id": 3,
            "message": "hi",
            "level": "INFO",
            "ip": null,
            "geo": "Inconnue",
            "created_at": "2025-03-04T09:05:07"
        }))
        .unwrap();
        assert_eq!(entry.ip, None);
        assert_eq!(entry.id, 3);
    }
}

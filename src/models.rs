//! Data models module
//!
//! Defines core data structures:
//! - LogSource: one configured event-collection point from the sensordevice table
//! - ArielSearch: state of an asynchronous search job on the remote API
//! - ApiError: structured error payload returned by the remote API
//! - MvsResults: aggregate output of one counting run

use serde::Deserialize;
use std::collections::HashMap;

/// One row from the sensordevice table, enriched in place with the
/// administrative domains that produced its events.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSource {
    /// Primary key of the sensordevice row
    pub sensor_device_id: i64,
    /// Log source identifier as configured (hostname or IP literal)
    pub hostname: String,
    /// Display name of the log source
    pub device_name: String,
    /// Device type id, drives exclusion and Windows classification
    pub device_type_id: i64,
    /// Foreign key into the protocol configuration table
    pub sp_config: i64,
    /// Epoch millis of the last event seen from this source
    pub timestamp_last_seen: i64,
    /// Domains observed for this source, insertion-ordered, no duplicates.
    /// Empty until domain enrichment has run.
    pub domains: Vec<String>,
}

impl LogSource {
    pub fn new(
        sensor_device_id: i64,
        hostname: &str,
        device_name: &str,
        device_type_id: i64,
        sp_config: i64,
        timestamp_last_seen: i64,
    ) -> Self {
        LogSource {
            sensor_device_id,
            hostname: hostname.to_string(),
            device_name: device_name.to_string(),
            device_type_id,
            sp_config,
            timestamp_last_seen,
            domains: Vec::new(),
        }
    }

    /// Decode a sensordevice row. Columns are selected by name, so any
    /// extra columns in the result set are ignored by construction.
    pub fn from_row(row: &postgres::Row) -> Self {
        LogSource {
            sensor_device_id: row.get("id"),
            hostname: row.get("hostname"),
            device_name: row.get("devicename"),
            device_type_id: row.get("devicetypeid"),
            sp_config: row.get("spconfig"),
            timestamp_last_seen: row.get("timestamp_last_seen"),
            domains: Vec::new(),
        }
    }

    /// Append a domain, suppressing duplicates
    pub fn add_domain(&mut self, domain: &str) {
        if !self.domains.iter().any(|d| d == domain) {
            self.domains.push(domain.to_string());
        }
    }

    /// Replace the domain list, suppressing duplicates but keeping
    /// first-seen order
    pub fn set_domains(&mut self, domains: Vec<String>) {
        self.domains.clear();
        for domain in domains {
            if !self.domains.contains(&domain) {
                self.domains.push(domain);
            }
        }
    }

    pub fn first_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }

    pub fn is_multi_domain(&self) -> bool {
        self.domains.len() > 1
    }
}

/// Terminal and non-terminal states of an asynchronous search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchStatus {
    Wait,
    Executing,
    Sorting,
    Completed,
    Canceled,
    Error,
    #[serde(other)]
    Unknown,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Wait => "WAIT",
            SearchStatus::Executing => "EXECUTING",
            SearchStatus::Sorting => "SORTING",
            SearchStatus::Completed => "COMPLETED",
            SearchStatus::Canceled => "CANCELED",
            SearchStatus::Error => "ERROR",
            SearchStatus::Unknown => "UNKNOWN",
        }
    }

    /// CANCELED and ERROR terminate a search without producing results
    pub fn is_failure(&self) -> bool {
        matches!(self, SearchStatus::Canceled | SearchStatus::Error)
    }
}

fn default_search_status() -> SearchStatus {
    SearchStatus::Wait
}

/// State of one asynchronous search job. Created by a start-search call,
/// replaced wholesale by each subsequent poll, discarded once results
/// have been fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct ArielSearch {
    pub search_id: String,
    #[serde(default = "default_search_status")]
    pub status: SearchStatus,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub completed: bool,
    /// Only meaningful once completed
    #[serde(default)]
    pub record_count: u64,
}

/// Inner http_response object of a structured API error payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpResponse {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Structured error payload returned by the remote API on a non-success
/// response. Falls back to the raw status and body when the payload is
/// not valid JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub http_response: Option<HttpResponse>,
    #[serde(default, rename = "message")]
    pub detailed_message: Option<String>,
}

impl ApiError {
    pub fn from_status_and_text(status: u16, text: &str) -> Self {
        ApiError {
            http_response: Some(HttpResponse {
                code: Some(status),
                message: None,
            }),
            detailed_message: Some(text.to_string()),
        }
    }

    pub fn response_code(&self) -> Option<u16> {
        self.http_response.as_ref().and_then(|r| r.code)
    }

    /// Most specific message available for display
    pub fn message(&self) -> String {
        if let Some(detailed) = &self.detailed_message {
            return detailed.clone();
        }
        if let Some(response) = &self.http_response {
            if let Some(message) = &response.message {
                return message.clone();
            }
        }
        match self.response_code() {
            Some(code) => format!("API returned code {}", code),
            None => "API call was unsuccessful".to_string(),
        }
    }
}

/// Aggregate output of one counting run. Built incrementally by the
/// pipeline, read-only once handed to the report writer.
#[derive(Debug, Default)]
pub struct MvsResults {
    /// Machine identifier to the log sources observed on that machine
    pub device_map: HashMap<String, Vec<LogSource>>,
    /// Per-domain MVS tally, only populated for multi-domain deployments
    pub domain_count_map: HashMap<String, u64>,
    /// Final MVS count for the deployment
    pub mvs_count: u64,
    /// Log sources excluded because their device type is not an MVS
    pub excluded_log_sources: Vec<LogSource>,
    /// Log sources skipped because no domain could be resolved for them
    pub skipped_log_sources: Vec<LogSource>,
    /// Machines reclassified as Windows workstations, with their sources
    pub windows_workstation_device_map: HashMap<String, Vec<LogSource>>,
    /// Total log sources considered, before any exclusion
    pub log_source_count: usize,
}

impl MvsResults {
    pub fn add_excluded_log_source(&mut self, log_source: LogSource) {
        self.excluded_log_sources.push(log_source);
    }

    pub fn add_skipped_log_source(&mut self, log_source: LogSource) {
        self.skipped_log_sources.push(log_source);
    }

    pub fn add_windows_workstation(&mut self, machine_identifier: &str, log_sources: Vec<LogSource>) {
        self.windows_workstation_device_map
            .insert(machine_identifier.to_string(), log_sources);
    }

    /// Device-type exclusions plus workstation reclassifications
    pub fn excluded_log_source_count(&self) -> usize {
        self.excluded_log_sources.len() + self.windows_workstation_device_map.len()
    }

    pub fn increment_count_for(&mut self, domain: &str) {
        self.mvs_count += 1;
        *self.domain_count_map.entry(domain.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_domain_suppresses_duplicates() {
        let mut source = LogSource::new(1, "host-a", "Host A", 12, 100, 0);
        source.add_domain("Alpha");
        source.add_domain("Beta");
        source.add_domain("Alpha");
        assert_eq!(source.domains, vec!["Alpha", "Beta"]);
        assert!(source.is_multi_domain());
    }

    #[test]
    fn test_set_domains_keeps_first_seen_order() {
        let mut source = LogSource::new(1, "host-a", "Host A", 12, 100, 0);
        source.set_domains(vec![
            "Beta".to_string(),
            "Alpha".to_string(),
            "Beta".to_string(),
        ]);
        assert_eq!(source.domains, vec!["Beta", "Alpha"]);
        assert_eq!(source.first_domain(), Some("Beta"));
    }

    #[test]
    fn test_empty_domains_is_not_multi_domain() {
        let source = LogSource::new(1, "host-a", "Host A", 12, 100, 0);
        assert!(!source.is_multi_domain());
        assert_eq!(source.first_domain(), None);
    }

    #[test]
    fn test_ariel_search_deserializes_with_defaults() {
        let search: ArielSearch =
            serde_json::from_str(r#"{"search_id":"abc-123","status":"EXECUTING","progress":40}"#)
                .unwrap();
        assert_eq!(search.search_id, "abc-123");
        assert_eq!(search.status, SearchStatus::Executing);
        assert_eq!(search.progress, 40);
        assert!(!search.completed);
        assert_eq!(search.record_count, 0);
    }

    #[test]
    fn test_ariel_search_ignores_unknown_fields_and_statuses() {
        let search: ArielSearch = serde_json::from_str(
            r#"{"search_id":"abc","status":"PAUSED","cursor_id":"abc","completed":true,"record_count":7}"#,
        )
        .unwrap();
        assert_eq!(search.status, SearchStatus::Unknown);
        assert!(search.completed);
        assert_eq!(search.record_count, 7);
    }

    #[test]
    fn test_api_error_message_precedence() {
        let error: ApiError = serde_json::from_str(
            r#"{"http_response":{"code":403,"message":"Forbidden"},"message":"No ADMIN capability"}"#,
        )
        .unwrap();
        assert_eq!(error.response_code(), Some(403));
        assert_eq!(error.message(), "No ADMIN capability");

        let error: ApiError =
            serde_json::from_str(r#"{"http_response":{"code":500,"message":"Server Error"}}"#)
                .unwrap();
        assert_eq!(error.message(), "Server Error");

        let error = ApiError::from_status_and_text(502, "bad gateway");
        assert_eq!(error.response_code(), Some(502));
        assert_eq!(error.message(), "bad gateway");
    }

    #[test]
    fn test_excluded_count_spans_both_exclusion_kinds() {
        let mut results = MvsResults::default();
        results.add_excluded_log_source(LogSource::new(1, "a", "A", 331, 1, 0));
        results.add_excluded_log_source(LogSource::new(2, "b", "B", 352, 2, 0));
        results.add_windows_workstation("10.0.0.9", vec![LogSource::new(3, "c", "C", 12, 3, 0)]);
        assert_eq!(results.excluded_log_source_count(), 3);
    }
}

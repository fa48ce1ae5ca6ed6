//! Asynchronous search module
//!
//! Wraps the start/poll/fetch protocol of the Ariel search API:
//! - SearchApi: the three operations the pipeline needs, as a trait so
//!   search-driven logic can be tested against in-memory fakes
//! - AqlClient: the real implementation over RestClient
//! - SearchPoller: blocking poll loop with a 1 second sleep, operator
//!   progress bar and an explicit poll ceiling
//! - fetch_all_search_results: item-range pagination, 50 records a page

use crate::constants::MAX_SEARCH_RESULTS_PER_REQUEST;
use crate::errors::{RestError, SearchError};
use crate::models::ArielSearch;
use crate::progress;
use crate::rest::{ClientAuth, RestClient};
use log::{debug, info};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const ARIEL_SEARCHES_ENDPOINT: &str = "/api/ariel/searches";
const SYSTEM_ABOUT_TEST_ENDPOINT: &str = "/api/system/about";

/// The search operations the pipeline depends on
pub trait SearchApi {
    /// Start a search. None means the service answered 404.
    fn start_search(&self, query: &str) -> Result<Option<ArielSearch>, RestError>;
    /// Poll a search for updated status/progress
    fn get_search(&self, search_id: &str) -> Result<Option<ArielSearch>, RestError>;
    /// Fetch one page of results; `range` is an item-range header value.
    /// Returns the record list, empty once exhausted, never an error for
    /// an empty page.
    fn search_results(&self, search_id: &str, range: Option<&str>) -> Result<Vec<Value>, RestError>;
}

/// Real search client over the console REST API
pub struct AqlClient {
    rest_client: RestClient,
}

impl AqlClient {
    pub fn new(rest_client: RestClient) -> Self {
        AqlClient { rest_client }
    }

    pub fn auth(&self) -> &ClientAuth {
        self.rest_client.auth()
    }

    /// Probe API reachability and capability before the pipeline runs.
    /// The system about endpoint is used because the search endpoint
    /// returns an empty list for tokens without the ADMIN capability.
    pub fn check_api_permissions(&self) -> Result<(), RestError> {
        self.rest_client
            .get(SYSTEM_ABOUT_TEST_ENDPOINT, StatusCode::OK, &[])?;
        Ok(())
    }
}

impl SearchApi for AqlClient {
    fn start_search(&self, query: &str) -> Result<Option<ArielSearch>, RestError> {
        let response = self.rest_client.post(
            ARIEL_SEARCHES_ENDPOINT,
            StatusCode::CREATED,
            &[("query_expression", query)],
        )?;
        decode_search(response)
    }

    fn get_search(&self, search_id: &str) -> Result<Option<ArielSearch>, RestError> {
        let path = format!("{}/{}", ARIEL_SEARCHES_ENDPOINT, search_id);
        let response = self.rest_client.get(&path, StatusCode::OK, &[])?;
        decode_search(response)
    }

    fn search_results(&self, search_id: &str, range: Option<&str>) -> Result<Vec<Value>, RestError> {
        let path = format!("{}/{}/results", ARIEL_SEARCHES_ENDPOINT, search_id);
        let mut headers = Vec::new();
        if let Some(range) = range {
            headers.push(("Range", range));
        }
        let response = self.rest_client.get(&path, StatusCode::OK, &headers)?;
        let events = response
            .as_ref()
            .and_then(|body| body.get("events"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(events)
    }
}

fn decode_search(response: Option<Value>) -> Result<Option<ArielSearch>, RestError> {
    match response {
        Some(body) => {
            let search = serde_json::from_value(body)
                .map_err(|err| RestError::Transport(err.to_string()))?;
            Ok(Some(search))
        }
        None => Ok(None),
    }
}

/// Blocking poll loop over a search handle. The production API gives no
/// completion callback, so the caller polls once a second until the
/// search reports completed, the poll ceiling is hit, or the operator
/// interrupts the run.
pub struct SearchPoller {
    poll_interval: Duration,
    max_polls: u32,
    show_progress: bool,
}

impl SearchPoller {
    pub fn new(timeout_secs: u64) -> Self {
        SearchPoller {
            poll_interval: Duration::from_secs(crate::constants::SEARCH_POLL_INTERVAL_SECS),
            max_polls: timeout_secs as u32,
            show_progress: true,
        }
    }

    /// Poller for tests: no sleeping, no terminal output
    #[cfg(test)]
    pub fn immediate(max_polls: u32) -> Self {
        SearchPoller {
            poll_interval: Duration::ZERO,
            max_polls,
            show_progress: false,
        }
    }

    /// Poll until the search completes. Completion with CANCELED or
    /// ERROR status is still a completed search; callers inspect the
    /// final status.
    pub fn wait_for_completion(
        &self,
        api: &dyn SearchApi,
        mut search: ArielSearch,
        interrupted: &AtomicBool,
    ) -> Result<ArielSearch, SearchError> {
        info!(
            "Polling for completion of ariel search with id {}",
            search.search_id
        );
        let mut polls = 0u32;
        while !search.completed {
            if interrupted.load(Ordering::Relaxed) {
                return Err(SearchError::Interrupted);
            }
            if polls >= self.max_polls {
                return Err(SearchError::TimedOut {
                    search_id: search.search_id,
                    polls,
                });
            }
            if let Some(current) = api.get_search(&search.search_id)? {
                search = current;
                info!(
                    "Ariel search with id {} has status {}",
                    search.search_id,
                    search.status.as_str()
                );
                if self.show_progress {
                    progress::print_progress_bar(search.progress);
                }
            }
            polls += 1;
            if !search.completed && !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }
        info!("Ariel search with id {} completed", search.search_id);
        Ok(search)
    }
}

/// Fetch every page of a completed search's results. Pages are requested
/// with an inclusive item range advanced 50 records at a time until the
/// search's record count is exhausted.
pub fn fetch_all_search_results(
    api: &dyn SearchApi,
    search: &ArielSearch,
) -> Result<Vec<Value>, RestError> {
    let mut results = Vec::new();
    if search.record_count == 0 {
        return Ok(results);
    }
    let mut range_start = 0u64;
    let mut range_end = MAX_SEARCH_RESULTS_PER_REQUEST;
    while range_start < search.record_count {
        let last_item = range_end.min(search.record_count - 1);
        let range = format!("items={}-{}", range_start, last_item);
        debug!("Fetching search results page {}", range);
        let page = api.search_results(&search.search_id, Some(&range))?;
        if page.is_empty() {
            debug!("No search results returned from Ariel API search");
            break;
        }
        results.extend(page);
        range_start = range_end + 1;
        range_end = range_start + MAX_SEARCH_RESULTS_PER_REQUEST;
    }
    Ok(results)
}

//! Counting pipeline module
//!
//! Owns the run state (device map, exclusions, tallies) and drives the
//! stages in order:
//! 1. per-source triage: device-type exclusion, no-domain skip,
//!    identifier resolution, device-map insertion
//! 2. hostname-to-IP consolidation
//! 3. Windows workstation removal
//! 4. final count
//!
//! All state is owned here and passed through explicitly; nothing
//! ambient survives between runs.

use crate::consolidate::{consolidate_device_map, HostResolver};
use crate::constants::LOG_SOURCE_EXCLUDE;
use crate::count::count_devices;
use crate::errors::CountError;
use crate::models::{LogSource, MvsResults};
use crate::search::{SearchApi, SearchPoller};
use crate::windows::WindowsWorkstationClassifier;
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the pipeline needs besides the log sources themselves
pub struct PipelineConfig {
    pub multi_domain: bool,
    pub period_in_days: u32,
    pub search_timeout_secs: u64,
    /// Windows-server event catalogue ids for the workstation check
    pub windows_server_qids: Vec<i64>,
    pub workstation_cache_path: PathBuf,
}

/// Drives one counting run. Generic over the identifier resolver, the
/// search API and the host resolver so every stage can be exercised
/// without a console behind it.
pub struct LogSourceProcessor<'a, F, A, R>
where
    F: FnMut(&LogSource) -> String,
    A: SearchApi,
    R: HostResolver,
{
    resolve_identifier: F,
    api: &'a A,
    host_resolver: R,
    config: PipelineConfig,
    results: MvsResults,
    multi_domain_identifiers: Vec<String>,
}

impl<'a, F, A, R> LogSourceProcessor<'a, F, A, R>
where
    F: FnMut(&LogSource) -> String,
    A: SearchApi,
    R: HostResolver,
{
    pub fn new(resolve_identifier: F, api: &'a A, host_resolver: R, config: PipelineConfig) -> Self {
        LogSourceProcessor {
            resolve_identifier,
            api,
            host_resolver,
            config,
            results: MvsResults::default(),
            multi_domain_identifiers: Vec::new(),
        }
    }

    fn add_to_device_map(&mut self, machine_identifier: String, log_source: LogSource) {
        self.results
            .device_map
            .entry(machine_identifier)
            .or_default()
            .push(log_source);
    }

    /// Triage one log source into excluded, skipped, or the device map
    fn process_log_source(&mut self, log_source: LogSource) {
        if LOG_SOURCE_EXCLUDE.contains(&log_source.device_type_id) {
            info!(
                "Device type id {} is in the exclusion list, skipping...",
                log_source.device_type_id
            );
            self.results.add_excluded_log_source(log_source);
            return;
        }
        if log_source.domains.is_empty() {
            error!(
                "Log source with id {} has no domains, skipping...",
                log_source.sensor_device_id
            );
            self.results.add_skipped_log_source(log_source);
            return;
        }
        let machine_identifier = (self.resolve_identifier)(&log_source);
        if log_source.is_multi_domain() {
            self.multi_domain_identifiers
                .push(machine_identifier.clone());
        }
        self.add_to_device_map(machine_identifier, log_source);
    }

    fn remove_windows_workstations(&mut self, interrupted: &AtomicBool) -> Result<(), CountError> {
        let classifier = WindowsWorkstationClassifier::new(
            self.api,
            self.config.windows_server_qids.clone(),
            self.config.period_in_days,
            SearchPoller::new(self.config.search_timeout_secs),
            &self.config.workstation_cache_path,
        );
        let workstations = classifier.find_workstations(&self.results.device_map, interrupted)?;
        for machine_identifier in workstations {
            info!(
                "Removing machine identifier {} from device map as its a windows workstation",
                machine_identifier
            );
            if let Some(log_sources) = self.results.device_map.remove(&machine_identifier) {
                self.results
                    .add_windows_workstation(&machine_identifier, log_sources);
            }
        }
        Ok(())
    }

    fn check_interrupted(interrupted: &AtomicBool) -> Result<(), CountError> {
        if interrupted.load(Ordering::Relaxed) {
            return Err(CountError::Interrupted);
        }
        Ok(())
    }

    /// Run the whole pipeline over the enriched log sources
    pub fn process_log_sources(
        &mut self,
        log_sources: Vec<LogSource>,
        interrupted: &AtomicBool,
    ) -> Result<(), CountError> {
        self.results.log_source_count = log_sources.len();
        for log_source in log_sources {
            Self::check_interrupted(interrupted)?;
            self.process_log_source(log_source);
        }
        consolidate_device_map(
            &mut self.results.device_map,
            &mut self.multi_domain_identifiers,
            &self.host_resolver,
        );
        Self::check_interrupted(interrupted)?;
        self.remove_windows_workstations(interrupted)?;
        count_devices(
            &mut self.results,
            &self.multi_domain_identifiers,
            self.config.multi_domain,
        );
        Ok(())
    }

    pub fn into_results(self) -> MvsResults {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::FakeSearchApi;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use tempfile::TempDir;

    struct TableResolver {
        table: HashMap<String, IpAddr>,
    }

    impl TableResolver {
        fn new(entries: &[(&str, &str)]) -> Self {
            let mut table = HashMap::new();
            for (host, ip) in entries {
                table.insert(host.to_string(), ip.parse().unwrap());
            }
            TableResolver { table }
        }
    }

    impl HostResolver for TableResolver {
        fn resolve(&self, host: &str) -> Option<IpAddr> {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Some(ip);
            }
            self.table.get(host).copied()
        }
    }

    fn source(id: i64, hostname: &str, device_type_id: i64, domains: &[&str]) -> LogSource {
        let mut log_source =
            LogSource::new(id, hostname, &format!("Source {}", id), device_type_id, 100, 0);
        for domain in domains {
            log_source.add_domain(domain);
        }
        log_source
    }

    fn config(dir: &TempDir, multi_domain: bool) -> PipelineConfig {
        PipelineConfig {
            multi_domain,
            period_in_days: 1,
            search_timeout_secs: 10,
            windows_server_qids: vec![90001],
            workstation_cache_path: dir.path().join(".windows_workstations"),
        }
    }

    fn run_pipeline(
        log_sources: Vec<LogSource>,
        resolver_table: &[(&str, &str)],
        api: &FakeSearchApi,
        multi_domain: bool,
    ) -> MvsResults {
        let dir = TempDir::new().unwrap();
        let mut processor = LogSourceProcessor::new(
            |log_source: &LogSource| log_source.hostname.clone(),
            api,
            TableResolver::new(resolver_table),
            config(&dir, multi_domain),
        );
        let interrupted = AtomicBool::new(false);
        processor
            .process_log_sources(log_sources, &interrupted)
            .unwrap();
        processor.into_results()
    }

    #[test]
    fn test_excluded_device_types_never_reach_the_device_map() {
        let api = FakeSearchApi::new();
        let results = run_pipeline(
            vec![
                source(1, "10.0.0.1", 331, &["Default Domain"]),
                source(2, "10.0.0.2", 405, &["Default Domain"]),
                source(3, "10.0.0.3", 200, &["Default Domain"]),
            ],
            &[],
            &api,
            false,
        );
        assert_eq!(results.log_source_count, 3);
        assert_eq!(results.excluded_log_sources.len(), 2);
        assert_eq!(results.device_map.len(), 1);
        assert!(results.device_map.contains_key("10.0.0.3"));
        assert_eq!(results.mvs_count, 1);
    }

    #[test]
    fn test_sources_without_domains_are_skipped() {
        let api = FakeSearchApi::new();
        let results = run_pipeline(
            vec![
                source(1, "10.0.0.1", 200, &[]),
                source(2, "10.0.0.2", 200, &["Default Domain"]),
            ],
            &[],
            &api,
            false,
        );
        assert_eq!(results.skipped_log_sources.len(), 1);
        assert_eq!(results.skipped_log_sources[0].sensor_device_id, 1);
        assert_eq!(results.mvs_count, 1);
    }

    #[test]
    fn test_hostname_resolving_to_known_ip_is_merged() {
        let api = FakeSearchApi::new();
        let results = run_pipeline(
            vec![
                source(1, "server-a", 200, &["Default Domain"]),
                source(2, "10.0.0.5", 200, &["Default Domain"]),
            ],
            &[("server-a", "10.0.0.5")],
            &api,
            false,
        );
        assert_eq!(results.device_map.len(), 1);
        assert!(!results.device_map.contains_key("server-a"));
        assert_eq!(results.device_map["10.0.0.5"].len(), 2);
        assert_eq!(results.mvs_count, 1);
    }

    #[test]
    fn test_confirmed_workstation_is_excluded_from_the_count() {
        let mut api = FakeSearchApi::new();
        api.start_response = Some(FakeSearchApi::search(
            "w1",
            crate::models::SearchStatus::Wait,
            false,
            0,
        ));
        api.poll_responses.borrow_mut().push(FakeSearchApi::search(
            "w1",
            crate::models::SearchStatus::Completed,
            true,
            0,
        ));
        let results = run_pipeline(
            vec![
                source(1, "10.0.0.6", 12, &["Default Domain"]),
                source(2, "10.0.0.7", 200, &["Default Domain"]),
            ],
            &[],
            &api,
            false,
        );
        assert_eq!(results.mvs_count, 1);
        assert!(!results.device_map.contains_key("10.0.0.6"));
        assert!(results
            .windows_workstation_device_map
            .contains_key("10.0.0.6"));
        assert_eq!(results.excluded_log_source_count(), 1);
    }

    #[test]
    fn test_multi_domain_count_spans_union_of_domains() {
        let api = FakeSearchApi::new();
        let results = run_pipeline(
            vec![
                source(1, "10.0.0.8", 200, &["A", "B"]),
                source(2, "10.0.0.9", 200, &["C"]),
            ],
            &[],
            &api,
            true,
        );
        assert_eq!(results.mvs_count, 3);
        assert_eq!(results.domain_count_map.len(), 3);
        assert_eq!(results.domain_count_map["A"], 1);
        assert_eq!(results.domain_count_map["B"], 1);
        assert_eq!(results.domain_count_map["C"], 1);
    }

    #[test]
    fn test_interrupt_aborts_the_run() {
        let api = FakeSearchApi::new();
        let dir = TempDir::new().unwrap();
        let mut processor = LogSourceProcessor::new(
            |log_source: &LogSource| log_source.hostname.clone(),
            &api,
            TableResolver::new(&[]),
            config(&dir, false),
        );
        let interrupted = AtomicBool::new(true);
        let err = processor
            .process_log_sources(
                vec![source(1, "10.0.0.1", 200, &["Default Domain"])],
                &interrupted,
            )
            .unwrap_err();
        assert!(matches!(err, CountError::Interrupted));
    }
}

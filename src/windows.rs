//! Windows workstation classification module
//!
//! A log source of the generic Windows security event type is ambiguous
//! between a server and a workstation. Per candidate machine identifier:
//! - a co-located server-marker log source type (IIS/DHCP/IAS/Exchange/
//!   SQL/ISA) settles it as a server, no search needed
//! - otherwise a presence search over the window, restricted to the
//!   server-only event catalogue ids and the machine's security-event
//!   log sources, decides: zero records means workstation
//!
//! Confirmed workstations are cached in an append-only file so repeat
//! runs skip the search for them.

use crate::constants::{
    MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE, WINDOWS_SERVER_LOG_SOURCE_TYPES,
};
use crate::errors::{CountError, SearchError};
use crate::models::LogSource;
use crate::search::{SearchApi, SearchPoller};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Classifies candidate machines as Windows workstations
pub struct WindowsWorkstationClassifier<'a, A: SearchApi> {
    api: &'a A,
    /// Event catalogue ids that only Windows servers emit
    server_qids: Vec<i64>,
    period_in_days: u32,
    poller: SearchPoller,
    cache_path: PathBuf,
    cached_workstations: Vec<String>,
    workstations: Vec<String>,
}

impl<'a, A: SearchApi> WindowsWorkstationClassifier<'a, A> {
    pub fn new(
        api: &'a A,
        server_qids: Vec<i64>,
        period_in_days: u32,
        poller: SearchPoller,
        cache_path: &Path,
    ) -> Self {
        WindowsWorkstationClassifier {
            api,
            server_qids,
            period_in_days,
            poller,
            cache_path: cache_path.to_path_buf(),
            cached_workstations: Vec::new(),
            workstations: Vec::new(),
        }
    }

    fn read_cache(&mut self) {
        if self.cache_path.exists() {
            if let Ok(contents) = std::fs::read_to_string(&self.cache_path) {
                self.cached_workstations = contents.lines().map(str::to_string).collect();
            }
        }
    }

    /// Append a newly confirmed workstation to the cache file. Cache
    /// write failures are logged, never fatal.
    fn store_in_cache(&self, machine_identifier: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.cache_path)
            .and_then(|mut file| writeln!(file, "{}", machine_identifier));
        if let Err(err) = result {
            log::error!(
                "Unable to append {} to the workstation cache, Reason [{}]",
                machine_identifier,
                err
            );
        }
    }

    fn workstation_query(&self, log_source_ids: &[i64]) -> String {
        let ls_ids = log_source_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let qids = self
            .server_qids
            .iter()
            .map(|qid| qid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "SELECT qid FROM events WHERE logsourceid IN ({}) AND qid IN ({}) \
             LIMIT 1 LAST {} DAYS",
            ls_ids, qids, self.period_in_days
        )
    }

    /// Run the presence search for one machine. Zero matching records
    /// over the window confirms a workstation.
    fn perform_workstation_check(
        &mut self,
        machine_identifier: &str,
        log_source_ids: &[i64],
        interrupted: &AtomicBool,
    ) -> Result<(), CountError> {
        info!("Performing workstation check on {}", machine_identifier);
        println!(
            "\nPerforming AQL query to check if {} is a windows server or workstation, Please wait...",
            machine_identifier
        );
        let query = self.workstation_query(log_source_ids);
        debug!("Attempting to execute AQL query {}", query);
        let search = self
            .api
            .start_search(&query)
            .map_err(|err| CountError::WindowsWorkstationRetrieval(err.to_string()))?
            .ok_or_else(|| {
                CountError::WindowsWorkstationRetrieval(
                    "POST to ariel API returned a 404".to_string(),
                )
            })?;
        let search = self
            .poller
            .wait_for_completion(self.api, search, interrupted)
            .map_err(|err| match err {
                SearchError::Interrupted => CountError::Interrupted,
                other => CountError::WindowsWorkstationRetrieval(other.to_string()),
            })?;
        let result_count = self
            .api
            .search_results(&search.search_id, None)
            .map_err(|err| CountError::WindowsWorkstationRetrieval(err.to_string()))?
            .len();
        info!(
            "Event result count was {} for {}",
            result_count, machine_identifier
        );
        if result_count == 0 {
            debug!(
                "Result count was 0 for machine identifier {}",
                machine_identifier
            );
            self.workstations.push(machine_identifier.to_string());
            if !self
                .cached_workstations
                .iter()
                .any(|cached| cached == machine_identifier)
            {
                self.store_in_cache(machine_identifier);
            }
        }
        Ok(())
    }

    /// Check one machine: a server-marker log source settles it, else
    /// the machine's security-event sources feed the presence search
    fn check_machine(
        &mut self,
        machine_identifier: &str,
        log_sources: &[LogSource],
        interrupted: &AtomicBool,
    ) -> Result<(), CountError> {
        let mut security_event_log_source_ids = Vec::new();
        for log_source in log_sources {
            if log_source.device_type_id == MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE {
                info!(
                    "Found windows security event log source associated with machine identifier {}, \
                     storing log source {} for further processing",
                    machine_identifier, log_source.sensor_device_id
                );
                security_event_log_source_ids.push(log_source.sensor_device_id);
            }
            if WINDOWS_SERVER_LOG_SOURCE_TYPES.contains(&log_source.device_type_id) {
                info!(
                    "Log source {} associated with machine identifier {} is a windows server",
                    log_source.sensor_device_id, machine_identifier
                );
                return Ok(());
            }
        }
        if !security_event_log_source_ids.is_empty() {
            self.perform_workstation_check(
                machine_identifier,
                &security_event_log_source_ids,
                interrupted,
            )?;
        }
        Ok(())
    }

    /// Classify every machine in the device map, consuming the cache
    /// first. Returns the identifiers confirmed as workstations.
    pub fn find_workstations(
        mut self,
        device_map: &HashMap<String, Vec<LogSource>>,
        interrupted: &AtomicBool,
    ) -> Result<Vec<String>, CountError> {
        self.read_cache();
        // Sorted traversal keeps prompts and logs stable across runs
        let mut machine_identifiers: Vec<&String> = device_map.keys().collect();
        machine_identifiers.sort();
        for machine_identifier in machine_identifiers {
            if self
                .cached_workstations
                .iter()
                .any(|cached| cached == machine_identifier)
            {
                info!(
                    "Machine identifier {} was found in the windows workstation cache, \
                     skipping ariel search",
                    machine_identifier
                );
                self.workstations.push(machine_identifier.clone());
                continue;
            }
            self.check_machine(machine_identifier, &device_map[machine_identifier], interrupted)?;
        }
        Ok(self.workstations)
    }
}

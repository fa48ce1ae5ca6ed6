//! Domain enrichment module
//!
//! Attaches administrative domain names to every log source in the
//! working set:
//! - Multi-domain deployments run one search over the whole window that
//!   groups recent events by log source and domain, then apply the
//!   resulting log-source-id to domain-names mapping
//! - Sources absent from the mapping, and every source on a
//!   single-domain deployment, get the synthetic default domain

use crate::constants::DEFAULT_DOMAIN;
use crate::errors::{CountError, SearchError};
use crate::models::LogSource;
use crate::search::{fetch_all_search_results, SearchApi, SearchPoller};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

/// Mapping of log source id to the distinct domain names observed for
/// it, built from the search's result records
#[derive(Debug, Default)]
pub struct LogSourceDomainMap {
    mapping: HashMap<i64, Vec<String>>,
}

impl LogSourceDomainMap {
    /// Fold one result record into the mapping. Records missing either
    /// field are ignored.
    pub fn add_record(&mut self, record: &Value) {
        let log_source_id = record.get("logsourceid").and_then(Value::as_i64);
        let domain_name = record.get("domainname_domainid").and_then(Value::as_str);
        if let (Some(log_source_id), Some(domain_name)) = (log_source_id, domain_name) {
            self.mapping
                .entry(log_source_id)
                .or_default()
                .push(domain_name.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &Vec<String>)> {
        self.mapping.iter()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Enriches log sources with domain information for one counting pass
pub struct DomainAppender<'a, A: SearchApi> {
    api: &'a A,
    period_in_days: u32,
    poller: SearchPoller,
}

impl<'a, A: SearchApi> DomainAppender<'a, A> {
    pub fn new(api: &'a A, period_in_days: u32, poller: SearchPoller) -> Self {
        DomainAppender {
            api,
            period_in_days,
            poller,
        }
    }

    fn domain_query(&self) -> String {
        format!(
            "SELECT logsourceid,DOMAINNAME(domainid) FROM events \
             GROUP BY logsourceid,domainid ORDER BY logsourceid LAST {} DAYS",
            self.period_in_days
        )
    }

    fn build_log_source_domain_map(
        &self,
        interrupted: &AtomicBool,
    ) -> Result<LogSourceDomainMap, CountError> {
        println!("\nPerforming AQL query to retrieve log source domain information, Please wait...");
        let query = self.domain_query();
        debug!("Attempting to execute AQL query {}", query);
        let search = self
            .api
            .start_search(&query)
            .map_err(|err| CountError::DomainRetrieval(err.to_string()))?
            .ok_or_else(|| {
                CountError::DomainRetrieval("POST to ariel API returned a 404".to_string())
            })?;
        let search = self
            .poller
            .wait_for_completion(self.api, search, interrupted)
            .map_err(|err| match err {
                SearchError::Interrupted => CountError::Interrupted,
                other => CountError::DomainRetrieval(other.to_string()),
            })?;
        if search.status.is_failure() {
            return Err(CountError::DomainRetrieval(format!(
                "Ariel search did not complete successfully, status is {}",
                search.status.as_str()
            )));
        }
        let records = fetch_all_search_results(self.api, &search)
            .map_err(|err| CountError::DomainRetrieval(err.to_string()))?;
        let mut mapping = LogSourceDomainMap::default();
        for record in &records {
            mapping.add_record(record);
        }
        debug!("Domain mapping has {} log source entries", mapping.len());
        Ok(mapping)
    }

    /// Apply domain information to every log source in the map. Sources
    /// covered by the search mapping get exactly that domain list;
    /// everything else falls back to the default domain.
    pub fn add_domains(
        &self,
        log_source_map: &mut HashMap<i64, LogSource>,
        interrupted: &AtomicBool,
    ) -> Result<(), CountError> {
        let mapping = self.build_log_source_domain_map(interrupted)?;
        for (log_source_id, domains) in mapping.iter() {
            if let Some(log_source) = log_source_map.get_mut(log_source_id) {
                info!(
                    "Appending domain information for log source id {}",
                    log_source_id
                );
                log_source.set_domains(domains.clone());
            }
        }
        for log_source in log_source_map.values_mut() {
            if log_source.domains.is_empty() {
                log_source.add_domain(DEFAULT_DOMAIN);
            }
        }
        info!("Completed adding domain information to log sources");
        Ok(())
    }
}

/// Single-domain deployments skip the search entirely; every source
/// belongs to the default domain.
pub fn append_default_domain(log_source_map: &mut HashMap<i64, LogSource>) {
    info!("Appending default domain to all log sources");
    for log_source in log_source_map.values_mut() {
        log_source.add_domain(DEFAULT_DOMAIN);
    }
}

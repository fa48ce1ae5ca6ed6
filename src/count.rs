//! Domain counting module
//!
//! Computes the final MVS count from the consolidated device map:
//! - single-domain deployments count one MVS per consolidated machine
//!   identifier and skip the domain breakdown entirely
//! - multi-domain deployments count one MVS per distinct domain in the
//!   union of a multi-domain identifier's sources, and exactly one for
//!   every other identifier, keyed off its first source's first domain

use crate::models::{LogSource, MvsResults};
use log::{info, warn};

/// Union of every source's domain list under one identifier, preserving
/// first-seen order
fn domain_union(log_sources: &[LogSource]) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for log_source in log_sources {
        for domain in &log_source.domains {
            if !domains.contains(domain) {
                domains.push(domain.clone());
            }
        }
    }
    domains
}

fn count_multi_domain_device(
    results: &mut MvsResults,
    machine_identifier: &str,
    domains: &[String],
) {
    info!(
        "Machine Identifier {} is associated with domains {:?}",
        machine_identifier, domains
    );
    for domain in domains {
        results.increment_count_for(domain);
    }
}

fn count_single_domain_device(
    results: &mut MvsResults,
    machine_identifier: &str,
    log_sources: &[LogSource],
) {
    // Identifiers not flagged multi-domain are expected to carry the
    // same single domain on every source; only the first is read. Warn
    // when that invariant does not hold, since the count then drops
    // information.
    let first_domains: Vec<&str> = log_sources
        .iter()
        .filter_map(LogSource::first_domain)
        .collect();
    if first_domains.windows(2).any(|pair| pair[0] != pair[1]) {
        warn!(
            "Machine identifier {} is not flagged multi-domain but its log sources \
             disagree on domain: {:?}",
            machine_identifier, first_domains
        );
    }
    let domain = log_sources.first().and_then(LogSource::first_domain);
    if let Some(domain) = domain {
        info!(
            "Machine Identifier {} is associated with domain {}",
            machine_identifier, domain
        );
        let domain = domain.to_string();
        results.increment_count_for(&domain);
    }
}

/// Compute the final count into `results`. `multi_domain` is the
/// deployment-level switch; `multi_domain_identifiers` flags the
/// machines whose sources span more than one domain.
pub fn count_devices(
    results: &mut MvsResults,
    multi_domain_identifiers: &[String],
    multi_domain: bool,
) {
    if !multi_domain {
        results.mvs_count = results.device_map.len() as u64;
        return;
    }
    // Sorted traversal keeps the tally deterministic for reporting
    let mut machine_identifiers: Vec<String> = results.device_map.keys().cloned().collect();
    machine_identifiers.sort();
    for machine_identifier in machine_identifiers {
        let log_sources = results.device_map[&machine_identifier].clone();
        if multi_domain_identifiers.contains(&machine_identifier) {
            let domains = domain_union(&log_sources);
            count_multi_domain_device(results, &machine_identifier, &domains);
        } else {
            count_single_domain_device(results, &machine_identifier, &log_sources);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with_domains(id: i64, domains: &[&str]) -> LogSource {
        let mut source = LogSource::new(id, &format!("host-{}", id), "Host", 12, 100, 0);
        for domain in domains {
            source.add_domain(domain);
        }
        source
    }

    #[test]
    fn test_single_domain_deployment_counts_map_keys() {
        let mut results = MvsResults::default();
        results
            .device_map
            .insert("10.0.0.1".to_string(), vec![source_with_domains(1, &["Default Domain"])]);
        results
            .device_map
            .insert("10.0.0.2".to_string(), vec![source_with_domains(2, &["Default Domain"])]);

        count_devices(&mut results, &[], false);

        assert_eq!(results.mvs_count, 2);
        assert!(results.domain_count_map.is_empty());
    }

    #[test]
    fn test_multi_domain_union_counts_one_per_domain() {
        // One machine flagged multi-domain spanning {A, B}, one machine
        // with a single source in C: total 3, one per domain
        let mut results = MvsResults::default();
        results.device_map.insert(
            "10.0.0.1".to_string(),
            vec![
                source_with_domains(1, &["A"]),
                source_with_domains(2, &["A", "B"]),
            ],
        );
        results
            .device_map
            .insert("10.0.0.2".to_string(), vec![source_with_domains(3, &["C"])]);

        count_devices(&mut results, &["10.0.0.1".to_string()], true);

        assert_eq!(results.mvs_count, 3);
        assert_eq!(results.domain_count_map["A"], 1);
        assert_eq!(results.domain_count_map["B"], 1);
        assert_eq!(results.domain_count_map["C"], 1);
    }

    #[test]
    fn test_domain_union_preserves_first_seen_order() {
        let sources = vec![
            source_with_domains(1, &["B", "A"]),
            source_with_domains(2, &["C", "A"]),
        ];
        assert_eq!(domain_union(&sources), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_non_multi_domain_identifier_reads_first_source_only() {
        let mut results = MvsResults::default();
        results.device_map.insert(
            "10.0.0.3".to_string(),
            vec![
                source_with_domains(4, &["Alpha"]),
                source_with_domains(5, &["Alpha"]),
            ],
        );

        count_devices(&mut results, &[], true);

        assert_eq!(results.mvs_count, 1);
        assert_eq!(results.domain_count_map["Alpha"], 1);
    }

    #[test]
    fn test_domain_tallies_accumulate_across_identifiers() {
        let mut results = MvsResults::default();
        results.device_map.insert(
            "10.0.0.1".to_string(),
            vec![source_with_domains(1, &["A", "B"])],
        );
        results
            .device_map
            .insert("10.0.0.2".to_string(), vec![source_with_domains(2, &["A"])]);

        count_devices(&mut results, &["10.0.0.1".to_string()], true);

        assert_eq!(results.mvs_count, 3);
        assert_eq!(results.domain_count_map["A"], 2);
        assert_eq!(results.domain_count_map["B"], 1);
    }

    #[test]
    fn test_sources_without_domains_count_nothing() {
        let mut results = MvsResults::default();
        results
            .device_map
            .insert("10.0.0.4".to_string(), vec![source_with_domains(6, &[])]);

        count_devices(&mut results, &[], true);

        assert_eq!(results.mvs_count, 0);
        assert!(results.domain_count_map.is_empty());
    }
}

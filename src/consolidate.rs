//! Device consolidation module
//!
//! Machine identifiers coming out of resolution are a mix of hostnames
//! and IP literals. Consolidation resolves every hostname to an IP and
//! merges entries that collide after resolution, so one physical machine
//! is counted once:
//! - resolution failures leave the entry untouched (logged, not fatal)
//! - merges are keyed by the resolved IP value, never by traversal
//!   order, so the outcome is identical for any iteration order
//! - the multi-domain identifier list is re-keyed in lockstep

use crate::models::LogSource;
use log::{debug, error, info};
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

/// Forward hostname-to-IP resolution, as a trait so consolidation can be
/// tested with a fixed resolution table
pub trait HostResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// System resolver. An IP literal resolves to itself, matching
/// gethostbyname semantics.
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        match (host, 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let addrs: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
                // Prefer IPv4, like the legacy gethostbyname lookup did
                addrs
                    .iter()
                    .find(|ip| ip.is_ipv4())
                    .or_else(|| addrs.first())
                    .copied()
            }
            Err(err) => {
                error!("Unable to resolve hostname {} to IP, Reason [{}]", host, err);
                None
            }
        }
    }
}

/// Resolve hostname identifiers to IPs and merge colliding entries.
/// `multi_domain_identifiers` is updated in lockstep so later counting
/// keys off the post-resolution identifier set.
pub fn consolidate_device_map(
    device_map: &mut HashMap<String, Vec<LogSource>>,
    multi_domain_identifiers: &mut Vec<String>,
    resolver: &dyn HostResolver,
) {
    info!("Attempting to resolve hostnames to ips");
    let mut additions: HashMap<String, Vec<LogSource>> = HashMap::new();
    let mut removals: Vec<String> = Vec::new();

    let machine_identifiers: Vec<String> = device_map.keys().cloned().collect();
    for machine_identifier in machine_identifiers {
        let device_ip = match resolver.resolve(&machine_identifier) {
            Some(ip) => ip.to_string(),
            None => continue,
        };
        if device_ip == machine_identifier {
            continue;
        }
        info!(
            "Resolved machine identifier {} to ip address {}",
            machine_identifier, device_ip
        );
        let log_sources = device_map
            .get(&machine_identifier)
            .cloned()
            .unwrap_or_default();
        if let Some(existing) = device_map.get_mut(&device_ip) {
            debug!(
                "Device ip {} is already present in device map, appending log sources to this IP",
                device_ip
            );
            existing.extend(log_sources);
        } else {
            debug!("Adding device ip {} to additions map", device_ip);
            additions.entry(device_ip.clone()).or_default().extend(log_sources);
        }
        debug!(
            "Adding machine identifier {} to removals list",
            machine_identifier
        );
        removals.push(machine_identifier.clone());
        if !multi_domain_identifiers.contains(&device_ip) {
            multi_domain_identifiers.push(device_ip);
        }
        if let Some(position) = multi_domain_identifiers
            .iter()
            .position(|id| *id == machine_identifier)
        {
            multi_domain_identifiers.remove(position);
        }
    }

    for (device_ip, log_sources) in additions {
        device_map.entry(device_ip).or_default().extend(log_sources);
    }
    for machine_identifier in removals {
        debug!(
            "Removing entry for hostname {}, which has been resolved to an IP",
            machine_identifier
        );
        device_map.remove(&machine_identifier);
    }
}

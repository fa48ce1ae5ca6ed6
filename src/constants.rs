//! Global constants for countmvs
//!
//! Centralized location for application-wide constants

/// Default file the run log is written to
pub const DEFAULT_LOG_FILE: &str = "/var/log/countMVS.log";

/// Default file the detailed report is written to
pub const DEFAULT_REPORT_FILE: &str = "mvsCount.csv";

/// Database the console stores its configuration in
pub const DB_NAME: &str = "qradar";

/// Database user the tool connects as
pub const DB_USER: &str = "qradar";

/// Directory holding the local postgres socket on the console
pub const DB_SOCKET_DIR: &str = "/var/run/postgresql";

/// Utility queried to confirm the tool is running on the console host
pub const MYVER_PATH: &str = "/opt/qradar/bin/myver";

/// Default and maximum length of the data window, in days
pub const DEFAULT_PERIOD_IN_DAYS: u32 = 1;
pub const MAX_PERIOD_IN_DAYS: u32 = 10;

/// One day expressed in epoch milliseconds
pub const DAY_IN_MILLISECONDS: i64 = 86_400_000;

/// Seconds between polls of an in-flight search
pub const SEARCH_POLL_INTERVAL_SECS: u64 = 1;

/// Default cap on the number of polls before a search is declared stuck.
/// One poll per second, so this is roughly five minutes per search.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 300;

/// Search results are requested in pages of 50 items (ranges are inclusive)
pub const MAX_SEARCH_RESULTS_PER_REQUEST: u64 = 49;

/// Domain assigned to log sources with no domain mapping of their own
pub const DEFAULT_DOMAIN: &str = "Default Domain";

/// File that caches machine identifiers already confirmed as Windows
/// workstations, one per line, appended across runs
pub const WINDOWS_WORKSTATION_CACHE_FILE: &str = ".windows_workstations";

/// Log source type IDs that are considered "not MVS".
/// Future versions will be more comprehensive in what to exclude but for
/// now this list is all we need to remove.
pub const LOG_SOURCE_EXCLUDE: &[i64] = &[331, 352, 359, 361, 382, 405];

/// Device type id of the generic Microsoft Windows security event log
/// source, ambiguous between a server and a workstation
pub const MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE: i64 = 12;

/// Device type ids that positively identify a machine as a Windows server
/// (IIS, DHCP, IAS, Exchange, SQL Server, ISA)
pub const WINDOWS_SERVER_LOG_SOURCE_TYPES: &[i64] = &[13, 97, 98, 99, 101, 191];

/// Vendor event ids that only Windows servers emit. Resolved to internal
/// event catalogue ids (QIDs) before being used in a search.
pub const WINDOWS_SERVER_EVENT_IDS: &[i64] = &[
    4768, 4727, 4728, 4729, 4730, 4737, 4744, 4745, 4746, 4747, 4748, 4749, 4750, 4751, 4752, 4753,
    4754, 4755, 4756, 4757, 4758, 4759, 4760, 4761, 4762, 4763, 4770, 4771, 4777,
];

/// Map of sensor protocol type ids to the name of the protocol parameter
/// that can be used as a unique machine identifier
pub const SENSOR_PROTOCOL_MAP: &[(i64, &str)] = &[
    (2, "serverIp"),
    (7, "url"),
    (8, "databaseServerHostname"),
    (9, "deviceAddress"),
    (15, "remoteHost"),
    (16, "SERVER_ADDRESS"),
    (17, "SERVER_ADDRESS"),
    (18, "SERVER_ADDRESS"),
    (19, "serverAddress"),
    (20, "databaseServerHostname"),
    (21, "SERVER_ADDRESS"),
    (32, "SERVER_ADDRESS"),
    (34, "ESXIP"),
    (37, "databaseServerHostname"),
    (42, "databaseServerHostname"),
    (43, "vcloudURL"),
    (54, "loginUrl"),
    (55, "databaseServerHostname"),
    (56, "loginUrl"),
    (60, "remoteHost"),
    (63, "remoteHost"),
    (65, "server"),
    (67, "databaseServerHostname"),
    (68, "hostname"),
    (69, "server"),
    (74, "tenantUrl"),
    (75, "apiHostname"),
    (77, "authorizationServerUrl"),
    (79, "serverurl"),
    (83, "endpointURL"),
    (84, "hostname"),
    (87, "loginEndPoint"),
    (90, "authorizationEndPoint"),
];

/// Look up the identifier parameter name for a sensor protocol type id
pub fn sensor_protocol_parameter(sp_id: i64) -> Option<&'static str> {
    SENSOR_PROTOCOL_MAP
        .iter()
        .find(|(id, _)| *id == sp_id)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_protocol_parameter_lookup() {
        assert_eq!(sensor_protocol_parameter(2), Some("serverIp"));
        assert_eq!(sensor_protocol_parameter(90), Some("authorizationEndPoint"));
        assert_eq!(sensor_protocol_parameter(1), None);
    }

    #[test]
    fn test_windows_server_types_do_not_overlap_exclusions() {
        for type_id in WINDOWS_SERVER_LOG_SOURCE_TYPES {
            assert!(!LOG_SOURCE_EXCLUDE.contains(type_id));
        }
        assert!(!LOG_SOURCE_EXCLUDE.contains(&MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE));
    }
}

//! Machine identifier resolution module
//!
//! Turns a raw log source into the deduplication key used by the
//! counting pipeline:
//! - Default identifier is the log source's configured hostname
//! - Protocol types in SENSOR_PROTOCOL_MAP carry a named configuration
//!   parameter whose stored value replaces the hostname
//! - URL-shaped values are stripped down to the bare host/IP token
//!
//! Lookups return a tagged result; the fallback-to-hostname policy lives
//! in `resolve_machine_identifier`, not in catch blocks inside the
//! lookup itself.

use crate::constants::sensor_protocol_parameter;
use crate::errors::DbError;
use crate::models::LogSource;
use log::{debug, error};

/// The two protocol-config lookups identifier resolution needs.
/// Implemented by `DatabaseService`; faked in tests.
pub trait ProtocolConfigSource {
    /// Protocol type id for a protocol config row
    fn sensor_protocol_id(&mut self, sp_config: i64) -> Result<Option<i64>, DbError>;
    /// Value of a named parameter on a protocol config row
    fn config_param_value(&mut self, sp_config: i64, name: &str) -> Result<Option<String>, DbError>;
}

/// Outcome of a protocol-parameter lookup for one log source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierLookup {
    /// The protocol carries an identifier parameter and it has a value
    Parameter(String),
    /// The protocol type has no identifier parameter mapped
    NoMapping,
    /// The parameter is mapped but no value is stored
    NoValue,
}

/// Strip a URL-shaped value down to its bare host/IP token.
/// `https://1.2.3.4:9999/x` becomes `1.2.3.4`. Values without a `//` are
/// returned unchanged, so stripping an already-bare value is a no-op.
pub fn parse_machine_identifier(machine_id: &str) -> String {
    match machine_id.split_once("//") {
        Some((_, rest)) => {
            let rest = rest.split('/').next().unwrap_or("");
            let rest = rest.split(':').next().unwrap_or("");
            if rest.is_empty() {
                // Nothing left after stripping, keep the original value
                machine_id.to_string()
            } else {
                rest.to_string()
            }
        }
        None => machine_id.to_string(),
    }
}

/// Look up the protocol-parameter identifier for a log source.
/// Database failures propagate; the caller decides the fallback.
pub fn lookup_machine_identifier<S: ProtocolConfigSource>(
    store: &mut S,
    log_source: &LogSource,
) -> Result<IdentifierLookup, DbError> {
    let sp_id = match store.sensor_protocol_id(log_source.sp_config)? {
        Some(sp_id) => sp_id,
        None => return Ok(IdentifierLookup::NoMapping),
    };
    let param_name = match sensor_protocol_parameter(sp_id) {
        Some(name) => name,
        None => return Ok(IdentifierLookup::NoMapping),
    };
    match store.config_param_value(log_source.sp_config, param_name)? {
        Some(value) => Ok(IdentifierLookup::Parameter(parse_machine_identifier(&value))),
        None => Ok(IdentifierLookup::NoValue),
    }
}

/// Resolve the deduplication key for a log source, falling back to the
/// configured hostname when no parameter value is available or the
/// lookup fails. Never fails; per-record lookup errors are logged and
/// recovered here.
pub fn resolve_machine_identifier<S: ProtocolConfigSource>(
    store: &mut S,
    log_source: &LogSource,
) -> String {
    match lookup_machine_identifier(store, log_source) {
        Ok(IdentifierLookup::Parameter(identifier)) => {
            debug!(
                "Resolved machine identifier {} for log source {}",
                identifier, log_source.sensor_device_id
            );
            identifier
        }
        Ok(IdentifierLookup::NoMapping) | Ok(IdentifierLookup::NoValue) => {
            log_source.hostname.clone()
        }
        Err(err) => {
            error!(
                "Unable to retrieve machine identifier using hostname instead, Reason [{}]",
                err
            );
            log_source.hostname.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeConfigStore {
        sp_ids: HashMap<i64, i64>,
        params: HashMap<(i64, String), String>,
        fail: bool,
    }

    impl FakeConfigStore {
        fn new() -> Self {
            FakeConfigStore {
                sp_ids: HashMap::new(),
                params: HashMap::new(),
                fail: false,
            }
        }
    }

    impl ProtocolConfigSource for FakeConfigStore {
        fn sensor_protocol_id(&mut self, sp_config: i64) -> Result<Option<i64>, DbError> {
            if self.fail {
                return Err(DbError::TooManyRows);
            }
            Ok(self.sp_ids.get(&sp_config).copied())
        }

        fn config_param_value(
            &mut self,
            sp_config: i64,
            name: &str,
        ) -> Result<Option<String>, DbError> {
            if self.fail {
                return Err(DbError::TooManyRows);
            }
            Ok(self.params.get(&(sp_config, name.to_string())).cloned())
        }
    }

    fn log_source() -> LogSource {
        LogSource::new(7, "fallback-host", "Fallback Host", 12, 500, 0)
    }

    #[test]
    fn test_url_stripping_keeps_host_only() {
        assert_eq!(parse_machine_identifier("https://1.2.3.4:9999/x"), "1.2.3.4");
        assert_eq!(parse_machine_identifier("http://example.com/path/a"), "example.com");
        assert_eq!(parse_machine_identifier("https://example.com:443"), "example.com");
    }

    #[test]
    fn test_url_stripping_is_idempotent_on_bare_values() {
        assert_eq!(parse_machine_identifier("1.2.3.4"), "1.2.3.4");
        assert_eq!(parse_machine_identifier("example.com"), "example.com");
        assert_eq!(
            parse_machine_identifier(&parse_machine_identifier("https://a.b/c")),
            "a.b"
        );
    }

    #[test]
    fn test_url_stripping_empty_result_keeps_original() {
        assert_eq!(parse_machine_identifier("https://"), "https://");
        assert_eq!(parse_machine_identifier("//"), "//");
    }

    #[test]
    fn test_parameter_value_becomes_identifier() {
        let mut store = FakeConfigStore::new();
        store.sp_ids.insert(500, 7); // protocol type 7 maps to "url"
        store
            .params
            .insert((500, "url".to_string()), "https://10.1.2.3:8443/api".to_string());
        assert_eq!(resolve_machine_identifier(&mut store, &log_source()), "10.1.2.3");
    }

    #[test]
    fn test_unmapped_protocol_falls_back_to_hostname() {
        let mut store = FakeConfigStore::new();
        store.sp_ids.insert(500, 1); // no identifier parameter for type 1
        assert_eq!(
            lookup_machine_identifier(&mut store, &log_source()).unwrap(),
            IdentifierLookup::NoMapping
        );
        assert_eq!(
            resolve_machine_identifier(&mut store, &log_source()),
            "fallback-host"
        );
    }

    #[test]
    fn test_missing_parameter_value_falls_back_to_hostname() {
        let mut store = FakeConfigStore::new();
        store.sp_ids.insert(500, 7);
        assert_eq!(
            lookup_machine_identifier(&mut store, &log_source()).unwrap(),
            IdentifierLookup::NoValue
        );
        assert_eq!(
            resolve_machine_identifier(&mut store, &log_source()),
            "fallback-host"
        );
    }

    #[test]
    fn test_lookup_error_falls_back_to_hostname() {
        let mut store = FakeConfigStore::new();
        store.fail = true;
        assert!(lookup_machine_identifier(&mut store, &log_source()).is_err());
        assert_eq!(
            resolve_machine_identifier(&mut store, &log_source()),
            "fallback-host"
        );
    }
}

//! Database access module
//!
//! Handles:
//! - Connecting to the console's postgres instance over the local socket
//! - fetch-one/fetch-all row access with a too-many-rows guard
//! - The fixed queries the pipeline needs (log sources, protocol config,
//!   domain count, Windows server event catalogue ids)
//!
//! Numeric columns are cast to bigint in SQL so every id decodes as i64
//! regardless of the column's declared width.

use crate::constants::{
    DB_NAME, DB_SOCKET_DIR, DB_USER, MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE,
    WINDOWS_SERVER_EVENT_IDS,
};
use crate::errors::{CountError, DbError};
use crate::identifier::ProtocolConfigSource;
use crate::models::LogSource;
use log::{debug, info};
use postgres::{Client, NoTls, Row};
use std::collections::HashMap;

/// Thin wrapper around a blocking postgres connection. The connection is
/// held for the duration of one run and released on drop, on every exit
/// path.
pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    /// Connect to the console database over the local socket
    pub fn connect() -> Result<Self, postgres::Error> {
        let params = format!("host={} dbname={} user={}", DB_SOCKET_DIR, DB_NAME, DB_USER);
        let client = Client::connect(&params, NoTls)?;
        Ok(DatabaseClient { client })
    }

    /// Run a query expected to return at most one row. More than one row
    /// is an error, not a silent first-row pick.
    pub fn fetch_one(&mut self, sql: &str) -> Result<Option<Row>, DbError> {
        let rows = self.client.query(sql, &[])?;
        if rows.len() > 1 {
            return Err(DbError::TooManyRows);
        }
        Ok(rows.into_iter().next())
    }

    pub fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        Ok(self.client.query(sql, &[])?)
    }
}

/// The queries the counting pipeline needs, expressed over the raw client
pub struct DatabaseService {
    db_client: DatabaseClient,
}

impl DatabaseService {
    pub fn new(db_client: DatabaseClient) -> Self {
        DatabaseService { db_client }
    }

    /// Log sources with events newer than `since_ms` and a protocol
    /// configuration attached, keyed by sensor device id
    pub fn build_log_source_map(
        &mut self,
        since_ms: i64,
    ) -> Result<HashMap<i64, LogSource>, CountError> {
        info!("Attempting to build log source map from entries in the database");
        let query = format!(
            "SELECT id::bigint AS id, hostname, devicename, \
             devicetypeid::bigint AS devicetypeid, spconfig::bigint AS spconfig, \
             timestamp_last_seen::bigint AS timestamp_last_seen \
             FROM sensordevice \
             WHERE timestamp_last_seen > {} AND spconfig IS NOT NULL",
            since_ms
        );
        debug!("Executing query {}", query);
        let rows = self
            .db_client
            .fetch_all(&query)
            .map_err(CountError::LogSourceRetrieval)?;
        info!("Query executed successfully, {} rows returned", rows.len());
        let mut log_source_map = HashMap::new();
        for row in &rows {
            let log_source = LogSource::from_row(row);
            info!(
                "Adding log source {} to log source map",
                log_source.sensor_device_id
            );
            log_source_map.insert(log_source.sensor_device_id, log_source);
        }
        Ok(log_source_map)
    }

    /// Count of non-deleted domains; more than one means the deployment
    /// is multi-domain
    pub fn domain_count(&mut self) -> Result<i64, CountError> {
        let query = "SELECT COUNT(id)::bigint AS count FROM domains WHERE deleted=false";
        debug!("Executing query {}", query);
        let row = self
            .db_client
            .fetch_one(query)
            .map_err(|err| CountError::DomainCountRetrieval(err.to_string()))?;
        match row {
            Some(row) => Ok(row.get("count")),
            None => Err(CountError::DomainCountRetrieval(format!(
                "No result returned when executing query {}",
                query
            ))),
        }
    }

    /// Internal event catalogue ids (QIDs) for the fixed Windows-server
    /// event id list, resolved through the dsmevent reference table
    pub fn windows_server_qids(&mut self) -> Result<Vec<i64>, DbError> {
        let event_ids = WINDOWS_SERVER_EVENT_IDS
            .iter()
            .map(|event_id| format!("'{}'", event_id))
            .collect::<Vec<_>>()
            .join(",");
        let query = format!(
            "SELECT qid::bigint AS qid FROM qidmap \
             WHERE id IN (SELECT qidmapid FROM dsmevent \
             WHERE devicetypeid = {} AND deviceeventid IN ({}))",
            MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE, event_ids
        );
        debug!("Executing query {}", query);
        let rows = self.db_client.fetch_all(&query)?;
        Ok(rows.iter().map(|row| row.get("qid")).collect())
    }
}

impl ProtocolConfigSource for DatabaseService {
    fn sensor_protocol_id(&mut self, sp_config: i64) -> Result<Option<i64>, DbError> {
        let query = format!(
            "SELECT spid::bigint AS spid FROM sensorprotocolconfig WHERE id = {}",
            sp_config
        );
        debug!("Executing query {}", query);
        let row = self.db_client.fetch_one(&query)?;
        match row {
            Some(row) => {
                let sp_id: i64 = row.get("spid");
                debug!("Query executed successfully. Retrieved spid={}", sp_id);
                Ok(Some(sp_id))
            }
            None => {
                debug!("No results found for spid for id {}", sp_config);
                Ok(None)
            }
        }
    }

    fn config_param_value(&mut self, sp_config: i64, name: &str) -> Result<Option<String>, DbError> {
        let query = format!(
            "SELECT value FROM sensorprotocolconfigparameters \
             WHERE sensorprotocolconfigid = {} AND name = '{}'",
            sp_config, name
        );
        debug!("Executing query {}", query);
        let row = self.db_client.fetch_one(&query)?;
        match row {
            Some(row) => {
                let value: String = row.get("value");
                debug!("Query executed successfully. Retrieved value = {}", value);
                Ok(Some(value))
            }
            None => {
                debug!("No results found for parameter name {}", name);
                Ok(None)
            }
        }
    }
}

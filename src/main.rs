#![forbid(unsafe_code)]

mod cli;
mod consolidate;
mod constants;
mod count;
mod db;
mod domains;
mod errors;
mod identifier;
mod models;
mod myver;
mod pipeline;
mod progress;
mod prompt;
mod report;
mod rest;
mod search;
mod windows;

use crate::cli::RunConfig;
use crate::consolidate::SystemResolver;
use crate::constants::{
    DAY_IN_MILLISECONDS, MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE, WINDOWS_WORKSTATION_CACHE_FILE,
};
use crate::db::{DatabaseClient, DatabaseService};
use crate::domains::{append_default_domain, DomainAppender};
use crate::errors::CountError;
use crate::identifier::resolve_machine_identifier;
use crate::models::LogSource;
use crate::pipeline::{LogSourceProcessor, PipelineConfig};
use crate::report::ReportWriter;
use crate::rest::{auth_error_message, RestClient};
use crate::search::{AqlClient, SearchPoller};
use chrono::Utc;
use log::{debug, info, LevelFilter};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn init_logging(debug_enabled: bool, log_file: &str) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    match File::create(log_file) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(err) => {
            eprintln!(
                "Unable to open log file {}, logging to stderr instead, Reason [{}]",
                log_file, err
            );
        }
    }
    builder.init();
}

fn build_aql_client(config: &RunConfig) -> Result<Option<AqlClient>, CountError> {
    let mut stdin = io::stdin().lock();
    let auth = match prompt::prompt_for_auth_method(&mut stdin)? {
        Some(auth) => auth,
        // Operator chose to quit
        None => return Ok(None),
    };
    debug!("retrieving console hostname");
    let hostname = myver::hostname()?;
    debug!("initializing aql client");
    let rest_client = RestClient::new(&hostname, auth, config.insecure)
        .map_err(|err| CountError::Validation(err.to_string()))?;
    let aql_client = AqlClient::new(rest_client);
    if let Err(err) = aql_client.check_api_permissions() {
        return Err(CountError::Validation(auth_error_message(
            aql_client.auth(),
            &err,
        )));
    }
    Ok(Some(aql_client))
}

fn generate_mvs_results(
    config: &RunConfig,
    interrupted: &AtomicBool,
) -> Result<(), CountError> {
    let period_in_days = {
        let mut stdin = io::stdin().lock();
        prompt::prompt_for_time_period(&mut stdin)?
    };
    let aql_client = match build_aql_client(config)? {
        Some(aql_client) => aql_client,
        None => return Ok(()),
    };

    info!(
        "Attempting to connect to database {} with username {}",
        constants::DB_NAME,
        constants::DB_USER
    );
    let db_client = DatabaseClient::connect().map_err(CountError::DatabaseConnection)?;
    info!("Connected to the database successfully");
    let mut db_service = DatabaseService::new(db_client);

    let since_ms = Utc::now().timestamp_millis() - period_in_days as i64 * DAY_IN_MILLISECONDS;
    let mut log_source_map = db_service.build_log_source_map(since_ms)?;

    let domain_count = db_service.domain_count()?;
    let multi_domain = domain_count > 1;
    info!("Count of domains is {}", domain_count);
    info!("Multi-Domain system is {}", multi_domain);

    if !log_source_map.is_empty() {
        if multi_domain {
            let appender = DomainAppender::new(
                &aql_client,
                period_in_days,
                SearchPoller::new(config.search_timeout_secs),
            );
            appender.add_domains(&mut log_source_map, interrupted)?;
        } else {
            append_default_domain(&mut log_source_map);
        }
    }

    let needs_windows_check = log_source_map
        .values()
        .any(|log_source| log_source.device_type_id == MS_WINDOWS_SECURITY_EVENT_LOG_SOURCE_TYPE);
    let windows_server_qids = if needs_windows_check {
        db_service
            .windows_server_qids()
            .map_err(|err| CountError::WindowsWorkstationRetrieval(err.to_string()))?
    } else {
        Vec::new()
    };

    let log_sources: Vec<LogSource> = log_source_map.into_values().collect();
    let pipeline_config = PipelineConfig {
        multi_domain,
        period_in_days,
        search_timeout_secs: config.search_timeout_secs,
        windows_server_qids,
        workstation_cache_path: PathBuf::from(WINDOWS_WORKSTATION_CACHE_FILE),
    };
    let mut processor = LogSourceProcessor::new(
        |log_source: &LogSource| resolve_machine_identifier(&mut db_service, log_source),
        &aql_client,
        SystemResolver,
        pipeline_config,
    );
    processor.process_log_sources(log_sources, interrupted)?;
    let results = processor.into_results();

    let report_writer = ReportWriter::new(&results, period_in_days);
    report_writer.write_csv(&PathBuf::from(&config.report_file))?;
    report_writer.print_summary();
    info!(
        "Total log sources considered = {}",
        results.log_source_count
    );
    Ok(())
}

fn run(config: &RunConfig, interrupted: &AtomicBool) -> Result<(), CountError> {
    if !myver::is_console() {
        return Err(CountError::Validation(
            "This script can only be ran on the console. Exiting...".to_string(),
        ));
    }
    generate_mvs_results(config, interrupted)
}

fn main() -> ExitCode {
    let config = match cli::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.debug, &config.log_file);

    let interrupted = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, interrupted.clone());
    let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, interrupted.clone());

    match run(&config, &interrupted) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CountError::Interrupted) => {
            println!("\nExiting...");
            ExitCode::FAILURE
        }
        Err(err) => {
            println!("{}", err);
            ExitCode::FAILURE
        }
    }
}

//! Results reporting module
//!
//! Renders a finished run two ways:
//! - console summary: deployment count plus per-domain counts when the
//!   deployment is multi-domain
//! - CSV report: results summary, per-domain counts, the MVS list, then
//!   log source detail sections for counted, excluded (Windows
//!   workstations and non-MVS types) and skipped sources
//!
//! The report file is only written when the device map is non-empty.
//! Sections traverse their maps in sorted key order so two runs over the
//! same data produce identical files.

use crate::models::{LogSource, MvsResults};
use csv::WriterBuilder;
use log::info;
use std::fs;
use std::io;
use std::path::Path;

const LOG_SOURCE_COLUMN_NAMES: [&str; 7] = [
    "ID",
    "Name",
    "Log Source Identifier",
    "Type ID",
    "Last Seen",
    "SP Config",
    "Domains",
];

/// Renders MVS results to the console and to a CSV report file
pub struct ReportWriter<'a> {
    results: &'a MvsResults,
    period_in_days: u32,
}

impl<'a> ReportWriter<'a> {
    pub fn new(results: &'a MvsResults, period_in_days: u32) -> Self {
        ReportWriter {
            results,
            period_in_days,
        }
    }

    /// Print the deployment count, and the per-domain breakdown when one
    /// was computed
    pub fn print_summary(&self) {
        println!(
            "MVS count for the deployment is {}",
            self.results.mvs_count
        );
        if !self.results.domain_count_map.is_empty() {
            let mut domains: Vec<&String> = self.results.domain_count_map.keys().collect();
            domains.sort();
            for domain in domains {
                println!(
                    "MVS count for domain {} is {}",
                    domain, self.results.domain_count_map[domain]
                );
            }
        }
    }

    fn log_source_rows(log_sources: &[LogSource]) -> io::Result<String> {
        let csv_to_io = |err: csv::Error| io::Error::new(io::ErrorKind::Other, err);
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(LOG_SOURCE_COLUMN_NAMES)
            .map_err(csv_to_io)?;
        for log_source in log_sources {
            writer
                .write_record([
                    log_source.sensor_device_id.to_string(),
                    log_source.device_name.clone(),
                    log_source.hostname.clone(),
                    log_source.device_type_id.to_string(),
                    log_source.timestamp_last_seen.to_string(),
                    log_source.sp_config.to_string(),
                    log_source.domains.join(";"),
                ])
                .map_err(csv_to_io)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn sorted_keys<V>(map: &std::collections::HashMap<String, V>) -> Vec<&String> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        keys
    }

    fn write_mvs_count_summary(&self, out: &mut String) {
        out.push_str("Results Summary:\n");
        out.push_str(&format!("MVS Count = {}\n", self.results.mvs_count));
        out.push_str(&format!("Data Period In Days = {}\n", self.period_in_days));
        out.push_str(&format!(
            "Log Sources Processed = {}\n",
            self.results.log_source_count
        ));
        out.push_str(&format!(
            "Log Sources Skipped = {}\n",
            self.results.skipped_log_sources.len()
        ));
        out.push_str(&format!(
            "Log Sources Excluded = {}",
            self.results.excluded_log_source_count()
        ));
    }

    fn write_domain_count_summary(&self, out: &mut String) {
        if self.results.domain_count_map.is_empty() {
            return;
        }
        out.push_str("\n\n");
        out.push_str("MVS Count By Domain:\n");
        out.push_str("Domain Name, MVS Count\n");
        for domain in Self::sorted_keys(&self.results.domain_count_map) {
            out.push_str(&format!(
                "{},{}\n",
                domain, self.results.domain_count_map[domain]
            ));
        }
    }

    fn write_mvs_device_list(&self, out: &mut String) {
        out.push_str("MVS List:\n");
        let machine_identifiers = Self::sorted_keys(&self.results.device_map);
        let last = machine_identifiers.len().saturating_sub(1);
        for (index, machine_identifier) in machine_identifiers.iter().enumerate() {
            out.push_str(machine_identifier);
            if index < last {
                out.push('\n');
            }
        }
    }

    fn write_device_map_sections(
        out: &mut String,
        device_map: &std::collections::HashMap<String, Vec<LogSource>>,
    ) -> io::Result<()> {
        let machine_identifiers = Self::sorted_keys(device_map);
        let last = machine_identifiers.len().saturating_sub(1);
        for (index, machine_identifier) in machine_identifiers.iter().enumerate() {
            out.push_str(&format!("MVS Device Id = {}\n", machine_identifier));
            out.push_str(&Self::log_source_rows(&device_map[*machine_identifier])?);
            if index < last {
                out.push('\n');
            }
        }
        Ok(())
    }

    fn write_excluded_log_source_details(&self, out: &mut String) -> io::Result<()> {
        if self.results.excluded_log_source_count() == 0 {
            return Ok(());
        }
        out.push('\n');
        out.push_str("Excluded Log Source Details:\n");
        if !self.results.windows_workstation_device_map.is_empty() {
            out.push_str("Windows Workstations:\n");
            Self::write_device_map_sections(out, &self.results.windows_workstation_device_map)?;
        }
        if !self.results.excluded_log_sources.is_empty() {
            if !self.results.windows_workstation_device_map.is_empty() {
                out.push('\n');
            }
            out.push_str("Non MVS Log Sources:\n");
            out.push_str(&Self::log_source_rows(&self.results.excluded_log_sources)?);
        }
        Ok(())
    }

    fn write_skipped_log_source_details(&self, out: &mut String) -> io::Result<()> {
        if self.results.skipped_log_sources.is_empty() {
            return Ok(());
        }
        if self.results.excluded_log_source_count() > 0 {
            out.push('\n');
        }
        out.push_str("Skipped Log Source Details:\n");
        out.push_str(&Self::log_source_rows(&self.results.skipped_log_sources)?);
        Ok(())
    }

    fn render(&self) -> io::Result<String> {
        let mut out = String::new();
        self.write_mvs_count_summary(&mut out);
        self.write_domain_count_summary(&mut out);
        out.push_str("\n\n");
        self.write_mvs_device_list(&mut out);
        out.push_str("\n\n");
        out.push_str("Log Source Details:\n");
        Self::write_device_map_sections(&mut out, &self.results.device_map)?;
        self.write_excluded_log_source_details(&mut out)?;
        self.write_skipped_log_source_details(&mut out)?;
        Ok(out)
    }

    /// Write the CSV report. A run that produced an empty device map
    /// writes nothing.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        if self.results.device_map.is_empty() {
            info!("Device map is empty, no CSV report written");
            return Ok(());
        }
        let report = self.render()?;
        fs::write(path, report)?;
        info!("CSV report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(id: i64, hostname: &str, domains: &[&str]) -> LogSource {
        let mut log_source = LogSource::new(id, hostname, &format!("Source {}", id), 12, 100, 5000);
        for domain in domains {
            log_source.add_domain(domain);
        }
        log_source
    }

    fn sample_results() -> MvsResults {
        let mut results = MvsResults::default();
        results.log_source_count = 4;
        results.mvs_count = 2;
        results.device_map.insert(
            "10.0.0.1".to_string(),
            vec![source(1, "10.0.0.1", &["Default Domain"])],
        );
        results.device_map.insert(
            "10.0.0.2".to_string(),
            vec![source(2, "10.0.0.2", &["Default Domain"])],
        );
        results
    }

    #[test]
    fn test_report_contains_summary_and_device_sections() {
        let mut results = sample_results();
        results.add_skipped_log_source(source(3, "10.0.0.3", &[]));
        results.add_excluded_log_source(source(4, "10.0.0.4", &["Default Domain"]));
        let writer = ReportWriter::new(&results, 1);
        let report = writer.render().unwrap();

        assert!(report.starts_with("Results Summary:\nMVS Count = 2\n"));
        assert!(report.contains("Data Period In Days = 1\n"));
        assert!(report.contains("Log Sources Processed = 4\n"));
        assert!(report.contains("Log Sources Skipped = 1\n"));
        assert!(report.contains("Log Sources Excluded = 1"));
        assert!(report.contains("MVS List:\n10.0.0.1\n10.0.0.2"));
        assert!(report.contains("Log Source Details:\nMVS Device Id = 10.0.0.1\n"));
        assert!(report.contains("ID,Name,Log Source Identifier,Type ID,Last Seen,SP Config,Domains\n"));
        assert!(report.contains("1,Source 1,10.0.0.1,12,5000,100,Default Domain\n"));
        assert!(report.contains("Non MVS Log Sources:\n"));
        assert!(report.contains("Skipped Log Source Details:\n"));
    }

    #[test]
    fn test_domain_breakdown_is_sorted_and_only_present_when_computed() {
        let mut results = sample_results();
        let without_domains = ReportWriter::new(&results, 1).render().unwrap();
        assert!(!without_domains.contains("MVS Count By Domain:"));

        results.domain_count_map.insert("Beta".to_string(), 1);
        results.domain_count_map.insert("Alpha".to_string(), 2);
        let with_domains = ReportWriter::new(&results, 1).render().unwrap();
        assert!(with_domains.contains("MVS Count By Domain:\nDomain Name, MVS Count\nAlpha,2\nBeta,1\n"));
    }

    #[test]
    fn test_windows_workstations_have_their_own_section() {
        let mut results = sample_results();
        results.add_windows_workstation("10.0.0.9", vec![source(9, "10.0.0.9", &["Default Domain"])]);
        let report = ReportWriter::new(&results, 1).render().unwrap();
        assert!(report.contains("Excluded Log Source Details:\nWindows Workstations:\nMVS Device Id = 10.0.0.9\n"));
        assert!(report.contains("Log Sources Excluded = 1"));
    }

    #[test]
    fn test_empty_device_map_writes_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mvsCount.csv");
        let results = MvsResults::default();
        ReportWriter::new(&results, 1).write_csv(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_report_is_written_to_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mvsCount.csv");
        let results = sample_results();
        ReportWriter::new(&results, 1).write_csv(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("MVS Count = 2"));
    }

    #[test]
    fn test_multiple_domains_joined_in_one_field() {
        let mut results = MvsResults::default();
        results.mvs_count = 1;
        results.log_source_count = 1;
        results
            .device_map
            .insert("10.0.0.5".to_string(), vec![source(5, "10.0.0.5", &["A", "B"])]);
        let report = ReportWriter::new(&results, 1).render().unwrap();
        assert!(report.contains("5,Source 5,10.0.0.5,12,5000,100,A;B\n"));
    }
}

//! Deployment introspection module
//!
//! Thin wrapper around the appliance's myver utility, used to confirm
//! the script is running on the console and to learn the console's
//! hostname for API calls.

use crate::constants::MYVER_PATH;
use crate::errors::CountError;
use log::{debug, error};
use std::process::Command;

fn query(arg: &str) -> Result<String, CountError> {
    let output = Command::new(MYVER_PATH)
        .arg(arg)
        .output()
        .map_err(|err| CountError::MyVer(err.to_string()))?;
    if !output.status.success() {
        return Err(CountError::MyVer(format!(
            "myver {} exited with status {}",
            arg, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// The console's fully qualified hostname
pub fn hostname() -> Result<String, CountError> {
    query("-vh")
}

/// Whether this appliance is the console. Failures are logged and read
/// as not-a-console, so the caller can show its usual guidance.
pub fn is_console() -> bool {
    match query("-c") {
        Ok(answer) => {
            debug!("is_console output is {}", answer);
            answer == "true"
        }
        Err(err) => {
            error!("is_console failed with the following error {}", err);
            false
        }
    }
}

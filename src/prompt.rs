//! Operator prompt module
//!
//! Interactive reads for the two pieces of input the run needs: the data
//! period in days and the API authentication method. Both loop until the
//! operator gives a valid answer, and both read from a caller-supplied
//! input so the loops can be driven by a buffer in tests. End of input
//! behaves like accepting the default (time period) or quitting (auth).

use crate::constants::{DEFAULT_PERIOD_IN_DAYS, MAX_PERIOD_IN_DAYS};
use crate::rest::ClientAuth;
use std::io::{self, BufRead, Write};

const BOLD_ANSI_ESCAPE_CODE: &str = "\x1b[1m";
const NORMAL_ANSI_ESCAPE_CODE: &str = "\x1b[0m";

fn bold(text: &str) -> String {
    format!("{}{}{}", BOLD_ANSI_ESCAPE_CODE, text, NORMAL_ANSI_ESCAPE_CODE)
}

fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    let bytes = input.read_line(&mut line)?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn print_time_period_header() {
    println!(
        "\nThis script calculates an estimated count of the MVS (Managed Virtual Servers) for the deployment."
    );
    println!(
        "It uses log source data in order to calculate the count over a given time period. By default the script"
    );
    println!(
        "will use {} days worth of log source data however you can select to increase this below.\n",
        DEFAULT_PERIOD_IN_DAYS
    );
    println!(
        "{}: By increasing the value from the default {} day(s) this will increase the execution time of the script",
        bold("Note"),
        DEFAULT_PERIOD_IN_DAYS
    );
    println!(
        "especially in multi-domain deployments as it will have to perform a search for log source data over a "
    );
    println!("longer period of time.\n");
    println!("How many days worth of log source data would you like to use for the calculation.\n");
}

/// Ask for the data period in days. Empty input takes the default;
/// out-of-range or non-numeric input re-prompts.
pub fn prompt_for_time_period(input: &mut impl BufRead) -> io::Result<u32> {
    print_time_period_header();
    loop {
        print!(
            "Please enter your choice in days (default {} [Enter], max {}): ",
            DEFAULT_PERIOD_IN_DAYS, MAX_PERIOD_IN_DAYS
        );
        io::stdout().flush()?;
        let response = match read_line(input)? {
            Some(response) => response,
            None => return Ok(DEFAULT_PERIOD_IN_DAYS),
        };
        if response.is_empty() {
            return Ok(DEFAULT_PERIOD_IN_DAYS);
        }
        match response.parse::<i64>() {
            Ok(period) if period >= 1 && period <= MAX_PERIOD_IN_DAYS as i64 => {
                return Ok(period as u32);
            }
            Ok(period) if period < 1 => {
                println!("Invalid selection. You can only select a minimum of 1 day");
            }
            Ok(_) => {
                println!(
                    "Invalid selection. You can only select up to a maximum of {} days",
                    MAX_PERIOD_IN_DAYS
                );
            }
            Err(_) => {
                println!("Invalid selection. You must enter a numeric value");
            }
        }
    }
}

fn prompt_for_secret(input: &mut impl BufRead, prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    read_line(input)
}

/// Ask which authentication to use for the API. Returns None when the
/// operator quits.
pub fn prompt_for_auth_method(input: &mut impl BufRead) -> io::Result<Option<ClientAuth>> {
    println!(
        "\nThis script needs to call the Ariel API to calculate the MVS count from the deployment.\n\n\
         Which authentication would you like to use:\n1: Admin User\n2: Authorized Service\n\
         (q to quit)\n"
    );
    loop {
        print!("Please enter your choice: ");
        io::stdout().flush()?;
        let choice = match read_line(input)? {
            Some(choice) => choice,
            None => return Ok(None),
        };
        match choice.as_str() {
            "1" => {
                let password =
                    prompt_for_secret(input, "Please input the admin user password: ")?;
                return Ok(password.map(|password| ClientAuth::with_password(&password)));
            }
            "2" => {
                let token = prompt_for_secret(
                    input,
                    "Please input the security token for your authorized service: ",
                )?;
                return Ok(token.map(|token| ClientAuth::with_token(&token)));
            }
            "q" | "Q" => return Ok(None),
            _ => {
                println!(
                    "\nInvalid selection. Please choose from the following options:\
                     \n1. Admin User\n2. Authorized Service\n(q to quit)\n"
                );
            }
        }
    }
}

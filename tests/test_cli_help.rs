use predicates::prelude::*;

#[test]
fn test_help_includes_required_options() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("countmvs");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--debug"))
        .stdout(predicate::str::contains("--insecure"))
        .stdout(predicate::str::contains("-o"))
        .stdout(predicate::str::contains("-l"))
        .stdout(predicate::str::contains("--search-timeout"))
        .stdout(predicate::str::contains("--version"))
        .stdout(predicate::str::contains("--help"));
}

#[test]
fn test_help_describes_the_tool() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("countmvs");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Managed Virtual Servers"));
}

#[test]
fn test_invalid_search_timeout_is_rejected() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("countmvs");
    cmd.args(["--search-timeout", "abc"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--search-timeout"));
}

#[test]
fn test_zero_search_timeout_is_rejected() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("countmvs");
    cmd.args(["--search-timeout", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("greater than zero"));
}

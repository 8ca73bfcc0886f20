use assert_cmd::Command;
use std::str;

/// Run geoipdecode with the given arguments and stdin, returning
/// (success, stdout, stderr).
fn run_geoipdecode(input: &str, args: &[&str]) -> (bool, String, String) {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("geoipdecode").unwrap();
    let output = cmd
        .env_remove("GEOIP_MMDB_DIR")
        .env("RUST_LOG", "off")
        .args(args)
        .write_stdin(input)
        .output()
        .expect("failed to execute");

    let stdout = str::from_utf8(&output.stdout)
        .expect("Failed to read stdout as UTF-8")
        .to_string();
    let stderr = str::from_utf8(&output.stderr)
        .expect("Failed to read stderr as UTF-8")
        .to_string();

    (output.status.success(), stdout, stderr)
}

/// Without a candidate field the decoder refuses to start
#[test]
fn missing_field_is_fatal() {
    let (ok, stdout, stderr) = run_geoipdecode(
        r#"{"ip":"81.2.69.160"}"#,
        &["--city-db", "/nonexistent/GeoLite2-City.mmdb"],
    );
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(
        stderr.contains("source_host_fields"),
        "unexpected error output: '{}'",
        stderr
    );
}

/// An empty prefix is rejected before any database is opened
#[test]
fn empty_prefix_is_fatal() {
    let (ok, _, stderr) = run_geoipdecode("", &["-f", "ip", "--prefix", ""]);
    assert!(!ok);
    assert!(
        stderr.contains("target_field_prefix"),
        "unexpected error output: '{}'",
        stderr
    );
}

/// If no configured database can be opened there is nothing to do
#[test]
fn no_usable_database_is_fatal() {
    let (ok, stdout, stderr) = run_geoipdecode(
        r#"{"ip":"81.2.69.160"}"#,
        &[
            "-f",
            "ip",
            "--city-db",
            "/nonexistent/GeoLite2-City.mmdb",
            "--isp-db",
            "/nonexistent/GeoIP2-ISP.mmdb",
        ],
    );
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(
        stderr.contains("no usable GeoIP database"),
        "unexpected error output: '{}'",
        stderr
    );
}

/// A broken configuration file names the file in the error
#[test]
fn unreadable_config_file() {
    let (ok, _, stderr) = run_geoipdecode("", &["--config", "/nonexistent/geoip.toml"]);
    assert!(!ok);
    assert!(
        stderr.contains("/nonexistent/geoip.toml"),
        "unexpected error output: '{}'",
        stderr
    );
}

#[test]
fn help_lists_options() {
    let (ok, stdout, _) = run_geoipdecode("", &["--help"]);
    assert!(ok);
    for option in ["--city-db", "--isp-db", "--json-object", "--dns", "--field"] {
        assert!(stdout.contains(option), "missing {} in help", option);
    }
}

const CITY_DB: &str = "tests/maxmind/test-city.mmdb";

/// Matched lines are enriched, unmatched ones come back as they went in
#[test]
fn enriches_matching_lines() {
    let input = concat!(
        r#"{"ip":"81.2.69.160","msg":"hello"}"#,
        "\n",
        r#"{"ip":"10.0.0.1","n":18446744073709551615,"o":{"z":1,"a":2}}"#,
        "\n",
    );
    let (ok, stdout, stderr) = run_geoipdecode(input, &["--city-db", CITY_DB, "-f", "ip"]);
    assert!(ok, "geoipdecode failed: '{}'", stderr);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec![
            concat!(
                r#"{"ip":"81.2.69.160","msg":"hello","geoip_location":[-0.0931,51.5142],"#,
                r#""geoip_country_code":"GB","geoip_country":"United Kingdom","geoip_city":"London"}"#
            ),
            r#"{"ip":"10.0.0.1","n":18446744073709551615,"o":{"z":1,"a":2}}"#,
        ]
    );
}

/// Lines that are not JSON objects pass through untouched
#[test]
fn non_json_lines_pass_through() {
    let input = "not json at all\n[1,2,3]\n{\"ip\":\"81.2.69.160\"\n";
    let (ok, stdout, _) = run_geoipdecode(input, &["--city-db", CITY_DB, "-f", "ip"]);
    assert!(ok);
    assert_eq!(stdout, input);
}

/// Blank and whitespace-only lines produce no output
#[test]
fn blank_lines_are_skipped() {
    let input = "\n   \n{\"host\":\"1.1.1.1\"}\n\t\n";
    let (ok, stdout, _) = run_geoipdecode(input, &["--city-db", CITY_DB, "-f", "ip"]);
    assert!(ok);
    assert_eq!(stdout, "{\"host\":\"1.1.1.1\"}\n");
}

/// `--json-object` writes one object holding every database's attributes
#[test]
fn json_object_output() {
    let (ok, stdout, stderr) = run_geoipdecode(
        "{\"ip\":\"81.2.69.160\"}\n",
        &[
            "--city-db",
            CITY_DB,
            "--connection-type-db",
            "tests/maxmind/test-connection-type.mmdb",
            "-f",
            "ip",
            "-p",
            "geo",
            "--json-object",
        ],
    );
    assert!(ok, "geoipdecode failed: '{}'", stderr);
    assert_eq!(
        stdout,
        concat!(
            r#"{"ip":"81.2.69.160","geo":{"location":[-0.0931,51.5142],"country_code":"GB","#,
            r#""country":"United Kingdom","city":"London","connection_type":"Corporate"}}"#,
            "\n"
        )
    );
}

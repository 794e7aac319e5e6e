//! Integration tests for CLI argument handling
//!
//! Every case here fails or exits before any network request is made.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cache-module"))
        .args(args)
        .output()
        .expect("Failed to execute cache-module")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cache-module"), "Help should mention cache-module");
    assert!(stdout.contains("--expiration-ms"), "Help should mention --expiration-ms");
    assert!(stdout.contains("--coalesce"), "Help should mention --coalesce");
}

#[test]
fn test_missing_url_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success(), "Expected missing URL to fail");
}

#[test]
fn test_invalid_url_prints_error_and_exits() {
    let output = run_cli(&["not a url"]);
    assert!(!output.status.success(), "Expected invalid URL to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid URL"),
        "Should print error message about invalid URL: {}",
        stderr
    );
}

#[test]
fn test_zero_repeat_prints_error_and_exits() {
    let output = run_cli(&["https://example.com", "--repeat", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("repeat"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_malformed_settings_file_prints_error_and_exits() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "{{ not json").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let output = run_cli(&["https://example.com", "--settings", &path]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to parse settings file"),
        "Unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_non_object_settings_file_prints_error_and_exits() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "[1, 2, 3]").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let output = run_cli(&["https://example.com", "--settings", &path]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("JSON object"), "Unexpected stderr: {}", stderr);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use cache_module::cli::{parse_url_arg, Cli, StartupConfig};
    use clap::Parser;

    #[test]
    fn test_parse_url_arg_normalizes() {
        assert_eq!(
            parse_url_arg("https://example.com").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_startup_config_carries_flags() {
        let cli = Cli::parse_from([
            "cache-module",
            "http://localhost:3000/users",
            "--repeat",
            "3",
            "--concurrency",
            "4",
            "--interval-ms",
            "250",
            "--method",
            "get",
            "--coalesce",
        ]);
        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.repeat, 3);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.interval.as_millis(), 250);
        assert_eq!(config.method, "get");
        assert!(config.coalesce);
    }
}

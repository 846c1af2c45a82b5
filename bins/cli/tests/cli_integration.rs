//! CLI integration tests.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn run_cli(args: &[&str], env: &[(&str, &str)]) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_errchan"));
    command.args(args);
    scrub_scoped_env(&mut command);
    for (key, value) in env {
        command.env(key, value);
    }
    command.output()
}

fn scrub_scoped_env(command: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("ERRCHAN_") {
            command.env_remove(key);
        }
    }
}

fn stdout_json(output: &Output) -> Result<serde_json::Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn temp_config(name: &str, contents: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dir = std::env::temp_dir().join(format!("errchan-cli-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn reader_prints_sum_and_error() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["reader"], &[])?;

    assert_eq!(output.status.code(), Some(4));
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout, "sum: 6\nerror: readerError\n");
    Ok(())
}

#[test]
fn reader_json_output_shape() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["--output", "json", "reader", "--items", "4"], &[])?;

    assert_eq!(output.status.code(), Some(4));
    let value = stdout_json(&output)?;
    assert_eq!(value.get("command"), Some(&serde_json::json!("reader")));
    assert_eq!(value.get("sum"), Some(&serde_json::json!(10)));
    assert_eq!(
        value.pointer("/error/code"),
        Some(&serde_json::json!("demo:reader_error"))
    );
    Ok(())
}

#[test]
fn read_write_reports_consumer_and_group_errors() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["read-write", "--output", "json"], &[])?;

    assert_eq!(output.status.code(), Some(4));
    let value = stdout_json(&output)?;
    assert_eq!(value.get("count"), Some(&serde_json::json!(3)));
    assert_eq!(
        value.pointer("/consumerError/message"),
        Some(&serde_json::json!("writerError"))
    );
    assert_eq!(
        value.pointer("/error/message"),
        Some(&serde_json::json!("readerError"))
    );
    Ok(())
}

#[test]
fn slow_read_write_text_output() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["slow-read-write", "--delay-ms", "2"], &[])?;

    assert_eq!(output.status.code(), Some(4));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("elapsed: "), "stdout: {stdout}");
    assert!(stdout.contains("sum: 6\n"));
    assert!(stdout.ends_with("error: readerFail\n"));
    Ok(())
}

#[test]
fn env_overrides_file_and_flags_override_env() -> Result<(), Box<dyn Error>> {
    let path = temp_config("layered.toml", "items = 5\n")?;
    let path_arg = path.to_string_lossy().to_string();

    let from_file = run_cli(&["reader", "--config", &path_arg], &[])?;
    assert!(String::from_utf8(from_file.stdout)?.starts_with("sum: 15\n"));

    let from_env = run_cli(
        &["reader", "--config", &path_arg],
        &[("ERRCHAN_ITEMS", "2")],
    )?;
    assert!(String::from_utf8(from_env.stdout)?.starts_with("sum: 3\n"));

    let from_flag = run_cli(
        &["reader", "--config", &path_arg, "--items", "4"],
        &[("ERRCHAN_ITEMS", "2")],
    )?;
    assert!(String::from_utf8(from_flag.stdout)?.starts_with("sum: 10\n"));
    Ok(())
}

#[test]
fn out_of_range_items_is_invalid_input() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["reader", "--items", "0"], &[])?;

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("config:limit_out_of_range"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn malformed_env_value_is_invalid_input() -> Result<(), Box<dyn Error>> {
    let output = run_cli(&["reader"], &[("ERRCHAN_CAPACITY", "many")])?;

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("config:invalid_env_int"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn unsupported_config_extension_is_rejected() -> Result<(), Box<dyn Error>> {
    let path = temp_config("demo.yaml", "items: 2\n")?;
    let path_arg = path.to_string_lossy().to_string();
    let output = run_cli(&["reader", "--config", &path_arg], &[])?;

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("config:unsupported_format"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn debug_logs_go_to_stderr_only() -> Result<(), Box<dyn Error>> {
    let output = run_cli(
        &["reader", "--log-format", "json"],
        &[("ERRCHAN_LOG", "errchan_group=debug")],
    )?;

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(String::from_utf8(output.stdout)?, "sum: 6\nerror: readerError\n");
    let stderr = String::from_utf8(output.stderr)?;
    let first = stderr.lines().next().unwrap_or_default();
    let event: serde_json::Value = serde_json::from_str(first)?;
    assert!(event.get("fields").is_some(), "stderr: {stderr}");
    assert!(stderr.contains("correlation_id"));
    Ok(())
}

//! CLI binary entrypoint.

mod commands;
mod error;
mod format;
mod logging;

use clap::{Args, Parser, Subcommand};
use commands::{run_read_write, run_reader, run_slow_read_write};
use errchan_config::{DemoOverrides, ValidatedDemoConfig, load_demo_config_std_env};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "errchan",
    version,
    about = "Channel group demos: fallible producers, one merged stream, first error wins",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Config sources shared by every demo.
#[derive(Debug, Args)]
struct ConfigArgs {
    /// Optional config file path (JSON/TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Merged stream capacity (`0` for rendezvous).
    #[arg(long, global = true)]
    capacity: Option<usize>,
    /// Number of items the producer sends.
    #[arg(long, global = true)]
    items: Option<u32>,
    /// Per-item delay for the slow demo (ms).
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
}

impl ConfigArgs {
    const fn overrides(&self) -> DemoOverrides {
        DemoOverrides {
            capacity: self.capacity,
            items: self.items,
            delay_ms: self.delay_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    /// Sum everything one failing producer sends, then report its error.
    Reader,
    /// Stop consuming at the last value with a consumer error, then close the group.
    ReadWrite,
    /// Slow producer and slow consumer overlapping through the buffer.
    SlowReadWrite,
}

pub(crate) struct CliOutput {
    stdout: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.output.log_format);
    let mode = OutputMode::from_args(&cli.output);

    match run(&cli, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(cli: &Cli, mode: OutputMode) -> Result<CliOutput, CliError> {
    let config = load_config(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_command(cli.command, mode, &config))
}

fn load_config(args: &ConfigArgs) -> Result<ValidatedDemoConfig, CliError> {
    load_demo_config_std_env(args.config.as_deref(), args.overrides()).map_err(CliError::Config)
}

async fn run_command(
    command: Commands,
    mode: OutputMode,
    config: &ValidatedDemoConfig,
) -> Result<CliOutput, CliError> {
    match command {
        Commands::Reader => run_reader(mode, config).await,
        Commands::ReadWrite => run_read_write(mode, config).await,
        Commands::SlowReadWrite => run_slow_read_write(mode, config).await,
    }
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{LogFormat, OutputFormat};
    use clap::CommandFactory;
    use errchan_config::{DemoConfig, DemoEnv, load_demo_config_from_path};

    fn demo_config(capacity: usize, items: u32, delay_ms: u64) -> Result<ValidatedDemoConfig, CliError> {
        load_demo_config_from_path(
            None,
            &DemoEnv::default(),
            DemoOverrides {
                capacity: Some(capacity),
                items: Some(items),
                delay_ms: Some(delay_ms),
            },
        )
        .map_err(CliError::Config)
    }

    const fn text_mode() -> OutputMode {
        OutputMode {
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["errchan", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );

        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn global_flags_parse_after_the_subcommand() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "errchan",
            "reader",
            "--capacity",
            "0",
            "--items",
            "5",
            "--output",
            "json",
            "--log-format",
            "json",
        ])?;

        assert!(matches!(cli.command, Commands::Reader));
        assert_eq!(cli.output.output, Some(OutputFormat::Json));
        assert_eq!(cli.output.log_format, LogFormat::Json);
        assert_eq!(
            cli.config.overrides(),
            DemoOverrides {
                capacity: Some(0),
                items: Some(5),
                delay_ms: None,
            }
        );
        Ok(())
    }

    #[test]
    fn defaults_match_the_demo_config() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["errchan", "read-write"])?;
        assert_eq!(cli.output.log_format, LogFormat::Text);
        assert!(!OutputMode::from_args(&cli.output).is_json());
        assert_eq!(cli.config.overrides(), DemoOverrides::default());
        assert_eq!(DemoConfig::default().items, 3);
        Ok(())
    }

    #[tokio::test]
    async fn reader_sums_and_reports_failure() -> Result<(), CliError> {
        let config = demo_config(10, 3, 0)?;
        let output = run_reader(text_mode(), &config).await?;

        assert_eq!(output.stdout, "sum: 6\nerror: readerError\n");
        assert_eq!(output.exit_code, ExitCode::ProducerFailed);
        Ok(())
    }

    #[tokio::test]
    async fn read_write_reports_both_errors() -> Result<(), CliError> {
        let config = demo_config(10, 3, 0)?;
        let output = run_read_write(text_mode(), &config).await?;

        assert_eq!(
            output.stdout,
            "consumer error: writerError\ncount: 3\nerror: readerError\n"
        );
        assert_eq!(output.exit_code, ExitCode::ProducerFailed);
        Ok(())
    }

    #[tokio::test]
    async fn read_write_with_rendezvous_still_finishes() -> Result<(), CliError> {
        let config = demo_config(0, 50, 0)?;
        let output = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_read_write(text_mode(), &config),
        )
        .await
        .map_err(|_| CliError::Io(io::Error::other("read-write demo hung")))??;

        assert!(output.stdout.contains("count: 50\n"));
        Ok(())
    }

    #[tokio::test]
    async fn slow_read_write_reports_elapsed_time() -> Result<(), CliError> {
        let config = demo_config(10, 3, 5)?;
        let output = run_slow_read_write(
            OutputMode {
                format: OutputFormat::Json,
            },
            &config,
        )
        .await?;
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;

        assert_eq!(value.get("sum"), Some(&serde_json::json!(6)));
        let elapsed = value
            .get("elapsedMs")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_default();
        assert!(elapsed >= 15, "elapsed {elapsed}ms");
        assert_eq!(
            value.pointer("/error/message"),
            Some(&serde_json::json!("readerFail"))
        );
        Ok(())
    }
}

//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tidyarr_config::CONFIG_PATH;
use tidyarr_telemetry::GlobalContextGuard;

use crate::bootstrap::{init_telemetry, load_config};
use crate::commands::{handle_check_config, handle_health, handle_run};
use crate::error::AppResult;
use crate::output::OutputFormat;

/// Parses CLI arguments, executes the requested command and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> AppResult<i32> {
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::CheckConfig => handle_check_config(&config, cli.output),
        Command::Health => {
            init_telemetry(&config)?;
            let _context = GlobalContextGuard::new("health");
            handle_health(&config, cli.output).await
        }
        Command::Run(args) => {
            init_telemetry(&config)?;
            let _context = GlobalContextGuard::new("run");
            handle_run(&config, &args, cli.output).await
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tidyarr",
    about = "Retention-based cleanup of daily TV episodes across Plex and Sonarr"
)]
struct Cli {
    #[arg(long, global = true, env = "TIDYARR_CONFIG", default_value = CONFIG_PATH)]
    config: PathBuf,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every configured show and delete expired episodes.
    Run(RunArgs),
    /// Check that every configured backend is reachable.
    Health,
    /// Load and validate the configuration, then print the resolved plan.
    CheckConfig,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Evaluate and report without deleting anything.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Write Prometheus text metrics for a textfile collector.
    #[arg(long, value_name = "PATH")]
    pub(crate) metrics_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_flags_after_subcommand() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "tidyarr",
            "run",
            "--dry-run",
            "--output",
            "json",
            "--metrics-file",
            "/metrics/tidyarr.prom",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        let Command::Run(args) = cli.command else {
            anyhow::bail!("expected run command");
        };
        assert!(args.dry_run);
        assert_eq!(
            args.metrics_file,
            Some(PathBuf::from("/metrics/tidyarr.prom"))
        );
        Ok(())
    }

    #[test]
    fn subcommands_parse_with_global_options() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["tidyarr", "check-config", "--config", "/tmp/c.yaml"])?;
        assert!(matches!(cli.command, Command::CheckConfig));
        assert_eq!(cli.config, PathBuf::from("/tmp/c.yaml"));

        let cli = Cli::try_parse_from(["tidyarr", "health"])?;
        assert!(matches!(cli.command, Command::Health));
        assert_eq!(cli.output, OutputFormat::Table);
        Ok(())
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(Cli::try_parse_from(["tidyarr", "run", "--output", "xml"]).is_err());
    }
}

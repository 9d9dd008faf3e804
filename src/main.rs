//! # Router Signal
//!
//! Monitor the cellular signal of a 4G/5G router through its web UI.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the TOML configuration
//!    - Set up logging to stdout and a daily log file
//!    - Build the WebDriver client (the browser starts with the first command)
//!
//! 2. **Command**
//!    - `monitor`: poll every interval until Ctrl+C
//!    - `read`: one reading, then exit
//!    - `login-test`: log in and print where the router landed
//!
//! 3. **Shutdown**
//!    - Close the browser session on every exit path
//!
//! # Examples
//!
//! ```bash
//! chromedriver --port=9515 &
//! router-signal --config config/router-signal.toml monitor --interval 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use router_signal::config::Config;
use router_signal::driver::webdriver::WebDriverClient;
use router_signal::monitor::Monitor;
use router_signal::telemetry::sink::FanoutSink;

const LOG_FILE_NAME: &str = "router-signal.log";

#[derive(Parser)]
#[command(name = "router-signal")]
#[command(about = "Cellular router signal monitor", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "router-signal.toml")]
    config: PathBuf,

    /// Show the browser window
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Poll the router until interrupted (default)
    Monitor {
        /// Seconds between readings, overriding the config
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Take a single reading and exit
    Read,

    /// Log in only and report the landing URL
    LoginTest,
}

/// Console plus daily-rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
fn init_logging(log_dir: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if cli.debug {
        config.webdriver.headless = false;
    }

    let _guard = init_logging(&config.telemetry.log_dir);
    info!("Router Signal v{} starting...", env!("CARGO_PKG_VERSION"));

    let command = cli.command.unwrap_or(Commands::Monitor { interval: None });
    let sink = FanoutSink::from_config(&config.telemetry)?;
    // The browser session starts on the first command; an unreachable
    // server is a failed cycle, not a startup error.
    let driver = WebDriverClient::new(&config.webdriver).context("Failed to build WebDriver client")?;
    let mut monitor = Monitor::new(&config, driver, sink);

    let outcome = match command {
        Commands::Monitor { interval } => {
            if let Some(secs) = interval {
                monitor = monitor.with_interval(Duration::from_secs(secs.max(1)));
            }

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down...");
                }
                ctrl_c_token.cancel();
            });

            monitor.run(cancel).await;
            Ok(())
        }
        Commands::Read => monitor.read_once().await.map(|report| {
            println!("{}", report.summary());
        }),
        Commands::LoginTest => monitor.login_probe().await.map(|url| {
            println!("Login succeeded; landed on {}", url);
        }),
    };

    if let Err(e) = monitor.shutdown().await {
        warn!("Failed to close browser session: {}", e);
    }

    outcome.map_err(|e| {
        error!("{}", e);
        e.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_monitor() {
        let cli = Cli::try_parse_from(["router-signal"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("router-signal.toml"));
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_monitor_interval_flag() {
        let cli = Cli::try_parse_from(["router-signal", "-c", "r.toml", "monitor", "--interval", "10"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("r.toml"));
        assert_eq!(cli.command, Some(Commands::Monitor { interval: Some(10) }));
    }

    #[test]
    fn test_subcommands_and_debug() {
        let cli = Cli::try_parse_from(["router-signal", "read", "--debug"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Read));
        assert!(cli.debug);

        let cli = Cli::try_parse_from(["router-signal", "login-test"]).unwrap();
        assert_eq!(cli.command, Some(Commands::LoginTest));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

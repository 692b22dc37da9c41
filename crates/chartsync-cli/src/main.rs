//! chartsync - mirrors Helm chart repository indexes into HelmChart resources

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

mod commands;
mod config;
mod error;
mod exit_codes;

use config::{LogFormat, SyncArgs};

#[derive(Parser)]
#[command(name = "chartsync")]
#[command(version)]
#[command(about = "Mirrors Helm chart repository indexes into HelmChart resources", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "CHARTSYNC_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch HelmChartRepository resources and keep their HelmChart records in sync
    Run {
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Fetch one repository index and print the records a pass would write
    Render {
        /// Repository URL (index.yaml is appended)
        #[arg(long)]
        url: String,

        /// Repository name used as the record name prefix
        #[arg(long, default_value = "repository")]
        name: String,

        /// Platform version used to filter chart versions (empty keeps all)
        #[arg(long, default_value = "")]
        platform_version: String,

        #[command(flatten)]
        sync: SyncArgs,
    },
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    config::init_logging(cli.log_format);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = match cli.command {
        Commands::Run { sync } => {
            commands::run::run(&sync, config::resync_interval_from_env(), cancel).await
        }
        Commands::Render {
            url,
            name,
            platform_version,
            sync,
        } => commands::render::run(&name, &url, &platform_version, &sync, cancel).await,
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Cancel the token on Ctrl-C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown requested");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_defaults() {
        let cli = Cli::parse_from(["chartsync", "render", "--url", "https://charts.example.com"]);
        match cli.command {
            Commands::Render {
                name,
                platform_version,
                sync,
                ..
            } => {
                assert_eq!(name, "repository");
                assert_eq!(platform_version, "");
                assert_eq!(sync.config_namespace, "openshift-config");
            }
            Commands::Run { .. } => panic!("expected render"),
        }
        assert_eq!(cli.log_format, LogFormat::Text);
    }
}

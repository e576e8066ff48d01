//! fragment-listener demo binary.
//!
//! Binds `localhost:<port>`, prints the redirect URL, and waits for a browser
//! to be redirected there by an OAuth provider.  When the session ends it
//! prints the status and the captured fragment keys, or the whole outcome as
//! JSON with `--json`.
//!
//! # Usage
//!
//! ```text
//! fragment-listener [OPTIONS]
//!
//! Options:
//!   --port    <PORT>  Port registered as the OAuth redirect [default: 1000]
//!   --timeout <SECS>  Seconds to wait for the redirect [default: 120]
//!   --config  <PATH>  Optional TOML file with a [listener] table
//!   --json            Print the outcome as JSON
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                | Description                 |
//! |-------------------------|-----------------------------|
//! | `FRAGMENT_PORT`         | Same as `--port`            |
//! | `FRAGMENT_TIMEOUT_SECS` | Same as `--timeout`         |
//! | `FRAGMENT_CONFIG`       | Same as `--config`          |
//!
//! Precedence: command line / environment, then config file, then defaults.
//! Log level is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fragment_listener::infrastructure::FileConfig;
use fragment_listener::{FragmentMap, ListenerConfig, ListenerSession};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Captures the fragment of an OAuth implicit-grant redirect on localhost.
#[derive(Debug, Parser)]
#[command(
    name = "fragment-listener",
    about = "Single-use localhost listener for OAuth redirect fragments",
    version
)]
struct Cli {
    /// Port on localhost.  Must match the provider's registered redirect URL.
    #[arg(long, env = "FRAGMENT_PORT")]
    port: Option<u16>,

    /// Seconds to wait for the redirect before giving up.
    #[arg(long, env = "FRAGMENT_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// TOML file with a `[listener]` table.
    #[arg(long, env = "FRAGMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Print the outcome as JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Builds the listener config: defaults, then the file, then the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn listener_config(&self) -> anyhow::Result<ListenerConfig> {
        let mut config = ListenerConfig::default();

        if let Some(path) = &self.config {
            FileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
                .apply(&mut config);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// A fragment that exercises decoding, for testing without a real provider.
fn sample_fragment() -> FragmentMap {
    [("access_token", "test"), ("scope", "chat:read user:read:email")]
        .into_iter()
        .collect()
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.listener_config()?;

    let listener = ListenerSession::bind(config)
        .await
        .context("could not start the listener")?;

    let url = listener.url();
    println!("Waiting for a redirect to {url}");
    println!("To try it by hand, open {url}#{}", sample_fragment().to_fragment_string());

    // ── Ctrl+C cancels the session ────────────────────────────────────────────
    let shutdown = listener.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; cancelling session");
                shutdown.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let outcome = listener.run().await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
        );
    } else {
        println!("{}", outcome.status);
        if let Some(fragments) = &outcome.fragments {
            // Values are credentials; only the keys are shown.
            for key in fragments.keys() {
                println!("  {key}");
            }
        }
    }

    Ok(if outcome.is_captured() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

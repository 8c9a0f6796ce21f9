//! Clap derive structure for the `docktail` daemon.
//!
//! Every flag doubles as an environment variable so the daemon can be
//! configured entirely from a compose file.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

use docktail_core::ReconcilerConfig;

/// docktail -- advertise Docker containers as Tailscale services
#[derive(Debug, Parser)]
#[command(
    name = "docktail",
    version,
    about = "Label-driven reconciler: containers opt in via docktail.* labels \
             and become Tailscale services",
    long_about = "Watches the local Docker daemon for containers carrying \
        docktail.service.* labels and keeps the sibling tailscaled's serve and \
        funnel configuration converged with them. Stateless: stopping docktail \
        (or a labeled container) withdraws the corresponding advertisements."
)]
pub struct Cli {
    /// How often to run a full reconciliation cycle (e.g. 60s, 5m)
    #[arg(
        long,
        env = "DOCKTAIL_RECONCILE_INTERVAL",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    pub reconcile_interval: Duration,

    /// Path to the tailscaled socket, passed to the CLI as --socket
    #[arg(
        long,
        env = "DOCKTAIL_TAILSCALE_SOCKET",
        default_value = "/var/run/tailscale/tailscaled.sock"
    )]
    pub tailscale_socket: PathBuf,

    /// Control-plane API key; enables service-definition sync when set
    #[arg(long, env = "DOCKTAIL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tailnet identifier for control-plane calls ('-' = the key's tailnet)
    #[arg(long, env = "DOCKTAIL_TAILNET", default_value = "-")]
    pub tailnet: String,

    /// Fallback tags for containers without a docktail.tags label
    #[arg(
        long,
        env = "DOCKTAIL_DEFAULT_TAGS",
        default_value = "tag:container",
        value_delimiter = ','
    )]
    pub default_tags: Vec<String>,

    /// Log level: debug, info, warn, or error (RUST_LOG overrides)
    #[arg(long, env = "DOCKTAIL_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Translate flags into the engine's configuration. This is the single
    /// boundary where process configuration crosses into core types.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            reconcile_interval: self.reconcile_interval,
            tailscale_socket: Some(self.tailscale_socket.clone()),
            api_key: self.api_key.clone().map(SecretString::from),
            tailnet: self.tailnet.clone(),
            default_tags: self.default_tags.clone(),
        }
    }
}

// ── Runtime configuration ──
//
// Built by the binary from flags/environment and handed in; the engine
// never reads the environment itself.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Configuration for one reconciler instance.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Ticker period for periodic reconciliation.
    pub reconcile_interval: Duration,
    /// Tailscale daemon socket, passed to the CLI as `--socket` when set.
    pub tailscale_socket: Option<PathBuf>,
    /// Control-plane API key. Sync of service definitions is enabled iff
    /// this is present.
    pub api_key: Option<SecretString>,
    /// Tailnet identifier for control-plane calls. `-` means "the tailnet
    /// this key belongs to".
    pub tailnet: String,
    /// Tags applied to containers that carry no tags label.
    pub default_tags: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
            tailscale_socket: None,
            api_key: None,
            tailnet: "-".into(),
            default_tags: vec!["tag:container".into()],
        }
    }
}

use thiserror::Error;

/// Top-level error type for the `docktail-tailscale` crate.
///
/// Covers both surfaces: CLI invocations against the local daemon and HTTP
/// calls against the control plane. `docktail-core` routes on the
/// classification helpers rather than matching variants directly.
#[derive(Debug, Error)]
pub enum Error {
    // ── CLI ──────────────────────────────────────────────────────────
    /// The `tailscale` binary could not be spawned or its output read.
    #[error("failed to run tailscale CLI: {0}")]
    Spawn(#[from] std::io::Error),

    /// The CLI exited non-zero. `output` is combined stdout + stderr,
    /// which is where the daemon writes its diagnostics.
    #[error("tailscale {command} failed: {output}")]
    Command { command: String, output: String },

    /// The in-flight invocation was cancelled (shutdown or cycle abort).
    #[error("tailscale CLI invocation cancelled")]
    Cancelled,

    /// Status output was not parseable JSON even after preamble stripping.
    #[error("could not parse tailscale status output: {message}")]
    StatusParse { message: String, body: String },

    // ── Control plane ────────────────────────────────────────────────
    /// HTTP transport failure (connection refused, timeout, TLS, ...).
    #[error("control plane transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The control plane answered with a non-success status.
    #[error("control plane returned HTTP {status}: {body}")]
    ControlPlane { status: u16, body: String },

    /// A constructed API URL was invalid.
    #[error("invalid control plane URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// The daemon says the resource does not exist. Treated as success on
    /// idempotent removals (drain/clear of an already-gone service).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Command { output, .. } => {
                output.contains("not found")
                    || output.contains("does not exist")
                    || output.contains("no services")
                    || output.contains("nothing to show")
                    || output.contains("no funnel")
            }
            _ => false,
        }
    }

    /// The serve invocation collided with an existing configuration
    /// (port already serving under a different protocol or destination).
    /// Triggers the clear-and-retry path.
    pub fn is_config_conflict(&self) -> bool {
        match self {
            Self::Command { output, .. } => {
                output.contains("already serving")
                    || output.contains("want to serve")
                    || output.contains("port is already serving")
            }
            _ => false,
        }
    }

    /// This node is not tagged and may not host services at all. Fatal for
    /// the endpoint; retrying without operator action cannot succeed.
    pub fn is_untagged_node(&self) -> bool {
        match self {
            Self::Command { output, .. } => {
                output.contains("service hosts must be tagged nodes")
            }
            _ => false,
        }
    }
}

use thiserror::Error;

/// Unified error type for the convergence engine.
///
/// Per-container and per-endpoint failures are logged and skipped inside the
/// cycle; only listing failures and the aggregate cycle outcome surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A container's labels could not be turned into endpoint declarations.
    /// Scope: one container; the cycle continues without it.
    #[error("container {container}: {message}")]
    Labels { container: String, message: String },

    /// A destination could not be resolved for one endpoint.
    /// Scope: one endpoint; siblings on the same container proceed.
    #[error("container {container}: {message}")]
    Resolve { container: String, message: String },

    /// The cycle completed but some serve commands failed or the funnel
    /// phase detected a public-port conflict. The next trigger re-attempts
    /// everything, so this is never fatal to the driver.
    #[error(
        "cycle incomplete: {failed_commands} serve command(s) failed, \
         {funnel_conflicts} funnel port conflict(s)"
    )]
    CycleFailed {
        failed_commands: usize,
        funnel_conflicts: usize,
    },

    /// Container runtime failure (listing, inspection, event stream).
    #[error(transparent)]
    Docker(#[from] docktail_docker::Error),

    /// Tailscale CLI or control-plane failure.
    #[error(transparent)]
    Tailscale(#[from] docktail_tailscale::Error),
}

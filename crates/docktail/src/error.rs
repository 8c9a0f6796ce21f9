//! Fatal setup errors with miette diagnostics.
//!
//! Anything that happens after setup is the driver's problem and never
//! terminates the process; only these make docktail exit non-zero.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DaemonError {
    #[error("could not connect to the Docker daemon")]
    #[diagnostic(
        code(docktail::docker_unreachable),
        help(
            "Check that the Docker socket is mounted (usually \
             /var/run/docker.sock) or that DOCKER_HOST points at a reachable \
             daemon."
        )
    )]
    DockerConnect(#[source] docktail_docker::Error),

    #[error("could not install signal handlers")]
    #[diagnostic(code(docktail::signal_wiring))]
    Signal(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(docktail::setup))]
    Core(#[from] docktail_core::CoreError),
}

use thiserror::Error;

/// Top-level error type for the `docktail-docker` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or API failure from the Docker daemon.
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The event stream ended; the daemon closed the connection.
    #[error("Docker event stream closed")]
    EventStreamClosed,
}

impl Error {
    /// Returns `true` if the daemon reported 404 for the resource.
    ///
    /// Containers routinely vanish between listing and inspection; callers
    /// skip those instead of failing the cycle.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })
        )
    }
}

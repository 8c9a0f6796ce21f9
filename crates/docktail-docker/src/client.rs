// ── Docker daemon client ──
//
// Thin wrapper around bollard. Listing is filtered server-side on the
// opt-in label so a busy host with hundreds of containers only ships the
// handful docktail cares about; events are filtered to the four lifecycle
// actions that can change the desired service set.

use std::collections::HashMap;

use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::container::ContainerRecord;
use crate::error::Error;

/// Lifecycle actions that trigger a reconciliation cycle.
const EVENT_ACTIONS: [&str; 4] = ["start", "stop", "die", "restart"];

/// A container lifecycle notification.
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    /// Action name: `start`, `stop`, `die`, or `restart`.
    pub action: String,
    /// Short id of the container the event concerns.
    pub container_id: String,
}

/// Handle to the local Docker daemon.
///
/// Cheaply cloneable; bollard multiplexes over one connection internally.
#[derive(Clone)]
pub struct DockerHandle {
    docker: Docker,
}

impl DockerHandle {
    /// Connect using the standard environment (`DOCKER_HOST` or the
    /// platform-default socket). Fails fast if the daemon is unreachable
    /// at negotiation time.
    pub fn connect() -> Result<Self, Error> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// List running containers carrying `<enable_label>=true` and snapshot
    /// each one.
    ///
    /// A container that vanishes between listing and inspection is skipped
    /// with a warning -- it will simply be absent from the desired set, which
    /// is exactly what its disappearance means.
    pub async fn list_enabled(&self, enable_label: &str) -> Result<Vec<ContainerRecord>, Error> {
        let options = ListContainersOptions::<String> {
            all: false,
            filters: HashMap::from([(
                "label".to_string(),
                vec![format!("{enable_label}=true")],
            )]),
            ..Default::default()
        };

        let summaries = self.docker.list_containers(Some(options)).await?;
        debug!(count = summaries.len(), "listed enabled containers");

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            let labels = summary.labels.unwrap_or_default();

            match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => {
                    records.push(ContainerRecord::from_inspect(id, labels, &inspect));
                }
                Err(e) => {
                    let err = Error::from(e);
                    if err.is_not_found() {
                        debug!(container = %short(&id), "container vanished before inspection, skipping");
                    } else {
                        warn!(container = %short(&id), error = %err, "failed to inspect container, skipping");
                    }
                }
            }
        }

        Ok(records)
    }

    /// Subscribe to the container lifecycle event stream.
    ///
    /// The stream is infinite in the happy case. Transport errors surface as
    /// `Err` items; the consumer re-subscribes after a short backoff. No
    /// label filtering happens here -- any container starting or stopping may
    /// change destination IPs or port bindings of labeled ones, so every
    /// event is worth a cycle.
    pub fn events(&self) -> impl Stream<Item = Result<ContainerEvent, Error>> + Send + Unpin + '_ {
        let options = EventsOptions::<String> {
            since: None,
            until: None,
            filters: HashMap::from([
                ("type".to_string(), vec!["container".to_string()]),
                (
                    "event".to_string(),
                    EVENT_ACTIONS.iter().map(|a| a.to_string()).collect(),
                ),
            ]),
        };

        let stream = self.docker.events(Some(options)).map(|item| match item {
            Ok(message) => {
                let action = message.action.unwrap_or_default();
                let container_id = message
                    .actor
                    .and_then(|actor| actor.id)
                    .map(|id| short(&id).to_owned())
                    .unwrap_or_default();
                Ok(ContainerEvent {
                    action,
                    container_id,
                })
            }
            Err(e) => Err(Error::from(e)),
        });
        Box::pin(stream)
    }
}

fn short(id: &str) -> &str {
    if id.len() > 12 { &id[..12] } else { id }
}

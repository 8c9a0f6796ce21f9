// ── Loop driver ──
//
// Sole scheduler for the engine: merges the initial kick, the periodic
// ticker, and container lifecycle events into a single stream of
// "reconcile requested" signals. Exactly one cycle is in flight at any
// moment; a capacity-1 channel with try_send is the single-slot pending
// flag that coalesces event bursts into at most one follow-up cycle.

use std::time::Duration;

use docktail_docker::DockerHandle;
use docktail_tailscale::{ControlPlaneClient, ServeCli};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerConfig;
use crate::engine::Engine;
use crate::error::CoreError;

/// Delay before re-subscribing after an event-stream transport error.
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound on the shutdown cleanup, independent of the cancelled root.
const CLEANUP_DEADLINE: Duration = Duration::from_secs(30);

/// Owns the reconciliation schedule and the shutdown cleanup.
pub struct Driver {
    engine: Engine,
    docker: DockerHandle,
    interval: Duration,
    cancel: CancellationToken,
}

impl Driver {
    /// Wire up the engine from configuration. The control-plane client is
    /// constructed iff an API key is present.
    pub fn new(
        docker: DockerHandle,
        config: ReconcilerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let cli = ServeCli::new(config.tailscale_socket.clone(), cancel.clone());

        let control_plane = match &config.api_key {
            Some(key) => {
                info!(tailnet = %config.tailnet, "control-plane sync enabled");
                Some(ControlPlaneClient::new(config.tailnet.clone(), key.clone())?)
            }
            None => {
                debug!("no API key configured, control-plane sync disabled");
                None
            }
        };

        let engine = Engine::new(docker.clone(), cli, control_plane, config.default_tags);

        Ok(Self {
            engine,
            docker,
            interval: config.reconcile_interval,
            cancel,
        })
    }

    /// Run until the cancellation token fires, then clean up.
    ///
    /// Returns `Ok` on orderly shutdown; cycle failures are logged and
    /// retried on the next trigger, never fatal.
    pub async fn run(self) -> Result<(), CoreError> {
        self.cycle("initial").await;

        let (request_tx, mut request_rx) = mpsc::channel::<()>(1);
        let pump = tokio::spawn(event_pump(
            self.docker.clone(),
            request_tx,
            self.cancel.clone(),
        ));

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.cycle("periodic").await;
                }
                Some(()) = request_rx.recv() => {
                    self.cycle("event").await;
                }
            }
        }

        pump.abort();
        let _ = pump.await;

        info!("shutdown requested, running bounded cleanup");
        if tokio::time::timeout(CLEANUP_DEADLINE, self.engine.cleanup())
            .await
            .is_err()
        {
            error!(
                deadline_secs = CLEANUP_DEADLINE.as_secs(),
                "shutdown cleanup did not finish before the deadline"
            );
        }

        info!("driver stopped");
        Ok(())
    }

    async fn cycle(&self, trigger: &str) {
        debug!(trigger, "reconciliation triggered");
        match self.engine.reconcile(&self.cancel).await {
            Ok(summary) => {
                info!(
                    trigger,
                    containers = summary.containers,
                    endpoints = summary.endpoints,
                    funnels = summary.funnels,
                    applied = summary.applied,
                    withdrawn = summary.withdrawn,
                    unchanged = summary.unchanged,
                    "reconciliation cycle complete"
                );
            }
            Err(e) => {
                if self.cancel.is_cancelled() {
                    debug!(trigger, "cycle aborted by shutdown");
                } else {
                    error!(trigger, error = %e, "reconciliation cycle failed");
                }
            }
        }
    }
}

/// Forward container lifecycle events into the request channel.
///
/// `try_send` into the capacity-1 channel implements coalescing: while a
/// cycle is running, the first event occupies the slot and the rest of the
/// burst is absorbed. On stream error the subscription is re-established
/// after a short backoff.
async fn event_pump(
    docker: DockerHandle,
    request_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    loop {
        let mut events = docker.events();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = events.next() => match item {
                    Some(Ok(event)) => {
                        debug!(
                            action = %event.action,
                            container = %event.container_id,
                            "container event received"
                        );
                        let _ = request_tx.try_send(());
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream error, re-subscribing");
                        break;
                    }
                    None => {
                        warn!("event stream ended, re-subscribing");
                        break;
                    }
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RESUBSCRIBE_BACKOFF) => {}
        }
    }
}

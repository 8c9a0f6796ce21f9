// ── Reconciliation engine ──
//
// One cycle: observe the runtime, build the desired declaration set, diff
// against the daemon, apply. Phases run in a fixed order -- services
// (withdraw, then add/update), funnels, then the optional control-plane
// sync -- and the whole cycle is cancellation-aware between phases.

use docktail_docker::{ContainerRecord, DockerHandle};
use docktail_tailscale::{ControlPlaneClient, ServeCli};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::funnel::{apply_funnels, plan_funnels};
use crate::labels::{parse_container, LABEL_ENABLE};
use crate::model::{FunnelEndpoint, ServiceEndpoint};
use crate::reconciler::{apply_plan, plan_services, withdraw_service};
use crate::resolve::{probe_reachability, resolve_destination};
use crate::sync::sync_definitions;

/// Counters from one completed cycle, for the driver's summary log.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub containers: usize,
    pub endpoints: usize,
    pub funnels: usize,
    pub applied: usize,
    pub withdrawn: usize,
    pub unchanged: usize,
}

/// The convergence engine. Stateless between cycles: every call to
/// [`reconcile`](Self::reconcile) recomputes everything from scratch.
pub struct Engine {
    docker: DockerHandle,
    cli: ServeCli,
    control_plane: Option<ControlPlaneClient>,
    default_tags: Vec<String>,
}

impl Engine {
    pub fn new(
        docker: DockerHandle,
        cli: ServeCli,
        control_plane: Option<ControlPlaneClient>,
        default_tags: Vec<String>,
    ) -> Self {
        Self {
            docker,
            cli,
            control_plane,
            default_tags,
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Succeeds iff every add/update command succeeded and the funnel phase
    /// found no public-port conflict. A failing cycle never halts the
    /// driver; the next trigger re-attempts everything.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<CycleSummary, CoreError> {
        info!("starting reconciliation cycle");

        let records = self.docker.list_enabled(LABEL_ENABLE).await?;
        let (desired, funnels) = self.desired_state(&records).await;
        info!(
            containers = records.len(),
            endpoints = desired.len(),
            funnels = funnels.len(),
            "computed desired state"
        );

        if cancel.is_cancelled() {
            return Err(CoreError::Tailscale(docktail_tailscale::Error::Cancelled));
        }

        // ── Services ────────────────────────────────────────────────
        let observed = self.cli.serve_status().await?.managed_endpoints();
        debug!(observed = observed.len(), "retrieved observed service state");

        let plan = plan_services(&desired, &observed);
        if plan.is_noop() {
            debug!("services already converged");
        }
        let report = apply_plan(&self.cli, &plan).await;

        // ── Funnels ─────────────────────────────────────────────────
        let active_ports = self.cli.funnel_status().await?.active_ports();
        let funnel_conflicts = match plan_funnels(&funnels, &active_ports) {
            Ok(actions) => {
                apply_funnels(&self.cli, &actions).await;
                0
            }
            Err(conflicts) => conflicts.len(),
        };

        // ── Control plane (optional, never affects the cycle result) ─
        if let Some(client) = &self.control_plane {
            if !cancel.is_cancelled() {
                sync_definitions(client, &desired).await;
            }
        }

        if report.failed > 0 || funnel_conflicts > 0 {
            return Err(CoreError::CycleFailed {
                failed_commands: report.failed,
                funnel_conflicts,
            });
        }

        Ok(CycleSummary {
            containers: records.len(),
            endpoints: desired.len(),
            funnels: funnels.len(),
            applied: report.applied,
            withdrawn: report.withdrawn,
            unchanged: plan.unchanged,
        })
    }

    /// Build the desired declaration sets from container snapshots.
    ///
    /// Parse failures skip the container; resolution failures skip the
    /// single endpoint (or the funnel) with an actionable warning. Whatever
    /// resolves gets published.
    async fn desired_state(
        &self,
        records: &[ContainerRecord],
    ) -> (Vec<ServiceEndpoint>, Vec<FunnelEndpoint>) {
        let mut endpoints = Vec::new();
        let mut funnels = Vec::new();

        for record in records {
            let parsed = match parse_container(record, &self.default_tags) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(
                        container = %record.name,
                        container_id = %record.short_id(),
                        error = %e,
                        "failed to parse container labels, skipping container"
                    );
                    continue;
                }
            };

            for spec in &parsed.endpoints {
                let destination = match resolve_destination(
                    record,
                    parsed.direct,
                    parsed.network.as_deref(),
                    spec.container_port,
                ) {
                    Ok(destination) => destination,
                    Err(e) => {
                        warn!(
                            container = %record.name,
                            service = %spec.service_name,
                            error = %e,
                            "failed to resolve destination, skipping endpoint"
                        );
                        continue;
                    }
                };

                if parsed.direct {
                    probe_reachability(&record.name, &destination.host, destination.port).await;
                }

                endpoints.push(ServiceEndpoint {
                    service_name: spec.service_name.clone(),
                    listen_port: spec.listen_port,
                    listen_protocol: spec.listen_protocol,
                    backend_protocol: spec.backend_protocol,
                    destination_host: destination.host,
                    destination_port: destination.port,
                    tags: parsed.tags.clone(),
                    container_id: record.short_id().to_owned(),
                    container_name: record.name.clone(),
                });
            }

            if let Some(spec) = &parsed.funnel {
                match resolve_destination(
                    record,
                    parsed.direct,
                    parsed.network.as_deref(),
                    spec.container_port,
                ) {
                    Ok(destination) => {
                        info!(
                            container = %record.name,
                            public_port = spec.public_port,
                            protocol = spec.protocol.as_str(),
                            target_host = %destination.host,
                            target_port = destination.port,
                            "funnel enabled for public access"
                        );
                        funnels.push(FunnelEndpoint {
                            container_port: spec.container_port,
                            target_port: destination.port,
                            public_port: spec.public_port,
                            protocol: spec.protocol,
                            destination_host: destination.host,
                            container_id: record.short_id().to_owned(),
                            container_name: record.name.clone(),
                        });
                    }
                    Err(e) => {
                        warn!(
                            container = %record.name,
                            error = %e,
                            "failed to resolve funnel destination, skipping funnel"
                        );
                    }
                }
            }
        }

        (endpoints, funnels)
    }

    /// Shutdown cleanup: drain-and-clear every managed service observed on
    /// the daemon and reset all funnels.
    ///
    /// Runs under a fresh cancellation scope so it can finish after the
    /// root token has been cancelled; the driver bounds it with a deadline.
    pub async fn cleanup(&self) {
        let cli = self.cli.with_cancel(CancellationToken::new());
        info!("shutdown cleanup: withdrawing all managed services and funnels");

        match cli.funnel_status().await {
            Ok(status) if !status.active_ports().is_empty() => {
                if let Err(e) = cli.funnel_reset().await {
                    error!(error = %e, "failed to reset funnels during cleanup");
                }
            }
            Ok(_) => debug!("no funnels to clean up"),
            Err(e) => warn!(error = %e, "could not read funnel status during cleanup"),
        }

        let observed = match cli.serve_status().await {
            Ok(status) => status.managed_endpoints(),
            Err(e) => {
                error!(error = %e, "could not read serve status during cleanup");
                return;
            }
        };

        let service_ids: std::collections::BTreeSet<String> =
            observed.keys().map(|(id, _)| id.clone()).collect();
        info!(services = service_ids.len(), "cleaning up managed services");

        for service_id in service_ids {
            if let Err(e) = withdraw_service(&cli, &service_id).await {
                error!(service = %service_id, error = %e, "failed to clean up service");
            }
        }
    }
}

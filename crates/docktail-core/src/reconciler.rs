// ── Service reconciler ──
//
// Diff the desired endpoint set against the daemon's observed state and
// apply the difference. Withdrawals run before adds/updates, both in
// sorted key order so consecutive cycles produce comparable logs.
//
// The update-vs-withdraw distinction is load-bearing: a service that
// disappeared from the desired set is drained first (container stopped,
// let connections finish), while a config change on a still-desired
// service goes through the conflict path -- clear without drain, retry
// once -- because the backend is alive and should be re-armed immediately.

use std::collections::{BTreeMap, BTreeSet};

use docktail_tailscale::{is_managed, Error as TsError, ObservedEndpoint, ServeCli};
use tracing::{debug, error, info, warn};

use crate::model::ServiceEndpoint;

/// The commands one cycle needs to issue, in issue order.
#[derive(Debug, Default)]
pub struct ServicePlan {
    /// Service ids to drain-then-clear: managed services with no remaining
    /// desired listener. Sorted, deduplicated.
    pub withdraw: Vec<String>,
    /// Endpoints to (re)apply: new listeners and listeners whose observed
    /// destination or protocol differs. Sorted by `(service_id, port)`.
    pub apply: Vec<ServiceEndpoint>,
    /// Listeners already matching; counted for the cycle summary.
    pub unchanged: usize,
}

impl ServicePlan {
    /// True when the daemon already matches the desired set.
    pub fn is_noop(&self) -> bool {
        self.withdraw.is_empty() && self.apply.is_empty()
    }
}

/// Outcome counters for one apply pass.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
    pub withdrawn: usize,
    pub withdraw_failed: usize,
}

/// Compute the minimal command set.
pub fn plan_services(
    desired: &[ServiceEndpoint],
    observed: &BTreeMap<(String, u16), ObservedEndpoint>,
) -> ServicePlan {
    let mut desired_map: BTreeMap<(String, u16), &ServiceEndpoint> = BTreeMap::new();
    for endpoint in desired {
        if let Some(previous) = desired_map.insert(endpoint.key(), endpoint) {
            warn!(
                service = %endpoint.service_id(),
                port = endpoint.listen_port,
                container = %endpoint.container_name,
                also_declared_by = %previous.container_name,
                "same service and port declared by two containers, last one wins"
            );
        }
    }

    let mut plan = ServicePlan::default();

    for (key, endpoint) in &desired_map {
        match observed.get(key) {
            None => {
                debug!(service = %key.0, port = key.1, "listener not observed, will add");
                plan.apply.push((*endpoint).clone());
            }
            Some(current) => {
                let desired_destination = endpoint.destination_url();
                if current.destination != desired_destination
                    || current.protocol != endpoint.listen_protocol.wire()
                {
                    info!(
                        service = %key.0,
                        port = key.1,
                        observed_destination = %current.destination,
                        desired_destination = %desired_destination,
                        observed_protocol = current.protocol.as_str(),
                        desired_protocol = endpoint.listen_protocol.as_str(),
                        "listener configuration changed, will update"
                    );
                    plan.apply.push((*endpoint).clone());
                } else {
                    plan.unchanged += 1;
                }
            }
        }
    }

    // Withdraw whole services, and only those with no desired listener left:
    // a stale port on a still-desired service is resolved by the conflict
    // path when its replacement listener is applied.
    let still_desired: BTreeSet<&str> =
        desired_map.keys().map(|(id, _)| id.as_str()).collect();
    let stale_ids: BTreeSet<&str> = observed
        .keys()
        .filter(|key| !desired_map.contains_key(*key))
        .map(|(id, _)| id.as_str())
        .filter(|id| !still_desired.contains(id))
        .collect();

    plan.withdraw = stale_ids.into_iter().map(str::to_owned).collect();
    plan
}

/// Apply a plan: withdrawals first, then adds/updates.
///
/// One failing command never aborts the pass; failures are counted and the
/// caller folds them into the cycle result. Only add/update failures make
/// the cycle fail -- a failed withdrawal will be retried next cycle anyway.
pub async fn apply_plan(cli: &ServeCli, plan: &ServicePlan) -> ApplyReport {
    let mut report = ApplyReport::default();

    for service_id in &plan.withdraw {
        if !is_managed(service_id) {
            warn!(service = %service_id, "refusing to withdraw unmanaged service");
            continue;
        }
        info!(service = %service_id, "withdrawing service: drain then clear");
        match withdraw_service(cli, service_id).await {
            Ok(()) => report.withdrawn += 1,
            Err(TsError::Cancelled) => return report,
            Err(e) => {
                error!(service = %service_id, error = %e, "failed to withdraw service");
                report.withdraw_failed += 1;
            }
        }
    }

    for endpoint in &plan.apply {
        match apply_endpoint(cli, endpoint).await {
            Ok(()) => report.applied += 1,
            Err(TsError::Cancelled) => return report,
            Err(e) => {
                error!(
                    service = %endpoint.service_id(),
                    port = endpoint.listen_port,
                    container = %endpoint.container_name,
                    error = %e,
                    "failed to apply listener"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        applied = report.applied,
        failed = report.failed,
        withdrawn = report.withdrawn,
        unchanged = plan.unchanged,
        "service reconciliation pass complete"
    );

    report
}

/// Drain-then-clear, both steps always attempted.
///
/// Drain failure is logged and does not stop the clear: a service that was
/// never configured has nothing to drain but may still need clearing.
pub async fn withdraw_service(cli: &ServeCli, service_id: &str) -> Result<(), TsError> {
    if let Err(e) = cli.serve_drain(service_id).await {
        if matches!(e, TsError::Cancelled) {
            return Err(e);
        }
        warn!(service = %service_id, error = %e, "drain failed, clearing anyway");
    }
    cli.serve_clear(service_id).await
}

/// Issue one serve command, with the clear-and-retry path on conflict.
async fn apply_endpoint(cli: &ServeCli, endpoint: &ServiceEndpoint) -> Result<(), TsError> {
    let service_id = endpoint.service_id();
    let destination = endpoint.destination_url();
    let flag = endpoint.listen_protocol.serve_flag();

    info!(
        service = %service_id,
        port = endpoint.listen_port,
        protocol = endpoint.listen_protocol.as_str(),
        destination = %destination,
        container = %endpoint.container_name,
        "configuring listener"
    );

    match cli
        .serve(&service_id, flag, endpoint.listen_port, &destination)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_config_conflict() => {
            warn!(
                service = %service_id,
                error = %e,
                "config conflict, clearing old configuration and retrying once"
            );
            cli.serve_clear(&service_id).await?;
            cli.serve(&service_id, flag, endpoint.listen_port, &destination)
                .await
        }
        Err(e) if e.is_untagged_node() => {
            error!(
                service = %service_id,
                "this node is not tagged; service hosts must be tagged nodes"
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}

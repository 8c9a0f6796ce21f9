// ── Funnel reconciler ──
//
// Independent of the service reconciler: funnels are keyed by public port
// on the node's own hostname, not by service name. The daemon can only
// remove funnels wholesale (`funnel reset`), so withdrawing one stale port
// means resetting and re-adding every survivor in the same cycle. Removal
// is ordered strictly before addition.

use std::collections::{BTreeMap, BTreeSet};

use docktail_tailscale::{Error as TsError, ServeCli};
use tracing::{error, info};

use crate::model::FunnelEndpoint;

/// Two declarations claiming the same public port. The whole funnel phase
/// fails without issuing a single command when any of these exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelConflict {
    pub public_port: u16,
    pub first_container: String,
    pub second_container: String,
}

/// Commands the funnel phase needs to issue.
#[derive(Debug, Default)]
pub struct FunnelActions {
    /// Wipe all funnels first. Set when any active public port is no longer
    /// desired; `add` then re-establishes the full desired set.
    pub reset: bool,
    /// Funnels to enable, sorted by public port.
    pub add: Vec<FunnelEndpoint>,
    pub unchanged: usize,
}

impl FunnelActions {
    pub fn is_noop(&self) -> bool {
        !self.reset && self.add.is_empty()
    }
}

/// Diff desired funnels against the daemon's active public ports.
///
/// Duplicate public ports across containers fail the phase atomically:
/// every conflicting pair is reported and no command is issued.
pub fn plan_funnels(
    desired: &[FunnelEndpoint],
    active_ports: &BTreeSet<u16>,
) -> Result<FunnelActions, Vec<FunnelConflict>> {
    let mut by_port: BTreeMap<u16, &FunnelEndpoint> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for funnel in desired {
        if let Some(holder) = by_port.get(&funnel.public_port) {
            error!(
                public_port = funnel.public_port,
                first = %holder.container_name,
                second = %funnel.container_name,
                "funnel public-port conflict: only one funnel may be active per port"
            );
            conflicts.push(FunnelConflict {
                public_port: funnel.public_port,
                first_container: holder.container_name.clone(),
                second_container: funnel.container_name.clone(),
            });
        } else {
            by_port.insert(funnel.public_port, funnel);
        }
    }

    if !conflicts.is_empty() {
        return Err(conflicts);
    }

    let desired_ports: BTreeSet<u16> = by_port.keys().copied().collect();
    let stale: Vec<u16> = active_ports.difference(&desired_ports).copied().collect();

    let mut actions = FunnelActions::default();
    if !stale.is_empty() {
        // Reset is coarse: it wipes the survivors too, so they all go back
        // into the add list.
        info!(?stale, "stale funnel ports detected, will reset and re-add survivors");
        actions.reset = true;
        actions.add = by_port.values().map(|f| (*f).clone()).collect();
    } else {
        for (port, funnel) in &by_port {
            if active_ports.contains(port) {
                actions.unchanged += 1;
            } else {
                actions.add.push((*funnel).clone());
            }
        }
    }

    Ok(actions)
}

/// Issue the funnel commands: reset first, then adds in port order.
///
/// Returns the number of failed commands. Per-command failures are logged
/// and do not stop the pass; only a planning conflict fails the phase.
pub async fn apply_funnels(cli: &ServeCli, actions: &FunnelActions) -> usize {
    let mut failed = 0;

    if actions.reset {
        info!("resetting funnel configuration");
        match cli.funnel_reset().await {
            Ok(()) => {}
            Err(TsError::Cancelled) => return failed,
            Err(e) => {
                error!(error = %e, "funnel reset failed");
                failed += 1;
            }
        }
    }

    for funnel in &actions.add {
        let destination = funnel.destination_url();
        info!(
            public_port = funnel.public_port,
            protocol = funnel.protocol.as_str(),
            destination = %destination,
            container = %funnel.container_name,
            "enabling funnel"
        );
        match cli
            .funnel_enable(funnel.protocol.funnel_flag(), funnel.public_port, &destination)
            .await
        {
            Ok(()) => {}
            Err(TsError::Cancelled) => return failed,
            Err(e) => {
                error!(
                    public_port = funnel.public_port,
                    container = %funnel.container_name,
                    error = %e,
                    "failed to enable funnel"
                );
                failed += 1;
            }
        }
    }

    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::FunnelProtocol;

    fn funnel(container: &str, public_port: u16) -> FunnelEndpoint {
        FunnelEndpoint {
            container_port: 8080,
            target_port: 18080,
            public_port,
            protocol: FunnelProtocol::Https,
            destination_host: "localhost".into(),
            container_id: "0123456789ab".into(),
            container_name: container.into(),
        }
    }

    #[test]
    fn conflict_blocks_the_whole_phase() {
        let desired = vec![funnel("a", 443), funnel("b", 443)];
        let conflicts = plan_funnels(&desired, &BTreeSet::new()).unwrap_err();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].public_port, 443);
        assert_eq!(conflicts[0].first_container, "a");
        assert_eq!(conflicts[0].second_container, "b");
    }

    #[test]
    fn every_conflicting_pair_is_reported() {
        let desired = vec![funnel("a", 443), funnel("b", 443), funnel("c", 443)];
        let conflicts = plan_funnels(&desired, &BTreeSet::new()).unwrap_err();
        assert_eq!(conflicts.len(), 2);
    }

    #[test]
    fn missing_funnels_are_added_without_reset() {
        let desired = vec![funnel("a", 443), funnel("b", 8443)];
        let active = BTreeSet::from([443]);

        let actions = plan_funnels(&desired, &active).unwrap();
        assert!(!actions.reset);
        assert_eq!(actions.unchanged, 1);
        assert_eq!(actions.add.len(), 1);
        assert_eq!(actions.add[0].public_port, 8443);
    }

    #[test]
    fn stale_port_forces_reset_and_full_readd() {
        let desired = vec![funnel("a", 443)];
        let active = BTreeSet::from([443, 8443]);

        let actions = plan_funnels(&desired, &active).unwrap();
        assert!(actions.reset);
        assert_eq!(actions.add.len(), 1);
        assert_eq!(actions.add[0].public_port, 443);
    }

    #[test]
    fn matching_state_is_a_noop() {
        let desired = vec![funnel("a", 443)];
        let active = BTreeSet::from([443]);

        let actions = plan_funnels(&desired, &active).unwrap();
        assert!(actions.is_noop());
        assert_eq!(actions.unchanged, 1);
    }

    #[test]
    fn no_desired_and_active_ports_resets_without_adds() {
        let actions = plan_funnels(&[], &BTreeSet::from([443])).unwrap();
        assert!(actions.reset);
        assert!(actions.add.is_empty());
    }
}

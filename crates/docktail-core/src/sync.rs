// ── Control-plane definition sync ──
//
// Upserts service *definitions* (who may advertise, with which tags) into
// the control plane. Deliberately conservative: existing definitions are
// never updated and nothing is ever deleted -- in an HA deployment another
// host may still be advertising a service after this host's container
// stops. Failures here never affect the cycle result; local advertisement
// is the source of truth.

use std::collections::BTreeMap;

use docktail_tailscale::ControlPlaneClient;
use tracing::{debug, error, info};

use crate::model::ServiceEndpoint;

/// Ensure a definition exists for every desired service name.
///
/// Returns the number of failed upserts (for logging only).
pub async fn sync_definitions(
    client: &ControlPlaneClient,
    desired: &[ServiceEndpoint],
) -> usize {
    // One upsert per unique service name. When several endpoints share a
    // name the last one's tags and listen port are used; a consistent
    // deployment declares them identically.
    let mut unique: BTreeMap<&str, (&[String], u16)> = BTreeMap::new();
    for endpoint in desired {
        unique.insert(
            endpoint.service_name.as_str(),
            (endpoint.tags.as_slice(), endpoint.listen_port),
        );
    }

    info!(unique_services = unique.len(), "syncing service definitions to the control plane");

    let mut failed = 0;
    for (name, (tags, listen_port)) in unique {
        let service_id = format!("svc:{name}");

        match client.get_service(&service_id).await {
            Ok(Some(existing)) => {
                debug!(
                    service = %service_id,
                    existing_tags = ?existing.tags,
                    existing_ports = ?existing.ports,
                    "definition already exists, leaving it alone"
                );
            }
            Ok(None) => {
                info!(service = %service_id, ?tags, "creating service definition");
                let ports = vec![format!("tcp:{listen_port}")];
                if let Err(e) = client.create_service(&service_id, tags, &ports).await {
                    error!(service = %service_id, error = %e, "failed to create service definition");
                    failed += 1;
                }
            }
            Err(e) => {
                error!(service = %service_id, error = %e, "failed to fetch service definition");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!(failed, "control-plane sync finished with failures (local advertisement unaffected)");
    }

    failed
}

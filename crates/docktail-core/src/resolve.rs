// ── Destination resolver ──
//
// Given a container snapshot and the direct flag, decide where the daemon
// should proxy traffic for one backend port. Pure with respect to I/O: the
// best-effort reachability probe is a separate helper the engine calls
// after resolution, so these branches stay unit-testable.

use std::time::Duration;

use docktail_docker::{ContainerRecord, NetworkMode};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::CoreError;

/// Where the daemon should proxy to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

const LOCALHOST: &str = "localhost";
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Resolve the `(host, port)` for one backend port.
///
/// Branch order is load-bearing: host networking short-circuits everything,
/// direct mode refuses `none` networking outright, and only non-direct
/// containers fall through to published-port lookup.
pub fn resolve_destination(
    record: &ContainerRecord,
    direct: bool,
    network: Option<&str>,
    container_port: u16,
) -> Result<Destination, CoreError> {
    if record.network_mode == NetworkMode::Host {
        info!(
            container = %record.name,
            port = container_port,
            "host networking, port is directly reachable on localhost"
        );
        return Ok(Destination {
            host: LOCALHOST.into(),
            port: container_port,
        });
    }

    if direct {
        if record.network_mode == NetworkMode::None {
            return Err(CoreError::Resolve {
                container: record.name.clone(),
                message: "network_mode is 'none'; direct mode cannot reach the container \
                          (set docktail.service.direct=false and publish the port)"
                    .into(),
            });
        }

        let (ip, network_name) = container_ip(record, network)?;
        info!(
            container = %record.name,
            container_ip = %ip,
            port = container_port,
            network = %network_name,
            "proxying directly to the container IP (no port publishing required)"
        );
        return Ok(Destination {
            host: ip,
            port: container_port,
        });
    }

    // Published-port mode.
    match record.published_tcp_port(container_port) {
        Some(raw) => {
            let host_port = raw.parse::<u16>().map_err(|_| CoreError::Resolve {
                container: record.name.clone(),
                message: format!("unparseable host port binding for {container_port}/tcp: {raw}"),
            })?;
            info!(
                container = %record.name,
                container_port,
                host_port,
                "direct mode disabled, using published port binding"
            );
            Ok(Destination {
                host: LOCALHOST.into(),
                port: host_port,
            })
        }
        None => Err(CoreError::Resolve {
            container: record.name.clone(),
            message: format!(
                "container port {container_port}/tcp is not published to the host \
                 (direct mode disabled via docktail.service.direct=false). \
                 Publish it with ports: [\"{container_port}:{container_port}\"] or remove \
                 the direct=false label. Published ports: {:?}",
                record.published_keys()
            ),
        }),
    }
}

/// Pick the container's IP address.
///
/// Selection order: the requested network by exact name, then by
/// `_<name>` suffix (compose prefixes project names onto network names),
/// then a network literally named `bridge`, then the first network with a
/// non-empty IP.
fn container_ip(
    record: &ContainerRecord,
    requested: Option<&str>,
) -> Result<(String, String), CoreError> {
    let networks = &record.networks;
    if networks.is_empty() {
        return Err(CoreError::Resolve {
            container: record.name.clone(),
            message: "container has no network settings".into(),
        });
    }

    if let Some(requested) = requested {
        if let Some(ip) = networks.get(requested) {
            if ip.is_empty() {
                return Err(no_ip_on(record, requested));
            }
            return Ok((ip.clone(), requested.to_owned()));
        }

        let suffix = format!("_{requested}");
        for (name, ip) in networks {
            if name.ends_with(&suffix) {
                if ip.is_empty() {
                    return Err(no_ip_on(record, name));
                }
                debug!(
                    container = %record.name,
                    requested = %requested,
                    matched = %name,
                    "matched network by compose-prefixed suffix"
                );
                return Ok((ip.clone(), name.clone()));
            }
        }

        return Err(CoreError::Resolve {
            container: record.name.clone(),
            message: format!(
                "not connected to network '{requested}' (available: {:?})",
                networks.keys().collect::<Vec<_>>()
            ),
        });
    }

    if let Some(ip) = networks.get("bridge").filter(|ip| !ip.is_empty()) {
        return Ok((ip.clone(), "bridge".into()));
    }

    for (name, ip) in networks {
        if !ip.is_empty() {
            debug!(
                container = %record.name,
                network = %name,
                ip = %ip,
                "using first available network for direct mode"
            );
            return Ok((ip.clone(), name.clone()));
        }
    }

    Err(CoreError::Resolve {
        container: record.name.clone(),
        message: "container has no IP address on any network".into(),
    })
}

fn no_ip_on(record: &ContainerRecord, network: &str) -> CoreError {
    CoreError::Resolve {
        container: record.name.clone(),
        message: format!("no IP address on network '{network}'"),
    }
}

/// Best-effort TCP dial to confirm the backend is up. Purely informational;
/// a refused or timed-out dial never aborts resolution (the container may
/// still be starting).
pub async fn probe_reachability(container: &str, host: &str, port: u16) {
    let address = format!("{host}:{port}");
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&address)).await {
        Ok(Ok(_)) => debug!(%container, %address, "backend reachable"),
        Ok(Err(e)) => debug!(%container, %address, error = %e, "backend not yet reachable"),
        Err(_) => debug!(%container, %address, "backend probe timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    fn record(
        mode: NetworkMode,
        networks: &[(&str, &str)],
        bindings: &[(&str, &str)],
    ) -> ContainerRecord {
        ContainerRecord {
            id: "0123456789abcdef".into(),
            name: "web-1".into(),
            labels: Default::default(),
            network_mode: mode,
            networks: networks
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            host_config_bindings: bindings
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
            network_settings_bindings: BTreeMap::new(),
        }
    }

    #[test]
    fn host_networking_targets_localhost_without_bindings() {
        let record = record(NetworkMode::Host, &[], &[]);
        let dest = resolve_destination(&record, true, None, 8080).unwrap();
        assert_eq!(dest, Destination { host: "localhost".into(), port: 8080 });
    }

    #[test]
    fn direct_mode_uses_requested_network() {
        let record = record(
            NetworkMode::Other("myproj_backend".into()),
            &[("myproj_backend", "172.20.0.5"), ("myproj_frontend", "172.21.0.5")],
            &[],
        );
        let dest = resolve_destination(&record, true, Some("myproj_backend"), 80).unwrap();
        assert_eq!(dest.host, "172.20.0.5");
        assert_eq!(dest.port, 80);
    }

    #[test]
    fn direct_mode_matches_compose_prefixed_network_by_suffix() {
        let record = record(
            NetworkMode::Other("bridge".into()),
            &[("myproj_backend", "172.20.0.5")],
            &[],
        );
        let dest = resolve_destination(&record, true, Some("backend"), 80).unwrap();
        assert_eq!(dest.host, "172.20.0.5");
    }

    #[test]
    fn direct_mode_prefers_bridge_then_first_with_ip() {
        let bridged = record(
            NetworkMode::Other("bridge".into()),
            &[("bridge", "172.17.0.2"), ("alpha", "172.18.0.2")],
            &[],
        );
        assert_eq!(
            resolve_destination(&bridged, true, None, 80).unwrap().host,
            "172.17.0.2"
        );

        let custom = record(
            NetworkMode::Other("custom".into()),
            &[("alpha", ""), ("beta", "172.19.0.9")],
            &[],
        );
        assert_eq!(
            resolve_destination(&custom, true, None, 80).unwrap().host,
            "172.19.0.9"
        );
    }

    #[test]
    fn direct_mode_unknown_network_lists_available() {
        let record = record(
            NetworkMode::Other("bridge".into()),
            &[("bridge", "172.17.0.2")],
            &[],
        );
        let err = resolve_destination(&record, true, Some("backend"), 80).unwrap_err();
        assert!(err.to_string().contains("not connected to network 'backend'"));
        assert!(err.to_string().contains("bridge"));
    }

    #[test]
    fn direct_mode_rejects_none_networking() {
        let record = record(NetworkMode::None, &[], &[]);
        let err = resolve_destination(&record, true, None, 80).unwrap_err();
        assert!(err.to_string().contains("network_mode is 'none'"));
    }

    #[test]
    fn published_mode_uses_host_binding() {
        let record = record(
            NetworkMode::Other("bridge".into()),
            &[("bridge", "172.17.0.2")],
            &[("80/tcp", "9080")],
        );
        let dest = resolve_destination(&record, false, None, 80).unwrap();
        assert_eq!(dest, Destination { host: "localhost".into(), port: 9080 });
    }

    #[test]
    fn published_mode_missing_binding_lists_present_ones() {
        let record = record(
            NetworkMode::Other("bridge".into()),
            &[("bridge", "172.17.0.2")],
            &[("443/tcp", "9443")],
        );
        let err = resolve_destination(&record, false, None, 80).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("80/tcp is not published"));
        assert!(message.contains("443/tcp"));
    }

}

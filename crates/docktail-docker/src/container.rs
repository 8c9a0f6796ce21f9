// ── Container snapshots ──
//
// Canonical view of a container's networking facts, extracted from the
// inspect response once per cycle. Collections use BTreeMap so iteration
// order (and therefore log output and fallback selection) is deterministic.

use std::collections::{BTreeMap, HashMap};

use bollard::models::ContainerInspectResponse;
use serde::{Deserialize, Serialize};

/// Networking mode a container was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMode {
    /// `network_mode: host` -- ports are directly reachable on localhost.
    Host,
    /// `network_mode: none` -- the container has no network stack.
    None,
    /// Bridge, a named compose network, `container:<id>`, etc.
    Other(String),
}

impl NetworkMode {
    fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("host") => Self::Host,
            Some("none") => Self::None,
            Some(other) => Self::Other(other.to_owned()),
            None => Self::Other(String::new()),
        }
    }
}

/// Snapshot of one running container: identity, labels, and the networking
/// facts destination resolution needs.
///
/// Built once per reconciliation cycle from a list + inspect pair and
/// discarded afterwards; nothing here is cached across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Full container id.
    pub id: String,
    /// Container name with the leading `/` stripped.
    pub name: String,
    /// Raw label map; interpreted by the label parser upstream.
    pub labels: HashMap<String, String>,
    /// Networking mode from the host config.
    pub network_mode: NetworkMode,
    /// Network name → IP address on that network (may be empty while the
    /// container is still attaching).
    pub networks: BTreeMap<String, String>,
    /// Port bindings declared in the host config, keyed `"<port>/<proto>"`.
    pub host_config_bindings: BTreeMap<String, Vec<String>>,
    /// Port bindings observed in network settings, same key shape. Some
    /// runtimes only populate one of the two maps.
    pub network_settings_bindings: BTreeMap<String, Vec<String>>,
}

impl ContainerRecord {
    /// Build a record from an inspect response plus the label map the
    /// listing returned for the same container.
    pub fn from_inspect(
        id: String,
        labels: HashMap<String, String>,
        inspect: &ContainerInspectResponse,
    ) -> Self {
        let name = inspect
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_else(|| short_id(&id).to_owned());

        let network_mode = NetworkMode::from_raw(
            inspect
                .host_config
                .as_ref()
                .and_then(|hc| hc.network_mode.as_deref()),
        );

        let networks = inspect
            .network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .map(|nets| {
                nets.iter()
                    .map(|(name, endpoint)| {
                        (name.clone(), endpoint.ip_address.clone().unwrap_or_default())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let host_config_bindings = flatten_port_map(
            inspect
                .host_config
                .as_ref()
                .and_then(|hc| hc.port_bindings.as_ref()),
        );

        let network_settings_bindings = flatten_port_map(
            inspect
                .network_settings
                .as_ref()
                .and_then(|ns| ns.ports.as_ref()),
        );

        Self {
            id,
            name,
            labels,
            network_mode,
            networks,
            host_config_bindings,
            network_settings_bindings,
        }
    }

    /// The 12-character short id used in logs and provenance.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Look up the first host port published for `<container_port>/tcp`.
    ///
    /// Host-config bindings are authoritative; network-settings bindings are
    /// the fallback. Returns `None` when the port is not published.
    pub fn published_tcp_port(&self, container_port: u16) -> Option<&str> {
        let key = format!("{container_port}/tcp");
        self.host_config_bindings
            .get(&key)
            .and_then(|ports| ports.first())
            .or_else(|| {
                self.network_settings_bindings
                    .get(&key)
                    .and_then(|ports| ports.first())
            })
            .map(String::as_str)
    }

    /// The binding keys declared in the host config, for error messages
    /// that list what *is* published.
    pub fn published_keys(&self) -> Vec<&str> {
        self.host_config_bindings.keys().map(String::as_str).collect()
    }
}

fn short_id(id: &str) -> &str {
    if id.len() > 12 { &id[..12] } else { id }
}

/// Collapse bollard's `PortMap` (`key → Option<Vec<PortBinding>>`) into a
/// deterministic `key → host ports` map, dropping bindings with no host port.
fn flatten_port_map(
    ports: Option<&HashMap<String, Option<Vec<bollard::models::PortBinding>>>>,
) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    let Some(ports) = ports else {
        return out;
    };
    for (key, bindings) in ports {
        let host_ports: Vec<String> = bindings
            .iter()
            .flatten()
            .filter_map(|b| b.host_port.clone())
            .collect();
        out.insert(key.clone(), host_ports);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use bollard::models::{HostConfig, NetworkSettings, PortBinding};

    fn binding(host_port: &str) -> PortBinding {
        PortBinding {
            host_ip: Some("0.0.0.0".into()),
            host_port: Some(host_port.into()),
        }
    }

    #[test]
    fn network_mode_parsing() {
        assert_eq!(NetworkMode::from_raw(Some("host")), NetworkMode::Host);
        assert_eq!(NetworkMode::from_raw(Some("none")), NetworkMode::None);
        assert_eq!(
            NetworkMode::from_raw(Some("bridge")),
            NetworkMode::Other("bridge".into())
        );
        assert_eq!(NetworkMode::from_raw(None), NetworkMode::Other(String::new()));
    }

    #[test]
    fn published_port_prefers_host_config() {
        let inspect = ContainerInspectResponse {
            name: Some("/web".into()),
            host_config: Some(HostConfig {
                network_mode: Some("bridge".into()),
                port_bindings: Some(HashMap::from([(
                    "80/tcp".to_string(),
                    Some(vec![binding("9080")]),
                )])),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                ports: Some(HashMap::from([(
                    "80/tcp".to_string(),
                    Some(vec![binding("9999")]),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        };

        let record =
            ContainerRecord::from_inspect("a".repeat(64), HashMap::new(), &inspect);
        assert_eq!(record.published_tcp_port(80), Some("9080"));
        assert_eq!(record.published_tcp_port(443), None);
        assert_eq!(record.short_id().len(), 12);
    }

    #[test]
    fn network_settings_bindings_are_the_fallback() {
        let inspect = ContainerInspectResponse {
            name: Some("/db".into()),
            network_settings: Some(NetworkSettings {
                ports: Some(HashMap::from([(
                    "5432/tcp".to_string(),
                    Some(vec![binding("15432")]),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        };

        let record = ContainerRecord::from_inspect("b".repeat(64), HashMap::new(), &inspect);
        assert_eq!(record.published_tcp_port(5432), Some("15432"));
        assert!(record.published_keys().is_empty());
    }
}

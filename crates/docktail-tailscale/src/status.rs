// ── Status JSON models ──
//
// Shapes for `tailscale serve status --json` and `tailscale funnel status
// --json`. Field names mirror the daemon's PascalCase output; everything is
// `#[serde(default)]` because the daemon omits empty sections entirely.
// Nested maps use BTreeMap so "first handler" selection is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::Error;

/// Service ids this system is permitted to mutate start with this prefix.
pub const MANAGED_PREFIX: &str = "svc:";

/// Returns `true` if the service id is in the managed namespace.
///
/// Anything else on the daemon was created by an operator or another tool
/// and must never appear in an issued command.
pub fn is_managed(service_id: &str) -> bool {
    service_id.starts_with(MANAGED_PREFIX)
}

/// Locate the first `{` and drop everything before it.
///
/// The CLI prints update notices and health warnings ahead of the JSON
/// document on the same stream.
pub fn strip_preamble(output: &str) -> &str {
    match output.find('{') {
        Some(idx) => &output[idx..],
        None => output,
    }
}

// ── Serve status ─────────────────────────────────────────────────────

/// Top-level document from `serve status --json`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServeStatus {
    #[serde(default, rename = "Services")]
    pub services: BTreeMap<String, ServiceBlock>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServiceBlock {
    /// Listener ports and what they speak, keyed by decimal port string.
    #[serde(default, rename = "TCP")]
    pub tcp: BTreeMap<String, TcpPortBlock>,
    /// Web handler config keyed `"<host>:<port>"`.
    #[serde(default, rename = "Web")]
    pub web: BTreeMap<String, WebBlock>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TcpPortBlock {
    #[serde(default, rename = "HTTP")]
    pub http: bool,
    #[serde(default, rename = "HTTPS")]
    pub https: bool,
    /// `"<host>:<port>"` destination for raw TCP forwarding. Web listeners
    /// leave this empty and carry their destination under `Web.Handlers`.
    #[serde(default, rename = "TCPForward")]
    pub tcp_forward: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebBlock {
    #[serde(default, rename = "Handlers")]
    pub handlers: BTreeMap<String, HandlerBlock>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct HandlerBlock {
    #[serde(default, rename = "Proxy")]
    pub proxy: String,
}

/// What the status document can say about a listener's protocol.
///
/// The daemon does not distinguish plain TCP from TLS-terminated TCP in its
/// status output, so desired-state comparison happens at this granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    Http,
    Https,
    Tcp,
}

impl WireProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
        }
    }
}

/// One listener observed on the daemon, keyed by `(service_id, port)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEndpoint {
    /// Full service id including the `svc:` prefix.
    pub service_id: String,
    pub port: u16,
    pub protocol: WireProtocol,
    /// Proxy destination URL from the first web handler on this port, or
    /// empty for raw TCP forwarding.
    pub destination: String,
}

impl ServeStatus {
    /// Parse a raw CLI output (preamble tolerated) into a status document.
    pub fn parse(output: &str) -> Result<Self, Error> {
        let body = strip_preamble(output);
        serde_json::from_str(body).map_err(|e| Error::StatusParse {
            message: e.to_string(),
            body: body.to_owned(),
        })
    }

    /// Extract the managed listeners, keyed by `(service_id, port)`.
    ///
    /// Services outside the managed namespace are dropped here, which is the
    /// single place the co-tenant safety invariant is enforced for reads.
    pub fn managed_endpoints(&self) -> BTreeMap<(String, u16), ObservedEndpoint> {
        let mut out = BTreeMap::new();

        for (service_id, block) in &self.services {
            if !is_managed(service_id) {
                continue;
            }

            for (port_str, tcp) in &block.tcp {
                let Ok(port) = port_str.parse::<u16>() else {
                    continue;
                };

                let protocol = if tcp.https {
                    WireProtocol::Https
                } else if tcp.http {
                    WireProtocol::Http
                } else {
                    WireProtocol::Tcp
                };

                let destination = if tcp.tcp_forward.is_empty() {
                    block
                        .web
                        .iter()
                        .find(|(host_port, _)| host_port.ends_with(&format!(":{port_str}")))
                        .and_then(|(_, web)| {
                            web.handlers.values().find(|h| !h.proxy.is_empty())
                        })
                        .map(|h| h.proxy.clone())
                        .unwrap_or_default()
                } else {
                    format!("tcp://{}", tcp.tcp_forward)
                };

                out.insert(
                    (service_id.clone(), port),
                    ObservedEndpoint {
                        service_id: service_id.clone(),
                        port,
                        protocol,
                        destination,
                    },
                );
            }
        }

        out
    }
}

// ── Funnel status ────────────────────────────────────────────────────

/// Top-level document from `funnel status --json`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FunnelStatus {
    /// `"<host>:<port>" → enabled` for every allowed funnel listener.
    #[serde(default, rename = "AllowFunnel")]
    pub allow_funnel: BTreeMap<String, bool>,
}

impl FunnelStatus {
    pub fn parse(output: &str) -> Result<Self, Error> {
        let body = strip_preamble(output);
        serde_json::from_str(body).map_err(|e| Error::StatusParse {
            message: e.to_string(),
            body: body.to_owned(),
        })
    }

    /// Public ports with funnel currently allowed.
    pub fn active_ports(&self) -> BTreeSet<u16> {
        self.allow_funnel
            .iter()
            .filter(|(_, enabled)| **enabled)
            .filter_map(|(host_port, _)| {
                host_port.rsplit_once(':').and_then(|(_, p)| p.parse().ok())
            })
            .collect()
    }
}

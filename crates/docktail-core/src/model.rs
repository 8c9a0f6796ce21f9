// ── Domain model ──
//
// The reconciler's unit of work is the endpoint declaration: one advertised
// listener derived from one container's labels. Declarations are ephemeral,
// rebuilt from scratch every cycle and discarded after the diff is applied.

use docktail_tailscale::{FunnelFlag, ServeFlag, WireProtocol, MANAGED_PREFIX};
use serde::{Deserialize, Serialize};

// ── Protocols ────────────────────────────────────────────────────────

/// Protocol the container itself speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendProtocol {
    Http,
    Https,
    /// HTTPS without certificate verification towards the backend.
    HttpsInsecure,
    Tcp,
    TlsTerminatedTcp,
}

impl BackendProtocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "https+insecure" => Some(Self::HttpsInsecure),
            "tcp" => Some(Self::Tcp),
            "tls-terminated-tcp" => Some(Self::TlsTerminatedTcp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::HttpsInsecure => "https+insecure",
            Self::Tcp => "tcp",
            Self::TlsTerminatedTcp => "tls-terminated-tcp",
        }
    }

    /// Raw TCP variants carry their protocol through to the listener when
    /// no listen protocol is declared.
    pub fn is_raw_tcp(self) -> bool {
        matches!(self, Self::Tcp | Self::TlsTerminatedTcp)
    }
}

/// Protocol the Tailscale listener exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenProtocol {
    Http,
    Https,
    Tcp,
    TlsTerminatedTcp,
}

impl ListenProtocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "tcp" => Some(Self::Tcp),
            "tls-terminated-tcp" => Some(Self::TlsTerminatedTcp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::TlsTerminatedTcp => "tls-terminated-tcp",
        }
    }

    /// The protocol class the daemon's status output can express.
    ///
    /// Status JSON cannot distinguish TLS-terminated TCP from plain TCP, so
    /// idempotence comparison happens at this granularity.
    pub fn wire(self) -> WireProtocol {
        match self {
            Self::Http => WireProtocol::Http,
            Self::Https => WireProtocol::Https,
            Self::Tcp | Self::TlsTerminatedTcp => WireProtocol::Tcp,
        }
    }

    /// The `tailscale serve` flag carrying this protocol.
    pub fn serve_flag(self) -> ServeFlag {
        match self {
            Self::Http => ServeFlag::Http,
            Self::Https => ServeFlag::Https,
            Self::Tcp | Self::TlsTerminatedTcp => ServeFlag::Tcp,
        }
    }
}

/// Protocol a funnel exposes publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunnelProtocol {
    Https,
    Tcp,
    TlsTerminatedTcp,
}

impl FunnelProtocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "https" => Some(Self::Https),
            "tcp" => Some(Self::Tcp),
            "tls-terminated-tcp" => Some(Self::TlsTerminatedTcp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::TlsTerminatedTcp => "tls-terminated-tcp",
        }
    }

    /// HTTPS funnels are restricted to the three TLS-capable public ports.
    pub fn restricts_public_port(self) -> bool {
        matches!(self, Self::Https)
    }

    pub fn funnel_flag(self) -> FunnelFlag {
        match self {
            Self::Https => FunnelFlag::Https,
            Self::Tcp => FunnelFlag::Tcp,
            Self::TlsTerminatedTcp => FunnelFlag::TlsTerminatedTcp,
        }
    }
}

// ── Parsed specs (pre-resolution) ────────────────────────────────────

/// One listener declaration before destination resolution: what the labels
/// said, minus where the traffic should actually go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub service_name: String,
    /// Port the backend listens on inside the container.
    pub container_port: u16,
    pub listen_port: u16,
    pub listen_protocol: ListenProtocol,
    pub backend_protocol: BackendProtocol,
}

/// A funnel declaration before destination resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelSpec {
    pub container_port: u16,
    pub public_port: u16,
    pub protocol: FunnelProtocol,
}

// ── Resolved declarations ────────────────────────────────────────────

/// A fully resolved endpoint declaration: the reconciler's unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Short name; the advertised id is `svc:<service_name>`.
    pub service_name: String,
    pub listen_port: u16,
    pub listen_protocol: ListenProtocol,
    pub backend_protocol: BackendProtocol,
    pub destination_host: String,
    pub destination_port: u16,
    pub tags: Vec<String>,
    /// Provenance for logs and conflict messages.
    pub container_id: String,
    pub container_name: String,
}

impl ServiceEndpoint {
    /// Fully qualified service id in the managed namespace.
    pub fn service_id(&self) -> String {
        format!("{MANAGED_PREFIX}{}", self.service_name)
    }

    /// Identity within one cycle: `(service_id, listen_port)`.
    pub fn key(&self) -> (String, u16) {
        (self.service_id(), self.listen_port)
    }

    /// Destination URL handed to `tailscale serve`.
    pub fn destination_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.backend_protocol.as_str(),
            self.destination_host,
            self.destination_port
        )
    }
}

/// A fully resolved funnel declaration. Never merged with [`ServiceEndpoint`];
/// funnel is an independent feature keyed by public port, not service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelEndpoint {
    pub container_port: u16,
    /// Port traffic is forwarded to (host port in published mode, container
    /// port otherwise).
    pub target_port: u16,
    pub public_port: u16,
    pub protocol: FunnelProtocol,
    pub destination_host: String,
    pub container_id: String,
    pub container_name: String,
}

impl FunnelEndpoint {
    /// Destination URL for the funnel command. HTTPS funnels terminate TLS
    /// on the node and speak plain HTTP to the target; TCP variants forward
    /// the byte stream.
    pub fn destination_url(&self) -> String {
        match self.protocol {
            FunnelProtocol::Https => {
                format!("http://{}:{}", self.destination_host, self.target_port)
            }
            FunnelProtocol::Tcp | FunnelProtocol::TlsTerminatedTcp => {
                format!("tcp://{}:{}", self.destination_host, self.target_port)
            }
        }
    }
}

// ── Label parser & defaults resolver ──
//
// Turns a container's label map into zero or more endpoint specs and at
// most one funnel spec. All validation lives here; destination resolution
// is a separate stage. A container that fails parsing is skipped for the
// cycle -- one bad label set never takes the whole cycle down.

use std::collections::HashMap;

use docktail_docker::ContainerRecord;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{
    BackendProtocol, EndpointSpec, FunnelProtocol, FunnelSpec, ListenProtocol,
};

// Label namespace. The prefix is fixed per deployment; these are the
// concrete names this build recognizes.
pub const LABEL_ENABLE: &str = "docktail.service.enable";
pub const LABEL_NAME: &str = "docktail.service.name";
pub const LABEL_PORT: &str = "docktail.service.port";
pub const LABEL_SERVICE_PORT: &str = "docktail.service.service-port";
pub const LABEL_SERVICE_PROTOCOL: &str = "docktail.service.service-protocol";
pub const LABEL_PROTOCOL: &str = "docktail.service.protocol";
pub const LABEL_DIRECT: &str = "docktail.service.direct";
pub const LABEL_NETWORK: &str = "docktail.service.network";
pub const LABEL_TAGS: &str = "docktail.tags";
pub const LABEL_FUNNEL_ENABLE: &str = "docktail.funnel.enable";
pub const LABEL_FUNNEL_PORT: &str = "docktail.funnel.port";
pub const LABEL_FUNNEL_PUBLIC_PORT: &str = "docktail.funnel.funnel-port";
pub const LABEL_FUNNEL_PROTOCOL: &str = "docktail.funnel.protocol";

const INDEXED_PREFIX: &str = "docktail.service.";

/// Public ports HTTPS funnels may use.
const FUNNEL_HTTPS_PORTS: [u16; 3] = [443, 8443, 10000];

/// Everything the labels said about one container, pre-resolution.
#[derive(Debug, Clone)]
pub struct ParsedContainer {
    /// Primary endpoint first, then indexed endpoints in ascending index
    /// order, already deduplicated on `(service_name, listen_port)`.
    pub endpoints: Vec<EndpointSpec>,
    pub funnel: Option<FunnelSpec>,
    /// `false` only when `docktail.service.direct=false`.
    pub direct: bool,
    /// Named network for direct-mode IP selection.
    pub network: Option<String>,
    pub tags: Vec<String>,
}

impl ParsedContainer {
    fn empty() -> Self {
        Self {
            endpoints: Vec::new(),
            funnel: None,
            direct: true,
            network: None,
            tags: Vec::new(),
        }
    }
}

/// Parse one container's labels.
///
/// Returns an error only for container-scoped validation failures (missing
/// required labels, invalid protocols, bad funnel config); the caller logs
/// it and skips the container. Indexed entries degrade softly: a bad index
/// is dropped with a warning and the rest proceed.
pub fn parse_container(
    record: &ContainerRecord,
    default_tags: &[String],
) -> Result<ParsedContainer, CoreError> {
    if record.labels.get(LABEL_ENABLE).map(String::as_str) != Some("true") {
        return Ok(ParsedContainer::empty());
    }

    let labels = &record.labels;
    let container = record.short_id().to_owned();

    let service_name = labels
        .get(LABEL_NAME)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CoreError::Labels {
            container: record.name.clone(),
            message: format!("missing required label: {LABEL_NAME}"),
        })?
        .clone();

    let container_port = required_port(labels, LABEL_PORT).map_err(|message| {
        CoreError::Labels {
            container: record.name.clone(),
            message,
        }
    })?;

    let (backend_protocol, listen_port, listen_protocol) = resolve_protocols(
        &container,
        container_port,
        labels.get(LABEL_SERVICE_PORT).map(String::as_str),
        labels.get(LABEL_SERVICE_PROTOCOL).map(String::as_str),
        labels.get(LABEL_PROTOCOL).map(String::as_str),
    )
    .map_err(|message| CoreError::Labels {
        container: record.name.clone(),
        message,
    })?;

    let primary = EndpointSpec {
        service_name,
        container_port,
        listen_port,
        listen_protocol,
        backend_protocol,
    };

    let mut endpoints = vec![primary.clone()];
    // Dedup key → index that claimed it (None = primary).
    let mut claimed: HashMap<(String, u16), Option<u32>> = HashMap::new();
    claimed.insert((primary.service_name.clone(), primary.listen_port), None);

    parse_indexed(record, &container, labels, &mut endpoints, &mut claimed);

    let funnel = parse_funnel(&container, labels).map_err(|message| CoreError::Labels {
        container: record.name.clone(),
        message,
    })?;

    let tags = parse_tags(&record.name, labels.get(LABEL_TAGS).map(String::as_str), default_tags);

    Ok(ParsedContainer {
        endpoints,
        funnel,
        direct: labels.get(LABEL_DIRECT).map(String::as_str) != Some("false"),
        network: labels.get(LABEL_NETWORK).cloned(),
        tags,
    })
}

// ── Smart-defaults matrix ────────────────────────────────────────────

/// Resolve `(backend_protocol, listen_port, listen_protocol)` from the
/// optional labels, applying defaults in declaration order.
fn resolve_protocols(
    container: &str,
    container_port: u16,
    listen_port_raw: Option<&str>,
    listen_protocol_raw: Option<&str>,
    backend_protocol_raw: Option<&str>,
) -> Result<(BackendProtocol, u16, ListenProtocol), String> {
    let backend = match backend_protocol_raw {
        Some(raw) => BackendProtocol::parse(raw).ok_or_else(|| {
            format!(
                "invalid protocol: {raw} (must be http, https, https+insecure, tcp, \
                 or tls-terminated-tcp)"
            )
        })?,
        None => {
            let defaulted = if container_port == 443 {
                BackendProtocol::Https
            } else {
                BackendProtocol::Http
            };
            debug!(
                %container,
                container_port,
                protocol = defaulted.as_str(),
                "backend protocol not specified, defaulted from container port"
            );
            defaulted
        }
    };

    let (listen_port, listen_protocol) = match (listen_port_raw, listen_protocol_raw) {
        (None, None) => {
            if backend.is_raw_tcp() {
                (80, tcp_listen_protocol(backend))
            } else {
                (80, ListenProtocol::Http)
            }
        }
        (None, Some(raw)) => {
            let protocol = parse_listen_protocol(raw)?;
            let port = if protocol == ListenProtocol::Https { 443 } else { 80 };
            (port, protocol)
        }
        (Some(raw_port), None) => {
            let port = parse_port(raw_port)
                .ok_or_else(|| format!("invalid {LABEL_SERVICE_PORT}: {raw_port}"))?;
            let protocol = if backend.is_raw_tcp() {
                tcp_listen_protocol(backend)
            } else {
                match port {
                    443 => ListenProtocol::Https,
                    _ => ListenProtocol::Http,
                }
            };
            (port, protocol)
        }
        (Some(raw_port), Some(raw_protocol)) => {
            let port = parse_port(raw_port)
                .ok_or_else(|| format!("invalid {LABEL_SERVICE_PORT}: {raw_port}"))?;
            (port, parse_listen_protocol(raw_protocol)?)
        }
    };

    Ok((backend, listen_port, listen_protocol))
}

fn tcp_listen_protocol(backend: BackendProtocol) -> ListenProtocol {
    match backend {
        BackendProtocol::TlsTerminatedTcp => ListenProtocol::TlsTerminatedTcp,
        _ => ListenProtocol::Tcp,
    }
}

fn parse_listen_protocol(raw: &str) -> Result<ListenProtocol, String> {
    ListenProtocol::parse(raw).ok_or_else(|| {
        format!("invalid service-protocol: {raw} (must be http, https, tcp, or tls-terminated-tcp)")
    })
}

// ── Indexed multi-port expansion ─────────────────────────────────────

/// Scan for `docktail.service.<N>.port` declarations and expand each valid
/// index into an additional endpoint spec.
fn parse_indexed(
    record: &ContainerRecord,
    container: &str,
    labels: &HashMap<String, String>,
    endpoints: &mut Vec<EndpointSpec>,
    claimed: &mut HashMap<(String, u16), Option<u32>>,
) {
    let mut indices: Vec<u32> = labels
        .keys()
        .filter_map(|key| indexed_port_label(key))
        .collect();
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() {
        return;
    }
    debug!(container = %record.name, indexed = indices.len(), "found indexed service declarations");

    for index in indices {
        let prefix = format!("{INDEXED_PREFIX}{index}.");

        let Some(service_name) = labels
            .get(&format!("{prefix}name"))
            .filter(|name| !name.is_empty())
        else {
            warn!(
                container = %record.name,
                index,
                "indexed service has no name label, skipping"
            );
            continue;
        };

        let port_raw = labels
            .get(&format!("{prefix}port"))
            .map(String::as_str)
            .unwrap_or_default();
        let Some(container_port) = parse_port(port_raw) else {
            warn!(
                container = %record.name,
                index,
                port = %port_raw,
                "indexed service has an invalid port, skipping"
            );
            continue;
        };

        let resolved = resolve_protocols(
            container,
            container_port,
            labels.get(&format!("{prefix}service-port")).map(String::as_str),
            labels
                .get(&format!("{prefix}service-protocol"))
                .map(String::as_str),
            labels.get(&format!("{prefix}protocol")).map(String::as_str),
        );
        let (backend_protocol, listen_port, listen_protocol) = match resolved {
            Ok(resolved) => resolved,
            Err(message) => {
                warn!(
                    container = %record.name,
                    service = %service_name,
                    index,
                    %message,
                    "failed to resolve protocols for indexed service, skipping"
                );
                continue;
            }
        };

        let key = (service_name.clone(), listen_port);
        if let Some(earlier) = claimed.get(&key) {
            let earlier = earlier.map_or_else(|| "primary".to_owned(), |n| format!("index {n}"));
            warn!(
                container = %record.name,
                service = %service_name,
                index,
                listen_port,
                conflicts_with = %earlier,
                "duplicate service name and listen port across indices, skipping"
            );
            continue;
        }
        claimed.insert(key, Some(index));

        endpoints.push(EndpointSpec {
            service_name: service_name.clone(),
            container_port,
            listen_port,
            listen_protocol,
            backend_protocol,
        });
    }
}

/// Match `docktail.service.<N>.port` exactly, returning `N`.
fn indexed_port_label(key: &str) -> Option<u32> {
    let rest = key.strip_prefix(INDEXED_PREFIX)?;
    let (index, field) = rest.split_once('.')?;
    if field != "port" || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

// ── Funnel ───────────────────────────────────────────────────────────

fn parse_funnel(
    container: &str,
    labels: &HashMap<String, String>,
) -> Result<Option<FunnelSpec>, String> {
    if labels.get(LABEL_FUNNEL_ENABLE).map(String::as_str) != Some("true") {
        return Ok(None);
    }

    let container_port = required_port(labels, LABEL_FUNNEL_PORT)?;

    let protocol = match labels.get(LABEL_FUNNEL_PROTOCOL) {
        Some(raw) => FunnelProtocol::parse(raw).ok_or_else(|| {
            format!("invalid funnel protocol: {raw} (must be https, tcp, or tls-terminated-tcp)")
        })?,
        None => {
            debug!(%container, "funnel protocol not specified, defaulting to https");
            FunnelProtocol::Https
        }
    };

    let public_port = match labels.get(LABEL_FUNNEL_PUBLIC_PORT) {
        Some(raw) => parse_port(raw)
            .ok_or_else(|| format!("invalid {LABEL_FUNNEL_PUBLIC_PORT}: {raw}"))?,
        None => {
            debug!(%container, "funnel public port not specified, defaulting to 443");
            443
        }
    };

    if protocol.restricts_public_port() && !FUNNEL_HTTPS_PORTS.contains(&public_port) {
        return Err(format!(
            "invalid funnel-port: {public_port} for HTTPS (must be 443, 8443, or 10000)"
        ));
    }

    Ok(Some(FunnelSpec {
        container_port,
        public_port,
        protocol,
    }))
}

// ── Tags ─────────────────────────────────────────────────────────────

/// Split the comma-separated tags label, trimming whitespace. Tokens
/// missing the `tag:` prefix are forwarded anyway -- the control plane is
/// the authority on tag validity -- but flagged so operators notice.
fn parse_tags(container_name: &str, raw: Option<&str>, default_tags: &[String]) -> Vec<String> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return default_tags.to_vec();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if !token.starts_with("tag:") {
                warn!(
                    container = %container_name,
                    tag = %token,
                    "tag should carry the 'tag:' prefix per Tailscale convention"
                );
            }
            token.to_owned()
        })
        .collect()
}

// ── Port parsing ─────────────────────────────────────────────────────

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port != 0)
}

fn required_port(labels: &HashMap<String, String>, label: &str) -> Result<u16, String> {
    let raw = labels
        .get(label)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| format!("missing required label: {label}"))?;
    parse_port(raw).ok_or_else(|| format!("invalid {label}: {raw} (expected 1-65535)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use docktail_docker::NetworkMode;

    fn record(labels: &[(&str, &str)]) -> ContainerRecord {
        ContainerRecord {
            id: "0123456789abcdef".into(),
            name: "web-1".into(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            network_mode: NetworkMode::Other("bridge".into()),
            networks: BTreeMap::new(),
            host_config_bindings: BTreeMap::new(),
            network_settings_bindings: BTreeMap::new(),
        }
    }

    fn parse(labels: &[(&str, &str)]) -> Result<ParsedContainer, CoreError> {
        parse_container(&record(labels), &["tag:container".to_string()])
    }

    /// Parse with the opt-in boilerplate (`enable`, `name=web`, `port=8080`)
    /// plus the given extra labels.
    fn parse_enabled(extra: &[(&str, &str)]) -> Result<ParsedContainer, CoreError> {
        let mut labels = vec![
            (LABEL_ENABLE, "true"),
            (LABEL_NAME, "web"),
            (LABEL_PORT, "8080"),
        ];
        labels.extend_from_slice(extra);
        parse(&labels)
    }

    // ── Opt-in and required labels ──────────────────────────────────

    #[test]
    fn not_enabled_yields_nothing() {
        let parsed = parse(&[(LABEL_NAME, "web"), (LABEL_PORT, "80")]).unwrap();
        assert!(parsed.endpoints.is_empty());
        assert!(parsed.funnel.is_none());
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = parse(&[(LABEL_ENABLE, "true"), (LABEL_PORT, "80")]).unwrap_err();
        assert!(err.to_string().contains(LABEL_NAME));
    }

    #[test]
    fn missing_port_is_an_error() {
        let err = parse(&[(LABEL_ENABLE, "true"), (LABEL_NAME, "web")]).unwrap_err();
        assert!(err.to_string().contains(LABEL_PORT));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = parse(&[
            (LABEL_ENABLE, "true"),
            (LABEL_NAME, "web"),
            (LABEL_PORT, "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("expected 1-65535"));
    }

    // ── Backend protocol defaults ───────────────────────────────────

    #[test]
    fn backend_defaults_to_https_for_port_443() {
        let parsed = parse(&[
            (LABEL_ENABLE, "true"),
            (LABEL_NAME, "web"),
            (LABEL_PORT, "443"),
        ])
        .unwrap();
        let ep = &parsed.endpoints[0];
        assert_eq!(ep.backend_protocol, BackendProtocol::Https);
        // listen side still defaults to (80, http)
        assert_eq!((ep.listen_port, ep.listen_protocol), (80, ListenProtocol::Http));
    }

    #[test]
    fn backend_defaults_to_http_otherwise() {
        let parsed = parse_enabled(&[]).unwrap();
        assert_eq!(parsed.endpoints[0].backend_protocol, BackendProtocol::Http);
    }

    #[test]
    fn invalid_backend_protocol_is_rejected() {
        let err = parse_enabled(&[(LABEL_PROTOCOL, "h2c")]).unwrap_err();
        assert!(err.to_string().contains("invalid protocol: h2c"));
    }

    // ── Listen defaults matrix ──────────────────────────────────────

    #[test]
    fn matrix_unset_unset_follows_backend() {
        let parsed = parse_enabled(&[(LABEL_PROTOCOL, "tcp")]).unwrap();
        let ep = &parsed.endpoints[0];
        assert_eq!((ep.listen_port, ep.listen_protocol), (80, ListenProtocol::Tcp));

        let parsed = parse_enabled(&[(LABEL_PROTOCOL, "tls-terminated-tcp")]).unwrap();
        let ep = &parsed.endpoints[0];
        assert_eq!(ep.listen_protocol, ListenProtocol::TlsTerminatedTcp);
        assert_eq!(ep.listen_port, 80);
    }

    #[test]
    fn matrix_protocol_only_picks_canonical_port() {
        let parsed = parse_enabled(&[(LABEL_SERVICE_PROTOCOL, "https")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_port, 443);

        let parsed = parse_enabled(&[(LABEL_SERVICE_PROTOCOL, "http")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_port, 80);

        let parsed = parse_enabled(&[(LABEL_SERVICE_PROTOCOL, "tcp")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_port, 80);
    }

    #[test]
    fn matrix_port_only_infers_protocol() {
        let parsed = parse_enabled(&[(LABEL_SERVICE_PORT, "443")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_protocol, ListenProtocol::Https);

        let parsed = parse_enabled(&[(LABEL_SERVICE_PORT, "80")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_protocol, ListenProtocol::Http);

        let parsed = parse_enabled(&[(LABEL_SERVICE_PORT, "8080")]).unwrap();
        assert_eq!(parsed.endpoints[0].listen_protocol, ListenProtocol::Http);
    }

    #[test]
    fn matrix_port_only_with_tcp_backend_keeps_tcp() {
        let parsed = parse_enabled(&[
            (LABEL_PROTOCOL, "tcp"),
            (LABEL_SERVICE_PORT, "9000"),
        ])
        .unwrap();
        let ep = &parsed.endpoints[0];
        assert_eq!((ep.listen_port, ep.listen_protocol), (9000, ListenProtocol::Tcp));
    }

    #[test]
    fn matrix_both_set_used_as_is() {
        let parsed = parse_enabled(&[
            (LABEL_SERVICE_PORT, "8443"),
            (LABEL_SERVICE_PROTOCOL, "https"),
        ])
        .unwrap();
        let ep = &parsed.endpoints[0];
        assert_eq!((ep.listen_port, ep.listen_protocol), (8443, ListenProtocol::Https));
    }

    #[test]
    fn https_insecure_is_not_a_listen_protocol() {
        let err = parse_enabled(&[(LABEL_SERVICE_PROTOCOL, "https+insecure")]).unwrap_err();
        assert!(err.to_string().contains("invalid service-protocol"));
    }

    // ── Indexed expansion ───────────────────────────────────────────

    #[test]
    fn indexed_entries_expand_in_numeric_order() {
        let parsed = parse_enabled(&[
            ("docktail.service.10.port", "5000"),
            ("docktail.service.10.name", "web-metrics"),
            ("docktail.service.2.port", "3000"),
            ("docktail.service.2.name", "web-admin"),
        ])
        .unwrap();

        let names: Vec<&str> = parsed
            .endpoints
            .iter()
            .map(|ep| ep.service_name.as_str())
            .collect();
        assert_eq!(names, ["web", "web-admin", "web-metrics"]);
        assert_eq!(parsed.endpoints[1].container_port, 3000);
        assert_eq!(parsed.endpoints[2].container_port, 5000);
    }

    #[test]
    fn indexed_entry_without_name_is_skipped() {
        let parsed = parse_enabled(&[("docktail.service.1.port", "3000")]).unwrap();
        assert_eq!(parsed.endpoints.len(), 1);
    }

    #[test]
    fn indexed_duplicate_of_primary_is_dropped() {
        // Primary resolves to (web, 80); the indexed entry resolves to the
        // same key and must lose.
        let parsed = parse_enabled(&[
            ("docktail.service.1.port", "3000"),
            ("docktail.service.1.name", "web"),
        ])
        .unwrap();
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].container_port, 8080);
    }

    #[test]
    fn indexed_entries_honor_their_own_labels() {
        let parsed = parse_enabled(&[
            ("docktail.service.1.port", "5432"),
            ("docktail.service.1.name", "web-db"),
            ("docktail.service.1.protocol", "tcp"),
            ("docktail.service.1.service-port", "5432"),
        ])
        .unwrap();
        let ep = &parsed.endpoints[1];
        assert_eq!(ep.backend_protocol, BackendProtocol::Tcp);
        assert_eq!((ep.listen_port, ep.listen_protocol), (5432, ListenProtocol::Tcp));
    }

    #[test]
    fn indexed_label_shape_is_exact() {
        assert_eq!(indexed_port_label("docktail.service.3.port"), Some(3));
        assert_eq!(indexed_port_label("docktail.service.03.port"), Some(3));
        assert_eq!(indexed_port_label("docktail.service.port"), None);
        assert_eq!(indexed_port_label("docktail.service.x.port"), None);
        assert_eq!(indexed_port_label("docktail.service.3.name"), None);
        assert_eq!(indexed_port_label("other.service.3.port"), None);
    }

    // ── Tags ────────────────────────────────────────────────────────

    #[test]
    fn tags_are_split_and_trimmed() {
        let parsed = parse_enabled(&[(LABEL_TAGS, "tag:web, tag:prod ,plain")]).unwrap();
        assert_eq!(parsed.tags, ["tag:web", "tag:prod", "plain"]);
    }

    #[test]
    fn absent_tags_fall_back_to_defaults() {
        let parsed = parse_enabled(&[]).unwrap();
        assert_eq!(parsed.tags, ["tag:container"]);
    }

    // ── Direct / network passthrough ────────────────────────────────

    #[test]
    fn direct_defaults_true_and_network_is_carried() {
        let parsed = parse_enabled(&[(LABEL_NETWORK, "backend")]).unwrap();
        assert!(parsed.direct);
        assert_eq!(parsed.network.as_deref(), Some("backend"));

        let parsed = parse_enabled(&[(LABEL_DIRECT, "false")]).unwrap();
        assert!(!parsed.direct);
    }

    // ── Funnel ──────────────────────────────────────────────────────

    #[test]
    fn funnel_defaults() {
        let parsed = parse_enabled(&[
            (LABEL_FUNNEL_ENABLE, "true"),
            (LABEL_FUNNEL_PORT, "8080"),
        ])
        .unwrap();
        let funnel = parsed.funnel.unwrap();
        assert_eq!(funnel.protocol, FunnelProtocol::Https);
        assert_eq!(funnel.public_port, 443);
        assert_eq!(funnel.container_port, 8080);
    }

    #[test]
    fn funnel_requires_its_port_label() {
        let err = parse_enabled(&[(LABEL_FUNNEL_ENABLE, "true")]).unwrap_err();
        assert!(err.to_string().contains(LABEL_FUNNEL_PORT));
    }

    #[test]
    fn https_funnel_public_port_is_restricted() {
        let err = parse_enabled(&[
            (LABEL_FUNNEL_ENABLE, "true"),
            (LABEL_FUNNEL_PORT, "8080"),
            (LABEL_FUNNEL_PUBLIC_PORT, "9999"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("must be 443, 8443, or 10000"));

        let parsed = parse_enabled(&[
            (LABEL_FUNNEL_ENABLE, "true"),
            (LABEL_FUNNEL_PORT, "8080"),
            (LABEL_FUNNEL_PUBLIC_PORT, "8443"),
        ])
        .unwrap();
        assert_eq!(parsed.funnel.unwrap().public_port, 8443);
    }

    #[test]
    fn tcp_funnel_may_use_any_public_port() {
        let parsed = parse_enabled(&[
            (LABEL_FUNNEL_ENABLE, "true"),
            (LABEL_FUNNEL_PORT, "5432"),
            (LABEL_FUNNEL_PROTOCOL, "tcp"),
            (LABEL_FUNNEL_PUBLIC_PORT, "9999"),
        ])
        .unwrap();
        let funnel = parsed.funnel.unwrap();
        assert_eq!(funnel.protocol, FunnelProtocol::Tcp);
        assert_eq!(funnel.public_port, 9999);
    }

    #[test]
    fn invalid_funnel_protocol_is_rejected() {
        let err = parse_enabled(&[
            (LABEL_FUNNEL_ENABLE, "true"),
            (LABEL_FUNNEL_PORT, "8080"),
            (LABEL_FUNNEL_PROTOCOL, "http"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("invalid funnel protocol"));
    }
}

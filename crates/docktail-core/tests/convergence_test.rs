// Cross-layer convergence tests: labels → declarations → diff, checked
// against a status document shaped like the daemon's `serve status --json`.

use std::collections::BTreeMap;

use docktail_core::labels::parse_container;
use docktail_core::model::ServiceEndpoint;
use docktail_core::reconciler::plan_services;
use docktail_core::resolve::resolve_destination;
use docktail_docker::{ContainerRecord, NetworkMode};
use docktail_tailscale::ServeStatus;

/// A published-port container as the runtime would report it.
fn container(name: &str, labels: &[(&str, &str)], bindings: &[(&str, &str)]) -> ContainerRecord {
    ContainerRecord {
        id: format!("{name:0<16}"),
        name: name.into(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        network_mode: NetworkMode::Other("bridge".into()),
        networks: BTreeMap::from([("bridge".to_string(), "172.17.0.2".to_string())]),
        host_config_bindings: bindings
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect(),
        network_settings_bindings: BTreeMap::new(),
    }
}

/// Parse + resolve one container into endpoint declarations.
fn declarations(record: &ContainerRecord) -> Vec<ServiceEndpoint> {
    let parsed = parse_container(record, &["tag:container".to_string()]).unwrap();
    parsed
        .endpoints
        .iter()
        .map(|spec| {
            let destination = resolve_destination(
                record,
                parsed.direct,
                parsed.network.as_deref(),
                spec.container_port,
            )
            .unwrap();
            ServiceEndpoint {
                service_name: spec.service_name.clone(),
                listen_port: spec.listen_port,
                listen_protocol: spec.listen_protocol,
                backend_protocol: spec.backend_protocol,
                destination_host: destination.host,
                destination_port: destination.port,
                tags: parsed.tags.clone(),
                container_id: record.short_id().to_owned(),
                container_name: record.name.clone(),
            }
        })
        .collect()
}

#[test]
fn protocol_variants_produce_the_expected_service_set() {
    // Three containers in published-port mode: plain http, https listener,
    // and a raw tcp database.
    let a = container(
        "svc-a",
        &[
            ("docktail.service.enable", "true"),
            ("docktail.service.name", "a"),
            ("docktail.service.port", "80"),
        ],
        &[("80/tcp", "9080")],
    );
    let b = container(
        "svc-b",
        &[
            ("docktail.service.enable", "true"),
            ("docktail.service.name", "b"),
            ("docktail.service.port", "80"),
            ("docktail.service.service-port", "443"),
            ("docktail.service.service-protocol", "https"),
            ("docktail.service.direct", "false"),
        ],
        &[("80/tcp", "9081")],
    );
    let c = container(
        "svc-c",
        &[
            ("docktail.service.enable", "true"),
            ("docktail.service.name", "c"),
            ("docktail.service.port", "5432"),
            ("docktail.service.protocol", "tcp"),
            ("docktail.service.service-port", "5432"),
            ("docktail.service.direct", "false"),
        ],
        &[("5432/tcp", "15432")],
    );

    let mut desired = Vec::new();
    for record in [&a, &b, &c] {
        desired.extend(declarations(record));
    }

    let keys: Vec<(String, u16)> = {
        let mut keys: Vec<_> = desired.iter().map(ServiceEndpoint::key).collect();
        keys.sort();
        keys
    };
    assert_eq!(
        keys,
        [
            ("svc:a".to_string(), 80),
            ("svc:b".to_string(), 443),
            ("svc:c".to_string(), 5432),
        ]
    );

    // b and c run in published-port mode, so they proxy to localhost; a is
    // in default direct mode and proxies to the container IP.
    let b_ep = desired.iter().find(|e| e.service_name == "b").unwrap();
    assert_eq!(b_ep.destination_url(), "http://localhost:9081");
    let c_ep = desired.iter().find(|e| e.service_name == "c").unwrap();
    assert_eq!(c_ep.destination_url(), "tcp://localhost:15432");
    let a_ep = desired.iter().find(|e| e.service_name == "a").unwrap();
    assert_eq!(a_ep.destination_url(), "http://172.17.0.2:80");

    // Against an empty daemon, everything is an add, nothing is withdrawn.
    let plan = plan_services(&desired, &BTreeMap::new());
    assert_eq!(plan.apply.len(), 3);
    assert!(plan.withdraw.is_empty());
}

#[test]
fn advertised_state_reconverges_to_zero_commands() {
    let record = container(
        "web-1",
        &[
            ("docktail.service.enable", "true"),
            ("docktail.service.name", "web"),
            ("docktail.service.port", "80"),
            ("docktail.service.service-port", "443"),
            ("docktail.service.direct", "false"),
        ],
        &[("80/tcp", "9080")],
    );
    let desired = declarations(&record);

    // The status document the daemon would produce once the serve command
    // from the first cycle has been applied.
    let status = ServeStatus::parse(
        r#"{
            "Services": {
                "svc:web": {
                    "TCP": {"443": {"HTTPS": true}},
                    "Web": {
                        "web.tails-scales.ts.net:443": {
                            "Handlers": {"/": {"Proxy": "http://localhost:9080"}}
                        }
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let plan = plan_services(&desired, &status.managed_endpoints());
    assert!(plan.is_noop(), "second cycle must issue zero commands");
    assert_eq!(plan.unchanged, 1);
}

#[test]
fn unmanaged_co_tenant_is_never_touched() {
    let record = container(
        "web-1",
        &[
            ("docktail.service.enable", "true"),
            ("docktail.service.name", "web"),
            ("docktail.service.port", "80"),
            ("docktail.service.direct", "false"),
        ],
        &[("80/tcp", "9080")],
    );
    let desired = declarations(&record);

    let status = ServeStatus::parse(
        r#"{
            "Services": {
                "externally-created": {
                    "TCP": {"8080": {"HTTP": true}},
                    "Web": {
                        "node.tails-scales.ts.net:8080": {
                            "Handlers": {"/": {"Proxy": "http://localhost:3000"}}
                        }
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let plan = plan_services(&desired, &status.managed_endpoints());
    // The co-tenant is invisible to the diff: one add for svc:web and no
    // withdrawal at all.
    assert_eq!(plan.apply.len(), 1);
    assert!(plan.withdraw.is_empty());
}

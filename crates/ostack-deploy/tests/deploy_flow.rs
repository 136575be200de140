//! End-to-end deployment against one mock server standing in for Keystone,
//! Nova, Glance and Neutron.

use ostack_core::uuid::{ImageId, NetworkId, PortId, RouterId, ServerId, SubnetId};
use ostack_deploy::{connect, DeployConfig, Plan, Provisioner};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const FIXTURE: &str = include_str!("fixtures/two_tier.toml");
const PUBLIC_SUBNET: &str = "369ab09c-411c-49a4-98f7-2b807a4b77df";

struct Net {
    name: &'static str,
    subnet: &'static str,
    cidr: &'static str,
    gateway: &'static str,
    id: NetworkId,
    subnet_id: SubnetId,
}

struct Vm {
    name: &'static str,
    key: &'static str,
    network: usize,
    id: ServerId,
}

struct Ids {
    networks: Vec<Net>,
    servers: Vec<Vm>,
    routers: Vec<(&'static str, RouterId)>,
}

impl Ids {
    fn new() -> Self {
        let net = |name, subnet, cidr, gateway| Net {
            name,
            subnet,
            cidr,
            gateway,
            id: NetworkId::new_v4(),
            subnet_id: SubnetId::new_v4(),
        };
        let vm = |name, key, network| Vm {
            name,
            key,
            network,
            id: ServerId::new_v4(),
        };
        Self {
            networks: vec![
                net("Net21", "subnet21", "192.168.3.0/24", "192.168.3.1"),
                net("Net22", "subnet22", "192.168.4.0/24", "192.168.4.1"),
            ],
            servers: vec![
                vm("Calc2", "calcKeyPair", 0),
                vm("Div2", "divKeyPair", 1),
                vm("Mul2", "mulKeyPair", 1),
                vm("Sub2", "subKeyPair", 1),
                vm("Sum2", "sumKeyPair", 1),
            ],
            routers: vec![("RT21", RouterId::new_v4()), ("RT22", RouterId::new_v4())],
        }
    }

    // RT21: public + subnet21, RT22: subnet21 + subnet22.
    fn interfaces(&self) -> Vec<(RouterId, SubnetId)> {
        let public = SubnetId::parse_str(PUBLIC_SUBNET).unwrap();
        let (rt21, rt22) = (self.routers[0].1, self.routers[1].1);
        let (s21, s22) = (self.networks[0].subnet_id, self.networks[1].subnet_id);
        vec![(rt21, public), (rt21, s21), (rt22, s21), (rt22, s22)]
    }
}

fn network_json(net: &Net) -> Value {
    json!({"id": net.id, "name": net.name, "status": "ACTIVE", "subnets": [net.subnet_id]})
}

fn subnet_json(net: &Net) -> Value {
    json!({
        "id": net.subnet_id,
        "name": net.subnet,
        "network_id": net.id,
        "cidr": net.cidr,
        "gateway_ip": net.gateway,
        "ip_version": 4
    })
}

fn config_for(server: &MockServer) -> DeployConfig {
    let mut config = DeployConfig::from_toml_str(FIXTURE)
        .unwrap()
        .with_credentials(None, Some(SecretString::from("s3cret")));
    config.auth.auth_url = format!("{}/identity/v3", server.uri());
    config
}

async fn mount_identity(server: &MockServer) {
    let endpoint = |kind: &str, suffix: &str| {
        json!({
            "type": kind,
            "endpoints": [
                {"interface": "public", "region_id": "OtherRegion", "url": "http://wrong.invalid"},
                {"interface": "public", "region_id": "RegionINSA", "url": format!("{}/{suffix}", server.uri())}
            ]
        })
    };
    Mock::given(method("POST"))
        .and(path("/identity/v3/auth/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "identity": {"password": {"user": {"name": "demo", "password": "s3cret", "domain": {"name": "insat"}}}},
                "scope": {"project": {"name": "5SDBD-Virt-B1-5", "domain": {"name": "insat"}}}
            }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", "token-21")
                .set_body_json(json!({
                    "token": {
                        "expires_at": "2099-01-01T00:00:00Z",
                        "methods": ["password"],
                        "user": {"id": "u1", "name": "demo"},
                        "project": {"id": "p1", "name": "5SDBD-Virt-B1-5"},
                        "catalog": [
                            endpoint("compute", "compute/v2.1"),
                            endpoint("network", "network"),
                            endpoint("image", "image")
                        ]
                    }
                })),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_lookups(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/image/v2/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"id": ImageId::new_v4(), "name": "alpine-node", "status": "active"}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/flavors/nano"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavor": {"id": "nano", "name": "nano", "vcpus": 1, "ram": 64, "disk": 1}
        })))
        .mount(server)
        .await;
}

fn position(requests: &[Request], verb: &str, prefix: &str) -> Vec<usize> {
    requests
        .iter()
        .enumerate()
        .filter(|(_, r)| r.method.as_str() == verb && r.url.path().starts_with(prefix))
        .map(|(index, _)| index)
        .collect()
}

#[tokio::test]
async fn fresh_deployment_creates_two_tier_topology() {
    let server = MockServer::start().await;
    let ids = Ids::new();
    mount_identity(&server).await;
    mount_lookups(&server).await;

    for net in &ids.networks {
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("name", net.name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("name", net.name))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"networks": [network_json(net)]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/network/v2.0/networks"))
            .and(body_partial_json(json!({"network": {"name": net.name}})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"network": network_json(net)})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/subnets"))
            .and(query_param("name", net.subnet))
            .and(query_param("network_id", net.id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subnets": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/network/v2.0/subnets"))
            .and(body_partial_json(json!({
                "subnet": {
                    "name": net.subnet,
                    "network_id": net.id,
                    "cidr": net.cidr,
                    "gateway_ip": net.gateway,
                    "ip_version": 4
                }
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"subnet": subnet_json(net)})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
        .expect(5)
        .mount(&server)
        .await;
    for vm in &ids.servers {
        let network = ids.networks[vm.network].id;
        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers"))
            .and(body_partial_json(json!({
                "server": {
                    "name": vm.name,
                    "flavorRef": "nano",
                    "key_name": vm.key,
                    "networks": [{"uuid": network}]
                }
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"server": {"id": vm.id}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/compute/v2.1/servers/{}", vm.id).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": vm.id, "name": vm.name, "status": "ACTIVE"}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    for (name, id) in &ids.routers {
        Mock::given(method("GET"))
            .and(path("/network/v2.0/routers"))
            .and(query_param("name", *name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"routers": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/network/v2.0/routers"))
            .and(body_partial_json(json!({"router": {"name": name}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "router": {"id": id, "name": name, "status": "ACTIVE"}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/network/v2.0/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ports": []})))
        .expect(4)
        .mount(&server)
        .await;
    for (router, subnet) in ids.interfaces() {
        Mock::given(method("PUT"))
            .and(path(format!("/network/v2.0/routers/{router}/add_router_interface").as_str()))
            .and(body_json(json!({"subnet_id": subnet})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": router,
                "subnet_id": subnet,
                "port_id": PortId::new_v4()
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = config_for(&server);
    let plan = Plan::from_topology(&config.topology);
    let cloud = connect(&config.auth, &config.client).await.unwrap();
    let report = Provisioner::new(&cloud, config.wait.options())
        .run(&plan)
        .await
        .unwrap();
    assert_eq!(report.created(), 15);
    assert_eq!(report.reused(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/identity/v3/auth/tokens");
    assert_eq!(position(&requests, "POST", "/identity").len(), 1);
    assert!(requests[1..].iter().all(|r| r
        .headers
        .get("X-Auth-Token")
        .is_some_and(|token| token == "token-21")));

    let server_creates = position(&requests, "POST", "/compute/v2.1/servers");
    let router_creates = position(&requests, "POST", "/network/v2.0/routers");
    let subnet_creates = position(&requests, "POST", "/network/v2.0/subnets");
    let attaches = position(&requests, "PUT", "/network/v2.0/routers");
    assert_eq!(server_creates.len(), 5);
    assert!(subnet_creates.iter().max() < server_creates.iter().min());
    assert!(server_creates.iter().max() < router_creates.iter().min());
    assert!(router_creates.iter().max() < attaches.iter().min());
}

#[tokio::test]
async fn second_run_reuses_existing_resources() {
    let server = MockServer::start().await;
    let ids = Ids::new();
    mount_identity(&server).await;

    for net in &ids.networks {
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("name", net.name))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"networks": [network_json(net)]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/subnets"))
            .and(query_param("name", net.subnet))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"subnets": [subnet_json(net)]})),
            )
            .mount(&server)
            .await;
    }

    let existing: Vec<Value> = ids
        .servers
        .iter()
        .map(|vm| json!({"id": vm.id, "name": vm.name, "status": "ACTIVE"}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": existing})))
        .expect(5)
        .mount(&server)
        .await;

    for (name, id) in &ids.routers {
        Mock::given(method("GET"))
            .and(path("/network/v2.0/routers"))
            .and(query_param("name", *name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "routers": [{"id": id, "name": name, "status": "ACTIVE"}]
            })))
            .mount(&server)
            .await;
    }
    // RT22 is a distributed router.
    let distributed = ids.routers[1].1;
    for (_, router) in &ids.routers {
        let owner_kind = if *router == distributed {
            "network:router_interface_distributed"
        } else {
            "network:router_interface"
        };
        let ports: Vec<Value> = ids
            .interfaces()
            .into_iter()
            .filter(|(owner, _)| owner == router)
            .map(|(owner, subnet)| {
                json!({
                    "id": PortId::new_v4(),
                    "network_id": NetworkId::new_v4(),
                    "device_id": owner.to_string(),
                    "device_owner": owner_kind,
                    "fixed_ips": [{"subnet_id": subnet, "ip_address": "192.168.3.1"}]
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/network/v2.0/ports"))
            .and(query_param("device_id", router.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ports": ports})))
            .mount(&server)
            .await;
    }

    for collection in [
        "/compute/v2.1/servers",
        "/network/v2.0/networks",
        "/network/v2.0/subnets",
        "/network/v2.0/routers",
    ] {
        Mock::given(method("POST"))
            .and(path(collection))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
    }

    let config = config_for(&server);
    let cloud = connect(&config.auth, &config.client).await.unwrap();
    let report = Provisioner::new(&cloud, config.wait.options())
        .run(&Plan::from_topology(&config.topology))
        .await
        .unwrap();
    assert_eq!(report.reused(), 15);
    assert_eq!(report.created(), 0);

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.method.as_str() == "GET" || r.url.path().starts_with("/identity")));
}

#[tokio::test]
async fn failed_server_aborts_before_routers() {
    let server = MockServer::start().await;
    let ids = Ids::new();
    mount_identity(&server).await;
    mount_lookups(&server).await;

    for net in &ids.networks {
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("name", net.name))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"networks": [network_json(net)]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/subnets"))
            .and(query_param("name", net.subnet))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"subnets": [subnet_json(net)]})),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
        .mount(&server)
        .await;

    let calc = &ids.servers[0];
    Mock::given(method("POST"))
        .and(path("/compute/v2.1/servers"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"server": {"id": calc.id}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/compute/v2.1/servers/{}", calc.id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server": {
                "id": calc.id,
                "name": calc.name,
                "status": "ERROR",
                "fault": {"code": 500, "message": "No valid host was found."}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/routers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"routers": []})))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let cloud = connect(&config.auth, &config.client).await.unwrap();
    let err = Provisioner::new(&cloud, config.wait.options())
        .run(&Plan::from_topology(&config.topology))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 4);
    let message = err.to_string();
    assert!(message.contains("server Calc2"));
    assert!(message.contains("No valid host was found."));
}

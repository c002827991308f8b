//! HTTP control-plane client tests against a mock server.

use std::collections::BTreeMap;
use std::time::Duration;

use bundle_deploy::api::{
    AddMachineArgs, ControlPlaneClient, EntityType, HttpControlPlaneClient, ServiceDeployArgs,
};
use bundle_deploy::bundle::ContainerType;
use bundle_deploy::charm::CharmUrl;
use bundle_deploy::error::ControlPlaneError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpControlPlaneClient {
    HttpControlPlaneClient::new(&server.uri(), "secret")
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
}

fn already_exists() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": {"code": "already exists", "message": "entity already exists"}
    }))
}

#[tokio::test]
async fn test_add_charm_sends_token_and_returns_resolved_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Charms/AddCharm"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({"url": "cs:trusty/mysql"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"url": "cs:trusty/mysql-10"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = client(&server)
        .add_charm(&CharmUrl::parse("cs:trusty/mysql").unwrap())
        .await
        .unwrap();

    assert_eq!(url.to_string(), "cs:trusty/mysql-10");
    assert_eq!(url.revision(), Some(10));
}

#[tokio::test]
async fn test_deploy_existing_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Service/Deploy"))
        .and(body_json(json!({
            "charmUrl": "cs:trusty/wordpress-3",
            "serviceName": "wordpress",
            "numUnits": 0,
            "configYaml": "",
            "constraints": "mem=2G",
            "toMachineSpec": ""
        })))
        .respond_with(already_exists())
        .expect(1)
        .mount(&server)
        .await;

    let args =
        ServiceDeployArgs::new("wordpress", "cs:trusty/wordpress-3").with_constraints("mem=2G");
    let err = client(&server).deploy_service(&args).await.unwrap_err();

    assert_eq!(
        err,
        ControlPlaneError::ServiceAlreadyExists {
            service: String::from("wordpress")
        }
    );
}

#[tokio::test]
async fn test_existing_relation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Service/AddRelation"))
        .and(body_json(json!({"endpoints": ["wordpress:db", "mysql:db"]})))
        .respond_with(already_exists())
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .add_relation("wordpress:db", "mysql:db")
        .await
        .unwrap_err();

    assert!(matches!(err, ControlPlaneError::RelationAlreadyExists { .. }));
}

#[tokio::test]
async fn test_already_exists_elsewhere_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Annotations/Set"))
        .respond_with(already_exists())
        .mount(&server)
        .await;

    let err = client(&server)
        .set_annotations(EntityType::Service, "wordpress", &BTreeMap::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ControlPlaneError::ApiRequestFailed { code: Some(code), .. } if code == "already exists"
    ));
}

#[tokio::test]
async fn test_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).list_machines().await.unwrap_err();

    assert!(matches!(err, ControlPlaneError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_not_found_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Service/GetCharmURL"))
        .and(body_json(json!({"serviceName": "ghost"})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "not found", "message": "service \"ghost\""}
        })))
        .mount(&server)
        .await;

    let err = client(&server).service_charm_url("ghost").await.unwrap_err();

    assert!(matches!(err, ControlPlaneError::NotFound { .. }));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Service/SetCharm"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Service/SetCharm"))
        .and(body_json(json!({
            "serviceName": "wordpress",
            "charmUrl": "cs:trusty/wordpress-5",
            "forceUnits": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_service_charm(
            "wordpress",
            &CharmUrl::parse("cs:trusty/wordpress-5").unwrap(),
            false,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rate_limit_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .set_service_config("wordpress", "wordpress: {}\n")
        .await
        .unwrap_err();

    assert_eq!(err, ControlPlaneError::RateLimited { retry_after_secs: 7 });
}

#[tokio::test]
async fn test_machines() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Machine/AddMachine"))
        .and(body_json(json!({
            "series": "trusty",
            "constraints": "",
            "containerType": "lxc",
            "parentId": "1"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"machine": "1/lxc/0"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Machine/List"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"machines": [
                {"id": "0", "series": "trusty", "controller": true},
                {"id": "1/lxc/0", "series": "trusty", "containerType": "lxc", "parentId": "1"}
            ]}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let args = AddMachineArgs {
        series: String::from("trusty"),
        container_type: Some(ContainerType::Lxc),
        parent_id: Some(String::from("1")),
        ..AddMachineArgs::default()
    };

    assert_eq!(client.add_machine(&args).await.unwrap(), "1/lxc/0");

    let machines = client.list_machines().await.unwrap();
    assert_eq!(machines.len(), 2);
    assert!(machines[0].controller);
    assert!(machines[1].satisfies(&args));
}

#[tokio::test]
async fn test_annotation_tags() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Annotations/Set"))
        .and(body_json(json!({
            "tag": "machine-1-lxc-0",
            "annotations": {"rack": "a"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut annotations = BTreeMap::new();
    annotations.insert(String::from("rack"), String::from("a"));

    client(&server)
        .set_annotations(EntityType::Machine, "1/lxc/0", &annotations)
        .await
        .unwrap();
}

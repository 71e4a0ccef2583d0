//! Aggregation pipeline tests: containers in, merged ingress tree out.

mod common;

use common::{container, MockEngine};
use docker_recon::inventory::PathStat;
use docker_recon::traefik::traefik_dump;
use serde_json::json;

#[tokio::test]
async fn dump_is_empty_without_ingress_data() {
    let engine = MockEngine::new(vec![
        container(
            "proj1_ctn1",
            "alpine:3",
            &[
                ("key2", "value2"),
                ("image-label1", "image-value1"),
                ("image-label2", "container-value"),
            ],
            &[],
            &[],
            None,
        ),
        container(
            "proj1_ctn2",
            "alpine:3",
            &[
                ("traefik.enable", "false"),
                ("traefik.http.services.hello", "blabla"),
            ],
            &[],
            &[],
            None,
        ),
    ]);
    let config = traefik_dump(&engine).await.unwrap();
    assert_eq!(config.to_value().unwrap(), json!({}));
}

#[tokio::test]
async fn dump_builds_routers_and_services_from_labels() {
    let engine = MockEngine::new(vec![
        container(
            "proj1_ctn1",
            "alpine:3",
            &[
                ("label123", "value123"),
                ("traefik.enable", "true"),
                ("traefik.http.routers.ctn1.entrypoints", "web"),
                ("traefik.http.routers.ctn1.middlewares", "mdl"),
                ("traefik.http.routers.ctn1.rule", "Path(`/`)"),
                ("traefik.http.services.ctn1.loadbalancer.server.port", "8080"),
            ],
            &[],
            &[],
            Some("1.2.3.4"),
        ),
        container(
            "proj1_ctn2",
            "alpine:3",
            &[
                ("label234", "value234"),
                ("traefik.enable", "true"),
                ("traefik.http.routers.ctn2.entrypoints", "web"),
                ("traefik.http.routers.ctn2.middlewares", "mdl"),
                ("traefik.http.routers.ctn2.rule", "PathPrefix(`/ctn2`)"),
                ("traefik.http.services.ctn2.loadbalancer.server.port", "9999"),
                ("traefik.api", "true"),
            ],
            &[],
            &[],
            None,
        ),
    ]);
    let config = traefik_dump(&engine).await.unwrap();
    let expected = json!({
        "api": {},
        "http": {
            "routers": {
                "ctn1": {
                    "entrypoints": ["web"],
                    "rule": "Path(`/`)",
                    "middlewares": ["mdl"],
                },
                "ctn2": {
                    "entrypoints": ["web"],
                    "rule": "PathPrefix(`/ctn2`)",
                    "middlewares": ["mdl"],
                },
            },
            "services": {
                "ctn1": {
                    "loadbalancer": {"server": {
                        "host": "proj1_ctn1", "ipaddress": "1.2.3.4", "port": 8080,
                    }},
                },
                "ctn2": {
                    "loadbalancer": {"server": {
                        "host": "proj1_ctn2", "ipaddress": "", "port": 9999,
                    }},
                },
            },
        },
    });
    assert_eq!(config.to_value().unwrap(), expected);
}

#[tokio::test]
async fn dump_merges_args_and_envs_without_duplication() {
    let engine = MockEngine::new(vec![container(
        "proxy",
        "traefik:v3",
        &[],
        &["--providers.docker.exposedbydefault=false"],
        &["TRAEFIK_PROVIDERS_DOCKER_EXPOSEDBYDEFAULT=false"],
        None,
    )]);
    let config = traefik_dump(&engine).await.unwrap();
    assert_eq!(
        config.to_value().unwrap(),
        json!({"providers": {"docker": {"exposedbydefault": "false"}}})
    );
}

#[tokio::test]
async fn dump_loads_mounted_provider_file() {
    let yaml = b"api:\n  insecure: {}\nentrypoints:\n  web:\n    address: \":80\"\n";
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(yaml.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "traefik.yml", &yaml[..])
        .unwrap();
    let archive = builder.into_inner().unwrap();

    let engine = MockEngine::new(vec![container(
        "proxy",
        "traefik:v3",
        &[],
        &["--providers.file.filename=/conf/traefik.yml"],
        &[],
        None,
    )])
    .with_archive(
        "proxy",
        "/conf/traefik.yml",
        archive,
        PathStat::regular(0o644),
    );

    let config = traefik_dump(&engine).await.unwrap();
    assert_eq!(
        config.to_value().unwrap(),
        json!({
            "providers": {"file": {"filename": "/conf/traefik.yml"}},
            "api": {"insecure": {}},
            "entrypoints": {"web": {"address": ":80"}},
        })
    );
}

#[tokio::test]
async fn labels_take_precedence_over_sidecar_sources() {
    let engine = MockEngine::new(vec![
        container(
            "proxy",
            "traefik:v3",
            &[],
            &["--log.level=INFO"],
            &["TRAEFIK_LOG_LEVEL=WARN"],
            None,
        ),
        container(
            "app",
            "alpine:3",
            &[("traefik.enable", "true"), ("traefik.log.level", "DEBUG")],
            &[],
            &[],
            None,
        ),
    ]);
    let config = traefik_dump(&engine).await.unwrap();
    // file < envs < args < labels
    assert_eq!(
        config.to_value().unwrap(),
        json!({"log": {"level": "DEBUG"}})
    );
}

#[tokio::test]
async fn sidecar_failure_skips_container_but_continues() {
    // provider file declared but no archive available: the sidecar is
    // skipped, the labelled workload still aggregates
    let engine = MockEngine::new(vec![
        container(
            "proxy",
            "traefik:v3",
            &[],
            &["--providers.file.filename=/missing.yml"],
            &[],
            None,
        ),
        container(
            "app",
            "alpine:3",
            &[("traefik.enable", "true"), ("traefik.api", "true")],
            &[],
            &[],
            None,
        ),
    ]);
    let config = traefik_dump(&engine).await.unwrap();
    assert_eq!(config.to_value().unwrap(), json!({"api": {}}));
}

//! Compose reconstruction tests against engine-shaped inspect documents.

mod common;

use common::MockEngine;
use docker_recon::compose::{compose, ComposeOptions};
use docker_recon::ContainerSnapshot;
use serde_json::json;

fn scenario_snapshot() -> ContainerSnapshot {
    let inspect = json!({
        "Id": "id-name2",
        "Name": "/name2",
        "Image": "sha256:img2",
        "Args": [],
        "Config": {
            "Image": "docker-image:latest",
            "Labels": {
                "com.docker.compose.project": "proj1",
                "com.docker.compose.project.working_dir": "/home/dir",
            },
            "Env": ["env2=value2=ext2"],
        },
        "HostConfig": {
            "Binds": ["/home/dir/data:/data:rw"],
            "Mounts": [{
                "Type": "volume",
                "Source": "proj1_db",
                "Target": "/db",
            }],
            "PortBindings": {
                "8080/tcp": [{"HostIp": "", "HostPort": "8080"}],
                "443/udp": [{"HostIp": "", "HostPort": "443"}],
                "8888/tcp": [{"HostIp": "127.0.0.1", "HostPort": "8888"}],
            },
            "RestartPolicy": {"Name": "always"},
        },
        "NetworkSettings": {"Networks": {}},
    });
    let image = json!({
        "Id": "sha256:img2",
        "RepoTags": ["docker-image:latest"],
        "Config": {
            "Env": ["env2=value2"],
        },
    });
    ContainerSnapshot::from_inspect(&inspect, Some(&image))
}

#[tokio::test]
async fn reconstructs_service_with_diffs_against_image() {
    let engine = MockEngine::new(vec![scenario_snapshot()]);
    let options = ComposeOptions {
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &options).await.unwrap();
    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(
        value,
        json!({
            "services": {
                "name2": {
                    "image": "docker-image:latest",
                    "container_name": "name2",
                    "volumes": ["./data:/data", "db:/db"],
                    "ports": [
                        "8080:8080",
                        {"target": 443, "published": "443", "protocol": "udp", "mode": "host"},
                        "127.0.0.1:8888:8888",
                    ],
                    "restart": "always",
                    "environment": {"env2": "value2=ext2"},
                },
            },
            "volumes": {"db": {}},
        })
    );
}

#[tokio::test]
async fn skips_unlabelled_containers_unless_all() {
    let inspect = json!({
        "Id": "id-plain",
        "Name": "/plain",
        "Image": "sha256:x",
        "Config": {"Image": "alpine:3", "Labels": {"key1": "value1"}},
        "HostConfig": {},
        "NetworkSettings": {"Networks": {}},
    });
    let snapshot = ContainerSnapshot::from_inspect(&inspect, None);
    let engine = MockEngine::new(vec![snapshot]);

    let document = compose(&engine, &ComposeOptions::default()).await.unwrap();
    assert!(document.services.is_empty());

    let all = ComposeOptions {
        all: true,
        ..Default::default()
    };
    let document = compose(&engine, &all).await.unwrap();
    assert_eq!(document.services.len(), 1);
    assert_eq!(document.services["plain"].labels["key1"], "value1");
}

#[tokio::test]
async fn project_glob_filters_containers() {
    let engine = MockEngine::new(vec![scenario_snapshot()]);
    let matching = ComposeOptions {
        project: "proj*".to_string(),
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &matching).await.unwrap();
    assert_eq!(document.services.len(), 1);

    let other = ComposeOptions {
        project: "other".to_string(),
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &other).await.unwrap();
    assert!(document.services.is_empty());
}

#[tokio::test]
async fn image_volume_binds_are_skipped() {
    let inspect = json!({
        "Id": "id-v",
        "Name": "/v",
        "Image": "sha256:v",
        "Config": {
            "Image": "db:1",
            "Labels": {"com.docker.compose.project": "p"},
        },
        "HostConfig": {
            "Binds": ["/host/cache:/var/cache:ro", "/host/data:/data"],
        },
        "NetworkSettings": {"Networks": {}},
    });
    let image = json!({
        "Id": "sha256:v",
        "RepoTags": ["db:1"],
        "Config": {"Volumes": {"/var/cache": {}}},
    });
    let engine = MockEngine::new(vec![ContainerSnapshot::from_inspect(&inspect, Some(&image))]);
    let options = ComposeOptions {
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &options).await.unwrap();
    assert_eq!(
        document.services["v"].volumes,
        vec!["/host/data:/data".to_string()]
    );
}

#[tokio::test]
async fn named_network_is_declared_and_attached() {
    let inspect = json!({
        "Id": "id-n",
        "Name": "/n",
        "Image": "sha256:n",
        "Config": {
            "Image": "app:1",
            "Labels": {"com.docker.compose.project": "p"},
        },
        "HostConfig": {"NetworkMode": "shared_net"},
        "NetworkSettings": {"Networks": {}},
    });
    let engine = MockEngine::new(vec![ContainerSnapshot::from_inspect(&inspect, None)]);
    let options = ComposeOptions {
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &options).await.unwrap();
    assert_eq!(document.services["n"].networks, vec!["shared_net".to_string()]);
    assert!(document.networks.contains_key("shared_net"));
    assert_eq!(document.services["n"].network_mode, None);

    // the implicit project network stays silent
    let inspect = json!({
        "Id": "id-n2",
        "Name": "/n2",
        "Image": "sha256:n2",
        "Config": {
            "Image": "app:1",
            "Labels": {"com.docker.compose.project": "p"},
        },
        "HostConfig": {"NetworkMode": "p_default"},
        "NetworkSettings": {"Networks": {}},
    });
    let engine = MockEngine::new(vec![ContainerSnapshot::from_inspect(&inspect, None)]);
    let document = compose(&engine, &options).await.unwrap();
    assert!(document.networks.is_empty());
    assert!(document.services["n2"].networks.is_empty());
}

#[tokio::test]
async fn resource_caps_and_command_diffs_copy_through() {
    let inspect = json!({
        "Id": "id-r",
        "Name": "/r",
        "Image": "sha256:r",
        "Config": {
            "Image": "app:1",
            "Labels": {
                "com.docker.compose.project": "p",
                "com.docker.compose.depends_on": "db",
            },
            "Cmd": ["serve", "--fast"],
        },
        "HostConfig": {
            "CpuShares": 512,
            "CpuPeriod": 0,
            "CapAdd": ["NET_ADMIN"],
            "Privileged": true,
        },
        "NetworkSettings": {"Networks": {}},
    });
    let image = json!({
        "Id": "sha256:r",
        "RepoTags": ["app:1"],
        "Config": {"Cmd": ["serve"]},
    });
    let engine = MockEngine::new(vec![ContainerSnapshot::from_inspect(&inspect, Some(&image))]);
    let options = ComposeOptions {
        volume: false,
        ..Default::default()
    };
    let document = compose(&engine, &options).await.unwrap();
    let service = serde_json::to_value(&document.services["r"]).unwrap();
    assert_eq!(service["cpu_shares"], json!(512));
    assert_eq!(service.get("cpu_period"), None);
    assert_eq!(service["cap_add"], json!(["NET_ADMIN"]));
    assert_eq!(service["privileged"], json!(true));
    assert_eq!(service["depends_on"], json!("db"));
    assert_eq!(service["command"], json!(["serve", "--fast"]));
    assert_eq!(service.get("entrypoint"), None);
}

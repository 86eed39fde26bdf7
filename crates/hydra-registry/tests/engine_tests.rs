//! End-to-end engine tests over the in-memory backend

use hydra_registry::{Error, NodeFilter};
use std::path::Path;
use std::time::Duration;

mod common;
use common::{RecordingTransport, memory_registry, seed_node};

#[smol_potat::test]
async fn test_list_nodes_annotates_elapsed() {
    let (registry, backend) = memory_registry();
    seed_node(&backend, "user-svc", "a1", 30);
    seed_node(&backend, "user-svc", "a2", 2);
    seed_node(&backend, "auth-svc", "b1", 1);
    backend.set_hash_field("hydra:service:nodes", "junk", "{not json");

    let all = registry.list_nodes(&NodeFilter::all()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].service_name, "auth-svc");

    let a1 = all.iter().find(|n| n.instance_id == "a1").unwrap();
    let elapsed = a1.elapsed.unwrap();
    assert!((29..=31).contains(&elapsed), "elapsed was {}", elapsed);

    let users = registry
        .list_nodes(&NodeFilter::all().service("user-svc"))
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let active = registry
        .list_nodes(
            &NodeFilter::all()
                .service("user-svc")
                .active_within(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].instance_id, "a2");
}

#[smol_potat::test]
async fn test_prune_respects_threshold() {
    let (registry, backend) = memory_registry();
    seed_node(&backend, "user-svc", "a1", 30);

    let removed = registry
        .prune_stale_nodes(Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(registry.list_nodes(&NodeFilter::all()).await.unwrap().len(), 1);

    let removed = registry
        .prune_stale_nodes(Duration::from_secs(20))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(registry.list_nodes(&NodeFilter::all()).await.unwrap().is_empty());
}

#[smol_potat::test]
async fn test_prune_batches_removal() {
    let (registry, backend) = memory_registry();
    seed_node(&backend, "user-svc", "old1", 300);
    seed_node(&backend, "user-svc", "old2", 400);
    seed_node(&backend, "user-svc", "fresh", 1);

    let before = backend.operations();
    let removed = registry
        .prune_stale_nodes(Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    // one HGETALL, one HDEL
    assert_eq!(backend.operations() - before, 2);

    let left = registry.list_nodes(&NodeFilter::all()).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].instance_id, "fresh");
}

#[smol_potat::test]
async fn test_huge_thresholds_keep_fresh_nodes() {
    let (registry, backend) = memory_registry();
    seed_node(&backend, "user-svc", "a1", 0);

    let forever = Duration::from_secs(u64::MAX);
    assert_eq!(registry.prune_stale_nodes(forever).await.unwrap(), 0);

    let active = registry
        .list_nodes(&NodeFilter::all().active_within(forever))
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[smol_potat::test]
async fn test_list_routes_omits_empty_services() {
    let (registry, backend) = memory_registry();
    backend.add_set_members(
        "hydra:service:user-svc:service:routes",
        &["[get]/v1/users", "[post]/v1/users"],
    );
    backend.add_set_members("hydra:service:auth-svc:service:routes", &["[get]/v1/token"]);
    backend.add_set_members("hydra:service:idle-svc:service:routes", &[]);

    let routes = registry.list_routes(None).await.unwrap();
    assert_eq!(routes.len(), 2);
    assert!(!routes.contains_key("idle-svc"));
    assert!(routes.values().all(|r| !r.is_empty()));
    assert_eq!(routes["user-svc"], vec!["[get]/v1/users", "[post]/v1/users"]);

    let only = registry.list_routes(Some("auth-svc")).await.unwrap();
    assert_eq!(only.len(), 1);
    assert!(only.contains_key("auth-svc"));

    assert!(registry.list_routes(Some("nobody")).await.unwrap().is_empty());
}

#[smol_potat::test]
async fn test_list_services() {
    let (registry, backend) = memory_registry();
    backend.set_string(
        "hydra:service:user-svc:service",
        r#"{"serviceName":"user-svc","type":"api","registeredOn":"2024-05-01T12:00:00Z"}"#,
    );
    backend.set_string(
        "hydra:service:auth-svc:service",
        r#"{"serviceName":"auth-svc","type":"auth"}"#,
    );

    let services = registry.list_services(None).await.unwrap();
    let names: Vec<&str> = services.iter().map(|s| s.service_name.as_str()).collect();
    assert_eq!(names, vec!["auth-svc", "user-svc"]);

    let filtered = registry.list_services(Some("user-svc")).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].service_type.as_deref(), Some("api"));
}

#[smol_potat::test]
async fn test_health_grouped_and_filtered() {
    let (registry, backend) = memory_registry();
    backend.set_string(
        "hydra:service:user-svc:a1:health",
        r#"{"serviceName":"user-svc","instanceID":"a1","uptimeSeconds":12}"#,
    );
    backend.set_string(
        "hydra:service:user-svc:a2:health",
        r#"{"serviceName":"user-svc","instanceID":"a2","uptimeSeconds":40}"#,
    );
    backend.set_string(
        "hydra:service:auth-svc:b1:health",
        r#"{"serviceName":"auth-svc","instanceID":"b1"}"#,
    );
    // only unreadable snapshots: yields an empty list that must be skipped
    backend.set_string("hydra:service:ghost-svc:z9:health", "garbage");

    let all = registry.get_health(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let users = registry.get_health(Some("user-svc")).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].len(), 2);
    assert!(users[0].iter().all(|s| s.service_name == "user-svc"));

    assert!(registry.get_health(Some("ghost-svc")).await.unwrap().is_empty());
}

#[smol_potat::test]
async fn test_health_log_without_instances_is_empty() {
    let (registry, _backend) = memory_registry();
    let entries = registry.get_health_log("svc", 100).await.unwrap();
    assert!(entries.is_empty());
}

#[smol_potat::test]
async fn test_health_log_single_batch_skips_bad_entries() {
    let (registry, backend) = memory_registry();
    let entry = |msg: &str| {
        serde_json::json!({
            "type": "error",
            "ts": "2024-03-01T10:00:00Z",
            "processID": 101,
            "message": msg,
        })
        .to_string()
    };
    backend.push_list("hydra:service:user-svc:a1:health:log", &entry("first"));
    backend.push_list("hydra:service:user-svc:a1:health:log", "not an entry");
    backend.push_list("hydra:service:user-svc:a2:health:log", &entry("second"));
    backend.push_list("hydra:service:auth-svc:b1:health:log", &entry("other"));

    let before = backend.operations();
    let entries = registry.get_health_log("user-svc", 100).await.unwrap();
    // one KEYS, one transaction for every matched log
    assert_eq!(backend.operations() - before, 2);

    let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[smol_potat::test]
async fn test_health_log_limit() {
    let (registry, backend) = memory_registry();
    for i in 0..10 {
        let entry = serde_json::json!({
            "type": "info",
            "ts": "2024-03-01T10:00:00Z",
            "processID": 7,
            "message": format!("line {}", i),
        });
        backend.push_list("hydra:service:svc:x:health:log", &entry.to_string());
    }

    let entries = registry.get_health_log("svc", 3).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].message, "line 0");
}

#[smol_potat::test]
async fn test_health_log_huge_limit_reads_whole_log() {
    let (registry, backend) = memory_registry();
    for i in 0..3 {
        let entry = serde_json::json!({
            "type": "info",
            "ts": "2024-03-01T10:00:00Z",
            "processID": 7,
            "message": format!("line {}", i),
        });
        backend.push_list("hydra:service:svc:x:health:log", &entry.to_string());
    }

    let entries = registry.get_health_log("svc", usize::MAX).await.unwrap();
    assert_eq!(entries.len(), 3);
}

#[smol_potat::test]
async fn test_config_push_pull_list_remove() {
    let (registry, _backend) = memory_registry();
    let payload = serde_json::json!({"x": 1});

    registry.push_config("svcA:1", &payload).await.unwrap();
    assert_eq!(registry.pull_config("svcA:1").await.unwrap(), payload);

    let labels = registry.list_config_versions("svcA").await.unwrap();
    assert!(labels.contains(&"svcA:1".to_string()));

    assert!(registry.remove_config_version("svcA:1").await.unwrap());
    let labels = registry.list_config_versions("svcA").await.unwrap();
    assert!(!labels.contains(&"svcA:1".to_string()));
}

#[smol_potat::test]
async fn test_config_versions_coexist() {
    let (registry, _backend) = memory_registry();
    registry
        .push_config("svcA:1", &serde_json::json!({"v": 1}))
        .await
        .unwrap();
    registry
        .push_config("svcA:2", &serde_json::json!({"v": 2}))
        .await
        .unwrap();
    registry
        .push_config("svcB:1", &serde_json::json!({"v": "b"}))
        .await
        .unwrap();

    assert_eq!(
        registry.list_config_versions("svcA").await.unwrap(),
        vec!["svcA:1", "svcA:2"]
    );
    assert_eq!(
        registry.list_all_config_versions().await.unwrap(),
        vec!["svcA:1", "svcA:2", "svcB:1"]
    );
    assert_eq!(
        registry.pull_config("svcA:1").await.unwrap(),
        serde_json::json!({"v": 1})
    );
}

#[smol_potat::test]
async fn test_bad_label_never_reaches_registry() {
    let (registry, backend) = memory_registry();
    let before = backend.operations();

    assert!(matches!(
        registry.remove_config_version("bad-label").await,
        Err(Error::InvalidArguments(_))
    ));
    assert!(matches!(
        registry.pull_config("a:b:c").await,
        Err(Error::InvalidArguments(_))
    ));
    assert!(matches!(
        registry.push_config("nocolon", &serde_json::json!({})).await,
        Err(Error::InvalidArguments(_))
    ));

    assert_eq!(backend.operations(), before);
}

#[smol_potat::test]
async fn test_missing_config_is_not_found() {
    let (registry, _backend) = memory_registry();
    assert!(!registry.remove_config_version("svc:v1").await.unwrap());
    assert!(matches!(
        registry.pull_config("svc:v1").await,
        Err(Error::NotFound(_))
    ));
}

#[smol_potat::test]
async fn test_rest_get_with_payload_is_rejected() {
    let (registry, _backend) = memory_registry();
    let transport = RecordingTransport::default();
    let registry = registry.with_transport(transport.clone());

    let result = registry
        .rest_invoke("svc:get@/x", Some(Path::new("payload.json")))
        .await;
    assert!(matches!(result, Err(Error::InvalidArguments(_))));

    let result = registry
        .rest_invoke("svc:[delete]/x", Some(Path::new("payload.json")))
        .await;
    assert!(matches!(result, Err(Error::InvalidArguments(_))));

    assert!(transport.calls().is_empty());
}

#[smol_potat::test]
async fn test_rest_post_with_payload() {
    let dir = tempfile::tempdir().unwrap();
    let payload = dir.path().join("payload.json");
    std::fs::write(&payload, r#"{"name":"ada"}"#).unwrap();

    let (registry, _backend) = memory_registry();
    let transport = RecordingTransport::replying(br#"{"id":7}"#);
    let registry = registry.with_transport(transport.clone());

    let response = registry
        .rest_invoke("user-svc:[post]/v1/users", Some(&payload))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, serde_json::json!({"id": 7}));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "request");
    assert_eq!(calls[0].1.to, "user-svc:[post]/v1/users");
    assert_eq!(calls[0].1.body, serde_json::json!({"name": "ada"}));
}

#[smol_potat::test]
async fn test_rest_get_returns_text_body() {
    let (registry, _backend) = memory_registry();
    let registry = registry.with_transport(RecordingTransport::replying(b"plain text"));

    let response = registry.rest_invoke("svc:[get]/health", None).await.unwrap();
    assert_eq!(response.body, serde_json::json!("plain text"));
}

#[smol_potat::test]
async fn test_send_and_queue_hand_off_to_transport() {
    let (registry, _backend) = memory_registry();
    let transport = RecordingTransport::default();
    let registry = registry.with_transport(transport.clone());

    let envelope = hydra_registry::Envelope::new(
        "user-svc:/",
        "hydra-cli:/",
        serde_json::json!({"cmd": "reload"}),
    );
    registry.send_message(&envelope).await.unwrap();
    registry.queue_message(&envelope).await.unwrap();

    let kinds: Vec<String> = transport.calls().into_iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, vec!["send", "queue"]);
}

#[smol_potat::test]
async fn test_closed_registry_reports_connection_error() {
    let (mut registry, backend) = memory_registry();
    registry.close().await;
    registry.close().await;
    assert!(backend.is_closed());
    assert!(matches!(
        registry.list_nodes(&NodeFilter::all()).await,
        Err(Error::Connection(_))
    ));
}

#[smol_potat::test]
async fn test_redis_info_then_close() {
    let (mut registry, backend) = memory_registry();

    let report = registry.redis_info().await.unwrap();
    assert!(report.contains("# Server"));
    assert!(!backend.is_closed());

    registry.close().await;
    assert!(backend.is_closed());
    assert!(matches!(
        registry.redis_info().await,
        Err(Error::Connection(_))
    ));
}

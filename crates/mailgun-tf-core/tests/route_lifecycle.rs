//! Route handler lifecycle against the recording fake

mod common;

use common::{Call, RecordingApi, client};
use mailgun_tf_core::resources::{RouteConfig, RouteResource};
use mailgun_tf_core::traits::Resource;

fn inbound() -> RouteConfig {
    RouteConfig {
        priority: 0,
        expression: "match_recipient('.*@example.com')".into(),
        description: "inbound".into(),
        actions: vec![
            "forward('http://example.com/api/v1/foos/')".into(),
            "stop()".into(),
        ],
    }
}

#[tokio::test]
async fn test_create_then_read() {
    let api = RecordingApi::new();
    let client = client(&api);

    let created = RouteResource.create(&client, &inbound()).await.unwrap();
    assert_eq!(
        api.calls(),
        vec![Call::CreateRoute, Call::GetRoute(created.id.clone())]
    );
    assert_eq!(created.id, created.route_id);
    assert_eq!(created.actions.len(), 2);

    let read = RouteResource
        .read(&client, &created.id, Some(&created))
        .await
        .unwrap();
    assert_eq!(read, created);
}

#[tokio::test]
async fn test_update_sends_full_record_once() {
    let api = RecordingApi::new();
    let client = client(&api);
    let prior = RouteResource.create(&client, &inbound()).await.unwrap();
    api.clear_calls();

    let mut desired = inbound();
    desired.priority = 5;
    let state = RouteResource.update(&client, &prior, &desired).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            Call::UpdateRoute(prior.id.clone()),
            Call::GetRoute(prior.id.clone())
        ]
    );
    assert_eq!(state.priority, 5);
    assert_eq!(state.id, prior.id);
    assert_eq!(state.created_at, prior.created_at);
}

#[tokio::test]
async fn test_unchanged_update_makes_no_calls() {
    let api = RecordingApi::new();
    let client = client(&api);
    let prior = RouteResource.create(&client, &inbound()).await.unwrap();
    api.clear_calls();

    let state = RouteResource.update(&client, &prior, &inbound()).await.unwrap();

    assert!(api.calls().is_empty());
    assert_eq!(state, prior);
}

#[tokio::test]
async fn test_import_reads_by_id() {
    let api = RecordingApi::new();
    let client = client(&api);
    let created = RouteResource.create(&client, &inbound()).await.unwrap();

    let imported = RouteResource.read(&client, &created.id, None).await.unwrap();
    assert_eq!(imported.expression, inbound().expression);
}

#[tokio::test]
async fn test_delete_and_confirm() {
    let api = RecordingApi::new();
    let client = client(&api);
    let state = RouteResource.create(&client, &inbound()).await.unwrap();

    RouteResource.delete(&client, &state).await.unwrap();
    assert!(!api.has_route(&state.id));

    RouteResource
        .confirm_destroyed(&client, &state.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_failure_is_wrapped() {
    let api = RecordingApi::new();
    let client = client(&api);
    let prior = RouteResource.create(&client, &inbound()).await.unwrap();
    api.fail_on("update_route");

    let mut desired = inbound();
    desired.description = "changed".into();
    let err = RouteResource
        .update(&client, &prior, &desired)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("error updating mailgun route"));
}

#[tokio::test]
async fn test_update_state_comes_from_fresh_read() {
    let api = RecordingApi::new();
    let client = client(&api);
    let prior = RouteResource.create(&client, &inbound()).await.unwrap();
    api.sparse_route_echo();

    let mut desired = inbound();
    desired.description = "changed".into();
    let state = RouteResource.update(&client, &prior, &desired).await.unwrap();

    assert_eq!(state.description, "changed");
    assert_eq!(state.actions, desired.actions);
    assert_eq!(state.created_at, prior.created_at);

    api.clear_calls();
    let again = RouteResource.update(&client, &state, &desired).await.unwrap();
    assert!(api.calls().is_empty());
    assert_eq!(again, state);
}

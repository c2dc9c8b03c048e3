//! Credential reconciliation contract
//!
//! Runs reconciliation plans against the recording fake and checks that the
//! remote side ends up with exactly the desired logins using the minimum
//! number of calls.

mod common;

use common::{Call, RecordingApi};
use mailgun_tf_core::reconcile::{
    CredentialEntry, apply_credential_changes, plan_credential_changes,
};

const DOMAIN: &str = "mg.example.com";

fn entries(pairs: &[(&str, &str)]) -> Vec<CredentialEntry> {
    pairs
        .iter()
        .map(|(login, password)| CredentialEntry::new(*login, *password))
        .collect()
}

#[tokio::test]
async fn test_disjoint_sets_delete_all_then_create_all() {
    let api = RecordingApi::new();
    api.seed_domain(DOMAIN, &[("alice", "a1"), ("bob", "b1")]);

    let old = entries(&[("alice", "a1"), ("bob", "b1")]);
    let new = entries(&[("carol", "c1"), ("dave", "d1"), ("erin", "e1")]);

    let plan = plan_credential_changes(&old, &new);
    apply_credential_changes(&*api, DOMAIN, &plan)
        .await
        .unwrap();

    let calls = api.mutating_calls();
    assert_eq!(api.count("delete_credential"), 2);
    assert_eq!(api.count("create_credential"), 3);
    assert_eq!(api.count("change_credential_password"), 0);

    // Every delete precedes every create
    let last_delete = calls.iter().rposition(|c| c.name() == "delete_credential");
    let first_create = calls.iter().position(|c| c.name() == "create_credential");
    assert!(last_delete < first_create);

    let logins: Vec<String> = api
        .credentials_of(DOMAIN)
        .into_iter()
        .map(|(login, _)| login)
        .collect();
    assert_eq!(logins, vec!["carol", "dave", "erin"]);
}

#[tokio::test]
async fn test_equal_passwords_make_no_calls() {
    let api = RecordingApi::new();
    api.seed_domain(DOMAIN, &[("alice", "a1"), ("bob", "b1")]);

    let old = entries(&[("alice", "a1"), ("bob", "b1")]);
    let new = entries(&[("bob", "b1"), ("alice", "a1")]);

    let plan = plan_credential_changes(&old, &new);
    apply_credential_changes(&*api, DOMAIN, &plan)
        .await
        .unwrap();

    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_empty_password_keeps_remote_password() {
    let api = RecordingApi::new();
    api.seed_domain(DOMAIN, &[("alice", "original")]);

    let plan = plan_credential_changes(
        &entries(&[("alice", "original")]),
        &entries(&[("alice", "")]),
    );
    apply_credential_changes(&*api, DOMAIN, &plan)
        .await
        .unwrap();

    assert_eq!(api.count("change_credential_password"), 0);
    assert_eq!(
        api.credentials_of(DOMAIN),
        vec![("alice".to_string(), "original".to_string())]
    );
}

#[tokio::test]
async fn test_mixed_plan_applies_in_order() {
    let api = RecordingApi::new();
    api.seed_domain(DOMAIN, &[("alice", "a1"), ("bob", "b1")]);

    let plan = plan_credential_changes(
        &entries(&[("alice", "a1"), ("bob", "b1")]),
        &entries(&[("bob", "b2"), ("carol", "c1")]),
    );
    apply_credential_changes(&*api, DOMAIN, &plan)
        .await
        .unwrap();

    assert_eq!(
        api.mutating_calls(),
        vec![
            Call::DeleteCredential {
                domain: DOMAIN.into(),
                login: "alice".into()
            },
            Call::ChangeCredentialPassword {
                domain: DOMAIN.into(),
                login: "bob".into()
            },
            Call::CreateCredential {
                domain: DOMAIN.into(),
                login: "carol".into()
            },
        ]
    );
    assert_eq!(
        api.credentials_of(DOMAIN),
        vec![
            ("bob".to_string(), "b2".to_string()),
            ("carol".to_string(), "c1".to_string())
        ]
    );
}

#[tokio::test]
async fn test_first_failure_stops_the_plan() {
    let api = RecordingApi::new();
    api.seed_domain(DOMAIN, &[("alice", "a1")]);
    api.fail_on("delete_credential");

    let plan = plan_credential_changes(
        &entries(&[("alice", "a1")]),
        &entries(&[("carol", "c1")]),
    );
    let err = apply_credential_changes(&*api, DOMAIN, &plan)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("error deleting mailgun credential"));
    assert_eq!(api.count("create_credential"), 0);
}

//! Request construction and direct account writes end to end.
//!
//! Validates:
//!   - grant, modify and revoke submit one typed target each
//!   - the approval status is returned verbatim, and no result yields `None`
//!   - direct writes persist through a snapshot file round trip
//!   - missing accounts surface as NotFound instead of a silent default

mod common;

use common::directory_store;
use pvb_common::memory::{ApprovalResponse, MemoryStore, StoreCall};
use pvb_common::request::{EntityType, Operation};
use pvb_common::store::ServiceError;
use pvb_common::{
    AccountFieldMutator, AttributeAction, AttributeType, AttributeValue, EntityKind, ErrorCode,
    FieldMap, FieldValue, Intent, PvbConfig, PvbError, RequestBuilder, Snapshot, TypedAttribute,
    test_guard,
};
use std::sync::Arc;

fn requests(store: &Arc<MemoryStore>) -> RequestBuilder {
    RequestBuilder::new(store.clone(), store.clone())
}

#[test]
fn test_grant_echoes_status_for_any_attribute_count() {
    let _guard = test_guard!();
    let store = directory_store();
    store.respond_with(ApprovalResponse::Status("PENDING_APPROVAL".to_string()));

    for n in 0..4_i32 {
        let fields: FieldMap = (0..n)
            .map(|i| (format!("UD_APP_F{i}"), FieldValue::from(i)))
            .collect();
        let status = requests(&store)
            .grant("1001", "ActiveDirectory", &fields)
            .unwrap();
        assert_eq!(status.as_deref(), Some("PENDING_APPROVAL"));
    }

    let submissions = store.submissions();
    assert_eq!(submissions.len(), 4);
    let last = &submissions[3].request.beneficiaries[0].targets[0];
    assert_eq!(last.entity_type, EntityType::ApplicationInstance);
    assert_eq!(last.entity_key, "4");
    assert_eq!(last.operation, Operation::Provision);
    assert_eq!(last.attributes.len(), 3);
    assert!(
        last.attributes
            .iter()
            .all(|a| a.attribute_type() == AttributeType::Integer)
    );
}

#[test]
fn test_no_result_yields_none() {
    let _guard = test_guard!();
    let store = directory_store();
    store.respond_with(ApprovalResponse::NoResult);

    let status = requests(&store)
        .revoke("1001", "ActiveDirectory", "alice@ad")
        .unwrap();
    assert_eq!(status, None);
    assert_eq!(store.calls(StoreCall::Submit), 1);
}

#[test]
fn test_modify_tags_attributes_and_uses_direct_intent() {
    let _guard = test_guard!();
    let store = directory_store();
    let status = requests(&store)
        .with_intent(Intent::Direct)
        .modify(
            "1001",
            "ActiveDirectory",
            "alice@ad",
            vec![
                TypedAttribute::new("UD_APP_USR", AttributeValue::String("alice2".to_string())),
                TypedAttribute::new("UD_APP_UID", AttributeValue::Long(7_000_000_000)),
            ],
        )
        .unwrap();
    assert_eq!(status.as_deref(), Some("COMPLETED"));

    let submission = &store.submissions()[0];
    assert_eq!(submission.intent, Intent::Direct);
    let target = &submission.request.beneficiaries[0].targets[0];
    assert_eq!(target.operation, Operation::Modify);
    assert_eq!(target.entity_key, "alice@ad");
    assert!(
        target
            .attributes
            .iter()
            .all(|a| a.action == Some(AttributeAction::Modify))
    );
}

#[test]
fn test_grant_unknown_instance_and_transport_failure() {
    let _guard = test_guard!();
    let store = directory_store();

    let err = requests(&store)
        .grant("1001", "Nope", &FieldMap::new())
        .unwrap_err();
    assert!(matches!(
        err,
        PvbError::NotFound {
            kind: EntityKind::ApplicationInstance,
            ..
        }
    ));
    assert_eq!(store.calls(StoreCall::Submit), 0);

    store.fail_next(
        StoreCall::Submit,
        ServiceError::StaleData("request template changed".to_string()),
    );
    let err = requests(&store)
        .grant("1001", "ActiveDirectory", &FieldMap::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ServiceStaleData);
    assert!(store.submissions().is_empty());
}

#[test]
fn test_direct_writes_survive_snapshot_round_trip() {
    let _guard = test_guard!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let store = directory_store();
    let mutator = AccountFieldMutator::new(store.clone()).with_config(&PvbConfig::default());
    let status = mutator
        .set_field("1001", 9001, "UD_APP_USR", "alice.smith")
        .unwrap();
    assert_eq!(status, "COMPLETED");
    mutator
        .set_process_form_fields(9001, &FieldMap::new().with("UD_APP_DEPT", "R&D"))
        .unwrap();
    store.snapshot().save(&path).unwrap();

    let reloaded = Arc::new(MemoryStore::from_snapshot(Snapshot::load(&path).unwrap()));
    let mutator = AccountFieldMutator::new(reloaded);
    assert_eq!(
        mutator
            .primary_account_field("1001", "ActiveDirectory", "UD_APP_USR")
            .unwrap()
            .as_deref(),
        Some("alice.smith")
    );
    assert_eq!(
        mutator
            .primary_account_field("1001", "ActiveDirectory", "UD_APP_DEPT")
            .unwrap()
            .as_deref(),
        Some("R&D")
    );
    assert_eq!(
        mutator
            .primary_account_field("1001", "ServiceNow", "UD_APP_USR")
            .unwrap(),
        None
    );
}

#[test]
fn test_missing_account_is_not_found() {
    let _guard = test_guard!();
    let store = directory_store();
    let mutator = AccountFieldMutator::new(store.clone());

    let err = mutator
        .set_field("1001", 42, "UD_APP_USR", "x")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AccountNotFound);
    assert_eq!(store.calls(StoreCall::ModifyAccount), 0);
}

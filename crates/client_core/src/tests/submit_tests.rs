use super::*;
use crate::{
    fhe::PlaceholderFhe,
    sync::RecordSynchronizer,
    test_support::{record, session_with_seed, MemoryContract},
    wallet::{DenyAll, LocalWallet, WalletSession},
};
use shared::{domain::RecordId, protocol::decode_index};

fn form(name: &str) -> NewSiteForm {
    NewSiteForm {
        site_name: name.to_string(),
        location: "Cusco".into(),
        condition: 72,
        description: "terraces".into(),
    }
}

fn submitter(contract: &Arc<MemoryContract>) -> RecordSubmitter {
    RecordSubmitter::new(contract.clone(), Arc::new(PlaceholderFhe))
}

#[tokio::test]
async fn empty_site_name_never_touches_the_contract() {
    let contract = MemoryContract::new();
    let session = session_with_seed(41).await;

    for name in ["", "   "] {
        let err = submitter(&contract)
            .submit_record(&form(name), Some(&session))
            .await
            .expect_err("validation");
        assert!(matches!(err, SubmitError::Validation(_)));
    }
    assert!(contract.writes().await.is_empty());
    assert!(contract.reads().await.is_empty());
}

#[tokio::test]
async fn disconnected_wallet_is_refused_before_any_call() {
    let contract = MemoryContract::new();
    let err = submitter(&contract)
        .submit_record(&form("Machu Picchu"), None)
        .await
        .expect_err("no wallet");
    assert!(matches!(err, SubmitError::WalletNotConnected));
    assert!(contract.writes().await.is_empty());
}

#[tokio::test]
async fn successful_submission_is_indexed_and_listed() {
    let contract = MemoryContract::new();
    let session = session_with_seed(42).await;

    let outcome = submitter(&contract)
        .submit_record(&form("  Machu Picchu "), Some(&session))
        .await
        .expect("submit");
    let record = &outcome.record;
    assert_eq!(record.site_name, "Machu Picchu");
    assert_eq!(record.condition, 72);
    assert!(record.owner.matches(&session.account));
    assert!(record.encrypted_data.starts_with("FHE-"));
    for value in [
        record.environmental_impact.wind,
        record.environmental_impact.rain,
        record.environmental_impact.temperature,
    ] {
        assert!((0.0..=100.0).contains(&value));
    }

    assert_eq!(
        contract.writes().await,
        vec![record.id.storage_key(), INDEX_KEY.to_string()]
    );
    assert!(outcome.index_receipt.block_number > outcome.record_receipt.block_number);

    let index = decode_index(&contract.raw(INDEX_KEY).await.expect("index")).expect("ids");
    assert_eq!(index, vec![record.id.clone()]);

    let listed = RecordSynchronizer::new(contract.clone())
        .load_records()
        .await
        .expect("load");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].site_name, record.site_name);
    assert_eq!(listed[0].condition, record.condition);
    assert_eq!(listed[0].timestamp, record.timestamp);
    assert!((listed[0].environmental_impact.rain - record.environmental_impact.rain).abs() < 1e-9);
}

#[tokio::test]
async fn appends_to_an_existing_index() {
    let contract = MemoryContract::new();
    let session = session_with_seed(43).await;
    contract.insert_record(&record("old", 1, &session.account)).await;
    contract.insert_index(&["old"]).await;

    let outcome = submitter(&contract)
        .submit_record(&form("Petra"), Some(&session))
        .await
        .expect("submit");

    let index = decode_index(&contract.raw(INDEX_KEY).await.expect("index")).expect("ids");
    assert_eq!(index, vec![RecordId::from("old"), outcome.record.id]);
}

#[tokio::test]
async fn declined_signature_is_reported_as_user_rejection() {
    let contract = MemoryContract::new();
    let wallet = Arc::new(LocalWallet::from_seed([44u8; 32], Arc::new(DenyAll)));
    let account = wallet.address().await.expect("address");
    let session = WalletSession { wallet, account };

    let err = submitter(&contract)
        .submit_record(&form("Petra"), Some(&session))
        .await
        .expect_err("declined");
    assert!(matches!(err, SubmitError::UserRejected));
    assert!(contract.writes().await.is_empty());
}

#[tokio::test]
async fn failed_index_write_leaves_an_unlisted_record() {
    let contract = MemoryContract::new();
    contract.fail_writes_to(INDEX_KEY).await;
    let session = session_with_seed(45).await;

    let err = submitter(&contract)
        .submit_record(&form("Petra"), Some(&session))
        .await
        .expect_err("index write fails");
    assert!(matches!(err, SubmitError::Contract(_)));

    let writes = contract.writes().await;
    assert_eq!(writes.len(), 1);
    assert!(contract.raw(&writes[0]).await.is_some());
    assert!(contract.raw(INDEX_KEY).await.is_none());
}

#[tokio::test]
async fn non_string_index_entries_do_not_erase_existing_ids() {
    let contract = MemoryContract::new();
    let session = session_with_seed(46).await;
    contract.insert_raw(INDEX_KEY, b"[\"old\", 5]").await;

    let outcome = submitter(&contract)
        .submit_record(&form("Petra"), Some(&session))
        .await
        .expect("submit");

    let index = decode_index(&contract.raw(INDEX_KEY).await.expect("index")).expect("ids");
    assert_eq!(index, vec![RecordId::from("old"), outcome.record.id]);
}

#[tokio::test]
async fn out_of_range_condition_is_clamped() {
    let contract = MemoryContract::new();
    let session = session_with_seed(47).await;
    let mut input = form("Petra");
    input.condition = 250;

    let outcome = submitter(&contract)
        .submit_record(&input, Some(&session))
        .await
        .expect("submit");
    assert_eq!(outcome.record.condition, 100);

    let stored = StoredSiteRecord::from_bytes(
        &contract.raw(&outcome.record.id.storage_key()).await.expect("stored"),
    )
    .expect("decode");
    assert_eq!(stored.condition_or_default(), 100);
}

use super::*;
use crate::test_support::{record, MemoryContract};
use shared::domain::{WalletAddress, DEFAULT_CONDITION};

fn owner() -> WalletAddress {
    WalletAddress::from("0x00000000000000000000000000000000000000cc")
}

#[tokio::test]
async fn missing_index_yields_no_records() {
    let contract = MemoryContract::new();
    let synchronizer = RecordSynchronizer::new(contract.clone());

    let records = synchronizer.load_records().await.expect("load");
    assert!(records.is_empty());
    assert_eq!(contract.reads().await, vec![INDEX_KEY.to_string()]);
}

#[tokio::test]
async fn empty_or_malformed_index_yields_no_records() {
    let contract = MemoryContract::new();
    let synchronizer = RecordSynchronizer::new(contract.clone());

    contract.insert_raw(INDEX_KEY, b"[]").await;
    assert!(synchronizer.load_records().await.expect("empty").is_empty());

    contract.insert_raw(INDEX_KEY, b"not json").await;
    assert!(synchronizer.load_records().await.expect("malformed").is_empty());
}

#[tokio::test]
async fn returns_resolvable_records_newest_first() {
    let contract = MemoryContract::new();
    contract.insert_record(&record("a", 100, &owner())).await;
    contract.insert_record(&record("b", 300, &owner())).await;
    contract.insert_record(&record("c", 200, &owner())).await;
    contract.insert_index(&["a", "missing", "b", "c"]).await;

    let records = RecordSynchronizer::new(contract)
        .load_records()
        .await
        .expect("load");

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn malformed_record_is_skipped_and_the_rest_are_kept() {
    let contract = MemoryContract::new();
    contract.insert_record(&record("a", 1, &owner())).await;
    contract.insert_raw("site_bad", b"{\"timestamp\":").await;
    contract.insert_record(&record("c", 3, &owner())).await;
    contract.insert_index(&["a", "bad", "c"]).await;

    let records = RecordSynchronizer::new(contract)
        .load_records()
        .await
        .expect("load");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.id.as_str() != "bad"));
}

#[tokio::test]
async fn missing_fields_take_defaults() {
    let contract = MemoryContract::new();
    contract
        .insert_raw(
            "site_legacy",
            br#"{"data":"FHE-e30=","timestamp":9,"owner":"0xAbC","siteName":"Old Town"}"#,
        )
        .await;
    contract.insert_index(&["legacy"]).await;

    let records = RecordSynchronizer::new(contract)
        .load_records()
        .await
        .expect("load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].condition, DEFAULT_CONDITION);
    assert_eq!(records[0].environmental_impact.wind, 0.0);
    assert_eq!(records[0].owner.as_str(), "0xAbC");
}

#[tokio::test]
async fn unavailable_contract_is_reported_without_reading() {
    let contract = MemoryContract::new();
    contract.set_available(false);

    let err = RecordSynchronizer::new(contract.clone())
        .load_records()
        .await
        .expect_err("unavailable");
    assert!(matches!(err, SyncError::Unavailable));
    assert!(contract.reads().await.is_empty());
}

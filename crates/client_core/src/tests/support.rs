//! In-process contract and helpers shared by the client tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{RecordId, SiteRecord, WalletAddress},
    error::ErrorCode,
    protocol::{encode_index, StoredSiteRecord, TransactionReceipt},
};
use tokio::sync::Mutex;

use crate::{
    contract::KeyValueContract,
    error::ContractError,
    wallet::{AutoApprove, LocalWallet, Wallet, WalletSession},
};

#[derive(Default)]
pub(crate) struct MemoryContract {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
    block: AtomicU64,
    failing_keys: Mutex<HashSet<String>>,
    writes: Mutex<Vec<String>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryContract {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub(crate) async fn insert_raw(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
    }

    pub(crate) async fn insert_record(&self, record: &SiteRecord) {
        let bytes = StoredSiteRecord::from_record(record)
            .to_bytes()
            .expect("encode record");
        self.insert_raw(&record.id.storage_key(), &bytes).await;
    }

    pub(crate) async fn insert_index(&self, ids: &[&str]) {
        let ids: Vec<RecordId> = ids.iter().map(|id| RecordId::from(*id)).collect();
        let bytes = encode_index(&ids).expect("encode index");
        self.insert_raw(shared::domain::INDEX_KEY, &bytes).await;
    }

    pub(crate) async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Writes to `key` fail with an internal error.
    pub(crate) async fn fail_writes_to(&self, key: &str) {
        self.failing_keys.lock().await.insert(key.to_string());
    }

    pub(crate) async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    pub(crate) async fn reads(&self) -> Vec<String> {
        self.reads.lock().await.clone()
    }
}

#[async_trait]
impl KeyValueContract for MemoryContract {
    async fn is_available(&self) -> Result<bool, ContractError> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, ContractError> {
        self.reads.lock().await.push(key.to_string());
        Ok(self.entries.lock().await.get(key).cloned().unwrap_or_default())
    }

    async fn set_data(
        &self,
        key: &str,
        value: &[u8],
        wallet: &dyn Wallet,
    ) -> Result<TransactionReceipt, ContractError> {
        let signed = wallet.sign_transaction(key, value).await?;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ContractError::Rejected {
                code: ErrorCode::Unavailable,
                message: "contract is not accepting transactions".into(),
            });
        }
        if self.failing_keys.lock().await.contains(key) {
            return Err(ContractError::Rejected {
                code: ErrorCode::Internal,
                message: format!("write to {key} failed"),
            });
        }

        self.writes.lock().await.push(key.to_string());
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        let block_number = self.block.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransactionReceipt {
            tx_hash: format!("0x{block_number:08x}"),
            key: key.to_string(),
            signer: WalletAddress::from_public_key(&signed.public_key),
            block_number,
            committed_at: Utc::now(),
        })
    }
}

pub(crate) async fn session_with_seed(seed: u8) -> WalletSession {
    let wallet = Arc::new(LocalWallet::from_seed([seed; 32], Arc::new(AutoApprove)));
    let account = wallet.address().await.expect("unlocked");
    WalletSession { wallet, account }
}

pub(crate) fn record(id: &str, timestamp: i64, owner: &WalletAddress) -> SiteRecord {
    SiteRecord {
        id: RecordId::from(id),
        encrypted_data: "FHE-e30=".into(),
        timestamp,
        owner: owner.clone(),
        site_name: format!("site {id}"),
        condition: 70,
        environmental_impact: shared::domain::EnvironmentalImpact::new(10.0, 20.0, 30.0),
    }
}

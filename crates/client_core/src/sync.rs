use std::sync::Arc;

use shared::domain::{SiteRecord, INDEX_KEY};
use tracing::{debug, warn};

use crate::{
    contract::KeyValueContract,
    error::SyncError,
    records::{decode_record, index_or_empty, sort_newest_first},
};

/// Rebuilds the full site list from the contract on every call. One read for
/// the index plus one per id, issued in index order.
pub struct RecordSynchronizer {
    contract: Arc<dyn KeyValueContract>,
}

impl RecordSynchronizer {
    pub fn new(contract: Arc<dyn KeyValueContract>) -> Self {
        Self { contract }
    }

    pub async fn load_records(&self) -> Result<Vec<SiteRecord>, SyncError> {
        if !self.contract.is_available().await? {
            return Err(SyncError::Unavailable);
        }

        let index = self.contract.get_data(INDEX_KEY).await?;
        let ids = index_or_empty(&index);

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let bytes = match self.contract.get_data(&id.storage_key()).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(record_id = %id, %error, "sync: failed to read site; skipping");
                    continue;
                }
            };
            if let Some(record) = decode_record(id, &bytes) {
                records.push(record);
            }
        }

        sort_newest_first(&mut records);
        debug!(
            indexed = ids.len(),
            loaded = records.len(),
            "sync: site list rebuilt"
        );
        Ok(records)
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;

//! Consistency checks between the site index and the stored records.

use anyhow::{Context, Result};
use shared::{
    domain::{RecordId, WalletAddress, INDEX_KEY, RECORD_KEY_PREFIX},
    protocol::{decode_index, encode_index, transaction_digest, transaction_hash},
};
use storage::{Storage, StoredTransaction};
use tracing::{info, warn};

pub const OPERATOR_SIGNER: &str = "operator";

#[derive(Debug, Default, PartialEq)]
pub struct IndexReport {
    pub indexed: Vec<RecordId>,
    /// Stored records no index entry points at.
    pub orphans: Vec<RecordId>,
    /// Index entries with no stored record.
    pub dangling: Vec<RecordId>,
    pub index_malformed: bool,
}

impl IndexReport {
    pub fn is_consistent(&self) -> bool {
        self.orphans.is_empty() && self.dangling.is_empty() && !self.index_malformed
    }
}

pub async fn inspect(storage: &Storage) -> Result<IndexReport> {
    let (indexed, index_malformed) = match storage.get_data(INDEX_KEY).await? {
        None => (Vec::new(), false),
        Some(bytes) if bytes.is_empty() => (Vec::new(), false),
        Some(bytes) => match decode_index(&bytes) {
            Ok(ids) => (ids, false),
            Err(error) => {
                warn!(%error, "tools: site index is malformed");
                (Vec::new(), true)
            }
        },
    };

    let stored: Vec<RecordId> = storage
        .list_keys(RECORD_KEY_PREFIX)
        .await?
        .iter()
        .filter_map(|key| RecordId::from_storage_key(key))
        .collect();

    let orphans = stored
        .iter()
        .filter(|id| !indexed.contains(id))
        .cloned()
        .collect();
    let dangling = indexed
        .iter()
        .filter(|id| !stored.contains(id))
        .cloned()
        .collect();

    Ok(IndexReport {
        indexed,
        orphans,
        dangling,
        index_malformed,
    })
}

/// Indexed ids that still resolve, in their original order, followed by the
/// orphans. `None` when the index is already consistent.
pub fn repaired_index(report: &IndexReport) -> Option<Vec<RecordId>> {
    if report.is_consistent() {
        return None;
    }
    let mut ids: Vec<RecordId> = Vec::with_capacity(report.indexed.len() + report.orphans.len());
    for id in &report.indexed {
        if !report.dangling.contains(id) && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids.extend(report.orphans.iter().cloned());
    Some(ids)
}

/// Writes the index directly to the store, attributed to the operator.
pub async fn write_index(storage: &Storage, ids: &[RecordId]) -> Result<StoredTransaction> {
    let bytes = encode_index(ids).context("failed to encode site index")?;
    let tx_hash = transaction_hash(&transaction_digest(INDEX_KEY, &bytes), &[]);
    let tx = storage
        .set_data(
            INDEX_KEY,
            &bytes,
            &WalletAddress::from(OPERATOR_SIGNER),
            &tx_hash,
        )
        .await?;
    info!(
        block_number = tx.block_number,
        entries = ids.len(),
        "tools: site index rewritten"
    );
    Ok(tx)
}

#[cfg(test)]
#[path = "tests/index_tests.rs"]
mod tests;

//! Lenient decoding of what the contract stores. Bad payloads are logged and
//! dropped; they never fail a batch.

use serde_json::Value;
use shared::{
    domain::{RecordId, SiteRecord},
    protocol::StoredSiteRecord,
};
use tracing::warn;

/// Empty input is an empty index, and so is anything that is not a JSON
/// array. Non-string elements are dropped; the string ids around them are kept.
pub fn index_or_empty(bytes: &[u8]) -> Vec<RecordId> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let entries: Vec<Value> = match serde_json::from_slice(bytes) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(%error, "records: site index is malformed; treating as empty");
            return Vec::new();
        }
    };

    let total = entries.len();
    let ids: Vec<RecordId> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(id) => Some(RecordId(id)),
            _ => None,
        })
        .collect();
    if ids.len() < total {
        warn!(
            dropped = total - ids.len(),
            "records: ignoring non-string entries in site index"
        );
    }
    ids
}

/// `None` for an unset key or an undecodable payload.
pub fn decode_record(id: &RecordId, bytes: &[u8]) -> Option<SiteRecord> {
    if bytes.is_empty() {
        return None;
    }
    match StoredSiteRecord::from_bytes(bytes) {
        Ok(stored) => Some(stored.into_record(id.clone())),
        Err(error) => {
            warn!(record_id = %id, %error, "records: skipping malformed site payload");
            None
        }
    }
}

/// Newest first. Stable, so equal timestamps keep index order.
pub fn sort_newest_first(records: &mut [SiteRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

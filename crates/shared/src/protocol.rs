use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{
    clamp_condition, EnvironmentalImpact, RecordId, SiteRecord, WalletAddress,
    DEFAULT_CONDITION,
};

pub const MAX_KEY_BYTES: usize = 256;
pub const MAX_VALUE_BYTES: usize = 64 * 1024;

const TRANSACTION_DOMAIN: &[u8] = b"heritage-kv/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse {
    pub key: String,
    /// Empty when the key has never been written.
    pub value_b64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDataRequest {
    pub value_b64: String,
    pub signer_public_key_b64: String,
    pub signature_b64: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub key: String,
    pub signer: WalletAddress,
    pub block_number: u64,
    pub committed_at: DateTime<Utc>,
}

/// Digest a wallet signs to authorize `setData(key, value)`.
pub fn transaction_digest(key: &str, value: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(TRANSACTION_DOMAIN);
    hasher.update((key.len() as u32).to_be_bytes());
    hasher.update(key.as_bytes());
    hasher.update(value);
    hasher.finalize().into()
}

pub fn transaction_hash(digest: &[u8], signature: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(digest);
    hasher.update(signature);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// JSON shape stored under `site_{id}`. Unknown fields survive a read/write cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSiteRecord {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub site_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_impact: Option<EnvironmentalImpact>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredSiteRecord {
    pub fn from_record(record: &SiteRecord) -> Self {
        Self {
            data: record.encrypted_data.clone(),
            timestamp: record.timestamp,
            owner: record.owner.0.clone(),
            site_name: record.site_name.clone(),
            condition: Some(serde_json::Number::from(record.condition)),
            environmental_impact: Some(record.environmental_impact.clamped()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn condition_or_default(&self) -> u8 {
        self.condition
            .as_ref()
            .and_then(serde_json::Number::as_f64)
            .map(clamp_condition)
            .unwrap_or(DEFAULT_CONDITION)
    }

    pub fn into_record(self, id: RecordId) -> SiteRecord {
        let condition = self.condition_or_default();
        SiteRecord {
            id,
            encrypted_data: self.data,
            timestamp: self.timestamp,
            owner: WalletAddress(self.owner),
            site_name: self.site_name,
            condition,
            environmental_impact: self.environmental_impact.unwrap_or_default().clamped(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

pub fn decode_index(bytes: &[u8]) -> serde_json::Result<Vec<RecordId>> {
    serde_json::from_slice(bytes)
}

pub fn encode_index(ids: &[RecordId]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(ids)
}

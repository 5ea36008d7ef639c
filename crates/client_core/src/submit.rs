use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        EnvironmentalImpact, RecordId, SiteRecord, DEFAULT_CONDITION, INDEX_KEY,
    },
    protocol::{encode_index, StoredSiteRecord, TransactionReceipt},
};
use tracing::info;

use crate::{
    contract::KeyValueContract,
    error::SubmitError,
    fhe::FheCipher,
    records::index_or_empty,
    wallet::WalletSession,
};

/// Input of the "register site" form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSiteForm {
    pub site_name: String,
    pub location: String,
    pub condition: u8,
    pub description: String,
}

impl Default for NewSiteForm {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            location: String::new(),
            condition: DEFAULT_CONDITION,
            description: String::new(),
        }
    }
}

impl NewSiteForm {
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.site_name.trim().is_empty() {
            return Err(SubmitError::Validation(
                "Please fill required fields".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: SiteRecord,
    pub record_receipt: TransactionReceipt,
    pub index_receipt: TransactionReceipt,
}

pub struct RecordSubmitter {
    contract: Arc<dyn KeyValueContract>,
    cipher: Arc<dyn FheCipher>,
}

impl RecordSubmitter {
    pub fn new(contract: Arc<dyn KeyValueContract>, cipher: Arc<dyn FheCipher>) -> Self {
        Self { contract, cipher }
    }

    /// Writes the record, then appends its id to the index. The two writes are
    /// separate transactions: if the second fails the record exists but is
    /// not listed.
    pub async fn submit_record(
        &self,
        form: &NewSiteForm,
        session: Option<&WalletSession>,
    ) -> Result<SubmitOutcome, SubmitError> {
        form.validate()?;
        let session = session.ok_or(SubmitError::WalletNotConnected)?;

        let encrypted_data = self.cipher.encrypt(form)?;
        let now = Utc::now();
        let record = SiteRecord {
            id: RecordId::generate(now),
            encrypted_data,
            timestamp: now.timestamp(),
            owner: session.account.clone(),
            site_name: form.site_name.trim().to_string(),
            condition: form.condition.min(100),
            environmental_impact: initial_impact(&mut rand::thread_rng()),
        };

        let payload = StoredSiteRecord::from_record(&record).to_bytes()?;
        let record_receipt = self
            .contract
            .set_data(&record.id.storage_key(), &payload, session.wallet.as_ref())
            .await?;

        let mut ids = index_or_empty(&self.contract.get_data(INDEX_KEY).await?);
        ids.push(record.id.clone());
        let index_receipt = self
            .contract
            .set_data(INDEX_KEY, &encode_index(&ids)?, session.wallet.as_ref())
            .await?;

        info!(
            record_id = %record.id,
            owner = %record.owner,
            indexed = ids.len(),
            "submit: site registered"
        );

        Ok(SubmitOutcome {
            record,
            record_receipt,
            index_receipt,
        })
    }
}

/// Placeholder readings until real sensor input exists.
fn initial_impact(rng: &mut impl Rng) -> EnvironmentalImpact {
    EnvironmentalImpact::new(
        rng.gen_range(0.0..100.0),
        rng.gen_range(0.0..100.0),
        rng.gen_range(0.0..100.0),
    )
}

#[cfg(test)]
#[path = "tests/submit_tests.rs"]
mod tests;

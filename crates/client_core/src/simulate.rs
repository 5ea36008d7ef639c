use std::{sync::Arc, time::Duration};

use rand::Rng;
use shared::{
    domain::{RecordId, SiteRecord, WalletAddress},
    protocol::StoredSiteRecord,
};
use tracing::info;

use crate::{contract::KeyValueContract, error::SimulateError, wallet::WalletSession};

pub const DEFAULT_SIMULATION_DELAY: Duration = Duration::from_secs(3);

const MAX_WIND_DELTA: f64 = 10.0;
const MAX_RAIN_DELTA: f64 = 10.0;
const MAX_TEMPERATURE_DELTA: f64 = 5.0;
const MAX_CONDITION_DECAY: u8 = 2;

/// Runs the "encrypted" environmental simulation on a site. Nothing is
/// computed over ciphertext: the step waits, then nudges the stored readings.
pub struct Simulator {
    contract: Arc<dyn KeyValueContract>,
    delay: Duration,
}

impl Simulator {
    pub fn new(contract: Arc<dyn KeyValueContract>, delay: Duration) -> Self {
        Self { contract, delay }
    }

    pub async fn simulate(
        &self,
        id: &RecordId,
        session: Option<&WalletSession>,
    ) -> Result<SiteRecord, SimulateError> {
        let session = session.ok_or(SimulateError::WalletNotConnected)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let bytes = self.contract.get_data(&id.storage_key()).await?;
        if bytes.is_empty() {
            return Err(SimulateError::NotFound(id.clone()));
        }
        let mut stored =
            StoredSiteRecord::from_bytes(&bytes).map_err(|source| SimulateError::Malformed {
                id: id.clone(),
                source,
            })?;
        if !WalletAddress(stored.owner.clone()).matches(&session.account) {
            return Err(SimulateError::NotOwner);
        }

        apply_step(&mut stored, &mut rand::thread_rng());

        let payload = stored
            .to_bytes()
            .map_err(|source| SimulateError::Malformed {
                id: id.clone(),
                source,
            })?;
        self.contract
            .set_data(&id.storage_key(), &payload, session.wallet.as_ref())
            .await?;

        let updated = stored.into_record(id.clone());
        info!(
            record_id = %id,
            condition = updated.condition,
            "simulate: environmental step applied"
        );
        Ok(updated)
    }
}

/// Adds bounded wear to the readings and decays the condition, both clamped
/// to [0, 100].
pub fn apply_step(stored: &mut StoredSiteRecord, rng: &mut impl Rng) {
    let impact = stored.environmental_impact.unwrap_or_default();
    let mut next = impact;
    next.wind += rng.gen_range(0.0..MAX_WIND_DELTA);
    next.rain += rng.gen_range(0.0..MAX_RAIN_DELTA);
    next.temperature += rng.gen_range(0.0..MAX_TEMPERATURE_DELTA);
    stored.environmental_impact = Some(next.clamped());

    let condition = stored
        .condition_or_default()
        .saturating_sub(rng.gen_range(0..=MAX_CONDITION_DECAY));
    stored.condition = Some(serde_json::Number::from(condition));
}

#[cfg(test)]
#[path = "tests/simulate_tests.rs"]
mod tests;

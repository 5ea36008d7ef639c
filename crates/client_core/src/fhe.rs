//! Stand-in for homomorphic encryption of site payloads.
//!
//! [`PlaceholderFhe`] is NOT encryption: it base64-encodes the JSON form behind
//! an `FHE-` tag so the payload shape matches what a real scheme would store.
//! Anyone can decode it. Swap in a real [`FheCipher`] before storing anything
//! sensitive.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::submit::NewSiteForm;

const PLACEHOLDER_TAG: &str = "FHE-";

pub trait FheCipher: Send + Sync {
    fn encrypt(&self, form: &NewSiteForm) -> Result<String, serde_json::Error>;
    fn decrypt(&self, ciphertext: &str) -> Option<NewSiteForm>;
}

pub struct PlaceholderFhe;

impl FheCipher for PlaceholderFhe {
    fn encrypt(&self, form: &NewSiteForm) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(form)?;
        Ok(format!("{PLACEHOLDER_TAG}{}", STANDARD.encode(json)))
    }

    fn decrypt(&self, ciphertext: &str) -> Option<NewSiteForm> {
        let encoded = ciphertext.strip_prefix(PLACEHOLDER_TAG)?;
        let json = STANDARD.decode(encoded).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

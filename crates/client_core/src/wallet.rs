//! Signing wallet and account-change notifications.
//!
//! [`LocalWallet`] holds a single ed25519 key. Every signing request goes
//! through a [`TransactionApprover`], which is where a user can decline.

use std::{
    fs,
    io::{self, BufRead, Write as _},
    path::Path,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::{rngs::OsRng, RngCore};
use shared::{
    domain::WalletAddress,
    protocol::transaction_digest,
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::error::WalletError;

const ACCOUNT_EVENTS_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// What an approver is shown before a signature is produced.
#[derive(Debug, Clone)]
pub struct TransactionPreview {
    pub signer: WalletAddress,
    pub key: String,
    pub value_len: usize,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Accounts the wallet exposes, active account first.
    async fn request_accounts(&self) -> Result<Vec<WalletAddress>, WalletError>;
    async fn sign_transaction(
        &self,
        key: &str,
        value: &[u8],
    ) -> Result<SignedTransaction, WalletError>;
    /// `accountsChanged`: each message is the new account list, empty when locked.
    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<WalletAddress>>;
}

/// A connected wallet together with the account it resolved to.
#[derive(Clone)]
pub struct WalletSession {
    pub wallet: Arc<dyn Wallet>,
    pub account: WalletAddress,
}

#[async_trait]
pub trait TransactionApprover: Send + Sync {
    async fn approve(&self, preview: &TransactionPreview) -> Result<bool, WalletError>;
}

pub struct AutoApprove;

#[async_trait]
impl TransactionApprover for AutoApprove {
    async fn approve(&self, _preview: &TransactionPreview) -> Result<bool, WalletError> {
        Ok(true)
    }
}

pub struct DenyAll;

#[async_trait]
impl TransactionApprover for DenyAll {
    async fn approve(&self, _preview: &TransactionPreview) -> Result<bool, WalletError> {
        Ok(false)
    }
}

/// Asks on the terminal; anything but `y`/`yes` declines.
pub struct TerminalApprover;

#[async_trait]
impl TransactionApprover for TerminalApprover {
    async fn approve(&self, preview: &TransactionPreview) -> Result<bool, WalletError> {
        let prompt = format!(
            "Sign setData({}, {} bytes) as {}? [y/N] ",
            preview.key,
            preview.value_len,
            preview.signer.abbreviated()
        );
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer)?;
            let answer = answer.trim().to_ascii_lowercase();
            Ok::<_, io::Error>(answer == "y" || answer == "yes")
        })
        .await
        .map_err(|e| WalletError::Approval(e.to_string()))?
        .map_err(|e| WalletError::Approval(e.to_string()))
    }
}

pub struct LocalWallet {
    key: RwLock<Option<SigningKey>>,
    approver: Arc<dyn TransactionApprover>,
    accounts: broadcast::Sender<Vec<WalletAddress>>,
}

impl LocalWallet {
    pub fn new(signing_key: SigningKey, approver: Arc<dyn TransactionApprover>) -> Self {
        let (accounts, _) = broadcast::channel(ACCOUNT_EVENTS_CAPACITY);
        Self {
            key: RwLock::new(Some(signing_key)),
            approver,
            accounts,
        }
    }

    pub fn from_seed(mut seed: [u8; 32], approver: Arc<dyn TransactionApprover>) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self::new(signing_key, approver)
    }

    pub fn generate(approver: Arc<dyn TransactionApprover>) -> Self {
        Self::from_seed(random_seed(), approver)
    }

    /// Reads a hex seed from `path`, creating one when the file is missing.
    pub fn load_or_create(path: &Path, approver: Arc<dyn TransactionApprover>) -> Result<Self> {
        if path.exists() {
            let mut raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read wallet key '{}'", path.display()))?;
            let seed = parse_hex_seed(raw.trim());
            raw.zeroize();
            let seed = seed.ok_or_else(|| {
                anyhow!("wallet key '{}' is not a 32-byte hex seed", path.display())
            })?;
            return Ok(Self::from_seed(seed, approver));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create wallet directory '{}'", parent.display())
            })?;
        }
        let mut seed = random_seed();
        let mut encoded = hex::encode(seed);
        let written = create_private_file(path)
            .and_then(|mut file| file.write_all(encoded.as_bytes()))
            .with_context(|| format!("failed to write wallet key '{}'", path.display()));
        encoded.zeroize();
        written?;
        let wallet = Self::from_seed(seed, approver);
        seed.zeroize();
        info!(path = %path.display(), "wallet: generated new key");
        Ok(wallet)
    }

    pub async fn address(&self) -> Option<WalletAddress> {
        self.key.read().await.as_ref().map(address_of)
    }

    /// Replaces the active key and notifies subscribers.
    pub async fn switch_key(&self, signing_key: SigningKey) -> WalletAddress {
        let address = address_of(&signing_key);
        *self.key.write().await = Some(signing_key);
        let _ = self.accounts.send(vec![address.clone()]);
        address
    }

    pub async fn lock(&self) {
        *self.key.write().await = None;
        let _ = self.accounts.send(Vec::new());
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<WalletAddress>, WalletError> {
        self.address()
            .await
            .map(|address| vec![address])
            .ok_or(WalletError::Locked)
    }

    async fn sign_transaction(
        &self,
        key: &str,
        value: &[u8],
    ) -> Result<SignedTransaction, WalletError> {
        let signer = self.address().await.ok_or(WalletError::Locked)?;
        let preview = TransactionPreview {
            signer,
            key: key.to_string(),
            value_len: value.len(),
        };
        if !self.approver.approve(&preview).await? {
            debug!(key, "wallet: signing declined");
            return Err(WalletError::UserRejected);
        }

        let guard = self.key.read().await;
        let signing_key = guard.as_ref().ok_or(WalletError::Locked)?;
        if address_of(signing_key) != preview.signer {
            debug!(key, "wallet: account changed while awaiting approval");
            return Err(WalletError::AccountChanged);
        }
        let digest = transaction_digest(key, value);
        Ok(SignedTransaction {
            public_key: signing_key.verifying_key().to_bytes(),
            signature: signing_key.sign(&digest).to_bytes(),
        })
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<WalletAddress>> {
        self.accounts.subscribe()
    }
}

fn address_of(signing_key: &SigningKey) -> WalletAddress {
    WalletAddress::from_public_key(&signing_key.verifying_key().to_bytes())
}

fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Owner read/write only on unix.
fn create_private_file(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn parse_hex_seed(raw: &str) -> Option<[u8; 32]> {
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let mut seed = [0u8; 32];
    hex::decode_to_slice(raw, &mut seed).ok()?;
    Some(seed)
}

#[cfg(test)]
#[path = "tests/wallet_tests.rs"]
mod tests;

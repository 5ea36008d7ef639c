use super::*;
use ed25519_dalek::{Signature, VerifyingKey};
use std::sync::{OnceLock, Weak};

/// Approves, but switches the wallet to another key first.
#[derive(Default)]
struct SwitchingApprover {
    wallet: OnceLock<Weak<LocalWallet>>,
}

#[async_trait]
impl TransactionApprover for SwitchingApprover {
    async fn approve(&self, _preview: &TransactionPreview) -> Result<bool, WalletError> {
        if let Some(wallet) = self.wallet.get().and_then(Weak::upgrade) {
            wallet.switch_key(SigningKey::from_bytes(&[26u8; 32])).await;
        }
        Ok(true)
    }
}

#[tokio::test]
async fn signatures_verify_against_the_transaction_digest() {
    let wallet = LocalWallet::from_seed([21u8; 32], Arc::new(AutoApprove));
    let signed = wallet
        .sign_transaction("site_keys", b"[]")
        .await
        .expect("signed");

    let verifying_key = VerifyingKey::from_bytes(&signed.public_key).expect("public key");
    verifying_key
        .verify_strict(
            &transaction_digest("site_keys", b"[]"),
            &Signature::from_bytes(&signed.signature),
        )
        .expect("valid signature");

    let accounts = wallet.request_accounts().await.expect("accounts");
    assert_eq!(accounts, vec![WalletAddress::from_public_key(&signed.public_key)]);
}

#[tokio::test]
async fn declined_approval_is_a_user_rejection() {
    let wallet = LocalWallet::from_seed([22u8; 32], Arc::new(DenyAll));
    let err = wallet
        .sign_transaction("site_keys", b"[]")
        .await
        .expect_err("declined");
    assert!(matches!(err, WalletError::UserRejected));
}

#[tokio::test]
async fn lock_and_switch_publish_account_changes() {
    let wallet = LocalWallet::from_seed([23u8; 32], Arc::new(AutoApprove));
    let mut accounts = wallet.subscribe_accounts();

    wallet.lock().await;
    assert!(accounts.recv().await.expect("lock event").is_empty());
    assert!(matches!(
        wallet.request_accounts().await,
        Err(WalletError::Locked)
    ));

    let next = wallet.switch_key(SigningKey::from_bytes(&[24u8; 32])).await;
    assert_eq!(accounts.recv().await.expect("switch event"), vec![next.clone()]);
    assert_eq!(wallet.address().await, Some(next));
}

#[tokio::test]
async fn load_or_create_persists_the_seed() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("heritage_wallet_test_{suffix}"));
    let key_path = temp_root.join("keys").join("wallet.key");

    let created = LocalWallet::load_or_create(&key_path, Arc::new(AutoApprove)).expect("create");
    let reloaded = LocalWallet::load_or_create(&key_path, Arc::new(AutoApprove)).expect("reload");
    assert_eq!(created.address().await, reloaded.address().await);

    fs::write(&key_path, "not-hex").expect("corrupt");
    assert!(LocalWallet::load_or_create(&key_path, Arc::new(AutoApprove)).is_err());

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn hex_seed_parsing_accepts_optional_prefix() {
    let encoded = "11".repeat(32);
    assert_eq!(parse_hex_seed(&encoded), Some([0x11; 32]));
    assert_eq!(parse_hex_seed(&format!("0x{encoded}")), Some([0x11; 32]));
    assert_eq!(parse_hex_seed("abcd"), None);
    assert_eq!(parse_hex_seed(&"zz".repeat(32)), None);
}

#[tokio::test]
async fn key_switched_during_approval_is_not_used_to_sign() {
    let approver = Arc::new(SwitchingApprover::default());
    let wallet = Arc::new(LocalWallet::from_seed([25u8; 32], approver.clone()));
    let _ = approver.wallet.set(Arc::downgrade(&wallet));

    let err = wallet
        .sign_transaction("site_keys", b"[]")
        .await
        .expect_err("account changed");
    assert!(matches!(err, WalletError::AccountChanged));

    let signed = wallet
        .sign_transaction("site_keys", b"[]")
        .await
        .expect("same key before and after approval");
    assert_eq!(
        Some(WalletAddress::from_public_key(&signed.public_key)),
        wallet.address().await
    );
}

#[cfg(unix)]
#[tokio::test]
async fn generated_seed_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("heritage_wallet_mode_{suffix}"));
    let key_path = temp_root.join("wallet.key");

    LocalWallet::load_or_create(&key_path, Arc::new(AutoApprove)).expect("create");
    let mode = fs::metadata(&key_path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o077, 0, "mode {mode:o}");

    fs::remove_dir_all(temp_root).expect("cleanup");
}

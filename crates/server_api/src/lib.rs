use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use shared::{
    domain::WalletAddress,
    error::{ApiError, ErrorCode},
    protocol::{
        transaction_digest, transaction_hash, DataResponse, SetDataRequest, TransactionReceipt,
        MAX_KEY_BYTES, MAX_VALUE_BYTES,
    },
};
use storage::Storage;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn is_available(ctx: &ApiContext) -> Result<bool, ApiError> {
    ctx.storage.is_available().await.map_err(internal)
}

pub async fn get_data(ctx: &ApiContext, key: &str) -> Result<DataResponse, ApiError> {
    validate_key(key)?;
    let value = ctx.storage.get_data(key).await.map_err(internal)?;
    Ok(DataResponse {
        key: key.to_string(),
        value_b64: value.map(|bytes| STANDARD.encode(bytes)).unwrap_or_default(),
    })
}

/// Verifies the signer's authorization and commits the write. Rejected while
/// the contract is paused.
pub async fn set_data(
    ctx: &ApiContext,
    key: &str,
    request: &SetDataRequest,
) -> Result<TransactionReceipt, ApiError> {
    validate_key(key)?;

    let value = STANDARD
        .decode(&request.value_b64)
        .map_err(|_| ApiError::new(ErrorCode::Validation, "invalid base64 value"))?;
    if value.len() > MAX_VALUE_BYTES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("value exceeds {MAX_VALUE_BYTES} bytes"),
        ));
    }

    let (signer, signature) = verify_signature(key, &value, request)?;

    if !is_available(ctx).await? {
        return Err(ApiError::new(
            ErrorCode::Unavailable,
            "contract is not accepting transactions",
        ));
    }

    let digest = transaction_digest(key, &value);
    let tx_hash = transaction_hash(&digest, &signature.to_bytes());
    let stored = ctx
        .storage
        .set_data(key, &value, &signer, &tx_hash)
        .await
        .map_err(internal)?;

    info!(
        key,
        signer = %stored.signer,
        block_number = stored.block_number,
        value_len = stored.value_len,
        "contract: committed setData"
    );

    Ok(TransactionReceipt {
        tx_hash: stored.tx_hash,
        key: stored.key,
        signer: stored.signer,
        block_number: stored.block_number,
        committed_at: stored.committed_at,
    })
}

fn verify_signature(
    key: &str,
    value: &[u8],
    request: &SetDataRequest,
) -> Result<(WalletAddress, Signature), ApiError> {
    let public_key: [u8; 32] = STANDARD
        .decode(&request.signer_public_key_b64)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| ApiError::new(ErrorCode::Validation, "invalid signer public key"))?;
    let signature_bytes: [u8; 64] = STANDARD
        .decode(&request.signature_b64)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| ApiError::new(ErrorCode::Validation, "invalid signature encoding"))?;

    let verifying_key = VerifyingKey::from_bytes(&public_key)
        .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "signer public key rejected"))?;
    let signature = Signature::from_bytes(&signature_bytes);
    let digest = transaction_digest(key, value);

    verifying_key
        .verify_strict(&digest, &signature)
        .map_err(|_| {
            warn!(key, "contract: rejected setData with bad signature");
            ApiError::new(ErrorCode::Unauthorized, "signature does not match transaction")
        })?;

    Ok((WalletAddress::from_public_key(&public_key), signature))
}

fn validate_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "key must not be empty"));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("key exceeds {MAX_KEY_BYTES} bytes"),
        ));
    }
    Ok(())
}

fn internal(e: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, e.to_string())
}

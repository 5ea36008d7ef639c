//! Client side of the generic key/value contract.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{AvailabilityResponse, DataResponse, SetDataRequest, TransactionReceipt},
};
use tracing::debug;
use url::Url;

use crate::{error::ContractError, wallet::Wallet};

#[async_trait]
pub trait KeyValueContract: Send + Sync {
    async fn is_available(&self) -> Result<bool, ContractError>;
    /// Empty when the key has never been written.
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, ContractError>;
    /// Signs with `wallet` and submits. Nothing is sent if the wallet declines.
    async fn set_data(
        &self,
        key: &str,
        value: &[u8],
        wallet: &dyn Wallet,
    ) -> Result<TransactionReceipt, ContractError>;
}

pub struct HttpContract {
    http: Client,
    base_url: Url,
}

impl HttpContract {
    pub fn new(base_url: &str) -> Result<Self, ContractError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ContractError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ContractError::InvalidEndpoint(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ContractError::InvalidEndpoint(format!(
                "{base_url} cannot be used as a base url"
            )));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ContractError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ContractError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl KeyValueContract for HttpContract {
    async fn is_available(&self) -> Result<bool, ContractError> {
        let url = self.endpoint(&["contract", "available"])?;
        let response = self.http.get(url).send().await?;
        let body: AvailabilityResponse = read_json(response).await?;
        Ok(body.available)
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, ContractError> {
        let url = self.endpoint(&["contract", "data", key])?;
        let response = self.http.get(url).send().await?;
        let body: DataResponse = read_json(response).await?;
        if body.key != key {
            return Err(ContractError::InvalidResponse(format!(
                "requested key '{key}' but contract answered for '{}'",
                body.key
            )));
        }
        STANDARD
            .decode(body.value_b64)
            .map_err(|e| ContractError::InvalidResponse(format!("invalid base64 value: {e}")))
    }

    async fn set_data(
        &self,
        key: &str,
        value: &[u8],
        wallet: &dyn Wallet,
    ) -> Result<TransactionReceipt, ContractError> {
        let signed = wallet.sign_transaction(key, value).await?;
        let request = SetDataRequest {
            value_b64: STANDARD.encode(value),
            signer_public_key_b64: STANDARD.encode(signed.public_key),
            signature_b64: STANDARD.encode(signed.signature),
        };

        let url = self.endpoint(&["contract", "data", key])?;
        let response = self.http.put(url).json(&request).send().await?;
        let receipt: TransactionReceipt = read_json(response).await?;
        debug!(
            key,
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            "contract: setData confirmed"
        );
        Ok(receipt)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ContractError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.bytes().await?;
    let error = serde_json::from_slice::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::new(
            ErrorCode::Internal,
            format!("contract returned {status}"),
        )
    });
    Err(ContractError::Rejected {
        code: error.code,
        message: error.message,
    })
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;

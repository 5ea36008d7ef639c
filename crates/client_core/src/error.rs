use shared::{domain::RecordId, error::ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("user rejected transaction")]
    UserRejected,
    #[error("wallet is locked")]
    Locked,
    #[error("wallet account changed before signing")]
    AccountChanged,
    #[error("wallet approval failed: {0}")]
    Approval(String),
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("contract transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("contract rejected request ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("invalid contract response: {0}")]
    InvalidResponse(String),
    #[error("invalid contract endpoint: {0}")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl ContractError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Wallet(WalletError::UserRejected))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("contract is not available")]
    Unavailable,
    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(String),
    #[error("wallet is not connected")]
    WalletNotConnected,
    #[error("transaction rejected by user")]
    UserRejected,
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Contract(ContractError),
}

impl From<ContractError> for SubmitError {
    fn from(value: ContractError) -> Self {
        if value.is_user_rejection() {
            Self::UserRejected
        } else {
            Self::Contract(value)
        }
    }
}

#[derive(Debug, Error)]
pub enum SimulateError {
    #[error("wallet is not connected")]
    WalletNotConnected,
    #[error("site {0} not found")]
    NotFound(RecordId),
    #[error("only the site owner can run a simulation")]
    NotOwner,
    #[error("stored site {id} is malformed: {source}")]
    Malformed {
        id: RecordId,
        source: serde_json::Error,
    },
    #[error("transaction rejected by user")]
    UserRejected,
    #[error("{0}")]
    Contract(ContractError),
}

impl From<ContractError> for SimulateError {
    fn from(value: ContractError) -> Self {
        if value.is_user_rejection() {
            Self::UserRejected
        } else {
            Self::Contract(value)
        }
    }
}

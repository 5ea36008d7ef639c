//! Client side of the heritage site registry: wallet signing, contract
//! access, and the dashboard controller that ties them together.

pub mod contract;
pub mod dashboard;
pub mod error;
pub mod fhe;
pub mod records;
pub mod simulate;
pub mod submit;
pub mod sync;
pub mod wallet;

pub use contract::{HttpContract, KeyValueContract};
pub use dashboard::{
    AccountSubscription, Dashboard, DashboardEvent, DashboardSettings, DashboardState,
    StatusKind, TransactionStatus,
};
pub use error::{ContractError, SimulateError, SubmitError, SyncError, WalletError};
pub use fhe::{FheCipher, PlaceholderFhe};
pub use simulate::{Simulator, DEFAULT_SIMULATION_DELAY};
pub use submit::{NewSiteForm, RecordSubmitter, SubmitOutcome};
pub use sync::RecordSynchronizer;
pub use wallet::{
    AutoApprove, DenyAll, LocalWallet, TerminalApprover, TransactionApprover, Wallet,
    WalletSession,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

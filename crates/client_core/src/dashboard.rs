//! Application state and the controller that drives it.
//!
//! [`Dashboard`] owns the only mutable UI state ([`DashboardState`]). Front
//! ends read snapshots and listen on [`Dashboard::subscribe_events`].

use std::{
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use futures::StreamExt;
use serde::Serialize;
use shared::domain::{RecordId, SiteRecord, WalletAddress};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, info, warn};

use crate::{
    contract::KeyValueContract,
    error::{SimulateError, SubmitError, SyncError, WalletError},
    fhe::FheCipher,
    simulate::{Simulator, DEFAULT_SIMULATION_DELAY},
    submit::{NewSiteForm, RecordSubmitter},
    sync::RecordSynchronizer,
    wallet::{Wallet, WalletSession},
};

const SUCCESS_STATUS_TTL: Duration = Duration::from_secs(2);
const ERROR_STATUS_TTL: Duration = Duration::from_secs(3);
const EVENTS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub simulation_delay: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            simulation_delay: DEFAULT_SIMULATION_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

/// Transient banner shown while a transaction is in flight and shortly after.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStatus {
    pub visible: bool,
    pub kind: StatusKind,
    pub message: String,
    pub expires_at: Option<Instant>,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::hidden()
    }
}

impl TransactionStatus {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            kind: StatusKind::Pending,
            message: String::new(),
            expires_at: None,
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            visible: true,
            kind: StatusKind::Pending,
            message: message.into(),
            expires_at: None,
        }
    }

    pub fn success(message: impl Into<String>, now: Instant) -> Self {
        Self {
            visible: true,
            kind: StatusKind::Success,
            message: message.into(),
            expires_at: Some(now + SUCCESS_STATUS_TTL),
        }
    }

    pub fn error(message: impl Into<String>, now: Instant) -> Self {
        Self {
            visible: true,
            kind: StatusKind::Error,
            message: message.into(),
            expires_at: Some(now + ERROR_STATUS_TTL),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub account: Option<WalletAddress>,
    pub records: Vec<SiteRecord>,
    pub loading: bool,
    pub refreshing: bool,
    pub creating: bool,
    pub show_create: bool,
    pub form: NewSiteForm,
    pub transaction_status: TransactionStatus,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            account: None,
            records: Vec::new(),
            loading: true,
            refreshing: false,
            creating: false,
            show_create: false,
            form: NewSiteForm::default(),
            transaction_status: TransactionStatus::hidden(),
        }
    }
}

impl DashboardState {
    pub fn total_sites(&self) -> usize {
        self.records.len()
    }

    /// Rounded mean condition; 0 with no sites.
    pub fn average_condition(&self) -> u8 {
        if self.records.is_empty() {
            return 0;
        }
        let sum: u64 = self.records.iter().map(|r| u64::from(r.condition)).sum();
        (sum as f64 / self.records.len() as f64).round() as u8
    }

    pub fn at_risk_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_at_risk()).count()
    }

    pub fn is_owner(&self, address: &WalletAddress) -> bool {
        self.account
            .as_ref()
            .is_some_and(|account| account.matches(address))
    }

    pub fn record(&self, id: &RecordId) -> Option<&SiteRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Hides the banner once its display time has passed.
    pub fn expire_status(&mut self, now: Instant) -> bool {
        match self.transaction_status.expires_at {
            Some(expires_at) if self.transaction_status.visible && expires_at <= now => {
                self.transaction_status = TransactionStatus::hidden();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    AccountChanged(Option<WalletAddress>),
    RecordsUpdated { count: usize },
    Status(TransactionStatus),
    /// Blocking message for the user, e.g. a validation failure.
    Notice(String),
}

/// Follows `accountsChanged` for one connected wallet. Dropping the handle
/// stops following.
pub struct AccountSubscription {
    task: JoinHandle<()>,
}

impl AccountSubscription {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AccountSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ConnectedWallet {
    wallet: Arc<dyn Wallet>,
    subscription: AccountSubscription,
}

pub struct Dashboard {
    synchronizer: RecordSynchronizer,
    submitter: RecordSubmitter,
    simulator: Simulator,
    state: RwLock<DashboardState>,
    connection: Mutex<Option<ConnectedWallet>>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Dashboard {
    pub fn new(
        contract: Arc<dyn KeyValueContract>,
        cipher: Arc<dyn FheCipher>,
        settings: DashboardSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        Arc::new(Self {
            synchronizer: RecordSynchronizer::new(contract.clone()),
            submitter: RecordSubmitter::new(contract.clone(), cipher),
            simulator: Simulator::new(contract, settings.simulation_delay),
            state: RwLock::new(DashboardState::default()),
            connection: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub async fn connect_wallet(
        self: &Arc<Self>,
        wallet: Arc<dyn Wallet>,
    ) -> Result<WalletAddress, WalletError> {
        // Subscribe before resolving so a change in between is not lost.
        let updates = BroadcastStream::new(wallet.subscribe_accounts());
        let account = wallet
            .request_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(WalletError::Locked)?;

        let subscription = AccountSubscription {
            task: tokio::spawn(follow_accounts(Arc::downgrade(self), updates)),
        };
        *self.connection.lock().await = Some(ConnectedWallet {
            wallet,
            subscription,
        });

        info!(account = %account, "dashboard: wallet connected");
        self.set_account(Some(account.clone())).await;
        Ok(account)
    }

    pub async fn disconnect_wallet(&self) {
        self.connection.lock().await.take();
        self.set_account(None).await;
        info!("dashboard: wallet disconnected");
    }

    pub async fn is_following_accounts(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|connected| connected.subscription.is_active())
    }

    async fn session(&self) -> Option<WalletSession> {
        let wallet = self.connection.lock().await.as_ref()?.wallet.clone();
        let account = self.state.read().await.account.clone()?;
        Some(WalletSession { wallet, account })
    }

    async fn set_account(&self, account: Option<WalletAddress>) {
        self.state.write().await.account = account.clone();
        let _ = self.events.send(DashboardEvent::AccountChanged(account));
    }

    async fn set_status(&self, status: TransactionStatus) {
        self.state.write().await.transaction_status = status.clone();
        let _ = self.events.send(DashboardEvent::Status(status));
    }

    fn notice(&self, message: impl Into<String>) {
        let _ = self.events.send(DashboardEvent::Notice(message.into()));
    }

    /// Re-reads every site. An unavailable contract keeps the current list.
    pub async fn refresh(&self) {
        self.state.write().await.refreshing = true;

        let result = self.synchronizer.load_records().await;

        let count = {
            let mut state = self.state.write().await;
            match result {
                Ok(records) => state.records = records,
                Err(SyncError::Unavailable) => {
                    warn!("dashboard: contract is not available; keeping cached sites")
                }
                Err(err) => error!(error = %err, "dashboard: failed to load sites"),
            }
            state.refreshing = false;
            state.loading = false;
            state.records.len()
        };
        let _ = self.events.send(DashboardEvent::RecordsUpdated { count });
    }

    pub async fn open_create(&self) {
        self.state.write().await.show_create = true;
    }

    pub async fn close_create(&self) {
        self.state.write().await.show_create = false;
    }

    pub async fn update_form(&self, edit: impl FnOnce(&mut NewSiteForm)) {
        edit(&mut self.state.write().await.form);
    }

    /// Submits the current form. On success the list is reloaded and the
    /// form reset.
    pub async fn submit(&self) -> Result<RecordId, SubmitError> {
        let form = self.state.read().await.form.clone();
        if let Err(err) = form.validate() {
            self.notice(err.to_string());
            return Err(err);
        }
        let Some(session) = self.session().await else {
            self.notice("Please connect wallet first");
            return Err(SubmitError::WalletNotConnected);
        };

        self.state.write().await.creating = true;
        self.set_status(TransactionStatus::pending(
            "Encrypting site data with FHE...",
        ))
        .await;

        let result = self.submitter.submit_record(&form, Some(&session)).await;
        self.state.write().await.creating = false;

        match result {
            Ok(outcome) => {
                self.set_status(TransactionStatus::success(
                    "Encrypted site data submitted securely!",
                    Instant::now(),
                ))
                .await;
                self.refresh().await;
                {
                    let mut state = self.state.write().await;
                    state.show_create = false;
                    state.form = NewSiteForm::default();
                }
                Ok(outcome.record.id)
            }
            Err(err) => {
                let message = match &err {
                    SubmitError::UserRejected => "Transaction rejected by user".to_string(),
                    other => format!("Submission failed: {other}"),
                };
                warn!(error = %err, "dashboard: submission failed");
                self.set_status(TransactionStatus::error(message, Instant::now()))
                    .await;
                Err(err)
            }
        }
    }

    pub async fn simulate(&self, id: &RecordId) -> Result<SiteRecord, SimulateError> {
        let Some(session) = self.session().await else {
            self.notice("Please connect wallet first");
            return Err(SimulateError::WalletNotConnected);
        };
        let owns_cached = {
            let state = self.state.read().await;
            state
                .record(id)
                .map_or(true, |record| state.is_owner(&record.owner))
        };
        if !owns_cached {
            self.notice("Only the site owner can run a simulation");
            return Err(SimulateError::NotOwner);
        }

        self.set_status(TransactionStatus::pending(
            "Running FHE environmental simulation...",
        ))
        .await;

        match self.simulator.simulate(id, Some(&session)).await {
            Ok(updated) => {
                self.set_status(TransactionStatus::success(
                    "FHE simulation completed successfully!",
                    Instant::now(),
                ))
                .await;
                self.refresh().await;
                Ok(updated)
            }
            Err(err) => {
                warn!(record_id = %id, error = %err, "dashboard: simulation failed");
                self.set_status(TransactionStatus::error(
                    format!("Simulation failed: {err}"),
                    Instant::now(),
                ))
                .await;
                Err(err)
            }
        }
    }

    pub async fn expire_status(&self, now: Instant) {
        let expired = self.state.write().await.expire_status(now);
        if expired {
            let _ = self
                .events
                .send(DashboardEvent::Status(TransactionStatus::hidden()));
        }
    }
}

async fn follow_accounts(
    dashboard: Weak<Dashboard>,
    mut updates: BroadcastStream<Vec<WalletAddress>>,
) {
    while let Some(update) = updates.next().await {
        let accounts = match update {
            Ok(accounts) => accounts,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "dashboard: account updates lagged");
                continue;
            }
        };
        let Some(dashboard) = dashboard.upgrade() else {
            break;
        };
        let account = accounts.into_iter().next();
        info!(account = ?account, "dashboard: wallet accounts changed");
        dashboard.set_account(account).await;
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;

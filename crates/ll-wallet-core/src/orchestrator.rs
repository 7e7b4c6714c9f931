//! Contract action orchestration.
//!
//! Each operation is a short pipeline of chain calls; `?` stops it at the
//! first failure and `execute` turns the outcome into exactly one notification.

use ll_api_types::{Operation, TokenId, WalletAddress};
use ll_chain_client::{BundlerContract, LootContract, PendingTx, TxWatcher};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::notify::Notifier;
use crate::session::WalletSession;

pub const DEFAULT_CONFIRMATIONS: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("User not authenticated.")]
    NotAuthenticated,
    #[error("bag #{0} already has an operation in flight")]
    AlreadyInFlight(TokenId),
    #[error("Insufficient items to reclaim bundle.")]
    InsufficientItems,
    #[error(transparent)]
    Chain(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReceipt {
    pub operation: Operation,
    pub token_id: TokenId,
    pub tx_hash: String,
}

pub fn success_message(operation: Operation, token_id: &TokenId) -> String {
    match operation {
        Operation::Unbundle => format!("Successfully unbundled loot bag #{token_id}"),
        Operation::Rebundle => format!("Successfully reclaimed bag #{token_id}"),
    }
}

pub fn failure_message(operation: Operation, token_id: &TokenId) -> String {
    match operation {
        Operation::Unbundle => format!("Error when unbundling loot bag #{token_id}"),
        Operation::Rebundle => format!("Error when bundling loot bag #{token_id}."),
    }
}

/// Chain handles the orchestrator drives.
#[derive(Clone)]
pub struct ContractHandles {
    pub loot: Arc<dyn LootContract>,
    pub bundler: Arc<dyn BundlerContract>,
    pub watcher: Arc<dyn TxWatcher>,
}

pub struct ActionOrchestrator {
    session: Arc<WalletSession>,
    contracts: ContractHandles,
    notifier: Arc<dyn Notifier>,
    bundler_address: WalletAddress,
    confirmations: u64,
    in_flight: Mutex<HashSet<TokenId>>,
}

impl ActionOrchestrator {
    pub fn new(
        session: Arc<WalletSession>,
        contracts: ContractHandles,
        notifier: Arc<dyn Notifier>,
        bundler_address: WalletAddress,
        confirmations: u64,
    ) -> Self {
        Self {
            session,
            contracts,
            notifier,
            bundler_address,
            confirmations: confirmations.max(1),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn bundler_address(&self) -> &WalletAddress {
        &self.bundler_address
    }

    /// Runs `operation` on `token_id` for `caller`.
    ///
    /// Guard rejections (`NotAuthenticated`, `AlreadyInFlight`) return before
    /// any chain call and without a notification. Every other outcome emits
    /// exactly one notification; success also asks the session to reload.
    pub async fn execute(
        &self,
        operation: Operation,
        token_id: &TokenId,
        caller: Option<&WalletAddress>,
    ) -> Result<OperationReceipt, ActionError> {
        let Some(caller) = caller else {
            warn!(%operation, %token_id, "rejected: no authenticated caller");
            return Err(ActionError::NotAuthenticated);
        };

        let _claim = self.claim(token_id)?;

        let result = match operation {
            Operation::Unbundle => self.unbundle(caller, token_id).await,
            Operation::Rebundle => self.rebundle(caller, token_id).await,
        };

        self.report(operation, token_id, &result);
        result
    }

    async fn unbundle(
        &self,
        caller: &WalletAddress,
        token_id: &TokenId,
    ) -> Result<OperationReceipt, ActionError> {
        let tx = self
            .contracts
            .loot
            .safe_transfer_from(caller, &self.bundler_address, token_id)
            .await?;
        self.confirm(&tx).await?;

        Ok(OperationReceipt {
            operation: Operation::Unbundle,
            token_id: token_id.clone(),
            tx_hash: tx.tx_hash,
        })
    }

    async fn rebundle(
        &self,
        caller: &WalletAddress,
        token_id: &TokenId,
    ) -> Result<OperationReceipt, ActionError> {
        let bundler = &self.contracts.bundler;

        let components = bundler.component_ids(token_id).await?;
        let owners = vec![caller.clone(); components.0.len()];
        let balances = bundler.balance_of_batch(&owners, &components).await?;
        if balances.len() != components.0.len() {
            return Err(anyhow::anyhow!(
                "balanceOfBatch returned {} balances for {} items",
                balances.len(),
                components.0.len()
            )
            .into());
        }
        if balances.iter().any(|balance| *balance == 0) {
            return Err(ActionError::InsufficientItems);
        }

        if !bundler.is_approved_for_all(caller, &self.bundler_address).await? {
            info!(%caller, "approving bundler for item transfers");
            let approval = bundler
                .set_approval_for_all(caller, &self.bundler_address, true)
                .await?;
            self.confirm(&approval).await?;
        }

        let tx = bundler.reassemble(caller, token_id).await?;
        self.confirm(&tx).await?;

        Ok(OperationReceipt {
            operation: Operation::Rebundle,
            token_id: token_id.clone(),
            tx_hash: tx.tx_hash,
        })
    }

    async fn confirm(&self, tx: &PendingTx) -> Result<(), ActionError> {
        self.contracts
            .watcher
            .wait_for_confirmations(tx, self.confirmations)
            .await?;
        Ok(())
    }

    fn report(
        &self,
        operation: Operation,
        token_id: &TokenId,
        result: &Result<OperationReceipt, ActionError>,
    ) {
        match result {
            Ok(receipt) => {
                info!(%operation, %token_id, tx_hash = %receipt.tx_hash, "operation confirmed");
                self.notifier.success(&success_message(operation, token_id));
                self.session.request_reload();
            }
            Err(ActionError::InsufficientItems) => {
                warn!(%operation, %token_id, "missing items for reassembly");
                self.notifier.error(&ActionError::InsufficientItems.to_string());
            }
            Err(err) => {
                error!(%operation, %token_id, error = %format!("{err:#}"), "operation failed");
                self.notifier.error(&failure_message(operation, token_id));
            }
        }
    }

    fn claim(&self, token_id: &TokenId) -> Result<InFlightClaim<'_>, ActionError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(token_id.clone()) {
            warn!(%token_id, "rejected: operation already in flight");
            return Err(ActionError::AlreadyInFlight(token_id.clone()));
        }
        Ok(InFlightClaim {
            set: &self.in_flight,
            token_id: token_id.clone(),
        })
    }
}

/// Releases the token id when the operation ends, however it ends.
struct InFlightClaim<'a> {
    set: &'a Mutex<HashSet<TokenId>>,
    token_id: TokenId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.token_id);
    }
}

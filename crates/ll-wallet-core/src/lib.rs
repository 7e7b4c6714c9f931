pub mod inventory;
pub mod notify;
pub mod orchestrator;
pub mod panel;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod mock;

pub use inventory::{
    InventoryCollector, InventoryError, InventorySnapshot, InventoryTarget, ONCHAIN_SOURCE,
    OnChainInventory, validate_address,
};
pub use notify::{DEFAULT_NOTIFICATION_CAPACITY, NotificationLog, Notifier};
pub use orchestrator::{
    ActionError, ActionOrchestrator, ContractHandles, DEFAULT_CONFIRMATIONS, OperationReceipt,
};
pub use panel::{BundlerPanel, PanelError, PendingSubmission, SubmitOutcome};
pub use resolver::AddressResolver;
pub use session::{SessionSnapshot, WalletSession};

use ll_api_types::{Operation, WalletAddress};
use ll_chain_client::{BundlerContract, InventorySource, LootContract, TxWatcher, WalletConnector};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything the core needs from the outside world.
pub struct CoreParts {
    pub connector: Arc<dyn WalletConnector>,
    pub inventory_source: Arc<dyn InventorySource>,
    pub loot: Arc<dyn LootContract>,
    pub bundler: Arc<dyn BundlerContract>,
    pub watcher: Arc<dyn TxWatcher>,
    pub bundler_address: WalletAddress,
    pub confirmations: u64,
    pub notification_capacity: usize,
}

/// One wallet session wired to both panels.
pub struct BundlerCore {
    session: Arc<WalletSession>,
    notifications: Arc<NotificationLog>,
    resolver: AddressResolver,
    unbundle: Arc<BundlerPanel>,
    rebundle: Arc<BundlerPanel>,
}

impl BundlerCore {
    pub fn new(parts: CoreParts) -> Self {
        let session = Arc::new(WalletSession::new());
        let notifications = Arc::new(NotificationLog::new(parts.notification_capacity));

        let resolver =
            AddressResolver::new(parts.connector, session.clone(), notifications.clone());
        let orchestrator = Arc::new(ActionOrchestrator::new(
            session.clone(),
            ContractHandles {
                loot: parts.loot,
                bundler: parts.bundler,
                watcher: parts.watcher,
            },
            notifications.clone(),
            parts.bundler_address.clone(),
            parts.confirmations,
        ));

        let owned = Arc::new(InventoryCollector::new(
            InventoryTarget::Owner,
            parts.inventory_source.clone(),
        ));
        let custody = Arc::new(InventoryCollector::new(
            InventoryTarget::Custody(parts.bundler_address),
            parts.inventory_source,
        ));

        let unbundle = Arc::new(BundlerPanel::new(
            Operation::Unbundle,
            session.clone(),
            owned,
            orchestrator.clone(),
        ));
        let rebundle = Arc::new(BundlerPanel::new(
            Operation::Rebundle,
            session.clone(),
            custody,
            orchestrator,
        ));

        Self {
            session,
            notifications,
            resolver,
            unbundle,
            rebundle,
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn notifications(&self) -> &Arc<NotificationLog> {
        &self.notifications
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn panel(&self, operation: Operation) -> &Arc<BundlerPanel> {
        match operation {
            Operation::Unbundle => &self.unbundle,
            Operation::Rebundle => &self.rebundle,
        }
    }

    /// Starts one session watcher per panel inventory.
    pub fn spawn_watchers(&self) -> Vec<JoinHandle<()>> {
        [&self.unbundle, &self.rebundle]
            .into_iter()
            .map(|panel| {
                info!(operation = %panel.operation(), "starting inventory watcher");
                tokio::spawn(panel.collector().clone().run(self.session.subscribe()))
            })
            .collect()
    }
}

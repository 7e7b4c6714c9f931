use ll_chain_client::WalletConnector;
use std::sync::Arc;
use tracing::{info, warn};

use crate::notify::Notifier;
use crate::session::WalletSession;

pub const CONNECTED_MESSAGE: &str = "Successfully connected!";
pub const CONNECT_FAILED_MESSAGE: &str = "Error when connecting wallet.";

/// The only writer of the session address.
pub struct AddressResolver {
    connector: Arc<dyn WalletConnector>,
    session: Arc<WalletSession>,
    notifier: Arc<dyn Notifier>,
}

impl AddressResolver {
    pub fn new(
        connector: Arc<dyn WalletConnector>,
        session: Arc<WalletSession>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            connector,
            session,
            notifier,
        }
    }

    /// Connects the wallet and publishes its account. Resolves either way;
    /// the outcome is reported through the notifier.
    pub async fn unlock(&self) {
        match self.connector.connect().await {
            Ok(address) => {
                info!(%address, "wallet unlocked");
                self.session.set_address(Some(address));
                self.notifier.success(CONNECTED_MESSAGE);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "wallet checks failed");
                self.notifier.error(CONNECT_FAILED_MESSAGE);
            }
        }
    }

    pub fn disconnect(&self) {
        self.connector.disconnect();
        self.session.set_address(None);
        info!("wallet disconnected");
    }
}

//! Authenticated session context.
//!
//! One writer (the address resolver, plus reload requests after a confirmed
//! operation) and many readers. Readers either sample the current value or
//! subscribe to the change signal.

use ll_api_types::WalletAddress;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub address: Option<WalletAddress>,
    /// Bumped on every explicit reload request.
    pub generation: u64,
}

pub struct WalletSession {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn address(&self) -> Option<WalletAddress> {
        self.tx.borrow().address.clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn set_address(&self, address: Option<WalletAddress>) {
        self.tx.send_if_modified(|state| {
            if state.address == address {
                return false;
            }
            state.address = address;
            true
        });
    }

    /// Asks every subscribed inventory to re-fetch.
    pub fn request_reload(&self) {
        self.tx.send_modify(|state| state.generation += 1);
    }
}

//! Token inventory collection.
//!
//! `InventoryCollector` owns the per-panel `idle → loading → ready | error`
//! state and replaces its snapshot wholesale on every fetch. `OnChainInventory`
//! is the direct-read source; the indexed source lives in `ll-subgraph`.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::future::try_join_all;
use ll_api_types::{ADDRESS_LEN, AttributeSlot, TokenId, TokenRecord, WalletAddress};
use ll_chain_client::{InventorySource, LootContract};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::session::SessionSnapshot;

pub const ONCHAIN_SOURCE: &str = "chain";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("No address provided")]
    NoAddress,
    #[error("Invalid address")]
    InvalidAddress,
    #[error("{0}")]
    Fetch(String),
}

/// Rejects absent or wrong-length addresses and lower-cases the rest.
///
/// The length is taken as given: padding is not stripped, so a padded address
/// is invalid.
pub fn validate_address(raw: Option<&str>) -> Result<WalletAddress, InventoryError> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        return Err(InventoryError::NoAddress);
    }
    if raw.chars().count() != ADDRESS_LEN {
        return Err(InventoryError::InvalidAddress);
    }
    Ok(WalletAddress(raw.to_lowercase()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub records: Vec<TokenRecord>,
    pub loading: bool,
    pub error: Option<InventoryError>,
}

impl InventorySnapshot {
    pub fn contains(&self, token_id: &TokenId) -> bool {
        self.records.iter().any(|record| &record.id == token_id)
    }
}

/// Whose bags a collector lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryTarget {
    /// The authenticated account.
    Owner,
    /// A fixed custodian, e.g. the bundler contract.
    Custody(WalletAddress),
}

struct CollectorState {
    snapshot: InventorySnapshot,
    fetch_generation: u64,
}

pub struct InventoryCollector {
    target: InventoryTarget,
    source: Arc<dyn InventorySource>,
    state: RwLock<CollectorState>,
}

impl InventoryCollector {
    pub fn new(target: InventoryTarget, source: Arc<dyn InventorySource>) -> Self {
        Self {
            target,
            source,
            state: RwLock::new(CollectorState {
                snapshot: InventorySnapshot::default(),
                fetch_generation: 0,
            }),
        }
    }

    pub fn target(&self) -> &InventoryTarget {
        &self.target
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    /// Fetches the bags held by `address`.
    ///
    /// A failed fetch clears the previous records so an error is never shown
    /// next to stale bags. If a newer fetch started meanwhile, its result wins
    /// and this call returns whatever is current.
    pub async fn fetch(&self, address: Option<&str>) -> InventorySnapshot {
        let address = match validate_address(address) {
            Ok(address) => address,
            Err(err) => {
                return self.update(None, |snapshot| {
                    *snapshot = InventorySnapshot {
                        records: Vec::new(),
                        loading: false,
                        error: Some(err),
                    };
                });
            }
        };

        let ticket = self.begin_loading();
        let result = self.source.bags_of(&address).await;

        self.update(Some(ticket), |snapshot| match result {
            Ok(records) => {
                debug!(owner = %address, count = records.len(), "inventory loaded");
                snapshot.records = records;
                snapshot.loading = false;
                snapshot.error = None;
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(owner = %address, error = %message, "inventory fetch failed");
                snapshot.records = Vec::new();
                snapshot.loading = false;
                snapshot.error = Some(InventoryError::Fetch(message));
            }
        })
    }

    /// Re-fetches for the given session account, or resets to idle when none.
    pub async fn refresh(&self, session_address: Option<&WalletAddress>) -> InventorySnapshot {
        let Some(user) = session_address else {
            return self.update(None, |snapshot| *snapshot = InventorySnapshot::default());
        };

        let query = match &self.target {
            InventoryTarget::Owner => user.as_str(),
            InventoryTarget::Custody(custodian) => custodian.as_str(),
        };
        self.fetch(Some(query)).await
    }

    /// Re-fetches on every session change until the session is dropped.
    pub async fn run(self: Arc<Self>, mut updates: watch::Receiver<SessionSnapshot>) {
        loop {
            let address = updates.borrow_and_update().address.clone();
            self.refresh(address.as_ref()).await;

            if updates.changed().await.is_err() {
                debug!("session closed; inventory watcher exiting");
                break;
            }
        }
    }

    fn begin_loading(&self) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.fetch_generation += 1;
        state.snapshot.loading = true;
        state.fetch_generation
    }

    /// Applies `change` unless `ticket` belongs to a superseded fetch.
    /// `None` always applies and supersedes any fetch in progress.
    fn update<F>(&self, ticket: Option<u64>, change: F) -> InventorySnapshot
    where
        F: FnOnce(&mut InventorySnapshot),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match ticket {
            Some(ticket) if ticket != state.fetch_generation => {
                debug!(
                    ticket,
                    current = state.fetch_generation,
                    "discarding stale inventory result"
                );
            }
            Some(_) => change(&mut state.snapshot),
            None => {
                state.fetch_generation += 1;
                change(&mut state.snapshot);
            }
        }
        state.snapshot.clone()
    }
}

/// Direct contract reads: `balanceOf`, then `tokenOfOwnerByIndex` for each
/// index, then the eight attribute getters per bag in parallel.
///
/// Sequential round-trips grow with the bag count; fine for small wallets.
pub struct OnChainInventory {
    loot: Arc<dyn LootContract>,
}

impl OnChainInventory {
    pub fn new(loot: Arc<dyn LootContract>) -> Self {
        Self { loot }
    }

    async fn record(&self, token_id: TokenId) -> Result<TokenRecord> {
        let values = try_join_all(
            AttributeSlot::ALL
                .iter()
                .map(|slot| self.loot.attribute(&token_id, *slot)),
        )
        .await?;

        let values: [String; 8] = values
            .try_into()
            .map_err(|_| anyhow!("bag #{token_id} did not yield eight attributes"))?;
        Ok(TokenRecord::from_slots(token_id, values))
    }
}

#[async_trait]
impl InventorySource for OnChainInventory {
    fn source_name(&self) -> &str {
        ONCHAIN_SOURCE
    }

    async fn bags_of(&self, owner: &WalletAddress) -> Result<Vec<TokenRecord>> {
        let balance = self.loot.balance_of(owner).await?;

        let mut token_ids = Vec::new();
        for index in 0..balance {
            token_ids.push(self.loot.token_of_owner_by_index(owner, index).await?);
        }

        let mut records = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            records.push(self.record(token_id).await?);
        }
        Ok(records)
    }
}

//! In-memory chain and wallet doubles that record every call.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use ll_api_types::{AttributeSlot, ComponentIds, TokenId, TokenRecord, WalletAddress};
use ll_chain_client::{BundlerContract, LootContract, PendingTx, TxWatcher, WalletConnector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) const USER: &str = "0x1111111111111111111111111111111111111111";
pub(crate) const BUNDLER: &str = "0x5b03597e82ca9115f05bebae4bf8fae823ca5d9c";

pub(crate) fn user() -> WalletAddress {
    WalletAddress(USER.to_owned())
}

pub(crate) fn bundler() -> WalletAddress {
    WalletAddress(BUNDLER.to_owned())
}

pub(crate) fn bag(id: &str) -> TokenRecord {
    TokenRecord::from_slots(
        TokenId::from(id),
        AttributeSlot::ALL.map(|slot| format!("{} of bag {id}", slot.name())),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    BalanceOf(String),
    TokenOfOwnerByIndex(String, u64),
    Attribute(String, AttributeSlot),
    Transfer { from: String, to: String, token_id: String },
    ComponentIds(String),
    BalanceOfBatch(Vec<String>),
    IsApprovedForAll { owner: String, operator: String },
    SetApprovalForAll { owner: String, operator: String, approved: bool },
    Reassemble { caller: String, token_id: String },
    Wait(String),
}

impl Call {
    pub(crate) fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::Transfer { .. } | Call::SetApprovalForAll { .. } | Call::Reassemble { .. }
        )
    }
}

#[derive(Default)]
pub(crate) struct MockChain {
    calls: Mutex<Vec<Call>>,
    bags: Mutex<HashMap<String, Vec<TokenRecord>>>,
    item_balances: Mutex<Vec<u128>>,
    pub(crate) approved: AtomicBool,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_transfer: AtomicBool,
    pub(crate) revert_reassemble: AtomicBool,
    confirmation_gate: Mutex<Option<Arc<Notify>>>,
    tx_counter: AtomicU64,
}

impl MockChain {
    pub(crate) fn new() -> Arc<Self> {
        let chain = Self::default();
        chain.set_item_balances(vec![1; 8]);
        Arc::new(chain)
    }

    pub(crate) fn set_bags(&self, owner: &str, bags: Vec<TokenRecord>) {
        self.bags
            .lock()
            .expect("bags lock")
            .insert(owner.to_lowercase(), bags);
    }

    pub(crate) fn set_item_balances(&self, balances: Vec<u128>) {
        *self.item_balances.lock().expect("balances lock") = balances;
    }

    /// Confirmation waits park until the returned handle is notified.
    pub(crate) fn gate_confirmations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.confirmation_gate.lock().expect("gate lock") = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn owned(&self, owner: &WalletAddress) -> Vec<TokenRecord> {
        self.bags
            .lock()
            .expect("bags lock")
            .get(&owner.0.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn next_tx(&self) -> PendingTx {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        PendingTx {
            tx_hash: format!("0x{n:064x}"),
        }
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("rpc unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl LootContract for MockChain {
    async fn balance_of(&self, owner: &WalletAddress) -> Result<u64> {
        self.record(Call::BalanceOf(owner.0.clone()));
        self.check_reads()?;
        Ok(self.owned(owner).len() as u64)
    }

    async fn token_of_owner_by_index(&self, owner: &WalletAddress, index: u64) -> Result<TokenId> {
        self.record(Call::TokenOfOwnerByIndex(owner.0.clone(), index));
        self.check_reads()?;
        self.owned(owner)
            .get(index as usize)
            .map(|record| record.id.clone())
            .ok_or_else(|| anyhow!("index {index} out of bounds"))
    }

    async fn attribute(&self, token_id: &TokenId, slot: AttributeSlot) -> Result<String> {
        self.record(Call::Attribute(token_id.0.clone(), slot));
        self.check_reads()?;
        Ok(bag(token_id.as_str()).attribute(slot).to_owned())
    }

    async fn safe_transfer_from(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        token_id: &TokenId,
    ) -> Result<PendingTx> {
        self.record(Call::Transfer {
            from: from.0.clone(),
            to: to.0.clone(),
            token_id: token_id.0.clone(),
        });
        if self.fail_transfer.load(Ordering::SeqCst) {
            bail!("user rejected transaction");
        }
        Ok(self.next_tx())
    }
}

#[async_trait]
impl BundlerContract for MockChain {
    async fn component_ids(&self, token_id: &TokenId) -> Result<ComponentIds> {
        self.record(Call::ComponentIds(token_id.0.clone()));
        self.check_reads()?;
        let base: u64 = token_id.0.parse().unwrap_or_default();
        Ok(ComponentIds(std::array::from_fn(|slot| {
            (base * 100 + slot as u64).to_string()
        })))
    }

    async fn balance_of_batch(
        &self,
        owners: &[WalletAddress],
        ids: &ComponentIds,
    ) -> Result<Vec<u128>> {
        self.record(Call::BalanceOfBatch(
            owners.iter().map(|owner| owner.0.clone()).collect(),
        ));
        self.check_reads()?;
        if owners.len() != ids.0.len() {
            bail!("accounts and ids length mismatch");
        }
        Ok(self.item_balances.lock().expect("balances lock").clone())
    }

    async fn is_approved_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
    ) -> Result<bool> {
        self.record(Call::IsApprovedForAll {
            owner: owner.0.clone(),
            operator: operator.0.clone(),
        });
        self.check_reads()?;
        Ok(self.approved.load(Ordering::SeqCst))
    }

    async fn set_approval_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
        approved: bool,
    ) -> Result<PendingTx> {
        self.record(Call::SetApprovalForAll {
            owner: owner.0.clone(),
            operator: operator.0.clone(),
            approved,
        });
        self.approved.store(approved, Ordering::SeqCst);
        Ok(self.next_tx())
    }

    async fn reassemble(&self, caller: &WalletAddress, token_id: &TokenId) -> Result<PendingTx> {
        self.record(Call::Reassemble {
            caller: caller.0.clone(),
            token_id: token_id.0.clone(),
        });
        Ok(self.next_tx())
    }
}

#[async_trait]
impl TxWatcher for MockChain {
    async fn wait_for_confirmations(&self, tx: &PendingTx, _confirmations: u64) -> Result<()> {
        self.record(Call::Wait(tx.tx_hash.clone()));
        let gate = self.confirmation_gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reassembled = self
            .calls()
            .iter()
            .rev()
            .nth(1)
            .is_some_and(|call| matches!(call, Call::Reassemble { .. }));
        if reassembled && self.revert_reassemble.load(Ordering::SeqCst) {
            bail!("transaction {} reverted", tx.tx_hash);
        }
        Ok(())
    }
}

pub(crate) struct MockConnector {
    result: Mutex<Result<WalletAddress, String>>,
    pub(crate) disconnects: AtomicU64,
}

impl MockConnector {
    pub(crate) fn returning(address: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(WalletAddress(address.to_owned()))),
            disconnects: AtomicU64::new(0),
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Err(message.to_owned())),
            disconnects: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl WalletConnector for MockConnector {
    async fn connect(&self) -> Result<WalletAddress> {
        self.result
            .lock()
            .expect("connector lock")
            .clone()
            .map_err(|message| anyhow!(message))
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

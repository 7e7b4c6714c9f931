use anyhow::Result;
use async_trait::async_trait;
use ll_api_types::{AttributeSlot, ComponentIds, TokenId, TokenRecord, WalletAddress};

/// A submitted, not yet confirmed, chain-mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: String,
}

/// Read and transfer surface of the ERC-721 bag contract.
#[async_trait]
pub trait LootContract: Send + Sync {
    async fn balance_of(&self, owner: &WalletAddress) -> Result<u64>;
    async fn token_of_owner_by_index(&self, owner: &WalletAddress, index: u64) -> Result<TokenId>;
    async fn attribute(&self, token_id: &TokenId, slot: AttributeSlot) -> Result<String>;
    async fn safe_transfer_from(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        token_id: &TokenId,
    ) -> Result<PendingTx>;
}

/// ERC-1155 bundler that holds bags and mints their items.
#[async_trait]
pub trait BundlerContract: Send + Sync {
    async fn component_ids(&self, token_id: &TokenId) -> Result<ComponentIds>;
    async fn balance_of_batch(
        &self,
        owners: &[WalletAddress],
        ids: &ComponentIds,
    ) -> Result<Vec<u128>>;
    async fn is_approved_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
    ) -> Result<bool>;
    async fn set_approval_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
        approved: bool,
    ) -> Result<PendingTx>;
    async fn reassemble(&self, caller: &WalletAddress, token_id: &TokenId) -> Result<PendingTx>;
}

#[async_trait]
pub trait TxWatcher: Send + Sync {
    /// Resolves once `tx` has `confirmations` blocks on top and did not revert.
    async fn wait_for_confirmations(&self, tx: &PendingTx, confirmations: u64) -> Result<()>;
}

/// Anything that can list the bags held by an address.
#[async_trait]
pub trait InventorySource: Send + Sync {
    fn source_name(&self) -> &str;
    async fn bags_of(&self, owner: &WalletAddress) -> Result<Vec<TokenRecord>>;
}

/// Wallet selection plus connectivity checks.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self) -> Result<WalletAddress>;
    fn disconnect(&self);
}

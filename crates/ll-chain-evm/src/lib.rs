use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use ll_api_types::{AttributeSlot, ComponentIds, TokenId, WalletAddress};
use ll_chain_client::{BundlerContract, LootContract, PendingTx, TxWatcher, WalletConnector};
use tracing::{debug, info};

sol! {
    #[sol(rpc)]
    interface ILoot {
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function getWeapon(uint256 tokenId) external view returns (string memory);
        function getChest(uint256 tokenId) external view returns (string memory);
        function getHead(uint256 tokenId) external view returns (string memory);
        function getWaist(uint256 tokenId) external view returns (string memory);
        function getFoot(uint256 tokenId) external view returns (string memory);
        function getHand(uint256 tokenId) external view returns (string memory);
        function getNeck(uint256 tokenId) external view returns (string memory);
        function getRing(uint256 tokenId) external view returns (string memory);
        function safeTransferFrom(address from, address to, uint256 tokenId) external;
    }

    #[sol(rpc)]
    interface ILootLoose {
        struct ItemIds {
            uint256 weapon;
            uint256 chest;
            uint256 head;
            uint256 waist;
            uint256 foot;
            uint256 hand;
            uint256 neck;
            uint256 ring;
        }

        function ids(uint256 tokenId) external pure returns (ItemIds memory);
        function balanceOfBatch(address[] accounts, uint256[] ids)
            external
            view
            returns (uint256[] memory);
        function isApprovedForAll(address account, address operator) external view returns (bool);
        function setApprovalForAll(address operator, bool approved) external;
        function reassemble(uint256 tokenId) external;
    }
}

/// JSON-RPC endpoint plus the account that signs for this process.
///
/// With a private key the signing handle lives in-process; without one the
/// endpoint's first managed account is used and the node signs.
#[derive(Clone)]
pub struct EvmEndpoint {
    provider: DynProvider,
    signer_address: Option<Address>,
}

impl EvmEndpoint {
    pub fn connect(rpc_url: &str, private_key: Option<&str>) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url: {rpc_url}"))?;

        let (provider, signer_address) = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .context("invalid private key")?;
                let address = signer.address();
                let provider = ProviderBuilder::new().wallet(signer).connect_http(url).erased();
                (provider, Some(address))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        Ok(Self {
            provider,
            signer_address,
        })
    }

    pub fn contracts(&self, loot: &WalletAddress, bundler: &WalletAddress) -> Result<EvmContracts> {
        Ok(EvmContracts {
            provider: self.provider.clone(),
            loot: parse_address(loot)?,
            bundler: parse_address(bundler)?,
        })
    }

    pub fn wallet_connector(&self, expected_chain_id: u64) -> EvmWalletConnector {
        EvmWalletConnector {
            provider: self.provider.clone(),
            signer_address: self.signer_address,
            expected_chain_id,
        }
    }
}

/// Both bag contracts behind a single provider.
pub struct EvmContracts {
    provider: DynProvider,
    loot: Address,
    bundler: Address,
}

impl EvmContracts {
    fn loot(&self) -> ILoot::ILootInstance<DynProvider> {
        ILoot::new(self.loot, self.provider.clone())
    }

    fn bundler(&self) -> ILootLoose::ILootLooseInstance<DynProvider> {
        ILootLoose::new(self.bundler, self.provider.clone())
    }
}

#[async_trait]
impl LootContract for EvmContracts {
    async fn balance_of(&self, owner: &WalletAddress) -> Result<u64> {
        let owner = parse_address(owner)?;
        let balance = self
            .loot()
            .balanceOf(owner)
            .call()
            .await
            .context("loot balanceOf")?;
        u64::try_from(balance).map_err(|_| anyhow!("bag balance {balance} out of range"))
    }

    async fn token_of_owner_by_index(&self, owner: &WalletAddress, index: u64) -> Result<TokenId> {
        let owner = parse_address(owner)?;
        let token = self
            .loot()
            .tokenOfOwnerByIndex(owner, U256::from(index))
            .call()
            .await
            .with_context(|| format!("loot tokenOfOwnerByIndex({index})"))?;
        Ok(TokenId(token.to_string()))
    }

    async fn attribute(&self, token_id: &TokenId, slot: AttributeSlot) -> Result<String> {
        let id = parse_token_id(token_id)?;
        let loot = self.loot();
        let value = match slot {
            AttributeSlot::Weapon => loot.getWeapon(id).call().await,
            AttributeSlot::Chest => loot.getChest(id).call().await,
            AttributeSlot::Head => loot.getHead(id).call().await,
            AttributeSlot::Waist => loot.getWaist(id).call().await,
            AttributeSlot::Foot => loot.getFoot(id).call().await,
            AttributeSlot::Hand => loot.getHand(id).call().await,
            AttributeSlot::Neck => loot.getNeck(id).call().await,
            AttributeSlot::Ring => loot.getRing(id).call().await,
        };
        value.with_context(|| format!("loot {} of bag #{token_id}", slot.name()))
    }

    async fn safe_transfer_from(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        token_id: &TokenId,
    ) -> Result<PendingTx> {
        let from = parse_address(from)?;
        let to = parse_address(to)?;
        let id = parse_token_id(token_id)?;

        let pending = self
            .loot()
            .safeTransferFrom(from, to, id)
            .from(from)
            .send()
            .await
            .with_context(|| format!("loot safeTransferFrom bag #{token_id}"))?;

        let tx_hash = pending.tx_hash().to_string();
        debug!(%tx_hash, %token_id, "submitted bag transfer");
        Ok(PendingTx { tx_hash })
    }
}

#[async_trait]
impl BundlerContract for EvmContracts {
    async fn component_ids(&self, token_id: &TokenId) -> Result<ComponentIds> {
        let id = parse_token_id(token_id)?;
        let ids = self
            .bundler()
            .ids(id)
            .call()
            .await
            .with_context(|| format!("bundler ids of bag #{token_id}"))?;

        Ok(ComponentIds([
            ids.weapon.to_string(),
            ids.chest.to_string(),
            ids.head.to_string(),
            ids.waist.to_string(),
            ids.foot.to_string(),
            ids.hand.to_string(),
            ids.neck.to_string(),
            ids.ring.to_string(),
        ]))
    }

    async fn balance_of_batch(
        &self,
        owners: &[WalletAddress],
        ids: &ComponentIds,
    ) -> Result<Vec<u128>> {
        let owners = owners.iter().map(parse_address).collect::<Result<Vec<_>>>()?;
        let ids = ids
            .0
            .iter()
            .map(|id| parse_token_id(&TokenId(id.clone())))
            .collect::<Result<Vec<_>>>()?;

        let balances = self
            .bundler()
            .balanceOfBatch(owners, ids)
            .call()
            .await
            .context("bundler balanceOfBatch")?;

        Ok(balances
            .into_iter()
            .map(|balance| u128::try_from(balance).unwrap_or(u128::MAX))
            .collect())
    }

    async fn is_approved_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
    ) -> Result<bool> {
        let owner = parse_address(owner)?;
        let operator = parse_address(operator)?;
        self.bundler()
            .isApprovedForAll(owner, operator)
            .call()
            .await
            .context("bundler isApprovedForAll")
    }

    async fn set_approval_for_all(
        &self,
        owner: &WalletAddress,
        operator: &WalletAddress,
        approved: bool,
    ) -> Result<PendingTx> {
        let owner = parse_address(owner)?;
        let operator = parse_address(operator)?;

        let pending = self
            .bundler()
            .setApprovalForAll(operator, approved)
            .from(owner)
            .send()
            .await
            .context("bundler setApprovalForAll")?;

        Ok(PendingTx {
            tx_hash: pending.tx_hash().to_string(),
        })
    }

    async fn reassemble(&self, caller: &WalletAddress, token_id: &TokenId) -> Result<PendingTx> {
        let caller = parse_address(caller)?;
        let id = parse_token_id(token_id)?;

        let pending = self
            .bundler()
            .reassemble(id)
            .from(caller)
            .send()
            .await
            .with_context(|| format!("bundler reassemble bag #{token_id}"))?;

        let tx_hash = pending.tx_hash().to_string();
        debug!(%tx_hash, %token_id, "submitted reassemble");
        Ok(PendingTx { tx_hash })
    }
}

#[async_trait]
impl TxWatcher for EvmContracts {
    async fn wait_for_confirmations(&self, tx: &PendingTx, confirmations: u64) -> Result<()> {
        let hash: TxHash = tx
            .tx_hash
            .parse()
            .with_context(|| format!("invalid tx hash {}", tx.tx_hash))?;

        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .with_context(|| format!("waiting for {}", tx.tx_hash))?;

        if !receipt.status() {
            bail!("transaction {} reverted", tx.tx_hash);
        }

        debug!(tx_hash = %tx.tx_hash, confirmations, "transaction confirmed");
        Ok(())
    }
}

pub struct EvmWalletConnector {
    provider: DynProvider,
    signer_address: Option<Address>,
    expected_chain_id: u64,
}

#[async_trait]
impl WalletConnector for EvmWalletConnector {
    async fn connect(&self) -> Result<WalletAddress> {
        // connect check
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .context("wallet endpoint unreachable")?;
        if chain_id != self.expected_chain_id {
            bail!(
                "wallet is on chain {chain_id}, expected {}",
                self.expected_chain_id
            );
        }

        // accounts check
        let account = match self.signer_address {
            Some(address) => address,
            None => self
                .provider
                .get_accounts()
                .await
                .context("wallet accounts")?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("wallet exposes no accounts"))?,
        };

        info!(%account, chain_id, "wallet connected");
        Ok(WalletAddress(account.to_checksum(None)))
    }

    fn disconnect(&self) {
        debug!("wallet disconnected");
    }
}

fn parse_address(value: &WalletAddress) -> Result<Address> {
    value
        .0
        .parse()
        .with_context(|| format!("invalid address: {}", value.0))
}

fn parse_token_id(value: &TokenId) -> Result<U256> {
    U256::from_str_radix(&value.0, 10).map_err(|err| anyhow!("invalid token id {}: {err}", value.0))
}

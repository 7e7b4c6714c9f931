use anyhow::{Context, Result, anyhow, bail};
use ll_api_types::WalletAddress;
use ll_wallet_core::{DEFAULT_CONFIRMATIONS, ONCHAIN_SOURCE, validate_address};
use ll_subgraph::SUBGRAPH_SOURCE;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_CHAIN_ID: u64 = 4;
const DEFAULT_LOOT_ADDRESS: &str = "0xff9c1b15b16263c61d017ee9f65c50e4ae0113d7";
const DEFAULT_BUNDLER_ADDRESS: &str = "0x5b03597e82ca9115f05bebae4bf8fae823ca5d9c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InventorySourceKind {
    Chain,
    Subgraph { url: String },
}

impl InventorySourceKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Chain => ONCHAIN_SOURCE,
            Self::Subgraph { .. } => SUBGRAPH_SOURCE,
        }
    }
}

/// Startup settings, read once from `LOOTLOOSE_*` variables.
#[derive(Clone)]
pub(crate) struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub rpc_url: String,
    pub chain_id: u64,
    pub loot_address: WalletAddress,
    pub bundler_address: WalletAddress,
    pub private_key: Option<String>,
    pub inventory_source: InventorySourceKind,
    pub confirmations: u64,
    pub cors_origin: Option<String>,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let bind_addr: SocketAddr = var("LOOTLOOSE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .context("LOOTLOOSE_BIND_ADDR must be a socket address")?;

        let chain_id: u64 = match var("LOOTLOOSE_CHAIN_ID") {
            Some(raw) => raw.parse().context("LOOTLOOSE_CHAIN_ID must be an integer")?,
            None => DEFAULT_CHAIN_ID,
        };

        let confirmations: u64 = match var("LOOTLOOSE_CONFIRMATIONS") {
            Some(raw) => raw
                .parse()
                .context("LOOTLOOSE_CONFIRMATIONS must be an integer")?,
            None => DEFAULT_CONFIRMATIONS,
        };
        if confirmations == 0 {
            bail!("LOOTLOOSE_CONFIRMATIONS must be at least 1");
        }

        let inventory_source = match var("LOOTLOOSE_INVENTORY_SOURCE").as_deref() {
            None | Some(ONCHAIN_SOURCE) => InventorySourceKind::Chain,
            Some(SUBGRAPH_SOURCE) => InventorySourceKind::Subgraph {
                url: var("LOOTLOOSE_SUBGRAPH_URL")
                    .ok_or_else(|| anyhow!("LOOTLOOSE_SUBGRAPH_URL is required for subgraph"))?,
            },
            Some(other) => bail!("unknown LOOTLOOSE_INVENTORY_SOURCE: {other}"),
        };

        Ok(Self {
            bind_addr,
            rpc_url: var("LOOTLOOSE_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_owned()),
            chain_id,
            loot_address: address(var("LOOTLOOSE_LOOT_ADDRESS"), DEFAULT_LOOT_ADDRESS)
                .context("LOOTLOOSE_LOOT_ADDRESS")?,
            bundler_address: address(var("LOOTLOOSE_BUNDLER_ADDRESS"), DEFAULT_BUNDLER_ADDRESS)
                .context("LOOTLOOSE_BUNDLER_ADDRESS")?,
            private_key: var("LOOTLOOSE_PRIVATE_KEY"),
            inventory_source,
            confirmations,
            cors_origin: var("LOOTLOOSE_CORS_ORIGIN"),
        })
    }
}

fn address(raw: Option<String>, default: &str) -> Result<WalletAddress> {
    let raw = raw.unwrap_or_else(|| default.to_owned());
    validate_address(Some(&raw)).map_err(|err| anyhow!("{err}: {raw}"))
}

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use ll_api_types::{TokenRecord, WalletAddress};
use ll_chain_client::InventorySource;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub const SUBGRAPH_SOURCE: &str = "subgraph";

const WALLET_BAGS_QUERY: &str = "query WalletBags($address: String!) {
  wallet(id: $address) {
    bags {
      id
      weapon
      chest
      head
      waist
      foot
      hand
      neck
      ring
    }
  }
}";

/// Indexed bag lookup against a Loot subgraph.
///
/// One GraphQL round-trip per wallet instead of per-token contract reads.
pub struct SubgraphInventory {
    endpoint: String,
    http: reqwest::Client,
}

impl SubgraphInventory {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

// ── GraphQL wire types ──

#[derive(Debug, Serialize)]
struct GraphqlRequest {
    query: &'static str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<WalletData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WalletData {
    wallet: Option<WalletRecord>,
}

#[derive(Debug, Deserialize)]
struct WalletRecord {
    #[serde(default)]
    bags: Vec<TokenRecord>,
}

fn bags_from_response(response: GraphqlResponse) -> Result<Vec<TokenRecord>> {
    if let Some(error) = response.errors.into_iter().next() {
        return Err(anyhow!(error.message));
    }

    response
        .data
        .and_then(|data| data.wallet)
        .map(|wallet| wallet.bags)
        .ok_or_else(|| anyhow!("No bags found at this address."))
}

#[async_trait]
impl InventorySource for SubgraphInventory {
    fn source_name(&self) -> &str {
        SUBGRAPH_SOURCE
    }

    async fn bags_of(&self, owner: &WalletAddress) -> Result<Vec<TokenRecord>> {
        let body = GraphqlRequest {
            query: WALLET_BAGS_QUERY,
            variables: json!({ "address": owner.0 }),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("subgraph transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("subgraph HTTP {status}: {text}");
        }

        let parsed: GraphqlResponse = response.json().await.context("subgraph parse")?;
        let bags = bags_from_response(parsed)?;
        debug!(owner = %owner, count = bags.len(), "subgraph returned bags");
        Ok(bags)
    }
}

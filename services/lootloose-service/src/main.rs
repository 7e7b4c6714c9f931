mod chain_config;
mod config;
mod panels;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    routing::{get, post},
};
use chain_config::chain_config;
use config::{InventorySourceKind, ServiceConfig};
use ll_api_types::{NotificationsResponse, WalletAddress, WalletResponse};
use ll_chain_client::InventorySource;
use ll_chain_evm::EvmEndpoint;
use ll_subgraph::SubgraphInventory;
use ll_wallet_core::{BundlerCore, CoreParts, DEFAULT_NOTIFICATION_CAPACITY, OnChainInventory};
use panels::{panel_refresh, panel_select, panel_submit, panel_view};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

const SERVICE_NAME: &str = "lootloose-service";

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct NotificationsQuery {
    after: Option<u64>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Static chain facts reported by `/chain/config`.
struct ChainSettings {
    chain_id: u64,
    loot_address: WalletAddress,
    bundler_address: WalletAddress,
    inventory_source: &'static str,
    confirmations: u64,
}

struct AppState {
    core: Arc<BundlerCore>,
    chain: ChainSettings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;

    let endpoint = EvmEndpoint::connect(&config.rpc_url, config.private_key.as_deref())?;
    let contracts = Arc::new(endpoint.contracts(&config.loot_address, &config.bundler_address)?);
    let inventory_source: Arc<dyn InventorySource> = match &config.inventory_source {
        InventorySourceKind::Chain => Arc::new(OnChainInventory::new(contracts.clone())),
        InventorySourceKind::Subgraph { url } => Arc::new(SubgraphInventory::new(url.clone())),
    };
    info!(
        rpc_url = %config.rpc_url,
        chain_id = config.chain_id,
        inventory = inventory_source.source_name(),
        "chain endpoint configured"
    );

    let core = Arc::new(BundlerCore::new(CoreParts {
        connector: Arc::new(endpoint.wallet_connector(config.chain_id)),
        inventory_source,
        loot: contracts.clone(),
        bundler: contracts.clone(),
        watcher: contracts,
        bundler_address: config.bundler_address.clone(),
        confirmations: config.confirmations,
        notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
    }));
    let _watchers = core.spawn_watchers();

    let state = Arc::new(AppState {
        core,
        chain: ChainSettings {
            chain_id: config.chain_id,
            loot_address: config.loot_address.clone(),
            bundler_address: config.bundler_address.clone(),
            inventory_source: config.inventory_source.name(),
            confirmations: config.confirmations,
        },
    });

    let app = router(state).layer(cors_layer(config.cors_origin.as_deref())?);

    info!("{SERVICE_NAME} listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/chain/config", get(chain_config))
        .route("/wallet", get(wallet))
        .route("/wallet/unlock", post(wallet_unlock))
        .route("/wallet/disconnect", post(wallet_disconnect))
        .route("/panels/{operation}", get(panel_view))
        .route("/panels/{operation}/select", post(panel_select))
        .route("/panels/{operation}/submit", post(panel_submit))
        .route("/panels/{operation}/refresh", post(panel_refresh))
        .route("/notifications", get(notifications))
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("invalid LOOTLOOSE_CORS_ORIGIN: {origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn wallet_response(state: &AppState) -> WalletResponse {
    let address = state.core.session().address();
    WalletResponse {
        display: address.as_ref().map(WalletAddress::truncated),
        address: address.map(|address| address.0),
    }
}

async fn wallet(State(state): State<Arc<AppState>>) -> Json<WalletResponse> {
    Json(wallet_response(&state))
}

async fn wallet_unlock(State(state): State<Arc<AppState>>) -> Json<WalletResponse> {
    state.core.resolver().unlock().await;
    Json(wallet_response(&state))
}

async fn wallet_disconnect(State(state): State<Arc<AppState>>) -> Json<WalletResponse> {
    state.core.resolver().disconnect();
    Json(wallet_response(&state))
}

async fn notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationsQuery>,
) -> Json<NotificationsResponse> {
    Json(NotificationsResponse {
        notifications: state.core.notifications().after(query.after.unwrap_or(0)),
    })
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn not_found(message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn conflict(message: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use ll_api_types::{
        AttributeSlot, ButtonAction, ChainConfigResponse, ComponentIds, NotificationLevel,
        PanelView, TokenId,
    };
    use ll_chain_client::{BundlerContract, LootContract, PendingTx, TxWatcher, WalletConnector};
    use serde::de::DeserializeOwned;
    use std::time::Duration;
    use tower::ServiceExt;

    const USER: &str = "0x1111111111111111111111111111111111111111";
    const BUNDLER: &str = "0x5b03597e82ca9115f05bebae4bf8fae823ca5d9c";
    const LOOT: &str = "0xff9c1b15b16263c61d017ee9f65c50e4ae0113d7";

    /// One user holding bags #3 and #8; the bundler holds #50.
    struct FakeChain;

    impl FakeChain {
        fn owned(owner: &WalletAddress) -> Vec<&'static str> {
            match owner.as_str() {
                USER => vec!["3", "8"],
                BUNDLER => vec!["50"],
                _ => Vec::new(),
            }
        }
    }

    #[async_trait]
    impl LootContract for FakeChain {
        async fn balance_of(&self, owner: &WalletAddress) -> Result<u64> {
            Ok(Self::owned(owner).len() as u64)
        }

        async fn token_of_owner_by_index(
            &self,
            owner: &WalletAddress,
            index: u64,
        ) -> Result<TokenId> {
            match Self::owned(owner).get(index as usize) {
                Some(id) => Ok(TokenId::from(*id)),
                None => bail!("index out of bounds"),
            }
        }

        async fn attribute(&self, token_id: &TokenId, slot: AttributeSlot) -> Result<String> {
            Ok(format!("{} {token_id}", slot.name()))
        }

        async fn safe_transfer_from(
            &self,
            _: &WalletAddress,
            _: &WalletAddress,
            token_id: &TokenId,
        ) -> Result<PendingTx> {
            Ok(PendingTx {
                tx_hash: format!("0xtransfer{token_id}"),
            })
        }
    }

    #[async_trait]
    impl BundlerContract for FakeChain {
        async fn component_ids(&self, _: &TokenId) -> Result<ComponentIds> {
            Ok(ComponentIds(std::array::from_fn(|slot| slot.to_string())))
        }

        async fn balance_of_batch(
            &self,
            owners: &[WalletAddress],
            _: &ComponentIds,
        ) -> Result<Vec<u128>> {
            Ok(vec![1; owners.len()])
        }

        async fn is_approved_for_all(&self, _: &WalletAddress, _: &WalletAddress) -> Result<bool> {
            Ok(true)
        }

        async fn set_approval_for_all(
            &self,
            _: &WalletAddress,
            _: &WalletAddress,
            _: bool,
        ) -> Result<PendingTx> {
            bail!("approval already granted")
        }

        async fn reassemble(&self, _: &WalletAddress, token_id: &TokenId) -> Result<PendingTx> {
            Ok(PendingTx {
                tx_hash: format!("0xreassemble{token_id}"),
            })
        }
    }

    #[async_trait]
    impl TxWatcher for FakeChain {
        async fn wait_for_confirmations(&self, _: &PendingTx, _: u64) -> Result<()> {
            Ok(())
        }
    }

    struct FakeWallet;

    #[async_trait]
    impl WalletConnector for FakeWallet {
        async fn connect(&self) -> Result<WalletAddress> {
            Ok(WalletAddress(USER.to_owned()))
        }

        fn disconnect(&self) {}
    }

    fn test_state() -> Arc<AppState> {
        let chain = Arc::new(FakeChain);
        let core = BundlerCore::new(CoreParts {
            connector: Arc::new(FakeWallet),
            inventory_source: Arc::new(OnChainInventory::new(chain.clone())),
            loot: chain.clone(),
            bundler: chain.clone(),
            watcher: chain,
            bundler_address: WalletAddress(BUNDLER.to_owned()),
            confirmations: 1,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        });
        Arc::new(AppState {
            core: Arc::new(core),
            chain: ChainSettings {
                chain_id: 4,
                loot_address: WalletAddress(LOOT.to_owned()),
                bundler_address: WalletAddress(BUNDLER.to_owned()),
                inventory_source: "chain",
                confirmations: 1,
            },
        })
    }

    async fn call(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))?,
            None => request.body(Body::empty())?,
        };
        let response = router(state.clone()).oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    async fn call_json<T: DeserializeOwned>(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> Result<(StatusCode, T)> {
        let (status, bytes) = call(state, method, uri, body).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    async fn get_json<T: DeserializeOwned>(
        state: &Arc<AppState>,
        uri: &str,
    ) -> Result<(StatusCode, T)> {
        call_json(state, "GET", uri, None).await
    }

    async fn post_json<T: DeserializeOwned>(
        state: &Arc<AppState>,
        uri: &str,
        body: Option<&str>,
    ) -> Result<(StatusCode, T)> {
        call_json(state, "POST", uri, body).await
    }

    #[tokio::test]
    async fn health_and_chain_config() -> Result<()> {
        let state = test_state();

        let (status, body): (_, serde_json::Value) = get_json(&state, "/health").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["status"], "ok");

        let (status, config): (_, ChainConfigResponse) = get_json(&state, "/chain/config").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config.chain_id, 4);
        assert_eq!(config.bundler_address, BUNDLER);
        assert_eq!(config.inventory_source, "chain");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_operation_is_not_found() -> Result<()> {
        let state = test_state();
        let (status, body): (_, serde_json::Value) = get_json(&state, "/panels/melt").await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown operation: melt");
        Ok(())
    }

    #[tokio::test]
    async fn panels_ask_for_authentication_first() -> Result<()> {
        let state = test_state();

        let (status, view): (_, PanelView) = get_json(&state, "/panels/unbundle").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view.status.as_deref(), Some("Please authenticate first"));
        assert_eq!(view.button.action, ButtonAction::Authenticate);

        let (status, _) = call(&state, "POST", "/panels/unbundle/submit", None).await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn wallet_unlock_and_disconnect() -> Result<()> {
        let state = test_state();

        let (_, wallet): (_, WalletResponse) = post_json(&state, "/wallet/unlock", None).await?;
        assert_eq!(wallet.address.as_deref(), Some(USER));
        assert_eq!(wallet.display.as_deref(), Some("0x1111...1111"));

        let (_, wallet): (_, WalletResponse) = post_json(&state, "/wallet/disconnect", None).await?;
        assert_eq!(wallet.address, None);
        assert_eq!(wallet.display, None);

        let (_, feed): (_, NotificationsResponse) = get_json(&state, "/notifications").await?;
        assert_eq!(feed.notifications.len(), 1);
        assert_eq!(feed.notifications[0].message, "Successfully connected!");
        Ok(())
    }

    #[tokio::test]
    async fn select_and_submit_unbundle() -> Result<()> {
        let state = test_state();
        call(&state, "POST", "/wallet/unlock", None).await?;

        let (_, view): (_, PanelView) = post_json(&state, "/panels/unbundle/refresh", None).await?;
        let ids: Vec<&str> = view.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "8"]);

        let (status, body): (_, serde_json::Value) =
            post_json(&state, "/panels/unbundle/select", Some(r#"{"token_id":"50"}"#)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bag #50 is not listed");

        let (status, view): (_, PanelView) =
            post_json(&state, "/panels/unbundle/select", Some(r#"{"token_id":"8"}"#)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view.selected.as_deref(), Some("8"));
        assert_eq!(view.button.label, "Unbundle bag #8");

        let (status, view): (_, PanelView) =
            post_json(&state, "/panels/unbundle/submit", None).await?;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(view.submitting);

        let mut messages = Vec::new();
        for _ in 0..200 {
            let (_, feed): (_, NotificationsResponse) =
                get_json(&state, "/notifications?after=1").await?;
            if !feed.notifications.is_empty() {
                messages = feed.notifications;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, NotificationLevel::Success);
        assert_eq!(messages[0].message, "Successfully unbundled loot bag #8");

        let (_, view): (_, PanelView) = get_json(&state, "/panels/unbundle").await?;
        assert_eq!(view.selected, None);
        assert!(!view.submitting);
        Ok(())
    }

    #[tokio::test]
    async fn rebundle_panel_lists_custody() -> Result<()> {
        let state = test_state();
        call(&state, "POST", "/wallet/unlock", None).await?;

        let (_, view): (_, PanelView) = post_json(&state, "/panels/rebundle/refresh", None).await?;
        assert_eq!(view.title, "Bundle Items");
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].label, "Bag #50");
        assert_eq!(view.button.label, "Select bag to reclaim");
        Ok(())
    }

    #[test]
    fn cors_origin_must_be_a_header_value() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://lootloose.example")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}

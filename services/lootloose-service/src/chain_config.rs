use axum::{Json, extract::State};
use ll_api_types::ChainConfigResponse;
use std::sync::Arc;

use crate::{ApiResult, AppState};

/// Returns the chain and contracts this service is wired to.
///
/// Front ends use it to check that the user's wallet is on the same network
/// before asking them to sign anything.
pub(crate) async fn chain_config(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ChainConfigResponse> {
    Ok(Json(ChainConfigResponse {
        chain_id: state.chain.chain_id,
        loot_address: state.chain.loot_address.0.clone(),
        bundler_address: state.chain.bundler_address.0.clone(),
        inventory_source: state.chain.inventory_source.to_owned(),
        confirmations: state.chain.confirmations,
    }))
}

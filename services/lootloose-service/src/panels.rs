use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ll_api_types::{Operation, PanelView, SelectRequest, TokenId};
use ll_wallet_core::{BundlerPanel, SubmitOutcome};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{ApiError, ApiResult, AppState, bad_request, conflict, not_found};

fn panel(state: &AppState, raw: &str) -> Result<Arc<BundlerPanel>, ApiError> {
    let operation = match raw {
        "unbundle" => Operation::Unbundle,
        "rebundle" => Operation::Rebundle,
        _ => return Err(not_found(&format!("unknown operation: {raw}"))),
    };
    Ok(state.core.panel(operation).clone())
}

pub(crate) async fn panel_view(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
) -> ApiResult<PanelView> {
    Ok(Json(panel(&state, &operation)?.view()))
}

pub(crate) async fn panel_select(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<PanelView> {
    let panel = panel(&state, &operation)?;

    let token_id = request.token_id.trim();
    if token_id.is_empty() {
        return Err(bad_request("token_id is required"));
    }

    panel
        .select(TokenId::from(token_id))
        .map_err(|err| bad_request(&err.to_string()))?;

    Ok(Json(panel.view()))
}

/// Accepts a submission and runs it in the background.
///
/// The work is detached from the connection; a client hanging up must not
/// abandon a transaction mid-flight. Progress shows in the panel view and the
/// notification feed.
pub(crate) async fn panel_submit(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
) -> Result<(StatusCode, Json<PanelView>), ApiError> {
    let panel = panel(&state, &operation)?;

    let Some(pending) = panel.try_begin() else {
        return Err(conflict("submission is not enabled for this panel"));
    };
    info!(%operation, token_id = %pending.token_id(), "submission accepted");

    let view = panel.view();
    tokio::spawn(async move {
        match panel.complete(pending).await {
            SubmitOutcome::Failed(reason) => {
                warn!(operation = %panel.operation(), %reason, "submission failed");
            }
            SubmitOutcome::Succeeded | SubmitOutcome::Ignored => {}
        }
    });

    Ok((StatusCode::ACCEPTED, Json(view)))
}

pub(crate) async fn panel_refresh(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
) -> ApiResult<PanelView> {
    let panel = panel(&state, &operation)?;
    panel.refresh().await;
    Ok(Json(panel.view()))
}

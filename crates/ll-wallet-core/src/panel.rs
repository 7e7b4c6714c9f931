//! Bundler panel: selection and submission state for one operation.
//!
//! The submit-disable rule is what keeps a user from racing two operations,
//! so the enablement check and the `submitting` flip happen under one lock.

use ll_api_types::{
    ButtonAction, Operation, PanelButtonView, PanelItemView, PanelView, TokenId, WalletAddress,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::inventory::{InventoryCollector, InventorySnapshot};
use crate::orchestrator::ActionOrchestrator;
use crate::session::WalletSession;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("bag #{0} is not listed")]
    NotListed(TokenId),
    #[error("a submission is in flight")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Submission was disabled; nothing ran.
    Ignored,
    Succeeded,
    Failed(String),
}

/// An accepted submission, ready to run.
#[derive(Debug)]
pub struct PendingSubmission {
    token_id: TokenId,
    caller: WalletAddress,
}

impl PendingSubmission {
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }
}

#[derive(Debug, Default)]
struct PanelState {
    selected: Option<TokenId>,
    submitting: bool,
}

pub struct BundlerPanel {
    operation: Operation,
    session: Arc<WalletSession>,
    collector: Arc<InventoryCollector>,
    orchestrator: Arc<ActionOrchestrator>,
    state: Mutex<PanelState>,
}

impl BundlerPanel {
    pub fn new(
        operation: Operation,
        session: Arc<WalletSession>,
        collector: Arc<InventoryCollector>,
        orchestrator: Arc<ActionOrchestrator>,
    ) -> Self {
        Self {
            operation,
            session,
            collector,
            orchestrator,
            state: Mutex::new(PanelState::default()),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn collector(&self) -> &Arc<InventoryCollector> {
        &self.collector
    }

    /// The selection, if the bag is still listed.
    pub fn selected(&self) -> Option<TokenId> {
        let state = self.lock();
        listed(&state, &self.collector.snapshot()).cloned()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().submitting
    }

    /// Replaces the selection with a currently listed bag.
    pub fn select(&self, token_id: TokenId) -> Result<(), PanelError> {
        let mut state = self.lock();
        if state.submitting {
            return Err(PanelError::Busy);
        }
        if !self.collector.snapshot().contains(&token_id) {
            return Err(PanelError::NotListed(token_id));
        }
        debug!(operation = %self.operation, %token_id, "bag selected");
        state.selected = Some(token_id);
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        let state = self.lock();
        self.submittable(&state).is_some()
    }

    /// Accepts a submission if enabled, marking the panel as submitting.
    pub fn try_begin(&self) -> Option<PendingSubmission> {
        let mut state = self.lock();
        let pending = self.submittable(&state)?;
        state.submitting = true;
        Some(pending)
    }

    /// Runs an accepted submission, then returns the panel to its unselected
    /// baseline whatever the outcome.
    pub async fn complete(&self, pending: PendingSubmission) -> SubmitOutcome {
        let result = self
            .orchestrator
            .execute(self.operation, &pending.token_id, Some(&pending.caller))
            .await;

        {
            let mut state = self.lock();
            state.submitting = false;
            state.selected = None;
        }

        match result {
            Ok(receipt) => {
                info!(
                    operation = %self.operation,
                    token_id = %receipt.token_id,
                    "submission complete"
                );
                SubmitOutcome::Succeeded
            }
            Err(err) => SubmitOutcome::Failed(err.to_string()),
        }
    }

    pub async fn submit(&self) -> SubmitOutcome {
        match self.try_begin() {
            Some(pending) => self.complete(pending).await,
            None => SubmitOutcome::Ignored,
        }
    }

    pub async fn refresh(&self) -> InventorySnapshot {
        self.collector.refresh(self.session.address().as_ref()).await
    }

    pub fn view(&self) -> PanelView {
        let state = self.lock();
        let snapshot = self.collector.snapshot();
        let address = self.session.address();
        let copy = PanelCopy::of(self.operation);
        let selected = listed(&state, &snapshot);

        let status = if address.is_none() {
            Some("Please authenticate first".to_owned())
        } else if snapshot.loading {
            Some("Loading...".to_owned())
        } else if let Some(err) = &snapshot.error {
            Some(err.to_string())
        } else if snapshot.records.is_empty() {
            Some(copy.empty.to_owned())
        } else {
            None
        };

        let items = if status.is_none() {
            snapshot
                .records
                .iter()
                .map(|record| PanelItemView {
                    id: record.id.0.clone(),
                    label: format!("Bag #{}", record.id),
                    attributes: record.attributes(),
                    selected: selected == Some(&record.id),
                    disabled: state.submitting,
                })
                .collect()
        } else {
            Vec::new()
        };

        let button = if address.is_none() {
            button("Authenticate", ButtonAction::Authenticate)
        } else if snapshot.loading || state.submitting {
            button("Loading...", ButtonAction::None)
        } else if let Some(err) = &snapshot.error {
            button(&err.to_string(), ButtonAction::None)
        } else {
            match selected {
                None => button(copy.select_prompt, ButtonAction::None),
                Some(token_id) => {
                    button(&format!("{} bag #{token_id}", copy.verb), ButtonAction::Submit)
                }
            }
        };

        PanelView {
            operation: self.operation,
            title: copy.title.to_owned(),
            description: copy.description.to_owned(),
            status,
            items,
            selected: selected.map(|id| id.0.clone()),
            submitting: state.submitting,
            button,
        }
    }

    fn submittable(&self, state: &PanelState) -> Option<PendingSubmission> {
        if state.submitting {
            return None;
        }
        let caller = self.session.address()?;
        let snapshot = self.collector.snapshot();
        if snapshot.loading || snapshot.error.is_some() {
            return None;
        }
        let token_id = listed(state, &snapshot)?.clone();
        Some(PendingSubmission { token_id, caller })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A refresh can drop the selected bag; such a selection no longer counts.
fn listed<'a>(state: &'a PanelState, snapshot: &InventorySnapshot) -> Option<&'a TokenId> {
    state
        .selected
        .as_ref()
        .filter(|token_id| snapshot.contains(token_id))
}

fn button(label: &str, action: ButtonAction) -> PanelButtonView {
    PanelButtonView {
        label: label.to_owned(),
        enabled: action != ButtonAction::None,
        action,
    }
}

struct PanelCopy {
    title: &'static str,
    description: &'static str,
    empty: &'static str,
    select_prompt: &'static str,
    verb: &'static str,
}

impl PanelCopy {
    fn of(operation: Operation) -> Self {
        match operation {
            Operation::Unbundle => Self {
                title: "Unbundle Items",
                description: "Unbundle loot bags into individual items. Choose a loot bag you own \
                              and unbundle it into 8 separate ERC1155 NFTs, representing each \
                              item.",
                empty: "No bags in inventory",
                select_prompt: "Select bag to unbundle",
                verb: "Unbundle",
            },
            Operation::Rebundle => Self {
                title: "Bundle Items",
                description: "Rebundle individual ERC1155 items into loot bags. Choose and claim \
                              one of the available bags, given you have the necessary 8 item NFTs.",
                empty: "No bags in contract",
                select_prompt: "Select bag to reclaim",
                verb: "Reclaim",
            },
        }
    }
}

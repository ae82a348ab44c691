use std::sync::Arc;

use kanban_shared::domain::{CardRef, Lane};
use tracing::{debug, error, info, warn};

use crate::{
    board::{BoardClient, BoardEvent},
    error::{BoardError, BoardResult, REASON_REQUIRED},
};

/// History entry recorded when a card is sent back out of Review. Other tools
/// parse this shape.
pub fn comment_body(target: Lane, reason: &str) -> String {
    format!("Moved back to {target}: {reason}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransitionState {
    #[default]
    Idle,
    ReasonPrompt {
        card: CardRef,
        target: Lane,
        error: Option<String>,
    },
    InFlight {
        card: CardRef,
        target: Lane,
    },
    RollingBack {
        card: CardRef,
        target: Lane,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub card: CardRef,
    pub target: Lane,
    pub reason: Option<String>,
}

impl TransitionRequest {
    /// Validates a move out of Review: Todo and Doing need a non-blank reason,
    /// Done drops any reason given.
    pub fn new(card: CardRef, target: Lane, reason: Option<&str>) -> BoardResult<Self> {
        let reason = match target {
            Lane::Review => {
                return Err(BoardError::ValidationFailed(
                    "Review is not a transition target".to_string(),
                ))
            }
            Lane::Done => None,
            Lane::Todo | Lane::Doing => Some(
                reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| BoardError::ValidationFailed(REASON_REQUIRED.to_string()))?
                    .to_string(),
            ),
        };
        Ok(Self {
            card,
            target,
            reason,
        })
    }

    pub fn comment_body(&self) -> Option<String> {
        self.reason
            .as_deref()
            .map(|reason| comment_body(self.target, reason))
    }
}

/// What a transition call did, so callers can tell an ignored request from a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Ignored,
    Prompted,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionStep {
    Ignored,
    Prompted,
    Execute(TransitionRequest),
}

#[derive(Debug, Clone, Default)]
pub struct TransitionCoordinator {
    state: TransitionState,
}

impl TransitionCoordinator {
    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            TransitionState::InFlight { .. } | TransitionState::RollingBack { .. }
        )
    }

    /// Opening the prompt never touches the server; only Done executes directly.
    pub fn request(
        &mut self,
        card: Option<CardRef>,
        current_lane: Option<Lane>,
        target: Lane,
    ) -> TransitionStep {
        if self.is_busy() || current_lane != Some(Lane::Review) {
            return TransitionStep::Ignored;
        }
        let Some(card) = card else {
            return TransitionStep::Ignored;
        };
        match target {
            Lane::Review => TransitionStep::Ignored,
            Lane::Done => {
                self.state = TransitionState::InFlight {
                    card: card.clone(),
                    target,
                };
                TransitionStep::Execute(TransitionRequest {
                    card,
                    target,
                    reason: None,
                })
            }
            Lane::Todo | Lane::Doing => {
                self.state = TransitionState::ReasonPrompt {
                    card,
                    target,
                    error: None,
                };
                TransitionStep::Prompted
            }
        }
    }

    /// `Ok(None)` when no prompt is open. A blank reason keeps the prompt open
    /// with a validation error.
    pub fn submit_reason(&mut self, text: &str) -> BoardResult<Option<TransitionRequest>> {
        let TransitionState::ReasonPrompt {
            card,
            target,
            error,
        } = &mut self.state
        else {
            return Ok(None);
        };
        let reason = text.trim();
        if reason.is_empty() {
            *error = Some(REASON_REQUIRED.to_string());
            return Err(BoardError::ValidationFailed(REASON_REQUIRED.to_string()));
        }
        let request = TransitionRequest {
            card: card.clone(),
            target: *target,
            reason: Some(reason.to_string()),
        };
        self.state = TransitionState::InFlight {
            card: request.card.clone(),
            target: request.target,
        };
        Ok(Some(request))
    }

    pub fn cancel_reason_prompt(&mut self) -> bool {
        if matches!(self.state, TransitionState::ReasonPrompt { .. }) {
            self.state = TransitionState::Idle;
            return true;
        }
        false
    }

    pub fn begin_rollback(&mut self) {
        if let TransitionState::InFlight { card, target } = &self.state {
            self.state = TransitionState::RollingBack {
                card: card.clone(),
                target: *target,
            };
        }
    }

    pub fn finish(&mut self) {
        self.state = TransitionState::Idle;
    }
}

impl BoardClient {
    pub async fn request_transition(self: &Arc<Self>, target: Lane) -> BoardResult<TransitionOutcome> {
        let step = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            let card = state.selection.selected_card_ref();
            let lane = state.open_card_lane();
            state.transition.request(card, lane, target)
        };
        match step {
            TransitionStep::Ignored => {
                debug!(%target, "ignoring transition request");
                Ok(TransitionOutcome::Ignored)
            }
            TransitionStep::Prompted => {
                self.emit(BoardEvent::TransitionChanged);
                Ok(TransitionOutcome::Prompted)
            }
            TransitionStep::Execute(request) => self.spawn_transition(request).await,
        }
    }

    pub async fn submit_reason(self: &Arc<Self>, text: &str) -> BoardResult<TransitionOutcome> {
        let submitted = self.inner.lock().await.transition.submit_reason(text);
        match submitted {
            Ok(Some(request)) => self.spawn_transition(request).await,
            Ok(None) => Ok(TransitionOutcome::Ignored),
            Err(err) => {
                self.emit(BoardEvent::TransitionChanged);
                Err(err)
            }
        }
    }

    pub async fn cancel_reason_prompt(&self) {
        if self.inner.lock().await.transition.cancel_reason_prompt() {
            self.emit(BoardEvent::TransitionChanged);
        }
    }

    /// Runs the execute step on its own task so that dropping the caller
    /// cannot leave a move without its comment or rollback.
    async fn spawn_transition(self: &Arc<Self>, request: TransitionRequest) -> BoardResult<TransitionOutcome> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.execute_transition(request).await })
            .await
            .map_err(|err| BoardError::TransitionMoveFailed(format!("transition task failed: {err}")))??;
        Ok(TransitionOutcome::Completed)
    }

    async fn execute_transition(&self, request: TransitionRequest) -> BoardResult<()> {
        self.emit(BoardEvent::TransitionChanged);
        info!(card = %request.card, target = %request.target, "transition: leaving review");

        let outcome = self.run_transition_steps(&request).await;

        {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            state.transition.finish();
            let still_open = state.selection.selected_card_ref().as_ref() == Some(&request.card);
            if outcome.is_ok() && still_open {
                state.selection.close_card_detail();
            }
            if let Err(err) = &outcome {
                state.last_error = Some(err.clone());
            }
        }
        self.emit(BoardEvent::TransitionChanged);
        self.emit(BoardEvent::DetailChanged);
        if let Err(err) = &outcome {
            self.emit(BoardEvent::Error(err.user_message()));
        }

        // Converge on server truth whatever happened above.
        let _ = self.reload_cards().await;
        let _ = self.retry_card_detail().await;
        if let Err(err) = &outcome {
            // A failed refresh reports its own error; the transition's stays on record.
            self.inner.lock().await.last_error = Some(err.clone());
        }
        outcome
    }

    async fn run_transition_steps(&self, request: &TransitionRequest) -> BoardResult<()> {
        let TransitionRequest { card, target, .. } = request;

        self.remote
            .move_card(&card.project, card.number, *target)
            .await
            .map_err(|err| {
                warn!(card = %card, target = %target, "transition: move failed: {err:#}");
                BoardError::TransitionMoveFailed(format!("{err:#}"))
            })?;

        let Some(body) = request.comment_body() else {
            info!(card = %card, target = %target, "transition: moved");
            return Ok(());
        };

        let Err(comment_err) = self
            .remote
            .append_comment(&card.project, card.number, &body)
            .await
        else {
            info!(card = %card, target = %target, "transition: moved with reason");
            return Ok(());
        };

        warn!(card = %card, "transition: reason not recorded, moving card back to review: {comment_err:#}");
        self.inner.lock().await.transition.begin_rollback();
        self.emit(BoardEvent::TransitionChanged);

        let comment = format!("{comment_err:#}");
        match self
            .remote
            .move_card(&card.project, card.number, Lane::Review)
            .await
        {
            Ok(()) => Err(BoardError::TransitionCommentFailed(comment)),
            Err(rollback_err) => {
                error!(
                    card = %card,
                    target = %target,
                    "transition: rollback failed; card left without its reason: {rollback_err:#}"
                );
                Err(BoardError::RollbackFailed {
                    comment,
                    rollback: format!("{rollback_err:#}"),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/transition_tests.rs"]
mod tests;

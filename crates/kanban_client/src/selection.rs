use kanban_shared::domain::{CardDetail, CardNumber, CardRef, CardSummary, Project};
use tracing::debug;

use crate::{
    board::{BoardClient, BoardEvent},
    error::{BoardError, BoardResult},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DetailState {
    #[default]
    Closed,
    Loading,
    Loaded(CardDetail),
    /// Retryable; the card stays selected.
    Failed(String),
}

/// A detail fetch tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub token: u64,
    pub card: CardRef,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    project: Option<String>,
    card: Option<CardNumber>,
    detail: DetailState,
    generation: u64,
}

impl SelectionState {
    pub fn selected_project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn selected_card(&self) -> Option<CardNumber> {
        self.card
    }

    pub fn selected_card_ref(&self) -> Option<CardRef> {
        Some(CardRef::new(self.project.clone()?, self.card?))
    }

    pub fn detail(&self) -> &DetailState {
        &self.detail
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Never carries a card across the switch.
    pub fn select_project(&mut self, slug: Option<String>) {
        self.project = slug;
        self.close_card_detail();
    }

    /// Selects `number` optimistically and returns the fetch to issue, or
    /// `None` when no project is selected.
    pub fn begin_card_load(&mut self, number: CardNumber) -> Option<DetailRequest> {
        let project = self.project.clone()?;
        self.card = Some(number);
        self.detail = DetailState::Loading;
        Some(self.issue(CardRef::new(project, number)))
    }

    /// Re-fetches the open card. A detail already on screen stays visible
    /// until the new one lands.
    pub fn begin_refresh(&mut self) -> Option<DetailRequest> {
        let card = self.selected_card_ref()?;
        if !matches!(self.detail, DetailState::Loaded(_)) {
            self.detail = DetailState::Loading;
        }
        Some(self.issue(card))
    }

    /// Applies a completed fetch if `token` is still current. Returns whether
    /// it was applied.
    pub fn apply_detail(&mut self, token: u64, result: BoardResult<CardDetail>) -> bool {
        if token != self.generation {
            return false;
        }
        self.detail = match result {
            Ok(detail) => DetailState::Loaded(detail),
            Err(err) => DetailState::Failed(err.user_message()),
        };
        true
    }

    pub fn close_card_detail(&mut self) {
        self.generation += 1;
        self.card = None;
        self.detail = DetailState::Closed;
    }

    /// Clears the card selection when `cards` no longer contains it.
    pub fn retain_card(&mut self, cards: &[CardSummary]) -> Option<CardNumber> {
        let number = self.card?;
        if cards.iter().any(|card| card.number == number) {
            return None;
        }
        self.close_card_detail();
        Some(number)
    }

    /// Clears the whole selection when `projects` no longer contains the project.
    pub fn retain_project(&mut self, projects: &[Project]) -> Option<String> {
        let slug = self.project.as_deref()?;
        if projects.iter().any(|project| project.slug == slug) {
            return None;
        }
        let dropped = self.project.take();
        self.close_card_detail();
        dropped
    }

    fn issue(&mut self, card: CardRef) -> DetailRequest {
        self.generation += 1;
        DetailRequest {
            token: self.generation,
            card,
        }
    }
}

impl BoardClient {
    pub async fn select_project(&self, slug: Option<String>) -> BoardResult<()> {
        {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            if state.selection.selected_project() != slug.as_deref() {
                state.projection.clear_cards();
            }
            state.selection.select_project(slug);
            state.transition.cancel_reason_prompt();
        }
        self.emit(BoardEvent::DetailChanged);
        self.emit(BoardEvent::TransitionChanged);
        self.reload_cards().await
    }

    pub async fn select_card(&self, number: CardNumber) -> BoardResult<()> {
        let request = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            let Some(request) = state.selection.begin_card_load(number) else {
                debug!(card_number = number.0, "no project selected; ignoring card selection");
                return Ok(());
            };
            state.transition.cancel_reason_prompt();
            request
        };
        self.emit(BoardEvent::DetailChanged);
        self.fetch_detail(request).await
    }

    /// Reissues the detail load for the selected card; no-op without one.
    pub async fn retry_card_detail(&self) -> BoardResult<()> {
        let request = self.inner.lock().await.selection.begin_refresh();
        match request {
            Some(request) => self.fetch_detail(request).await,
            None => Ok(()),
        }
    }

    pub async fn close_card_detail(&self) {
        {
            let mut state = self.inner.lock().await;
            state.selection.close_card_detail();
            state.transition.cancel_reason_prompt();
        }
        self.emit(BoardEvent::DetailChanged);
        self.emit(BoardEvent::TransitionChanged);
    }

    async fn fetch_detail(&self, request: DetailRequest) -> BoardResult<()> {
        let result = self
            .remote
            .get_card_detail(&request.card.project, request.card.number)
            .await
            .map_err(|err| BoardError::remote(format!("failed to load card {}", request.card), err));
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);

        let applied = {
            let mut state = self.inner.lock().await;
            let applied = state.selection.apply_detail(request.token, result);
            if !applied {
                debug!(
                    token = request.token,
                    current = state.selection.generation(),
                    card = %request.card,
                    "discarding stale card detail"
                );
            }
            applied
        };

        if applied {
            self.emit(BoardEvent::DetailChanged);
            outcome
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;

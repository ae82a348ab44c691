use std::sync::Arc;

use kanban_shared::domain::{CardSummary, Lane, Project};
use tracing::{debug, info};

use crate::{
    board::{BoardClient, BoardEvent},
    error::{BoardError, BoardResult},
    notifications::ChangeNotification,
    remote::RemoteBoardClient,
    selection::SelectionState,
};

/// Local mirror of the project list and the selected project's cards.
/// Every reload replaces a list wholesale.
#[derive(Debug, Clone, Default)]
pub struct BoardProjection {
    projects: Vec<Project>,
    cards: Vec<CardSummary>,
}

impl BoardProjection {
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn cards(&self) -> &[CardSummary] {
        &self.cards
    }

    pub fn cards_in_lane(&self, lane: Lane) -> Vec<&CardSummary> {
        self.cards.iter().filter(|card| card.status == lane).collect()
    }

    pub fn replace_projects(&mut self, mut projects: Vec<Project>) {
        sort_projects(&mut projects);
        self.projects = projects;
    }

    pub fn replace_cards(&mut self, mut cards: Vec<CardSummary>) {
        sort_cards(&mut cards);
        self.cards = cards;
    }

    pub fn clear_cards(&mut self) {
        self.cards.clear();
    }
}

/// Display order: name, then slug.
pub fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
}

pub fn sort_cards(cards: &mut [CardSummary]) {
    cards.sort_by_key(|card| card.number);
}

pub async fn load_projects(remote: &dyn RemoteBoardClient) -> BoardResult<Vec<Project>> {
    let mut projects = remote
        .list_projects()
        .await
        .map_err(|err| BoardError::remote("failed to load projects", err))?;
    sort_projects(&mut projects);
    Ok(projects)
}

pub async fn load_cards(remote: &dyn RemoteBoardClient, project: &str) -> BoardResult<Vec<CardSummary>> {
    let mut cards = remote
        .list_cards(project)
        .await
        .map_err(|err| BoardError::remote(format!("failed to load cards for {project}"), err))?;
    sort_cards(&mut cards);
    Ok(cards)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    Ignore,
    RefreshProjects,
    RefreshProjectsAndCards,
    RefreshCards,
    RefreshCardsAndDetail,
}

impl ReconcileDecision {
    pub fn refreshes_projects(self) -> bool {
        matches!(self, Self::RefreshProjects | Self::RefreshProjectsAndCards)
    }

    pub fn refreshes_cards(self) -> bool {
        matches!(
            self,
            Self::RefreshProjectsAndCards | Self::RefreshCards | Self::RefreshCardsAndDetail
        )
    }

    pub fn refreshes_detail(self) -> bool {
        matches!(self, Self::RefreshCardsAndDetail)
    }
}

/// Maps a notification onto the re-fetches it warrants. Notifications are
/// hints: nothing is patched from their payload.
pub fn reconcile(notification: &ChangeNotification, selection: &SelectionState) -> ReconcileDecision {
    let selected = selection.selected_project();
    if notification.kind.is_project_scoped() {
        return match selected {
            Some(_) => ReconcileDecision::RefreshProjectsAndCards,
            None => ReconcileDecision::RefreshProjects,
        };
    }

    let Some(selected) = selected else {
        return ReconcileDecision::Ignore;
    };
    match notification.project.as_deref() {
        Some(project) if project != selected => ReconcileDecision::Ignore,
        // The open card may or may not be the one that changed; always refetch it.
        _ if selection.selected_card().is_some() => ReconcileDecision::RefreshCardsAndDetail,
        _ => ReconcileDecision::RefreshCards,
    }
}

impl BoardClient {
    /// Full reload: projects, cards of the selected project, then a fresh watch session.
    pub async fn load(self: &Arc<Self>) -> BoardResult<()> {
        self.reload_projects().await?;
        let cards = self.reload_cards().await;
        self.restart_watch().await;
        cards
    }

    pub async fn reload_projects(&self) -> BoardResult<()> {
        let projects = match load_projects(self.remote.as_ref()).await {
            Ok(projects) => projects,
            Err(err) => {
                self.report(err.clone()).await;
                return Err(err);
            }
        };

        let dropped = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            state.projection.replace_projects(projects);
            let dropped = state.selection.retain_project(state.projection.projects());
            if dropped.is_some() {
                state.projection.clear_cards();
                state.transition.cancel_reason_prompt();
            }
            dropped
        };

        self.emit(BoardEvent::ProjectsChanged);
        if let Some(slug) = dropped {
            info!(project = %slug, "selected project no longer exists; clearing selection");
            self.emit(BoardEvent::CardsChanged);
            self.emit(BoardEvent::DetailChanged);
            self.emit(BoardEvent::TransitionChanged);
        }
        Ok(())
    }

    pub async fn reload_cards(&self) -> BoardResult<()> {
        let project = {
            let state = self.inner.lock().await;
            state.selection.selected_project().map(str::to_string)
        };
        let Some(project) = project else {
            self.inner.lock().await.projection.clear_cards();
            self.emit(BoardEvent::CardsChanged);
            return Ok(());
        };

        let cards = match load_cards(self.remote.as_ref(), &project).await {
            Ok(cards) => cards,
            Err(err) => {
                self.report(err.clone()).await;
                return Err(err);
            }
        };

        let dropped_card = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            if state.selection.selected_project() != Some(project.as_str()) {
                debug!(project = %project, "discarding card list for a project no longer selected");
                return Ok(());
            }
            state.projection.replace_cards(cards);
            let dropped = state.selection.retain_card(state.projection.cards());
            if dropped.is_some() {
                state.transition.cancel_reason_prompt();
            }
            dropped
        };

        self.emit(BoardEvent::CardsChanged);
        if let Some(number) = dropped_card {
            info!(project = %project, card_number = number.0, "selected card disappeared; closing detail");
            self.emit(BoardEvent::DetailChanged);
            self.emit(BoardEvent::TransitionChanged);
        }
        Ok(())
    }

    /// Applies one notification; reload failures are reported, not returned.
    pub async fn apply_notification(&self, notification: &ChangeNotification) -> ReconcileDecision {
        let decision = {
            let state = self.inner.lock().await;
            reconcile(notification, &state.selection)
        };
        debug!(kind = ?notification.kind, project = ?notification.project, ?decision, "reconcile");

        if decision.refreshes_projects() {
            let _ = self.reload_projects().await;
        }
        if decision.refreshes_cards() {
            let _ = self.reload_cards().await;
        }
        if decision.refreshes_detail() {
            let _ = self.retry_card_detail().await;
        }
        decision
    }
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;

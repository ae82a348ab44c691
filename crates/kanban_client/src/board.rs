use std::sync::{Arc, Weak};

use futures::StreamExt;
use kanban_shared::domain::{CardNumber, CardSummary, Lane, Project};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    config::ClientSettings,
    error::{BoardError, BoardResult},
    notifications::{ChangeNotificationSource, WebSocketNotificationSource},
    projection::BoardProjection,
    remote::{HttpBoardClient, RemoteBoardClient},
    selection::{DetailState, SelectionState},
    transition::{TransitionCoordinator, TransitionState},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    ProjectsChanged,
    CardsChanged,
    DetailChanged,
    TransitionChanged,
    Error(String),
}

/// Read model handed to renderers.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub projects: Vec<Project>,
    pub cards: Vec<CardSummary>,
    pub selected_project: Option<String>,
    pub selected_card: Option<CardNumber>,
    pub detail: DetailState,
    pub transition: TransitionState,
    pub error: Option<BoardError>,
}

impl BoardSnapshot {
    pub fn cards_in_lane(&self, lane: Lane) -> Vec<&CardSummary> {
        self.cards.iter().filter(|card| card.status == lane).collect()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(BoardError::user_message)
    }
}

#[derive(Debug, Default)]
pub(crate) struct BoardState {
    pub(crate) projection: BoardProjection,
    pub(crate) selection: SelectionState,
    pub(crate) transition: TransitionCoordinator,
    pub(crate) last_error: Option<BoardError>,
}

impl BoardState {
    /// Lane of the open card, preferring the loaded detail over the summary list.
    pub(crate) fn open_card_lane(&self) -> Option<Lane> {
        let number = self.selection.selected_card()?;
        match self.selection.detail() {
            DetailState::Loaded(detail) if detail.number == number => Some(detail.status),
            _ => self
                .projection
                .cards()
                .iter()
                .find(|card| card.number == number)
                .map(|card| card.status),
        }
    }
}

/// Single owner of the board mirror, the selection and the transition workflow.
pub struct BoardClient {
    pub(crate) remote: Arc<dyn RemoteBoardClient>,
    notifications: Arc<dyn ChangeNotificationSource>,
    pub(crate) inner: Mutex<BoardState>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<BoardEvent>,
}

impl BoardClient {
    pub fn new(
        remote: Arc<dyn RemoteBoardClient>,
        notifications: Arc<dyn ChangeNotificationSource>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            remote,
            notifications,
            inner: Mutex::new(BoardState::default()),
            watch_task: Mutex::new(None),
            events,
        })
    }

    pub fn connect(settings: &ClientSettings) -> BoardResult<Arc<Self>> {
        let ws_url = settings.websocket_url()?;
        Ok(Self::new(
            Arc::new(HttpBoardClient::new(settings.server_url.clone())),
            Arc::new(WebSocketNotificationSource::new(ws_url)),
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        let state = self.inner.lock().await;
        BoardSnapshot {
            projects: state.projection.projects().to_vec(),
            cards: state.projection.cards().to_vec(),
            selected_project: state.selection.selected_project().map(str::to_string),
            selected_card: state.selection.selected_card(),
            detail: state.selection.detail().clone(),
            transition: state.transition.state().clone(),
            error: state.last_error.clone(),
        }
    }

    pub async fn cards_in_lane(&self, lane: Lane) -> Vec<CardSummary> {
        let state = self.inner.lock().await;
        state
            .projection
            .cards_in_lane(lane)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn dismiss_error(&self) {
        self.inner.lock().await.last_error = None;
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.watch_task.lock().await.take() {
            task.abort();
        }
    }

    pub(crate) fn emit(&self, event: BoardEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) async fn report(&self, err: BoardError) {
        warn!("board: {err}");
        let message = err.user_message();
        self.inner.lock().await.last_error = Some(err);
        self.emit(BoardEvent::Error(message));
    }

    /// Replaces the watch session; the previous task is aborted, never left running.
    pub(crate) async fn restart_watch(self: &Arc<Self>) {
        let mut slot = self.watch_task.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let client = Arc::downgrade(self);
        let source = Arc::clone(&self.notifications);
        *slot = Some(tokio::spawn(run_watch(client, source)));
    }
}

async fn run_watch(client: Weak<BoardClient>, source: Arc<dyn ChangeNotificationSource>) {
    let mut stream = match source.subscribe().await {
        Ok(stream) => stream,
        Err(err) => {
            if let Some(board) = client.upgrade() {
                board
                    .report(BoardError::NotificationStream(format!("{err:#}")))
                    .await;
            }
            return;
        }
    };

    while let Some(item) = stream.next().await {
        let Some(board) = client.upgrade() else {
            return;
        };
        match item {
            Ok(notification) => {
                board.apply_notification(&notification).await;
            }
            Err(err) => {
                board
                    .report(BoardError::NotificationStream(format!("{err:#}")))
                    .await;
                return;
            }
        }
    }
    info!("board notification stream ended");
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;

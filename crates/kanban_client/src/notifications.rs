use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{future, stream::BoxStream, StreamExt};
use kanban_shared::{
    domain::CardNumber,
    protocol::{WebsocketEvent, WebsocketEventType},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    ProjectCreated,
    ProjectDeleted,
    CardCreated,
    CardUpdated,
    CardMoved,
    CardCommented,
    TodoChanged,
    AcceptanceChanged,
    CardDeleted,
    ResyncRequired,
}

impl ChangeKind {
    pub fn is_project_scoped(self) -> bool {
        matches!(self, ChangeKind::ProjectCreated | ChangeKind::ProjectDeleted)
    }
}

impl From<WebsocketEventType> for ChangeKind {
    fn from(value: WebsocketEventType) -> Self {
        match value {
            WebsocketEventType::ProjectCreated => ChangeKind::ProjectCreated,
            WebsocketEventType::ProjectDeleted => ChangeKind::ProjectDeleted,
            WebsocketEventType::CardCreated => ChangeKind::CardCreated,
            WebsocketEventType::CardBranchUpdated | WebsocketEventType::CardUpdated => {
                ChangeKind::CardUpdated
            }
            WebsocketEventType::CardMoved => ChangeKind::CardMoved,
            WebsocketEventType::CardCommented => ChangeKind::CardCommented,
            WebsocketEventType::CardTodoAdded
            | WebsocketEventType::CardTodoUpdated
            | WebsocketEventType::CardTodoDeleted => ChangeKind::TodoChanged,
            WebsocketEventType::CardAcceptanceAdded
            | WebsocketEventType::CardAcceptanceUpdated
            | WebsocketEventType::CardAcceptanceDeleted => ChangeKind::AcceptanceChanged,
            WebsocketEventType::CardDeletedSoft | WebsocketEventType::CardDeletedHard => {
                ChangeKind::CardDeleted
            }
            WebsocketEventType::ResyncRequired => ChangeKind::ResyncRequired,
        }
    }
}

/// A hint that server state changed. `project == None` means unscoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    pub project: Option<String>,
    pub card_number: Option<CardNumber>,
}

impl ChangeNotification {
    pub fn new(kind: ChangeKind, project: Option<&str>) -> Self {
        Self {
            kind,
            project: project.map(str::to_string),
            card_number: None,
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let event: WebsocketEvent =
            serde_json::from_str(text).context("invalid websocket payload")?;
        Ok(event.into())
    }
}

impl From<WebsocketEvent> for ChangeNotification {
    fn from(event: WebsocketEvent) -> Self {
        let project = event
            .project
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            kind: event.event_type.into(),
            project,
            card_number: event.card_number.map(CardNumber),
        }
    }
}

pub type NotificationStream = BoxStream<'static, Result<ChangeNotification>>;

/// Live feed of change notifications. The returned stream ends with an error
/// on transport loss and is cancelled by dropping it.
#[async_trait]
pub trait ChangeNotificationSource: Send + Sync {
    async fn subscribe(&self) -> Result<NotificationStream>;
}

pub struct WebSocketNotificationSource {
    ws_url: Url,
}

impl WebSocketNotificationSource {
    pub fn new(ws_url: Url) -> Self {
        Self { ws_url }
    }
}

fn decode_frame(text: &str) -> Option<Result<ChangeNotification>> {
    match ChangeNotification::decode(text) {
        Ok(notification) => Some(Ok(notification)),
        Err(err) => {
            warn!("skipping websocket frame: {err:#}");
            None
        }
    }
}

#[async_trait]
impl ChangeNotificationSource for WebSocketNotificationSource {
    async fn subscribe(&self) -> Result<NotificationStream> {
        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {}", self.ws_url))?;
        info!(url = %self.ws_url, "watching board notifications");

        let stream = ws_stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => decode_frame(&text),
                    Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                        Ok(text) => decode_frame(text),
                        Err(err) => {
                            warn!("skipping non-utf8 websocket frame: {err}");
                            None
                        }
                    },
                    Ok(_) => None,
                    Err(err) => Some(Err(anyhow!(err).context("websocket receive failed"))),
                })
            })
            .boxed();
        Ok(stream)
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;

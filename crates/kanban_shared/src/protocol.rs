use serde::{Deserialize, Serialize};

use crate::domain::{CardSummary, Lane, Project};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCardsResponse {
    #[serde(default)]
    pub cards: Vec<CardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveCardRequest {
    pub status: Lane,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBodyRequest {
    pub body: String,
}

/// Event type names as published on the `/ws` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebsocketEventType {
    #[serde(rename = "project.created")]
    ProjectCreated,
    #[serde(rename = "project.deleted")]
    ProjectDeleted,
    #[serde(rename = "card.created")]
    CardCreated,
    #[serde(rename = "card.branch.updated")]
    CardBranchUpdated,
    #[serde(rename = "card.moved")]
    CardMoved,
    #[serde(rename = "card.commented")]
    CardCommented,
    #[serde(rename = "card.updated")]
    CardUpdated,
    #[serde(rename = "card.todo.added")]
    CardTodoAdded,
    #[serde(rename = "card.todo.updated")]
    CardTodoUpdated,
    #[serde(rename = "card.todo.deleted")]
    CardTodoDeleted,
    #[serde(rename = "card.acceptance.added")]
    CardAcceptanceAdded,
    #[serde(rename = "card.acceptance.updated")]
    CardAcceptanceUpdated,
    #[serde(rename = "card.acceptance.deleted")]
    CardAcceptanceDeleted,
    #[serde(rename = "card.deleted_soft")]
    CardDeletedSoft,
    #[serde(rename = "card.deleted_hard")]
    CardDeletedHard,
    #[serde(rename = "resync.required")]
    ResyncRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketEvent {
    #[serde(rename = "type")]
    pub event_type: WebsocketEventType,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<i64>,
}

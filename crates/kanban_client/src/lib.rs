//! Client-side coordinator for a remotely managed kanban board: a local
//! mirror of projects and cards kept in step with the server, card
//! selection with stale-result suppression, and the reason-gated move of
//! cards out of Review.

pub mod board;
pub mod config;
pub mod error;
pub mod notifications;
pub mod projection;
pub mod remote;
pub mod selection;
pub mod transition;

pub use board::{BoardClient, BoardEvent, BoardSnapshot};
pub use config::{load_settings, ClientSettings};
pub use error::{BoardError, BoardResult};
pub use notifications::{
    ChangeKind, ChangeNotification, ChangeNotificationSource, NotificationStream,
    WebSocketNotificationSource,
};
pub use projection::{reconcile, BoardProjection, ReconcileDecision};
pub use remote::{HttpBoardClient, RemoteBoardClient};
pub use selection::{DetailRequest, DetailState, SelectionState};
pub use transition::{
    comment_body, TransitionCoordinator, TransitionOutcome, TransitionRequest, TransitionState,
};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

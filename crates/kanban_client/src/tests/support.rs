//! In-memory board server and notification feed for core tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use kanban_shared::domain::{CardDetail, CardNumber, CardSummary, Lane, Project, TextEntry};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    board::{BoardClient, BoardEvent},
    notifications::{ChangeNotification, ChangeNotificationSource, NotificationStream},
    remote::RemoteBoardClient,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListProjects,
    ListCards(String),
    GetCardDetail(String, CardNumber),
    MoveCard(String, CardNumber, Lane),
    AppendComment(String, CardNumber, String),
}

impl RemoteCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, RemoteCall::MoveCard(..) | RemoteCall::AppendComment(..))
    }
}

#[derive(Debug, Default)]
pub struct Failures {
    pub list_projects: bool,
    pub list_cards: bool,
    pub card_detail: bool,
    pub move_to: HashSet<Lane>,
    pub comment: bool,
}

#[derive(Default)]
pub struct FakeRemote {
    projects: Mutex<Vec<Project>>,
    cards: Mutex<HashMap<String, Vec<CardDetail>>>,
    calls: Mutex<Vec<RemoteCall>>,
    pub failures: Mutex<Failures>,
    detail_gates: Mutex<HashMap<CardNumber, oneshot::Receiver<()>>>,
    move_gates: Mutex<HashMap<Lane, oneshot::Receiver<()>>>,
}

pub fn project(name: &str, slug: &str) -> Project {
    Project {
        name: name.to_string(),
        slug: slug.to_string(),
        local_path: None,
        remote_url: None,
    }
}

pub fn card(project: &str, number: i64, title: &str, status: Lane) -> CardDetail {
    CardDetail {
        id: format!("{project}/card-{number}"),
        project: project.to_string(),
        number: CardNumber(number),
        title: title.to_string(),
        branch: None,
        status,
        description: Vec::new(),
        todos: Vec::new(),
        acceptance_criteria: Vec::new(),
        comments: Vec::new(),
    }
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_projects(&self, projects: Vec<Project>) {
        *self.projects.lock().await = projects;
    }

    pub async fn add_card(&self, detail: CardDetail) {
        self.cards
            .lock()
            .await
            .entry(detail.project.clone())
            .or_default()
            .push(detail);
    }

    pub async fn remove_card(&self, project: &str, number: CardNumber) {
        if let Some(cards) = self.cards.lock().await.get_mut(project) {
            cards.retain(|card| card.number != number);
        }
    }

    pub async fn card(&self, project: &str, number: CardNumber) -> Option<CardDetail> {
        self.cards
            .lock()
            .await
            .get(project)?
            .iter()
            .find(|card| card.number == number)
            .cloned()
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    pub async fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .await
            .into_iter()
            .filter(RemoteCall::is_mutation)
            .collect()
    }

    /// Holds the next detail fetch for `number` until the sender fires.
    pub async fn gate_detail(&self, number: CardNumber) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.detail_gates.lock().await.insert(number, rx);
        tx
    }

    /// Holds the next move to `lane` until the sender fires.
    pub async fn gate_move(&self, lane: Lane) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.move_gates.lock().await.insert(lane, rx);
        tx
    }

    async fn record(&self, call: RemoteCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl RemoteBoardClient for FakeRemote {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.record(RemoteCall::ListProjects).await;
        if self.failures.lock().await.list_projects {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.projects.lock().await.clone())
    }

    async fn list_cards(&self, project: &str) -> Result<Vec<CardSummary>> {
        self.record(RemoteCall::ListCards(project.to_string())).await;
        if self.failures.lock().await.list_cards {
            return Err(anyhow!("connection refused"));
        }
        let cards = self.cards.lock().await;
        // Reverse to prove the projection sorts.
        Ok(cards
            .get(project)
            .map(|cards| cards.iter().rev().map(CardDetail::summary).collect())
            .unwrap_or_default())
    }

    async fn get_card_detail(&self, project: &str, number: CardNumber) -> Result<CardDetail> {
        self.record(RemoteCall::GetCardDetail(project.to_string(), number))
            .await;
        let gate = self.detail_gates.lock().await.remove(&number);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failures.lock().await.card_detail {
            return Err(anyhow!("connection reset"));
        }
        self.card(project, number)
            .await
            .ok_or_else(|| anyhow!("card {project}#{number} not found"))
    }

    async fn move_card(&self, project: &str, number: CardNumber, lane: Lane) -> Result<()> {
        self.record(RemoteCall::MoveCard(project.to_string(), number, lane))
            .await;
        let gate = self.move_gates.lock().await.remove(&lane);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failures.lock().await.move_to.contains(&lane) {
            return Err(anyhow!("move to {lane} rejected"));
        }
        let mut cards = self.cards.lock().await;
        let card = cards
            .get_mut(project)
            .and_then(|cards| cards.iter_mut().find(|card| card.number == number))
            .ok_or_else(|| anyhow!("card {project}#{number} not found"))?;
        card.status = lane;
        Ok(())
    }

    async fn append_comment(&self, project: &str, number: CardNumber, body: &str) -> Result<()> {
        self.record(RemoteCall::AppendComment(
            project.to_string(),
            number,
            body.to_string(),
        ))
        .await;
        if self.failures.lock().await.comment {
            return Err(anyhow!("comment store unavailable"));
        }
        let mut cards = self.cards.lock().await;
        let card = cards
            .get_mut(project)
            .and_then(|cards| cards.iter_mut().find(|card| card.number == number))
            .ok_or_else(|| anyhow!("card {project}#{number} not found"))?;
        card.comments.push(TextEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Each `subscribe` hands out the next queued feed, or a silent one.
#[derive(Default)]
pub struct FakeNotifications {
    feeds: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<ChangeNotification>>>>,
    subscriptions: Mutex<usize>,
}

impl FakeNotifications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn feed(&self) -> mpsc::UnboundedSender<Result<ChangeNotification>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().await.push_back(rx);
        tx
    }

    pub async fn subscriptions(&self) -> usize {
        *self.subscriptions.lock().await
    }
}

#[async_trait]
impl ChangeNotificationSource for FakeNotifications {
    async fn subscribe(&self) -> Result<NotificationStream> {
        let feed = self.feeds.lock().await.pop_front();
        *self.subscriptions.lock().await += 1;
        match feed {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => Ok(futures::stream::pending::<Result<ChangeNotification>>().boxed()),
        }
    }
}

pub fn board(remote: &Arc<FakeRemote>, notifications: &Arc<FakeNotifications>) -> Arc<BoardClient> {
    BoardClient::new(remote.clone(), notifications.clone())
}

/// Remote with projects alpha/beta, alpha holding cards 1 (Todo), 2 (Review), 3 (Review).
pub async fn seeded_remote() -> Arc<FakeRemote> {
    let remote = FakeRemote::new();
    remote
        .set_projects(vec![project("Beta", "beta"), project("Alpha", "alpha")])
        .await;
    remote.add_card(card("alpha", 1, "Plan", Lane::Todo)).await;
    remote.add_card(card("alpha", 2, "Build", Lane::Review)).await;
    remote.add_card(card("alpha", 3, "Polish", Lane::Review)).await;
    remote.add_card(card("beta", 1, "Other", Lane::Doing)).await;
    remote
}

pub async fn wait_for_call(remote: &FakeRemote, call: RemoteCall) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !remote.calls().await.contains(&call) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("remote call never issued");
}

pub async fn wait_for_event(
    events: &mut broadcast::Receiver<BoardEvent>,
    matches: impl Fn(&BoardEvent) -> bool,
) -> BoardEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for board event")
}

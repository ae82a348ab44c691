use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kanban_shared::{
    domain::{CardDetail, CardNumber, CardSummary, Lane, Project},
    error::{ApiException, ErrorModel},
    protocol::{ListCardsResponse, ListProjectsResponse, MoveCardRequest, TextBodyRequest},
};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

/// Request/response surface of the board server. Holds no board state.
#[async_trait]
pub trait RemoteBoardClient: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn list_cards(&self, project: &str) -> Result<Vec<CardSummary>>;
    async fn get_card_detail(&self, project: &str, number: CardNumber) -> Result<CardDetail>;
    async fn move_card(&self, project: &str, number: CardNumber, lane: Lane) -> Result<()>;
    async fn append_comment(&self, project: &str, number: CardNumber, body: &str) -> Result<()>;
}

pub struct HttpBoardClient {
    http: Client,
    server_url: Url,
}

impl HttpBoardClient {
    pub fn new(server_url: Url) -> Self {
        Self {
            http: Client::new(),
            server_url,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("server url cannot be a base: {}", self.server_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn card_endpoint(&self, project: &str, number: CardNumber, tail: &[&str]) -> Result<Url> {
        let number = number.to_string();
        let mut segments = vec!["projects", project, "cards", number.as_str()];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }
}

async fn ensure_success(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let err = match serde_json::from_str::<ErrorModel>(&body) {
        Ok(model) => ApiException::from_model(status.as_u16(), &model),
        Err(_) if body.trim().is_empty() => ApiException::new(status.as_u16(), status.to_string()),
        Err(_) => ApiException::new(status.as_u16(), body.trim().to_string()),
    };
    Err(err.into())
}

#[async_trait]
impl RemoteBoardClient for HttpBoardClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = self.endpoint(&["projects"])?;
        debug!(%url, "GET projects");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to reach board server")?;
        let body: ListProjectsResponse = ensure_success(res)
            .await?
            .json()
            .await
            .context("invalid project list response")?;
        Ok(body.projects)
    }

    async fn list_cards(&self, project: &str) -> Result<Vec<CardSummary>> {
        let url = self.endpoint(&["projects", project, "cards"])?;
        debug!(%url, "GET cards");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to reach board server")?;
        let body: ListCardsResponse = ensure_success(res)
            .await?
            .json()
            .await
            .context("invalid card list response")?;
        Ok(body.cards)
    }

    async fn get_card_detail(&self, project: &str, number: CardNumber) -> Result<CardDetail> {
        let url = self.card_endpoint(project, number, &[])?;
        debug!(%url, "GET card");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to reach board server")?;
        ensure_success(res)
            .await?
            .json()
            .await
            .context("invalid card detail response")
    }

    async fn move_card(&self, project: &str, number: CardNumber, lane: Lane) -> Result<()> {
        let url = self.card_endpoint(project, number, &["move"])?;
        debug!(%url, %lane, "PATCH move");
        let res = self
            .http
            .patch(url)
            .json(&MoveCardRequest { status: lane })
            .send()
            .await
            .context("failed to reach board server")?;
        ensure_success(res).await?;
        Ok(())
    }

    async fn append_comment(&self, project: &str, number: CardNumber, body: &str) -> Result<()> {
        let url = self.card_endpoint(project, number, &["comments"])?;
        debug!(%url, "POST comment");
        let res = self
            .http
            .post(url)
            .json(&TextBodyRequest {
                body: body.to_string(),
            })
            .send()
            .await
            .context("failed to reach board server")?;
        ensure_success(res).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;

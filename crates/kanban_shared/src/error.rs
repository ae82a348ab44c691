use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Problem-details body the board server returns for non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorModel {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

impl ErrorModel {
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            parts.push(title.to_string());
        }
        if let Some(detail) = self.detail.as_deref().filter(|d| !d.is_empty()) {
            parts.push(detail.to_string());
        }
        parts.extend(self.errors.iter().filter_map(|e| match (&e.location, &e.message) {
            (Some(location), Some(message)) => Some(format!("{location}: {message}")),
            (None, Some(message)) => Some(message.clone()),
            _ => None,
        }));
        parts.join("; ")
    }
}

#[derive(Debug, Error)]
#[error("server responded {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_model(status: u16, model: &ErrorModel) -> Self {
        let summary = model.summary();
        if summary.is_empty() {
            Self::new(status, "no error details")
        } else {
            Self::new(status, summary)
        }
    }
}

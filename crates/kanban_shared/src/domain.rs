use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(CardNumber);

/// Board column a card sits in. The label doubles as the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lane {
    Todo,
    Doing,
    Review,
    Done,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Todo, Lane::Doing, Lane::Review, Lane::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Todo => "Todo",
            Lane::Doing => "Doing",
            Lane::Review => "Review",
            Lane::Done => "Done",
        }
    }

    /// Lanes a card may only return to from Review with a recorded reason.
    pub fn requires_reason(self) -> bool {
        matches!(self, Lane::Todo | Lane::Doing)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lane '{0}': expected one of Todo, Doing, Review, Done")]
pub struct UnknownLane(pub String);

impl FromStr for Lane {
    type Err = UnknownLane;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Lane::ALL
            .into_iter()
            .find(|lane| lane.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownLane(value.to_string()))
    }
}

/// Identity of a card across the whole board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardRef {
    pub project: String,
    pub number: CardNumber,
}

impl CardRef {
    pub fn new(project: impl Into<String>, number: CardNumber) -> Self {
        Self {
            project: project.into(),
            number,
        }
    }
}

impl fmt::Display for CardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.project, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub slug: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub local_path: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    #[serde(default)]
    pub id: String,
    pub project: String,
    pub number: CardNumber,
    pub title: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub branch: Option<String>,
    pub status: Lane,
    #[serde(default)]
    pub todos_count: u32,
    #[serde(default)]
    pub todos_completed_count: u32,
    #[serde(default)]
    pub acceptance_criteria_count: u32,
    #[serde(default)]
    pub acceptance_criteria_completed_count: u32,
}

impl CardSummary {
    pub fn card_ref(&self) -> CardRef {
        CardRef::new(self.project.clone(), self.number)
    }

    pub fn todo_progress(&self) -> Progress {
        Progress {
            done: self.todos_completed_count,
            total: self.todos_count,
        }
    }

    pub fn acceptance_progress(&self) -> Progress {
        Progress {
            done: self.acceptance_criteria_completed_count,
            total: self.acceptance_criteria_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "unescape_newlines")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetail {
    #[serde(default)]
    pub id: String,
    pub project: String,
    pub number: CardNumber,
    pub title: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub branch: Option<String>,
    pub status: Lane,
    #[serde(default)]
    pub description: Vec<TextEntry>,
    #[serde(default)]
    pub todos: Vec<ChecklistItem>,
    #[serde(default)]
    pub acceptance_criteria: Vec<ChecklistItem>,
    #[serde(default)]
    pub comments: Vec<TextEntry>,
}

impl CardDetail {
    pub fn card_ref(&self) -> CardRef {
        CardRef::new(self.project.clone(), self.number)
    }

    pub fn summary(&self) -> CardSummary {
        let completed = |items: &[ChecklistItem]| items.iter().filter(|i| i.completed).count() as u32;
        CardSummary {
            id: self.id.clone(),
            project: self.project.clone(),
            number: self.number,
            title: self.title.clone(),
            branch: self.branch.clone(),
            status: self.status,
            todos_count: self.todos.len() as u32,
            todos_completed_count: completed(&self.todos),
            acceptance_criteria_count: self.acceptance_criteria.len() as u32,
            acceptance_criteria_completed_count: completed(&self.acceptance_criteria),
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

fn unescape_newlines<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.replace("\\n", "\n"))
}

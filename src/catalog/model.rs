use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::links::{spotify_embed_id, youtube_embed_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
}

/// One variant of a progression. Empty slots are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pattern {
    pub label: String,
    pub chords: Vec<Option<String>>,
}

impl Pattern {
    pub fn new(label: &str, chords: &[Option<&str>]) -> Self {
        Pattern {
            label: label.to_string(),
            chords: chords.iter().map(|c| c.map(str::to_string)).collect(),
        }
    }
}

/// A song that uses the progression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Song {
    pub name: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub apple_music_url: Option<String>,
}

impl Song {
    pub fn youtube_embed_id(&self) -> Option<&str> {
        self.youtube_url.as_deref().and_then(youtube_embed_id)
    }

    pub fn spotify_embed_id(&self) -> Option<&str> {
        self.spotify_url.as_deref().and_then(spotify_embed_id)
    }
}

/// User input for a new submission or an edit request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressionDraft {
    pub title: String,
    #[serde(default)]
    pub remarks: Option<String>,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Progression {
    pub id: Uuid,
    pub title: String,
    pub remarks: Option<String>,
    pub status: Status,
    /// Search form of `patterns`, rebuilt on every write.
    pub normalized_chords: String,
    pub patterns: Vec<Pattern>,
    pub songs: Vec<Song>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    /// Set while this is a pending edit of an approved progression.
    pub original_id: Option<Uuid>,
}

/// List view of a progression, without songs or moderation fields.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressionSummary {
    pub id: Uuid,
    pub title: String,
    pub remarks: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub patterns: Vec<Pattern>,
}

impl From<&Progression> for ProgressionSummary {
    fn from(p: &Progression) -> Self {
        ProgressionSummary {
            id: p.id,
            title: p.title.clone(),
            remarks: p.remarks.clone(),
            status: p.status,
            created_at: p.created_at,
            patterns: p.patterns.clone(),
        }
    }
}

/// A pending submission next to the approved progression it would replace.
#[derive(Debug, Clone, Serialize)]
pub struct Diff {
    pub original: Option<Progression>,
    pub updated: Progression,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockedIp {
    pub id: Uuid,
    pub ip_address: String,
    pub reason: Option<String>,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Feedback {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Approve,
    Reject,
}

impl FromStr for AdminAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(AdminAction::Approve),
            "reject" => Ok(AdminAction::Reject),
            other => Err(Error::InvalidInput(format!("unknown action '{other}'"))),
        }
    }
}

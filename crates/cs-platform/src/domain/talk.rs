//! Talk Entity and Submission Validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ModerationStatus;
use crate::error::{PlatformError, Result};

/// Inclusive bounds on abstract length, counted in Unicode scalar values.
pub const ABSTRACT_MIN_CHARS: usize = 250;
pub const ABSTRACT_MAX_CHARS: usize = 350;

/// A speaker may own at most this many talks.
pub const MAX_TALKS_PER_SPEAKER: i64 = 3;

pub type TalkStatus = ModerationStatus;

/// Presentation format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TalkKind {
    Plenary,
    Oral,
    Poster,
}

impl TalkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plenary => "PLENARY",
            Self::Oral => "ORAL",
            Self::Poster => "POSTER",
        }
    }
}

impl fmt::Display for TalkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TalkKind {
    type Err = PlatformError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PLENARY" => Ok(Self::Plenary),
            "ORAL" => Ok(Self::Oral),
            "POSTER" => Ok(Self::Poster),
            _ => Err(PlatformError::validation(format!("Invalid talk kind: {}", s))),
        }
    }
}

/// Co-author entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TalkAuthor {
    pub full_name: String,
    pub affiliation: String,
}

/// Talk submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub id: Uuid,
    pub speaker_id: Uuid,
    pub section_id: Option<Uuid>,
    pub title: String,
    pub affiliation: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub kind: TalkKind,
    pub authors: Vec<TalkAuthor>,
    pub file_url: Option<String>,
    pub status: TalkStatus,
    pub schedule_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Talk {
    pub fn authors_line(&self) -> String {
        authors_line(&self.authors)
    }
}

/// Untrusted talk fields as submitted by a speaker.
///
/// `kind` and `authors` stay in their serialized form until
/// [`TalkDraft::validate`] parses them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TalkDraft {
    #[serde(default)]
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub kind: String,
    #[schema(value_type = Vec<TalkAuthor>)]
    #[serde(default)]
    pub authors: serde_json::Value,
}

/// Fields that passed validation
#[derive(Debug, Clone)]
pub struct ValidTalk {
    pub section_id: Option<Uuid>,
    pub title: String,
    pub affiliation: String,
    pub abstract_text: String,
    pub kind: TalkKind,
    pub authors: Vec<TalkAuthor>,
}

impl TalkDraft {
    pub fn validate(&self) -> Result<ValidTalk> {
        if self.title.trim().is_empty() {
            return Err(PlatformError::validation("title is required"));
        }
        if self.affiliation.trim().is_empty() {
            return Err(PlatformError::validation("affiliation is required"));
        }

        let length = self.abstract_text.chars().count();
        if !(ABSTRACT_MIN_CHARS..=ABSTRACT_MAX_CHARS).contains(&length) {
            return Err(PlatformError::validation(format!(
                "abstract length must be {}-{} characters, got {}",
                ABSTRACT_MIN_CHARS, ABSTRACT_MAX_CHARS, length
            )));
        }

        let authors: Vec<TalkAuthor> = serde_json::from_value(self.authors.clone())
            .map_err(|_| PlatformError::validation("authors required"))?;
        if authors.is_empty() {
            return Err(PlatformError::validation("authors required"));
        }
        if authors
            .iter()
            .any(|a| a.full_name.trim().is_empty() || a.affiliation.trim().is_empty())
        {
            return Err(PlatformError::validation("each author needs fullName and affiliation"));
        }

        let kind: TalkKind = self.kind.parse()?;

        Ok(ValidTalk {
            section_id: self.section_id,
            title: self.title.clone(),
            affiliation: self.affiliation.clone(),
            abstract_text: self.abstract_text.clone(),
            kind,
            authors,
        })
    }
}

impl ValidTalk {
    /// Build a new talk owned by `speaker_id`; status always starts WAITING.
    pub fn into_talk(self, speaker_id: Uuid, now: DateTime<Utc>) -> Talk {
        Talk {
            id: Uuid::new_v4(),
            speaker_id,
            section_id: self.section_id,
            title: self.title,
            affiliation: self.affiliation,
            abstract_text: self.abstract_text,
            kind: self.kind,
            authors: self.authors,
            file_url: None,
            status: TalkStatus::Waiting,
            schedule_time: None,
            created_at: now,
        }
    }

    /// Apply an edit to an existing talk, sending it back to moderation.
    pub fn apply_to(self, talk: &mut Talk) {
        talk.section_id = self.section_id;
        talk.title = self.title;
        talk.affiliation = self.affiliation;
        talk.abstract_text = self.abstract_text;
        talk.kind = self.kind;
        talk.authors = self.authors;
        talk.status = TalkStatus::Waiting;
    }
}

/// "Name (Affiliation); Name (Affiliation)"
pub fn authors_line(authors: &[TalkAuthor]) -> String {
    authors
        .iter()
        .map(|a| format!("{} ({})", a.full_name.trim(), a.affiliation.trim()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Talk row joined with speaker profile and section titles for moderators
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TalkOverview {
    pub id: Uuid,
    pub title: String,
    pub kind: TalkKind,
    pub status: TalkStatus,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<TalkAuthor>,
    pub section_id: Option<Uuid>,
    pub section_title_ru: Option<String>,
    pub section_title_en: Option<String>,
    pub schedule_time: Option<DateTime<Utc>>,
    pub file_url: Option<String>,
    pub speaker_full_name: String,
    pub speaker_city: String,
    pub speaker_affiliation: String,
}

/// Filter for talk listings
#[derive(Debug, Clone, Default)]
pub struct TalkFilter {
    pub section_id: Option<Uuid>,
    pub only_plenary: bool,
    pub status: Option<TalkStatus>,
}

impl TalkFilter {
    /// What the public program shows.
    pub fn approved() -> Self {
        Self {
            status: Some(TalkStatus::Approved),
            ..Default::default()
        }
    }
}

//! Domain Events
//!
//! Services return these instead of sending mail themselves; the
//! [`Notifier`](crate::service::Notifier) turns them into messages.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{ModerationStatus, TalkKind};

/// Notification language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ru,
    En,
}

impl Lang {
    /// Anything other than "en" falls back to Russian.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("en") => Self::En,
            _ => Self::Ru,
        }
    }

    pub fn is_en(&self) -> bool {
        matches!(self, Self::En)
    }
}

impl FromStr for Lang {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_param(Some(s)))
    }
}

/// Everything an organizer needs to review an uploaded thesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkUploadNotice {
    pub talk_id: Uuid,
    pub title: String,
    pub abstract_text: String,
    pub kind: TalkKind,
    pub authors_line: String,
    pub speaker_full_name: String,
    pub speaker_affiliation: String,
    pub speaker_city: String,
    pub section_title: Option<String>,
    pub file_url: Option<String>,
}

/// State transitions that carry a notification side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A new account was created
    UserRegistered { user_id: Uuid, email: String, lang: Lang },

    /// A WAITING user submitted the registration form
    RegistrationSubmitted {
        user_id: Uuid,
        email: String,
        full_name: String,
        affiliation: String,
        city: String,
        organizers: Vec<String>,
        lang: Lang,
    },

    /// A user left WAITING for the first time
    UserStatusDecided { user_id: Uuid, email: String, status: ModerationStatus },

    /// A talk left WAITING for the first time
    TalkStatusDecided {
        talk_id: Uuid,
        speaker_email: String,
        title: String,
        status: ModerationStatus,
    },

    /// A speaker recorded a thesis upload; `organizers` is already resolved
    /// and may be empty. `speaker_email` is `None` when the speaker could not
    /// be loaded.
    TalkFileUploaded {
        speaker_email: Option<String>,
        organizers: Vec<String>,
        notice: TalkUploadNotice,
        lang: Lang,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "UserRegistered",
            Self::RegistrationSubmitted { .. } => "RegistrationSubmitted",
            Self::UserStatusDecided { .. } => "UserStatusDecided",
            Self::TalkStatusDecided { .. } => "TalkStatusDecided",
            Self::TalkFileUploaded { .. } => "TalkFileUploaded",
        }
    }
}

/// Outcome of a moderation transition: notify only when leaving WAITING
/// for a decided state.
pub fn is_first_decision(previous: ModerationStatus, next: ModerationStatus) -> bool {
    previous.is_waiting() && !next.is_waiting()
}

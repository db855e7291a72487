//! Talk Submission Service
//!
//! Speaker-side operations. Every mutation checks ownership against the
//! stored talk first: a missing talk is `NotFound`, someone else's is
//! `Forbidden`.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    normalize_recipients, DomainEvent, Lang, Profile, Talk, TalkDraft, TalkUploadNotice,
    MAX_TALKS_PER_SPEAKER,
};
use crate::error::{PlatformError, Result};
use crate::repository::Repositories;

pub struct TalkService {
    repos: Repositories,
    clock: Arc<dyn Clock>,
    organizer_emails: Vec<String>,
}

impl TalkService {
    pub fn new(repos: Repositories, clock: Arc<dyn Clock>, organizer_emails: Vec<String>) -> Self {
        Self {
            repos,
            clock,
            organizer_emails: normalize_recipients(organizer_emails),
        }
    }

    /// Submit a new talk. Owner and WAITING status are forced.
    pub async fn create(&self, speaker_id: Uuid, draft: &TalkDraft) -> Result<Talk> {
        let valid = draft.validate()?;
        self.require_section(draft.section_id).await?;

        if self.repos.talks.count_by_speaker(speaker_id).await? >= MAX_TALKS_PER_SPEAKER {
            return Err(PlatformError::TalkLimitReached {
                limit: MAX_TALKS_PER_SPEAKER,
            });
        }

        let talk = valid.into_talk(speaker_id, self.clock.now());
        self.repos
            .talks
            .create_within_quota(&talk, MAX_TALKS_PER_SPEAKER)
            .await?;

        info!(talk_id = %talk.id, speaker_id = %speaker_id, kind = %talk.kind, "Talk submitted");
        Ok(talk)
    }

    /// Replace the editable fields; the talk re-enters moderation.
    pub async fn update(&self, speaker_id: Uuid, talk_id: Uuid, draft: &TalkDraft) -> Result<Talk> {
        let mut talk = self.owned(speaker_id, talk_id).await?;
        let valid = draft.validate()?;
        self.require_section(draft.section_id).await?;
        valid.apply_to(&mut talk);
        self.repos.talks.update(&talk).await?;

        info!(talk_id = %talk.id, "Talk updated, back to moderation");
        Ok(talk)
    }

    pub async fn delete(&self, speaker_id: Uuid, talk_id: Uuid) -> Result<()> {
        self.owned(speaker_id, talk_id).await?;
        if !self.repos.talks.delete(talk_id).await? {
            return Err(PlatformError::not_found("Talk", talk_id.to_string()));
        }
        info!(talk_id = %talk_id, "Talk deleted");
        Ok(())
    }

    pub async fn list_mine(&self, speaker_id: Uuid) -> Result<Vec<Talk>> {
        self.repos.talks.list_by_speaker(speaker_id).await
    }

    pub async fn get_mine(&self, speaker_id: Uuid, talk_id: Uuid) -> Result<Talk> {
        self.owned(speaker_id, talk_id).await
    }

    /// Record the uploaded thesis and describe who must hear about it.
    ///
    /// A blank or missing URL clears the stored one; the organizer mail then
    /// says no file was uploaded. Once the write succeeds the event is always
    /// returned: speaker, profile and section details are filled in as far as
    /// they can be loaded.
    pub async fn set_file_url(
        &self,
        speaker_id: Uuid,
        talk_id: Uuid,
        file_url: Option<&str>,
        lang: Lang,
    ) -> Result<DomainEvent> {
        let file_url = file_url.map(str::trim).filter(|u| !u.is_empty());

        let mut talk = self.owned(speaker_id, talk_id).await?;
        self.repos.talks.set_file_url(talk_id, file_url).await?;
        talk.file_url = file_url.map(String::from);
        info!(talk_id = %talk_id, has_file = file_url.is_some(), "Talk file recorded");

        let speaker_email = match self.repos.users.find_by_id(speaker_id).await {
            Ok(Some(speaker)) => Some(speaker.user.email),
            Ok(None) => {
                warn!(speaker_id = %speaker_id, "Speaker vanished before upload notice");
                None
            }
            Err(e) => {
                warn!(error = %e, speaker_id = %speaker_id, "Failed to load speaker for upload notice");
                None
            }
        };

        let profile = match self.repos.profiles.get(speaker_id).await {
            Ok(profile) => profile.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, speaker_id = %speaker_id, "Failed to load speaker profile");
                Profile::default()
            }
        };

        let section_title = match talk.section_id {
            Some(section_id) => match self.repos.sections.get(section_id).await {
                Ok(section) => section.map(|s| s.title(lang.is_en()).to_string()),
                Err(e) => {
                    warn!(error = %e, section_id = %section_id, "Failed to load section title");
                    None
                }
            },
            None => None,
        };

        let organizers = self.resolve_recipients(&talk).await;

        Ok(DomainEvent::TalkFileUploaded {
            speaker_email,
            organizers,
            notice: TalkUploadNotice {
                talk_id: talk.id,
                title: talk.title.clone(),
                abstract_text: talk.abstract_text.clone(),
                kind: talk.kind,
                authors_line: talk.authors_line(),
                speaker_full_name: profile.full_name(),
                speaker_affiliation: profile.affiliation,
                speaker_city: profile.city,
                section_title,
                file_url: talk.file_url.clone(),
            },
            lang,
        })
    }

    /// Section responsibles, else the configured organizers. May be empty.
    async fn resolve_recipients(&self, talk: &Talk) -> Vec<String> {
        if let Some(section_id) = talk.section_id {
            match self.repos.sections.responsible_emails(section_id).await {
                Ok(emails) => {
                    let emails = normalize_recipients(emails);
                    if !emails.is_empty() {
                        return emails;
                    }
                }
                Err(e) => warn!(error = %e, section_id = %section_id, "Failed to load section responsibles"),
            }
        }
        self.organizer_emails.clone()
    }

    async fn require_section(&self, section_id: Option<Uuid>) -> Result<()> {
        if let Some(section_id) = section_id {
            if self.repos.sections.get(section_id).await?.is_none() {
                return Err(PlatformError::not_found("Section", section_id.to_string()));
            }
        }
        Ok(())
    }

    async fn owned(&self, speaker_id: Uuid, talk_id: Uuid) -> Result<Talk> {
        let talk = self
            .repos
            .talks
            .get(talk_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Talk", talk_id.to_string()))?;
        if talk.speaker_id != speaker_id {
            return Err(PlatformError::forbidden("not the owner of this talk"));
        }
        Ok(talk)
    }
}

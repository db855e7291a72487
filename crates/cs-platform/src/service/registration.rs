//! Registration Service
//!
//! Accepts the application form from a user still waiting for moderation.

use tracing::info;
use uuid::Uuid;

use crate::domain::{normalize_recipients, DomainEvent, Lang, RegistrationForm, UserStatus};
use crate::error::{PlatformError, Result};
use crate::repository::Repositories;

pub struct RegistrationService {
    repos: Repositories,
    organizer_emails: Vec<String>,
}

impl RegistrationService {
    pub fn new(repos: Repositories, organizer_emails: Vec<String>) -> Self {
        Self {
            repos,
            organizer_emails: normalize_recipients(organizer_emails),
        }
    }

    /// Store the form as the user's profile. Only WAITING users may submit;
    /// the event carries the receipt and the organizer notice.
    pub async fn submit(&self, user_id: Uuid, form: RegistrationForm, lang: Lang) -> Result<DomainEvent> {
        let account = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id.to_string()))?;
        if account.user.status != UserStatus::Waiting {
            return Err(PlatformError::validation("already processed"));
        }

        let profile = form.into_profile(user_id)?;
        self.repos.profiles.upsert(&profile).await?;
        info!(user_id = %user_id, "Registration form submitted");

        Ok(DomainEvent::RegistrationSubmitted {
            user_id,
            email: account.user.email,
            full_name: profile.full_name(),
            affiliation: profile.affiliation,
            city: profile.city,
            organizers: self.organizer_emails.clone(),
            lang,
        })
    }
}

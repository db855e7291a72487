//! Notification Dispatch
//!
//! Turns domain events into mail. Sends are best-effort: a failed delivery
//! is logged and never reaches the caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::DomainEvent;
use crate::mail::{MailMessage, Mailer, Templates};

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    templates: Templates,
    timeout: Duration,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, templates: Templates, timeout: Duration) -> Self {
        Self {
            mailer,
            templates,
            timeout,
        }
    }

    /// Deliver the mail for `event`.
    ///
    /// The welcome mail runs on a detached task bounded by the configured
    /// timeout and its handle is returned; everything else is sent before
    /// this returns.
    pub async fn dispatch(&self, event: DomainEvent) -> Option<JoinHandle<()>> {
        debug!(event = event.name(), "Dispatching notification");

        match event {
            DomainEvent::UserRegistered { email, lang, .. } => {
                let message = MailMessage::new(email, self.templates.welcome(lang));
                let mailer = self.mailer.clone();
                let timeout = self.timeout;
                Some(tokio::spawn(async move {
                    match tokio::time::timeout(timeout, mailer.send(&message)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, to = %message.to, "Welcome email failed"),
                        Err(_) => warn!(to = %message.to, "Welcome email timed out"),
                    }
                }))
            }
            DomainEvent::RegistrationSubmitted {
                email,
                full_name,
                affiliation,
                city,
                organizers,
                lang,
                ..
            } => {
                let receipt = self.templates.registration_received(lang);
                self.deliver(MailMessage::new(email.clone(), receipt)).await;

                let rendered = self
                    .templates
                    .org_new_registration(lang, &full_name, &affiliation, &city, &email);
                for to in organizers {
                    self.deliver(MailMessage::new(to, rendered.clone())).await;
                }
                None
            }
            DomainEvent::UserStatusDecided { email, status, .. } => {
                if let Some(rendered) = self.templates.user_status(status) {
                    self.deliver(MailMessage::new(email, rendered)).await;
                }
                None
            }
            DomainEvent::TalkStatusDecided {
                speaker_email,
                title,
                status,
                ..
            } => {
                if let Some(rendered) = self.templates.talk_status(&title, status) {
                    self.deliver(MailMessage::new(speaker_email, rendered)).await;
                }
                None
            }
            DomainEvent::TalkFileUploaded {
                speaker_email,
                organizers,
                notice,
                lang,
            } => {
                if let Some(speaker_email) = speaker_email {
                    let ack = self.templates.talk_file_uploaded(lang, &notice.title);
                    self.deliver(MailMessage::new(speaker_email, ack)).await;
                }

                if organizers.is_empty() {
                    warn!(talk_id = %notice.talk_id, "No organizer recipients for uploaded thesis");
                    return None;
                }
                let rendered = self.templates.organizer_talk_file_uploaded(lang, &notice);
                for to in organizers {
                    self.deliver(MailMessage::new(to, rendered.clone())).await;
                }
                None
            }
        }
    }

    async fn deliver(&self, message: MailMessage) {
        if let Err(e) = self.mailer.send(&message).await {
            warn!(error = %e, to = %message.to, subject = %message.subject, "Notification email failed");
        }
    }
}
